use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use snake_rl::db::{self, History};
use snake_rl::game_input::StateEncoder;
use snake_rl::{ActionValueEstimator, ApproximateEstimator, Backend, Config, TabularEstimator, Trainer, evaluate, log};

#[derive(Parser, Debug)]
#[command(name = "snake_rl", about = "Train and evaluate a snake-playing agent")]
struct Cli {
    /// Log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train, resuming from the model file when it loads.
    Train {
        #[command(flatten)]
        common: CommonArgs,

        /// Episode budget; overrides the config.
        #[arg(long)]
        episodes: Option<u64>,

        /// Train until interrupted.
        #[arg(long, conflicts_with = "episodes")]
        forever: bool,

        /// SQLite file for per-episode history.
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Play greedy games with a saved model.
    Evaluate {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long, default_value_t = 100)]
        episodes: u64,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Defaults to the config file's backend, or tabular.
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// JSON config; missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "model.json")]
    model: PathBuf,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    Tabular,
    Approximate,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Tabular => Backend::Tabular,
            BackendArg::Approximate => Backend::Approximate,
        }
    }
}

fn load_config(common: &CommonArgs) -> Result<Config> {
    let backend = common.backend.map(Backend::from);
    let mut cfg = match &common.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::preset(backend.unwrap_or(Backend::Tabular)),
    };
    if let Some(b) = backend {
        cfg.backend = b;
    }
    Ok(cfg)
}

fn train<E: ActionValueEstimator>(cfg: Config, fresh: E, model: PathBuf, history: Option<PathBuf>) -> Result<()> {
    let estimator = db::load_or_fresh(&model, &cfg.learner, fresh);
    let mut trainer = Trainer::new(cfg, estimator).context("invalid configuration")?.with_checkpoint(model);
    if let Some(path) = history {
        let h = History::open(&path).with_context(|| format!("opening history {}", path.display()))?;
        trainer = trainer.with_history(h);
    }
    let summary = trainer.run().context("saving final checkpoint")?;
    info!(episodes = summary.episodes, record = summary.record, mean = summary.mean_score, "done");
    Ok(())
}

fn eval<E: ActionValueEstimator>(cfg: &Config, model: &Path, episodes: u64) -> Result<()> {
    let estimator = E::load(model, &cfg.learner).with_context(|| format!("loading model {}", model.display()))?;
    let summary = evaluate(&estimator, cfg, episodes).context("invalid configuration")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    log::init(&cli.log_level, cli.log_file.as_deref()).context("opening log file")?;

    match cli.command {
        Command::Train { common, episodes, forever, history } => {
            let mut cfg = load_config(&common)?;
            if forever {
                cfg.trainer.episodes = None;
            } else if episodes.is_some() {
                cfg.trainer.episodes = episodes;
            }
            let actions = cfg.game.action_set.len();
            match cfg.backend {
                Backend::Tabular => {
                    let fresh = TabularEstimator::new(actions, &cfg.learner);
                    train(cfg, fresh, common.model, history)
                }
                Backend::Approximate => {
                    let inputs = StateEncoder::new(&cfg.encoder).feature_len();
                    let fresh = ApproximateEstimator::new(inputs, actions, &cfg.learner);
                    train(cfg, fresh, common.model, history)
                }
            }
        }
        Command::Evaluate { common, episodes } => {
            let cfg = load_config(&common)?;
            match cfg.backend {
                Backend::Tabular => eval::<TabularEstimator>(&cfg, &common.model, episodes),
                Backend::Approximate => eval::<ApproximateEstimator>(&cfg, &common.model, episodes),
            }
        }
    }
}
