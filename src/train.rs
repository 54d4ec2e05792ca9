//! Episodic epsilon-greedy training loop.
//!
//! The trainer owns the world, the replay buffer and the estimator and moves
//! through `EpisodeStart -> Step* -> EpisodeEnd`. Stop requests (budget, the
//! shared stop flag, the renderer) are only looked at between episodes so an
//! update is never cut in half.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ActionSet, Config};
use crate::db::History;
use crate::error::{ConfigError, PersistenceError};
use crate::estimator::ActionValueEstimator;
use crate::game::{Action, EpisodeEnd, GridWorld, StepOutcome};
use crate::game_input::{Observation, StateEncoder};
use crate::log;
use crate::render::{HumanInput, Renderer};
use crate::replay_buffer::{ReplayBuffer, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    EpisodeStart,
    Step,
    EpisodeEnd,
}

/// What happened in one finished episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    /// 1-based.
    pub episode: u64,
    pub score: u32,
    /// Best score so far, this episode included.
    pub record: u32,
    pub steps: usize,
    /// Epsilon used while playing the episode.
    pub epsilon: f32,
    /// Mean score over all episodes so far.
    pub mean_score: f32,
    /// Mean update loss over the episode, if any update ran.
    pub loss: Option<f32>,
    pub end: Option<EpisodeEnd>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub episodes: u64,
    pub record: u32,
    pub mean_score: f32,
    pub total_steps: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub episodes: u64,
    pub scores: Vec<u32>,
    pub mean_score: f32,
    pub max_score: u32,
}

pub struct Trainer<E: ActionValueEstimator> {
    config: Config,
    world: GridWorld,
    encoder: StateEncoder,
    buffer: ReplayBuffer<E::State>,
    estimator: E,
    epsilon: f32,
    phase: Phase,
    rng: StdRng,
    episodes: u64,
    record: u32,
    total_score: u64,
    total_steps: u64,
    history: Option<History>,
    checkpoint: Option<PathBuf>,
    renderer: Option<Box<dyn Renderer>>,
    stop: Arc<AtomicBool>,
}

impl<E: ActionValueEstimator> Trainer<E> {
    pub fn new(config: Config, estimator: E) -> Result<Self, ConfigError> {
        config.validate()?;
        let world = GridWorld::new(config.game.clone())?;
        let encoder = StateEncoder::new(&config.encoder);
        check_compatible(&estimator, &config, &encoder)?;
        Ok(Self {
            buffer: ReplayBuffer::new(config.trainer.replay_capacity),
            rng: StdRng::seed_from_u64(config.trainer.seed),
            epsilon: config.exploration.start(),
            config,
            world,
            encoder,
            estimator,
            phase: Phase::EpisodeStart,
            episodes: 0,
            record: 0,
            total_score: 0,
            total_steps: 0,
            history: None,
            checkpoint: None,
            renderer: None,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = Some(history);
        self
    }

    /// Saved on every new record and when training stops.
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = Some(path.into());
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Setting the flag stops training after the current episode.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn into_estimator(self) -> E {
        self.estimator
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn record(&self) -> u32 {
        self.record
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn buffer(&self) -> &ReplayBuffer<E::State> {
        &self.buffer
    }

    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    fn should_stop(&self) -> bool {
        if self.config.trainer.episodes.is_some_and(|budget| self.episodes >= budget) {
            return true;
        }
        if self.stop.load(Ordering::Relaxed) {
            info!(episodes = self.episodes, "stop requested");
            return true;
        }
        if self.renderer.as_ref().is_some_and(|r| r.termination_requested()) {
            info!(episodes = self.episodes, "renderer asked to stop");
            return true;
        }
        false
    }

    /// Explore uniformly with probability epsilon, otherwise exploit.
    fn select_action(&mut self, state: &E::State) -> Action {
        if self.rng.r#gen::<f32>() < self.epsilon {
            Action(self.rng.gen_range(0..self.estimator.action_count()))
        } else {
            self.estimator.best_action(state)
        }
    }

    /// One environment step plus whatever updates it triggers.
    fn step(&mut self) -> (StepOutcome, Option<f32>) {
        let state = <E::State as Observation>::observe(&self.encoder, &self.world.state());
        let action = self.select_action(&state);
        let outcome = self.world.step(action);
        let snapshot = self.world.state();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.render(&snapshot);
        }
        let next_state = <E::State as Observation>::observe(&self.encoder, &snapshot);
        self.buffer.push(Transition { state, action, reward: outcome.reward, next_state, done: outcome.done });

        let mut loss = None;
        if self.config.trainer.online_update {
            if let Some(latest) = self.buffer.latest() {
                loss = Some(self.estimator.update(&[latest]));
            }
        }
        let batch_size = self.config.trainer.batch_size;
        if self.buffer.len() > batch_size {
            match self.buffer.sample(&mut self.rng, batch_size) {
                Ok(batch) => loss = Some(self.estimator.update(&batch)),
                Err(e) => warn!("{e}"),
            }
        }
        (outcome, loss)
    }

    /// Plays one episode to its end, learning along the way.
    pub fn run_episode(&mut self) -> EpisodeReport {
        self.phase = Phase::EpisodeStart;
        self.world.reset();
        let epsilon = self.epsilon;
        let (mut steps, mut loss_sum, mut loss_n) = (0usize, 0.0f32, 0usize);

        self.phase = Phase::Step;
        let outcome = loop {
            let (outcome, loss) = self.step();
            steps += 1;
            if let Some(l) = loss.filter(|l| l.is_finite()) {
                loss_sum += l;
                loss_n += 1;
            }
            if outcome.done {
                break outcome;
            }
        };

        self.phase = Phase::EpisodeEnd;
        self.episodes += 1;
        self.total_steps += steps as u64;
        self.total_score += outcome.score as u64;
        let new_record = outcome.score > self.record;
        self.record = self.record.max(outcome.score);
        self.epsilon = self.config.exploration.next(self.epsilon, self.episodes);

        let report = EpisodeReport {
            episode: self.episodes,
            score: outcome.score,
            record: self.record,
            steps,
            epsilon,
            mean_score: self.total_score as f32 / self.episodes as f32,
            loss: (loss_n > 0).then(|| loss_sum / loss_n as f32),
            end: outcome.end,
        };

        log::scalar(self.episodes, "score", report.score as f32);
        log::scalar(self.episodes, "epsilon", epsilon);
        if new_record {
            info!(episode = report.episode, score = report.score, "new record");
            self.save_checkpoint();
        }
        if self.config.trainer.log_every > 0 && self.episodes % self.config.trainer.log_every == 0 {
            info!(
                episode = report.episode,
                score = report.score,
                record = report.record,
                mean = report.mean_score,
                epsilon = report.epsilon,
                loss = ?report.loss,
                "episode finished"
            );
        } else {
            debug!(episode = report.episode, score = report.score, end = ?report.end, "episode finished");
        }
        if let Some(history) = &self.history {
            if let Err(e) = history.record(&report) {
                warn!(error = %e, "could not record episode");
            }
        }
        report
    }

    fn save_checkpoint(&self) {
        if let Some(path) = &self.checkpoint {
            match self.estimator.save(path) {
                Ok(()) => debug!(path = %path.display(), "checkpoint saved"),
                Err(e) => warn!(error = %e, "checkpoint not saved"),
            }
        }
    }

    /// Trains until a stop condition holds, then saves a final checkpoint.
    pub fn run(&mut self) -> Result<TrainingSummary, PersistenceError> {
        info!(
            backend = ?self.config.backend,
            budget = ?self.config.trainer.episodes,
            epsilon = self.epsilon,
            "training started"
        );
        while !self.should_stop() {
            self.run_episode();
        }
        if let Some(path) = &self.checkpoint {
            self.estimator.save(path)?;
        }
        let summary = TrainingSummary {
            episodes: self.episodes,
            record: self.record,
            mean_score: if self.episodes == 0 { 0.0 } else { self.total_score as f32 / self.episodes as f32 },
            total_steps: self.total_steps,
        };
        info!(episodes = summary.episodes, record = summary.record, mean = summary.mean_score, "training finished");
        Ok(summary)
    }
}

/// The estimator must produce one value per configured action and, when it
/// has a fixed input width, accept the encoder's feature vector.
fn check_compatible<E: ActionValueEstimator>(
    estimator: &E,
    config: &Config,
    encoder: &StateEncoder,
) -> Result<(), ConfigError> {
    let actions = config.game.action_set.len();
    if estimator.action_count() != actions {
        return Err(ConfigError::Invalid(format!(
            "estimator has {} actions but the {:?} action set has {actions}",
            estimator.action_count(),
            config.game.action_set,
        )));
    }
    if let Some(inputs) = estimator.input_len() {
        if inputs != encoder.feature_len() {
            return Err(ConfigError::Invalid(format!(
                "estimator expects {inputs} features but the {:?} encoder produces {}",
                encoder.food_encoding(),
                encoder.feature_len()
            )));
        }
    }
    Ok(())
}

/// Plays `episodes` greedy games without learning.
pub fn evaluate<E: ActionValueEstimator>(
    estimator: &E,
    config: &Config,
    episodes: u64,
) -> Result<EvaluationSummary, ConfigError> {
    let mut world = GridWorld::new(config.game.clone())?;
    let encoder = StateEncoder::new(&config.encoder);
    check_compatible(estimator, config, &encoder)?;
    let mut scores = Vec::with_capacity(episodes as usize);
    for episode in 1..=episodes {
        world.reset();
        let outcome = loop {
            let state = <E::State as Observation>::observe(&encoder, &world.state());
            let outcome = world.step(estimator.best_action(&state));
            if outcome.done {
                break outcome;
            }
        };
        debug!(episode, score = outcome.score, end = ?outcome.end, "evaluation episode");
        scores.push(outcome.score);
    }
    let mean_score = if scores.is_empty() { 0.0 } else { scores.iter().sum::<u32>() as f32 / scores.len() as f32 };
    let max_score = scores.iter().copied().max().unwrap_or(0);
    info!(episodes, mean = mean_score, max = max_score, "evaluation finished");
    Ok(EvaluationSummary { episodes, scores, mean_score, max_score })
}

/// Person-driven game: polls `input` every tick and keeps the heading when
/// nothing is pressed. Returns the final score.
pub fn play(world: &mut GridWorld, input: &mut dyn HumanInput, renderer: &mut dyn Renderer) -> u32 {
    world.reset();
    renderer.render(&world.state());
    loop {
        let action = input.poll_action().unwrap_or_else(|| hold_course(world));
        let outcome = world.step(action);
        renderer.render(&world.state());
        if outcome.done || renderer.termination_requested() {
            return outcome.score;
        }
    }
}

fn hold_course(world: &GridWorld) -> Action {
    match world.config().action_set {
        ActionSet::Relative => Action::STRAIGHT,
        ActionSet::Absolute => Action::toward(world.snake().direction),
    }
}
