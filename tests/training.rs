use snake_rl::config::EpsilonSchedule;
use snake_rl::db::{self, History};
use snake_rl::game_input::StateEncoder;
use snake_rl::{ActionValueEstimator, ApproximateEstimator, Config, TabularEstimator, Trainer, evaluate};

fn shrink(mut cfg: Config, episodes: u64) -> Config {
    cfg.game.width = 200;
    cfg.game.height = 200;
    cfg.game.stall_factor = 20;
    cfg.trainer.replay_capacity = 500;
    cfg.trainer.batch_size = 32;
    cfg.trainer.episodes = Some(episodes);
    cfg.trainer.log_every = 10;
    cfg
}

#[test]
fn tabular_run_resumes_from_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("q.json");
    let cfg = shrink(Config::tabular(), 40);

    let fresh = TabularEstimator::new(cfg.game.action_set.len(), &cfg.learner);
    let est = db::load_or_fresh(&model, &cfg.learner, fresh);
    assert!(est.is_empty());
    let mut trainer = Trainer::new(cfg.clone(), est)
        .unwrap()
        .with_checkpoint(&model)
        .with_history(History::open(dir.path().join("history.sqlite")).unwrap());
    let summary = trainer.run().unwrap();
    assert_eq!(summary.episodes, 40);
    assert!(trainer.epsilon() < cfg.exploration.start());
    let states = trainer.estimator().len();
    assert!(states > 0);

    let fresh = TabularEstimator::new(cfg.game.action_set.len(), &cfg.learner);
    let resumed = db::load_or_fresh(&model, &cfg.learner, fresh);
    assert_eq!(resumed.len(), states);

    let history = History::open(dir.path().join("history.sqlite")).unwrap();
    assert_eq!(history.count().unwrap(), 40);
    let recent = history.recent(1).unwrap();
    assert_eq!(recent[0].episode, 40);
    assert_eq!(recent[0].record, summary.record);

    let eval = evaluate(&resumed, &cfg, 5).unwrap();
    assert_eq!(eval.scores.len(), 5);
}

#[test]
fn approximate_run_saves_a_loadable_network() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("net.json");
    let mut cfg = shrink(Config::approximate(), 8);
    cfg.learner.hidden = 16;
    cfg.exploration = EpsilonSchedule::Linear { start: 0.8, min: 0.0, step: 0.1 };

    let inputs = StateEncoder::new(&cfg.encoder).feature_len();
    let est = ApproximateEstimator::new(inputs, cfg.game.action_set.len(), &cfg.learner);
    let mut trainer = Trainer::new(cfg.clone(), est).unwrap().with_checkpoint(&model);
    let summary = trainer.run().unwrap();
    assert_eq!(summary.episodes, 8);
    assert!(summary.total_steps >= 8);
    assert!((trainer.epsilon() - 0.0).abs() < 1e-6);

    let loaded = ApproximateEstimator::load(&model, &cfg.learner).unwrap();
    let trained = trainer.into_estimator();
    assert!(loaded.same_shape(&trained));
    let probe = vec![0.5; inputs];
    assert_eq!(loaded.estimate(&probe), trained.estimate(&probe));
}

#[test]
fn corrupt_model_falls_back_to_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("net.json");
    std::fs::write(&model, b"{\"input_size\": 3").unwrap();
    let cfg = Config::approximate();
    let inputs = StateEncoder::new(&cfg.encoder).feature_len();
    let fresh = ApproximateEstimator::new(inputs, 3, &cfg.learner);
    let expected = fresh.network().clone();
    let est = db::load_or_fresh(&model, &cfg.learner, fresh);
    assert_eq!(est.network(), &expected);
}
