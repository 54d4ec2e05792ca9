//! Training tunables.
//!
//! Every constant the engine depends on lives here so runs can be reproduced
//! from a single JSON file. Missing fields fall back to the tabular preset.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::border::Border;
use crate::error::ConfigError;

/// Which estimator backs the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Tabular,
    Approximate,
}

/// Action convention shared by the world, the encoder and the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSet {
    /// `[straight, right turn, left turn]` relative to the heading.
    Relative,
    /// `[up, down, left, right]` compass directions.
    Absolute,
}

impl ActionSet {
    pub fn len(&self) -> usize {
        match self {
            ActionSet::Relative => 3,
            ActionSet::Absolute => 4,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// How the food position is presented to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodEncoding {
    /// Four binary flags: food left, right, up, down of the head.
    Flags,
    /// Signed offsets `dx / width`, `dy / height` in `[-1, 1]`.
    Offsets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub width: u32,
    pub height: u32,
    pub cell_size: u32,
    pub action_set: ActionSet,
    /// An episode is cut once its step count exceeds `stall_factor * snake length`.
    pub stall_factor: usize,
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 400,
            cell_size: 20,
            action_set: ActionSet::Absolute,
            stall_factor: 100,
            seed: 0x5EED,
        }
    }
}

impl GameConfig {
    /// Geometry for this config: cell-aligned, at least 5x5 cells, and small
    /// enough for `i32` coordinates.
    pub fn board(&self) -> Result<Border, ConfigError> {
        let c = self.cell_size;
        if c == 0 || self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid("board dimensions and cell size must be positive".into()));
        }
        if self.width % c != 0 || self.height % c != 0 {
            return Err(ConfigError::Invalid(format!(
                "board {}x{} is not a multiple of cell size {c}",
                self.width, self.height
            )));
        }
        if self.width / c < 5 || self.height / c < 5 {
            return Err(ConfigError::Invalid("board must be at least 5 cells in each direction".into()));
        }
        Border::new(self.width, self.height, c)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub food_encoding: FoodEncoding,
    /// Bucket count `K` used to discretize continuous offsets for table keys.
    pub resolution: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self { food_encoding: FoodEncoding::Offsets, resolution: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub gamma: f32,
    pub learning_rate: f32,
    /// Hidden width of the approximate estimator.
    pub hidden: usize,
    /// Global gradient-norm clip for the approximate estimator.
    pub max_grad_norm: Option<f32>,
    /// Cap on distinct table states; new keys are rejected once reached.
    pub max_states: Option<usize>,
    pub seed: u64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            learning_rate: 0.01,
            hidden: 256,
            max_grad_norm: None,
            max_states: None,
            seed: 42,
        }
    }
}

/// Exploration rate policy, applied once per finished episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpsilonSchedule {
    /// `eps <- max(min, eps * decay)`
    Multiplicative { start: f32, min: f32, decay: f32 },
    /// `eps <- max(min, start - step * episodes)`
    Linear { start: f32, min: f32, step: f32 },
}

impl EpsilonSchedule {
    pub fn start(&self) -> f32 {
        match *self {
            EpsilonSchedule::Multiplicative { start, .. } | EpsilonSchedule::Linear { start, .. } => start,
        }
    }

    pub fn min(&self) -> f32 {
        match *self {
            EpsilonSchedule::Multiplicative { min, .. } | EpsilonSchedule::Linear { min, .. } => min,
        }
    }

    /// Epsilon after `episodes` finished episodes, given the current value.
    pub fn next(&self, current: f32, episodes: u64) -> f32 {
        let raw = match *self {
            EpsilonSchedule::Multiplicative { decay, .. } => current * decay,
            EpsilonSchedule::Linear { start, step, .. } => start - step * episodes as f32,
        };
        // never climbs back above the current value
        raw.min(current).clamp(self.min(), self.start())
    }
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        EpsilonSchedule::Multiplicative { start: 1.0, min: 0.01, decay: 0.9995 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub replay_capacity: usize,
    /// Replay batches are drawn once the buffer holds more than this many transitions.
    pub batch_size: usize,
    /// Also learn from each fresh transition right after it is stored.
    pub online_update: bool,
    /// Stop after this many episodes; `None` runs until stopped externally.
    pub episodes: Option<u64>,
    pub log_every: u64,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            replay_capacity: 10_000,
            batch_size: 64,
            online_update: true,
            episodes: Some(10_000),
            log_every: 100,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub game: GameConfig,
    pub encoder: EncoderConfig,
    pub learner: LearnerConfig,
    pub exploration: EpsilonSchedule,
    pub trainer: TrainerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config::tabular()
    }
}

impl Config {
    /// Lookup-table agent: compass actions, bucketed food offsets.
    pub fn tabular() -> Self {
        Self {
            backend: Backend::Tabular,
            game: GameConfig::default(),
            encoder: EncoderConfig::default(),
            learner: LearnerConfig::default(),
            exploration: EpsilonSchedule::default(),
            trainer: TrainerConfig::default(),
        }
    }

    /// Two-layer network agent: relative turns, food direction flags.
    pub fn approximate() -> Self {
        Self {
            backend: Backend::Approximate,
            game: GameConfig { width: 640, height: 480, action_set: ActionSet::Relative, ..GameConfig::default() },
            encoder: EncoderConfig { food_encoding: FoodEncoding::Flags, ..EncoderConfig::default() },
            learner: LearnerConfig { max_grad_norm: Some(10.0), ..LearnerConfig::default() },
            exploration: EpsilonSchedule::Linear { start: 0.8, min: 0.0, step: 0.01 },
            trainer: TrainerConfig {
                replay_capacity: 100_000,
                batch_size: 1000,
                online_update: false,
                ..TrainerConfig::default()
            },
        }
    }

    pub fn preset(backend: Backend) -> Self {
        match backend {
            Backend::Tabular => Config::tabular(),
            Backend::Approximate => Config::approximate(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let cfg: Config =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let g = &self.game;
        g.board()?;
        if g.stall_factor == 0 {
            return invalid("stall_factor must be at least 1".into());
        }
        if !(1..=255).contains(&self.encoder.resolution) {
            return invalid(format!("encoder resolution {} outside 1..=255", self.encoder.resolution));
        }
        let l = &self.learner;
        if !(0.0..=1.0).contains(&l.gamma) {
            return invalid(format!("gamma {} outside [0, 1]", l.gamma));
        }
        if !(l.learning_rate > 0.0) {
            return invalid("learning_rate must be positive".into());
        }
        if l.hidden == 0 {
            return invalid("hidden width must be positive".into());
        }
        let t = &self.trainer;
        if t.replay_capacity == 0 || t.batch_size == 0 {
            return invalid("replay capacity and batch size must be positive".into());
        }
        if t.batch_size > t.replay_capacity {
            return invalid(format!("batch size {} exceeds replay capacity {}", t.batch_size, t.replay_capacity));
        }
        let e = &self.exploration;
        if !(0.0 <= e.min() && e.min() <= e.start() && e.start() <= 1.0) {
            return invalid(format!("epsilon bounds out of order: min {} start {}", e.min(), e.start()));
        }
        match *e {
            EpsilonSchedule::Multiplicative { decay, .. } if !(decay > 0.0 && decay <= 1.0) => {
                invalid(format!("epsilon decay {decay} outside (0, 1]"))
            }
            EpsilonSchedule::Linear { step, .. } if step < 0.0 => invalid("epsilon step must be non-negative".into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn presets_are_valid() {
        Config::tabular().validate().unwrap();
        Config::approximate().validate().unwrap();
        assert_eq!(Config::tabular().game.action_set.len(), 4);
        assert_eq!(Config::approximate().game.action_set.len(), 3);
    }

    #[test]
    fn rejects_misaligned_board() {
        let mut cfg = Config::tabular();
        cfg.game.width = 610;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_board_beyond_i32() {
        let mut cfg = Config::tabular();
        cfg.game.width = 4_000_000_000;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        assert!(crate::game::GridWorld::new(cfg.game.clone()).is_err());

        let mut cfg = Config::tabular();
        cfg.game.width = 2_000_000_000;
        cfg.game.height = 2_000_000_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_batch_larger_than_capacity() {
        let mut cfg = Config::tabular();
        cfg.trainer.batch_size = cfg.trainer.replay_capacity + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn multiplicative_schedule_is_monotone_and_floored() {
        let s = EpsilonSchedule::Multiplicative { start: 1.0, min: 0.1, decay: 0.5 };
        let mut eps = s.start();
        let mut prev = eps;
        for ep in 1..20 {
            eps = s.next(eps, ep);
            assert!(eps <= prev);
            assert!(eps >= 0.1);
            prev = eps;
        }
        assert_eq!(eps, 0.1);
    }

    #[test]
    fn linear_schedule_reaches_min() {
        let s = EpsilonSchedule::Linear { start: 0.8, min: 0.0, step: 0.01 };
        let mut eps = s.start();
        for ep in 1..=100 {
            let next = s.next(eps, ep);
            assert!(next <= eps);
            eps = next;
        }
        assert_eq!(eps, 0.0);
    }

    #[test]
    fn approximate_preset_stops_exploring_after_eighty_episodes() {
        let s = Config::approximate().exploration;
        let mut eps = s.start();
        for ep in 1..=79 {
            eps = s.next(eps, ep);
            assert!(eps > 0.0);
        }
        assert!(s.next(eps, 80) < 1e-6);
        assert_eq!(s.next(eps, 81), 0.0);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{ "backend": "approximate", "trainer": {{ "episodes": 5 }}, "exploration": {{ "kind": "linear", "start": 0.5, "min": 0.0, "step": 0.1 }} }}"#).unwrap();
        let cfg = Config::from_file(f.path()).unwrap();
        assert_eq!(cfg.backend, Backend::Approximate);
        assert_eq!(cfg.trainer.episodes, Some(5));
        assert_eq!(cfg.trainer.batch_size, TrainerConfig::default().batch_size);
        assert_eq!(cfg.game.width, 600);
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let err = Config::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
