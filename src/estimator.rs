//! Action-value estimation shared by the lookup-table and network backends.

use std::path::Path;

use crate::config::LearnerConfig;
use crate::error::PersistenceError;
use crate::game::Action;
use crate::game_input::Observation;
use crate::replay_buffer::Transition;
use crate::utils::{argmax, max_value};

pub trait ActionValueEstimator {
    type State: Observation;

    fn action_count(&self) -> usize;

    /// Feature-vector length the estimator expects, when it has a fixed one.
    fn input_len(&self) -> Option<usize> {
        None
    }

    /// One value per action for `state`. Read-only: never grows the estimator.
    fn estimate(&self, state: &Self::State) -> Vec<f32>;

    /// Highest-valued action, lowest index on ties.
    fn best_action(&self, state: &Self::State) -> Action {
        Action(argmax(&self.estimate(state)))
    }

    /// Learns from `batch`; returns the mean squared TD error measured before the update.
    fn update(&mut self, batch: &[&Transition<Self::State>]) -> f32;

    /// Whether `other` has the same layout, e.g. a checkpoint against a fresh estimator.
    fn same_shape(&self, other: &Self) -> bool;

    fn save(&self, path: &Path) -> Result<(), PersistenceError>;

    fn load(path: &Path, learner: &LearnerConfig) -> Result<Self, PersistenceError>
    where
        Self: Sized;
}

/// `reward + gamma * max_a' next_values[a']`, or just `reward` on terminal transitions.
pub fn bellman_target(reward: f32, next_values: &[f32], done: bool, gamma: f32) -> f32 {
    if done { reward } else { reward + gamma * max_value(next_values) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_target_is_reward() {
        assert_eq!(bellman_target(-10.0, &[100.0, 5.0], true, 0.9), -10.0);
    }

    #[test]
    fn bootstrap_uses_best_next_value() {
        let t = bellman_target(1.0, &[0.5, 2.0, -1.0], false, 0.9);
        assert_eq!(t, 1.0 + 0.9 * 2.0);
    }
}
