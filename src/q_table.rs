//! Lookup-table action values with the TD(0) rule.
//!
//! Rows are created lazily, zero-filled, the first time a state is updated.
//! The table only grows within a run. With `max_states` set, updates for
//! unseen states are refused once the cap is reached instead of evicting.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LearnerConfig;
use crate::db;
use crate::error::PersistenceError;
use crate::estimator::{ActionValueEstimator, bellman_target};
use crate::game::Action;
use crate::game_input::StateKey;
use crate::replay_buffer::Transition;

#[derive(Debug, Clone, PartialEq)]
pub struct TabularEstimator {
    table: HashMap<StateKey, Vec<f32>>,
    actions: usize,
    alpha: f32,
    gamma: f32,
    max_states: Option<usize>,
    rejected: u64,
}

/// On-disk form: rows sorted by key so equal tables give equal files.
#[derive(Serialize, Deserialize)]
struct TableCheckpoint {
    actions: usize,
    rows: Vec<(StateKey, Vec<f32>)>,
}

impl TabularEstimator {
    pub fn new(actions: usize, learner: &LearnerConfig) -> Self {
        Self {
            table: HashMap::new(),
            actions,
            alpha: learner.learning_rate,
            gamma: learner.gamma,
            max_states: learner.max_states,
            rejected: 0,
        }
    }

    /// Number of states with a row.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn row(&self, key: &StateKey) -> Option<&[f32]> {
        self.table.get(key).map(Vec::as_slice)
    }

    /// Updates refused because the state cap was reached.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// `Q[s,a] += alpha * (target - Q[s,a])`; returns the TD error, or `None`
    /// when the action is out of range or the state is new and the table is full.
    pub fn learn(&mut self, state: &StateKey, action: Action, reward: f32, next: &StateKey, done: bool) -> Option<f32> {
        if action.0 >= self.actions {
            debug!(action = action.0, actions = self.actions, "action out of range, update skipped");
            return None;
        }
        let target = bellman_target(reward, &self.estimate(next), done, self.gamma);
        if !self.table.contains_key(state) && self.max_states.is_some_and(|cap| self.table.len() >= cap) {
            self.rejected += 1;
            debug!(?state, rejected = self.rejected, "table full, update refused");
            return None;
        }
        let row = self.table.entry(*state).or_insert_with(|| vec![0.0; self.actions]);
        let q = row.get_mut(action.0)?;
        let td = target - *q;
        *q += self.alpha * td;
        Some(td)
    }
}

impl ActionValueEstimator for TabularEstimator {
    type State = StateKey;

    fn action_count(&self) -> usize {
        self.actions
    }

    fn estimate(&self, state: &StateKey) -> Vec<f32> {
        self.table.get(state).cloned().unwrap_or_else(|| vec![0.0; self.actions])
    }

    fn update(&mut self, batch: &[&Transition<StateKey>]) -> f32 {
        let mut sq = 0.0;
        let mut n = 0usize;
        for t in batch {
            if let Some(td) = self.learn(&t.state, t.action, t.reward, &t.next_state, t.done) {
                sq += td * td;
                n += 1;
            }
        }
        if n == 0 { 0.0 } else { sq / n as f32 }
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.actions == other.actions
    }

    fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let mut rows: Vec<(StateKey, Vec<f32>)> = self.table.iter().map(|(k, v)| (*k, v.clone())).collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        db::save_checkpoint(path, &TableCheckpoint { actions: self.actions, rows })
    }

    fn load(path: &Path, learner: &LearnerConfig) -> Result<Self, PersistenceError> {
        let ckpt: TableCheckpoint = db::load_checkpoint(path)?;
        if ckpt.actions == 0 {
            return Err(PersistenceError::Shape("table with zero actions".into()));
        }
        if let Some((key, row)) = ckpt.rows.iter().find(|(_, row)| row.len() != ckpt.actions) {
            return Err(PersistenceError::Shape(format!(
                "row {key:?} has {} values, expected {}",
                row.len(),
                ckpt.actions
            )));
        }
        let mut est = TabularEstimator::new(ckpt.actions, learner);
        est.table = ckpt.rows.into_iter().collect();
        Ok(est)
    }
}
