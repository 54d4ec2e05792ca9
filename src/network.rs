//! Two-layer ReLU network used as the approximate action-value estimator.
//!
//! `f(x) = W2 · relu(W1 · x + b1) + b2`, trained by one gradient-descent step
//! per batch on the mean squared Bellman error. Targets are computed with the
//! same parameters that are being trained; there is no frozen target network,
//! so learning can oscillate on long runs.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::LearnerConfig;
use crate::db;
use crate::error::PersistenceError;
use crate::estimator::{ActionValueEstimator, bellman_target};
use crate::log;
use crate::replay_buffer::Transition;
use crate::utils::{has_non_finite, vec_stats};

/// Transitions per rayon work item when accumulating gradients.
const GRAD_CHUNK: usize = 64;

fn relu(x: f32) -> f32 {
    x.max(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub input_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
    /// hidden x input
    pub w1: Vec<Vec<f32>>,
    pub b1: Vec<f32>,
    /// output x hidden
    pub w2: Vec<Vec<f32>>,
    pub b2: Vec<f32>,
}

/// Gradients with the same layout as [`Network`].
#[derive(Debug, Clone, PartialEq)]
struct Gradients {
    w1: Vec<Vec<f32>>,
    b1: Vec<f32>,
    w2: Vec<Vec<f32>>,
    b2: Vec<f32>,
}

impl Gradients {
    fn zeros(net: &Network) -> Self {
        Self {
            w1: vec![vec![0.0; net.input_size]; net.hidden_size],
            b1: vec![0.0; net.hidden_size],
            w2: vec![vec![0.0; net.hidden_size]; net.output_size],
            b2: vec![0.0; net.output_size],
        }
    }

    fn add(&mut self, other: &Gradients) {
        fn add_rows(a: &mut [Vec<f32>], b: &[Vec<f32>]) {
            for (ra, rb) in a.iter_mut().zip(b) {
                add_vec(ra, rb);
            }
        }
        fn add_vec(a: &mut [f32], b: &[f32]) {
            for (x, y) in a.iter_mut().zip(b) {
                *x += y;
            }
        }
        add_rows(&mut self.w1, &other.w1);
        add_vec(&mut self.b1, &other.b1);
        add_rows(&mut self.w2, &other.w2);
        add_vec(&mut self.b2, &other.b2);
    }

    fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.w1
            .iter()
            .flatten()
            .chain(&self.b1)
            .chain(self.w2.iter().flatten())
            .chain(&self.b2)
            .copied()
    }

    fn l2_norm(&self) -> f32 {
        self.values().map(|g| g * g).sum::<f32>().sqrt()
    }
}

impl Network {
    /// Uniform init in `±1/sqrt(fan_in)` per layer.
    pub fn new(input: usize, hidden: usize, output: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut layer = |rows: usize, cols: usize| {
            let bound = 1.0 / (cols.max(1) as f32).sqrt();
            let w: Vec<Vec<f32>> =
                (0..rows).map(|_| (0..cols).map(|_| rng.gen_range(-bound..bound)).collect()).collect();
            let b: Vec<f32> = (0..rows).map(|_| rng.gen_range(-bound..bound)).collect();
            (w, b)
        };
        let (w1, b1) = layer(hidden, input);
        let (w2, b2) = layer(output, hidden);
        Self { input_size: input, hidden_size: hidden, output_size: output, w1, b1, w2, b2 }
    }

    fn hidden_pre(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.input_size);
        self.w1
            .iter()
            .zip(&self.b1)
            .map(|(row, b)| b + row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>())
            .collect()
    }

    fn output(&self, hidden: &[f32]) -> Vec<f32> {
        self.w2
            .iter()
            .zip(&self.b2)
            .map(|(row, b)| b + row.iter().zip(hidden).map(|(w, h)| w * h).sum::<f32>())
            .collect()
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let hidden: Vec<f32> = self.hidden_pre(input).into_iter().map(relu).collect();
        self.output(&hidden)
    }

    /// Adds the gradient of `scale * (f(x)[action] - target)^2` to `grads`;
    /// returns the squared error.
    fn accumulate(&self, input: &[f32], action: usize, target: f32, scale: f32, grads: &mut Gradients) -> f32 {
        let pre = self.hidden_pre(input);
        let hidden: Vec<f32> = pre.iter().copied().map(relu).collect();
        let out = self.output(&hidden);
        let Some(&pred) = out.get(action) else {
            return 0.0;
        };
        let err = pred - target;
        let g_out = 2.0 * err * scale;

        grads.b2[action] += g_out;
        for (j, h) in hidden.iter().enumerate() {
            grads.w2[action][j] += g_out * h;
            if pre[j] > 0.0 {
                let g_pre = g_out * self.w2[action][j];
                grads.b1[j] += g_pre;
                for (g, x) in grads.w1[j].iter_mut().zip(input) {
                    *g += g_pre * x;
                }
            }
        }
        err * err
    }

    fn apply(&mut self, grads: &Gradients, step: f32) {
        for (row, g) in self.w1.iter_mut().zip(&grads.w1) {
            for (w, g) in row.iter_mut().zip(g) {
                *w -= step * g;
            }
        }
        for (b, g) in self.b1.iter_mut().zip(&grads.b1) {
            *b -= step * g;
        }
        for (row, g) in self.w2.iter_mut().zip(&grads.w2) {
            for (w, g) in row.iter_mut().zip(g) {
                *w -= step * g;
            }
        }
        for (b, g) in self.b2.iter_mut().zip(&grads.b2) {
            *b -= step * g;
        }
    }

    fn shape_error(&self) -> Option<String> {
        let rows_ok = |m: &[Vec<f32>], rows: usize, cols: usize| m.len() == rows && m.iter().all(|r| r.len() == cols);
        if self.input_size == 0 || self.hidden_size == 0 || self.output_size == 0 {
            return Some("zero-sized layer".into());
        }
        if !rows_ok(&self.w1, self.hidden_size, self.input_size) || self.b1.len() != self.hidden_size {
            return Some(format!("first layer is not {}x{}", self.hidden_size, self.input_size));
        }
        if !rows_ok(&self.w2, self.output_size, self.hidden_size) || self.b2.len() != self.output_size {
            return Some(format!("second layer is not {}x{}", self.output_size, self.hidden_size));
        }
        None
    }
}

pub struct ApproximateEstimator {
    net: Network,
    gamma: f32,
    lr: f32,
    max_grad_norm: Option<f32>,
    pub last_loss: f32,
    pub updates: u64,
}

impl ApproximateEstimator {
    pub fn new(input: usize, actions: usize, learner: &LearnerConfig) -> Self {
        Self::from_network(Network::new(input, learner.hidden, actions, learner.seed), learner)
    }

    pub fn from_network(net: Network, learner: &LearnerConfig) -> Self {
        Self {
            net,
            gamma: learner.gamma,
            lr: learner.learning_rate,
            max_grad_norm: learner.max_grad_norm,
            last_loss: 0.0,
            updates: 0,
        }
    }

    pub fn network(&self) -> &Network {
        &self.net
    }

    pub fn input_size(&self) -> usize {
        self.net.input_size
    }
}

impl ActionValueEstimator for ApproximateEstimator {
    type State = Vec<f32>;

    fn action_count(&self) -> usize {
        self.net.output_size
    }

    fn input_len(&self) -> Option<usize> {
        Some(self.net.input_size)
    }

    fn estimate(&self, state: &Vec<f32>) -> Vec<f32> {
        self.net.forward(state)
    }

    fn update(&mut self, batch: &[&Transition<Vec<f32>>]) -> f32 {
        if batch.is_empty() {
            return 0.0;
        }
        let net = &self.net;
        let gamma = self.gamma;

        // bootstrapped from the live parameters
        let targets: Vec<f32> = batch
            .par_iter()
            .map(|t| bellman_target(t.reward, &net.forward(&t.next_state), t.done, gamma))
            .collect();
        if has_non_finite(&targets) {
            error!("non-finite Bellman target; skipping update");
            return f32::NAN;
        }

        let scale = 1.0 / batch.len() as f32;
        // fixed chunking and in-order reduction keep results independent of thread count
        let partials: Vec<(Gradients, f32)> = batch
            .par_chunks(GRAD_CHUNK)
            .zip(targets.par_chunks(GRAD_CHUNK))
            .map(|(ts, ys)| {
                let mut g = Gradients::zeros(net);
                let sq: f32 = ts.iter().zip(ys).map(|(t, &y)| net.accumulate(&t.state, t.action.0, y, scale, &mut g)).sum();
                (g, sq)
            })
            .collect();

        let mut grads = Gradients::zeros(net);
        let mut loss = 0.0;
        for (g, sq) in &partials {
            grads.add(g);
            loss += sq;
        }
        loss *= scale;

        let norm = grads.l2_norm();
        if !loss.is_finite() || !norm.is_finite() {
            error!(loss, grad_norm = norm, "non-finite loss or gradient; skipping update");
            return loss;
        }
        let clip = match self.max_grad_norm {
            Some(max) if norm > max && norm > 0.0 => max / norm,
            _ => 1.0,
        };
        self.net.apply(&grads, self.lr * clip);
        self.last_loss = loss;
        self.updates += 1;

        let ys = vec_stats(&targets);
        log::scalar(self.updates, "loss", loss);
        log::scalar(self.updates, "grad_norm", norm);
        log::scalar(self.updates, "target_mean", ys.mean);
        log::scalar(self.updates, "target_min", ys.min);
        log::scalar(self.updates, "target_max", ys.max);
        loss
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.net.input_size == other.net.input_size
            && self.net.hidden_size == other.net.hidden_size
            && self.net.output_size == other.net.output_size
    }

    fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        db::save_checkpoint(path, &self.net)
    }

    fn load(path: &Path, learner: &LearnerConfig) -> Result<Self, PersistenceError> {
        let net: Network = db::load_checkpoint(path)?;
        if let Some(msg) = net.shape_error() {
            return Err(PersistenceError::Shape(msg));
        }
        Ok(Self::from_network(net, learner))
    }
}
