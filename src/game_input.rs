//! Turns a world snapshot into learner input: a feature vector for the
//! network, or a small integer key for the lookup table.
//!
//! Feature layout (continuous):
//! `[danger straight, danger right, danger left, heading one-hot (up, down, left, right), food...]`
//! where `food` is four flags `(left, right, up, down)` or two offsets `(dx, dy)`.

use serde::{Deserialize, Serialize};

use crate::config::{EncoderConfig, FoodEncoding};
use crate::game::WorldState;

pub const DANGER_FEATURES: usize = 3;
pub const HEADING_FEATURES: usize = 4;

/// Discrete table key:
/// `[danger straight, danger right, danger left, heading, food0, food1, food2, food3]`.
/// With offset encoding `food0`/`food1` hold the x/y buckets and the rest are 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey(pub [u8; 8]);

#[derive(Debug, Clone, PartialEq)]
pub struct StateEncoder {
    food_encoding: FoodEncoding,
    resolution: u32,
}

impl StateEncoder {
    pub fn new(cfg: &EncoderConfig) -> Self {
        Self { food_encoding: cfg.food_encoding, resolution: cfg.resolution.max(1) }
    }

    pub fn food_encoding(&self) -> FoodEncoding {
        self.food_encoding
    }

    /// Length of [`StateEncoder::features`].
    pub fn feature_len(&self) -> usize {
        DANGER_FEATURES
            + HEADING_FEATURES
            + match self.food_encoding {
                FoodEncoding::Flags => 4,
                FoodEncoding::Offsets => 2,
            }
    }

    /// Collision flags for moving straight, turning right, turning left.
    pub fn dangers(state: &WorldState) -> [bool; 3] {
        let head = state.head();
        let d = state.direction;
        [d, d.right(), d.left()].map(|dir| state.is_collision(head.offset(dir.delta(), state.cell)))
    }

    /// Food left, right, up, down of the head.
    pub fn food_flags(state: &WorldState) -> [bool; 4] {
        let (head, food) = (state.head(), state.food);
        [food.x < head.x, food.x > head.x, food.y < head.y, food.y > head.y]
    }

    /// Food offset normalised by board size, each in `(-1, 1)`.
    pub fn food_offsets(state: &WorldState) -> (f32, f32) {
        let (head, food) = (state.head(), state.food);
        (
            (food.x - head.x) as f32 / state.width as f32,
            (food.y - head.y) as f32 / state.height as f32,
        )
    }

    /// `floor((value + 1) * K / 2)`, clamped to `0..=K`.
    pub fn bucket(&self, value: f32) -> u8 {
        let k = self.resolution as f32;
        ((value + 1.0) * k / 2.0).floor().clamp(0.0, k) as u8
    }

    pub fn features(&self, state: &WorldState) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.feature_len());
        out.extend(Self::dangers(state).map(flag));
        let mut heading = [0.0; HEADING_FEATURES];
        heading[state.direction.index()] = 1.0;
        out.extend(heading);
        match self.food_encoding {
            FoodEncoding::Flags => out.extend(Self::food_flags(state).map(flag)),
            FoodEncoding::Offsets => {
                let (dx, dy) = Self::food_offsets(state);
                out.extend([dx, dy]);
            }
        }
        out
    }

    pub fn key(&self, state: &WorldState) -> StateKey {
        let [s, r, l] = Self::dangers(state).map(u8::from);
        let food = match self.food_encoding {
            FoodEncoding::Flags => Self::food_flags(state).map(u8::from),
            FoodEncoding::Offsets => {
                let (dx, dy) = Self::food_offsets(state);
                [self.bucket(dx), self.bucket(dy), 0, 0]
            }
        };
        StateKey([s, r, l, state.direction.index() as u8, food[0], food[1], food[2], food[3]])
    }
}

fn flag(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

/// An encoded state an estimator can consume.
pub trait Observation: Clone + Send + Sync {
    fn observe(encoder: &StateEncoder, state: &WorldState) -> Self;
}

impl Observation for Vec<f32> {
    fn observe(encoder: &StateEncoder, state: &WorldState) -> Self {
        encoder.features(state)
    }
}

impl Observation for StateKey {
    fn observe(encoder: &StateEncoder, state: &WorldState) -> Self {
        encoder.key(state)
    }
}
