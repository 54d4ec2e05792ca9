//! Reinforcement-learning snake: a grid simulation, state encoders, a replay
//! buffer, lookup-table and network action-value estimators, and the
//! epsilon-greedy trainer that ties them together.

pub mod border;
pub mod config;
pub mod db;
pub mod error;
pub mod estimator;
pub mod food;
pub mod game;
pub mod game_input;
pub mod log;
pub mod network;
pub mod q_table;
pub mod render;
pub mod replay_buffer;
pub mod snake;
pub mod train;
pub mod utils;

pub use config::{Backend, Config};
pub use estimator::ActionValueEstimator;
pub use game::{Action, GridWorld, WorldState};
pub use network::ApproximateEstimator;
pub use q_table::TabularEstimator;
pub use train::{Trainer, evaluate};
