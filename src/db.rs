//! Estimator checkpoints (JSON) and the per-episode history (SQLite).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::LearnerConfig;
use crate::error::{HistoryError, PersistenceError};
use crate::estimator::ActionValueEstimator;
use crate::train::EpisodeReport;

/// Writes `value` as JSON next to `path`, then renames over it.
pub fn save_checkpoint<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let json = serde_json::to_vec(value).map_err(|source| PersistenceError::Json { path: path.to_path_buf(), source })?;
    let tmp = tmp_path(path);
    fs::write(&tmp, json).map_err(io_error(&tmp))?;
    fs::rename(&tmp, path).map_err(io_error(path))
}

pub fn load_checkpoint<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let bytes = fs::read(path).map_err(|source| PersistenceError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Json { path: path.to_path_buf(), source })
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError {
    let path = path.to_path_buf();
    move |source| PersistenceError::Io { path, source }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Loads a saved estimator, or returns `fresh` when the file is missing,
/// unreadable, or shaped for a different setup.
pub fn load_or_fresh<E: ActionValueEstimator>(path: &Path, learner: &LearnerConfig, fresh: E) -> E {
    match E::load(path, learner) {
        Ok(loaded) if loaded.same_shape(&fresh) => {
            info!(path = %path.display(), "loaded estimator checkpoint");
            loaded
        }
        Ok(_) => {
            warn!(path = %path.display(), "checkpoint does not match the configured estimator; starting fresh");
            fresh
        }
        Err(PersistenceError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no checkpoint yet; starting fresh");
            fresh
        }
        Err(e) => {
            warn!(error = %e, "could not load checkpoint; starting fresh");
            fresh
        }
    }
}

/// One stored episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRow {
    pub episode: u64,
    pub score: u32,
    pub record: u32,
    pub steps: u64,
    pub epsilon: f64,
    pub mean_score: f64,
    pub loss: Option<f64>,
    pub end_reason: Option<String>,
    pub recorded_at: String,
}

/// Append-only log of finished episodes.
pub struct History {
    conn: Connection,
}

impl History {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, HistoryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS episodes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                episode     INTEGER NOT NULL,
                score       INTEGER NOT NULL,
                record      INTEGER NOT NULL,
                steps       INTEGER NOT NULL,
                epsilon     REAL    NOT NULL,
                mean_score  REAL    NOT NULL,
                loss        REAL,
                end_reason  TEXT,
                recorded_at TEXT    NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    pub fn record(&self, report: &EpisodeReport) -> Result<(), HistoryError> {
        self.conn.execute(
            "INSERT INTO episodes (episode, score, record, steps, epsilon, mean_score, loss, end_reason, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                report.episode as i64,
                report.score,
                report.record,
                report.steps as i64,
                report.epsilon as f64,
                report.mean_score as f64,
                report.loss.map(f64::from),
                report.end.map(|e| e.as_str()),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn best_score(&self) -> Result<Option<u32>, HistoryError> {
        Ok(self.conn.query_row("SELECT MAX(score) FROM episodes", [], |r| r.get(0))?)
    }

    pub fn count(&self) -> Result<u64, HistoryError> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM episodes", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<EpisodeRow>, HistoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT episode, score, record, steps, epsilon, mean_score, loss, end_reason, recorded_at
             FROM episodes ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |r| {
            Ok(EpisodeRow {
                episode: r.get::<_, i64>(0)? as u64,
                score: r.get(1)?,
                record: r.get(2)?,
                steps: r.get::<_, i64>(3)? as u64,
                epsilon: r.get(4)?,
                mean_score: r.get(5)?,
                loss: r.get(6)?,
                end_reason: r.get(7)?,
                recorded_at: r.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
