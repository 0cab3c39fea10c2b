//! Epoch-numbered policy snapshots on disk.
//!
//! Files are named `<prefix>_<epoch>.ot` and written with
//! [`VarStore::save`](tch::nn::VarStore::save). The latest checkpoint is the
//! one with the highest epoch number, so `policy_10.ot` wins over
//! `policy_9.ot`.

use std::fs;
use std::path::{Path, PathBuf};

use tch::nn::VarStore;
use thiserror::Error;
use tracing::info;

/// Errors raised while saving or discovering checkpoints.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("No checkpoint matching '{prefix}_<epoch>.ot' in {}", dir.display())]
    NotFound { dir: PathBuf, prefix: String },

    #[error("Invalid checkpoint pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tensor(#[from] tch::TchError),
}

/// A directory of checkpoints sharing one file prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointStore {
    dir: PathBuf,
    prefix: String,
}

impl CheckpointStore {
    pub const EXTENSION: &'static str = "ot";

    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path of the checkpoint for `epoch`.
    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.dir
            .join(format!("{}_{}.{}", self.prefix, epoch, Self::EXTENSION))
    }

    /// Writes `vs` as the checkpoint for `epoch`, creating the directory if
    /// needed.
    pub fn save(&self, vs: &VarStore, epoch: usize) -> Result<PathBuf, CheckpointError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(epoch);
        vs.save(&path)?;
        info!(epoch, path = %path.display(), "checkpoint saved");
        Ok(path)
    }

    /// Every checkpoint in the directory as `(epoch, path)`, ascending by
    /// epoch. Files whose suffix is not a number are ignored.
    pub fn list(&self) -> Result<Vec<(usize, PathBuf)>, CheckpointError> {
        let pattern = format!(
            "{}/{}_*.{}",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            glob::Pattern::escape(&self.prefix),
            Self::EXTENSION
        );

        let mut found = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry.map_err(glob::GlobError::into_error)?;
            if let Some(epoch) = self.epoch_of(&path) {
                found.push((epoch, path));
            }
        }
        found.sort_by_key(|(epoch, _)| *epoch);
        Ok(found)
    }

    /// The checkpoint with the highest epoch number.
    pub fn latest(&self) -> Result<(usize, PathBuf), CheckpointError> {
        self.list()?
            .into_iter()
            .next_back()
            .ok_or_else(|| CheckpointError::NotFound {
                dir: self.dir.clone(),
                prefix: self.prefix.clone(),
            })
    }

    /// Loads the latest checkpoint into `vs` and returns its epoch.
    pub fn load_latest(&self, vs: &mut VarStore) -> Result<usize, CheckpointError> {
        let (epoch, path) = self.latest()?;
        vs.load(&path)?;
        info!(epoch, path = %path.display(), "checkpoint loaded");
        Ok(epoch)
    }

    fn epoch_of(&self, path: &Path) -> Option<usize> {
        path.file_stem()?
            .to_str()?
            .strip_prefix(&self.prefix)?
            .strip_prefix('_')?
            .parse()
            .ok()
    }
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new("models", "trained_policy")
    }
}
