//! Append-only log of completed exchanges, one JSON object per line.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TRANSCRIPT_FILE: &str = "log.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Unix seconds.
    pub ts: i64,
    pub user: String,
    pub reply: String,
}

#[derive(Debug, Clone)]
pub struct Transcript {
    path: PathBuf,
}

impl Transcript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The transcript file inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(TRANSCRIPT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, user: &str, reply: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entry = TranscriptEntry {
            ts: chrono::Utc::now().timestamp(),
            user: user.to_string(),
            reply: reply.to_string(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
