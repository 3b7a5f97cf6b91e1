//! Conversation transcript
//!
//! One append-only record per turn, optionally mirrored line by line to a
//! JSONL file while the run is in progress.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::agent::AgentId;
use crate::state::StateDelta;

/// One tool call issued during a turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: Value,
    pub output: String,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnRecord {
    pub turn: u32,
    pub agent: AgentId,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub delta: StateDelta,
    /// At least one tool call failed without ending the run
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub run_id: Uuid,
    records: Vec<TurnRecord>,
}

impl Transcript {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            records: Vec::new(),
        }
    }

    /// Records must arrive in increasing turn order
    pub fn push(&mut self, record: TurnRecord) {
        debug_assert!(self.records.last().map_or(true, |r| r.turn < record.turn));
        self.records.push(record);
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&TurnRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records as JSON lines
    pub fn to_jsonl(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for r in &self.records {
            out.push_str(&serde_json::to_string(r)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Append-only JSONL sink for turn records
pub struct TranscriptLog {
    path: PathBuf,
}

impl TranscriptLog {
    /// `<dir>/<run_id>.jsonl`; the directory is created if missing
    pub async fn create(dir: &Path, run_id: Uuid) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            path: dir.join(format!("{}.jsonl", run_id)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &TurnRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}
