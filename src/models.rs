//! Core data models used throughout the rulebook pipeline.
//!
//! These types represent the identified games, chunks, chat messages and
//! sidebar notices that flow between intake, indexing and the UI.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A rulebook whose game has been resolved against the catalog.
#[derive(Debug, Clone)]
pub struct IdentifiedRulebook {
    pub catalog_id: String,
    pub title: String,
    pub text: String,
}

/// A window of extracted rulebook text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A vector record as written to or read from the index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub text: String,
}

/// A chunk returned by a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// A question paired with the answer that followed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message shown in the sidebar.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }
}
