use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cell::Cell;

/// Moderation policy for a document.
///
/// `Open` applies first edits directly and queues the rest, `RequestOnly`
/// queues every edit for review, `Locked` refuses edits entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Open,
    RequestOnly,
    Locked,
}

impl DocumentStatus {
    pub const ALL: &[DocumentStatus] = &[
        DocumentStatus::Open,
        DocumentStatus::RequestOnly,
        DocumentStatus::Locked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Open => "open",
            DocumentStatus::RequestOnly => "request_only",
            DocumentStatus::Locked => "locked",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentStatus::Open => "Open",
            DocumentStatus::RequestOnly => "Request Only",
            DocumentStatus::Locked => "Locked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(DocumentStatus::Open),
            "request_only" => Some(DocumentStatus::RequestOnly),
            "locked" => Some(DocumentStatus::Locked),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One revision of a tabular document. Replacing a document's content
/// creates a new revision; `replaces_id` points at the chain root and
/// `current` marks the revision lookups resolve to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub status: DocumentStatus,
    pub replaces_id: Option<String>,
    pub current: bool,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// The stable id of the revision chain, usable in URLs across revisions.
    pub fn chain_id(&self) -> &str {
        self.replaces_id.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocument {
    pub name: String,
    pub status: DocumentStatus,
    /// Row-major cell values.
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceDocument {
    pub rows: Vec<Vec<String>>,
}

/// A document plus everything the viewer needs to render it: the cells in
/// document order and the ids of cells with pending requests or applied
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDetail {
    pub document: Document,
    pub cells: Vec<Cell>,
    pub pending_cells: Vec<String>,
    pub changed_cells: Vec<String>,
}
