use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed edit awaiting reviewer resolution. `old_value` is captured
/// from the target cell at creation time so a revoke or delete can restore
/// it later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: String,
    pub cell_id: String,
    pub author: String,
    pub new_value: String,
    pub old_value: String,
    pub status: RequestStatus,
    pub created_on: DateTime<Utc>,
    pub reviewed_on: Option<DateTime<Utc>>,
}

/// Body returned when a submitted edit is applied (201) or queued (202).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub new_value: String,
}

/// Body returned when a pending request is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptReceipt {
    pub new_value: String,
}

/// Body returned when a pending request is revoked. `other_requests`
/// reports whether further pending requests remain for the same cell, so
/// the client knows whether to keep the pending badge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeReceipt {
    pub old_value: String,
    pub other_requests: bool,
}

/// Body returned when an applied value is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteValueReceipt {
    pub old_value: String,
}
