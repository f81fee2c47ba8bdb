use serde::{Deserialize, Serialize};

/// A user-facing notification pushed by the server alongside a JSON payload.
///
/// `extra_tags` carries the severity class ("success", "info", "warning",
/// "danger") the client uses to style the notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub message: String,
    pub extra_tags: String,
}

impl ServerMessage {
    pub fn new(message: impl Into<String>, extra_tags: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extra_tags: extra_tags.into(),
        }
    }
}
