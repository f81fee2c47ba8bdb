use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-built descriptor of the floating panel for one cell.
///
/// Which controls are present is decided entirely server-side: a cell may
/// offer an edit form, review controls for pending requests, a delete
/// action for an applied value, or any combination. The client renders
/// whatever is present and must not assume a particular set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopoverPanel {
    pub cell_id: String,
    pub edit_form: Option<EditForm>,
    pub requests: Vec<RequestSummary>,
    pub delete_action: Option<String>,
}

impl PopoverPanel {
    pub fn has_controls(&self) -> bool {
        self.edit_form.is_some() || !self.requests.is_empty() || self.delete_action.is_some()
    }
}

/// Edit form fragment: the client serializes its input and posts it to
/// `action_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditForm {
    pub action_url: String,
    /// Value currently displayed in the cell, shown as a placeholder.
    pub initial_value: String,
}

/// One pending change request listed in the review section of the panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: String,
    pub new_value: String,
    pub author: String,
    pub created_on: DateTime<Utc>,
}
