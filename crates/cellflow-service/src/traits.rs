use async_trait::async_trait;
use cellflow_core::change_request::{AcceptReceipt, DeleteValueReceipt, RevokeReceipt};
use cellflow_core::document::{CreateDocument, Document, DocumentDetail};
use cellflow_core::popover::PopoverPanel;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// The server's decision about a submitted edit.
///
/// `Applied` (HTTP 201) means the value was written immediately; `Queued`
/// (HTTP 202) means a change request was created and awaits review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Applied { new_value: String },
    Queued,
}

/// Abstraction over the document and moderation API.
///
/// The TUI programs against this trait; `HttpService` is the reqwest
/// implementation talking to a cellflow-server.
#[async_trait]
pub trait DocumentService: Send + Sync {
    // -- Documents --
    async fn list_documents(&self) -> Result<Vec<Document>, ServiceError>;
    async fn get_document(&self, id: &str) -> Result<DocumentDetail, ServiceError>;
    async fn create_document(&self, input: &CreateDocument) -> Result<Document, ServiceError>;
    async fn replace_document(
        &self,
        id: &str,
        rows: &[Vec<String>],
    ) -> Result<Document, ServiceError>;

    // -- Cell edit session --
    async fn fetch_popover(&self, cell_id: &str) -> Result<PopoverPanel, ServiceError>;
    async fn submit_change(
        &self,
        action_url: &str,
        cell_id: &str,
        new_value: &str,
    ) -> Result<SubmitOutcome, ServiceError>;

    // -- Review actions --
    async fn accept_request(&self, request_id: &str) -> Result<AcceptReceipt, ServiceError>;
    async fn revoke_request(&self, request_id: &str) -> Result<RevokeReceipt, ServiceError>;
    async fn delete_value(&self, action_url: &str) -> Result<DeleteValueReceipt, ServiceError>;
}
