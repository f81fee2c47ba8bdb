use cellflow_core::change_request::{AcceptReceipt, DeleteValueReceipt, RevokeReceipt};
use cellflow_core::document::{CreateDocument, Document, DocumentDetail};
use cellflow_core::message::ServerMessage;
use cellflow_core::popover::PopoverPanel;
use tokio::runtime::Runtime;

use crate::{DocumentService, HttpService, ServiceError, SubmitOutcome};

/// Blocking wrapper around the async `HttpService`.
///
/// Creates an internal tokio runtime and uses `block_on()` for each call.
/// Designed for sync callers like the TUI.
pub struct BlockingHttpService {
    inner: HttpService,
    rt: Runtime,
}

impl BlockingHttpService {
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: HttpService::new(base_url),
            rt: Runtime::new().expect("failed to create tokio runtime"),
        }
    }

    pub fn health_check(&self) -> Result<(), ServiceError> {
        self.rt.block_on(self.inner.health_check())
    }

    pub fn take_messages(&self) -> Vec<ServerMessage> {
        self.inner.take_messages()
    }

    // -- Trait method delegates --

    pub fn list_documents(&self) -> Result<Vec<Document>, ServiceError> {
        self.rt.block_on(self.inner.list_documents())
    }

    pub fn get_document(&self, id: &str) -> Result<DocumentDetail, ServiceError> {
        self.rt.block_on(self.inner.get_document(id))
    }

    pub fn create_document(&self, input: &CreateDocument) -> Result<Document, ServiceError> {
        self.rt.block_on(self.inner.create_document(input))
    }

    pub fn replace_document(
        &self,
        id: &str,
        rows: &[Vec<String>],
    ) -> Result<Document, ServiceError> {
        self.rt.block_on(self.inner.replace_document(id, rows))
    }

    pub fn fetch_popover(&self, cell_id: &str) -> Result<PopoverPanel, ServiceError> {
        self.rt.block_on(self.inner.fetch_popover(cell_id))
    }

    pub fn submit_change(
        &self,
        action_url: &str,
        cell_id: &str,
        new_value: &str,
    ) -> Result<SubmitOutcome, ServiceError> {
        self.rt
            .block_on(self.inner.submit_change(action_url, cell_id, new_value))
    }

    pub fn accept_request(&self, request_id: &str) -> Result<AcceptReceipt, ServiceError> {
        self.rt.block_on(self.inner.accept_request(request_id))
    }

    pub fn revoke_request(&self, request_id: &str) -> Result<RevokeReceipt, ServiceError> {
        self.rt.block_on(self.inner.revoke_request(request_id))
    }

    pub fn delete_value(&self, action_url: &str) -> Result<DeleteValueReceipt, ServiceError> {
        self.rt.block_on(self.inner.delete_value(action_url))
    }
}
