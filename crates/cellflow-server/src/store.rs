use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use cellflow_core::cell::{coordinate, Cell};
use cellflow_core::change_request::{
    AcceptReceipt, ChangeRequest, DeleteValueReceipt, RequestStatus, RevokeReceipt,
};
use cellflow_core::document::{CreateDocument, Document, DocumentDetail, DocumentStatus};
use cellflow_core::popover::{EditForm, PopoverPanel, RequestSummary};
use cellflow_core::CellflowError;
use chrono::Utc;
use uuid::Uuid;

/// Which HTTP status a submitted edit earns: 201 when applied directly,
/// 202 when queued for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitDecision {
    Applied,
    Queued,
}

#[derive(Default)]
struct StoreInner {
    documents: HashMap<String, Document>,
    cells: HashMap<String, Cell>,
    /// Cell ids per document, in document order.
    doc_cells: HashMap<String, Vec<String>>,
    requests: HashMap<String, ChangeRequest>,
}

/// In-memory document, cell and change-request state.
///
/// The moderation rules live here: an `Open` document applies the first
/// edit against a fresh cell directly and queues everything after it; a
/// `RequestOnly` document queues every edit; a `Locked` document refuses.
/// Accepting a request declines all other pending requests for the cell.
#[derive(Default)]
pub struct Store {
    inner: Mutex<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    pub fn create_document(&self, input: &CreateDocument) -> Document {
        let mut inner = self.lock();
        let document = Document {
            id: Uuid::new_v4().to_string(),
            name: input.name.clone(),
            status: input.status,
            replaces_id: None,
            current: true,
            created_at: Utc::now(),
        };
        insert_cells(&mut inner, &document.id, &input.rows);
        inner
            .documents
            .insert(document.id.clone(), document.clone());
        document
    }

    /// Create a new current revision of a document chain. The previous
    /// revision keeps its cells and history but stops resolving.
    pub fn replace_document(
        &self,
        id: &str,
        rows: &[Vec<String>],
    ) -> Result<Document, CellflowError> {
        let mut inner = self.lock();
        let old = current_of(&inner, id)
            .cloned()
            .ok_or_else(|| CellflowError::NotFound(format!("document {id}")))?;
        let chain_root = old.chain_id().to_string();

        if let Some(doc) = inner.documents.get_mut(&old.id) {
            doc.current = false;
        }

        let document = Document {
            id: Uuid::new_v4().to_string(),
            name: old.name,
            status: old.status,
            replaces_id: Some(chain_root),
            current: true,
            created_at: Utc::now(),
        };
        insert_cells(&mut inner, &document.id, rows);
        inner
            .documents
            .insert(document.id.clone(), document.clone());
        Ok(document)
    }

    pub fn list_current(&self) -> Vec<Document> {
        let inner = self.lock();
        let mut docs: Vec<Document> = inner
            .documents
            .values()
            .filter(|d| d.current)
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        docs
    }

    pub fn get_detail(&self, id: &str) -> Result<DocumentDetail, CellflowError> {
        let inner = self.lock();
        let document = current_of(&inner, id)
            .cloned()
            .ok_or_else(|| CellflowError::NotFound(format!("document {id}")))?;

        let cell_ids = inner
            .doc_cells
            .get(&document.id)
            .cloned()
            .unwrap_or_default();
        let cells: Vec<Cell> = cell_ids
            .iter()
            .filter_map(|id| inner.cells.get(id))
            .cloned()
            .collect();

        let mut pending_cells = Vec::new();
        let mut changed_cells = Vec::new();
        for request in inner.requests.values() {
            if !cell_ids.iter().any(|id| *id == request.cell_id) {
                continue;
            }
            let bucket = match request.status {
                RequestStatus::Pending => &mut pending_cells,
                RequestStatus::Accepted => &mut changed_cells,
                RequestStatus::Declined => continue,
            };
            if !bucket.contains(&request.cell_id) {
                bucket.push(request.cell_id.clone());
            }
        }

        Ok(DocumentDetail {
            document,
            cells,
            pending_cells,
            changed_cells,
        })
    }

    /// Build the panel descriptor for a cell. The control set is decided
    /// here and nowhere else: an edit form unless the document is locked,
    /// review entries for each pending request, a delete action once a
    /// request has been applied.
    pub fn popover(&self, cell_id: &str) -> Result<PopoverPanel, CellflowError> {
        let inner = self.lock();
        let cell = inner
            .cells
            .get(cell_id)
            .ok_or_else(|| CellflowError::NotFound(format!("cell {cell_id}")))?;
        let document = inner
            .documents
            .get(&cell.document_id)
            .ok_or_else(|| CellflowError::NotFound(format!("document {}", cell.document_id)))?;

        let mut pending: Vec<&ChangeRequest> = inner
            .requests
            .values()
            .filter(|r| r.cell_id == cell.id && r.status == RequestStatus::Pending)
            .collect();
        pending.sort_by(|a, b| a.created_on.cmp(&b.created_on));
        let requests = pending
            .into_iter()
            .map(|r| RequestSummary {
                id: r.id.clone(),
                new_value: r.new_value.clone(),
                author: r.author.clone(),
                created_on: r.created_on,
            })
            .collect();

        let edit_form = if document.status == DocumentStatus::Locked {
            None
        } else {
            Some(EditForm {
                action_url: "/api/change-requests/".to_string(),
                initial_value: cell.value.clone(),
            })
        };

        let has_applied = inner
            .requests
            .values()
            .any(|r| r.cell_id == cell.id && r.status == RequestStatus::Accepted);
        let delete_action = has_applied.then(|| format!("/api/cells/{}/value", cell.id));

        Ok(PopoverPanel {
            cell_id: cell.id.clone(),
            edit_form,
            requests,
            delete_action,
        })
    }

    pub fn create_change_request(
        &self,
        cell_id: &str,
        new_value: &str,
        author: &str,
    ) -> Result<(SubmitDecision, ChangeRequest), CellflowError> {
        if new_value.trim().is_empty() {
            return Err(CellflowError::InvalidInput(
                "new_value must not be empty".to_string(),
            ));
        }

        let mut inner = self.lock();
        let cell = inner
            .cells
            .get(cell_id)
            .cloned()
            .ok_or_else(|| CellflowError::NotFound(format!("cell {cell_id}")))?;
        let status = inner
            .documents
            .get(&cell.document_id)
            .map(|d| d.status)
            .ok_or_else(|| CellflowError::NotFound(format!("document {}", cell.document_id)))?;

        let now = Utc::now();
        let mut request = ChangeRequest {
            id: Uuid::new_v4().to_string(),
            cell_id: cell.id.clone(),
            author: author.to_string(),
            new_value: new_value.to_string(),
            old_value: cell.value.clone(),
            status: RequestStatus::Pending,
            created_on: now,
            reviewed_on: None,
        };

        let decision = match status {
            DocumentStatus::Locked => {
                return Err(CellflowError::Forbidden("document is locked".to_string()));
            }
            DocumentStatus::Open => {
                // A fresh cell on an open document takes the edit directly;
                // any prior request (whatever its state) forces review.
                let has_any = inner.requests.values().any(|r| r.cell_id == cell.id);
                if has_any {
                    SubmitDecision::Queued
                } else {
                    request.status = RequestStatus::Accepted;
                    request.reviewed_on = Some(now);
                    if let Some(target) = inner.cells.get_mut(&cell.id) {
                        target.value = request.new_value.clone();
                    }
                    SubmitDecision::Applied
                }
            }
            DocumentStatus::RequestOnly => SubmitDecision::Queued,
        };

        inner.requests.insert(request.id.clone(), request.clone());
        Ok((decision, request))
    }

    pub fn accept_request(&self, request_id: &str) -> Result<AcceptReceipt, CellflowError> {
        let mut inner = self.lock();
        let request = inner
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| CellflowError::NotFound(format!("change request {request_id}")))?;
        if request.status != RequestStatus::Pending {
            return Err(CellflowError::Forbidden(
                "change request already resolved".to_string(),
            ));
        }
        let doc_status = inner
            .cells
            .get(&request.cell_id)
            .and_then(|c| inner.documents.get(&c.document_id))
            .map(|d| d.status)
            .ok_or_else(|| CellflowError::NotFound(format!("cell {}", request.cell_id)))?;
        if doc_status == DocumentStatus::Locked {
            return Err(CellflowError::Forbidden("document is locked".to_string()));
        }

        let now = Utc::now();
        if let Some(cell) = inner.cells.get_mut(&request.cell_id) {
            cell.value = request.new_value.clone();
        }
        if let Some(stored) = inner.requests.get_mut(request_id) {
            stored.status = RequestStatus::Accepted;
            stored.reviewed_on = Some(now);
        }
        // Accepting one request settles the cell; everything else pending
        // against it is declined.
        for other in inner.requests.values_mut() {
            if other.cell_id == request.cell_id
                && other.id != request.id
                && other.status == RequestStatus::Pending
            {
                other.status = RequestStatus::Declined;
                other.reviewed_on = Some(now);
            }
        }

        Ok(AcceptReceipt {
            new_value: request.new_value,
        })
    }

    pub fn revoke_request(&self, request_id: &str) -> Result<RevokeReceipt, CellflowError> {
        let mut inner = self.lock();
        let request = inner
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| CellflowError::NotFound(format!("change request {request_id}")))?;
        if request.status != RequestStatus::Pending {
            return Err(CellflowError::InvalidInput(
                "only pending requests can be revoked".to_string(),
            ));
        }

        inner.requests.remove(request_id);
        let other_requests = inner
            .requests
            .values()
            .any(|r| r.cell_id == request.cell_id && r.status == RequestStatus::Pending);

        Ok(RevokeReceipt {
            old_value: request.old_value,
            other_requests,
        })
    }

    /// Revert the most recently applied change on a cell, restoring the
    /// value it replaced.
    pub fn delete_value(&self, cell_id: &str) -> Result<DeleteValueReceipt, CellflowError> {
        let mut inner = self.lock();
        let cell = inner
            .cells
            .get(cell_id)
            .cloned()
            .ok_or_else(|| CellflowError::NotFound(format!("cell {cell_id}")))?;
        let doc_status = inner
            .documents
            .get(&cell.document_id)
            .map(|d| d.status)
            .ok_or_else(|| CellflowError::NotFound(format!("document {}", cell.document_id)))?;
        if doc_status == DocumentStatus::Locked {
            return Err(CellflowError::Forbidden("document is locked".to_string()));
        }

        let applied = inner
            .requests
            .values()
            .filter(|r| r.cell_id == cell.id && r.status == RequestStatus::Accepted)
            .max_by_key(|r| r.reviewed_on)
            .cloned()
            .ok_or_else(|| {
                CellflowError::NotFound(format!("no applied value for cell {cell_id}"))
            })?;

        if let Some(target) = inner.cells.get_mut(&cell.id) {
            target.value = applied.old_value.clone();
        }
        inner.requests.remove(&applied.id);

        Ok(DeleteValueReceipt {
            old_value: applied.old_value,
        })
    }
}

fn current_of<'a>(inner: &'a StoreInner, id: &str) -> Option<&'a Document> {
    inner
        .documents
        .values()
        .find(|d| d.current && (d.id == id || d.replaces_id.as_deref() == Some(id)))
}

fn insert_cells(inner: &mut StoreInner, document_id: &str, rows: &[Vec<String>]) {
    let mut ids = Vec::new();
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let cell = Cell {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                row: row_idx as u32,
                column: col_idx as u32,
                coordinate: coordinate(row_idx as u32, col_idx as u32),
                value: value.clone(),
            };
            ids.push(cell.id.clone());
            inner.cells.insert(cell.id.clone(), cell);
        }
    }
    inner.doc_cells.insert(document_id.to_string(), ids);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_doc(store: &Store, status: DocumentStatus) -> (Document, Vec<Cell>) {
        let doc = store.create_document(&CreateDocument {
            name: "sheet".into(),
            status,
            rows: vec![
                vec!["10".into(), "20".into()],
                vec!["30".into(), "40".into()],
            ],
        });
        let detail = store.get_detail(&doc.id).unwrap();
        (doc, detail.cells)
    }

    #[test]
    fn import_assigns_coordinates_in_order() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::Open);
        let coords: Vec<&str> = cells.iter().map(|c| c.coordinate.as_str()).collect();
        assert_eq!(coords, vec!["A1", "B1", "A2", "B2"]);
    }

    #[test]
    fn first_edit_on_open_document_applies() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::Open);
        let (decision, req) = store
            .create_change_request(&cells[0].id, "42", "alice")
            .unwrap();
        assert_eq!(decision, SubmitDecision::Applied);
        assert_eq!(req.old_value, "10");

        let detail = store.get_detail(&cells[0].document_id).unwrap();
        assert_eq!(detail.cells[0].value, "42");
        assert_eq!(detail.changed_cells, vec![cells[0].id.clone()]);
        assert!(detail.pending_cells.is_empty());
    }

    #[test]
    fn second_edit_on_open_document_queues() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::Open);
        store
            .create_change_request(&cells[0].id, "42", "alice")
            .unwrap();
        let (decision, _) = store
            .create_change_request(&cells[0].id, "99", "bob")
            .unwrap();
        assert_eq!(decision, SubmitDecision::Queued);

        // The queued request does not touch the cell value.
        let detail = store.get_detail(&cells[0].document_id).unwrap();
        assert_eq!(detail.cells[0].value, "42");
        assert_eq!(detail.pending_cells, vec![cells[0].id.clone()]);
    }

    #[test]
    fn request_only_document_always_queues() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::RequestOnly);
        let (decision, _) = store
            .create_change_request(&cells[0].id, "42", "alice")
            .unwrap();
        assert_eq!(decision, SubmitDecision::Queued);
        let detail = store.get_detail(&cells[0].document_id).unwrap();
        assert_eq!(detail.cells[0].value, "10");
    }

    #[test]
    fn locked_document_refuses_edits() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::Locked);
        let err = store
            .create_change_request(&cells[0].id, "42", "alice")
            .unwrap_err();
        assert!(matches!(err, CellflowError::Forbidden(_)));
    }

    #[test]
    fn empty_value_is_invalid() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::Open);
        let err = store
            .create_change_request(&cells[0].id, "   ", "alice")
            .unwrap_err();
        assert!(matches!(err, CellflowError::InvalidInput(_)));
    }

    #[test]
    fn accept_applies_value_and_declines_siblings() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::RequestOnly);
        let (_, first) = store
            .create_change_request(&cells[0].id, "42", "alice")
            .unwrap();
        let (_, second) = store
            .create_change_request(&cells[0].id, "99", "bob")
            .unwrap();

        let receipt = store.accept_request(&first.id).unwrap();
        assert_eq!(receipt.new_value, "42");

        let detail = store.get_detail(&cells[0].document_id).unwrap();
        assert_eq!(detail.cells[0].value, "42");
        assert!(detail.pending_cells.is_empty());

        // The sibling was declined, not accepted; accepting it now fails.
        let err = store.accept_request(&second.id).unwrap_err();
        assert!(matches!(err, CellflowError::Forbidden(_)));
    }

    #[test]
    fn revoke_reports_remaining_requests() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::RequestOnly);
        let (_, first) = store
            .create_change_request(&cells[0].id, "42", "alice")
            .unwrap();
        let (_, second) = store
            .create_change_request(&cells[0].id, "99", "bob")
            .unwrap();

        let receipt = store.revoke_request(&first.id).unwrap();
        assert_eq!(receipt.old_value, "10");
        assert!(receipt.other_requests);

        let receipt = store.revoke_request(&second.id).unwrap();
        assert!(!receipt.other_requests);

        let detail = store.get_detail(&cells[0].document_id).unwrap();
        assert!(detail.pending_cells.is_empty());
    }

    #[test]
    fn delete_value_restores_previous_value() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::Open);
        store
            .create_change_request(&cells[0].id, "42", "alice")
            .unwrap();

        let receipt = store.delete_value(&cells[0].id).unwrap();
        assert_eq!(receipt.old_value, "10");

        let detail = store.get_detail(&cells[0].document_id).unwrap();
        assert_eq!(detail.cells[0].value, "10");
        assert!(detail.changed_cells.is_empty());
    }

    #[test]
    fn delete_value_without_applied_change_is_not_found() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::Open);
        let err = store.delete_value(&cells[0].id).unwrap_err();
        assert!(matches!(err, CellflowError::NotFound(_)));
    }

    #[test]
    fn popover_controls_follow_document_state() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::RequestOnly);

        let panel = store.popover(&cells[0].id).unwrap();
        assert!(panel.edit_form.is_some());
        assert!(panel.requests.is_empty());
        assert!(panel.delete_action.is_none());

        store
            .create_change_request(&cells[0].id, "42", "alice")
            .unwrap();
        let panel = store.popover(&cells[0].id).unwrap();
        assert_eq!(panel.requests.len(), 1);
        assert_eq!(panel.requests[0].new_value, "42");
    }

    #[test]
    fn popover_on_locked_document_has_no_edit_form() {
        let store = Store::new();
        let (_, cells) = make_doc(&store, DocumentStatus::Locked);
        let panel = store.popover(&cells[0].id).unwrap();
        assert!(panel.edit_form.is_none());
    }

    #[test]
    fn replace_creates_new_current_revision() {
        let store = Store::new();
        let (doc, _) = make_doc(&store, DocumentStatus::Open);

        let replacement = store
            .replace_document(&doc.id, &[vec!["x".into()]])
            .unwrap();
        assert_eq!(replacement.replaces_id.as_deref(), Some(doc.id.as_str()));

        // The chain id still resolves, now to the replacement.
        let detail = store.get_detail(&doc.id).unwrap();
        assert_eq!(detail.document.id, replacement.id);
        assert_eq!(detail.cells.len(), 1);
        assert_eq!(detail.cells[0].value, "x");

        let current = store.list_current();
        assert_eq!(current.len(), 1);

        // Replacing again keeps the chain rooted at the original id.
        let third = store
            .replace_document(&doc.id, &[vec!["y".into()]])
            .unwrap();
        assert_eq!(third.replaces_id.as_deref(), Some(doc.id.as_str()));
        let detail = store.get_detail(&doc.id).unwrap();
        assert_eq!(detail.cells[0].value, "y");
    }
}
