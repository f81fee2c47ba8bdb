//! End-to-end tests driving a spawned server through the HTTP client.

use cellflow_core::document::{CreateDocument, DocumentStatus};
use cellflow_server::test_helpers::{spawn_test_server, TestServer};
use cellflow_service::{DocumentService, HttpService, ServiceError, SubmitOutcome};

async fn setup() -> (TestServer, HttpService) {
    let server = spawn_test_server().await;
    let service = HttpService::new(&server.base_url);
    (server, service)
}

async fn seed_document(service: &HttpService, status: DocumentStatus) -> (String, Vec<String>) {
    let document = service
        .create_document(&CreateDocument {
            name: "quarterly".into(),
            status,
            rows: vec![
                vec!["10".into(), "20".into()],
                vec!["30".into(), "40".into()],
            ],
        })
        .await
        .unwrap();
    let detail = service.get_document(&document.id).await.unwrap();
    let cell_ids = detail.cells.iter().map(|c| c.id.clone()).collect();
    (document.id, cell_ids)
}

#[tokio::test]
async fn health_check_succeeds() {
    let (_server, service) = setup().await;
    service.health_check().await.unwrap();
}

#[tokio::test]
async fn create_and_list_documents() {
    let (_server, service) = setup().await;
    assert!(service.list_documents().await.unwrap().is_empty());

    let (doc_id, cell_ids) = seed_document(&service, DocumentStatus::Open).await;
    assert_eq!(cell_ids.len(), 4);

    let documents = service.list_documents().await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].id, doc_id);
    assert!(documents[0].current);

    let detail = service.get_document(&doc_id).await.unwrap();
    assert_eq!(detail.cells[0].coordinate, "A1");
    assert_eq!(detail.cells[3].coordinate, "B2");
    assert_eq!(detail.cells[3].value, "40");
}

#[tokio::test]
async fn empty_document_is_rejected() {
    let (_server, service) = setup().await;
    let err = service
        .create_document(&CreateDocument {
            name: "empty".into(),
            status: DocumentStatus::Open,
            rows: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn replace_keeps_the_chain_id_resolving() {
    let (_server, service) = setup().await;
    let (doc_id, _) = seed_document(&service, DocumentStatus::Open).await;

    let replacement = service
        .replace_document(&doc_id, &[vec!["99".into()]])
        .await
        .unwrap();
    assert_eq!(replacement.replaces_id.as_deref(), Some(doc_id.as_str()));

    // The original id still resolves, now to the replacement's cells.
    let detail = service.get_document(&doc_id).await.unwrap();
    assert_eq!(detail.document.id, replacement.id);
    assert_eq!(detail.cells.len(), 1);
    assert_eq!(detail.cells[0].value, "99");

    // Only the replacement shows up in the listing.
    let documents = service.list_documents().await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].id, replacement.id);
}

#[tokio::test]
async fn popover_has_edit_form_unless_locked() {
    let (_server, service) = setup().await;
    let (_, cells) = seed_document(&service, DocumentStatus::Open).await;
    let panel = service.fetch_popover(&cells[0]).await.unwrap();
    assert_eq!(panel.cell_id, cells[0]);
    let form = panel.edit_form.expect("open document has an edit form");
    assert_eq!(form.initial_value, "10");
    assert!(panel.requests.is_empty());
    assert!(panel.delete_action.is_none());

    let (_, cells) = seed_document(&service, DocumentStatus::Locked).await;
    let panel = service.fetch_popover(&cells[0]).await.unwrap();
    assert!(panel.edit_form.is_none());
}

#[tokio::test]
async fn popover_for_unknown_cell_is_not_found() {
    let (_server, service) = setup().await;
    let err = service.fetch_popover("no-such-cell").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn first_submit_applies_then_queues() {
    let (_server, service) = setup().await;
    let (doc_id, cells) = seed_document(&service, DocumentStatus::Open).await;

    let outcome = service
        .submit_change("/api/change-requests/", &cells[0], "42")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Applied {
            new_value: "42".into()
        }
    );

    let outcome = service
        .submit_change("/api/change-requests/", &cells[0], "43")
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Queued);
    let messages = service.take_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].extra_tags, "info");

    let detail = service.get_document(&doc_id).await.unwrap();
    assert_eq!(detail.cells[0].value, "42");
    assert_eq!(detail.pending_cells, vec![cells[0].clone()]);
    assert_eq!(detail.changed_cells, vec![cells[0].clone()]);
}

#[tokio::test]
async fn request_only_document_queues_and_accept_applies() {
    let (_server, service) = setup().await;
    let (doc_id, cells) = seed_document(&service, DocumentStatus::RequestOnly).await;

    let outcome = service
        .submit_change("/api/change-requests/", &cells[1], "77")
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::Queued);

    let panel = service.fetch_popover(&cells[1]).await.unwrap();
    assert_eq!(panel.requests.len(), 1);
    let receipt = service.accept_request(&panel.requests[0].id).await.unwrap();
    assert_eq!(receipt.new_value, "77");
    let messages = service.take_messages();
    assert!(messages.iter().any(|m| m.extra_tags == "success"));

    let detail = service.get_document(&doc_id).await.unwrap();
    assert_eq!(detail.cells[1].value, "77");
    assert!(detail.pending_cells.is_empty());
    assert_eq!(detail.changed_cells, vec![cells[1].clone()]);
}

#[tokio::test]
async fn revoke_reports_remaining_requests() {
    let (_server, service) = setup().await;
    let (_, cells) = seed_document(&service, DocumentStatus::RequestOnly).await;

    service
        .submit_change("/api/change-requests/", &cells[0], "1")
        .await
        .unwrap();
    service
        .submit_change("/api/change-requests/", &cells[0], "2")
        .await
        .unwrap();

    let panel = service.fetch_popover(&cells[0]).await.unwrap();
    assert_eq!(panel.requests.len(), 2);

    let receipt = service
        .revoke_request(&panel.requests[0].id)
        .await
        .unwrap();
    assert_eq!(receipt.old_value, "10");
    assert!(receipt.other_requests);

    let receipt = service
        .revoke_request(&panel.requests[1].id)
        .await
        .unwrap();
    assert!(!receipt.other_requests);
}

#[tokio::test]
async fn delete_value_restores_the_previous_value() {
    let (_server, service) = setup().await;
    let (doc_id, cells) = seed_document(&service, DocumentStatus::Open).await;

    service
        .submit_change("/api/change-requests/", &cells[0], "42")
        .await
        .unwrap();

    let panel = service.fetch_popover(&cells[0]).await.unwrap();
    let action = panel.delete_action.expect("applied change has delete action");
    let receipt = service.delete_value(&action).await.unwrap();
    assert_eq!(receipt.old_value, "10");
    let messages = service.take_messages();
    assert!(messages.iter().any(|m| m.extra_tags == "warning"));

    let detail = service.get_document(&doc_id).await.unwrap();
    assert_eq!(detail.cells[0].value, "10");
    assert!(detail.changed_cells.is_empty());
}

#[tokio::test]
async fn locked_document_refuses_submissions() {
    let (_server, service) = setup().await;
    let (_, cells) = seed_document(&service, DocumentStatus::Locked).await;

    let err = service
        .submit_change("/api/change-requests/", &cells[0], "42")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn empty_value_is_a_validation_error() {
    let (_server, service) = setup().await;
    let (_, cells) = seed_document(&service, DocumentStatus::Open).await;

    let err = service
        .submit_change("/api/change-requests/", &cells[0], "  ")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn unsafe_request_without_token_is_forbidden() {
    let (server, service) = setup().await;
    let (_, cells) = seed_document(&service, DocumentStatus::Open).await;

    // Bypass the client's token handling entirely.
    let resp = reqwest::Client::new()
        .post(format!("{}/api/change-requests/", server.base_url))
        .form(&[("cell_id", cells[0].as_str()), ("new_value", "42")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn transport_failure_surfaces_as_internal_error() {
    // Nothing listens here.
    let service = HttpService::new("http://127.0.0.1:1");
    let err = service.list_documents().await.unwrap_err();
    assert!(matches!(err, ServiceError::Internal(_)));
}
