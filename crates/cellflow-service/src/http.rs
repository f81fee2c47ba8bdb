use std::sync::Mutex;

use async_trait::async_trait;
use cellflow_core::change_request::{
    AcceptReceipt, DeleteValueReceipt, RevokeReceipt, SubmitReceipt,
};
use cellflow_core::document::{CreateDocument, Document, DocumentDetail, ReplaceDocument};
use cellflow_core::message::ServerMessage;
use cellflow_core::popover::PopoverPanel;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::Value;

use crate::{DocumentService, ServiceError, SubmitOutcome};

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";

/// Async HTTP client implementation of DocumentService.
/// Connects to a running cellflow-server.
///
/// Two cross-cutting concerns live here so callers never see them:
/// the anti-forgery token (captured from the server's `csrftoken` cookie
/// and replayed on unsafe same-origin requests) and server-pushed
/// notification messages (collected from JSON payloads, drained via
/// [`HttpService::take_messages`]).
pub struct HttpService {
    base_url: String,
    client: Client,
    csrf: Mutex<Option<String>>,
    messages: Mutex<Vec<ServerMessage>>,
}

impl HttpService {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
            csrf: Mutex::new(None),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Check if the server is reachable. Also the cheapest way to obtain
    /// the anti-forgery cookie before a first unsafe request.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        let resp = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("connection failed: {e}")))?;
        self.capture_csrf(&resp);
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ServiceError::Internal(format!(
                "health check failed: {}",
                resp.status()
            )))
        }
    }

    /// Drain the notification messages collected from server responses.
    pub fn take_messages(&self) -> Vec<ServerMessage> {
        self.messages
            .lock()
            .map(|mut m| std::mem::take(&mut *m))
            .unwrap_or_default()
    }

    fn abs_url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}{path_or_url}", self.base_url)
        }
    }

    /// Attach the anti-forgery token to an unsafe request. Cross-origin
    /// URLs are exempt; the token never leaves its origin.
    fn with_csrf(&self, builder: RequestBuilder, url: &str) -> RequestBuilder {
        if !url.starts_with(&self.base_url) {
            return builder;
        }
        match self.csrf.lock().ok().and_then(|slot| slot.clone()) {
            Some(token) => builder
                .header(CSRF_HEADER, token.clone())
                .header(header::COOKIE, format!("{CSRF_COOKIE}={token}")),
            None => builder,
        }
    }

    async fn ensure_csrf(&self) -> Result<(), ServiceError> {
        let have = self.csrf.lock().map(|slot| slot.is_some()).unwrap_or(false);
        if !have {
            self.health_check().await?;
        }
        Ok(())
    }

    fn capture_csrf(&self, resp: &reqwest::Response) {
        for value in resp.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some(rest) = raw.strip_prefix(&format!("{CSRF_COOKIE}=")) else {
                continue;
            };
            let token = rest.split(';').next().unwrap_or("").trim();
            if !token.is_empty() {
                if let Ok(mut slot) = self.csrf.lock() {
                    *slot = Some(token.to_string());
                }
            }
        }
    }

    fn capture_messages(&self, value: &Value) {
        let Some(list) = value.get("messages").and_then(Value::as_array) else {
            return;
        };
        if let Ok(mut messages) = self.messages.lock() {
            for entry in list {
                if let Ok(msg) = serde_json::from_value::<ServerMessage>(entry.clone()) {
                    messages.push(msg);
                }
            }
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = resp.status();
        self.capture_csrf(&resp);
        if status.is_success() {
            let value: Value = resp
                .json()
                .await
                .map_err(|e| ServiceError::Internal(format!("json decode: {e}")))?;
            self.capture_messages(&value);
            serde_json::from_value(value)
                .map_err(|e| ServiceError::Internal(format!("json decode: {e}")))
        } else {
            Err(self.parse_error_with_status(status, resp).await)
        }
    }

    async fn parse_error_with_status(
        &self,
        status: StatusCode,
        resp: reqwest::Response,
    ) -> ServiceError {
        let body = resp.text().await.unwrap_or_default();
        let msg = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"].as_str().map(String::from))
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            ServiceError::NotFound(msg)
        } else if status == StatusCode::BAD_REQUEST {
            ServiceError::InvalidInput(msg)
        } else if status == StatusCode::FORBIDDEN {
            ServiceError::Forbidden(msg)
        } else {
            ServiceError::Internal(msg)
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        self.handle_response(resp).await
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let url = format!("{}{path}", self.base_url);
        self.ensure_csrf().await?;
        let builder = self.client.post(&url).json(body);
        let resp = self
            .with_csrf(builder, &url)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        self.handle_response(resp).await
    }

    async fn put_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let url = format!("{}{path}", self.base_url);
        self.ensure_csrf().await?;
        let builder = self.client.put(&url);
        let resp = self
            .with_csrf(builder, &url)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        self.handle_response(resp).await
    }

    async fn delete_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ServiceError> {
        self.ensure_csrf().await?;
        let builder = self.client.delete(url);
        let resp = self
            .with_csrf(builder, url)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        self.handle_response(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn abs_url_joins_paths_and_passes_absolute_urls_through() {
        let service = HttpService::new("http://localhost:4810/");
        assert_eq!(
            service.abs_url("/api/change-requests/"),
            "http://localhost:4810/api/change-requests/"
        );
        assert_eq!(
            service.abs_url("http://other:1234/api/x"),
            "http://other:1234/api/x"
        );
    }

    #[test]
    fn messages_are_collected_and_drained() {
        let service = HttpService::new("http://localhost:4810");
        service.capture_messages(&json!({
            "new_value": "42",
            "messages": [
                { "message": "queued", "extra_tags": "info" },
                { "message": "applied", "extra_tags": "success" },
            ],
        }));

        let messages = service.take_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message, "queued");
        assert_eq!(messages[1].extra_tags, "success");
        assert!(service.take_messages().is_empty());
    }

    #[test]
    fn payload_without_messages_adds_nothing() {
        let service = HttpService::new("http://localhost:4810");
        service.capture_messages(&json!({ "new_value": "42" }));
        assert!(service.take_messages().is_empty());
    }
}

#[async_trait]
impl DocumentService for HttpService {
    async fn list_documents(&self) -> Result<Vec<Document>, ServiceError> {
        self.get_json("/api/documents").await
    }

    async fn get_document(&self, id: &str) -> Result<DocumentDetail, ServiceError> {
        self.get_json(&format!("/api/documents/{id}")).await
    }

    async fn create_document(&self, input: &CreateDocument) -> Result<Document, ServiceError> {
        self.post_json("/api/documents", input).await
    }

    async fn replace_document(
        &self,
        id: &str,
        rows: &[Vec<String>],
    ) -> Result<Document, ServiceError> {
        self.post_json(
            &format!("/api/documents/{id}/replace"),
            &ReplaceDocument {
                rows: rows.to_vec(),
            },
        )
        .await
    }

    async fn fetch_popover(&self, cell_id: &str) -> Result<PopoverPanel, ServiceError> {
        self.get_json(&format!("/api/documents/popover/{cell_id}/"))
            .await
    }

    /// Post the serialized edit form and interpret the server's decision:
    /// 201 applied immediately, 202 queued for review. Anything else is an
    /// error for the caller to handle.
    async fn submit_change(
        &self,
        action_url: &str,
        cell_id: &str,
        new_value: &str,
    ) -> Result<SubmitOutcome, ServiceError> {
        let url = self.abs_url(action_url);
        self.ensure_csrf().await?;
        let builder = self
            .client
            .post(&url)
            .form(&[("cell_id", cell_id), ("new_value", new_value)]);
        let resp = self
            .with_csrf(builder, &url)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::CREATED {
            let receipt: SubmitReceipt = self.handle_response(resp).await?;
            Ok(SubmitOutcome::Applied {
                new_value: receipt.new_value,
            })
        } else if status == StatusCode::ACCEPTED {
            let _receipt: SubmitReceipt = self.handle_response(resp).await?;
            Ok(SubmitOutcome::Queued)
        } else {
            Err(self.parse_error_with_status(status, resp).await)
        }
    }

    async fn accept_request(&self, request_id: &str) -> Result<AcceptReceipt, ServiceError> {
        self.put_json(&format!("/api/change-requests/{request_id}/"))
            .await
    }

    async fn revoke_request(&self, request_id: &str) -> Result<RevokeReceipt, ServiceError> {
        let url = format!("{}/api/change-requests/{request_id}/", self.base_url);
        self.delete_json(&url).await
    }

    async fn delete_value(&self, action_url: &str) -> Result<DeleteValueReceipt, ServiceError> {
        let url = self.abs_url(action_url);
        self.delete_json(&url).await
    }
}
