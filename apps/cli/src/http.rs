//! HTTP transport and authenticated API client.
//!
//! `Transport` isolates the wire so tests can script full exchanges
//! against an in-memory implementation. `ApiClient` layers the session
//! on top: it attaches the bearer token, and on a 401/403 tries one
//! silent refresh-token exchange before giving up.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::session::{SessionError, SessionStore};

const REFRESH_PATH: &str = "api/token/refresh/";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error("not logged in; run `vericv login <username>` first")]
    Unauthenticated,

    #[error("no CV on file; run `vericv upload <file.pdf>` first")]
    CvRequired,

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("No questions were generated")]
    EmptyGeneration,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

// ────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: &str) -> Self {
        Self {
            method: Method::GET,
            path: path.to_string(),
            bearer: None,
            body: RequestBody::Empty,
        }
    }

    pub fn post_json(path: &str, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.to_string(),
            bearer: None,
            body: RequestBody::Json(body),
        }
    }

    pub fn post_multipart(path: &str, fields: Vec<MultipartField>) -> Self {
        Self {
            method: Method::POST,
            path: path.to_string(),
            bearer: None,
            body: RequestBody::Multipart(fields),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<MultipartField>),
}

#[derive(Debug, Clone)]
pub struct MultipartField {
    pub name: String,
    pub value: FieldValue,
}

impl MultipartField {
    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: FieldValue::Text(value.to_string()),
        }
    }

    pub fn file(name: &str, filename: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            value: FieldValue::File {
                filename: filename.to_string(),
                content_type: content_type.to_string(),
                bytes,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Text(String),
    File {
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Pulls the message out of the server's `{"error": {...}}` envelope,
    /// falling back to the raw body.
    pub fn error_message(&self) -> String {
        if let Ok(value) = serde_json::from_slice::<Value>(&self.body) {
            if let Some(message) = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
            {
                return message.to_string();
            }
        }
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

// ────────────────────────────────────────────
// Transport
// ────────────────────────────────────────────

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError>;
}

/// Real transport over reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let mut builder = self.client.request(request.method, &url);

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(fields) => {
                let mut form = reqwest::multipart::Form::new();
                for field in fields {
                    form = match field.value {
                        FieldValue::Text(text) => form.text(field.name, text),
                        FieldValue::File {
                            filename,
                            content_type,
                            bytes,
                        } => {
                            let part = reqwest::multipart::Part::bytes(bytes)
                                .file_name(filename)
                                .mime_str(&content_type)
                                .map_err(|e| ClientError::Validation(e.to_string()))?;
                            form.part(field.name, part)
                        }
                    };
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(ApiResponse { status, body })
    }
}

// ────────────────────────────────────────────
// Client
// ────────────────────────────────────────────

/// Session-aware client. Endpoint methods live in `endpoints`.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    pub session: SessionStore,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: SessionStore) -> Self {
        Self { transport, session }
    }

    /// Sends with the current access token. On 401/403 with a refresh
    /// token on hand, exchanges it and retries the request once.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let mut authed = request.clone();
        authed.bearer = self.session.access_token();

        let response = self.transport.execute(authed).await?;
        if !is_auth_failure(response.status) {
            return self.classify(response);
        }

        let Some(refresh) = self.session.refresh_token() else {
            return Err(ClientError::Unauthenticated);
        };

        debug!("Access token rejected; attempting refresh");
        if !self.try_refresh(&refresh).await? {
            return Err(ClientError::Unauthenticated);
        }

        let mut retry = request;
        retry.bearer = self.session.access_token();
        let response = self.transport.execute(retry).await?;
        if is_auth_failure(response.status) {
            return Err(ClientError::Unauthenticated);
        }
        self.classify(response)
    }

    /// Sends without credentials (login, register, refresh).
    pub async fn send_unauthenticated(
        &self,
        request: ApiRequest,
    ) -> Result<ApiResponse, ClientError> {
        let response = self.transport.execute(request).await?;
        self.classify(response)
    }

    async fn try_refresh(&self, refresh: &str) -> Result<bool, ClientError> {
        let request = ApiRequest::post_json(REFRESH_PATH, json!({ "refresh": refresh }));
        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            return Ok(false);
        }

        #[derive(serde::Deserialize)]
        struct RefreshResponse {
            access: String,
        }

        let parsed: RefreshResponse = response.json()?;
        self.session.set_access_token(&parsed.access)?;
        Ok(true)
    }

    fn classify(&self, response: ApiResponse) -> Result<ApiResponse, ClientError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ClientError::Api {
                status: response.status,
                message: response.error_message(),
            })
        }
    }
}

fn is_auth_failure(status: u16) -> bool {
    status == 401 || status == 403
}

/// Scripted transport shared by client and endpoint tests: pops canned
/// responses in order and records every request it saw.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    pub struct ScriptedTransport {
        responses: Mutex<Vec<ApiResponse>>,
        pub seen: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(mut responses: Vec<ApiResponse>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
            self.seen.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ClientError::Validation("script exhausted".into()))
        }
    }

    pub fn ok_json(body: &str) -> ApiResponse {
        ApiResponse {
            status: 200,
            body: Bytes::from(body.to_string()),
        }
    }

    pub fn status_only(status: u16) -> ApiResponse {
        ApiResponse {
            status,
            body: Bytes::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ok_json, status_only, ScriptedTransport};
    use super::*;

    #[tokio::test]
    async fn test_send_attaches_bearer_token() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_json("{}")]));
        let session = SessionStore::in_memory();
        session.set_token_pair("tok-1", "ref-1").unwrap();

        let client = ApiClient::new(transport.clone(), session);
        client.send(ApiRequest::get("api/quiz/results/x/")).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].bearer.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_retries_once() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            status_only(401),
            ok_json(r#"{"access":"tok-new"}"#),
            ok_json(r#"{"ok":true}"#),
        ]));
        let session = SessionStore::in_memory();
        session.set_token_pair("tok-old", "ref-1").unwrap();

        let client = ApiClient::new(transport.clone(), session.clone());
        let response = client.send(ApiRequest::get("api/quiz/results/x/")).await.unwrap();
        assert!(response.is_success());

        // Access token was replaced, refresh token untouched.
        assert_eq!(session.access_token().as_deref(), Some("tok-new"));
        assert_eq!(session.refresh_token().as_deref(), Some("ref-1"));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].path, REFRESH_PATH);
        assert_eq!(seen[2].bearer.as_deref(), Some("tok-new"));
    }

    #[tokio::test]
    async fn test_failed_refresh_maps_to_unauthenticated() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            status_only(401),
            status_only(401),
        ]));
        let session = SessionStore::in_memory();
        session.set_token_pair("tok-old", "ref-stale").unwrap();

        let client = ApiClient::new(transport, session);
        let err = client
            .send(ApiRequest::get("api/quiz/results/x/"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_no_refresh_token_means_unauthenticated() {
        let transport = Arc::new(ScriptedTransport::new(vec![status_only(401)]));
        let client = ApiClient::new(transport, SessionStore::in_memory());

        let err = client
            .send(ApiRequest::get("api/quiz/results/x/"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_non_auth_error_carries_server_message() {
        let transport = Arc::new(ScriptedTransport::new(vec![ApiResponse {
            status: 404,
            body: Bytes::from(r#"{"error":{"code":"NOT_FOUND","message":"cv not found"}}"#),
        }]));
        let client = ApiClient::new(transport, SessionStore::in_memory());

        let err = client.send(ApiRequest::get("api/cv/x/")).await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "cv not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        let response = ApiResponse {
            status: 500,
            body: Bytes::from("  something broke  "),
        };
        assert_eq!(response.error_message(), "something broke");
    }
}
