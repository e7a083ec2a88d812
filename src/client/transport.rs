/// Client Transport
///
/// Request and response values for outbound API calls, and the `Transport` seam the
/// coordinator sends them through. `HttpTransport` is the reqwest implementation.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ClientError;
use crate::error::INVALID_TOKEN_CODE;
use crate::route_table::Route;

/// One outbound API call, independent of the token it will carry.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The token refresh call, authenticated with the refresh token.
    pub fn refresh() -> Self {
        Self::new(Method::POST, Route::Refresh.path())
    }

    pub fn is_refresh_call(&self) -> bool {
        self.method == Method::POST && self.path == Route::Refresh.path()
    }
}

/// Status and decoded JSON body of a response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `code` field of an error body
    pub fn error_code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }

    /// 401, or 403 carrying the invalid-token code
    pub fn is_token_rejection(&self) -> bool {
        match self.status {
            401 => true,
            403 => self.error_code() == Some(INVALID_TOKEN_CODE),
            _ => false,
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Turn a non-2xx response into `ClientError::Rejected`.
    pub fn into_result(self) -> Result<ApiResponse, ClientError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(ClientError::Rejected {
            status: self.status,
            code: self.error_code().map(str::to_string),
            body: self.body,
        })
    }
}

/// Executes one request, optionally carrying a bearer token.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ClientError>;
}

/// `Transport` over HTTP with reqwest
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), url.as_str());
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        tracing::debug!(method = %request.method, path = %request.path, status, "API call finished");
        Ok(ApiResponse::new(status, body))
    }
}
