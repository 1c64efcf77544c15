//! Shared API client with an interceptor chain.
//!
//! Every backend call in the application goes through one `ApiClient`, so
//! cross-cutting policy (the session guard) is registered once as an
//! `Interceptor` and applies to all of them.

use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::transport::{ReqwestTransport, Transport};
use super::ApiError;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/inventory/items`
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Result<Self, ApiError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid {} header: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn has_authorization(&self) -> bool {
        self.headers.contains_key(header::AUTHORIZATION)
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Deserialize the body; an empty body reads as JSON `null`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// The body as loose JSON, if it is JSON at all
    pub fn json_value(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Hook run around every request sent through an `ApiClient`.
///
/// Request hooks run in registration order and the first rejection aborts the
/// call before it reaches the transport. Response hooks also run in
/// registration order: `on_response` while the call is still succeeding,
/// `on_error` once it has failed.
pub trait Interceptor: Send + Sync {
    fn on_request(&self, _request: &mut ApiRequest) -> Result<(), ApiError> {
        Ok(())
    }

    fn on_response(&self, response: ApiResponse) -> Result<ApiResponse, ApiError> {
        Ok(response)
    }

    fn on_error(&self, error: ApiError) -> ApiError {
        error
    }
}

/// API client for the supply-chain backend.
/// Clone is cheap - the transport is shared and interceptors are reference counted.
pub struct ApiClient<T = ReqwestTransport> {
    transport: Arc<T>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl<T> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            interceptors: self.interceptors.clone(),
        }
    }
}

impl ApiClient<ReqwestTransport> {
    /// Create a client talking to `base_url` over HTTP
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self::with_transport(ReqwestTransport::new(base_url)?))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            interceptors: Vec::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn add_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Run a request through the interceptor chain and the transport.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        for interceptor in &self.interceptors {
            interceptor.on_request(&mut request)?;
        }

        let method = request.method.clone();
        let path = request.path.clone();
        debug!(method = %method, path = %path, "Sending request");

        let mut result = match self.transport.execute(request).await {
            Ok(response) if response.status.is_success() => Ok(response),
            Ok(response) => Err(ApiError::from_status(response.status, &response.body)),
            Err(e) => Err(e),
        };

        for interceptor in &self.interceptors {
            result = match result {
                Ok(response) => interceptor.on_response(response),
                Err(e) => Err(interceptor.on_error(e)),
            };
        }

        if let Err(ref e) = result {
            warn!(method = %method, path = %path, error = %e, "Request failed");
        }
        result
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        self.send(ApiRequest::post(path).with_json(body)?)
            .await?
            .json()
    }

    pub async fn put<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        self.send(ApiRequest::put(path).with_json(body)?)
            .await?
            .json()
    }

    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.send(ApiRequest::delete(path)).await?.json()
    }
}

// ============================================================================
// Tests
// ============================================================================
