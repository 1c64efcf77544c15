//! The network half of the API client.
//!
//! `Transport` is the seam between the interceptor chain and the wire, so the
//! chain can be exercised without a server.

use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client};
use tracing::debug;

use super::client::{ApiRequest, ApiResponse};
use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub trait Transport: Send + Sync {
    /// Send the request and return whatever status the server answered with.
    ///
    /// Only failures to get a response at all are errors here.
    fn execute(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, ApiError>> + Send;
}

/// `reqwest`-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join the base URL and a request path, tolerating stray slashes
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        let path = path.trim();

        if base.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", base, path.trim_start_matches('/'))
        }
    }
}

impl Transport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(&request.path);

        let mut headers = request.headers;
        if !headers.contains_key(header::ACCEPT) {
            headers.insert(
                header::ACCEPT,
                header::HeaderValue::from_static("application/json"),
            );
        }

        let mut builder = self.client.request(request.method, &url).headers(headers);
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        debug!(url = %url, status = status.as_u16(), "Response received");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_joins_slashes() {
        let transport = ReqwestTransport::new("https://api.example.com/v1/").unwrap();
        assert_eq!(
            transport.url_for("/items"),
            "https://api.example.com/v1/items"
        );
        assert_eq!(
            transport.url_for("warehouses/3"),
            "https://api.example.com/v1/warehouses/3"
        );
    }

    #[test]
    fn test_url_for_without_base() {
        let transport = ReqwestTransport::new("").unwrap();
        assert_eq!(transport.url_for("/items"), "/items");
    }
}
