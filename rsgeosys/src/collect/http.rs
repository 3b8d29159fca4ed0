//! HTTP transport abstraction for testability

use std::time::Duration;

use tracing::{debug, trace};

use crate::collect::session::SessionContext;
use crate::error::{GeosysError, Result};

/// Status and raw body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON, `Null` when empty or unparseable.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Trait for HTTP operations used by the pipeline.
///
/// Headers and query parameters are passed as `(name, value)` pairs. `get`
/// and `post_json` report the status instead of failing on non-2xx so the
/// caller can read error bodies; `fetch_bytes` fails on non-2xx.
pub trait HttpClient: Send + Sync {
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        params: &[(&str, &str)],
    ) -> Result<HttpResponse>;

    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        params: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse>;

    fn post_form(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        form: &[(&str, &str)],
    ) -> Result<HttpResponse>;

    fn fetch_bytes(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>>;
}

/// Proxy server settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
}

impl ProxyConfig {
    pub fn is_enabled(&self) -> bool {
        !self.host.is_empty()
    }

    /// Renders `[user:password@]host[:port]`, `None` when no host is set.
    pub fn authority(&self) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let mut authority = self.host.clone();
        if !self.port.is_empty() {
            authority = format!("{}:{}", authority, self.port);
        }
        if !self.user.is_empty() {
            authority = format!("{}:{}@{}", self.user, self.password, authority);
        }
        Some(authority)
    }
}

/// Blocking HTTP client backed by reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

const DEFAULT_TIMEOUT_SECS: u64 = 60;

impl ReqwestClient {
    pub fn new(proxy: Option<&ProxyConfig>) -> Result<Self> {
        Self::with_timeout(proxy, DEFAULT_TIMEOUT_SECS)
    }

    /// Client routed through the proxy carried by `session`, if any.
    pub fn for_session(session: &SessionContext) -> Result<Self> {
        Self::new(session.proxy.as_ref())
    }

    pub fn with_timeout(proxy: Option<&ProxyConfig>, timeout_secs: u64) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("rsgeosys/", env!("CARGO_PKG_VERSION")));

        if let Some(authority) = proxy.and_then(ProxyConfig::authority) {
            debug!("Using proxy server");
            let proxy = reqwest::Proxy::all(format!("http://{}", authority))
                .map_err(|e| GeosysError::Http(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| GeosysError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder, url: &str) -> Result<HttpResponse> {
        let response = request.send().map_err(|e| transport_error(&e, url))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| GeosysError::Http(format!("Failed to read response: {}", e)))?
            .to_vec();
        trace!(url, status, bytes = body.len(), "HTTP response");
        Ok(HttpResponse { status, body })
    }
}

fn with_headers(
    mut request: reqwest::blocking::RequestBuilder,
    headers: &[(&str, &str)],
) -> reqwest::blocking::RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
}

fn transport_error(error: &reqwest::Error, url: &str) -> GeosysError {
    if error.is_timeout() {
        GeosysError::Http(format!("Request to {} timed out", url))
    } else if error.is_connect() {
        GeosysError::Http(
            "The network is unreachable. Please check your internet connection.".to_string(),
        )
    } else {
        GeosysError::Http(format!("Request failed: {}", error))
    }
}

/// Maps a failed download status to the message shown to the user.
pub fn status_message(status: u16) -> String {
    match status {
        404 => "Sorry, the content was not found on the server.".to_string(),
        408 => "Sorry, the server aborted your request. Please try a smaller area.".to_string(),
        509 => "Sorry, the server is currently busy with another request. \
                Please try again in a few minutes."
            .to_string(),
        other => format!("HTTP {}", other),
    }
}

impl HttpClient for ReqwestClient {
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        params: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        debug!(url, "GET");
        let request = with_headers(self.client.get(url), headers).query(params);
        self.send(request, url)
    }

    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        params: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        debug!(url, "POST");
        let request = with_headers(self.client.post(url), headers)
            .query(params)
            .json(body);
        self.send(request, url)
    }

    fn post_form(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        form: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        debug!(url, "POST form");
        let request = with_headers(self.client.post(url), headers).form(form);
        self.send(request, url)
    }

    fn fetch_bytes(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>> {
        debug!(url, "Fetching bytes");
        let response = self.send(with_headers(self.client.get(url), headers), url)?;
        if !response.is_success() {
            return Err(GeosysError::Http(status_message(response.status)));
        }
        Ok(response.body)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// One request seen by [`MockHttpClient`].
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedRequest {
        pub method: &'static str,
        pub url: String,
        pub params: Vec<(String, String)>,
        pub body: Option<serde_json::Value>,
    }

    /// Mock HTTP client serving canned responses keyed by URL.
    ///
    /// Unknown URLs answer 404. Every call is recorded.
    #[derive(Default)]
    pub struct MockHttpClient {
        pub responses: HashMap<String, HttpResponse>,
        pub requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
            self.responses
                .insert(url.to_string(), HttpResponse::new(status, body));
            self
        }

        pub fn with_json(self, url: &str, body: serde_json::Value) -> Self {
            let bytes = body.to_string().into_bytes();
            self.with(url, 200, bytes)
        }

        pub fn recorded(&self) -> Vec<RecordedRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }

        fn record(
            &self,
            method: &'static str,
            url: &str,
            params: &[(&str, &str)],
            body: Option<serde_json::Value>,
        ) -> HttpResponse {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(RecordedRequest {
                    method,
                    url: url.to_string(),
                    params: params
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    body,
                });
            }
            self.responses
                .get(url)
                .cloned()
                .unwrap_or_else(|| HttpResponse::new(404, Vec::new()))
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            params: &[(&str, &str)],
        ) -> Result<HttpResponse> {
            Ok(self.record("GET", url, params, None))
        }

        fn post_json(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            params: &[(&str, &str)],
            body: &serde_json::Value,
        ) -> Result<HttpResponse> {
            Ok(self.record("POST", url, params, Some(body.clone())))
        }

        fn post_form(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            form: &[(&str, &str)],
        ) -> Result<HttpResponse> {
            Ok(self.record("POST", url, form, None))
        }

        fn fetch_bytes(&self, url: &str, _headers: &[(&str, &str)]) -> Result<Vec<u8>> {
            let response = self.record("GET", url, &[], None);
            if !response.is_success() {
                return Err(GeosysError::Http(status_message(response.status)));
            }
            Ok(response.body)
        }
    }

    #[test]
    fn test_proxy_authority() {
        let proxy = ProxyConfig {
            host: "proxy.local".to_string(),
            port: "3128".to_string(),
            user: "bob".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(
            proxy.authority(),
            Some("bob:secret@proxy.local:3128".to_string())
        );
        assert_eq!(ProxyConfig::default().authority(), None);
    }

    #[test]
    fn test_client_uses_session_proxy() {
        let session = SessionContext::new("t", "https://x");
        assert!(ReqwestClient::for_session(&session).is_ok());

        let broken = ProxyConfig {
            host: "proxy.local".to_string(),
            port: "notaport".to_string(),
            ..Default::default()
        };
        let err = ReqwestClient::for_session(&session.with_proxy(broken)).err();
        assert!(matches!(err, Some(GeosysError::Http(ref m)) if m.starts_with("Invalid proxy")));
    }

    #[test]
    fn test_proxy_without_port_or_user() {
        let proxy = ProxyConfig {
            host: "proxy.local".to_string(),
            ..Default::default()
        };
        assert_eq!(proxy.authority(), Some("proxy.local".to_string()));
    }

    #[test]
    fn test_status_message() {
        assert!(status_message(408).contains("smaller area"));
        assert!(status_message(509).contains("busy"));
        assert_eq!(status_message(500), "HTTP 500");
    }

    #[test]
    fn test_mock_client_records_and_answers() {
        let mock = MockHttpClient::new().with("http://example.com/a", 200, vec![1, 2, 3]);
        assert_eq!(
            mock.fetch_bytes("http://example.com/a", &[]).unwrap(),
            vec![1, 2, 3]
        );
        assert!(mock.fetch_bytes("http://example.com/b", &[]).is_err());
        assert_eq!(mock.recorded().len(), 2);
    }

    #[test]
    fn test_response_json_fallback() {
        let response = HttpResponse::new(200, b"not json".to_vec());
        assert!(response.json().is_null());
        assert!(response.is_success());
    }
}
