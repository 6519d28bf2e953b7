//! Blocking HTTP transport
//!
//! The gateway hands fully signed requests to a [`Transport`]. The default
//! implementation is a blocking reqwest client; tests substitute a scripted
//! one.

use crate::error::{Result, SigaError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use std::time::Duration;
use tracing::debug;

/// A request that is ready to go on the wire
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Every header to send, `Content-Type` included
    pub headers: Vec<(&'static str, String)>,
    /// Serialized JSON body, exactly as signed
    pub body: Option<Vec<u8>>,
}

/// Raw response as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8 text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one request and returns the raw response
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Transport backed by `reqwest::blocking::Client`
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Create a transport with the given request timeout
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SigaError::Configuration(format!("invalid header {}: {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| SigaError::Configuration(format!("invalid header {}: {}", name, e)))?;
            headers.insert(header_name, header_value);
        }

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(headers);
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        debug!(method = %request.method, url = %request.url, status, "SiGa response received");

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::HEADER_SERVICE_UUID;

    #[test]
    fn test_auth_header_names_are_valid() {
        let name = HeaderName::from_bytes(HEADER_SERVICE_UUID.as_bytes()).unwrap();
        assert_eq!(name.as_str(), "x-authorization-serviceuuid");
    }

    #[test]
    fn test_response_success_range() {
        let ok = HttpResponse { status: 204, body: Vec::new() };
        let bad = HttpResponse { status: 400, body: b"nope".to_vec() };
        assert!(ok.is_success());
        assert!(!bad.is_success());
        assert_eq!(bad.text(), "nope");
    }
}
