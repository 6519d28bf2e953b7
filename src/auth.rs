//! Per-request HMAC authentication
//!
//! Every request carries four headers. The signature is an HMAC-SHA256 over
//! `uuid:timestamp:METHOD:path:body`, keyed with the shared secret and
//! hex-encoded. The body must be the exact bytes put on the wire.

use crate::config::RequestCredentials;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_SERVICE_UUID: &str = "X-Authorization-ServiceUUID";
pub const HEADER_TIMESTAMP: &str = "X-Authorization-Timestamp";
pub const HEADER_SIGNATURE: &str = "X-Authorization-Signature";
pub const HEADER_HMAC_ALGORITHM: &str = "X-Authorization-Hmac-Algorithm";

/// Value of the algorithm header
pub const HMAC_ALGORITHM: &str = "HmacSHA256";

/// Authentication headers for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub service_uuid: String,
    pub timestamp: i64,
    pub signature: String,
}

impl AuthHeaders {
    /// Header name/value pairs in send order
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_SERVICE_UUID, self.service_uuid.clone()),
            (HEADER_TIMESTAMP, self.timestamp.to_string()),
            (HEADER_SIGNATURE, self.signature.clone()),
            (HEADER_HMAC_ALGORITHM, HMAC_ALGORITHM.to_string()),
        ]
    }
}

/// Computes request signatures for one service identity
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    credentials: Arc<RequestCredentials>,
}

impl RequestAuthenticator {
    pub fn new(credentials: Arc<RequestCredentials>) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &RequestCredentials {
        &self.credentials
    }

    /// Hex HMAC-SHA256 signature for the given request parts
    pub fn sign(&self, method: &str, path: &str, body: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.credentials.shared_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(self.credentials.service_uuid.as_bytes());
        mac.update(b":");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b":");
        mac.update(method.as_bytes());
        mac.update(b":");
        mac.update(path.as_bytes());
        mac.update(b":");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Headers for a request sent at `timestamp` (Unix seconds)
    pub fn headers_at(&self, method: &str, path: &str, body: &[u8], timestamp: i64) -> AuthHeaders {
        AuthHeaders {
            service_uuid: self.credentials.service_uuid.clone(),
            timestamp,
            signature: self.sign(method, path, body, timestamp),
        }
    }

    /// Headers for a request sent now
    pub fn headers(&self, method: &str, path: &str, body: &[u8]) -> AuthHeaders {
        self.headers_at(method, path, body, chrono::Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator(uuid: &str, secret: &str) -> RequestAuthenticator {
        let credentials =
            RequestCredentials::new(uuid, "demo", secret, "https://siga.example.com").unwrap();
        RequestAuthenticator::new(Arc::new(credentials))
    }

    #[test]
    fn test_signature_is_deterministic() {
        let auth = authenticator("uuid-1", "secret");
        let a = auth.sign("POST", "/hashcodecontainers", b"{}", 1_700_000_000);
        let b = auth.sign("POST", "/hashcodecontainers", b"{}", 1_700_000_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_signature_matches_manual_hmac() {
        let auth = authenticator("uuid-1", "secret");
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"uuid-1:1700000000:GET:/hashcodecontainers/c1:");
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(
            auth.sign("GET", "/hashcodecontainers/c1", b"", 1_700_000_000),
            expected
        );
    }

    #[test]
    fn test_any_input_changes_signature() {
        let auth = authenticator("uuid-1", "secret");
        let base = auth.sign("POST", "/p", b"{}", 1);

        assert_ne!(base, auth.sign("PUT", "/p", b"{}", 1));
        assert_ne!(base, auth.sign("POST", "/q", b"{}", 1));
        assert_ne!(base, auth.sign("POST", "/p", b"{ }", 1));
        assert_ne!(base, auth.sign("POST", "/p", b"{}", 2));
        assert_ne!(base, authenticator("uuid-2", "secret").sign("POST", "/p", b"{}", 1));
        assert_ne!(base, authenticator("uuid-1", "other").sign("POST", "/p", b"{}", 1));
    }

    #[test]
    fn test_header_pairs() {
        let auth = authenticator("uuid-1", "secret");
        let headers = auth.headers_at("GET", "/x", b"", 42);
        let pairs = headers.to_pairs();
        assert_eq!(pairs[0], (HEADER_SERVICE_UUID, "uuid-1".to_string()));
        assert_eq!(pairs[1], (HEADER_TIMESTAMP, "42".to_string()));
        assert_eq!(pairs[2].1, auth.sign("GET", "/x", b"", 42));
        assert_eq!(pairs[3], (HEADER_HMAC_ALGORITHM, "HmacSHA256".to_string()));
    }
}
