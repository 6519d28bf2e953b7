//! HTTP gateway for the SiGa hashcode API
//!
//! One method per remote capability. Every request is serialized once,
//! signed over those exact bytes and sent through the configured
//! [`Transport`]. Every response goes through [`decode_response`], which
//! turns an `errorMessage` into [`SigaError::ApiResponse`] whatever the
//! status code.

use crate::auth::RequestAuthenticator;
use crate::config::{ClientConfig, RequestCredentials};
use crate::digest::HashcodeDataFile;
use crate::error::{Result, SigaError};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::types::*;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Path of the hashcode container upload endpoint
const UPLOAD_ENDPOINT: &str = "upload/hashcodecontainers";

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// Content type of every request body
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Typed client for the SiGa REST API
///
/// # Example
///
/// ```rust,no_run
/// use siga_client::{ApiGateway, ClientConfig, Endpoint, RequestCredentials};
///
/// # fn example() -> siga_client::Result<()> {
/// let credentials = RequestCredentials::new(
///     "a7fd7728-a3ea-4975-bfab-f240a67e894f",
///     "demo",
///     "746573745365637265744b6579303031",
///     "https://siga-demo.example.com/siga",
/// )?;
/// let gateway = ApiGateway::new(&ClientConfig::new(credentials))?;
///
/// let signatures = gateway.get_signatures(Endpoint::Hashcode, "container-id")?;
/// # Ok(())
/// # }
/// ```
pub struct ApiGateway {
    authenticator: RequestAuthenticator,
    transport: Box<dyn Transport>,
    base_url: String,
    signature_profile: String,
    extension: String,
    last_response: Mutex<Option<HttpResponse>>,
}

impl ApiGateway {
    /// Create a gateway backed by a blocking reqwest client
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout_secs)?;
        Self::with_transport(config, Box::new(transport))
    }

    /// Create a gateway that sends through `transport`
    pub fn with_transport(config: &ClientConfig, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let base_url = config.credentials.base_url().to_string();
        Url::parse(&base_url)
            .map_err(|e| SigaError::Configuration(format!("invalid base_url: {}", e)))?;

        Ok(Self {
            authenticator: RequestAuthenticator::new(Arc::new(config.credentials.clone())),
            transport,
            base_url,
            signature_profile: config.signature_profile.clone(),
            extension: config.extension.clone(),
            last_response: Mutex::new(None),
        })
    }

    pub fn credentials(&self) -> &RequestCredentials {
        self.authenticator.credentials()
    }

    /// Signature profile sent with signing requests
    pub fn signature_profile(&self) -> &str {
        &self.signature_profile
    }

    /// Extension of assembled artifacts
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Raw response of the most recent call
    pub fn last_response(&self) -> Option<HttpResponse> {
        self.last_response
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Build `base/endpoint/segment/...`
    ///
    /// Segments are joined verbatim. Empty segments and segments that would
    /// change the path structure are rejected, and the parsed path must end
    /// with exactly the joined segments.
    pub fn api_uri(&self, endpoint: &str, segments: &[&str]) -> Result<Url> {
        let mut tail = format!("/{}", endpoint);
        for segment in segments {
            check_segment(segment)?;
            tail.push('/');
            tail.push_str(segment);
        }

        let uri = format!("{}{}", self.base_url, tail);
        let url = Url::parse(&uri)
            .map_err(|e| SigaError::Configuration(format!("invalid uri {}: {}", uri, e)))?;
        if !url.path().ends_with(&tail) {
            return Err(SigaError::SessionPrecondition(format!(
                "path segments {:?} do not survive URL parsing (got {})",
                segments,
                url.path()
            )));
        }
        Ok(url)
    }

    // ==================== Container lifecycle ====================

    /// Register a new hashcode container
    pub fn create_hashcode_container(
        &self,
        data_files: &[HashcodeDataFile],
    ) -> Result<ContainerIdResponse> {
        let body = CreateContainerRequest {
            data_files: data_files.to_vec(),
        };
        self.send(Method::POST, Endpoint::Hashcode.as_str(), &[], Some(&body))
    }

    /// Upload an existing hashcode container (raw archive bytes)
    pub fn upload_hashcode_container(&self, container: &[u8]) -> Result<ContainerIdResponse> {
        use base64::Engine;
        let body = UploadContainerRequest {
            container: base64::engine::general_purpose::STANDARD.encode(container),
        };
        self.send(Method::POST, UPLOAD_ENDPOINT, &[], Some(&body))
    }

    /// Fetch the container (base64 bytes)
    pub fn get_container(&self, endpoint: Endpoint, container_id: &str) -> Result<GetContainerResponse> {
        self.send_empty(Method::GET, endpoint, &[container_id])
    }

    /// Delete the container on the remote side
    pub fn delete_container(&self, endpoint: Endpoint, container_id: &str) -> Result<ResultResponse> {
        self.send_empty(Method::DELETE, endpoint, &[container_id])
    }

    // ==================== Container contents ====================

    pub fn get_validation_report(
        &self,
        endpoint: Endpoint,
        container_id: &str,
    ) -> Result<ValidationReportResponse> {
        self.send_empty(Method::GET, endpoint, &[container_id, "validationreport"])
    }

    pub fn get_data_files(&self, endpoint: Endpoint, container_id: &str) -> Result<DataFilesResponse> {
        self.send_empty(Method::GET, endpoint, &[container_id, "datafiles"])
    }

    pub fn get_signatures(&self, endpoint: Endpoint, container_id: &str) -> Result<SignaturesResponse> {
        self.send_empty(Method::GET, endpoint, &[container_id, "signatures"])
    }

    pub fn get_signature_info(
        &self,
        endpoint: Endpoint,
        container_id: &str,
        signature_id: &str,
    ) -> Result<SignatureInfo> {
        self.send_empty(Method::GET, endpoint, &[container_id, "signatures", signature_id])
    }

    // ==================== Remote signing ====================

    pub fn start_remote_signing(
        &self,
        endpoint: Endpoint,
        container_id: &str,
        request: &RemoteSigningRequest,
    ) -> Result<RemoteSigningResponse> {
        self.send(Method::POST, endpoint.as_str(), &[container_id, "remotesigning"], Some(request))
    }

    pub fn finalize_remote_signing(
        &self,
        endpoint: Endpoint,
        container_id: &str,
        signature_id: &str,
        request: &FinalizeRemoteSigningRequest,
    ) -> Result<ResultResponse> {
        self.send(
            Method::PUT,
            endpoint.as_str(),
            &[container_id, "remotesigning", signature_id],
            Some(request),
        )
    }

    // ==================== Mobile-ID ====================

    pub fn start_mobile_id_signing(
        &self,
        endpoint: Endpoint,
        container_id: &str,
        request: &MobileIdSigningRequest,
    ) -> Result<MobileIdSigningResponse> {
        self.send(Method::POST, endpoint.as_str(), &[container_id, "mobileidsigning"], Some(request))
    }

    pub fn get_mobile_id_status(
        &self,
        endpoint: Endpoint,
        container_id: &str,
        signature_id: &str,
    ) -> Result<MobileIdStatusResponse> {
        self.send_empty(
            Method::GET,
            endpoint,
            &[container_id, "mobileidsigning", signature_id, "status"],
        )
    }

    // ==================== Smart-ID ====================

    pub fn start_smart_id_certificate_choice(
        &self,
        endpoint: Endpoint,
        container_id: &str,
        request: &SmartIdCertificateChoiceRequest,
    ) -> Result<SmartIdCertificateChoiceResponse> {
        self.send(
            Method::POST,
            endpoint.as_str(),
            &[container_id, "smartidsigning", "certificatechoice"],
            Some(request),
        )
    }

    pub fn get_smart_id_certificate_status(
        &self,
        endpoint: Endpoint,
        container_id: &str,
        certificate_id: &str,
    ) -> Result<SmartIdCertificateStatusResponse> {
        self.send_empty(
            Method::GET,
            endpoint,
            &[container_id, "smartidsigning", "certificatechoice", certificate_id, "status"],
        )
    }

    pub fn start_smart_id_signing(
        &self,
        endpoint: Endpoint,
        container_id: &str,
        request: &SmartIdSigningRequest,
    ) -> Result<SmartIdSigningResponse> {
        self.send(Method::POST, endpoint.as_str(), &[container_id, "smartidsigning"], Some(request))
    }

    pub fn get_smart_id_status(
        &self,
        endpoint: Endpoint,
        container_id: &str,
        signature_id: &str,
    ) -> Result<SmartIdStatusResponse> {
        self.send_empty(
            Method::GET,
            endpoint,
            &[container_id, "smartidsigning", signature_id, "status"],
        )
    }

    // ==================== Helper Methods ====================

    fn send_empty<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: Endpoint,
        segments: &[&str],
    ) -> Result<T> {
        self.send::<(), T>(method, endpoint.as_str(), segments, None)
    }

    fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T> {
        let url = self.api_uri(endpoint, segments)?;
        // Serialized once: these bytes are both signed and sent.
        let body = body.map(serde_json::to_vec).transpose()?;
        let signed_body = body.as_deref().unwrap_or_default();

        let mut headers = self
            .authenticator
            .headers(method.as_str(), url.path(), signed_body)
            .to_pairs();
        if body.is_some() {
            headers.push((HEADER_CONTENT_TYPE, JSON_CONTENT_TYPE.to_string()));
        }
        let request = HttpRequest {
            method: method.clone(),
            url: url.to_string(),
            headers,
            body,
        };

        debug!(method = %method, path = %url.path(), "Sending SiGa request");
        let response = self.transport.send(&request)?;
        if let Ok(mut last) = self.last_response.lock() {
            *last = Some(response.clone());
        }

        decode_response(&response)
    }
}

/// Reject ids that are empty, dot segments, or carry separators or escapes
pub(crate) fn check_segment(segment: &str) -> Result<()> {
    let invalid = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '?', '#', '%'])
        || segment.chars().any(char::is_control);
    if invalid {
        return Err(SigaError::SessionPrecondition(format!(
            "invalid path segment: {:?}",
            segment
        )));
    }
    Ok(())
}

/// Decode a response body, applying the `errorMessage` rule
pub fn decode_response<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    let body: &[u8] = if response.body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &response.body
    };

    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error_message: Some(message),
            error_code,
        }) => {
            warn!(status = response.status, error_code = ?error_code, "SiGa returned an error");
            return Err(SigaError::ApiResponse {
                status: response.status,
                message,
            });
        }
        Ok(_) => {}
        Err(_) if !response.is_success() => {
            return Err(SigaError::ApiResponse {
                status: response.status,
                message: response.text(),
            });
        }
        Err(e) => return Err(SigaError::Json(e)),
    }

    if !response.is_success() {
        let text = response.text();
        let message = if text.trim().is_empty() {
            format!("HTTP status {}", response.status)
        } else {
            format!("HTTP status {}: {}", response.status, text.trim())
        };
        return Err(SigaError::ApiResponse {
            status: response.status,
            message,
        });
    }

    Ok(serde_json::from_slice(body)?)
}
