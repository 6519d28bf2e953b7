//! Request and response bodies of the SiGa hashcode API
//!
//! Every response field is optional on the wire; the gateway and session
//! layers decide which ones are required.

use crate::digest::HashcodeDataFile;
use serde::{Deserialize, Serialize};

/// Result value the service returns for successful mutations
pub const RESULT_OK: &str = "OK";

/// Container endpoint family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Regular ASiC-E containers carrying file bodies
    Containers,
    /// Hashcode containers carrying digests only
    Hashcode,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Containers => "containers",
            Endpoint::Hashcode => "hashcodecontainers",
        }
    }
}

/// Fields present on a failed response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

// ==================== Container lifecycle ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContainerRequest {
    pub data_files: Vec<HashcodeDataFile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadContainerRequest {
    /// Base64 container bytes
    pub container: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerIdResponse {
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetContainerResponse {
    /// Base64 container bytes
    pub container: Option<String>,
}

/// Generic `{ "result": ... }` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub result: Option<String>,
}

impl ResultResponse {
    pub fn is_ok(&self) -> bool {
        self.result.as_deref() == Some(RESULT_OK)
    }
}

// ==================== Container contents ====================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFilesResponse {
    #[serde(default)]
    pub data_files: Vec<HashcodeDataFile>,
}

/// Entry of the signature list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureSummary {
    pub id: Option<String>,
    pub generated_signature_id: Option<String>,
    pub signer_info: Option<String>,
    pub signature_profile: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturesResponse {
    #[serde(default)]
    pub signatures: Vec<SignatureSummary>,
}

/// Detailed information about one signature
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub id: Option<String>,
    pub generated_signature_id: Option<String>,
    pub signature_profile: Option<String>,
    pub signer_info: Option<String>,
    /// Base64 signing certificate
    pub signing_certificate: Option<String>,
    pub signature_method: Option<String>,
    pub signature_produced_by: Option<String>,
    pub claimed_signing_time: Option<String>,
    pub trusted_signing_time: Option<String>,
    pub ocsp_response_creation_time: Option<String>,
    pub timestamp_creation_time: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

// ==================== Validation ====================

/// Signature counts of the whole container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub signatures_count: u32,
    pub valid_signatures_count: u32,
}

impl ValidationReport {
    /// Every signature in the container is valid
    pub fn is_valid(&self) -> bool {
        self.valid_signatures_count == self.signatures_count
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConclusion {
    pub signatures_count: Option<u32>,
    pub valid_signatures_count: Option<u32>,
    pub validation_time: Option<String>,
    pub signature_form: Option<String>,
    pub validated_document_name: Option<String>,
    pub policy: Option<ValidationPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationPolicy {
    pub policy_name: Option<String>,
    pub policy_description: Option<String>,
    pub policy_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReportResponse {
    pub validation_conclusion: Option<ValidationConclusion>,
}

// ==================== Remote signing ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSigningRequest {
    /// Base64 DER certificate
    pub signing_certificate: String,
    pub signature_profile: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSigningResponse {
    /// Base64 bytes whose digest must be signed
    pub data_to_sign: Option<String>,
    pub digest_algorithm: Option<String>,
    pub generated_signature_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRemoteSigningRequest {
    /// Base64 raw signature value
    pub signature_value: String,
}

// ==================== Mobile-ID ====================

/// Caller-supplied Mobile-ID signing parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileIdSigningParams {
    pub person_identifier: String,
    pub phone_no: String,
    pub language: String,
    pub message_to_display: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileIdSigningRequest {
    pub person_identifier: String,
    pub phone_no: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_to_display: Option<String>,
    pub signature_profile: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileIdSigningResponse {
    pub generated_signature_id: Option<String>,
    pub challenge_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileIdStatusResponse {
    pub mid_status: Option<String>,
}

// ==================== Smart-ID ====================

/// Caller-supplied Smart-ID certificate choice parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartIdCertificateChoiceRequest {
    pub person_identifier: String,
    pub country: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartIdCertificateChoiceResponse {
    pub generated_certificate_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartIdCertificateStatusResponse {
    pub sid_status: Option<String>,
    pub document_number: Option<String>,
}

/// Caller-supplied Smart-ID signing parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartIdSigningParams {
    pub document_number: String,
    pub message_to_display: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartIdSigningRequest {
    pub document_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_to_display: Option<String>,
    pub signature_profile: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartIdSigningResponse {
    pub generated_signature_id: Option<String>,
    pub challenge_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartIdStatusResponse {
    pub sid_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_report_equality_rule() {
        let ok = ValidationReport { signatures_count: 2, valid_signatures_count: 2 };
        let bad = ValidationReport { signatures_count: 2, valid_signatures_count: 1 };
        assert!(ok.is_valid());
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_result_ok_is_exact() {
        let ok: ResultResponse = serde_json::from_str(r#"{"result":"OK"}"#).unwrap();
        let lower: ResultResponse = serde_json::from_str(r#"{"result":"ok"}"#).unwrap();
        let missing: ResultResponse = serde_json::from_str("{}").unwrap();
        assert!(ok.is_ok());
        assert!(!lower.is_ok());
        assert!(!missing.is_ok());
    }

    #[test]
    fn test_mobile_request_omits_empty_message() {
        let request = MobileIdSigningRequest {
            person_identifier: "60001019906".into(),
            phone_no: "+37200000766".into(),
            language: "EST".into(),
            message_to_display: None,
            signature_profile: "LT".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["phoneNo"], "+37200000766");
        assert!(json.get("messageToDisplay").is_none());
    }

    #[test]
    fn test_validation_response_decodes() {
        let body = r#"{"validationConclusion":{"signaturesCount":1,"validSignaturesCount":1,
            "policy":{"policyName":"POLv4"}}}"#;
        let response: ValidationReportResponse = serde_json::from_str(body).unwrap();
        let conclusion = response.validation_conclusion.unwrap();
        assert_eq!(conclusion.signatures_count, Some(1));
        assert_eq!(conclusion.policy.unwrap().policy_name.as_deref(), Some("POLv4"));
    }
}
