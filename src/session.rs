//! Signing session state machine
//!
//! Each session state is its own handle type:
//!
//! ```text
//! SigningSession ──create/upload/resume──▶ OpenContainer
//! OpenContainer ──prepare_*──▶ AwaitingSignature
//! AwaitingSignature ──finalize_signing / into_signed──▶ SignedContainer
//! SignedContainer ──validate──▶ ValidatedContainer
//! ValidatedContainer ──finalize──▶ FinalizedContainer
//! ```
//!
//! Handles borrow the [`ApiGateway`] and are not meant to be shared between
//! threads; run one session per signing workflow. Local preconditions
//! (container id, signature id, input decoding) are checked before any
//! request is sent.
//!
//! Transitions borrow the current handle, so a failed call leaves it usable
//! for another attempt. A workflow split across processes continues from
//! [`SigningSession::resume`] with [`OpenContainer::resume_signature`] or
//! [`OpenContainer::resume_signed`].

use crate::client::{check_segment, ApiGateway};
use crate::container::{ContainerAssembler, SourceFile};
use crate::digest::{DigestAlgorithm, DigestFile, HashcodeDataFile};
use crate::error::{Result, SigaError};
use crate::types::*;
use base64::Engine;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Session states, in protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Created,
    ContainerOpen,
    AwaitingSignature,
    Signed,
    Validated,
    Finalized,
    Deleted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SigaError::Protocol(format!("response is missing {}", field))),
    }
}

/// A container known to the remote service
///
/// Shared by every handle from `ContainerOpen` on; exposes the read-only
/// operations that are valid in any of those states.
#[derive(Clone)]
pub struct RemoteContainer<'g> {
    gateway: &'g ApiGateway,
    container_id: String,
    /// Names sent at creation; `None` for uploaded or resumed containers
    registered: Option<Vec<String>>,
}

impl fmt::Debug for RemoteContainer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteContainer")
            .field("container_id", &self.container_id)
            .field("registered", &self.registered)
            .finish()
    }
}

impl<'g> RemoteContainer<'g> {
    fn new(gateway: &'g ApiGateway, container_id: String, registered: Option<Vec<String>>) -> Result<Self> {
        if container_id.trim().is_empty() {
            return Err(SigaError::container_missing());
        }
        check_segment(&container_id)?;
        Ok(Self {
            gateway,
            container_id,
            registered,
        })
    }

    pub fn id(&self) -> &str {
        &self.container_id
    }

    /// Data-file names registered at creation, if this session created it
    pub fn registered_names(&self) -> Option<&[String]> {
        self.registered.as_deref()
    }

    pub fn data_files(&self) -> Result<Vec<HashcodeDataFile>> {
        Ok(self
            .gateway
            .get_data_files(Endpoint::Hashcode, &self.container_id)?
            .data_files)
    }

    pub fn signatures(&self) -> Result<Vec<SignatureSummary>> {
        Ok(self
            .gateway
            .get_signatures(Endpoint::Hashcode, &self.container_id)?
            .signatures)
    }

    pub fn signature_info(&self, signature_id: &str) -> Result<SignatureInfo> {
        self.gateway
            .get_signature_info(Endpoint::Hashcode, &self.container_id, signature_id)
    }

    /// Signature counts over the whole container
    pub fn validation_report(&self) -> Result<ValidationReport> {
        let conclusion = self
            .gateway
            .get_validation_report(Endpoint::Hashcode, &self.container_id)?
            .validation_conclusion
            .ok_or_else(|| SigaError::Protocol("response is missing validationConclusion".into()))?;

        match (conclusion.signatures_count, conclusion.valid_signatures_count) {
            (Some(signatures_count), Some(valid_signatures_count)) => Ok(ValidationReport {
                signatures_count,
                valid_signatures_count,
            }),
            _ => Err(SigaError::Protocol(
                "validation conclusion is missing signature counts".to_string(),
            )),
        }
    }

    /// Current container bytes (base64-decoded)
    pub fn container_bytes(&self) -> Result<Vec<u8>> {
        let encoded = required(
            self.gateway
                .get_container(Endpoint::Hashcode, &self.container_id)?
                .container,
            "container",
        )?;
        Ok(b64().decode(encoded)?)
    }

    fn delete(&self) -> Result<()> {
        let response = self
            .gateway
            .delete_container(Endpoint::Hashcode, &self.container_id)?;
        if response.is_ok() {
            Ok(())
        } else {
            Err(unexpected_result(self.gateway, "delete", response.result))
        }
    }

    fn last_status(&self) -> u16 {
        last_status(self.gateway)
    }
}

fn last_status(gateway: &ApiGateway) -> u16 {
    gateway.last_response().map(|r| r.status).unwrap_or(200)
}

fn unexpected_result(gateway: &ApiGateway, operation: &str, result: Option<String>) -> SigaError {
    SigaError::ApiResponse {
        status: last_status(gateway),
        message: format!("unexpected {} result: {:?}", operation, result),
    }
}

// ==================== Created ====================

/// Entry point of a signing workflow (state `Created`)
///
/// # Example
///
/// ```rust,no_run
/// use siga_client::{ApiGateway, ClientConfig, SigningSession, SourceFile};
///
/// # fn example(config: ClientConfig, cert_hex: &str, sign: impl Fn(&str) -> String)
/// #     -> siga_client::Result<()> {
/// let gateway = ApiGateway::new(&config)?;
/// let sources = vec![SourceFile::from_path("/data/contract.pdf")?];
///
/// let open = SigningSession::new(&gateway).create_container_from_sources(&sources)?;
/// let (awaiting, to_sign) = open.prepare_signing(cert_hex)?;
/// let signature_hex = sign(&to_sign.data_to_sign_hash);
/// let signed = awaiting.finalize_signing(&to_sign.generated_signature_id, &signature_hex)?;
/// let finalized = signed.validate()?.finalize(&sources)?;
/// println!("written to {}", finalized.artifact_path().display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy)]
pub struct SigningSession<'g> {
    gateway: &'g ApiGateway,
}

impl<'g> SigningSession<'g> {
    pub fn new(gateway: &'g ApiGateway) -> Self {
        Self { gateway }
    }

    pub fn state(&self) -> SessionState {
        SessionState::Created
    }

    /// Register a hashcode container for `files`
    pub fn create_container(&self, files: &[DigestFile]) -> Result<OpenContainer<'g>> {
        if files.is_empty() {
            return Err(SigaError::SessionPrecondition(
                "a container needs at least one data file".to_string(),
            ));
        }
        let data_files: Vec<HashcodeDataFile> = files.iter().map(DigestFile::convert).collect();
        let response = self.gateway.create_hashcode_container(&data_files)?;
        let container_id = required(response.container_id, "containerId")?;

        info!(container_id = %container_id, files = files.len(), "Hashcode container created");
        let names = files.iter().map(|f| f.name().to_string()).collect();
        OpenContainer::open(self.gateway, container_id, Some(names))
    }

    /// Digest `sources` and register them
    pub fn create_container_from_sources(&self, sources: &[SourceFile]) -> Result<OpenContainer<'g>> {
        let files = sources
            .iter()
            .map(SourceFile::digest)
            .collect::<Result<Vec<_>>>()?;
        self.create_container(&files)
    }

    /// Upload an existing hashcode container
    pub fn upload_container(&self, container: &[u8]) -> Result<OpenContainer<'g>> {
        let response = self.gateway.upload_hashcode_container(container)?;
        let container_id = required(response.container_id, "containerId")?;

        info!(container_id = %container_id, "Hashcode container uploaded");
        OpenContainer::open(self.gateway, container_id, None)
    }

    /// Continue with a container created earlier
    pub fn resume(&self, container_id: impl Into<String>) -> Result<OpenContainer<'g>> {
        OpenContainer::open(self.gateway, container_id.into(), None)
    }
}

// ==================== ContainerOpen ====================

/// Values returned by the prepare step of remote signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataToSign {
    /// Base64 data as returned by the service
    pub data_to_sign: String,
    pub digest_algorithm: DigestAlgorithm,
    pub generated_signature_id: String,
    /// Base64 digest of the decoded data; this is what the signer signs
    pub data_to_sign_hash: String,
}

/// Result of a Smart-ID certificate choice poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChoiceStatus {
    /// Opaque status string defined by the service
    pub sid_status: String,
    /// Set once the user has chosen a certificate
    pub document_number: Option<String>,
}

/// A container registered with the service (state `ContainerOpen`)
#[derive(Debug, Clone)]
pub struct OpenContainer<'g> {
    container: RemoteContainer<'g>,
}

impl<'g> OpenContainer<'g> {
    fn open(gateway: &'g ApiGateway, container_id: String, registered: Option<Vec<String>>) -> Result<Self> {
        Ok(Self {
            container: RemoteContainer::new(gateway, container_id, registered)?,
        })
    }

    pub fn state(&self) -> SessionState {
        SessionState::ContainerOpen
    }

    pub fn container(&self) -> &RemoteContainer<'g> {
        &self.container
    }

    pub fn id(&self) -> &str {
        self.container.id()
    }

    /// Start remote signing with a hex-encoded signing certificate
    pub fn prepare_signing(&self, certificate_hex: &str) -> Result<(AwaitingSignature<'g>, DataToSign)> {
        let certificate = hex::decode(certificate_hex.trim())?;
        let gateway = self.container.gateway;
        let request = RemoteSigningRequest {
            signing_certificate: b64().encode(certificate),
            signature_profile: gateway.signature_profile().to_string(),
        };

        let response = gateway.start_remote_signing(Endpoint::Hashcode, self.id(), &request)?;
        let data_to_sign = required(response.data_to_sign, "dataToSign")?;
        let digest_algorithm: DigestAlgorithm =
            required(response.digest_algorithm, "digestAlgorithm")?.parse()?;
        let generated_signature_id = required(response.generated_signature_id, "generatedSignatureId")?;

        let data_to_sign_hash = digest_algorithm.digest_base64(&b64().decode(&data_to_sign)?);
        debug!(
            container_id = %self.id(),
            signature_id = %generated_signature_id,
            algorithm = %digest_algorithm,
            "Remote signing prepared"
        );

        let awaiting = AwaitingSignature {
            container: self.container.clone(),
            signature_id: generated_signature_id.clone(),
            method: SigningMethod::Remote,
            challenge_id: None,
        };
        Ok((
            awaiting,
            DataToSign {
                data_to_sign,
                digest_algorithm,
                generated_signature_id,
                data_to_sign_hash,
            },
        ))
    }

    /// Continue a signature prepared earlier, e.g. by another process
    pub fn resume_signature(
        &self,
        signature_id: impl Into<String>,
        method: SigningMethod,
    ) -> Result<AwaitingSignature<'g>> {
        let signature_id = signature_id.into();
        check_segment(&signature_id)?;
        Ok(AwaitingSignature {
            container: self.container.clone(),
            signature_id,
            method,
            challenge_id: None,
        })
    }

    /// Continue with a container whose signing already completed
    ///
    /// Nothing is checked here; [`SignedContainer::validate`] decides whether
    /// the container may be finalized.
    pub fn resume_signed(&self) -> SignedContainer<'g> {
        SignedContainer {
            container: self.container.clone(),
        }
    }

    /// Start Mobile-ID signing; poll [`AwaitingSignature::status`] afterwards
    pub fn prepare_mobile_signing(&self, params: &MobileIdSigningParams) -> Result<AwaitingSignature<'g>> {
        let gateway = self.container.gateway;
        let request = MobileIdSigningRequest {
            person_identifier: params.person_identifier.clone(),
            phone_no: params.phone_no.clone(),
            language: params.language.clone(),
            message_to_display: params.message_to_display.clone(),
            signature_profile: gateway.signature_profile().to_string(),
        };

        let response = gateway.start_mobile_id_signing(Endpoint::Hashcode, self.id(), &request)?;
        let signature_id = required(response.generated_signature_id, "generatedSignatureId")?;
        debug!(container_id = %self.id(), signature_id = %signature_id, "Mobile-ID signing started");

        Ok(AwaitingSignature {
            container: self.container.clone(),
            signature_id,
            method: SigningMethod::MobileId,
            challenge_id: response.challenge_id,
        })
    }

    /// Ask the user to choose a Smart-ID certificate; returns the certificate id
    pub fn smart_id_certificate_choice(&self, request: &SmartIdCertificateChoiceRequest) -> Result<String> {
        let response = self.container.gateway.start_smart_id_certificate_choice(
            Endpoint::Hashcode,
            self.id(),
            request,
        )?;
        required(response.generated_certificate_id, "generatedCertificateId")
    }

    /// Poll a Smart-ID certificate choice
    pub fn smart_id_certificate_status(&self, certificate_id: &str) -> Result<CertificateChoiceStatus> {
        let response = self.container.gateway.get_smart_id_certificate_status(
            Endpoint::Hashcode,
            self.id(),
            certificate_id,
        )?;
        Ok(CertificateChoiceStatus {
            sid_status: required(response.sid_status, "sidStatus")?,
            document_number: response.document_number,
        })
    }

    /// Start Smart-ID signing; poll [`AwaitingSignature::status`] afterwards
    pub fn prepare_smart_id_signing(&self, params: &SmartIdSigningParams) -> Result<AwaitingSignature<'g>> {
        let gateway = self.container.gateway;
        let request = SmartIdSigningRequest {
            document_number: params.document_number.clone(),
            message_to_display: params.message_to_display.clone(),
            signature_profile: gateway.signature_profile().to_string(),
        };

        let response = gateway.start_smart_id_signing(Endpoint::Hashcode, self.id(), &request)?;
        let signature_id = required(response.generated_signature_id, "generatedSignatureId")?;
        debug!(container_id = %self.id(), signature_id = %signature_id, "Smart-ID signing started");

        Ok(AwaitingSignature {
            container: self.container.clone(),
            signature_id,
            method: SigningMethod::SmartId,
            challenge_id: response.challenge_id,
        })
    }
}

// ==================== AwaitingSignature ====================

/// How the pending signature is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMethod {
    /// Signed by the caller, submitted through `finalize_signing`
    Remote,
    /// Signed on the user's phone, completion observed by polling
    MobileId,
    /// Signed in the Smart-ID app, completion observed by polling
    SmartId,
}

/// A prepared signature (state `AwaitingSignature`)
#[derive(Debug)]
pub struct AwaitingSignature<'g> {
    container: RemoteContainer<'g>,
    signature_id: String,
    method: SigningMethod,
    challenge_id: Option<String>,
}

impl<'g> AwaitingSignature<'g> {
    pub fn state(&self) -> SessionState {
        SessionState::AwaitingSignature
    }

    pub fn container(&self) -> &RemoteContainer<'g> {
        &self.container
    }

    /// Signature id generated by the prepare step
    pub fn signature_id(&self) -> &str {
        &self.signature_id
    }

    pub fn method(&self) -> SigningMethod {
        self.method
    }

    /// Verification code to show the user (Mobile-ID / Smart-ID)
    pub fn challenge_id(&self) -> Option<&str> {
        self.challenge_id.as_deref()
    }

    /// Submit the hex signature value for a remote signing
    ///
    /// Only a result of exactly `OK` advances the session. On failure the
    /// handle stays valid and the same signature can be submitted again.
    pub fn finalize_signing(&self, signature_id: &str, signature_hex: &str) -> Result<SignedContainer<'g>> {
        if self.method != SigningMethod::Remote {
            return Err(SigaError::SessionPrecondition(format!(
                "{:?} signing is completed by polling, not finalize",
                self.method
            )));
        }
        if signature_id != self.signature_id {
            return Err(SigaError::SessionPrecondition(format!(
                "signature id {:?} was not prepared on container {}",
                signature_id,
                self.container.id()
            )));
        }
        let request = FinalizeRemoteSigningRequest {
            signature_value: b64().encode(hex::decode(signature_hex.trim())?),
        };

        let gateway = self.container.gateway;
        let response = gateway.finalize_remote_signing(
            Endpoint::Hashcode,
            self.container.id(),
            &self.signature_id,
            &request,
        )?;
        if !response.is_ok() {
            return Err(unexpected_result(gateway, "finalize", response.result));
        }

        info!(container_id = %self.container.id(), signature_id = %self.signature_id, "Signature finalized");
        Ok(SignedContainer {
            container: self.container.clone(),
        })
    }

    /// Poll the opaque Mobile-ID / Smart-ID status
    pub fn status(&self) -> Result<String> {
        let gateway = self.container.gateway;
        match self.method {
            SigningMethod::Remote => Err(SigaError::SessionPrecondition(
                "remote signing has no status; finalize it instead".to_string(),
            )),
            SigningMethod::MobileId => required(
                gateway
                    .get_mobile_id_status(Endpoint::Hashcode, self.container.id(), &self.signature_id)?
                    .mid_status,
                "midStatus",
            ),
            SigningMethod::SmartId => required(
                gateway
                    .get_smart_id_status(Endpoint::Hashcode, self.container.id(), &self.signature_id)?
                    .sid_status,
                "sidStatus",
            ),
        }
    }

    /// Move on after the caller's poll loop observed completion
    ///
    /// The status value is not interpreted here; an incomplete signature is
    /// caught by [`SignedContainer::validate`].
    pub fn into_signed(&self) -> Result<SignedContainer<'g>> {
        if self.method == SigningMethod::Remote {
            return Err(SigaError::SessionPrecondition(
                "remote signing must be finalized with a signature value".to_string(),
            ));
        }
        Ok(SignedContainer {
            container: self.container.clone(),
        })
    }
}

// ==================== Signed ====================

/// A container holding a finalized signature (state `Signed`)
#[derive(Debug)]
pub struct SignedContainer<'g> {
    container: RemoteContainer<'g>,
}

impl<'g> SignedContainer<'g> {
    pub fn state(&self) -> SessionState {
        SessionState::Signed
    }

    pub fn container(&self) -> &RemoteContainer<'g> {
        &self.container
    }

    /// Require every signature in the container to be valid
    pub fn validate(&self) -> Result<ValidatedContainer<'g>> {
        let report = self.container.validation_report()?;
        if !report.is_valid() {
            warn!(
                container_id = %self.container.id(),
                signatures = report.signatures_count,
                valid = report.valid_signatures_count,
                "Container validation failed"
            );
            return Err(SigaError::ApiResponse {
                status: self.container.last_status(),
                message: format!(
                    "One of signatures is not valid: {} of {} signatures are valid",
                    report.valid_signatures_count, report.signatures_count
                ),
            });
        }

        info!(container_id = %self.container.id(), signatures = report.signatures_count, "Container validated");
        Ok(ValidatedContainer {
            container: self.container.clone(),
            report,
        })
    }
}

// ==================== Validated ====================

/// A container whose signatures are all valid (state `Validated`)
#[derive(Debug)]
pub struct ValidatedContainer<'g> {
    container: RemoteContainer<'g>,
    report: ValidationReport,
}

impl<'g> ValidatedContainer<'g> {
    pub fn state(&self) -> SessionState {
        SessionState::Validated
    }

    pub fn container(&self) -> &RemoteContainer<'g> {
        &self.container
    }

    pub fn report(&self) -> ValidationReport {
        self.report
    }

    /// Write the artifact next to the first source, then delete the remote container
    ///
    /// Remote deletion only happens once the artifact is on disk. A failed
    /// deletion does not fail this call; it is reported through
    /// [`FinalizedContainer::delete_error`]. Any other failure leaves this
    /// handle usable for another attempt.
    pub fn finalize(&self, sources: &[SourceFile]) -> Result<FinalizedContainer<'g>> {
        let gateway = self.container.gateway;
        let assembler = ContainerAssembler::new(gateway.extension());
        // Empty source lists and existing artifacts fail before anything is fetched.
        let path = assembler.artifact_path(sources, self.container.id())?;
        if path.exists() {
            return Err(SigaError::Assembly(format!(
                "artifact already exists: {}",
                path.display()
            )));
        }

        let registered = match self.container.registered {
            Some(ref names) => names.clone(),
            None => self
                .container
                .data_files()?
                .into_iter()
                .map(|f| f.file_name)
                .collect(),
        };
        let base = self.container.container_bytes()?;
        let artifact_path = assembler.assemble(&base, sources, &registered, self.container.id())?;

        let mut finalized = FinalizedContainer {
            container_id: self.container.container_id.clone(),
            gateway,
            artifact_path,
            delete_error: None,
            deleted: false,
        };
        finalized.delete_remote();
        Ok(finalized)
    }
}

// ==================== Finalized / Deleted ====================

/// Terminal handle: the artifact is on disk (state `Finalized` or `Deleted`)
pub struct FinalizedContainer<'g> {
    gateway: &'g ApiGateway,
    container_id: String,
    artifact_path: PathBuf,
    delete_error: Option<SigaError>,
    deleted: bool,
}

impl fmt::Debug for FinalizedContainer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizedContainer")
            .field("container_id", &self.container_id)
            .field("artifact_path", &self.artifact_path)
            .field("delete_error", &self.delete_error)
            .field("deleted", &self.deleted)
            .finish()
    }
}

impl<'g> FinalizedContainer<'g> {
    /// `Deleted` once the remote copy is gone, `Finalized` otherwise
    pub fn state(&self) -> SessionState {
        if self.deleted {
            SessionState::Deleted
        } else {
            SessionState::Finalized
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Why the remote deletion during `finalize` failed, if it did
    pub fn delete_error(&self) -> Option<&SigaError> {
        self.delete_error.as_ref()
    }

    /// Try the remote deletion again
    pub fn retry_delete(&mut self) -> Result<()> {
        if self.deleted {
            return Err(SigaError::SessionPrecondition(format!(
                "container {} has already been deleted",
                self.container_id
            )));
        }
        self.remote().delete()?;
        info!(container_id = %self.container_id, "Remote container deleted");
        self.deleted = true;
        self.delete_error = None;
        Ok(())
    }

    fn remote(&self) -> RemoteContainer<'g> {
        RemoteContainer {
            gateway: self.gateway,
            container_id: self.container_id.clone(),
            registered: None,
        }
    }

    fn delete_remote(&mut self) {
        match self.remote().delete() {
            Ok(()) => {
                info!(container_id = %self.container_id, "Remote container deleted");
                self.deleted = true;
            }
            Err(e) => {
                warn!(container_id = %self.container_id, error = %e, "Remote container deletion failed");
                self.delete_error = Some(e);
            }
        }
    }
}
