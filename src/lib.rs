//! Rust client for the SiGa hashcode signing gateway
//!
//! Builds a hashcode container (file digests only), drives the remote
//! signing session over the HMAC-authenticated REST API and merges the
//! signed container with the original files into an ASiC-E artifact.
//!
//! # Example
//!
//! ```rust,no_run
//! use siga_client::{ApiGateway, ClientConfig, SigningSession, SourceFile};
//!
//! # fn example(signer: impl Fn(&str) -> String) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_file("/etc/siga/client.toml")?;
//! let gateway = ApiGateway::new(&config)?;
//!
//! let sources = vec![SourceFile::from_path("/data/a.txt")?];
//! let open = SigningSession::new(&gateway).create_container_from_sources(&sources)?;
//!
//! // The certificate holder signs `data_to_sign_hash` outside this crate.
//! let (awaiting, to_sign) = open.prepare_signing("3082...")?;
//! let signature_hex = signer(&to_sign.data_to_sign_hash);
//!
//! let finalized = awaiting
//!     .finalize_signing(&to_sign.generated_signature_id, &signature_hex)?
//!     .validate()?
//!     .finalize(&sources)?;
//!
//! if let Some(err) = finalized.delete_error() {
//!     eprintln!("remote container was not deleted: {}", err);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod container;
pub mod digest;
pub mod error;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types
pub use auth::{AuthHeaders, RequestAuthenticator};
pub use client::ApiGateway;
pub use config::{ClientConfig, RequestCredentials};
pub use container::{ContainerArchive, ContainerAssembler, SourceFile};
pub use digest::{DigestAlgorithm, DigestFile, HashcodeDataFile};
pub use error::{Result, SigaError};
pub use session::{
    AwaitingSignature, CertificateChoiceStatus, DataToSign, FinalizedContainer, OpenContainer,
    RemoteContainer, SessionState, SignedContainer, SigningMethod, SigningSession,
    ValidatedContainer,
};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::*;
