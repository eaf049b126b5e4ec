use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;

/// Digest used for the message digest and the signer's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
}

impl DigestAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
        }
    }
}

/// A signature slot found in a document's form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureField {
    /// Fully qualified field name (`parent.child`).
    pub name: String,
    /// Whether the field already carries a signature value.
    pub filled: bool,
}

/// Per-attempt signing parameters.
///
/// `None` leaves the choice to the engine: a default field name, and the
/// engine's default digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignParams {
    pub field_name: Option<String>,
    pub digest: Option<DigestAlgorithm>,
}

/// Private key and certificate chain unlocked from a PKCS#12 container.
pub struct Credential {
    pub private_key: PKey<Private>,
    pub certificate: X509,
    pub chain: Vec<X509>,
}

impl Credential {
    pub fn new(private_key: PKey<Private>, certificate: X509, chain: Vec<X509>) -> Self {
        Self {
            private_key,
            certificate,
            chain,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("certificate", &fingerprint(&self.certificate))
            .field("private_key", &"[REDACTED]")
            .field("chain", &format!("{} certificates", self.chain.len()))
            .finish()
    }
}

/// Hex SHA-256 of the certificate's DER, for logs.
pub fn fingerprint(certificate: &X509) -> String {
    certificate
        .digest(MessageDigest::sha256())
        .map(|digest| hex::encode(&*digest))
        .unwrap_or_else(|_| "unavailable".to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to load PKCS#12 credential: {0}")]
    Credential(String),
    #[error("malformed cross-reference structure: {0}")]
    Structural(String),
    #[error("{0}")]
    Signing(String),
}

impl EngineError {
    /// True when the failure comes from a broken or hybrid cross-reference
    /// table, the only class of failure that warrants another attempt.
    ///
    /// Engines that cannot tell the classes apart report `Signing`; those
    /// messages are inspected for the usual xref wording.
    pub fn is_structural(&self) -> bool {
        match self {
            EngineError::Structural(_) => true,
            EngineError::Signing(message) => mentions_xref_defect(message),
            EngineError::Credential(_) => false,
        }
    }
}

pub fn mentions_xref_defect(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("hybrid cross-reference") || message.contains("xref")
}

/// The PDF signing collaborator used by the request handler.
///
/// Implementations are sync: signing is CPU-bound, and the handler runs
/// them on the blocking pool.
pub trait SigningEngine: Send + Sync {
    /// Unlock a PKCS#12 container with `password`.
    fn load_credential(&self, container: &[u8], password: &str) -> Result<Credential, EngineError>;

    /// List the signature fields present in `pdf`.
    fn signature_fields(&self, pdf: &[u8]) -> Result<Vec<SignatureField>, EngineError>;

    /// Sign `pdf`, returning the complete signed document.
    fn sign(
        &self,
        pdf: &[u8],
        params: &SignParams,
        credential: &Credential,
    ) -> Result<Vec<u8>, EngineError>;
}
