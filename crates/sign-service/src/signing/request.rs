use std::path::Path;

use crate::error::SignServiceError;

use super::engine::SigningEngine;
use super::fallback::{SigningOutcome, sign_with_fallback};
use super::fields::FieldInventory;
use super::staging::Scratch;

/// One upload, as received by `POST /sign-pdf`.
pub struct SigningRequest {
    pub pdf: Vec<u8>,
    pub credential: Vec<u8>,
    pub password: String,
}

impl std::fmt::Debug for SigningRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningRequest")
            .field("pdf", &format!("{} bytes", self.pdf.len()))
            .field("credential", &format!("{} bytes", self.credential.len()))
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Runs a request through staging, credential loading, field negotiation
/// and the layered signing attempts.
///
/// 1. Stages the PDF and the PKCS#12 container in a fresh scratch directory.
/// 2. Unlocks the credential.
/// 3. Negotiates the signature field name.
/// 4. Signs, falling back on cross-reference defects.
/// 5. Passes the signed bytes through the scratch directory and returns them.
///
/// Blocking; call it from the blocking pool.
pub fn sign_request(
    engine: &dyn SigningEngine,
    scratch_root: Option<&Path>,
    request: SigningRequest,
) -> Result<Vec<u8>, SignServiceError> {
    let scratch = Scratch::create(scratch_root).map_err(SignServiceError::Staging)?;

    let pdf_path = scratch
        .stage("input.pdf", &request.pdf)
        .map_err(SignServiceError::Staging)?;
    let p12_path = scratch
        .stage("credential.p12", &request.credential)
        .map_err(SignServiceError::Staging)?;
    drop(request.pdf);
    drop(request.credential);

    let container = scratch.read(&p12_path).map_err(SignServiceError::Staging)?;
    let credential = engine
        .load_credential(&container, &request.password)
        .map_err(|err| SignServiceError::Credential(err.to_string()))?;

    let pdf = scratch.read(&pdf_path).map_err(SignServiceError::Staging)?;

    let inventory = match engine.signature_fields(&pdf) {
        Ok(fields) => FieldInventory::from_fields(&fields),
        Err(err) => {
            tracing::warn!(error = %err, "could not enumerate signature fields, assuming none");
            FieldInventory::default()
        }
    };
    let field_name = inventory.negotiate();
    tracing::debug!(
        existing = inventory.existing.len(),
        filled = inventory.filled.len(),
        field = %field_name,
        "negotiated signature field"
    );

    let signed = match sign_with_fallback(engine, &pdf, &credential, &field_name) {
        SigningOutcome::Signed { document, .. } => document,
        SigningOutcome::Failed { cause, attempted } => {
            let attempted: Vec<&str> = attempted.iter().map(|s| s.name()).collect();
            tracing::error!(error = %cause, attempted = ?attempted, "all signing attempts failed");
            return Err(if cause.is_structural() {
                SignServiceError::StructuralSigning(cause.to_string())
            } else {
                SignServiceError::OtherSigning(cause.to_string())
            });
        }
    };

    let signed_path = scratch
        .stage("signed.pdf", &signed)
        .map_err(SignServiceError::Staging)?;
    let signed = scratch.read(&signed_path).map_err(SignServiceError::Staging)?;

    if let Err(err) = scratch.close() {
        tracing::warn!(error = %err, "failed to remove scratch directory");
    }
    Ok(signed)
}
