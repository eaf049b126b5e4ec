//! Detached CMS `SignedData` for `adbe.pkcs7.detached` signatures.
//!
//! openssl builds the structure: content-type, signing-time and
//! message-digest signed attributes, the signer certificate plus chain, and
//! one `SignerInfo` identified by issuer and serial number.

use openssl::cms::{CMSOptions, CmsContentInfo};
use openssl::hash::MessageDigest;
use openssl::pkey::Id;
use openssl::stack::Stack;
use openssl::x509::X509;

use crate::signing::{Credential, DigestAlgorithm, EngineError};

impl DigestAlgorithm {
    pub fn message_digest(&self) -> MessageDigest {
        match self {
            DigestAlgorithm::Sha256 => MessageDigest::sha256(),
        }
    }
}

/// DER `ContentInfo` wrapping a detached `SignedData` over `content`.
///
/// RSA and EC keys sign with their default digest, SHA-256.
pub fn build_detached_signature(
    content: &[u8],
    credential: &Credential,
    digest: DigestAlgorithm,
) -> Result<Vec<u8>, EngineError> {
    let key_type = credential.private_key.id();
    if key_type != Id::RSA && key_type != Id::EC {
        return Err(EngineError::Signing(format!(
            "unsupported signing key type {}",
            key_type.as_raw()
        )));
    }

    let chain = certificate_stack(&credential.chain)
        .map_err(|err| EngineError::Signing(format!("collecting certificate chain: {err}")))?;

    let flags = CMSOptions::DETACHED | CMSOptions::BINARY | CMSOptions::NOSMIMECAP;
    let cms = CmsContentInfo::sign(
        Some(&credential.certificate),
        Some(&credential.private_key),
        Some(&chain),
        Some(content),
        flags,
    )
    .map_err(|err| EngineError::Signing(format!("building CMS signature: {err}")))?;

    tracing::trace!(digest = digest.name(), "CMS signature built");
    cms.to_der()
        .map_err(|err| EngineError::Signing(format!("encoding CMS signature: {err}")))
}

fn certificate_stack(chain: &[X509]) -> Result<Stack<X509>, openssl::error::ErrorStack> {
    let mut stack = Stack::new()?;
    for cert in chain {
        stack.push(cert.clone())?;
    }
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::{self_signed_ec, self_signed_rsa};
    use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
    use openssl::x509::store::X509StoreBuilder;

    fn verify(der: &[u8], content: &[u8]) -> Result<(), openssl::error::ErrorStack> {
        let pkcs7 = Pkcs7::from_der(der)?;
        let certs = Stack::new()?;
        let store = X509StoreBuilder::new()?.build();
        pkcs7.verify(&certs, &store, Some(content), None, Pkcs7Flags::NOVERIFY)
    }

    #[test]
    fn rsa_signature_verifies() {
        let (key, cert) = self_signed_rsa("CMS Test");
        let credential = Credential::new(key, cert, vec![]);
        let content = b"byte range contents";

        let der = build_detached_signature(content, &credential, DigestAlgorithm::Sha256).unwrap();
        verify(&der, content).unwrap();
        assert!(verify(&der, b"tampered").is_err());
    }

    #[test]
    fn ecdsa_signature_verifies() {
        let (key, cert) = self_signed_ec("CMS EC Test");
        let credential = Credential::new(key, cert, vec![]);
        let content = b"%PDF-1.7 body";

        let der = build_detached_signature(content, &credential, DigestAlgorithm::Sha256).unwrap();
        verify(&der, content).unwrap();
    }

    #[test]
    fn signature_is_detached_and_carries_the_chain() {
        let (key, cert) = self_signed_rsa("Leaf");
        let (_, intermediate) = self_signed_ec("Intermediate");
        let credential = Credential::new(key, cert, vec![intermediate]);
        let content = b"detached content";

        let der = build_detached_signature(content, &credential, DigestAlgorithm::Sha256).unwrap();
        assert!(!der.windows(content.len()).any(|window| window == content));

        let pkcs7 = Pkcs7::from_der(&der).unwrap();
        let signed = pkcs7.signed().unwrap();
        assert_eq!(signed.certificates().map(|certs| certs.len()), Some(2));
    }

    #[test]
    fn digest_maps_to_openssl() {
        assert_eq!(
            DigestAlgorithm::Sha256.message_digest().size(),
            MessageDigest::sha256().size()
        );
    }
}
