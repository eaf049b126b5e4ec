use openssl::pkcs12::Pkcs12;
use openssl::stack::Stack;
use openssl::x509::X509;

use crate::signing::{Credential, EngineError};

/// Unlocks a DER PKCS#12 container.
///
/// The container must carry both a private key and its certificate; any
/// additional certificates become the chain embedded in the signature.
pub fn load_pkcs12(container: &[u8], password: &str) -> Result<Credential, EngineError> {
    let pkcs12 = Pkcs12::from_der(container)
        .map_err(|err| EngineError::Credential(format!("not a PKCS#12 container: {err}")))?;

    let parsed = pkcs12.parse2(password).map_err(|err| {
        EngineError::Credential(format!("wrong password or corrupt container: {err}"))
    })?;

    let private_key = parsed
        .pkey
        .ok_or_else(|| EngineError::Credential("container holds no private key".to_string()))?;
    let certificate = parsed
        .cert
        .ok_or_else(|| EngineError::Credential("container holds no certificate".to_string()))?;

    if !certificate
        .public_key()
        .map(|public| private_key.public_eq(&public))
        .unwrap_or(false)
    {
        return Err(EngineError::Credential(
            "private key does not match the certificate".to_string(),
        ));
    }

    let chain = parsed.ca.map(chain_from_stack).unwrap_or_default();

    Ok(Credential::new(private_key, certificate, chain))
}

fn chain_from_stack(stack: Stack<X509>) -> Vec<X509> {
    stack.into_iter().collect()
}
