//! HTTPS transport: a native-tls acceptor in front of the axum router.

use std::path::Path;

use anyhow::{Context, Result};
use axum::Router;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use tokio::net::TcpListener;
use tokio_native_tls::TlsAcceptor;

/// Builds an acceptor from a PEM certificate chain and a PEM PKCS#8 key.
pub async fn load_acceptor(cert: &Path, key: &Path) -> Result<TlsAcceptor> {
    let cert_pem = tokio::fs::read(cert)
        .await
        .with_context(|| format!("reading TLS certificate {}", cert.display()))?;
    let key_pem = tokio::fs::read(key)
        .await
        .with_context(|| format!("reading TLS key {}", key.display()))?;
    acceptor_from_pem(&cert_pem, &key_pem)
}

pub fn acceptor_from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<TlsAcceptor> {
    let identity = native_tls::Identity::from_pkcs8(cert_pem, key_pem)
        .context("TLS certificate and key do not form a usable identity")?;
    let acceptor = native_tls::TlsAcceptor::new(identity).context("building TLS acceptor")?;
    Ok(TlsAcceptor::from(acceptor))
}

/// Accepts connections forever, one task per connection. Handshake and
/// connection errors are logged and never stop the loop.
pub async fn serve(listener: TcpListener, acceptor: TlsAcceptor, app: Router) -> Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(error = %err, "failed to accept connection");
                continue;
            }
        };
        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(app.clone());

        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::debug!(%peer, error = %err, "TLS handshake failed");
                    return;
                }
            };
            if let Err(err) = Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(%peer, error = %err, "connection closed with error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_pem_is_rejected() {
        assert!(acceptor_from_pem(b"not a cert", b"not a key").is_err());
    }
}
