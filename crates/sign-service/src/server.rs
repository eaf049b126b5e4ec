pub mod tls;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::error::SignServiceError;
use crate::signing::{SigningEngine, SigningRequest, sign_request};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Startup configuration, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls_cert: PathBuf,
    pub tls_key: PathBuf,
    pub scratch_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            tls_cert: PathBuf::from("certs/cert.pem"),
            tls_key: PathBuf::from("certs/key.pem"),
            scratch_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn SigningEngine>,
    pub scratch_root: Option<Arc<PathBuf>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(engine: Arc<dyn SigningEngine>) -> Self {
        Self {
            engine,
            scratch_root: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(Arc::new(root.into()));
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}

pub fn router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/healthcheck", get(|| async move { (StatusCode::OK, "Ok").into_response() }))
        .route("/sign-pdf", post(sign_pdf_handler))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

pub async fn run(config: ServerConfig, engine: Arc<dyn SigningEngine>) -> Result<()> {
    let mut state = AppState::new(engine).with_max_upload_bytes(config.max_upload_bytes);
    if let Some(root) = &config.scratch_dir {
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("creating scratch directory {}", root.display()))?;
        state = state.with_scratch_root(root.clone());
    }
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    if tls_material_present(&config.tls_cert, &config.tls_key) {
        let acceptor = tls::load_acceptor(&config.tls_cert, &config.tls_key).await?;
        tracing::info!(%addr, cert = %config.tls_cert.display(), "serving HTTPS");
        tls::serve(listener, acceptor, app).await
    } else {
        tracing::warn!(
            %addr,
            cert = %config.tls_cert.display(),
            key = %config.tls_key.display(),
            "TLS certificate or key not found, serving plain HTTP"
        );
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .context("HTTP server failed")
    }
}

fn tls_material_present(cert: &Path, key: &Path) -> bool {
    cert.is_file() && key.is_file()
}

async fn sign_pdf_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, SignServiceError> {
    let multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "request is not a multipart upload");
        SignServiceError::missing_files()
    })?;
    let request = read_upload(multipart).await?;
    tracing::info!(
        pdf_bytes = request.pdf.len(),
        p12_bytes = request.credential.len(),
        "signing request received"
    );

    let engine = state.engine.clone();
    let scratch_root = state.scratch_root.clone();
    let signed = tokio::task::spawn_blocking(move || {
        sign_request(engine.as_ref(), scratch_root.as_deref().map(PathBuf::as_path), request)
    })
    .await
    .map_err(|err| anyhow::anyhow!("signing worker failed: {err}"))??;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"signed.pdf\""),
        ],
        signed,
    )
        .into_response())
}

/// Collects the `pdf`, `p12` and `password` parts. Unknown parts are
/// ignored; an absent or empty file part is a missing input.
async fn read_upload(mut multipart: Multipart) -> Result<SigningRequest, SignServiceError> {
    let mut pdf = None;
    let mut credential = None;
    let mut password = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| SignServiceError::MalformedUpload(err.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "pdf" | "p12" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| SignServiceError::MalformedUpload(err.body_text()))?;
                if name == "pdf" {
                    pdf = Some(bytes.to_vec());
                } else {
                    credential = Some(bytes.to_vec());
                }
            }
            "password" => {
                password = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| SignServiceError::MalformedUpload(err.body_text()))?,
                );
            }
            other => tracing::debug!(field = other, "ignoring unexpected multipart field"),
        }
    }

    match (pdf, credential) {
        (Some(pdf), Some(credential)) if !pdf.is_empty() && !credential.is_empty() => {
            Ok(SigningRequest {
                pdf,
                credential,
                password: password.unwrap_or_default(),
            })
        }
        _ => Err(SignServiceError::missing_files()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_listens_on_5001() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5001);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn tls_requires_both_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        assert!(!tls_material_present(&cert, &key));

        std::fs::write(&cert, "cert").unwrap();
        assert!(!tls_material_present(&cert, &key));

        std::fs::write(&key, "key").unwrap();
        assert!(tls_material_present(&cert, &key));
    }
}
