use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use pdf_sign_service::{PdfSigningEngine, ServerConfig, SigningEngine, run};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Args {
    #[clap(long, env = "SIGN_HOST", default_value = "0.0.0.0")]
    host: String,
    #[clap(long, env = "SIGN_PORT", default_value = "5001")]
    port: u16,

    // HTTPS is used only when both files exist
    #[clap(long, env = "SIGN_TLS_CERT", default_value = "certs/cert.pem")]
    tls_cert: PathBuf,
    #[clap(long, env = "SIGN_TLS_KEY", default_value = "certs/key.pem")]
    tls_key: PathBuf,

    /// Parent directory for per-request scratch directories (system temp dir if unset)
    #[clap(long, env = "SIGN_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
    #[clap(long, env = "SIGN_MAX_UPLOAD_BYTES", default_value = "52428800")]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        tls_cert: args.tls_cert,
        tls_key: args.tls_key,
        scratch_dir: args.scratch_dir,
        max_upload_bytes: args.max_upload_bytes,
    };

    let engine: Arc<dyn SigningEngine> = Arc::new(PdfSigningEngine::new());
    tracing::info!(host = %config.host, port = config.port, "starting sign service");
    run(config, engine).await
}
