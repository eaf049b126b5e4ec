use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Uploads a PDF and a PKCS#12 credential to the sign service and stores the
/// signed document.
#[derive(Parser)]
struct Args {
    #[clap(long, env = "SIGN_SERVICE_URL", default_value = "https://127.0.0.1:5001")]
    url: String,
    #[clap(long)]
    pdf: PathBuf,
    #[clap(long)]
    p12: PathBuf,
    #[clap(long, env = "SIGN_P12_PASSWORD", default_value = "")]
    password: String,
    #[clap(long, default_value = "signed.pdf")]
    out: PathBuf,
    /// Accept self-signed server certificates
    #[clap(long)]
    insecure: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let pdf = tokio::fs::read(&args.pdf)
        .await
        .with_context(|| format!("reading {}", args.pdf.display()))?;
    let p12 = tokio::fs::read(&args.p12)
        .await
        .with_context(|| format!("reading {}", args.p12.display()))?;

    let form = Form::new()
        .part("pdf", file_part(pdf, &args.pdf, "application/pdf")?)
        .part("p12", file_part(p12, &args.p12, "application/x-pkcs12")?)
        .text("password", args.password);

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(args.insecure)
        .build()
        .context("building HTTP client")?;

    let endpoint = format!("{}/sign-pdf", args.url.trim_end_matches('/'));
    tracing::info!(%endpoint, "uploading document");
    let response = client
        .post(&endpoint)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("sending request to {endpoint}"))?;

    let status = response.status();
    if !status.is_success() {
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        bail!("sign service answered {status}: {message}");
    }

    let signed = response.bytes().await.context("reading signed document")?;
    tokio::fs::write(&args.out, &signed)
        .await
        .with_context(|| format!("writing {}", args.out.display()))?;
    tracing::info!(out = %args.out.display(), bytes = signed.len(), "signed document saved");
    Ok(())
}

fn file_part(bytes: Vec<u8>, path: &std::path::Path, mime: &str) -> Result<Part> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime)
        .context("invalid content type")
}
