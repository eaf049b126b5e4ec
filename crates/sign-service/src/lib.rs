pub mod error;
pub mod pdf;
pub mod server;
pub mod signing;

pub use error::SignServiceError;
pub use pdf::PdfSigningEngine;
pub use server::{AppState, ServerConfig, router, run};
pub use signing::{SigningEngine, SigningRequest, sign_request};
