mod engine;
mod fallback;
mod fields;
mod request;
mod staging;

pub use engine::{
    Credential, DigestAlgorithm, EngineError, SignParams, SignatureField, SigningEngine,
    fingerprint, mentions_xref_defect,
};
pub use fallback::{SigningOutcome, Strategy, sign_with_fallback};
pub use fields::{BASE_FIELD_NAME, FieldInventory, negotiate_field_name};
pub use request::{SigningRequest, sign_request};
pub use staging::Scratch;
