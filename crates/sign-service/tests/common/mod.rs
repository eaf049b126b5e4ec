#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use axum::body::Body;
use axum::http::{Request, header};
use pdf_sign_service::signing::{
    Credential, EngineError, SignParams, SignatureField, SigningEngine,
};

#[path = "../../src/pdf/test_support.rs"]
mod fixtures;

pub use fixtures::{one_page_pdf, self_signed_ec, self_signed_pkcs12, self_signed_rsa};

pub const BOUNDARY: &str = "sign-service-test-boundary";

pub enum Part<'a> {
    File(&'a str, &'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn sign_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/sign-pdf")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Engine double: accepts one password, reports a fixed field list and
/// answers `sign` calls from a script, recording the parameters it saw.
pub struct ScriptedEngine {
    password: String,
    fields: Vec<SignatureField>,
    script: Mutex<VecDeque<Result<Vec<u8>, EngineError>>>,
    pub sign_calls: Mutex<Vec<SignParams>>,
    pub credential_calls: Mutex<usize>,
}

impl ScriptedEngine {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            fields: Vec::new(),
            script: Mutex::new(VecDeque::new()),
            sign_calls: Mutex::new(Vec::new()),
            credential_calls: Mutex::new(0),
        }
    }

    pub fn with_fields(mut self, fields: &[(&str, bool)]) -> Self {
        self.fields = fields
            .iter()
            .map(|(name, filled)| SignatureField {
                name: name.to_string(),
                filled: *filled,
            })
            .collect();
        self
    }

    pub fn then_sign(self, document: &[u8]) -> Self {
        self.script.lock().unwrap().push_back(Ok(document.to_vec()));
        self
    }

    pub fn then_fail(self, error: EngineError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn sign_params(&self) -> Vec<SignParams> {
        self.sign_calls.lock().unwrap().clone()
    }

    pub fn credential_loads(&self) -> usize {
        *self.credential_calls.lock().unwrap()
    }
}

impl SigningEngine for ScriptedEngine {
    fn load_credential(&self, _container: &[u8], password: &str) -> Result<Credential, EngineError> {
        *self.credential_calls.lock().unwrap() += 1;
        if password != self.password {
            return Err(EngineError::Credential("mac verify failure".to_string()));
        }
        let (key, cert) = self_signed_ec("Scripted Signer");
        Ok(Credential::new(key, cert, Vec::new()))
    }

    fn signature_fields(&self, _pdf: &[u8]) -> Result<Vec<SignatureField>, EngineError> {
        Ok(self.fields.clone())
    }

    fn sign(
        &self,
        _pdf: &[u8],
        params: &SignParams,
        _credential: &Credential,
    ) -> Result<Vec<u8>, EngineError> {
        self.sign_calls.lock().unwrap().push(params.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::Signing("script exhausted".to_string())))
    }
}
