//! Incremental PDF signing engine.
//!
//! Signs a document by appending one revision that holds the signature
//! dictionary, the signature field (reused when an empty field of the
//! requested name exists), and the updated page, form and catalog objects.
//! The original bytes are never rewritten.

mod acroform;
mod byterange;
mod cms;
mod credential;
mod incremental;
mod objects;
#[cfg(test)]
mod test_support;

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat, dictionary};
use openssl::nid::Nid;

use crate::signing::{Credential, EngineError, SignParams, SignatureField, SigningEngine};

use acroform::{FieldEntry, catalog};
use byterange::{BYTE_RANGE_PLACEHOLDER, ByteRange};
use incremental::IncrementalUpdate;
use objects::{encode_text_string, write_literal_string};

/// Room reserved for the CMS blob beyond the embedded certificates.
const SIGNATURE_OVERHEAD: usize = 8192;

/// Annotation flags Print | Locked.
const WIDGET_FLAGS: i64 = 132;

/// SignaturesExist | AppendOnly.
const SIG_FLAGS: i64 = 3;

/// Signs PDFs with `adbe.pkcs7.detached` signatures through incremental
/// updates.
#[derive(Debug, Default, Clone)]
pub struct PdfSigningEngine;

impl PdfSigningEngine {
    pub fn new() -> Self {
        Self
    }
}

impl SigningEngine for PdfSigningEngine {
    fn load_credential(&self, container: &[u8], password: &str) -> Result<Credential, EngineError> {
        credential::load_pkcs12(container, password)
    }

    fn signature_fields(&self, pdf: &[u8]) -> Result<Vec<SignatureField>, EngineError> {
        let doc = load_document(pdf)?;
        Ok(acroform::signature_fields(&doc)?
            .into_iter()
            .map(|entry| entry.field)
            .collect())
    }

    fn sign(
        &self,
        pdf: &[u8],
        params: &SignParams,
        credential: &Credential,
    ) -> Result<Vec<u8>, EngineError> {
        let doc = load_document(pdf)?;
        if doc.is_encrypted() {
            return Err(EngineError::Signing(
                "encrypted documents cannot be signed".to_string(),
            ));
        }
        let digest = params.digest.unwrap_or_default();
        let signing_time = Utc::now();

        let fields = acroform::signature_fields(&doc)?;
        let mut update = IncrementalUpdate::new(pdf, &doc)?;
        let sig_id = update.allocate();

        let target = match params.field_name.as_deref() {
            Some(name) => find_target(&fields, name)?,
            None => FieldTarget::New(default_field_name(&fields)),
        };
        attach_field(&doc, &mut update, target, sig_id)?;

        let range = ByteRange::with_capacity(signature_capacity(credential));
        let sig_dict = SignatureDictionary::render(&range, credential, signing_time);
        update.put_raw(sig_id, sig_dict.body);

        let assembled = update.assemble();
        let sig_offset = assembled.body_offset(sig_id).ok_or_else(|| {
            EngineError::Signing("signature dictionary missing from update".to_string())
        })?;
        let mut signed = assembled.bytes;

        let contents_offset = sig_offset + sig_dict.contents_at;
        let byte_range = range.calculate(signed.len(), contents_offset);
        ByteRange::write_range(&mut signed, sig_offset + sig_dict.byte_range_at, &byte_range)?;

        let covered = ByteRange::signed_bytes(&signed, &byte_range)?;
        let signature = cms::build_detached_signature(&covered, credential, digest)?;
        range.insert_signature(&mut signed, contents_offset, &signature)?;

        tracing::debug!(
            digest = digest.name(),
            signature_bytes = signature.len(),
            byte_range = ?byte_range,
            "signature embedded"
        );
        Ok(signed)
    }
}

fn load_document(pdf: &[u8]) -> Result<Document, EngineError> {
    Document::load_mem(pdf).map_err(parse_error)
}

/// Cross-reference, trailer and offset failures are structural; any other
/// parse failure is not.
fn parse_error(err: lopdf::Error) -> EngineError {
    match err {
        lopdf::Error::Xref(_) | lopdf::Error::Trailer | lopdf::Error::Offset(_) => {
            EngineError::Structural(format!("cannot parse PDF: {err}"))
        }
        other => EngineError::Signing(format!("cannot parse PDF: {other}")),
    }
}

fn signature_capacity(credential: &Credential) -> usize {
    let certificates: usize = std::iter::once(&credential.certificate)
        .chain(credential.chain.iter())
        .map(|cert| cert.to_der().map(|der| der.len()).unwrap_or(4096))
        .sum();
    certificates + SIGNATURE_OVERHEAD
}

enum FieldTarget {
    Existing(ObjectId),
    New(String),
}

fn find_target(fields: &[FieldEntry], name: &str) -> Result<FieldTarget, EngineError> {
    let Some(entry) = fields.iter().find(|entry| entry.field.name == name) else {
        if name.contains('.') {
            return Err(EngineError::Signing(format!(
                "cannot create nested signature field '{name}'"
            )));
        }
        return Ok(FieldTarget::New(name.to_string()));
    };
    if entry.field.filled {
        return Err(EngineError::Signing(format!(
            "signature field '{name}' is already filled"
        )));
    }
    match entry.id {
        Some(id) => Ok(FieldTarget::Existing(id)),
        None => Err(EngineError::Signing(format!(
            "signature field '{name}' is not an indirect object"
        ))),
    }
}

/// `Signature1`, `Signature2`, ... whichever is free first.
fn default_field_name(fields: &[FieldEntry]) -> String {
    (1..)
        .map(|n| format!("Signature{n}"))
        .find(|candidate| fields.iter().all(|entry| &entry.field.name != candidate))
        .unwrap_or_else(|| "Signature".to_string())
}

/// Points the target field at `sig_id`, creating the field and its widget
/// when needed, and queues every object that changes as a result.
fn attach_field(
    doc: &Document,
    update: &mut IncrementalUpdate<'_>,
    target: FieldTarget,
    sig_id: ObjectId,
) -> Result<(), EngineError> {
    let (root_id, catalog) = catalog(doc)?;
    let mut catalog = catalog.clone();
    let mut catalog_changed = false;

    let (acroform_id, mut acroform) = match catalog.get(b"AcroForm") {
        Ok(Object::Reference(id)) => (*id, owned_dict(doc, *id)?),
        Ok(Object::Dictionary(inline)) => (update.allocate(), inline.clone()),
        _ => (update.allocate(), Dictionary::new()),
    };
    if !matches!(catalog.get(b"AcroForm"), Ok(Object::Reference(id)) if *id == acroform_id) {
        catalog.set("AcroForm", acroform_id);
        catalog_changed = true;
    }

    match target {
        FieldTarget::Existing(field_id) => {
            let mut field = owned_dict(doc, field_id)?;
            field.set("V", sig_id);
            update.put(field_id, &Object::Dictionary(field));
        }
        FieldTarget::New(name) => {
            let (_, page_id) = doc.get_pages().into_iter().next().ok_or_else(|| {
                EngineError::Signing("document has no pages".to_string())
            })?;
            let field_id = update.allocate();
            let widget = dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "FT" => "Sig",
                "T" => Object::String(encode_text_string(&name), StringFormat::Literal),
                "V" => sig_id,
                "F" => WIDGET_FLAGS,
                "Rect" => vec![0.into(), 0.into(), 0.into(), 0.into()],
                "P" => page_id,
            };
            update.put(field_id, &Object::Dictionary(widget));

            let mut page = owned_dict(doc, page_id)?;
            if let Some(page_annots) = append_to_array(doc, update, &mut page, b"Annots", field_id)? {
                update.put(page_id, &Object::Dictionary(page_annots));
            }
            if let Some(form) = append_to_array(doc, update, &mut acroform, b"Fields", field_id)? {
                acroform = form;
            }
        }
    }

    acroform.set("SigFlags", SIG_FLAGS);
    update.put(acroform_id, &Object::Dictionary(acroform));
    if catalog_changed {
        update.put(root_id, &Object::Dictionary(catalog));
    }
    Ok(())
}

/// Appends `item` to the array stored under `key`. An indirect array gets a
/// new revision of its own and `None` is returned; otherwise the updated
/// owning dictionary is returned for the caller to queue.
fn append_to_array(
    doc: &Document,
    update: &mut IncrementalUpdate<'_>,
    owner: &mut Dictionary,
    key: &[u8],
    item: ObjectId,
) -> Result<Option<Dictionary>, EngineError> {
    match owner.get(key) {
        Ok(Object::Reference(array_id)) => {
            let array_id = *array_id;
            let mut items = doc
                .get_object(array_id)
                .and_then(Object::as_array)
                .map_err(|err| EngineError::Signing(format!("/{} is not an array: {err}", show(key))))?
                .clone();
            items.push(item.into());
            update.put(array_id, &Object::Array(items));
            Ok(None)
        }
        Ok(Object::Array(inline)) => {
            let mut items = inline.clone();
            items.push(item.into());
            owner.set(key.to_vec(), items);
            Ok(Some(owner.clone()))
        }
        _ => {
            owner.set(key.to_vec(), vec![Object::from(item)]);
            Ok(Some(owner.clone()))
        }
    }
}

fn owned_dict(doc: &Document, id: ObjectId) -> Result<Dictionary, EngineError> {
    doc.get_object(id)
        .and_then(Object::as_dict)
        .cloned()
        .map_err(|err| EngineError::Signing(format!("object {id:?} is not a dictionary: {err}")))
}

fn show(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

/// Serialized signature dictionary with the offsets of its two placeholders.
struct SignatureDictionary {
    body: Vec<u8>,
    byte_range_at: usize,
    contents_at: usize,
}

impl SignatureDictionary {
    fn render(range: &ByteRange, credential: &Credential, signing_time: DateTime<Utc>) -> Self {
        let mut body = Vec::new();
        body.extend_from_slice(
            b"<<\n/Type /Sig\n/Filter /Adobe.PPKLite\n/SubFilter /adbe.pkcs7.detached\n/ByteRange ",
        );
        let byte_range_at = body.len();
        body.extend_from_slice(BYTE_RANGE_PLACEHOLDER.as_bytes());
        body.extend_from_slice(b"\n/Contents ");
        let contents_at = body.len();
        body.extend_from_slice(range.contents_placeholder().as_bytes());
        body.extend_from_slice(b"\n/M ");
        write_literal_string(&mut body, pdf_date(signing_time).as_bytes());
        if let Some(name) = signer_name(credential) {
            body.extend_from_slice(b"\n/Name ");
            write_literal_string(&mut body, &encode_text_string(&name));
        }
        body.extend_from_slice(b"\n>>");
        Self {
            body,
            byte_range_at,
            contents_at,
        }
    }
}

fn pdf_date(time: DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

fn signer_name(credential: &Credential) -> Option<String> {
    credential
        .certificate
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|name| name.to_string())
}
