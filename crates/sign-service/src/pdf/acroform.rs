use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::objects::decode_text_string;
use crate::signing::{EngineError, SignatureField};

const MAX_FIELD_DEPTH: usize = 32;

/// A signature field together with the object that holds it, when the field
/// is an indirect object (and can therefore be updated in place).
#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub id: Option<ObjectId>,
    pub field: SignatureField,
}

/// Follows a single level of indirection.
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object, EngineError> {
    match object {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|err| EngineError::Signing(format!("resolving object {id:?}: {err}"))),
        other => Ok(other),
    }
}

pub fn catalog(doc: &Document) -> Result<(ObjectId, &Dictionary), EngineError> {
    let root = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|err| EngineError::Structural(format!("trailer has no /Root reference: {err}")))?;
    let catalog = doc
        .get_object(root)
        .and_then(Object::as_dict)
        .map_err(|err| EngineError::Structural(format!("unreadable catalog {root:?}: {err}")))?;
    Ok((root, catalog))
}

/// Walks `/AcroForm /Fields`, returning every terminal field whose (possibly
/// inherited) `/FT` is `/Sig`.
pub fn signature_fields(doc: &Document) -> Result<Vec<FieldEntry>, EngineError> {
    let (_, catalog) = catalog(doc)?;
    let Ok(acroform) = catalog.get(b"AcroForm") else {
        return Ok(Vec::new());
    };
    let Ok(acroform) = resolve(doc, acroform)?.as_dict() else {
        return Ok(Vec::new());
    };
    let Ok(fields) = acroform.get(b"Fields") else {
        return Ok(Vec::new());
    };
    let Ok(fields) = resolve(doc, fields)?.as_array() else {
        return Ok(Vec::new());
    };

    let mut walker = FieldWalker {
        doc,
        visited: HashSet::new(),
        found: Vec::new(),
    };
    for field in fields {
        walker.visit(field, None, None, 0)?;
    }
    Ok(walker.found)
}

struct FieldWalker<'a> {
    doc: &'a Document,
    visited: HashSet<ObjectId>,
    found: Vec<FieldEntry>,
}

impl<'a> FieldWalker<'a> {
    fn visit(
        &mut self,
        node: &'a Object,
        parent_name: Option<&str>,
        inherited_type: Option<&'a [u8]>,
        depth: usize,
    ) -> Result<(), EngineError> {
        if depth > MAX_FIELD_DEPTH {
            return Err(EngineError::Signing("form field tree is too deep".to_string()));
        }

        let id = match node {
            Object::Reference(id) => {
                if !self.visited.insert(*id) {
                    return Ok(());
                }
                Some(*id)
            }
            _ => None,
        };
        let Ok(dict) = resolve(self.doc, node)?.as_dict() else {
            return Ok(());
        };

        let partial = match dict.get(b"T") {
            Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
            _ => None,
        };
        let name = match (parent_name, partial) {
            (Some(parent), Some(partial)) => Some(format!("{parent}.{partial}")),
            (None, Some(partial)) => Some(partial),
            (Some(parent), None) => Some(parent.to_string()),
            (None, None) => None,
        };
        let field_type = match dict.get(b"FT") {
            Ok(Object::Name(name)) => Some(name.as_slice()),
            _ => inherited_type,
        };

        let kids = match dict.get(b"Kids") {
            Ok(kids) => resolve(self.doc, kids)?.as_array().ok(),
            Err(_) => None,
        };
        let has_field_kids = kids
            .map(|kids| kids.iter().any(|kid| self.is_named_field(kid)))
            .unwrap_or(false);

        if has_field_kids {
            for kid in kids.into_iter().flatten() {
                self.visit(kid, name.as_deref(), field_type, depth + 1)?;
            }
            return Ok(());
        }

        if field_type == Some(b"Sig".as_slice()) {
            if let Some(name) = name {
                let filled = !matches!(dict.get(b"V"), Err(_) | Ok(Object::Null));
                self.found.push(FieldEntry {
                    id,
                    field: SignatureField { name, filled },
                });
            }
        }
        Ok(())
    }

    /// Kids carrying `/T` are child fields; the rest are widget annotations.
    fn is_named_field(&self, kid: &Object) -> bool {
        resolve(self.doc, kid)
            .ok()
            .and_then(|kid| kid.as_dict().ok())
            .map(|kid| kid.has(b"T"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{StringFormat, dictionary};

    fn text(value: &str) -> Object {
        Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
    }

    fn document_with_fields(build: impl FnOnce(&mut Document) -> Vec<Object>) -> Document {
        let mut doc = Document::with_version("1.7");
        let fields = build(&mut doc);
        let acroform = doc.add_object(dictionary! { "Fields" => fields });
        let catalog = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "AcroForm" => acroform,
        });
        doc.trailer.set("Root", catalog);
        doc
    }

    #[test]
    fn no_acroform_means_no_fields() {
        let mut doc = Document::with_version("1.7");
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog" });
        doc.trailer.set("Root", catalog);
        assert!(signature_fields(&doc).unwrap().is_empty());
    }

    #[test]
    fn finds_filled_and_empty_signature_fields() {
        let doc = document_with_fields(|doc| {
            let sig_value = doc.add_object(dictionary! { "Type" => "Sig" });
            let filled = doc.add_object(dictionary! {
                "FT" => "Sig",
                "T" => text("FirmaDigital"),
                "V" => sig_value,
            });
            let empty = doc.add_object(dictionary! {
                "FT" => "Sig",
                "T" => text("FirmaDigital_2"),
            });
            let text_field = doc.add_object(dictionary! {
                "FT" => "Tx",
                "T" => text("Name"),
            });
            vec![filled.into(), empty.into(), text_field.into()]
        });

        let fields = signature_fields(&doc).unwrap();
        let summary: Vec<(&str, bool)> = fields
            .iter()
            .map(|entry| (entry.field.name.as_str(), entry.field.filled))
            .collect();
        assert_eq!(summary, vec![("FirmaDigital", true), ("FirmaDigital_2", false)]);
        assert!(fields.iter().all(|entry| entry.id.is_some()));
    }

    #[test]
    fn qualifies_names_and_inherits_type() {
        let doc = document_with_fields(|doc| {
            let child = doc.add_object(dictionary! { "T" => text("Approver") });
            let parent = doc.add_object(dictionary! {
                "FT" => "Sig",
                "T" => text("Signatures"),
                "Kids" => vec![child.into()],
            });
            vec![parent.into()]
        });

        let fields = signature_fields(&doc).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field.name, "Signatures.Approver");
        assert!(!fields[0].field.filled);
    }

    #[test]
    fn widget_kids_do_not_split_the_field() {
        let doc = document_with_fields(|doc| {
            let widget = doc.add_object(dictionary! { "Subtype" => "Widget" });
            let field = doc.add_object(dictionary! {
                "FT" => "Sig",
                "T" => text("FirmaDigital"),
                "Kids" => vec![widget.into()],
            });
            vec![field.into()]
        });

        let fields = signature_fields(&doc).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field.name, "FirmaDigital");
    }

    #[test]
    fn missing_root_is_structural() {
        let doc = Document::with_version("1.7");
        let err = catalog(&doc).unwrap_err();
        assert!(err.is_structural());
    }
}
