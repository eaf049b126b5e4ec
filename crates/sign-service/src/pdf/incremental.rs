//! Incremental updates: new object revisions appended after the original
//! bytes, followed by a cross-reference section that chains to the previous
//! one through `/Prev`.

use std::collections::BTreeMap;
use std::io::Write;

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::objects::{write_dictionary, write_object};
use crate::signing::EngineError;

/// Offset of the last cross-reference section, read from the final
/// `startxref` keyword.
pub fn last_startxref(pdf: &[u8]) -> Result<usize, EngineError> {
    const KEYWORD: &[u8] = b"startxref";
    let position = pdf
        .windows(KEYWORD.len())
        .rposition(|window| window == KEYWORD)
        .ok_or_else(|| EngineError::Structural("startxref keyword not found".to_string()))?;

    let digits: String = pdf[position + KEYWORD.len()..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();

    let offset: usize = digits
        .parse()
        .map_err(|_| EngineError::Structural("startxref offset is not a number".to_string()))?;
    if offset >= pdf.len() {
        return Err(EngineError::Structural(format!(
            "startxref offset {offset} lies beyond the end of the file"
        )));
    }
    Ok(offset)
}

/// Objects queued for one incremental revision.
pub struct IncrementalUpdate<'a> {
    original: &'a [u8],
    prev_startxref: usize,
    trailer: Dictionary,
    next_id: u32,
    objects: BTreeMap<ObjectId, Vec<u8>>,
}

/// The laid out file plus where each new object landed.
pub struct Assembled {
    pub bytes: Vec<u8>,
    body_offsets: BTreeMap<ObjectId, usize>,
}

impl Assembled {
    /// Offset of the first byte after `N G obj\n` for `id`.
    pub fn body_offset(&self, id: ObjectId) -> Option<usize> {
        self.body_offsets.get(&id).copied()
    }
}

impl<'a> IncrementalUpdate<'a> {
    pub fn new(original: &'a [u8], doc: &Document) -> Result<Self, EngineError> {
        let prev_startxref = last_startxref(original)?;
        let declared_size = doc
            .trailer
            .get(b"Size")
            .and_then(Object::as_i64)
            .unwrap_or(0)
            .max(0) as u32;
        Ok(Self {
            original,
            prev_startxref,
            trailer: doc.trailer.clone(),
            next_id: (doc.max_id + 1).max(declared_size),
            objects: BTreeMap::new(),
        })
    }

    /// Reserves a fresh object number.
    pub fn allocate(&mut self) -> ObjectId {
        let id = (self.next_id, 0);
        self.next_id += 1;
        id
    }

    /// Queues a new revision of `id`.
    pub fn put(&mut self, id: ObjectId, object: &Object) {
        let mut body = Vec::new();
        write_object(&mut body, object);
        self.objects.insert(id, body);
    }

    /// Queues pre-serialized object content.
    pub fn put_raw(&mut self, id: ObjectId, body: Vec<u8>) {
        self.objects.insert(id, body);
    }

    pub fn assemble(self) -> Assembled {
        let mut bytes = Vec::with_capacity(self.original.len() + 32 * 1024);
        bytes.extend_from_slice(self.original);
        if !bytes.ends_with(b"\n") {
            bytes.push(b'\n');
        }

        let mut header_offsets = BTreeMap::new();
        let mut body_offsets = BTreeMap::new();
        for (&(number, generation), body) in &self.objects {
            header_offsets.insert((number, generation), bytes.len());
            let _ = write!(bytes, "{number} {generation} obj\n");
            body_offsets.insert((number, generation), bytes.len());
            bytes.extend_from_slice(body);
            bytes.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = bytes.len();
        bytes.extend_from_slice(b"xref\n");
        for (&(number, generation), &offset) in &header_offsets {
            let _ = write!(bytes, "{number} 1\n{offset:010} {generation:05} n \n");
        }

        let mut trailer = Dictionary::new();
        trailer.set("Size", i64::from(self.next_id));
        for key in [&b"Root"[..], &b"Info"[..], &b"ID"[..]] {
            if let Ok(value) = self.trailer.get(key) {
                trailer.set(key.to_vec(), value.clone());
            }
        }
        trailer.set("Prev", self.prev_startxref as i64);

        bytes.extend_from_slice(b"trailer\n");
        write_dictionary(&mut bytes, &trailer);
        let _ = write!(bytes, "\nstartxref\n{xref_offset}\n%%EOF\n");

        Assembled {
            bytes,
            body_offsets,
        }
    }
}
