use std::collections::BTreeSet;

use super::engine::SignatureField;

/// Name given to the first signature placed on a document.
pub const BASE_FIELD_NAME: &str = "FirmaDigital";

/// Signature field names already present in a document, split by whether
/// they hold a value.
#[derive(Debug, Default)]
pub struct FieldInventory {
    pub existing: BTreeSet<String>,
    pub filled: BTreeSet<String>,
}

impl FieldInventory {
    pub fn from_fields(fields: &[SignatureField]) -> Self {
        let mut inventory = Self::default();
        for field in fields {
            inventory.existing.insert(field.name.clone());
            if field.filled {
                inventory.filled.insert(field.name.clone());
            }
        }
        inventory
    }

    /// Picks the first name in `FirmaDigital`, `FirmaDigital_2`,
    /// `FirmaDigital_3`, ... that does not already hold a signature.
    ///
    /// An existing but empty field is a valid target and gets reused.
    pub fn negotiate(&self) -> String {
        let mut candidate = BASE_FIELD_NAME.to_string();
        let mut suffix = 1u32;
        while self.filled.contains(&candidate) {
            suffix += 1;
            candidate = format!("{BASE_FIELD_NAME}_{suffix}");
        }
        candidate
    }
}

pub fn negotiate_field_name(fields: &[SignatureField]) -> String {
    FieldInventory::from_fields(fields).negotiate()
}
