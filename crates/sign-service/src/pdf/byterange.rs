//! ByteRange handling for signature dictionaries.
//!
//! `/ByteRange [0 a b c]` covers every byte of the file except the hex
//! `/Contents` value, which sits between offsets `a` and `b` (delimiters
//! included). Both the array and the contents value are written as fixed
//! width placeholders first and patched in place once the file is laid out.

use crate::signing::EngineError;

/// Width reserved for the ByteRange array, brackets included.
pub const BYTE_RANGE_PLACEHOLDER: &str = "[0 0000000000 0000000000 0000000000]";

#[derive(Debug)]
pub struct ByteRange {
    /// Size of the `/Contents` value: hex digits plus the two angle brackets.
    placeholder_size: usize,
}

impl ByteRange {
    /// Reserves room for a DER signature of up to `signature_capacity` bytes.
    pub fn with_capacity(signature_capacity: usize) -> Self {
        Self {
            placeholder_size: signature_capacity * 2 + 2,
        }
    }

    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// `<000...0>` sized to the reserved capacity.
    pub fn contents_placeholder(&self) -> String {
        format!("<{}>", "0".repeat(self.placeholder_size - 2))
    }

    /// `[0, before, after_start, after_len]` for a contents value starting
    /// at `contents_offset`.
    pub fn calculate(&self, file_size: usize, contents_offset: usize) -> [usize; 4] {
        let after_start = contents_offset + self.placeholder_size;
        [0, contents_offset, after_start, file_size - after_start]
    }

    /// Overwrites the ByteRange placeholder at `offset` with `range`, padding
    /// with spaces to keep every other offset stable.
    pub fn write_range(pdf: &mut [u8], offset: usize, range: &[usize; 4]) -> Result<(), EngineError> {
        let formatted = format!("[{} {} {} {}]", range[0], range[1], range[2], range[3]);
        let width = BYTE_RANGE_PLACEHOLDER.len();
        if formatted.len() > width {
            return Err(EngineError::Signing(format!(
                "ByteRange {formatted} does not fit its placeholder"
            )));
        }
        let end = offset + width;
        if end > pdf.len() || &pdf[offset..end] != BYTE_RANGE_PLACEHOLDER.as_bytes() {
            return Err(EngineError::Signing(
                "ByteRange placeholder not found at expected offset".to_string(),
            ));
        }
        let padded = format!("{formatted:<width$}");
        pdf[offset..end].copy_from_slice(padded.as_bytes());
        Ok(())
    }

    /// The bytes covered by `range`, concatenated.
    pub fn signed_bytes(pdf: &[u8], range: &[usize; 4]) -> Result<Vec<u8>, EngineError> {
        let [start1, len1, start2, len2] = *range;
        if start1 + len1 > pdf.len() || start2 + len2 > pdf.len() || start1 + len1 > start2 {
            return Err(EngineError::Signing(format!(
                "ByteRange {range:?} does not fit a {} byte file",
                pdf.len()
            )));
        }
        let mut signed = Vec::with_capacity(len1 + len2);
        signed.extend_from_slice(&pdf[start1..start1 + len1]);
        signed.extend_from_slice(&pdf[start2..start2 + len2]);
        Ok(signed)
    }

    /// Writes the hex signature into the contents placeholder, zero padded.
    pub fn insert_signature(
        &self,
        pdf: &mut [u8],
        contents_offset: usize,
        signature: &[u8],
    ) -> Result<(), EngineError> {
        let signature_hex = hex::encode_upper(signature);
        if signature_hex.len() + 2 > self.placeholder_size {
            return Err(EngineError::Signing(format!(
                "signature ({} bytes) exceeds reserved space ({} bytes)",
                signature.len(),
                (self.placeholder_size - 2) / 2
            )));
        }
        if contents_offset + self.placeholder_size > pdf.len() {
            return Err(EngineError::Signing(
                "signature insertion would exceed file bounds".to_string(),
            ));
        }
        let start = contents_offset + 1;
        pdf[start..start + signature_hex.len()].copy_from_slice(signature_hex.as_bytes());
        Ok(())
    }
}
