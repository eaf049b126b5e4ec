//! Serialization of lopdf objects for incremental updates, and decoding of
//! PDF text strings.

use std::io::Write;

use lopdf::{Dictionary, Object, StringFormat};

pub fn write_object(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Integer(value) => {
            let _ = write!(out, "{value}");
        }
        Object::Real(value) => {
            let _ = write!(out, "{value}");
        }
        Object::Name(name) => write_name(out, name),
        Object::String(bytes, StringFormat::Literal) => write_literal_string(out, bytes),
        Object::String(bytes, StringFormat::Hexadecimal) => {
            out.push(b'<');
            out.extend_from_slice(hex::encode_upper(bytes).as_bytes());
            out.push(b'>');
        }
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict),
        Object::Stream(stream) => {
            let mut dict = stream.dict.clone();
            dict.set("Length", stream.content.len() as i64);
            write_dictionary(out, &dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference((id, generation)) => {
            let _ = write!(out, "{id} {generation} R");
        }
        #[allow(unreachable_patterns)]
        _ => out.extend_from_slice(b"null"),
    }
}

pub fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        out.push(b' ');
        write_name(out, key);
        out.push(b' ');
        write_object(out, value);
    }
    out.extend_from_slice(b" >>");
}

pub fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &byte in name {
        let delimiter = matches!(
            byte,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
        );
        if (0x21..=0x7E).contains(&byte) && !delimiter {
            out.push(byte);
        } else {
            let _ = write!(out, "#{byte:02X}");
        }
    }
}

pub fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &byte in bytes {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(byte),
        }
    }
    out.push(b')');
}

/// Encodes `text` as a PDF text string: plain bytes when ASCII, UTF-16BE
/// with a byte order mark otherwise.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        return text.as_bytes().to_vec();
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

/// Decodes a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, or
/// PDFDocEncoding treated as Latin-1).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn render(object: &Object) -> String {
        let mut out = Vec::new();
        write_object(&mut out, object);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn writes_dictionary_with_reference_and_array() {
        let dict = dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference((3, 0)),
            "Kids" => vec![Object::Integer(1), Object::Boolean(true)],
        };
        assert_eq!(
            render(&Object::Dictionary(dict)),
            "<< /Type /Catalog /Pages 3 0 R /Kids [1 true] >>"
        );
    }

    #[test]
    fn escapes_names_and_strings() {
        assert_eq!(render(&Object::Name(b"A B#".to_vec())), "/A#20B#23");
        assert_eq!(
            render(&Object::String(b"a(b)\\c".to_vec(), StringFormat::Literal)),
            "(a\\(b\\)\\\\c)"
        );
        assert_eq!(
            render(&Object::String(vec![0xAB, 0x01], StringFormat::Hexadecimal)),
            "<AB01>"
        );
    }

    #[test]
    fn text_strings_roundtrip_through_utf16() {
        let encoded = encode_text_string("Firma ñandú");
        assert_eq!(encoded[..2], [0xFEu8, 0xFF]);
        assert_eq!(decode_text_string(&encoded), "Firma ñandú");
    }

    #[test]
    fn ascii_text_strings_stay_plain() {
        assert_eq!(encode_text_string("FirmaDigital"), b"FirmaDigital");
        assert_eq!(decode_text_string(b"FirmaDigital"), "FirmaDigital");
    }

    #[test]
    fn latin1_bytes_decode() {
        assert_eq!(decode_text_string(&[0x46, 0xE9]), "Fé");
    }
}
