//! Serialized key tokens
//!
//! The upstream system serializes a key as URL-safe base64 (no padding) of a
//! protobuf `Reference`:
//!
//! ```text
//! Reference { app = 13 (string), name_space = 20 (string), path = 14 (Path) }
//! Path      { repeated group Element = 1 { type = 2, id = 3, name = 4 } }
//! ```
//!
//! Because the first field is always `app`, every token starts with `ag`
//! (app id shorter than 16 bytes) or `ah` (16 to 31 bytes). Only the last
//! path element is kept: ancestors are not part of the canonical form.

use super::types::{EntityKey, LocalId, KEY_SEPARATOR};
use super::KeyTokenParser;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

const APP_TAG: u64 = (13 << 3) | 2;
const PATH_TAG: u64 = (14 << 3) | 2;
const ELEMENT_START: u64 = (1 << 3) | 3;
const ELEMENT_END: u64 = (1 << 3) | 4;
const TYPE_TAG: u64 = (2 << 3) | 2;
const ID_TAG: u64 = 3 << 3;
const NAME_TAG: u64 = (4 << 3) | 2;

/// Parses URL-safe base64 `Reference` tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceTokenParser;

impl KeyTokenParser for ReferenceTokenParser {
    fn parse_token(&self, token: &str) -> Option<EntityKey> {
        let bytes = URL_SAFE_NO_PAD.decode(token).ok()?;
        decode_reference(&bytes)
    }
}

/// Serialize a key the way the upstream system does
pub fn encode_reference(app: &str, key: &EntityKey) -> String {
    let mut element = Vec::new();
    put_varint(&mut element, ELEMENT_START);
    put_bytes(&mut element, TYPE_TAG, key.kind.as_bytes());
    match &key.id {
        LocalId::Id(id) => {
            put_varint(&mut element, ID_TAG);
            put_varint(&mut element, *id as u64);
        }
        LocalId::Name(name) => put_bytes(&mut element, NAME_TAG, name.as_bytes()),
    }
    put_varint(&mut element, ELEMENT_END);

    let mut reference = Vec::new();
    put_bytes(&mut reference, APP_TAG, app.as_bytes());
    put_bytes(&mut reference, PATH_TAG, &element);

    URL_SAFE_NO_PAD.encode(reference)
}

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn put_bytes(buf: &mut Vec<u8>, tag: u64, bytes: &[u8]) {
    put_varint(buf, tag);
    put_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Minimal protobuf reader over a byte slice
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn varint(&mut self) -> Option<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = *self.buf.get(self.pos)?;
            self.pos += 1;
            if shift >= 64 {
                return None;
            }
            result |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Some(result);
            }
            shift += 7;
        }
    }

    fn advance(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn bytes(&mut self) -> Option<&'a [u8]> {
        let len = usize::try_from(self.varint()?).ok()?;
        self.advance(len)
    }

    fn string(&mut self) -> Option<&'a str> {
        std::str::from_utf8(self.bytes()?).ok()
    }

    fn skip(&mut self, wire_type: u64) -> Option<()> {
        match wire_type {
            0 => self.varint().map(|_| ()),
            1 => self.advance(8).map(|_| ()),
            2 => self.bytes().map(|_| ()),
            5 => self.advance(4).map(|_| ()),
            _ => None,
        }
    }
}

fn decode_reference(bytes: &[u8]) -> Option<EntityKey> {
    let mut cursor = Cursor::new(bytes);
    let mut app = None;
    let mut key = None;

    while !cursor.is_empty() {
        match cursor.varint()? {
            APP_TAG => app = Some(cursor.string()?),
            PATH_TAG => key = Some(decode_path(cursor.bytes()?)?),
            tag => cursor.skip(tag & 7)?,
        }
    }

    app.filter(|a| !a.is_empty())?;
    key
}

fn decode_path(bytes: &[u8]) -> Option<EntityKey> {
    let mut cursor = Cursor::new(bytes);
    let mut last = None;

    while !cursor.is_empty() {
        if cursor.varint()? != ELEMENT_START {
            return None;
        }
        last = Some(decode_element(&mut cursor)?);
    }

    last
}

fn decode_element(cursor: &mut Cursor<'_>) -> Option<EntityKey> {
    let mut kind = None;
    let mut id = None;
    let mut name = None;

    loop {
        match cursor.varint()? {
            ELEMENT_END => break,
            TYPE_TAG => kind = Some(cursor.string()?),
            ID_TAG => id = Some(cursor.varint()? as i64),
            NAME_TAG => name = Some(cursor.string()?),
            tag => cursor.skip(tag & 7)?,
        }
    }

    let kind = kind.filter(|k| !k.is_empty() && !k.contains(KEY_SEPARATOR))?;
    let id = match (id, name) {
        (_, Some(name)) if name.contains(KEY_SEPARATOR) => return None,
        (_, Some(name)) if !name.is_empty() => LocalId::Name(name.to_string()),
        (Some(id), _) if id != 0 => LocalId::Id(id),
        _ => return None,
    };

    Some(EntityKey {
        kind: kind.to_string(),
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_prefix_follows_app_length() {
        let key = EntityKey::with_id("Foo", 1);
        assert!(encode_reference("s~short", &key).starts_with("ag"));
        assert!(encode_reference("s~a-much-longer-app", &key).starts_with("ah"));
    }

    #[test]
    fn test_parse_encoded_id_and_name() {
        let parser = ReferenceTokenParser;

        let by_id = EntityKey::with_id("Account", 5_629_499_534_213_120);
        let token = encode_reference("s~example-app-prod", &by_id);
        assert_eq!(parser.parse_token(&token), Some(by_id));

        let by_name = EntityKey::with_name("Tag", "red");
        let token = encode_reference("s~example", &by_name);
        assert_eq!(parser.parse_token(&token), Some(by_name));
    }

    #[test]
    fn test_parse_keeps_last_path_element() {
        let mut element = Vec::new();
        for (kind, id) in [("Parent", 7u64), ("Child", 9u64)] {
            put_varint(&mut element, ELEMENT_START);
            put_bytes(&mut element, TYPE_TAG, kind.as_bytes());
            put_varint(&mut element, ID_TAG);
            put_varint(&mut element, id);
            put_varint(&mut element, ELEMENT_END);
        }
        let mut reference = Vec::new();
        put_bytes(&mut reference, APP_TAG, b"s~example");
        put_bytes(&mut reference, PATH_TAG, &element);

        let token = URL_SAFE_NO_PAD.encode(reference);
        assert_eq!(
            ReferenceTokenParser.parse_token(&token),
            Some(EntityKey::with_id("Child", 9))
        );
    }

    #[test]
    fn test_rejects_garbage() {
        let parser = ReferenceTokenParser;
        assert_eq!(parser.parse_token("ah0123456789012345678901"), None);
        assert_eq!(parser.parse_token("not base64!"), None);
        assert_eq!(parser.parse_token(""), None);
    }

    #[test]
    fn test_rejects_separator_in_kind_or_name() {
        let parser = ReferenceTokenParser;
        let email = encode_reference(
            "s~example",
            &EntityKey::with_name("User", "bob@example.com"),
        );
        assert_eq!(parser.parse_token(&email), None);

        let kind = encode_reference("s~example", &EntityKey::with_id("Us@er", 1));
        assert_eq!(parser.parse_token(&kind), None);
    }

    #[test]
    fn test_rejects_incomplete_key() {
        let mut element = Vec::new();
        put_varint(&mut element, ELEMENT_START);
        put_bytes(&mut element, TYPE_TAG, b"Foo");
        put_varint(&mut element, ELEMENT_END);
        let mut reference = Vec::new();
        put_bytes(&mut reference, APP_TAG, b"s~example");
        put_bytes(&mut reference, PATH_TAG, &element);

        let token = URL_SAFE_NO_PAD.encode(reference);
        assert_eq!(ReferenceTokenParser.parse_token(&token), None);
    }
}
