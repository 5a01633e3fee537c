//! Identifier encoding and recovery
//!
//! Canonical form of an identifier is `<kind>@<local id>`. `@` never occurs
//! in a kind or a local id, so the form is unambiguous.
//!
//! Some string properties hold identifiers that the upstream system flattened
//! into free text with no escaping. [`KeyCodec::recover_opaque_identifier_string`]
//! recovers them by trying a fixed chain of layouts, first match wins:
//!
//! 1. the whole string is one serialized token
//! 2. two tokens joined by `_`
//! 3. one token followed by `_` and free text (the token itself may contain
//!    one `_`)
//!
//! Only strings that start with a token-shaped run are considered at all.

pub use crate::backup::KEY_SEPARATOR;

use crate::backup::{EntityKey, KeyTokenParser, LocalId, PropertyValue};
use crate::error::KeyError;
use chrono::{NaiveDateTime, Timelike};
use regex::Regex;
use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

/// Separator between tokens (and between a token and free text)
pub const TOKEN_SEPARATOR: char = '_';

/// A string starting with a token: system prefix plus 18 or more token characters
static TOKEN_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^a[gh][A-Za-z0-9-]{18,}(?:_|$)").expect("Invalid token head regex")
});

/// Exactly two tokens joined by one separator
static TOKEN_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(a[gh][A-Za-z0-9-]{18,})_(a[gh][A-Za-z0-9-]{18,})$")
        .expect("Invalid token pair regex")
});

/// Format an identifier as `<kind>@<local id>`
pub fn encode_identifier(key: &EntityKey) -> String {
    format!("{}{}{}", key.kind, KEY_SEPARATOR, key.id)
}

/// Parse the canonical form back into an identifier
///
/// A local id made only of digits (with an optional leading `-`) that fits
/// in an `i64` is numeric; anything else is a name.
pub fn decode_identifier(s: &str) -> Result<EntityKey, KeyError> {
    let malformed = || KeyError::MalformedIdentifierString {
        value: s.to_string(),
    };

    let (kind, local) = s.split_once(KEY_SEPARATOR).ok_or_else(malformed)?;
    if kind.is_empty() || local.is_empty() || local.contains(KEY_SEPARATOR) {
        return Err(malformed());
    }

    let id = if is_integer_literal(local) {
        local
            .parse::<i64>()
            .map(LocalId::Id)
            .unwrap_or_else(|_| LocalId::Name(local.to_string()))
    } else {
        LocalId::Name(local.to_string())
    };

    Ok(EntityKey {
        kind: kind.to_string(),
        id,
    })
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Whether a string starts with an identifier-shaped token
pub fn looks_like_key_token(s: &str) -> bool {
    TOKEN_HEAD.is_match(s)
}

/// Natural string form of a typed value
///
/// Strings pass through untouched here; identifier recovery is applied by
/// the value encoder.
pub fn canonicalize_value(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Null => String::new(),
        PropertyValue::Boolean(true) => "True".to_string(),
        PropertyValue::Boolean(false) => "False".to_string(),
        PropertyValue::Integer(i) => i.to_string(),
        PropertyValue::Float(f) => format!("{:?}", f),
        PropertyValue::String(s) => s.clone(),
        PropertyValue::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        PropertyValue::DateTime(dt) => format_datetime(dt),
        PropertyValue::Key(key) => encode_identifier(key),
    }
}

/// `YYYY-MM-DD HH:MM:SS`, with `.ffffff` only when microseconds are non-zero
fn format_datetime(dt: &NaiveDateTime) -> String {
    let base = dt.format("%Y-%m-%d %H:%M:%S").to_string();
    match dt.nanosecond() / 1_000 {
        0 => base,
        micros => format!("{}.{:06}", base, micros),
    }
}

/// Layout of a string that starts with a key token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenShape<'a> {
    /// The whole string is one serialized identifier
    Single(EntityKey),
    /// Two tokens joined by `_`
    Pair(&'a str, &'a str),
    /// A token followed by `_` and free text
    WithSuffix { token: &'a str, suffix: &'a str },
}

/// Encodes identifiers and recovers them from flattened strings
#[derive(Clone)]
pub struct KeyCodec {
    parser: Arc<dyn KeyTokenParser>,
}

impl KeyCodec {
    pub fn new(parser: Arc<dyn KeyTokenParser>) -> Self {
        Self { parser }
    }

    /// Canonical string for a value (see [`canonicalize_value`])
    pub fn canonicalize_value(&self, value: &PropertyValue) -> String {
        canonicalize_value(value)
    }

    /// Recover identifiers embedded in a string value
    ///
    /// Strings that do not start with a token are returned unchanged. A
    /// token-shaped string that matches no layout, or whose token part does
    /// not parse, is a [`KeyError::MalformedIdentifierString`].
    pub fn recover_opaque_identifier_string<'a>(
        &self,
        s: &'a str,
    ) -> Result<Cow<'a, str>, KeyError> {
        if !looks_like_key_token(s) {
            return Ok(Cow::Borrowed(s));
        }

        let malformed = || KeyError::MalformedIdentifierString {
            value: s.to_string(),
        };

        let recovered = match self.classify(s).ok_or_else(malformed)? {
            TokenShape::Single(key) => encode_identifier(&key),
            TokenShape::Pair(first, second) => format!(
                "{}{}{}",
                self.canonicalize_token(first).ok_or_else(malformed)?,
                TOKEN_SEPARATOR,
                self.canonicalize_token(second).ok_or_else(malformed)?
            ),
            TokenShape::WithSuffix { token, suffix } => format!(
                "{}{}{}",
                self.canonicalize_token(token).ok_or_else(malformed)?,
                TOKEN_SEPARATOR,
                suffix
            ),
        };

        Ok(Cow::Owned(recovered))
    }

    /// Run the layout matchers in priority order
    pub fn classify<'a>(&self, s: &'a str) -> Option<TokenShape<'a>> {
        self.match_single(s)
            .or_else(|| match_pair(s))
            .or_else(|| match_with_suffix(s))
    }

    fn match_single<'a>(&self, s: &'a str) -> Option<TokenShape<'a>> {
        self.parser.parse_token(s).map(TokenShape::Single)
    }

    fn canonicalize_token(&self, token: &str) -> Option<String> {
        self.parser
            .parse_token(token)
            .map(|key| encode_identifier(&key))
    }
}

fn match_pair(s: &str) -> Option<TokenShape<'_>> {
    let caps = TOKEN_PAIR.captures(s)?;
    Some(TokenShape::Pair(caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// `<token>_<text>` or `<token_part1>_<token_part2>_<text>`
fn match_with_suffix(s: &str) -> Option<TokenShape<'_>> {
    let separators: Vec<usize> = s
        .match_indices(TOKEN_SEPARATOR)
        .map(|(idx, _)| idx)
        .collect();

    let split = match separators.as_slice() {
        [only] => *only,
        [_, second] => *second,
        _ => return None,
    };

    Some(TokenShape::WithSuffix {
        token: &s[..split],
        suffix: &s[split + TOKEN_SEPARATOR.len_utf8()..],
    })
}

impl std::fmt::Debug for KeyCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCodec").finish_non_exhaustive()
    }
}
