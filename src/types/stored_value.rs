//! Typed view of metadata values kept in the platform's native
//! serialization format.
//!
//! Scalars are stored raw. Lists and maps are stored serialized
//! (`a:2:{i:0;s:3:"red";i:1;s:4:"blue";}`), and a raw string that happens to
//! look serialized is serialized once more so that it decodes back to itself.

use std::fmt::Write as _;

use crate::error::{Error, Result};

/// Deepest array nesting `unserialize` accepts.
pub const MAX_NESTING: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapKey {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Scalar(Scalar),
    List(Vec<StoredValue>),
    /// Keyed values in stored order.
    Map(Vec<(MapKey, StoredValue)>),
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::Scalar(Scalar::Str(value.to_string()))
    }
}

impl From<i64> for StoredValue {
    fn from(value: i64) -> Self {
        StoredValue::Scalar(Scalar::Int(value))
    }
}

impl StoredValue {
    /// Interprets a stored string: serialized values are decoded, anything
    /// else is taken as a plain string.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        Self::unserialize(raw.trim())
            .unwrap_or_else(|_| StoredValue::Scalar(Scalar::Str(raw.to_string())))
    }

    /// Produces the string to store for this value.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            StoredValue::Scalar(Scalar::Str(s)) if is_serialized(s) => self.serialize(),
            StoredValue::Scalar(Scalar::Str(s)) => s.clone(),
            StoredValue::Scalar(Scalar::Int(i)) => i.to_string(),
            StoredValue::Scalar(Scalar::Float(f)) => f.to_string(),
            StoredValue::Scalar(Scalar::Bool(true)) => "1".to_string(),
            StoredValue::Scalar(Scalar::Bool(false) | Scalar::Null) => String::new(),
            StoredValue::List(_) | StoredValue::Map(_) => self.serialize(),
        }
    }

    /// Parses one complete serialized value. Trailing input is an error.
    pub fn unserialize(input: &str) -> Result<Self> {
        let mut parser = Parser {
            input: input.as_bytes(),
            pos: 0,
            depth: 0,
        };
        let value = parser.value()?;
        if parser.pos != parser.input.len() {
            return Err(Error::StoredValue(format!(
                "trailing data at byte {}",
                parser.pos
            )));
        }
        Ok(value)
    }

    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_serialized(&mut out);
        out
    }

    fn write_serialized(&self, out: &mut String) {
        match self {
            StoredValue::Scalar(scalar) => write_scalar(scalar, out),
            StoredValue::List(items) => {
                let _ = write!(out, "a:{}:{{", items.len());
                for (index, item) in items.iter().enumerate() {
                    let _ = write!(out, "i:{index};");
                    item.write_serialized(out);
                }
                out.push('}');
            }
            StoredValue::Map(entries) => {
                let _ = write!(out, "a:{}:{{", entries.len());
                for (key, item) in entries {
                    match key {
                        MapKey::Int(i) => {
                            let _ = write!(out, "i:{i};");
                        }
                        MapKey::Str(s) => write_scalar(&Scalar::Str(s.clone()), out),
                    }
                    item.write_serialized(out);
                }
                out.push('}');
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoredValue::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }
}

/// True when `raw` (ignoring surrounding whitespace) is a complete
/// serialized value.
#[must_use]
pub fn is_serialized(raw: &str) -> bool {
    StoredValue::unserialize(raw.trim()).is_ok()
}

fn write_scalar(scalar: &Scalar, out: &mut String) {
    match scalar {
        Scalar::Null => out.push_str("N;"),
        Scalar::Bool(b) => {
            let _ = write!(out, "b:{};", u8::from(*b));
        }
        Scalar::Int(i) => {
            let _ = write!(out, "i:{i};");
        }
        Scalar::Float(f) if f.is_nan() => out.push_str("d:NAN;"),
        Scalar::Float(f) if f.is_infinite() => {
            out.push_str(if *f > 0.0 { "d:INF;" } else { "d:-INF;" });
        }
        Scalar::Float(f) => {
            let _ = write!(out, "d:{f};");
        }
        Scalar::Str(s) => {
            let _ = write!(out, "s:{}:\"{s}\";", s.len());
        }
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn value(&mut self) -> Result<StoredValue> {
        let tag = self.next_byte()?;
        match tag {
            b'N' => {
                self.expect(b';')?;
                Ok(StoredValue::Scalar(Scalar::Null))
            }
            b'b' => {
                self.expect(b':')?;
                let raw = self.until(b';')?;
                match raw {
                    "0" => Ok(StoredValue::Scalar(Scalar::Bool(false))),
                    "1" => Ok(StoredValue::Scalar(Scalar::Bool(true))),
                    other => Err(self.error(&format!("invalid boolean '{other}'"))),
                }
            }
            b'i' => {
                self.expect(b':')?;
                let value = self.integer(b';')?;
                Ok(StoredValue::Scalar(Scalar::Int(value)))
            }
            b'd' => {
                self.expect(b':')?;
                let raw = self.until(b';')?;
                let value = match raw {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NAN" => f64::NAN,
                    other => other
                        .parse::<f64>()
                        .map_err(|_| self.error(&format!("invalid float '{other}'")))?,
                };
                Ok(StoredValue::Scalar(Scalar::Float(value)))
            }
            b's' => {
                let s = self.string_body()?;
                Ok(StoredValue::Scalar(Scalar::Str(s)))
            }
            b'a' => {
                if self.depth >= MAX_NESTING {
                    return Err(self.error("nesting too deep"));
                }
                self.depth += 1;
                let array = self.array();
                self.depth -= 1;
                array
            }
            other => Err(self.error(&format!("unsupported type tag '{}'", other as char))),
        }
    }

    fn array(&mut self) -> Result<StoredValue> {
        self.expect(b':')?;
        let len = self.integer(b':')?;
        let len = usize::try_from(len).map_err(|_| self.error("negative array length"))?;
        self.expect(b'{')?;

        let mut entries = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            let key = match self.next_byte()? {
                b'i' => {
                    self.expect(b':')?;
                    MapKey::Int(self.integer(b';')?)
                }
                b's' => MapKey::Str(self.string_body()?),
                _ => return Err(self.error("array keys must be integers or strings")),
            };
            let value = self.value()?;
            entries.push((key, value));
        }
        self.expect(b'}')?;

        let sequential = entries
            .iter()
            .enumerate()
            .all(|(index, (key, _))| matches!(key, MapKey::Int(i) if usize::try_from(*i) == Ok(index)));

        if sequential {
            Ok(StoredValue::List(
                entries.into_iter().map(|(_, value)| value).collect(),
            ))
        } else {
            Ok(StoredValue::Map(entries))
        }
    }

    /// Parses `:<len>:"<bytes>";` after the `s` tag.
    fn string_body(&mut self) -> Result<String> {
        self.expect(b':')?;
        let len = self.integer(b':')?;
        let len = usize::try_from(len).map_err(|_| self.error("negative string length"))?;
        self.expect(b'"')?;

        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or_else(|| self.error("string length exceeds input"))?;
        let s = std::str::from_utf8(&self.input[self.pos..end])
            .map_err(|_| self.error("string length splits a character"))?
            .to_string();
        self.pos = end;

        self.expect(b'"')?;
        self.expect(b';')?;
        Ok(s)
    }

    fn integer(&mut self, terminator: u8) -> Result<i64> {
        let raw = self.until(terminator)?;
        raw.parse::<i64>()
            .map_err(|_| self.error(&format!("invalid integer '{raw}'")))
    }

    /// Returns the text up to `terminator` and consumes the terminator.
    fn until(&mut self, terminator: u8) -> Result<&'a str> {
        let input = self.input;
        let start = self.pos;
        let offset = input[start..]
            .iter()
            .position(|b| *b == terminator)
            .ok_or_else(|| self.error(&format!("missing '{}'", terminator as char)))?;
        self.pos = start + offset + 1;
        std::str::from_utf8(&input[start..start + offset])
            .map_err(|_| Error::StoredValue("invalid utf-8".to_string()))
    }

    fn next_byte(&mut self) -> Result<u8> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        let found = self.next_byte()?;
        if found == expected {
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected '{}', found '{}'",
                expected as char, found as char
            )))
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::StoredValue(format!("{message} at byte {}", self.pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_string_decodes_as_scalar() {
        assert_eq!(StoredValue::decode("red"), StoredValue::from("red"));
        assert_eq!(StoredValue::decode("42"), StoredValue::from("42"));
        assert_eq!(StoredValue::decode(""), StoredValue::from(""));
    }

    #[test]
    fn test_sequential_array_decodes_as_list() {
        let value = StoredValue::decode(r#"a:2:{i:0;s:3:"red";i:1;s:4:"blue";}"#);
        assert_eq!(
            value,
            StoredValue::List(vec![StoredValue::from("red"), StoredValue::from("blue")])
        );
    }

    #[test]
    fn test_keyed_array_decodes_as_map() {
        let value = StoredValue::decode(r#"a:2:{s:5:"width";i:640;s:6:"height";i:480;}"#);
        assert_eq!(
            value,
            StoredValue::Map(vec![
                (MapKey::Str("width".to_string()), StoredValue::from(640)),
                (MapKey::Str("height".to_string()), StoredValue::from(480)),
            ])
        );
    }

    #[test]
    fn test_nested_attachment_metadata() {
        let raw = r#"a:3:{s:4:"file";s:13:"2024/01/a.png";s:5:"sizes";a:1:{s:5:"thumb";a:2:{s:5:"width";i:150;s:6:"height";i:150;}}s:5:"ratio";d:1.5;}"#;
        let value = StoredValue::decode(raw);

        let StoredValue::Map(entries) = &value else {
            panic!("expected map, got {value:?}");
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].1.as_str(), Some("2024/01/a.png"));
        assert_eq!(entries[2].1, StoredValue::Scalar(Scalar::Float(1.5)));
        assert_eq!(value.encode(), raw);
    }

    #[test]
    fn test_string_length_counts_bytes() {
        let value = StoredValue::decode(r#"a:1:{i:0;s:5:"café";}"#);
        assert_eq!(value, StoredValue::List(vec![StoredValue::from("café")]));

        // Character count instead of byte count is not a serialized value.
        let wrong = r#"a:1:{i:0;s:4:"café";}"#;
        assert_eq!(StoredValue::decode(wrong), StoredValue::from(wrong));
    }

    #[test]
    fn test_scalars() {
        assert_eq!(StoredValue::decode("N;"), StoredValue::Scalar(Scalar::Null));
        assert_eq!(
            StoredValue::decode("b:1;"),
            StoredValue::Scalar(Scalar::Bool(true))
        );
        assert_eq!(StoredValue::decode("i:-7;"), StoredValue::from(-7));
        assert_eq!(
            StoredValue::decode("d:INF;"),
            StoredValue::Scalar(Scalar::Float(f64::INFINITY))
        );
    }

    #[test]
    fn test_malformed_input_stays_raw() {
        for raw in ["a:2:{i:0;s:3:\"red\";}", "s:3:\"red\"", "i:12", "x:1;", "a:1:{i:0;N;}junk"] {
            assert_eq!(StoredValue::decode(raw), StoredValue::from(raw), "{raw}");
        }
    }

    #[test]
    fn test_encode_scalars_raw() {
        assert_eq!(StoredValue::from("blue").encode(), "blue");
        assert_eq!(StoredValue::from(5).encode(), "5");
        assert_eq!(StoredValue::Scalar(Scalar::Bool(true)).encode(), "1");
        assert_eq!(StoredValue::Scalar(Scalar::Null).encode(), "");
    }

    #[test]
    fn test_encode_serialized_looking_string_serializes_again() {
        let value = StoredValue::from("i:5;");
        let stored = value.encode();
        assert_eq!(stored, r#"s:4:"i:5;";"#);
        assert_eq!(StoredValue::decode(&stored), value);
    }

    fn nested(levels: usize) -> String {
        format!("{}N;{}", "a:1:{i:0;".repeat(levels), "}".repeat(levels))
    }

    #[test]
    fn test_nesting_limit() {
        let mut value = StoredValue::decode(&nested(MAX_NESTING));
        for _ in 0..MAX_NESTING {
            let StoredValue::List(mut items) = value else {
                panic!("expected list");
            };
            value = items.remove(0);
        }
        assert_eq!(value, StoredValue::Scalar(Scalar::Null));

        let too_deep = nested(MAX_NESTING + 1);
        assert_eq!(StoredValue::decode(&too_deep), StoredValue::from(too_deep.as_str()));

        let far_too_deep = nested(200_000);
        assert!(!is_serialized(&far_too_deep));
    }

    #[test]
    fn test_non_sequential_int_keys_stay_map() {
        let value = StoredValue::decode(r#"a:2:{i:1;s:1:"a";i:0;s:1:"b";}"#);
        assert!(matches!(value, StoredValue::Map(_)));
    }
}
