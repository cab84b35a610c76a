//! JSON text as the gateway produces it.
//!
//! Signatures are computed over JSON *text*, so the bytes must match what the
//! gateway's own encoder emits for the same data. The gateway encodes with its
//! platform defaults, which differ from `serde_json` in four places:
//!
//! - `/` is written as `\/`;
//! - every non-ASCII character is written as a `\uXXXX` escape (lowercase hex,
//!   UTF-16 surrogate pairs above the BMP);
//! - an empty mapping is written as `[]`;
//! - a float in exponent form always has a fractional part and a signed
//!   exponent (`1.0e-7`, `1.0e+20`).
//!
//! Floats of very large magnitude (1e15 and up) may still switch to exponent
//! form at a different point than the gateway does. Amounts are normally sent
//! as strings or integers.
//!
//! [`JsonDialect::Standard`] turns all of this off and yields the same text as
//! `serde_json::to_string`.

use serde::Serialize;
use serde_json::ser::{CharEscape, CompactFormatter, Formatter, Serializer};
use serde_json::Value;
use std::io;

/// Flavor of JSON text produced by [`encode_value`] and [`encode_str`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonDialect {
    /// The gateway's encoder: escaped slashes, ASCII-only output, empty maps as `[]`.
    #[default]
    Gateway,
    /// Plain compact JSON, byte-identical to `serde_json::to_string`.
    Standard,
}

/// Encodes a JSON value as compact text, keeping the map order of `value`.
pub fn encode_value(value: &Value, dialect: JsonDialect) -> String {
    encode(value, dialect)
}

/// Encodes a single string as a JSON string literal, quotes included.
pub fn encode_str(s: &str, dialect: JsonDialect) -> String {
    encode(s, dialect)
}

fn encode<T: Serialize + ?Sized>(value: &T, dialect: JsonDialect) -> String {
    let mut out = Vec::with_capacity(128);
    let mut serializer = Serializer::with_formatter(&mut out, DialectFormatter::new(dialect));
    value
        .serialize(&mut serializer)
        .expect("JSON values serialize into memory without error");
    String::from_utf8(out).expect("serde_json writes UTF-8")
}

/// Compact formatter with the gateway's deviations switched on or off.
struct DialectFormatter {
    dialect: JsonDialect,
    /// One entry per open object: whether a key has been written yet.
    open_objects: Vec<bool>,
}

impl DialectFormatter {
    fn new(dialect: JsonDialect) -> Self {
        Self {
            dialect,
            open_objects: Vec::new(),
        }
    }

    fn is_gateway(&self) -> bool {
        self.dialect == JsonDialect::Gateway
    }
}

impl Formatter for DialectFormatter {
    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !self.is_gateway() {
            return CompactFormatter.write_f64(writer, value);
        }
        let mut buffer = Vec::new();
        CompactFormatter.write_f64(&mut buffer, value)?;
        let text = gateway_float(&String::from_utf8_lossy(&buffer));
        writer.write_all(text.as_bytes())
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !self.is_gateway() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if ch != '/' && ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..index].as_bytes())?;
            if ch == '/' {
                writer.write_all(b"\\/")?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn write_char_escape<W>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        CompactFormatter.write_char_escape(writer, char_escape)
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !self.is_gateway() {
            return CompactFormatter.begin_object(writer);
        }
        // The brace is deferred until the first key: an empty object is `[]`.
        self.open_objects.push(false);
        Ok(())
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !self.is_gateway() || !first {
            return CompactFormatter.begin_object_key(writer, first);
        }
        if let Some(has_keys) = self.open_objects.last_mut() {
            *has_keys = true;
        }
        writer.write_all(b"{")
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !self.is_gateway() {
            return CompactFormatter.end_object(writer);
        }
        match self.open_objects.pop() {
            Some(true) => writer.write_all(b"}"),
            _ => writer.write_all(b"[]"),
        }
    }
}

/// `1e-7` becomes `1.0e-7` and `1e20` becomes `1.0e+20`; plain decimals pass through.
fn gateway_float(text: &str) -> String {
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let fraction = if mantissa.contains('.') { "" } else { ".0" };
            let sign = if exponent.starts_with(['-', '+']) { "" } else { "+" };
            format!("{mantissa}{fraction}e{sign}{exponent}")
        }
        None => text.to_string(),
    }
}
