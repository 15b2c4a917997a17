//! Canonical JSON form used as the hashing input
//!
//! The output is byte-identical to Python's
//! `json.dumps(obj, sort_keys=True, ensure_ascii=True)`, so digests computed
//! here match digests computed by other OCTP implementations:
//! - object keys sorted by code point at every level
//! - `", "` between items and `": "` between key and value
//! - everything outside printable ASCII escaped as `\uXXXX`
//! - floats in shortest round-trip form (`1.0`, `1e-05`, `1e+16`)

use serde::ser::{self, Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt::{self, Write};

use crate::error::{OctpError, Result};

/// Convert a payload into a JSON value, rejecting anything that has no
/// canonical representation (non-finite floats, non-string map keys).
pub fn to_canonical_value<T>(payload: &T) -> Result<Value>
where
    T: Serialize + ?Sized,
{
    // serde_json maps NaN and infinities to null; refuse them up front
    payload
        .serialize(FiniteScan)
        .map_err(|e| OctpError::Serialization(e.0))?;

    serde_json::to_value(payload).map_err(|e| OctpError::Serialization(e.to_string()))
}

/// Canonical text of any serializable payload
pub fn canonicalize<T>(payload: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let value = to_canonical_value(payload)?;
    Ok(canonical_string(&value))
}

/// Canonical text of an already-parsed JSON value
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(number) => write_number(out, number),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, number: &Number) {
    if let Some(i) = number.as_i64() {
        let _ = write!(out, "{i}");
    } else if let Some(u) = number.as_u64() {
        let _ = write!(out, "{u}");
    } else if !number.is_f64() {
        // Integer literal wider than 64 bits: exact digits, as Python's int
        let _ = write!(out, "{number}");
    } else if let Some(f) = number.as_f64() {
        write_float(out, f);
    }
}

/// Python `repr(float)`: fixed notation when the decimal exponent is in
/// `[-4, 16)`, scientific with a signed two-digit exponent otherwise.
fn write_float(out: &mut String, f: f64) {
    // `{:e}` yields the shortest round-trip digits, e.g. "-1.2345e3"
    let sci = format!("{f:e}");
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();

    if negative {
        out.push('-');
    }

    if (-4..16).contains(&exponent) {
        let point = exponent + 1;
        if point <= 0 {
            out.push_str("0.");
            for _ in 0..(-point) {
                out.push('0');
            }
            out.push_str(&digits);
        } else if point as usize >= digits.len() {
            out.push_str(&digits);
            for _ in 0..(point as usize - digits.len()) {
                out.push('0');
            }
            out.push_str(".0");
        } else {
            let (int_part, frac_part) = digits.split_at(point as usize);
            out.push_str(int_part);
            out.push('.');
            out.push_str(frac_part);
        }
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "e{sign}{:02}", exponent.abs());
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
        }
    }
    out.push('"');
}

#[derive(Debug)]
struct ScanError(String);

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ScanError {}

impl ser::Error for ScanError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ScanError(msg.to_string())
    }
}

/// Walks a payload without producing output, failing on non-finite floats.
struct FiniteScan;

fn check_finite(value: f64) -> std::result::Result<(), ScanError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ScanError(format!(
            "non-finite number {value} has no canonical representation"
        )))
    }
}

impl Serializer for FiniteScan {
    type Ok = ();
    type Error = ScanError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _v: bool) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_i128(self, _v: i128) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_u128(self, _v: u128) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> std::result::Result<(), ScanError> {
        check_finite(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> std::result::Result<(), ScanError> {
        check_finite(v)
    }

    fn serialize_char(self, _v: char) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_none(self) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_some<T>(self, value: &T) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> std::result::Result<(), ScanError> {
        Ok(())
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> std::result::Result<Self, ScanError> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> std::result::Result<Self, ScanError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, ScanError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, ScanError> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> std::result::Result<Self, ScanError> {
        Ok(self)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, ScanError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> std::result::Result<Self, ScanError> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_element<T>(&mut self, value: &T) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteScan)
    }

    fn end(self) -> std::result::Result<(), ScanError> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_element<T>(&mut self, value: &T) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteScan)
    }

    fn end(self) -> std::result::Result<(), ScanError> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_field<T>(&mut self, value: &T) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteScan)
    }

    fn end(self) -> std::result::Result<(), ScanError> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_field<T>(&mut self, value: &T) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteScan)
    }

    fn end(self) -> std::result::Result<(), ScanError> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_key<T>(&mut self, key: &T) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        key.serialize(FiniteScan)
    }

    fn serialize_value<T>(&mut self, value: &T) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteScan)
    }

    fn end(self) -> std::result::Result<(), ScanError> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_field<T>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteScan)
    }

    fn end(self) -> std::result::Result<(), ScanError> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteScan {
    type Ok = ();
    type Error = ScanError;

    fn serialize_field<T>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> std::result::Result<(), ScanError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(FiniteScan)
    }

    fn end(self) -> std::result::Result<(), ScanError> {
        Ok(())
    }
}
