//! Row values and their encoding in the Postgres `CSV` COPY format.
//!
//! NULL is an empty unquoted field and an empty string is `""`, so the
//! two never collapse into each other on the server.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A single column value sent through COPY
#[derive(Debug, Clone, PartialEq)]
pub enum CopyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Json(serde_json::Value),
    Timestamp(DateTime<Utc>),
}

impl CopyValue {
    /// Text representation, `None` for NULL.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        let text = match self {
            CopyValue::Null => return None,
            CopyValue::Bool(true) => Cow::Borrowed("t"),
            CopyValue::Bool(false) => Cow::Borrowed("f"),
            CopyValue::Int(v) => Cow::Owned(v.to_string()),
            CopyValue::Float(v) if v.is_nan() => Cow::Borrowed("NaN"),
            CopyValue::Float(v) if v.is_infinite() => {
                Cow::Borrowed(if *v > 0.0 { "Infinity" } else { "-Infinity" })
            }
            CopyValue::Float(v) => Cow::Owned(v.to_string()),
            CopyValue::Text(v) => Cow::Borrowed(v.as_str()),
            CopyValue::Uuid(v) => Cow::Owned(v.hyphenated().to_string()),
            CopyValue::Json(v) => Cow::Owned(v.to_string()),
            CopyValue::Timestamp(v) => Cow::Owned(v.to_rfc3339()),
        };
        Some(text)
    }
}

/// Append one field to `out`, quoting when the server would misread it.
pub fn encode_field(value: &CopyValue, out: &mut Vec<u8>) {
    let Some(text) = value.as_text() else {
        return;
    };
    if needs_quotes(&text) {
        out.push(b'"');
        for byte in text.bytes() {
            if byte == b'"' {
                out.push(b'"');
            }
            out.push(byte);
        }
        out.push(b'"');
    } else {
        out.extend_from_slice(text.as_bytes());
    }
}

/// Append one newline-terminated record to `out`.
pub fn encode_row(values: &[CopyValue], out: &mut Vec<u8>) {
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            out.push(b',');
        }
        encode_field(value, out);
    }
    out.push(b'\n');
}

fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text == "\\."
        || text.starts_with(' ')
        || text.ends_with(' ')
        || text.bytes().any(|b| matches!(b, b',' | b'"' | b'\n' | b'\r'))
}

/// A row that can be streamed through COPY
pub trait ToCopyRow {
    fn into_copy_values(self) -> Vec<CopyValue>;
}

impl ToCopyRow for Vec<CopyValue> {
    fn into_copy_values(self) -> Vec<CopyValue> {
        self
    }
}

impl<const N: usize> ToCopyRow for [CopyValue; N] {
    fn into_copy_values(self) -> Vec<CopyValue> {
        self.into()
    }
}

macro_rules! tuple_row {
    ($($name:ident),+) => {
        impl<$($name: Into<CopyValue>),+> ToCopyRow for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_copy_values(self) -> Vec<CopyValue> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_row!(A);
tuple_row!(A, B);
tuple_row!(A, B, C);
tuple_row!(A, B, C, D);
tuple_row!(A, B, C, D, E);
tuple_row!(A, B, C, D, E, F);
tuple_row!(A, B, C, D, E, F, G);
tuple_row!(A, B, C, D, E, F, G, H);

impl From<bool> for CopyValue {
    fn from(v: bool) -> Self {
        CopyValue::Bool(v)
    }
}

impl From<i16> for CopyValue {
    fn from(v: i16) -> Self {
        CopyValue::Int(v.into())
    }
}

impl From<i32> for CopyValue {
    fn from(v: i32) -> Self {
        CopyValue::Int(v.into())
    }
}

impl From<i64> for CopyValue {
    fn from(v: i64) -> Self {
        CopyValue::Int(v)
    }
}

impl From<f32> for CopyValue {
    fn from(v: f32) -> Self {
        CopyValue::Float(v.into())
    }
}

impl From<f64> for CopyValue {
    fn from(v: f64) -> Self {
        CopyValue::Float(v)
    }
}

impl From<String> for CopyValue {
    fn from(v: String) -> Self {
        CopyValue::Text(v)
    }
}

impl From<&str> for CopyValue {
    fn from(v: &str) -> Self {
        CopyValue::Text(v.to_owned())
    }
}

impl From<Uuid> for CopyValue {
    fn from(v: Uuid) -> Self {
        CopyValue::Uuid(v)
    }
}

impl From<serde_json::Value> for CopyValue {
    fn from(v: serde_json::Value) -> Self {
        CopyValue::Json(v)
    }
}

impl From<DateTime<Utc>> for CopyValue {
    fn from(v: DateTime<Utc>) -> Self {
        CopyValue::Timestamp(v)
    }
}

impl<T: Into<CopyValue>> From<Option<T>> for CopyValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CopyValue::Null)
    }
}
