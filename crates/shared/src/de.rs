//! Lenient deserializers for backend payloads.
//!
//! The rides backend is loosely typed: ids sometimes arrive as strings,
//! flags as 0/1 integers, and decimals as strings.

use serde::{de::Error, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberRepr {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolRepr {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Integer id that may be sent as a number or a numeric string
pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match NumberRepr::deserialize(deserializer)? {
        NumberRepr::Int(v) => Ok(v),
        NumberRepr::Float(v) if v.fract() == 0.0 => Ok(v as i64),
        NumberRepr::Float(v) => Err(D::Error::custom(format!("expected integer id, got {}", v))),
        NumberRepr::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected integer id, got '{}'", s))),
    }
}

/// Optional variant of [`id`]; `null` and missing fields map to `None`
pub fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Option::<NumberRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberRepr::Int(v)) => Ok(Some(v)),
        Some(NumberRepr::Float(v)) => Ok(Some(v as i64)),
        Some(NumberRepr::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberRepr::Str(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected integer id, got '{}'", s))),
    }
}

/// Decimal that may be sent as a number or a numeric string
pub fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match NumberRepr::deserialize(deserializer)? {
        NumberRepr::Int(v) => Ok(v as f64),
        NumberRepr::Float(v) => Ok(v),
        NumberRepr::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected decimal, got '{}'", s))),
    }
}

/// Flag that may be sent as a bool, 0/1, or "true"/"1"; `null` is false
pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<BoolRepr>::deserialize(deserializer)? {
        None => false,
        Some(BoolRepr::Bool(b)) => b,
        Some(BoolRepr::Int(v)) => v != 0,
        Some(BoolRepr::Str(s)) => matches!(s.trim(), "1" | "true" | "TRUE" | "True"),
    })
}

/// String that treats `null` as empty
pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
