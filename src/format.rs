//! Built-in column formats.

use crate::schema::NamedFormat;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

pub fn apply_named(format: &NamedFormat, value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match format {
        NamedFormat::Date => parse_timestamp(value)
            .map(|dt| Value::String(dt.format("%Y-%m-%d").to_string()))
            .unwrap_or_else(|| value.clone()),
        NamedFormat::DateTime => parse_timestamp(value)
            .map(|dt| Value::String(dt.format("%Y-%m-%d %H:%M").to_string()))
            .unwrap_or_else(|| value.clone()),
        NamedFormat::YesNo => match truthy(value) {
            Some(true) => Value::String("Yes".into()),
            Some(false) => Value::String("No".into()),
            None => value.clone(),
        },
        NamedFormat::Decimal { places } => as_f64(value)
            .map(|n| Value::String(format!("{:.*}", *places as usize, n)))
            .unwrap_or_else(|| value.clone()),
        NamedFormat::Truncate { max } => match value {
            Value::String(s) if s.chars().count() > *max => {
                let mut cut: String = s.chars().take(*max).collect();
                cut.push('…');
                Value::String(cut)
            }
            _ => value.clone(),
        },
    }
}

/// Render any cell as plain text (CSV, labels).
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "1".into() } else { "0".into() },
        other => other.to_string(),
    }
}

fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    let s = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, pattern) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "1" | "t" | "true" | "yes" | "y" => Some(true),
            "0" | "f" | "false" | "no" | "n" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
