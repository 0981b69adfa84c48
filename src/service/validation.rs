//! Validation collaborator: runs `name[:arg]` rules over submitted values.

use crate::error::FieldErrors;
use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};

/// Ordered `(field, rules)` pairs, as produced by `FormSchema::validation_rules`.
pub type RuleSet = [(String, Vec<String>)];

pub trait Validator: Send + Sync {
    /// On success returns the submitted values restricted to the ruled fields.
    fn validate(&self, rules: &RuleSet, submitted: &Map<String, Value>) -> Result<Map<String, Value>, FieldErrors>;
}

/// Built-in rule engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleValidator;

impl Validator for RuleValidator {
    fn validate(&self, rules: &RuleSet, submitted: &Map<String, Value>) -> Result<Map<String, Value>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut out = Map::new();
        for (field, field_rules) in rules {
            let value = submitted.get(field);
            let messages: Vec<String> = field_rules
                .iter()
                .filter_map(|rule| check_rule(field, value, rule))
                .collect();
            if !messages.is_empty() {
                errors.insert(field.clone(), messages);
            } else if let Some(v) = value {
                out.insert(field.clone(), v.clone());
            }
        }
        if errors.is_empty() {
            Ok(out)
        } else {
            Err(errors)
        }
    }
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Returns the error message when `rule` fails.
fn check_rule(field: &str, value: Option<&Value>, rule: &str) -> Option<String> {
    let (name, arg) = match rule.split_once(':') {
        Some((n, a)) => (n, Some(a)),
        None => (rule, None),
    };
    if name == "required" {
        return is_blank(value).then(|| format!("{} is required", field));
    }
    // Remaining rules only judge present values.
    let v = value.filter(|v| !is_blank(Some(*v)))?;
    let text = as_text(v);
    let len = text.as_deref().map(|s| s.chars().count()).unwrap_or(0);
    let n_arg = arg.and_then(|a| a.trim().parse::<f64>().ok());
    match name {
        "email" => {
            let ok = text
                .as_deref()
                .map(|s| match s.split_once('@') {
                    Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
                    None => false,
                })
                .unwrap_or(false);
            (!ok).then(|| format!("{} must be a valid email", field))
        }
        "uuid" => {
            let ok = text.as_deref().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false);
            (!ok).then(|| format!("{} must be a valid UUID", field))
        }
        "numeric" => as_number(v).is_none().then(|| format!("{} must be a number", field)),
        "integer" => {
            let ok = match v {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                Value::String(s) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            };
            (!ok).then(|| format!("{} must be an integer", field))
        }
        "date" => {
            let ok = text
                .as_deref()
                .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
                .unwrap_or(false);
            (!ok).then(|| format!("{} must be a date (YYYY-MM-DD)", field))
        }
        "min_length" => match n_arg {
            Some(min) if (len as f64) < min => Some(format!("{} must be at least {} characters", field, min)),
            _ => None,
        },
        "max_length" => match n_arg {
            Some(max) if (len as f64) > max => Some(format!("{} must be at most {} characters", field, max)),
            _ => None,
        },
        "min" => match (as_number(v), n_arg) {
            (Some(n), Some(min)) if n < min => Some(format!("{} must be at least {}", field, min)),
            _ => None,
        },
        "max" => match (as_number(v), n_arg) {
            (Some(n), Some(max)) if n > max => Some(format!("{} must be at most {}", field, max)),
            _ => None,
        },
        "regex" => {
            let pattern = arg.unwrap_or_default();
            match Regex::new(pattern) {
                Ok(re) => {
                    let ok = text.as_deref().map(|s| re.is_match(s)).unwrap_or(false);
                    (!ok).then(|| format!("{} does not match required pattern", field))
                }
                Err(_) => Some(format!("invalid pattern for {}", field)),
            }
        }
        "in" => {
            let allowed: Vec<&str> = arg.unwrap_or_default().split(',').map(str::trim).collect();
            let ok = text.as_deref().map(|s| allowed.contains(&s)).unwrap_or(false);
            (!ok).then(|| format!("{} must be one of: {}", field, allowed.join(", ")))
        }
        other => {
            tracing::warn!(rule = %other, field = %field, "unknown validation rule ignored");
            None
        }
    }
}
