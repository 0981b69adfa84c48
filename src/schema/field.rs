//! Form fields.

use super::OptionSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Custom renderer: `(field name, value) -> markup`.
pub type RenderFn = Arc<dyn Fn(&str, &Value) -> String + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    #[default]
    Text,
    Number,
    Checkbox,
    Email,
    Password,
    Dropdown,
    Image,
    File,
    Custom,
}

#[derive(Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    /// Select override used when loading the record for edit/show.
    pub expression: Option<String>,
    pub control: Control,
    /// Ordered `name[:arg]` tokens, executed by the validator.
    pub rules: Vec<String>,
    pub options: OptionSource,
    pub datalist: Vec<String>,
    pub accept: Option<String>,
    pub default: Option<Value>,
    pub readonly: bool,
    pub disabled: bool,
    pub required_on_create: bool,
    pub placeholder: Option<String>,
    pub help: Option<String>,
    pub renderer: Option<RenderFn>,
    /// Cast applied to the written value on insert and update.
    pub pg_type: Option<String>,
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("expression", &self.expression)
            .field("control", &self.control)
            .field("rules", &self.rules)
            .field("readonly", &self.readonly)
            .field("disabled", &self.disabled)
            .field("required_on_create", &self.required_on_create)
            .field("pg_type", &self.pg_type)
            .field("renderer", &self.renderer.as_ref().map(|_| ".."))
            .finish_non_exhaustive()
    }
}

impl FieldDefinition {
    /// SELECT fragment for loading this field's current value.
    pub fn select_expression(&self) -> String {
        match &self.expression {
            Some(expr) => format!("{} AS {}", expr, self.name),
            None => self.name.clone(),
        }
    }

    /// Whether submitted values for this field are written on store/update.
    pub fn is_writable(&self) -> bool {
        !self.readonly && !self.disabled && self.expression.is_none()
    }
}
