//! Compiled form schema and its derived views.

use super::FieldDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Create,
    Edit,
    Show,
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FormType::Create => "create",
            FormType::Edit => "edit",
            FormType::Show => "show",
        })
    }
}

const REQUIRED_RULE: &str = "required";

#[derive(Clone, Debug, Default)]
pub struct FormSchema {
    pub fields: Vec<FieldDefinition>,
}

impl FormSchema {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.label.as_str()).collect()
    }

    pub fn select_expressions(&self) -> Vec<String> {
        self.fields.iter().map(FieldDefinition::select_expression).collect()
    }

    /// Rules per field in declaration order. Fields marked required-on-create
    /// lose their `required` token outside the create form.
    pub fn validation_rules(&self, form_type: FormType) -> Vec<(String, Vec<String>)> {
        self.fields
            .iter()
            .map(|f| {
                let rules = if f.required_on_create && form_type != FormType::Create {
                    f.rules.iter().filter(|r| r.as_str() != REQUIRED_RULE).cloned().collect()
                } else {
                    f.rules.clone()
                };
                (f.name.clone(), rules)
            })
            .collect()
    }

    /// Declared defaults; fields without one are omitted.
    pub fn defaults(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|f| f.default.clone().map(|d| (f.name.clone(), d)))
            .collect()
    }
}
