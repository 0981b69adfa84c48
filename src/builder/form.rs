//! Fluent builder for [`FormSchema`].

use crate::case::{is_identifier, is_type_name, to_label};
use crate::error::ConfigError;
use crate::schema::{Control, FieldDefinition, FormSchema, OptionSource, RenderFn, SelectOption};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Declares one form field. Consumed by [`FormSchemaBuilder::field`].
#[derive(Clone)]
pub struct FieldBuilder {
    def: FieldDefinition,
    label: Option<String>,
}

impl FieldBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        FieldBuilder {
            def: FieldDefinition {
                name: name.into(),
                label: String::new(),
                expression: None,
                control: Control::Text,
                rules: Vec::new(),
                options: OptionSource::default(),
                datalist: Vec::new(),
                accept: None,
                default: None,
                readonly: false,
                disabled: false,
                required_on_create: false,
                placeholder: None,
                help: None,
                renderer: None,
                pg_type: None,
            },
            label: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Read-only select override, e.g. a value from a joined table.
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.def.expression = Some(expression.into());
        self
    }

    pub fn control(mut self, control: Control) -> Self {
        self.def.control = control;
        self
    }

    /// Append one `name[:arg]` rule.
    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.def.rules.push(rule.into());
        self
    }

    pub fn rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.def.rules.extend(rules.into_iter().map(Into::into));
        self
    }

    /// Dropdown with fixed options. Also switches the control to a dropdown.
    pub fn options(mut self, options: Vec<SelectOption>) -> Self {
        self.def.control = Control::Dropdown;
        self.def.options = OptionSource::Static(options);
        self
    }

    /// Dropdown whose options are loaded by `query` at render time.
    pub fn options_from(mut self, query: impl Into<String>) -> Self {
        self.def.control = Control::Dropdown;
        self.def.options = OptionSource::Query(query.into());
        self
    }

    pub fn datalist<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.def.datalist = values.into_iter().map(Into::into).collect();
        self
    }

    /// MIME pattern for image/file controls, e.g. `image/*`.
    pub fn accept(mut self, pattern: impl Into<String>) -> Self {
        self.def.accept = Some(pattern.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.def.default = Some(value);
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.def.readonly = readonly;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.def.disabled = disabled;
        self
    }

    /// Enforce the `required` rule only when creating.
    pub fn required_on_create(mut self, required_on_create: bool) -> Self {
        self.def.required_on_create = required_on_create;
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.def.placeholder = Some(text.into());
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.def.help = Some(text.into());
        self
    }

    /// PostgreSQL type the submitted value is cast to when written, e.g. `integer`.
    pub fn pg_type(mut self, pg_type: impl Into<String>) -> Self {
        self.def.pg_type = Some(pg_type.into());
        self
    }

    pub fn renderer<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Value) -> String + Send + Sync + 'static,
    {
        let f: RenderFn = Arc::new(f);
        self.def.control = Control::Custom;
        self.def.renderer = Some(f);
        self
    }

    fn to_definition(&self) -> FieldDefinition {
        let mut def = self.def.clone();
        def.label = self.label.clone().unwrap_or_else(|| to_label(&def.name));
        def
    }
}

#[derive(Clone, Default)]
pub struct FormSchemaBuilder {
    fields: Vec<FieldBuilder>,
}

impl FormSchemaBuilder {
    pub fn new() -> Self {
        FormSchemaBuilder { fields: Vec::new() }
    }

    pub fn field(&mut self, field: FieldBuilder) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn build(&self) -> Result<FormSchema, ConfigError> {
        let fields: Vec<FieldDefinition> = self.fields.iter().map(FieldBuilder::to_definition).collect();
        let mut seen = HashSet::new();
        for f in &fields {
            if !is_identifier(&f.name) || f.name.contains('.') {
                return Err(ConfigError::InvalidIdentifier {
                    kind: "field",
                    name: f.name.clone(),
                });
            }
            if !seen.insert(f.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "field",
                    name: f.name.clone(),
                });
            }
            if let Some(t) = f.pg_type.as_ref().filter(|t| !is_type_name(t)) {
                return Err(ConfigError::InvalidIdentifier {
                    kind: "column type",
                    name: t.clone(),
                });
            }
        }
        Ok(FormSchema { fields })
    }
}
