//! Form view models for create, edit and show.

use crate::error::AppError;
use crate::schema::{Control, FieldDefinition, FormSchema, FormType, OptionSource, SelectOption};
use crate::service::{QueryExecutor, Row};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldView {
    pub name: String,
    pub label: String,
    pub control: Control,
    pub value: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub datalist: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    pub readonly: bool,
    pub disabled: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Output of the field's custom renderer, when it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormView {
    pub module: String,
    pub form_type: FormType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub fields: Vec<FieldView>,
}

impl FormView {
    pub fn field(&self, name: &str) -> Option<&FieldView> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Attach validation messages to their fields for re-rendering.
    pub fn with_errors(mut self, errors: &crate::error::FieldErrors) -> Self {
        for f in &mut self.fields {
            if let Some(msgs) = errors.get(&f.name) {
                f.errors = msgs.clone();
            }
        }
        self
    }
}

/// Options for a field or filter. Query sources must select `value` and `label` columns.
pub async fn resolve_options(executor: &dyn QueryExecutor, source: &OptionSource) -> Result<Vec<SelectOption>, AppError> {
    match source {
        OptionSource::Static(options) => Ok(options.clone()),
        OptionSource::Query(sql) => {
            let rows = executor.fetch_all(sql, &[]).await?;
            Ok(rows.iter().filter_map(option_from_row).collect())
        }
    }
}

fn option_from_row(row: &Row) -> Option<SelectOption> {
    let value = match row.get("value") {
        Some(v) if !v.is_null() => crate::format::to_text(v),
        _ => {
            tracing::warn!(row = ?row, "option query row has no value column");
            return None;
        }
    };
    let label = row
        .get("label")
        .map(crate::format::to_text)
        .unwrap_or_else(|| value.clone());
    Some(SelectOption { value, label })
}

/// Field views in declared order. `values` are the record (edit/show) or the defaults (create).
pub async fn build_form(
    executor: &dyn QueryExecutor,
    module: &str,
    form: &FormSchema,
    form_type: FormType,
    id: Option<Value>,
    values: &Map<String, Value>,
) -> Result<FormView, AppError> {
    let rules = form.validation_rules(form_type);
    let mut fields = Vec::with_capacity(form.fields.len());
    for (field, (_, field_rules)) in form.fields.iter().zip(rules.iter()) {
        let options = if field.control == Control::Dropdown || !is_empty_source(&field.options) {
            resolve_options(executor, &field.options).await?
        } else {
            Vec::new()
        };
        fields.push(field_view(field, form_type, values, options, field_rules));
    }
    Ok(FormView {
        module: module.to_string(),
        form_type,
        id,
        fields,
    })
}

fn is_empty_source(source: &OptionSource) -> bool {
    matches!(source, OptionSource::Static(o) if o.is_empty())
}

fn field_view(
    field: &FieldDefinition,
    form_type: FormType,
    values: &Map<String, Value>,
    options: Vec<SelectOption>,
    rules: &[String],
) -> FieldView {
    let value = values.get(&field.name).cloned().unwrap_or(Value::Null);
    let rendered = field.renderer.as_ref().map(|r| r(&field.name, &value));
    FieldView {
        name: field.name.clone(),
        label: field.label.clone(),
        control: field.control,
        options,
        datalist: field.datalist.clone(),
        accept: field.accept.clone(),
        readonly: form_type == FormType::Show || field.readonly,
        disabled: field.disabled,
        required: form_type != FormType::Show && rules.iter().any(|r| r == "required"),
        placeholder: field.placeholder.clone(),
        help: field.help.clone(),
        rendered,
        errors: Vec::new(),
        value,
    }
}
