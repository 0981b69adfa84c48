//! Load module definitions from JSON and resolve them into [`Module`]s through the builders.

use crate::builder::{ActionBuilder, ColumnBuilder, FieldBuilder, FormSchemaBuilder, TableSchemaBuilder};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use crate::module::Module;
use crate::schema::OptionSource;
use crate::sql::WhereClause;
use std::path::Path;

/// Build one module. Fails on the first schema error.
pub fn resolve(config: &ModuleConfig) -> Result<Module, ConfigError> {
    let mut table = TableSchemaBuilder::new(&config.table);
    table.primary_key(&config.primary_key);
    if let Some(t) = &config.primary_key_type {
        table.primary_key_type(t);
    }
    for j in &config.joins {
        table.join(j);
    }
    for c in &config.columns {
        let mut col = ColumnBuilder::new(&c.name)
            .sortable(c.sortable)
            .searchable(c.searchable);
        if let Some(label) = &c.label {
            col = col.label(label);
        }
        if let Some(expr) = &c.expression {
            col = col.expression(expr);
        }
        if let Some(format) = &c.format {
            col = col.format(format.clone());
        }
        table.column(col);
    }
    for f in &config.filters {
        let label = f.label.clone().unwrap_or_else(|| crate::case::to_label(&f.column));
        match &f.pg_type {
            Some(t) => table.typed_filter(&f.column, label, f.options.clone(), t),
            None => table.filter(&f.column, label, f.options.clone()),
        };
    }
    for l in &config.filter_links {
        table.filter_link(&l.label, &l.condition);
    }
    for a in &config.actions {
        let mut action = ActionBuilder::new(&a.name, a.scope).confirm(a.confirm);
        if let Some(label) = &a.label {
            action = action.label(label);
        }
        if let Some(icon) = &a.icon {
            action = action.icon(icon);
        }
        table.action(action);
    }
    if let Some(order) = &config.order_by {
        table.order_by(&order.column, order.sort);
    }
    if let Some(d) = &config.date_column {
        table.date_column(d);
    }
    if let Some(p) = &config.pagination {
        table.per_page(p.default_per_page, p.allowed_per_page.iter().copied());
    }

    let mut form = FormSchemaBuilder::new();
    for f in &config.fields {
        form.field(field_builder(f));
    }

    let mut module = Module::new(&config.key, table.build()?, form.build()?).with_capabilities(config.capabilities);
    if let Some(scope) = &config.scope {
        module = module.with_where(WhereClause::new(scope.clone(), Vec::new()));
    }
    Ok(module)
}

fn field_builder(f: &FieldConfig) -> FieldBuilder {
    let mut b = FieldBuilder::new(&f.name)
        .rules(f.rules.iter().cloned())
        .datalist(f.datalist.iter().cloned())
        .readonly(f.readonly)
        .disabled(f.disabled)
        .required_on_create(f.required_on_create);
    match &f.options {
        Some(OptionSource::Static(options)) => b = b.options(options.clone()),
        Some(OptionSource::Query(q)) => b = b.options_from(q),
        None => {}
    }
    // An explicit control wins over the dropdown implied by options.
    if let Some(control) = f.control {
        b = b.control(control);
    }
    if let Some(label) = &f.label {
        b = b.label(label);
    }
    if let Some(expr) = &f.expression {
        b = b.expression(expr);
    }
    if let Some(t) = &f.pg_type {
        b = b.pg_type(t);
    }
    if let Some(accept) = &f.accept {
        b = b.accept(accept);
    }
    if let Some(default) = &f.default {
        b = b.default_value(default.clone());
    }
    if let Some(p) = &f.placeholder {
        b = b.placeholder(p);
    }
    if let Some(h) = &f.help {
        b = b.help(h);
    }
    b
}

pub fn parse_modules(json: &str) -> Result<Vec<ModuleConfig>, ConfigError> {
    let file: ModuleFile = serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
    Ok(file.into_vec())
}

/// Read module configs from a JSON file, or from every `*.json` file in a directory (sorted by name).
pub fn load_from_path(path: &Path) -> Result<Vec<ModuleConfig>, ConfigError> {
    let load_err = |e: std::io::Error| ConfigError::Load(format!("{}: {}", path.display(), e));
    if !path.is_dir() {
        let text = std::fs::read_to_string(path).map_err(load_err)?;
        return parse_modules(&text);
    }
    let mut files: Vec<_> = std::fs::read_dir(path)
        .map_err(load_err)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    let mut out = Vec::new();
    for file in files {
        let text =
            std::fs::read_to_string(&file).map_err(|e| ConfigError::Load(format!("{}: {}", file.display(), e)))?;
        let parsed = parse_modules(&text).map_err(|e| ConfigError::Load(format!("{}: {}", file.display(), e)))?;
        tracing::debug!(file = %file.display(), modules = parsed.len(), "loaded module file");
        out.extend(parsed);
    }
    Ok(out)
}

/// Validate and resolve every config.
pub fn resolve_all(configs: &[ModuleConfig]) -> Result<Vec<Module>, ConfigError> {
    validate(configs)?;
    configs.iter().map(resolve).collect()
}
