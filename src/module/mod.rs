//! The orchestrator: one schema-bound CRUD unit over a base table and its joins.
//!
//! Every call takes the collaborators as a [`Context`] and the caller's [`ModuleState`]
//! explicitly; a `Module` itself holds only immutable schema and registry data and is
//! shared across requests.

mod actions;
mod context;
mod export;
mod forms;
mod views;

pub use actions::{ActionHandler, ActionOutcome, ActionRegistry, DeleteAction, SkipReason, Skipped};
pub use context::Context;
pub use export::{csv_stream, encode_record, neutralize, CsvStream};
pub use forms::{build_form, resolve_options, FieldView, FormView};
pub use views::{
    Actions, ColumnHeader, DropdownView, FilterForm, FilterLinkView, FilterPayload, Listing, Notice, NoticeLevel,
};

use crate::datasource::{effective_per_page, DataSource};
use crate::error::{AppError, FieldErrors};
use crate::module_state::{ModuleState, DATE_END, DATE_START, SEARCH};
use crate::schema::{ActionScope, FilterDefinition, FormSchema, FormType, TableSchema};
use crate::service::{fetch_count, Capabilities, PermissionMode, QueryExecutor, RecordPolicy, Row};
use crate::sql::{self, Assignment, Conditions, WhereClause};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Result of `store` / `update`. Validation and persistence failures are values, not errors.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationOutcome {
    Done { id: Value },
    Invalid { errors: FieldErrors },
    Failed,
}

impl MutationOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, MutationOutcome::Done { .. })
    }

    pub fn notice(&self, module: &str) -> Option<Notice> {
        match self {
            MutationOutcome::Done { .. } => Some(Notice::success(format!("{} saved", module))),
            MutationOutcome::Invalid { .. } => None,
            MutationOutcome::Failed => Some(Notice::warning("the record could not be saved")),
        }
    }
}

const SEARCH_MAX_LENGTH: &str = "max_length:255";

pub struct Module {
    key: String,
    table: TableSchema,
    form: FormSchema,
    capabilities: Capabilities,
    record_policy: Option<RecordPolicy>,
    actions: ActionRegistry,
    extra_where: Vec<WhereClause>,
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("key", &self.key)
            .field("table", &self.table.table)
            .field("capabilities", &self.capabilities)
            .field("actions", &self.actions.names())
            .finish_non_exhaustive()
    }
}

impl Module {
    pub fn new(key: impl Into<String>, table: TableSchema, form: FormSchema) -> Self {
        Module {
            key: key.into(),
            table,
            form,
            capabilities: Capabilities::default(),
            record_policy: None,
            actions: ActionRegistry::with_builtins(),
            extra_where: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Per-record check AND-ed into every id-scoped permission.
    pub fn with_record_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(PermissionMode, &Value) -> bool + Send + Sync + 'static,
    {
        self.record_policy = Some(Arc::new(policy));
        self
    }

    pub fn with_action(mut self, name: impl Into<String>, handler: impl ActionHandler + 'static) -> Self {
        self.actions.register(name, handler);
        self
    }

    /// Predicate applied to every listing, count and export of this module.
    pub fn with_where(mut self, clause: WhereClause) -> Self {
        self.extra_where.push(clause);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn table(&self) -> &TableSchema {
        &self.table
    }

    pub fn form(&self) -> &FormSchema {
        &self.form
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Fail when the base table or its primary key is absent from the database. Key,
    /// dropdown and writable columns of the base table without a declared type take the
    /// catalog's, so their placeholders are cast.
    pub async fn verify(&mut self, executor: &dyn QueryExecutor) -> Result<(), AppError> {
        let types = crate::store::verify_table(executor, &self.table.table, &self.table.primary_key).await?;
        let base = self.table.table.rsplit('.').next().unwrap_or(&self.table.table).to_string();
        let own_column = |column: &str| -> Option<String> {
            let bare = column
                .strip_prefix(&format!("{}.", self.table.table))
                .or_else(|| column.strip_prefix(&format!("{}.", base)))
                .unwrap_or(column);
            (!bare.contains('.')).then(|| bare.to_string())
        };
        let key_type = own_column(&self.table.primary_key).and_then(|c| types.get(&c).cloned());
        let filter_types: Vec<Option<String>> = self
            .table
            .filters
            .iter()
            .map(|f| own_column(&f.column).and_then(|c| types.get(&c).cloned()))
            .collect();

        if self.table.primary_key_type.is_none() {
            self.table.primary_key_type = key_type;
        }
        for (filter, found) in self.table.filters.iter_mut().zip(filter_types) {
            if filter.pg_type.is_none() {
                filter.pg_type = found;
            }
        }
        for field in self.form.fields.iter_mut().filter(|f| f.is_writable() && f.pg_type.is_none()) {
            field.pg_type = types.get(&field.name).cloned();
        }
        tracing::debug!(module = %self.key, columns = types.len(), "table verified");
        Ok(())
    }

    // ---- permissions ----

    async fn allowed(&self, ctx: &Context, mode: PermissionMode) -> Result<bool, AppError> {
        if !self.capabilities.allows(mode) {
            return Ok(false);
        }
        if matches!(mode, PermissionMode::Create | PermissionMode::Edit) && self.form.is_empty() {
            return Ok(false);
        }
        if ctx.principal.is_admin {
            return Ok(true);
        }
        ctx.permissions
            .has_module_grant(&ctx.principal.user_id, &self.key, mode)
            .await
    }

    async fn allowed_for(&self, ctx: &Context, mode: PermissionMode, id: &Value) -> Result<bool, AppError> {
        if !self.allowed(ctx, mode).await? {
            return Ok(false);
        }
        Ok(self.record_policy.as_ref().map_or(true, |policy| policy(mode, id)))
    }

    pub async fn has_create(&self, ctx: &Context) -> Result<bool, AppError> {
        self.allowed(ctx, PermissionMode::Create).await
    }

    pub async fn has_export(&self, ctx: &Context) -> Result<bool, AppError> {
        self.allowed(ctx, PermissionMode::Export).await
    }

    pub async fn has_edit(&self, ctx: &Context, id: &Value) -> Result<bool, AppError> {
        self.allowed_for(ctx, PermissionMode::Edit, id).await
    }

    pub async fn has_show(&self, ctx: &Context, id: &Value) -> Result<bool, AppError> {
        self.allowed_for(ctx, PermissionMode::Show, id).await
    }

    pub async fn has_delete(&self, ctx: &Context, id: &Value) -> Result<bool, AppError> {
        self.allowed_for(ctx, PermissionMode::Delete, id).await
    }

    fn denied(&self, mode: PermissionMode) -> AppError {
        tracing::warn!(module = %self.key, mode = %mode, "permission denied");
        AppError::PermissionDenied(format!("{} on {}", mode, self.key))
    }

    // ---- listing ----

    pub async fn list(&self, ctx: &Context, state: &ModuleState) -> Result<Listing, AppError> {
        let result = DataSource::fetch(ctx.executor.as_ref(), &self.table, state, &self.extra_where).await?;
        let order_by = state.order_by(&self.table.default_order_by);
        let sort = state.sort(self.table.default_sort);
        let columns = self
            .table
            .columns
            .iter()
            .enumerate()
            .map(|(index, c)| ColumnHeader {
                index,
                name: c.name.clone(),
                label: c.label.clone(),
                sortable: c.sortable,
                sorted: (c.name == order_by).then_some(sort),
            })
            .collect();
        let actions = Actions {
            row: self.table.actions_in(ActionScope::Row).cloned().collect(),
            bulk: self.table.actions_in(ActionScope::Bulk).cloned().collect(),
            toolbar: self.table.actions_in(ActionScope::Toolbar).cloned().collect(),
        };
        Ok(Listing {
            module: self.key.clone(),
            columns,
            rows: result.rows.into_iter().map(|r| self.format_row(r)).collect(),
            page: result.page,
            per_page: result.per_page,
            allowed_per_page: self.table.pagination.allowed_per_page.clone(),
            total_rows: result.total_rows,
            total_pages: result.total_pages,
            has_filters: state.has_filters(),
            filter_links: views::filter_link_views(&self.table.filter_links, state),
            actions,
            can_create: self.has_create(ctx).await?,
            can_export: self.has_export(ctx).await?,
        })
    }

    fn format_row(&self, mut row: Row) -> Row {
        for col in self.table.columns.iter().filter(|c| c.formatter.is_some()) {
            if let Some(v) = row.get_mut(&col.name) {
                let formatted = col.format_value(v);
                *v = formatted;
            }
        }
        row
    }

    pub async fn set_page(&self, ctx: &Context, state: &mut ModuleState, page: u32) -> Result<Listing, AppError> {
        state.set_page(page);
        self.list(ctx, state).await
    }

    /// Selecting the sorted column flips its direction; another sortable column
    /// becomes the sort, descending.
    pub async fn set_sort(&self, ctx: &Context, state: &mut ModuleState, column: usize) -> Result<Listing, AppError> {
        match self.table.columns.get(column) {
            Some(col) if col.sortable => {
                let current = state.order_by(&self.table.default_order_by);
                if current == col.name {
                    let flipped = state.sort(self.table.default_sort).flipped();
                    state.set_sort(flipped);
                } else {
                    state.set_order_by(col.name.clone());
                    state.set_sort(crate::schema::SortDirection::Desc);
                }
            }
            Some(col) => tracing::warn!(module = %self.key, column = %col.name, "sort on non-sortable column ignored"),
            None => tracing::warn!(module = %self.key, column, "sort on unknown column index ignored"),
        }
        self.list(ctx, state).await
    }

    pub async fn set_per_page(&self, ctx: &Context, state: &mut ModuleState, per_page: u32) -> Result<Listing, AppError> {
        if !state.set_per_page(per_page, &self.table.pagination.allowed_per_page) {
            tracing::warn!(module = %self.key, per_page, "per-page value not allowed");
        }
        self.list(ctx, state).await
    }

    /// Every matching row as CSV, streamed.
    pub async fn export_csv(&self, ctx: &Context, state: &ModuleState) -> Result<CsvStream, AppError> {
        if !self.has_export(ctx).await? {
            return Err(self.denied(PermissionMode::Export));
        }
        tracing::info!(module = %self.key, "csv export started");
        let rows = DataSource::stream_all(ctx.executor.as_ref(), &self.table, state, &self.extra_where);
        csv_stream(&self.table, rows)
    }

    // ---- filters ----

    pub async fn render_filter_form(&self, ctx: &Context, state: &ModuleState) -> Result<FilterForm, AppError> {
        let mut dropdowns = Vec::with_capacity(self.table.filters.len());
        for (index, filter) in self.table.filters.iter().enumerate() {
            dropdowns.push(DropdownView {
                index,
                key: FilterDefinition::state_key(index),
                label: filter.label.clone(),
                options: resolve_options(ctx.executor.as_ref(), &filter.options).await?,
                selected: state.dropdown(index).map(String::from),
            });
        }
        let has_dates = self.table.date_column.is_some();
        Ok(FilterForm {
            module: self.key.clone(),
            search: state.filter(SEARCH).map(String::from),
            date_range: has_dates,
            date_start: state.filter(DATE_START).filter(|_| has_dates).map(String::from),
            date_end: state.filter(DATE_END).filter(|_| has_dates).map(String::from),
            dropdowns,
            filter_links: views::filter_link_views(&self.table.filter_links, state),
        })
    }

    /// Validate and apply submitted filter values. Empty values clear their filter.
    /// On success the page goes back to 1; on failure the state is untouched.
    pub fn filter_set(
        &self,
        ctx: &Context,
        state: &mut ModuleState,
        payload: &FilterPayload,
    ) -> Result<Result<(), FieldErrors>, AppError> {
        let mut rules = Vec::new();
        let mut errors = FieldErrors::new();
        for key in payload.keys() {
            match self.filter_rules(key) {
                Some(r) => rules.push((key.clone(), r)),
                None => {
                    tracing::warn!(module = %self.key, key = %key, "unknown filter key");
                    errors.insert(key.clone(), vec![format!("{} is not a filter of this module", key)]);
                }
            }
        }
        let submitted: Map<String, Value> = payload
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        if let Err(e) = ctx.validator.validate(&rules, &submitted) {
            errors.extend(e);
        }
        if !errors.is_empty() {
            return Ok(Err(errors));
        }
        for (key, value) in payload {
            let value = value.trim();
            if value.is_empty() {
                state.remove_filter(key);
            } else {
                state.set_filter(key.clone(), value);
            }
        }
        state.set_page(1);
        Ok(Ok(()))
    }

    fn filter_rules(&self, key: &str) -> Option<Vec<String>> {
        match key {
            SEARCH => Some(vec![SEARCH_MAX_LENGTH.to_string()]),
            DATE_START | DATE_END if self.table.date_column.is_some() => Some(vec!["date".to_string()]),
            _ => {
                let index: usize = key.strip_prefix("dropdowns_")?.parse().ok()?;
                (index < self.table.filters.len()).then(Vec::new)
            }
        }
    }

    pub fn filter_clear(&self, state: &mut ModuleState) {
        state.clear_filters();
        state.set_page(1);
    }

    /// Rows matching the filter link at `index` alone (plus module-wide predicates).
    pub async fn filter_link_count(&self, ctx: &Context, index: usize) -> Result<u64, AppError> {
        let cond = sql::filter_link_condition(&self.table, index)
            .ok_or_else(|| AppError::NotFound(format!("filter link {} of {}", index, self.key)))?;
        let mut c = Conditions {
            parts: vec![cond],
            params: Vec::new(),
        };
        for w in &self.extra_where {
            c.parts.push(format!("({})", w.sql));
            c.params.extend(w.params.iter().cloned());
        }
        let q = sql::count(&self.table, &c);
        fetch_count(ctx.executor.as_ref(), &q.sql, &q.params).await
    }

    /// Activate the link at `index`; selecting the active link deactivates it.
    pub async fn set_active_filter_link(
        &self,
        ctx: &Context,
        state: &mut ModuleState,
        index: usize,
    ) -> Result<Listing, AppError> {
        if index >= self.table.filter_links.len() {
            return Err(AppError::NotFound(format!("filter link {} of {}", index, self.key)));
        }
        let next = if state.active_filter_link() == Some(index) {
            None
        } else {
            Some(index)
        };
        state.set_active_filter_link(next);
        state.set_page(1);
        self.list(ctx, state).await
    }

    // ---- forms ----

    pub async fn render_create_form(&self, ctx: &Context) -> Result<FormView, AppError> {
        if !self.has_create(ctx).await? {
            return Err(self.denied(PermissionMode::Create));
        }
        build_form(
            ctx.executor.as_ref(),
            &self.key,
            &self.form,
            FormType::Create,
            None,
            &self.form.defaults(),
        )
        .await
    }

    pub async fn render_edit_form(&self, ctx: &Context, id: &Value) -> Result<FormView, AppError> {
        if !self.has_edit(ctx, id).await? {
            return Err(self.denied(PermissionMode::Edit));
        }
        let record = self.load_record(ctx, id).await?;
        build_form(ctx.executor.as_ref(), &self.key, &self.form, FormType::Edit, Some(id.clone()), &record).await
    }

    /// Every field is readonly in the result.
    pub async fn render_show_form(&self, ctx: &Context, id: &Value) -> Result<FormView, AppError> {
        if !self.has_show(ctx, id).await? {
            return Err(self.denied(PermissionMode::Show));
        }
        let record = self.load_record(ctx, id).await?;
        build_form(ctx.executor.as_ref(), &self.key, &self.form, FormType::Show, Some(id.clone()), &record).await
    }

    async fn load_record(&self, ctx: &Context, id: &Value) -> Result<Row, AppError> {
        let q = sql::select_record(&self.table, &self.form.select_expressions(), id);
        ctx.executor
            .fetch_optional(&q.sql, &q.params)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    /// Base-table row used as the audit "old" snapshot.
    async fn snapshot(&self, ctx: &Context, id: &Value) -> Result<Row, AppError> {
        let q = sql::select_row(&self.table, id);
        ctx.executor
            .fetch_optional(&q.sql, &q.params)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    fn not_found(&self, id: &Value) -> AppError {
        AppError::NotFound(format!("{} {}", self.key, id))
    }

    /// Snapshot for a mutation. A missing row stays an error; any other read failure is
    /// logged and yields `None` so the caller reports a failed mutation.
    async fn snapshot_for(&self, ctx: &Context, id: &Value, op: &'static str) -> Result<Option<Row>, AppError> {
        match self.snapshot(ctx, id).await {
            Ok(row) => Ok(Some(row)),
            Err(e @ AppError::NotFound(_)) => Err(e),
            Err(e) => {
                tracing::error!(module = %self.key, id = %id, op, error = %e, "snapshot read failed");
                Ok(None)
            }
        }
    }

    /// Writable form fields present in `validated`, in declared order.
    fn writable_values(&self, validated: &Map<String, Value>, with_defaults: bool) -> Vec<Assignment> {
        self.form
            .fields
            .iter()
            .filter(|f| f.is_writable())
            .filter_map(|f| {
                let value = validated
                    .get(&f.name)
                    .cloned()
                    .or_else(|| if with_defaults { f.default.clone() } else { None })?;
                Some(Assignment::new(f.name.clone(), value).cast(f.pg_type.clone()))
            })
            .collect()
    }

    // ---- mutations ----

    pub async fn store(
        &self,
        ctx: &Context,
        state: &mut ModuleState,
        payload: &Map<String, Value>,
    ) -> Result<MutationOutcome, AppError> {
        if !self.has_create(ctx).await? {
            return Err(self.denied(PermissionMode::Create));
        }
        let validated = match ctx.validator.validate(&self.form.validation_rules(FormType::Create), payload) {
            Ok(v) => v,
            Err(errors) => return Ok(MutationOutcome::Invalid { errors }),
        };
        let values = self.writable_values(&validated, true);
        let q = sql::insert(&self.table, &values);
        let id = match ctx.executor.insert_returning_id(&q.sql, &q.params).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(module = %self.key, error = %e, "insert failed");
                return Ok(MutationOutcome::Failed);
            }
        };
        let written: Row = values.into_iter().map(|a| (a.column, a.value)).collect();
        if let Err(e) = ctx.audit.log_created(&ctx.principal.user_id, &self.table.table, &id, &written).await {
            tracing::error!(module = %self.key, id = %id, error = %e, "audit write failed after insert");
        }
        state.set_page(1);
        Ok(MutationOutcome::Done { id })
    }

    /// Writes only the submitted writable fields.
    pub async fn update(&self, ctx: &Context, id: &Value, payload: &Map<String, Value>) -> Result<MutationOutcome, AppError> {
        if !self.has_edit(ctx, id).await? {
            return Err(self.denied(PermissionMode::Edit));
        }
        let Some(old) = self.snapshot_for(ctx, id, "update").await? else {
            return Ok(MutationOutcome::Failed);
        };
        let rules: Vec<(String, Vec<String>)> = self
            .form
            .validation_rules(FormType::Edit)
            .into_iter()
            .filter(|(name, rules)| payload.contains_key(name) || rules.iter().any(|r| r == "required"))
            .collect();
        let validated = match ctx.validator.validate(&rules, payload) {
            Ok(v) => v,
            Err(errors) => return Ok(MutationOutcome::Invalid { errors }),
        };
        let values = self.writable_values(&validated, false);
        let Some(q) = sql::update(&self.table, id, &values) else {
            tracing::debug!(module = %self.key, id = %id, "update with no writable values");
            return Ok(MutationOutcome::Done { id: id.clone() });
        };
        match ctx.executor.execute(&q.sql, &q.params).await {
            Ok(0) => {
                tracing::warn!(module = %self.key, id = %id, "update matched no rows");
                return Ok(MutationOutcome::Failed);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(module = %self.key, id = %id, error = %e, "update failed");
                return Ok(MutationOutcome::Failed);
            }
        }
        let new: Row = values.into_iter().map(|a| (a.column, a.value)).collect();
        if let Err(e) = ctx.audit.log_updated(&ctx.principal.user_id, &self.table.table, id, &old, &new).await {
            tracing::error!(module = %self.key, id = %id, error = %e, "audit write failed after update");
        }
        Ok(MutationOutcome::Done { id: id.clone() })
    }

    pub async fn destroy(&self, ctx: &Context, id: &Value) -> Result<bool, AppError> {
        if !self.has_delete(ctx, id).await? {
            return Err(self.denied(PermissionMode::Delete));
        }
        self.delete_record(ctx, id).await
    }

    /// Delete without the permission check; callers check `has_delete` first.
    pub(crate) async fn delete_record(&self, ctx: &Context, id: &Value) -> Result<bool, AppError> {
        let Some(old) = self.snapshot_for(ctx, id, "delete").await? else {
            return Ok(false);
        };
        let q = sql::delete(&self.table, id);
        match ctx.executor.execute(&q.sql, &q.params).await {
            Ok(0) => {
                tracing::warn!(module = %self.key, id = %id, "delete matched no rows");
                return Ok(false);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(module = %self.key, id = %id, error = %e, "delete failed");
                return Ok(false);
            }
        }
        if let Err(e) = ctx.audit.log_deleted(&ctx.principal.user_id, &self.table.table, id, &old).await {
            tracing::error!(module = %self.key, id = %id, error = %e, "audit write failed after delete");
        }
        Ok(true)
    }

    // ---- actions ----

    /// Unknown names produce [`ActionOutcome::Unknown`] rather than an error.
    pub async fn table_action(&self, ctx: &Context, name: &str, ids: &[Value]) -> Result<ActionOutcome, AppError> {
        let Some(handler) = self.actions.get(name) else {
            tracing::warn!(module = %self.key, action = %name, "unknown table action");
            return Ok(ActionOutcome::Unknown {
                action: name.to_string(),
            });
        };
        tracing::info!(module = %self.key, action = %name, count = ids.len(), "table action");
        handler.run(self, ctx, ids).await
    }

    pub fn per_page(&self, state: &ModuleState) -> u32 {
        effective_per_page(&self.table, state)
    }
}
