//! Per-(module, session) listing state: paging, sorting, filter link and filter values.
//! Passed explicitly into every orchestrator call; persisted by a [`StateStore`].

use crate::error::AppError;
use crate::schema::SortDirection;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

pub const SEARCH: &str = "search";
pub const DATE_START: &str = "date_start";
pub const DATE_END: &str = "date_end";
const DROPDOWN_PREFIX: &str = "dropdowns_";

/// Identifies one module's state for one client session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub module: String,
    pub session: String,
}

impl StateKey {
    pub fn new(module: impl Into<String>, session: impl Into<String>) -> Self {
        StateKey {
            module: module.into(),
            session: session.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    page: u32,
    per_page: Option<u32>,
    order_by: Option<String>,
    sort: Option<SortDirection>,
    filter_link: Option<usize>,
    filters: BTreeMap<String, String>,
}

impl Default for ModuleState {
    fn default() -> Self {
        ModuleState {
            page: 1,
            per_page: None,
            order_by: None,
            sort: None,
            filter_link: None,
            filters: BTreeMap::new(),
        }
    }
}

impl ModuleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// No upper bound is enforced here; pages past the end list as empty.
    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn per_page(&self, fallback: u32) -> u32 {
        self.per_page.unwrap_or(fallback)
    }

    /// Values outside `allowed` are ignored and leave the state untouched (returns false).
    /// An accepted change moves back to the first page.
    pub fn set_per_page(&mut self, per_page: u32, allowed: &[u32]) -> bool {
        if !allowed.contains(&per_page) {
            tracing::debug!(per_page, ?allowed, "per-page value rejected");
            return false;
        }
        self.per_page = Some(per_page);
        self.page = 1;
        true
    }

    pub fn order_by<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.order_by.as_deref().unwrap_or(fallback)
    }

    pub fn set_order_by(&mut self, column: impl Into<String>) {
        self.order_by = Some(column.into());
    }

    pub fn sort(&self, fallback: SortDirection) -> SortDirection {
        self.sort.unwrap_or(fallback)
    }

    pub fn set_sort(&mut self, sort: SortDirection) {
        self.sort = Some(sort);
    }

    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn set_filter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.filters.insert(key.into(), value.into());
    }

    pub fn remove_filter(&mut self, key: &str) {
        self.filters.remove(key);
    }

    pub fn dropdown(&self, index: usize) -> Option<&str> {
        self.filter(&format!("{}{}", DROPDOWN_PREFIX, index))
    }

    pub fn active_filter_link(&self) -> Option<usize> {
        self.filter_link
    }

    pub fn set_active_filter_link(&mut self, index: Option<usize>) {
        self.filter_link = index;
    }

    pub fn has_filters(&self) -> bool {
        self.filter_link.is_some()
            || self.filter(SEARCH).is_some()
            || self.filter(DATE_START).is_some()
            || self.filter(DATE_END).is_some()
            || self
                .filters
                .iter()
                .any(|(k, v)| k.starts_with(DROPDOWN_PREFIX) && !v.is_empty())
    }

    /// Drop every filter dimension. Page and sort are left as they are.
    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.filter_link = None;
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    /// Read the state from `store`, field by field. Missing or malformed fields take defaults.
    pub async fn load(store: &dyn StateStore, key: &StateKey) -> Result<ModuleState, AppError> {
        let mut state = ModuleState::default();
        if let Some(v) = store.get(key, "page").await? {
            state.page = v.as_u64().map(|n| n.max(1) as u32).unwrap_or(1);
        }
        if let Some(v) = store.get(key, "per_page").await? {
            state.per_page = v.as_u64().map(|n| n as u32);
        }
        if let Some(v) = store.get(key, "order_by").await? {
            state.order_by = v.as_str().map(String::from);
        }
        if let Some(v) = store.get(key, "sort").await? {
            state.sort = v.as_str().and_then(|s| s.parse().ok());
        }
        if let Some(v) = store.get(key, "filter_link").await? {
            state.filter_link = v.as_u64().map(|n| n as usize);
        }
        if let Some(v) = store.get(key, "filters").await? {
            state.filters = serde_json::from_value(v).unwrap_or_default();
        }
        Ok(state)
    }

    pub async fn save(&self, store: &dyn StateStore, key: &StateKey) -> Result<(), AppError> {
        store.set(key, "page", Value::from(self.page)).await?;
        put_opt(store, key, "per_page", self.per_page.map(Value::from)).await?;
        put_opt(store, key, "order_by", self.order_by.clone().map(Value::String)).await?;
        put_opt(store, key, "sort", self.sort.map(|s| Value::String(s.to_string()))).await?;
        put_opt(store, key, "filter_link", self.filter_link.map(Value::from)).await?;
        let filters = serde_json::to_value(&self.filters).map_err(|e| AppError::Persistence(e.to_string()))?;
        store.set(key, "filters", filters).await
    }
}

async fn put_opt(store: &dyn StateStore, key: &StateKey, field: &str, value: Option<Value>) -> Result<(), AppError> {
    match value {
        Some(v) => store.set(key, field, v).await,
        None => store.remove(key, field).await,
    }
}

/// Session-scoped storage collaborator, addressed by (module, session, field).
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &StateKey, field: &str) -> Result<Option<Value>, AppError>;
    async fn set(&self, key: &StateKey, field: &str, value: Value) -> Result<(), AppError>;
    async fn remove(&self, key: &StateKey, field: &str) -> Result<(), AppError>;
}

/// Process-local store. Last write wins for concurrent requests on one session.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<StateKey, HashMap<String, Value>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error() -> AppError {
    AppError::Persistence("state store lock poisoned".into())
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &StateKey, field: &str) -> Result<Option<Value>, AppError> {
        let guard = self.entries.read().map_err(|_| lock_error())?;
        Ok(guard.get(key).and_then(|m| m.get(field)).cloned())
    }

    async fn set(&self, key: &StateKey, field: &str, value: Value) -> Result<(), AppError> {
        let mut guard = self.entries.write().map_err(|_| lock_error())?;
        guard.entry(key.clone()).or_default().insert(field.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &StateKey, field: &str) -> Result<(), AppError> {
        let mut guard = self.entries.write().map_err(|_| lock_error())?;
        if let Some(m) = guard.get_mut(key) {
            m.remove(field);
        }
        Ok(())
    }
}
