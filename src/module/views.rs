//! Serializable listing and filter views. Rendering to markup happens elsewhere.

use crate::module_state::ModuleState;
use crate::schema::{ActionDefinition, FilterLinkDefinition, SelectOption, SortDirection};
use crate::service::Row;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnHeader {
    pub index: usize,
    pub name: String,
    pub label: String,
    pub sortable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorted: Option<SortDirection>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterLinkView {
    pub index: usize,
    pub label: String,
    pub active: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Actions {
    pub row: Vec<ActionDefinition>,
    pub bulk: Vec<ActionDefinition>,
    pub toolbar: Vec<ActionDefinition>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Listing {
    pub module: String,
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<Row>,
    pub page: u32,
    pub per_page: u32,
    pub allowed_per_page: Vec<u32>,
    pub total_rows: u64,
    pub total_pages: u64,
    pub has_filters: bool,
    pub filter_links: Vec<FilterLinkView>,
    pub actions: Actions,
    pub can_create: bool,
    pub can_export: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DropdownView {
    pub index: usize,
    pub key: String,
    pub label: String,
    pub options: Vec<SelectOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterForm {
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Present only when the schema declares a date column.
    pub date_range: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,
    pub dropdowns: Vec<DropdownView>,
    pub filter_links: Vec<FilterLinkView>,
}

/// Values the client submits to `filter_set`.
pub type FilterPayload = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Warning,
}

/// User-visible result text of a mutation or action.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

pub(crate) fn filter_link_views(links: &[FilterLinkDefinition], state: &ModuleState) -> Vec<FilterLinkView> {
    links
        .iter()
        .enumerate()
        .map(|(index, link)| FilterLinkView {
            index,
            label: link.label.clone(),
            active: state.active_filter_link() == Some(index),
        })
        .collect()
}
