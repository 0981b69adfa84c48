use serde::{Deserialize, Serialize};

/// Where an action is offered: on one row, on the selected rows, or on the whole view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionScope {
    Row,
    Bulk,
    Toolbar,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionDefinition {
    pub name: String,
    pub label: String,
    pub icon: Option<String>,
    pub requires_confirmation_form: bool,
    pub scope: ActionScope,
}
