use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::form::{FormDraft, FormPreset};
use crate::store::RecordStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Composition root: the one owner of the record store, form draft and
/// presenter state. Handlers receive it as a parameter; nothing is ambient.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub store: RecordStore,
    pub preset: FormPreset,
    pub enforce_unique_roll_no: bool,
    pub form: FormDraft,
    /// Which table row is showing its subject breakdown. Presentation
    /// state only; never persisted.
    pub expanded_roll_no: Option<i64>,
}

impl AppState {
    pub fn new() -> Self {
        let preset = FormPreset::default();
        let form = FormDraft::fresh(&preset);
        Self {
            workspace: None,
            db: None,
            store: RecordStore::default(),
            preset,
            enforce_unique_roll_no: false,
            form,
            expanded_roll_no: None,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
