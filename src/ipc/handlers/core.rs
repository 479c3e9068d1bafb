use crate::db;
use crate::form::{self, FormDraft};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::RecordStore;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let conn = match db::open_db(&path) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };

    // The mirror is read exactly once per workspace selection; from here on
    // the in-memory store is authoritative.
    let store = match RecordStore::load(&conn) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:?}"), None),
    };
    let preset = match form::load_preset(&conn) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:?}"), None),
    };
    let enforce_unique_roll_no = match form::load_unique_roll_no(&conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:?}"), None),
    };

    tracing::info!(
        workspace = %path.display(),
        records = store.len(),
        "workspace opened"
    );

    state.form = FormDraft::fresh(&preset);
    state.preset = preset;
    state.enforce_unique_roll_no = enforce_unique_roll_no;
    state.store = store;
    state.expanded_roll_no = None;
    state.workspace = Some(path.clone());
    state.db = Some(conn);

    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "recordCount": state.store.len()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
