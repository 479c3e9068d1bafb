use crate::form::{self, FormDraft, FormPreset};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::validate::{self, ValidationError};
use serde_json::json;

fn validation_err(id: &str, e: ValidationError) -> serde_json::Value {
    err(id, &e.code, e.message, e.details)
}

fn draft_view(state: &AppState) -> serde_json::Value {
    json!({
        "draft": &state.form,
        "totals": state.form.totals(),
    })
}

fn param_string(params: &serde_json::Value, key: &str) -> Option<String> {
    match params.get(key) {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        // Number inputs may arrive as JSON numbers; the draft holds text.
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn handle_form_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "draft": &state.form,
            "totals": state.form.totals(),
            "preset": &state.preset,
        }),
    )
}

fn handle_form_update_field(state: &mut AppState, req: &Request) -> serde_json::Value {
    let field = match req.params.get("field").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing field", None),
    };
    let Some(value) = param_string(&req.params, "value") else {
        return err(&req.id, "bad_params", "missing or non-text value", None);
    };

    if field == "rollNo" {
        state.form.update_roll_no(&value);
        return ok(&req.id, draft_view(state));
    }

    let Some(subject_id) = req.params.get("subjectId").and_then(|v| v.as_i64()) else {
        return err(
            &req.id,
            "bad_params",
            "subject fields need subjectId",
            Some(json!({ "field": field })),
        );
    };
    match state
        .form
        .update_subject_field(&state.preset, subject_id, &field, &value)
    {
        Ok(()) => ok(&req.id, draft_view(state)),
        Err(e) => validation_err(&req.id, e),
    }
}

fn handle_form_add_subject(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.form.add_subject(&state.preset) {
        Ok(subject_id) => {
            let mut view = draft_view(state);
            view["subjectId"] = json!(subject_id);
            ok(&req.id, view)
        }
        Err(e) => validation_err(&req.id, e),
    }
}

fn handle_form_remove_subject(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(subject_id) = req.params.get("subjectId").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing subjectId", None);
    };
    match state.form.remove_subject(&state.preset, subject_id) {
        Ok(()) => ok(&req.id, draft_view(state)),
        Err(e) => validation_err(&req.id, e),
    }
}

fn handle_form_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let validated = validate::validate_draft(
        &state.form,
        &state.preset,
        state.store.records(),
        state.enforce_unique_roll_no,
    );
    let (roll_no, entries) = match validated {
        Ok(v) => v,
        Err(e) => return validation_err(&req.id, e),
    };

    let record = form::build_record(roll_no, entries);
    if let Err(e) = state.store.add(conn, record.clone()) {
        return err(&req.id, "db_insert_failed", format!("{e:?}"), None);
    }
    state.form = FormDraft::fresh(&state.preset);

    tracing::debug!(roll_no, "result submitted");
    ok(
        &req.id,
        json!({
            "record": record,
            "recordCount": state.store.len(),
            "navigateTo": "results"
        }),
    )
}

fn handle_preset_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "preset": &state.preset }))
}

fn handle_preset_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw) = req.params.get("preset") else {
        return err(&req.id, "bad_params", "missing preset", None);
    };
    let preset: FormPreset = match serde_json::from_value(raw.clone()) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if let Err(msg) = preset.check() {
        return err(&req.id, "bad_params", msg, None);
    }

    let force = req
        .params
        .get("force")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !force && !state.form.is_pristine() {
        return err(
            &req.id,
            "unsaved_entry",
            "The form has an unsaved entry; pass force to discard it",
            None,
        );
    }

    if let Err(e) = form::save_preset(conn, &preset) {
        return err(&req.id, "db_insert_failed", format!("{e:?}"), None);
    }
    state.form = FormDraft::fresh(&preset);
    state.preset = preset;

    ok(&req.id, json!({ "preset": &state.preset }))
}

fn handle_unique_roll_no_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "enabled": state.enforce_unique_roll_no }))
}

fn handle_unique_roll_no_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(enabled) = req.params.get("enabled").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "missing enabled", None);
    };
    if let Err(e) = form::save_unique_roll_no(conn, enabled) {
        return err(&req.id, "db_insert_failed", format!("{e:?}"), None);
    }
    state.enforce_unique_roll_no = enabled;
    ok(&req.id, json!({ "enabled": enabled }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "form.get" => Some(handle_form_get(state, req)),
        "form.updateField" => Some(handle_form_update_field(state, req)),
        "form.addSubject" => Some(handle_form_add_subject(state, req)),
        "form.removeSubject" => Some(handle_form_remove_subject(state, req)),
        "form.submit" => Some(handle_form_submit(state, req)),
        "form.preset.get" => Some(handle_preset_get(state, req)),
        "form.preset.set" => Some(handle_preset_set(state, req)),
        "settings.uniqueRollNo.get" => Some(handle_unique_roll_no_get(state, req)),
        "settings.uniqueRollNo.set" => Some(handle_unique_roll_no_set(state, req)),
        _ => None,
    }
}
