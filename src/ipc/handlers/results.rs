use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::records::ResultRecord;
use serde_json::json;

fn subject_details(record: &ResultRecord) -> Vec<serde_json::Value> {
    record
        .subjects
        .values()
        .map(|s| {
            let percentage = if s.maximum > 0 {
                calc::round_off_2_decimals(100.0 * f64::from(s.obtained) / f64::from(s.maximum))
            } else {
                0.0
            };
            json!({
                "id": s.id,
                "name": s.name,
                "obtained": s.obtained,
                "maximum": s.maximum,
                "percentage": percentage,
            })
        })
        .collect()
}

fn handle_results_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "records": state.store.records(),
            "recordCount": state.store.len()
        }),
    )
}

fn handle_results_table_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let records = state.store.records();

    // Display order is ascending roll number, independent of rank order.
    let mut ordered: Vec<&ResultRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.roll_no);

    let rows: Vec<serde_json::Value> = ordered
        .iter()
        .map(|record| {
            let expanded = state.expanded_roll_no == Some(record.roll_no);
            let mut row = json!({
                "rollNo": record.roll_no,
                "obtained": calc::total(record),
                "maximum": record.maximum,
                "percentage": calc::round_off_2_decimals(calc::percentage(record)),
                "rank": calc::rank(records, record.roll_no),
                "expanded": expanded,
            });
            if expanded {
                row["details"] = json!(subject_details(record));
            }
            row
        })
        .collect();

    ok(
        &req.id,
        json!({
            "rows": rows,
            "expandedRollNo": state.expanded_roll_no
        }),
    )
}

fn handle_results_toggle_details(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(roll_no) = req.params.get("rollNo").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing rollNo", None);
    };
    if !state.store.contains_roll_no(roll_no) {
        return err(
            &req.id,
            "not_found",
            "no result with that roll number",
            Some(json!({ "rollNo": roll_no })),
        );
    }

    state.expanded_roll_no = if state.expanded_roll_no == Some(roll_no) {
        None
    } else {
        Some(roll_no)
    };
    ok(&req.id, json!({ "expandedRollNo": state.expanded_roll_no }))
}

fn handle_results_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(roll_no) = req.params.get("rollNo").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing rollNo", None);
    };

    let removed = match state.store.remove(conn, roll_no) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_update_failed", format!("{e:?}"), None),
    };
    if state.expanded_roll_no == Some(roll_no) {
        state.expanded_roll_no = None;
    }

    tracing::debug!(roll_no, removed, "result deleted");
    ok(
        &req.id,
        json!({
            "removedCount": removed,
            "recordCount": state.store.len()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.list" => Some(handle_results_list(state, req)),
        "results.tableModel" => Some(handle_results_table_model(state, req)),
        "results.toggleDetails" => Some(handle_results_toggle_details(state, req)),
        "results.delete" => Some(handle_results_delete(state, req)),
        _ => None,
    }
}
