use crate::attainment::{self, AssessmentSource};
use crate::calc::{CoLabel, PerCo};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, AttainmentResultDoc};
use serde_json::json;

/// Indirect survey scores arrive from a form where untouched COs are simply
/// absent, so missing keys read as 0 rather than failing the request.
fn parse_indirect(raw: Option<&serde_json::Value>) -> Result<PerCo<f64>, String> {
    let mut out = PerCo::<f64>::default();
    let Some(raw) = raw else {
        return Ok(out);
    };
    if raw.is_null() {
        return Ok(out);
    }
    let Some(obj) = raw.as_object() else {
        return Err("indirectAttainment must be an object".to_string());
    };
    for co in CoLabel::ALL {
        if let Some(v) = obj.get(co.as_str()) {
            let Some(n) = v.as_f64() else {
                return Err(format!("indirectAttainment.{} must be a number", co.as_str()));
            };
            *out.get_mut(co) = n;
        }
    }
    Ok(out)
}

fn handle_compute(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let batch_year = match req.params.get("batchYear").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing batchYear", None),
    };
    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let indirect = match parse_indirect(req.params.get("indirectAttainment")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let docs = match store::query_active(conn, &batch_year, Some(&subject_id)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let sources: Vec<AssessmentSource> = docs
        .iter()
        .map(|d| AssessmentSource {
            test_type: d.exam_config.test_type,
            attainment: d.computed.attainment.clone(),
        })
        .collect();

    let outcome = attainment::compute_attainment(&sources, &indirect);

    let result = AttainmentResultDoc {
        batch_year,
        subject_id,
        internal_attainment: outcome.internal_attainment,
        direct_attainment: outcome.direct_attainment,
        indirect_attainment: indirect,
        final_attainment: outcome.final_attainment,
        levels: outcome.levels,
        missing: outcome.missing,
        computed_at: store::now_utc(),
    };

    if let Err(e) = store::save_attainment_result(conn, &result) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "attainment_results" })),
        );
    }

    match serde_json::to_value(&result) {
        Ok(v) => ok(&req.id, json!({ "attainment": v })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let batch_year = match req.params.get("batchYear").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing batchYear", None),
    };
    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };

    match store::get_attainment_result(conn, &batch_year, &subject_id) {
        Ok(Some(result)) => match serde_json::to_value(&result) {
            Ok(v) => ok(&req.id, json!({ "attainment": v })),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Ok(None) => err(&req.id, "not_found", "no attainment result for key", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attainment.compute" => Some(handle_compute(state, req)),
        "attainment.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
