use crate::calc::{self, Marks, QuestionConfig, Student};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

// The calc.* family is pure: no workspace required, nothing persisted.
// The entry grid and the setup preview call these while the user types.

fn parse_param<T: serde::de::DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<T, serde_json::Value> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid {}: {}", key, e), None))
}

fn handle_score(req: &Request) -> serde_json::Value {
    let marks: Marks = match parse_param(req, "marks") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let config: QuestionConfig = match parse_param(req, "questionConfig") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    ok(&req.id, json!({ "coResult": calc::score_marks(&marks, &config) }))
}

fn handle_max_marks(req: &Request) -> serde_json::Value {
    let config: QuestionConfig = match parse_param(req, "questionConfig") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // Marks are optional here: without them this is the static exam-design
    // view, with them the per-student denominator.
    let marks: Option<Marks> = match req.params.get("marks") {
        None | Some(serde_json::Value::Null) => None,
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                return err(&req.id, "bad_params", format!("invalid marks: {}", e), None)
            }
        },
    };

    let max = calc::co_max_marks(&config, marks.as_ref());
    ok(&req.id, json!({ "coMaxMarks": max }))
}

fn handle_part_wise_totals(req: &Request) -> serde_json::Value {
    let config: QuestionConfig = match parse_param(req, "questionConfig") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "partWiseTotals": calc::part_wise_totals(&config) }),
    )
}

fn handle_assessment_preview(req: &Request) -> serde_json::Value {
    let students: Vec<Student> = match parse_param(req, "students") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let config: QuestionConfig = match parse_param(req, "questionConfig") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    ok(
        &req.id,
        json!({ "computed": calc::compute_assessment(&students, &config) }),
    )
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.score" => Some(handle_score(req)),
        "calc.maxMarks" => Some(handle_max_marks(req)),
        "calc.partWiseTotals" => Some(handle_part_wise_totals(req)),
        "calc.assessment" => Some(handle_assessment_preview(req)),
        _ => None,
    }
}
