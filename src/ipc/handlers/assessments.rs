use crate::calc::{self, QuestionConfig, Student};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, ExamConfig};
use serde_json::json;

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(raw_exam) = req.params.get("examConfig") else {
        return err(&req.id, "bad_params", "missing examConfig", None);
    };
    let exam_config: ExamConfig = match serde_json::from_value(raw_exam.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid examConfig: {}", e),
                None,
            )
        }
    };

    let Some(raw_config) = req.params.get("questionConfig") else {
        return err(&req.id, "bad_params", "missing questionConfig", None);
    };
    let question_config: QuestionConfig = match serde_json::from_value(raw_config.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid questionConfig: {}", e),
                None,
            )
        }
    };

    let Some(raw_students) = req.params.get("students") else {
        return err(&req.id, "bad_params", "missing students", None);
    };
    let mut students: Vec<Student> = match serde_json::from_value(raw_students.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid students: {}", e),
                None,
            )
        }
    };

    // The entry grid may have reordered or dropped rows since the serials
    // were assigned; saved documents always carry a dense 1-based sequence.
    calc::resequence_sl_no(&mut students);
    let computed = calc::compute_assessment(&students, &question_config);

    match store::save_assessment(conn, &exam_config, &question_config, &students, &computed) {
        Ok(id) => ok(&req.id, json!({ "assessmentId": id })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "assessments" })),
        ),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let batch_year = match req.params.get("batchYear").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing batchYear", None),
    };
    let subject_id = req
        .params
        .get("subjectId")
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());

    let docs = match store::query_active(conn, &batch_year, subject_id.as_deref()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let assessments: Vec<serde_json::Value> = docs
        .iter()
        .map(|d| {
            json!({
                "id": d.id,
                "batchYear": d.exam_config.batch_year,
                "subjectId": d.exam_config.subject_id,
                "testType": d.exam_config.test_type.label(),
                "academicYear": d.exam_config.academic_year,
                "studentCount": d.students.len(),
                "savedAt": d.saved_at,
            })
        })
        .collect();

    ok(&req.id, json!({ "assessments": assessments }))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let assessment_id = match req.params.get("assessmentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing assessmentId", None),
    };

    match store::get_assessment(conn, &assessment_id) {
        Ok(Some(doc)) => match serde_json::to_value(&doc) {
            Ok(v) => ok(&req.id, json!({ "assessment": v })),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Ok(None) => err(&req.id, "not_found", "assessment not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_batches_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match store::list_batch_years(conn) {
        Ok(batches) => ok(&req.id, json!({ "batchYears": batches })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let batch_year = match req.params.get("batchYear").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing batchYear", None),
    };

    match store::list_subjects(conn, &batch_year) {
        Ok(subjects) => ok(&req.id, json!({ "subjectIds": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assessments.save" => Some(handle_save(state, req)),
        "assessments.list" => Some(handle_list(state, req)),
        "assessments.get" => Some(handle_get(state, req)),
        "batches.list" => Some(handle_batches_list(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        _ => None,
    }
}
