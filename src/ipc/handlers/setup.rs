use crate::calc::{CoLabel, QuestionConfig, QuestionEntry};
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Stock exam layout used to seed a fresh setup form: Part A is ten
/// 2-mark questions, Part B is internal-choice pairs q11-q15 at 13 marks
/// and q16 at 15.
fn default_question_config() -> QuestionConfig {
    let entries: [(&str, CoLabel, f64); 22] = [
        ("q1", CoLabel::Co2, 2.0),
        ("q2", CoLabel::Co1, 2.0),
        ("q3", CoLabel::Co2, 2.0),
        ("q4", CoLabel::Co2, 2.0),
        ("q5", CoLabel::Co3, 2.0),
        ("q6", CoLabel::Co2, 2.0),
        ("q7", CoLabel::Co1, 2.0),
        ("q8", CoLabel::Co1, 2.0),
        ("q9", CoLabel::Co3, 2.0),
        ("q10", CoLabel::Co2, 2.0),
        ("q11a", CoLabel::Co3, 13.0),
        ("q11b", CoLabel::Co3, 13.0),
        ("q12a", CoLabel::Co3, 13.0),
        ("q12b", CoLabel::Co3, 13.0),
        ("q13a", CoLabel::Co4, 13.0),
        ("q13b", CoLabel::Co4, 13.0),
        ("q14a", CoLabel::Co2, 13.0),
        ("q14b", CoLabel::Co4, 13.0),
        ("q15a", CoLabel::Co5, 13.0),
        ("q15b", CoLabel::Co5, 13.0),
        ("q16a", CoLabel::Co5, 15.0),
        ("q16b", CoLabel::Co5, 15.0),
    ];
    entries
        .into_iter()
        .map(|(id, co, max_mark)| (id.to_string(), QuestionEntry { co, max_mark }))
        .collect()
}

fn handle_default_question_config(req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "questionConfig": default_question_config() }),
    )
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.defaultQuestionConfig" => Some(handle_default_question_config(req)),
        _ => None,
    }
}
