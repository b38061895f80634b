use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attainment::TestType;
use crate::calc::{CoLevel, ComputedAssessment, PerCo, QuestionConfig, Student};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamConfig {
    pub academic_year: String,
    pub batch_year: String,
    pub subject_id: String,
    pub test_type: TestType,
}

/// One persisted assessment sitting. At most one document is active per
/// (batchYear, subjectId, testType); superseded rows keep their data with
/// `is_active = 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDoc {
    pub id: String,
    pub exam_config: ExamConfig,
    pub question_config: QuestionConfig,
    pub students: Vec<Student>,
    pub computed: ComputedAssessment,
    pub is_active: bool,
    pub saved_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttainmentResultDoc {
    pub batch_year: String,
    pub subject_id: String,
    pub internal_attainment: PerCo<f64>,
    pub direct_attainment: PerCo<f64>,
    pub indirect_attainment: PerCo<f64>,
    pub final_attainment: PerCo<f64>,
    pub levels: PerCo<CoLevel>,
    pub missing: Vec<String>,
    pub computed_at: String,
}

pub fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Deactivates prior active documents for the (batch, subject, test type)
/// key and inserts the new sitting, in one transaction so two writers can
/// never both stay active.
pub fn save_assessment(
    conn: &Connection,
    exam_config: &ExamConfig,
    question_config: &QuestionConfig,
    students: &[Student],
    computed: &ComputedAssessment,
) -> anyhow::Result<String> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "UPDATE assessments SET is_active = 0
         WHERE batch_year = ? AND subject_id = ? AND test_type = ? AND is_active = 1",
        (
            &exam_config.batch_year,
            &exam_config.subject_id,
            exam_config.test_type.label(),
        ),
    )?;

    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO assessments(
           id,
           batch_year,
           subject_id,
           test_type,
           academic_year,
           question_config,
           students,
           computed,
           is_active,
           saved_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        (
            &id,
            &exam_config.batch_year,
            &exam_config.subject_id,
            exam_config.test_type.label(),
            &exam_config.academic_year,
            serde_json::to_string(question_config)?,
            serde_json::to_string(students)?,
            serde_json::to_string(computed)?,
            now_utc(),
        ),
    )?;

    tx.commit()?;
    Ok(id)
}

struct AssessmentRow {
    id: String,
    batch_year: String,
    subject_id: String,
    test_type: String,
    academic_year: String,
    question_config: String,
    students: String,
    computed: String,
    is_active: i64,
    saved_at: String,
}

fn row_to_doc(row: AssessmentRow) -> anyhow::Result<AssessmentDoc> {
    let test_type = TestType::parse(&row.test_type)
        .with_context(|| format!("unknown test type in store: {}", row.test_type))?;
    Ok(AssessmentDoc {
        id: row.id,
        exam_config: ExamConfig {
            academic_year: row.academic_year,
            batch_year: row.batch_year,
            subject_id: row.subject_id,
            test_type,
        },
        question_config: serde_json::from_str(&row.question_config)
            .context("parse stored question config")?,
        students: serde_json::from_str(&row.students).context("parse stored students")?,
        computed: serde_json::from_str(&row.computed).context("parse stored computed block")?,
        is_active: row.is_active != 0,
        saved_at: row.saved_at,
    })
}

const ASSESSMENT_COLUMNS: &str = "id, batch_year, subject_id, test_type, academic_year, \
     question_config, students, computed, is_active, saved_at";

fn map_assessment_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<AssessmentRow> {
    Ok(AssessmentRow {
        id: r.get(0)?,
        batch_year: r.get(1)?,
        subject_id: r.get(2)?,
        test_type: r.get(3)?,
        academic_year: r.get(4)?,
        question_config: r.get(5)?,
        students: r.get(6)?,
        computed: r.get(7)?,
        is_active: r.get(8)?,
        saved_at: r.get(9)?,
    })
}

/// Active documents for a batch, optionally narrowed to one subject. This
/// is the view the attainment blend runs over: one document per test type
/// at most, because supersession keeps the key unique among active rows.
pub fn query_active(
    conn: &Connection,
    batch_year: &str,
    subject_id: Option<&str>,
) -> anyhow::Result<Vec<AssessmentDoc>> {
    let rows: Vec<AssessmentRow> = if let Some(subject_id) = subject_id {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM assessments
             WHERE batch_year = ? AND subject_id = ? AND is_active = 1
             ORDER BY saved_at, id",
            ASSESSMENT_COLUMNS
        ))?;
        let it = stmt.query_map((batch_year, subject_id), map_assessment_row)?;
        it.collect::<Result<Vec<_>, _>>()?
    } else {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM assessments
             WHERE batch_year = ? AND is_active = 1
             ORDER BY saved_at, id",
            ASSESSMENT_COLUMNS
        ))?;
        let it = stmt.query_map([batch_year], map_assessment_row)?;
        it.collect::<Result<Vec<_>, _>>()?
    };

    rows.into_iter().map(row_to_doc).collect()
}

pub fn get_assessment(conn: &Connection, id: &str) -> anyhow::Result<Option<AssessmentDoc>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM assessments WHERE id = ?", ASSESSMENT_COLUMNS),
            [id],
            map_assessment_row,
        )
        .optional()?;
    row.map(row_to_doc).transpose()
}

pub fn list_batch_years(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT batch_year FROM assessments WHERE is_active = 1 ORDER BY batch_year",
    )?;
    let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn list_subjects(conn: &Connection, batch_year: &str) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT subject_id FROM assessments
         WHERE batch_year = ? AND is_active = 1
         ORDER BY subject_id",
    )?;
    let rows = stmt.query_map([batch_year], |r| r.get::<_, String>(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Upserts the blend result for its (batch, subject) key. The previous
/// result is replaced in full; partial merges are never wanted here.
pub fn save_attainment_result(conn: &Connection, doc: &AttainmentResultDoc) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO attainment_results(
           batch_year,
           subject_id,
           internal_attainment,
           direct_attainment,
           indirect_attainment,
           final_attainment,
           levels,
           missing,
           computed_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(batch_year, subject_id) DO UPDATE SET
           internal_attainment = excluded.internal_attainment,
           direct_attainment = excluded.direct_attainment,
           indirect_attainment = excluded.indirect_attainment,
           final_attainment = excluded.final_attainment,
           levels = excluded.levels,
           missing = excluded.missing,
           computed_at = excluded.computed_at",
        (
            &doc.batch_year,
            &doc.subject_id,
            serde_json::to_string(&doc.internal_attainment)?,
            serde_json::to_string(&doc.direct_attainment)?,
            serde_json::to_string(&doc.indirect_attainment)?,
            serde_json::to_string(&doc.final_attainment)?,
            serde_json::to_string(&doc.levels)?,
            serde_json::to_string(&doc.missing)?,
            &doc.computed_at,
        ),
    )?;
    Ok(())
}

pub fn get_attainment_result(
    conn: &Connection,
    batch_year: &str,
    subject_id: &str,
) -> anyhow::Result<Option<AttainmentResultDoc>> {
    let row: Option<(String, String, String, String, String, String, String)> = conn
        .query_row(
            "SELECT internal_attainment, direct_attainment, indirect_attainment,
                    final_attainment, levels, missing, computed_at
             FROM attainment_results
             WHERE batch_year = ? AND subject_id = ?",
            (batch_year, subject_id),
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                ))
            },
        )
        .optional()?;

    let Some((internal, direct, indirect, final_, levels, missing, computed_at)) = row else {
        return Ok(None);
    };

    Ok(Some(AttainmentResultDoc {
        batch_year: batch_year.to_string(),
        subject_id: subject_id.to_string(),
        internal_attainment: serde_json::from_str(&internal).context("parse stored internal")?,
        direct_attainment: serde_json::from_str(&direct).context("parse stored direct")?,
        indirect_attainment: serde_json::from_str(&indirect).context("parse stored indirect")?,
        final_attainment: serde_json::from_str(&final_).context("parse stored final")?,
        levels: serde_json::from_str(&levels).context("parse stored levels")?,
        missing: serde_json::from_str(&missing).context("parse stored missing list")?,
        computed_at,
    }))
}
