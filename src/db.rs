use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("attaind.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // One row per saved assessment sitting. Document payloads (question
    // config, students, computed stats) are JSON text; the supersession key
    // and the active flag are real columns so the active-document query
    // stays indexable.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments(
            id TEXT PRIMARY KEY,
            batch_year TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            test_type TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            question_config TEXT NOT NULL,
            students TEXT NOT NULL,
            computed TEXT NOT NULL,
            is_active INTEGER NOT NULL,
            saved_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_active_key
         ON assessments(batch_year, subject_id, test_type, is_active)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_batch ON assessments(batch_year, is_active)",
        [],
    )?;

    // Latest blend result per (batch, subject); overwritten wholesale on
    // every recompute.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attainment_results(
            batch_year TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            internal_attainment TEXT NOT NULL,
            direct_attainment TEXT NOT NULL,
            indirect_attainment TEXT NOT NULL,
            final_attainment TEXT NOT NULL,
            levels TEXT NOT NULL,
            missing TEXT NOT NULL,
            computed_at TEXT NOT NULL,
            PRIMARY KEY(batch_year, subject_id)
        )",
        [],
    )?;

    Ok(conn)
}
