use crate::mapping::{Course, Mapping, Teacher};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "unimap.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS departments(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            department_code TEXT NOT NULL,
            designation TEXT NOT NULL DEFAULT '',
            updated_at TEXT,
            FOREIGN KEY(department_code) REFERENCES departments(code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_department ON teachers(department_code)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            department_code TEXT NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(department_code) REFERENCES departments(code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_department ON courses(department_code)",
        [],
    )?;

    // Saved snapshot of the session's mappings; rewritten whole on save.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS mappings(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            semester TEXT NOT NULL,
            created_at TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mappings_course ON mappings(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mappings_teacher ON mappings(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(
            serde_json::from_str(&text).with_context(|| format!("setting {} is not JSON", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn department_exists(conn: &Connection, code: &str) -> anyhow::Result<bool> {
    let hit: Option<i64> = conn
        .query_row("SELECT 1 FROM departments WHERE code = ?", [code], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(hit.is_some())
}

pub fn load_teachers(conn: &Connection) -> anyhow::Result<Vec<Teacher>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, department_code, designation FROM teachers ORDER BY name, id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Teacher {
                id: row.get(0)?,
                name: row.get(1)?,
                department: row.get(2)?,
                designation: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_courses(conn: &Connection) -> anyhow::Result<Vec<Course>> {
    let mut stmt =
        conn.prepare("SELECT id, name, code, department_code FROM courses ORDER BY code")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Course {
                id: row.get(0)?,
                name: row.get(1)?,
                code: row.get(2)?,
                department: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_mappings(conn: &Connection) -> anyhow::Result<Vec<Mapping>> {
    let mut stmt = conn.prepare(
        "SELECT id, teacher_id, course_id, semester, created_at
         FROM mappings
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Mapping {
                id: row.get(0)?,
                teacher_id: row.get(1)?,
                course_id: row.get(2)?,
                semester: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replaces the saved mapping snapshot in one transaction.
pub fn save_mappings(conn: &Connection, mappings: &[Mapping]) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM mappings", [])?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO mappings(id, teacher_id, course_id, semester, created_at, sort_order)
             VALUES(?, ?, ?, ?, ?, ?)",
        )?;
        for (i, m) in mappings.iter().enumerate() {
            insert
                .execute((
                    &m.id,
                    &m.teacher_id,
                    &m.course_id,
                    &m.semester,
                    &m.created_at,
                    i as i64,
                ))
                .with_context(|| format!("failed to save mapping {}", m.id))?;
        }
    }
    tx.commit()?;
    Ok(())
}
