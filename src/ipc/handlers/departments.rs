use crate::ipc::error::{err, ok};
use crate::ipc::helpers::param_str;
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_departments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "departments": [] }));
    };

    // Counts let the UI show which departments are safe to delete.
    let mut stmt = match conn.prepare(
        "SELECT
           d.id,
           d.code,
           d.name,
           (SELECT COUNT(*) FROM teachers t WHERE t.department_code = d.code) AS teacher_count,
           (SELECT COUNT(*) FROM courses c WHERE c.department_code = d.code) AS course_count
         FROM departments d
         ORDER BY d.code",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let code: String = row.get(1)?;
            let name: String = row.get(2)?;
            let teacher_count: i64 = row.get(3)?;
            let course_count: i64 = row.get(4)?;
            Ok(json!({
                "id": id,
                "code": code,
                "name": name,
                "teacherCount": teacher_count,
                "courseCount": course_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(departments) => ok(&req.id, json!({ "departments": departments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_departments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(code) = param_str(req, "code").map(|s| s.to_ascii_uppercase()) else {
        return err(&req.id, "bad_params", "missing code", None);
    };
    if code.len() > 10 {
        return err(&req.id, "bad_params", "code length must be <= 10", None);
    }
    let Some(name) = param_str(req, "name").map(str::to_string) else {
        return err(&req.id, "bad_params", "missing name", None);
    };

    let taken: Option<i64> = match conn
        .query_row("SELECT 1 FROM departments WHERE code = ?", [&code], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if taken.is_some() {
        return err(
            &req.id,
            "conflict",
            format!("department code already exists: {}", code),
            None,
        );
    }

    let department_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO departments(id, code, name) VALUES(?, ?, ?)",
        (&department_id, &code, &name),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "departments" })),
        );
    }

    tracing::info!(department_id = %department_id, code = %code, "department created");
    ok(
        &req.id,
        json!({ "departmentId": department_id, "code": code, "name": name }),
    )
}

fn handle_departments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(department_id) = param_str(req, "departmentId") else {
        return err(&req.id, "bad_params", "missing departmentId", None);
    };

    let code: Option<String> = match conn
        .query_row(
            "SELECT code FROM departments WHERE id = ?",
            [department_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(code) = code else {
        return err(&req.id, "not_found", "department not found", None);
    };

    let refs: Result<(i64, i64), rusqlite::Error> = conn.query_row(
        "SELECT
           (SELECT COUNT(*) FROM teachers WHERE department_code = ?1),
           (SELECT COUNT(*) FROM courses WHERE department_code = ?1)",
        [&code],
        |r| Ok((r.get(0)?, r.get(1)?)),
    );
    let (teachers, courses) = match refs {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if teachers > 0 || courses > 0 {
        return err(
            &req.id,
            "in_use",
            "department still has teachers or courses",
            Some(json!({ "teacherCount": teachers, "courseCount": courses })),
        );
    }

    if let Err(e) = conn.execute("DELETE FROM departments WHERE id = ?", [department_id]) {
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "departments" })),
        );
    }

    tracing::info!(department_id = %department_id, code = %code, "department deleted");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "departments.list" => Some(handle_departments_list(state, req)),
        "departments.create" => Some(handle_departments_create(state, req)),
        "departments.delete" => Some(handle_departments_delete(state, req)),
        _ => None,
    }
}
