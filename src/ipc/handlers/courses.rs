use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{self, now_rfc3339, param_str};
use crate::ipc::types::{AppState, Request};
use crate::mapping::DepartmentFilter;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter = DepartmentFilter::parse(param_str(req, "department"));
    let counts = state.store.assignment_counts();
    let courses: Vec<serde_json::Value> = state
        .store
        .courses_in_department(filter)
        .into_iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "code": c.code,
                "department": c.department,
                "mappingCount": counts.get(&c.id).copied().unwrap_or(0),
            })
        })
        .collect();
    ok(&req.id, json!({ "courses": courses }))
}

fn code_owner(conn: &Connection, code: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT id FROM courses WHERE code = ?", [code], |r| {
        r.get(0)
    })
    .optional()
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(name) = param_str(req, "name").map(str::to_string) else {
        return err(&req.id, "bad_params", "missing name", None);
    };
    let Some(code) = param_str(req, "code").map(|s| s.to_ascii_uppercase()) else {
        return err(&req.id, "bad_params", "missing code", None);
    };
    let Some(department) = param_str(req, "department").map(|s| s.to_ascii_uppercase()) else {
        return err(&req.id, "bad_params", "missing department", None);
    };

    match db::department_exists(conn, &department) {
        Ok(true) => {}
        Ok(false) => {
            return err(
                &req.id,
                "bad_params",
                format!("unknown department: {}", department),
                None,
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    match code_owner(conn, &code) {
        Ok(None) => {}
        Ok(Some(_)) => {
            return err(
                &req.id,
                "conflict",
                format!("course code already exists: {}", code),
                None,
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let course_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO courses(id, name, code, department_code, updated_at) VALUES(?, ?, ?, ?, ?)",
        (&course_id, &name, &code, &department, now_rfc3339()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }
    if let Err(e) = helpers::refresh_roster(state) {
        return err(&req.id, "db_query_failed", e.to_string(), None);
    }

    tracing::info!(course_id = %course_id, code = %code, "course created");
    ok(&req.id, json!({ "courseId": course_id }))
}

fn handle_courses_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(course_id) = param_str(req, "courseId") else {
        return err(&req.id, "bad_params", "missing courseId", None);
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "course not found", None);
    }

    let mut name: Option<String> = None;
    let mut code: Option<String> = None;
    let mut department: Option<String> = None;
    for (k, v) in patch {
        let Some(s) = v.as_str().map(str::trim) else {
            return err(&req.id, "bad_params", format!("{} must be string", k), None);
        };
        if s.is_empty() {
            return err(&req.id, "bad_params", format!("{} must not be empty", k), None);
        }
        match k.as_str() {
            "name" => name = Some(s.to_string()),
            "code" => {
                let c = s.to_ascii_uppercase();
                match code_owner(conn, &c) {
                    Ok(Some(owner)) if owner != course_id => {
                        return err(
                            &req.id,
                            "conflict",
                            format!("course code already exists: {}", c),
                            None,
                        )
                    }
                    Ok(_) => {}
                    Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
                }
                code = Some(c);
            }
            "department" => {
                let d = s.to_ascii_uppercase();
                match db::department_exists(conn, &d) {
                    Ok(true) => {}
                    Ok(false) => {
                        return err(
                            &req.id,
                            "bad_params",
                            format!("unknown department: {}", d),
                            None,
                        )
                    }
                    Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
                }
                department = Some(d);
            }
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown course field: {}", k),
                    None,
                )
            }
        }
    }

    if let Err(e) = conn.execute(
        "UPDATE courses SET
           name = COALESCE(?, name),
           code = COALESCE(?, code),
           department_code = COALESCE(?, department_code),
           updated_at = ?
         WHERE id = ?",
        (&name, &code, &department, now_rfc3339(), course_id),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = helpers::refresh_roster(state) {
        return err(&req.id, "db_query_failed", e.to_string(), None);
    }

    tracing::info!(course_id = %course_id, "course updated");
    ok(&req.id, json!({ "ok": true }))
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(course_id) = param_str(req, "courseId") else {
        return err(&req.id, "bad_params", "missing courseId", None);
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute("DELETE FROM mappings WHERE course_id = ?", [course_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "mappings" })),
        );
    }
    let deleted = match tx.execute("DELETE FROM courses WHERE id = ?", [course_id]) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "courses" })),
            );
        }
    };
    if deleted == 0 {
        let _ = tx.rollback();
        return err(&req.id, "not_found", "course not found", None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_tx_failed", e.to_string(), None);
    }

    let removed = state.store.purge_course(course_id);
    if let Err(e) = helpers::refresh_roster(state) {
        return err(&req.id, "db_query_failed", e.to_string(), None);
    }

    tracing::info!(course_id = %course_id, removed_mappings = removed, "course deleted");
    ok(&req.id, json!({ "removedMappings": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.update" => Some(handle_courses_update(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        _ => None,
    }
}
