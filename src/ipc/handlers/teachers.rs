use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{self, now_rfc3339, param_str};
use crate::ipc::types::{AppState, Request};
use crate::mapping::DepartmentFilter;
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter = DepartmentFilter::parse(param_str(req, "department"));
    let store = &state.store;
    let teachers: Vec<serde_json::Value> = store
        .teachers_in_department(filter)
        .into_iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "department": t.department,
                "designation": t.designation,
                "mappingCount": store.mappings_for_teacher(&t.id).len(),
            })
        })
        .collect();
    ok(&req.id, json!({ "teachers": teachers }))
}

fn check_department(
    conn: &rusqlite::Connection,
    req: &Request,
    code: &str,
) -> Result<(), serde_json::Value> {
    match db::department_exists(conn, code) {
        Ok(true) => Ok(()),
        Ok(false) => Err(err(
            &req.id,
            "bad_params",
            format!("unknown department: {}", code),
            None,
        )),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(name) = param_str(req, "name").map(str::to_string) else {
        return err(&req.id, "bad_params", "missing name", None);
    };
    let Some(department) = param_str(req, "department").map(|s| s.to_ascii_uppercase()) else {
        return err(&req.id, "bad_params", "missing department", None);
    };
    let designation = param_str(req, "designation").unwrap_or("").to_string();
    if let Err(resp) = check_department(conn, req, &department) {
        return resp;
    }

    let teacher_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO teachers(id, name, department_code, designation, updated_at)
         VALUES(?, ?, ?, ?, ?)",
        (&teacher_id, &name, &department, &designation, now_rfc3339()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "teachers" })),
        );
    }
    if let Err(e) = helpers::refresh_roster(state) {
        return err(&req.id, "db_query_failed", e.to_string(), None);
    }

    tracing::info!(teacher_id = %teacher_id, department = %department, "teacher created");
    ok(&req.id, json!({ "teacherId": teacher_id }))
}

fn handle_teachers_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(teacher_id) = param_str(req, "teacherId") else {
        return err(&req.id, "bad_params", "missing teacherId", None);
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM teachers WHERE id = ?", [teacher_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "teacher not found", None);
    }

    let mut name: Option<String> = None;
    let mut department: Option<String> = None;
    let mut designation: Option<String> = None;
    for (k, v) in patch {
        let Some(s) = v.as_str().map(str::trim) else {
            return err(&req.id, "bad_params", format!("{} must be string", k), None);
        };
        match k.as_str() {
            "name" if !s.is_empty() => name = Some(s.to_string()),
            "name" => return err(&req.id, "bad_params", "name must not be empty", None),
            "department" => {
                let code = s.to_ascii_uppercase();
                if let Err(resp) = check_department(conn, req, &code) {
                    return resp;
                }
                department = Some(code);
            }
            "designation" => designation = Some(s.to_string()),
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown teacher field: {}", k),
                    None,
                )
            }
        }
    }

    if let Err(e) = conn.execute(
        "UPDATE teachers SET
           name = COALESCE(?, name),
           department_code = COALESCE(?, department_code),
           designation = COALESCE(?, designation),
           updated_at = ?
         WHERE id = ?",
        (&name, &department, &designation, now_rfc3339(), teacher_id),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = helpers::refresh_roster(state) {
        return err(&req.id, "db_query_failed", e.to_string(), None);
    }

    tracing::info!(teacher_id = %teacher_id, "teacher updated");
    ok(&req.id, json!({ "ok": true }))
}

fn handle_teachers_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(teacher_id) = param_str(req, "teacherId") else {
        return err(&req.id, "bad_params", "missing teacherId", None);
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    // Saved mappings go with the teacher.
    if let Err(e) = tx.execute("DELETE FROM mappings WHERE teacher_id = ?", [teacher_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "mappings" })),
        );
    }
    let deleted = match tx.execute("DELETE FROM teachers WHERE id = ?", [teacher_id]) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "teachers" })),
            );
        }
    };
    if deleted == 0 {
        let _ = tx.rollback();
        return err(&req.id, "not_found", "teacher not found", None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_tx_failed", e.to_string(), None);
    }

    let removed = state.store.purge_teacher(teacher_id);
    if let Err(e) = helpers::refresh_roster(state) {
        return err(&req.id, "db_query_failed", e.to_string(), None);
    }

    tracing::info!(teacher_id = %teacher_id, removed_mappings = removed, "teacher deleted");
    ok(&req.id, json!({ "removedMappings": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        "teachers.update" => Some(handle_teachers_update(state, req)),
        "teachers.delete" => Some(handle_teachers_delete(state, req)),
        _ => None,
    }
}
