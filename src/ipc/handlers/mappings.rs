use crate::db;
use crate::ipc::error::{err, mapping_err, ok};
use crate::ipc::helpers::param_str;
use crate::ipc::types::{AppState, Request};
use crate::mapping::{DepartmentFilter, Mapping, MappingStore};
use serde_json::json;

use super::setup;

fn mapping_json(store: &MappingStore, m: &Mapping) -> serde_json::Value {
    let teacher = store.teacher_by_id(&m.teacher_id);
    let course = store.course_by_id(&m.course_id);
    json!({
        "id": m.id,
        "teacherId": m.teacher_id,
        "courseId": m.course_id,
        "semester": m.semester,
        "createdAt": m.created_at,
        "teacherName": teacher.map(|t| t.name.as_str()),
        "courseCode": course.map(|c| c.code.as_str()),
        "courseName": course.map(|c| c.name.as_str()),
    })
}

fn status_json(store: &MappingStore) -> serde_json::Value {
    json!({
        "dirty": store.is_dirty(),
        "mappingCount": store.mappings().len(),
        "duplicatePolicy": store.policy().as_str(),
    })
}

fn handle_mappings_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(teacher_id) = param_str(req, "teacherId") else {
        return err(&req.id, "bad_params", "missing teacherId", None);
    };
    let Some(course_id) = param_str(req, "courseId") else {
        return err(&req.id, "bad_params", "missing courseId", None);
    };
    let semester = match param_str(req, "semester") {
        Some(s) => s.to_string(),
        None => match setup::load_mappings_config(conn) {
            Ok(cfg) => cfg.default_semester,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
    };

    match state.store.add_mapping(teacher_id, course_id, &semester) {
        Ok(m) => {
            tracing::info!(
                mapping_id = %m.id,
                teacher_id = %m.teacher_id,
                course_id = %m.course_id,
                semester = %m.semester,
                "mapping added"
            );
            ok(
                &req.id,
                json!({
                    "mapping": mapping_json(&state.store, &m),
                    "dirty": state.store.is_dirty(),
                }),
            )
        }
        Err(e) => {
            tracing::debug!(teacher_id = %teacher_id, course_id = %course_id, error = %e, "mapping add rejected");
            mapping_err(&req.id, &e)
        }
    }
}

fn handle_mappings_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let Some(mapping_id) = param_str(req, "mappingId") else {
        return err(&req.id, "bad_params", "missing mappingId", None);
    };
    match state.store.remove_mapping(mapping_id) {
        Ok(m) => {
            tracing::info!(mapping_id = %m.id, "mapping removed");
            ok(
                &req.id,
                json!({ "mappingId": m.id, "dirty": state.store.is_dirty() }),
            )
        }
        Err(e) => {
            tracing::debug!(mapping_id = %mapping_id, error = %e, "mapping remove rejected");
            mapping_err(&req.id, &e)
        }
    }
}

fn handle_mappings_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let store = &state.store;
    let mappings: Vec<_> = store
        .mappings()
        .iter()
        .map(|m| mapping_json(store, m))
        .collect();
    ok(
        &req.id,
        json!({ "mappings": mappings, "dirty": store.is_dirty() }),
    )
}

fn handle_mappings_for_course(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let Some(course_id) = param_str(req, "courseId") else {
        return err(&req.id, "bad_params", "missing courseId", None);
    };
    let store = &state.store;
    let mappings: Vec<_> = store
        .mappings_for_course(course_id)
        .into_iter()
        .map(|m| mapping_json(store, m))
        .collect();
    ok(
        &req.id,
        json!({
            "course": store.course_by_id(course_id),
            "mappings": mappings,
        }),
    )
}

fn handle_mappings_for_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let Some(teacher_id) = param_str(req, "teacherId") else {
        return err(&req.id, "bad_params", "missing teacherId", None);
    };
    let store = &state.store;
    let mappings: Vec<_> = store
        .mappings_for_teacher(teacher_id)
        .into_iter()
        .map(|m| mapping_json(store, m))
        .collect();
    ok(
        &req.id,
        json!({
            "teacher": store.teacher_by_id(teacher_id),
            "mappings": mappings,
        }),
    )
}

fn handle_mappings_board(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let board_cfg = match setup::load_board_config(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let department = param_str(req, "department")
        .or(board_cfg.default_department.as_deref());
    let filter = DepartmentFilter::parse(department);
    let store = &state.store;
    let counts = store.assignment_counts();

    let teachers = store.teachers_in_department(filter);
    let courses: Vec<_> = store
        .courses_in_department(filter)
        .into_iter()
        .filter(|c| board_cfg.show_empty_courses || counts.contains_key(&c.id))
        .map(|c| {
            json!({
                "course": c,
                "assignedTeachers": store.assigned_teachers(&c.id),
                "mappingCount": counts.get(&c.id).copied().unwrap_or(0),
            })
        })
        .collect();

    let department_label = match filter {
        DepartmentFilter::All => "all",
        DepartmentFilter::Code(code) => code,
    };
    ok(
        &req.id,
        json!({
            "department": department_label,
            "teachers": teachers,
            "courses": courses,
            "summary": store.summary(),
            "status": status_json(store),
        }),
    )
}

fn handle_mappings_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = db::save_mappings(conn, state.store.mappings()) {
        tracing::warn!(error = %e, "mapping save failed");
        return err(&req.id, "db_update_failed", format!("{e:#}"), None);
    }
    state.store.mark_saved();
    tracing::info!(mappings = state.store.mappings().len(), "mappings saved");
    ok(&req.id, json!({ "saved": state.store.mappings().len() }))
}

fn handle_mappings_revert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let saved = match db::load_mappings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let discarded = state.store.is_dirty();
    state.store.replace_mappings(saved);
    tracing::info!(discarded, mappings = state.store.mappings().len(), "mappings reverted");
    ok(
        &req.id,
        json!({ "discardedChanges": discarded, "status": status_json(&state.store) }),
    )
}

fn handle_mappings_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    ok(&req.id, status_json(&state.store))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "mappings.add" => Some(handle_mappings_add(state, req)),
        "mappings.remove" => Some(handle_mappings_remove(state, req)),
        "mappings.list" => Some(handle_mappings_list(state, req)),
        "mappings.forCourse" => Some(handle_mappings_for_course(state, req)),
        "mappings.forTeacher" => Some(handle_mappings_for_teacher(state, req)),
        "mappings.board" => Some(handle_mappings_board(state, req)),
        "mappings.save" => Some(handle_mappings_save(state, req)),
        "mappings.revert" => Some(handle_mappings_revert(state, req)),
        "mappings.status" => Some(handle_mappings_status(state, req)),
        _ => None,
    }
}
