use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{self, param_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = param_str(req, "path").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let conn = match db::open_db(&path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "workspace open failed");
            return err(&req.id, "db_open_failed", format!("{e:?}"), None);
        }
    };
    let store = match helpers::load_store(&conn) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "workspace load failed");
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    };

    tracing::info!(
        path = %path.display(),
        teachers = store.teachers().len(),
        courses = store.courses().len(),
        mappings = store.mappings().len(),
        "workspace selected"
    );
    let counts = json!({
        "teachers": store.teachers().len(),
        "courses": store.courses().len(),
        "mappings": store.mappings().len(),
    });
    state.store = store;
    state.db = Some(conn);
    state.workspace = Some(path.clone());
    ok(
        &req.id,
        json!({ "workspacePath": path.to_string_lossy(), "counts": counts }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
