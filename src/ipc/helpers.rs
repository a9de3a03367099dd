use crate::db;
use crate::ipc::handlers::setup;
use crate::ipc::types::{AppState, Request};
use crate::mapping::MappingStore;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;

/// Trimmed, non-empty string parameter.
pub fn param_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Builds a clean store from what the workspace has saved.
pub fn load_store(conn: &Connection) -> anyhow::Result<MappingStore> {
    let cfg = setup::load_mappings_config(conn)?;
    let mut store = MappingStore::new(cfg.duplicate_policy);
    store.set_teachers(db::load_teachers(conn)?);
    store.set_courses(db::load_courses(conn)?);
    store.replace_mappings(db::load_mappings(conn)?);
    Ok(store)
}

/// Pushes the registry's current teachers and courses into the store.
pub fn refresh_roster(state: &mut AppState) -> anyhow::Result<()> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(());
    };
    let teachers = db::load_teachers(conn)?;
    let courses = db::load_courses(conn)?;
    state.store.set_teachers(teachers);
    state.store.set_courses(courses);
    Ok(())
}
