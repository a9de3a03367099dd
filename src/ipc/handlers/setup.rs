use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::mapping::{DuplicatePolicy, SEMESTER_MAX_LEN};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Mappings,
    Board,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "mappings" => Some(Self::Mappings),
            "board" => Some(Self::Board),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Mappings => "setup.mappings",
            Self::Board => "setup.board",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Mappings => json!({
            "duplicatePolicy": "allow",
            "defaultSemester": "Fall 2024"
        }),
        SetupSection::Board => json!({
            "defaultDepartment": "all",
            "showEmptyCourses": true
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingsConfig {
    pub duplicate_policy: DuplicatePolicy,
    pub default_semester: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// `None` means every department.
    pub default_department: Option<String>,
    pub show_empty_courses: bool,
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Mappings => match k.as_str() {
                "duplicatePolicy" => {
                    let s = parse_string_max(v, k, 16)?;
                    let Some(policy) = DuplicatePolicy::parse(&s) else {
                        return Err("duplicatePolicy must be one of: allow, reject".into());
                    };
                    obj.insert(k.clone(), Value::String(policy.as_str().to_string()));
                }
                "defaultSemester" => {
                    let s = parse_string_max(v, k, SEMESTER_MAX_LEN)?;
                    if s.is_empty() {
                        return Err("defaultSemester must not be empty".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown mappings field: {}", k)),
            },
            SetupSection::Board => match k.as_str() {
                "defaultDepartment" => {
                    let s = parse_string_max(v, k, 10)?;
                    let s = if s.is_empty() || s.eq_ignore_ascii_case("all") {
                        "all".to_string()
                    } else {
                        s.to_ascii_uppercase()
                    };
                    obj.insert(k.clone(), Value::String(s));
                }
                "showEmptyCourses" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown board field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut one = Map::new();
                one.insert(k.clone(), v.clone());
                let _ = merge_section_patch(section, &mut current, &one);
            }
        }
    }
    Ok(current)
}

pub fn load_mappings_config(conn: &rusqlite::Connection) -> anyhow::Result<MappingsConfig> {
    let v = load_section(conn, SetupSection::Mappings)?;
    let duplicate_policy = v
        .get("duplicatePolicy")
        .and_then(|p| p.as_str())
        .and_then(DuplicatePolicy::parse)
        .unwrap_or_default();
    let default_semester = v
        .get("defaultSemester")
        .and_then(|s| s.as_str())
        .unwrap_or("Fall 2024")
        .to_string();
    Ok(MappingsConfig {
        duplicate_policy,
        default_semester,
    })
}

pub fn load_board_config(conn: &rusqlite::Connection) -> anyhow::Result<BoardConfig> {
    let v = load_section(conn, SetupSection::Board)?;
    let default_department = v
        .get("defaultDepartment")
        .and_then(|d| d.as_str())
        .filter(|d| *d != "all")
        .map(str::to_string);
    let show_empty_courses = v
        .get("showEmptyCourses")
        .and_then(|b| b.as_bool())
        .unwrap_or(true);
    Ok(BoardConfig {
        default_department,
        show_empty_courses,
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mappings = match load_section(conn, SetupSection::Mappings) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let board = match load_section(conn, SetupSection::Board) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(&req.id, json!({ "mappings": mappings, "board": board }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        tracing::debug!(section = section_raw, error = %msg, "setup patch rejected");
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    if let SetupSection::Mappings = section {
        match load_mappings_config(conn) {
            Ok(cfg) => state.store.set_policy(cfg.duplicate_policy),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    tracing::info!(section = section_raw, "setup updated");
    ok(&req.id, json!({ "ok": true, "section": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
