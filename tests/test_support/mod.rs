#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_unimapd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn unimapd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
    }
}

pub fn send_line(sc: &mut Sidecar, line: &str) -> serde_json::Value {
    writeln!(sc.stdin, "{}", line).expect("write request");
    sc.stdin.flush().expect("flush request");

    let mut out = String::new();
    sc.reader.read_line(&mut out).expect("read response line");
    assert!(!out.trim().is_empty(), "empty response for {}", line);
    serde_json::from_str(out.trim()).expect("parse response json")
}

pub fn request(
    sc: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    let value = send_line(sc, &payload.to_string());
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    sc: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(sc, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Expects a failure and returns its error code.
pub fn request_err(
    sc: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(sc, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

pub fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key)
        .and_then(|x| x.as_str())
        .unwrap_or_else(|| panic!("missing string field {} in {}", key, v))
        .to_string()
}

pub fn array_field(v: &serde_json::Value, key: &str) -> Vec<serde_json::Value> {
    v.get(key)
        .and_then(|x| x.as_array())
        .cloned()
        .unwrap_or_else(|| panic!("missing array field {} in {}", key, v))
}

pub struct Roster {
    pub cs_teacher: String,
    pub cs_teacher_2: String,
    pub math_teacher: String,
    pub cs101: String,
    pub cs301: String,
    pub math201: String,
}

/// Two departments, three teachers and three courses.
pub fn seed_roster(sc: &mut Sidecar) -> Roster {
    request_ok(sc, "seed-d1", "departments.create", json!({ "code": "cs", "name": "Computer Science" }));
    request_ok(sc, "seed-d2", "departments.create", json!({ "code": "MATH", "name": "Mathematics" }));

    let mut teacher = |id: &str, name: &str, dept: &str| {
        let r = request_ok(
            sc,
            id,
            "teachers.create",
            json!({ "name": name, "department": dept, "designation": "Professor" }),
        );
        str_field(&r, "teacherId")
    };
    let cs_teacher = teacher("seed-t1", "Ada Smith", "CS");
    let cs_teacher_2 = teacher("seed-t2", "Cy Williams", "cs");
    let math_teacher = teacher("seed-t3", "Bo Johnson", "MATH");

    let mut course = |id: &str, name: &str, code: &str, dept: &str| {
        let r = request_ok(
            sc,
            id,
            "courses.create",
            json!({ "name": name, "code": code, "department": dept }),
        );
        str_field(&r, "courseId")
    };
    let cs101 = course("seed-c1", "Computer Science Fundamentals", "CS101", "CS");
    let cs301 = course("seed-c2", "Database Systems", "CS301", "CS");
    let math201 = course("seed-c3", "Mathematics for Engineers", "MATH201", "MATH");

    Roster {
        cs_teacher,
        cs_teacher_2,
        math_teacher,
        cs101,
        cs301,
        math201,
    }
}
