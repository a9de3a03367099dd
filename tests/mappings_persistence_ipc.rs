mod test_support;

use serde_json::json;
use test_support::{array_field, request_ok, seed_roster, spawn_sidecar, str_field, temp_dir};

#[test]
fn saved_mappings_survive_restart_and_unsaved_do_not() {
    let workspace = temp_dir("unimap-persist-restart");

    let (roster, saved_id) = {
        let mut sc = spawn_sidecar();
        request_ok(&mut sc, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
        let r = seed_roster(&mut sc);
        let added = request_ok(
            &mut sc,
            "2",
            "mappings.add",
            json!({ "teacherId": r.cs_teacher, "courseId": r.cs101, "semester": "Fall 2024" }),
        );
        let saved_id = str_field(added.get("mapping").expect("mapping"), "id");
        let saved = request_ok(&mut sc, "3", "mappings.save", json!({}));
        assert_eq!(saved.get("saved").and_then(|v| v.as_i64()), Some(1));

        // Not saved; must be gone after restart.
        request_ok(
            &mut sc,
            "4",
            "mappings.add",
            json!({ "teacherId": r.math_teacher, "courseId": r.math201 }),
        );
        let status = request_ok(&mut sc, "5", "mappings.status", json!({}));
        assert_eq!(status.get("dirty").and_then(|v| v.as_bool()), Some(true));
        (r, saved_id)
    };

    let mut sc = spawn_sidecar();
    let selected =
        request_ok(&mut sc, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    assert_eq!(
        selected
            .get("counts")
            .and_then(|c| c.get("mappings"))
            .and_then(|v| v.as_i64()),
        Some(1)
    );
    let listed = request_ok(&mut sc, "2", "mappings.list", json!({}));
    let mappings = array_field(&listed, "mappings");
    assert_eq!(mappings.len(), 1);
    assert_eq!(str_field(&mappings[0], "id"), saved_id);
    assert_eq!(str_field(&mappings[0], "teacherId"), roster.cs_teacher);
    assert_eq!(listed.get("dirty").and_then(|v| v.as_bool()), Some(false));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn revert_discards_unsaved_changes() {
    let workspace = temp_dir("unimap-persist-revert");
    let mut sc = spawn_sidecar();
    request_ok(&mut sc, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    let r = seed_roster(&mut sc);

    let kept = request_ok(
        &mut sc,
        "2",
        "mappings.add",
        json!({ "teacherId": r.cs_teacher_2, "courseId": r.cs301 }),
    );
    let kept_id = str_field(kept.get("mapping").expect("mapping"), "id");
    request_ok(&mut sc, "3", "mappings.save", json!({}));

    request_ok(&mut sc, "4", "mappings.remove", json!({ "mappingId": kept_id }));
    request_ok(
        &mut sc,
        "5",
        "mappings.add",
        json!({ "teacherId": r.cs_teacher, "courseId": r.cs101 }),
    );

    let reverted = request_ok(&mut sc, "6", "mappings.revert", json!({}));
    assert_eq!(reverted.get("discardedChanges").and_then(|v| v.as_bool()), Some(true));

    let listed = request_ok(&mut sc, "7", "mappings.list", json!({}));
    let ids: Vec<String> = array_field(&listed, "mappings")
        .iter()
        .map(|m| str_field(m, "id"))
        .collect();
    assert_eq!(ids, vec![kept_id]);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn saved_order_is_preserved() {
    let workspace = temp_dir("unimap-persist-order");
    let expected: Vec<String> = {
        let mut sc = spawn_sidecar();
        request_ok(&mut sc, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
        let r = seed_roster(&mut sc);
        let mut ids = Vec::new();
        for (i, t) in [&r.math_teacher, &r.cs_teacher, &r.cs_teacher_2].iter().enumerate() {
            let added = request_ok(
                &mut sc,
                &format!("a{}", i),
                "mappings.add",
                json!({ "teacherId": t, "courseId": r.cs101 }),
            );
            ids.push(str_field(added.get("mapping").expect("mapping"), "id"));
        }
        request_ok(&mut sc, "s", "mappings.save", json!({}));
        ids
    };

    let mut sc = spawn_sidecar();
    request_ok(&mut sc, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    let listed = request_ok(&mut sc, "2", "mappings.list", json!({}));
    let got: Vec<String> = array_field(&listed, "mappings")
        .iter()
        .map(|m| str_field(m, "id"))
        .collect();
    assert_eq!(got, expected);

    let _ = std::fs::remove_dir_all(workspace);
}
