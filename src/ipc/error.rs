use crate::mapping::MappingError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn mapping_err(id: &str, e: &MappingError) -> serde_json::Value {
    let details = match e {
        MappingError::TeacherNotFound(t) => Some(json!({ "teacherId": t })),
        MappingError::CourseNotFound(c) => Some(json!({ "courseId": c })),
        MappingError::MappingNotFound(m) => Some(json!({ "mappingId": m })),
        MappingError::DuplicateMapping { existing_id, .. } => {
            Some(json!({ "existingMappingId": existing_id }))
        }
        MappingError::EmptySemester | MappingError::SemesterTooLong => None,
    };
    err(id, e.code(), e.to_string(), details)
}
