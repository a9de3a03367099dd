//! In-memory teacher/course assignment store.
//!
//! Holds the roster (teachers and courses) supplied by the registry and the
//! session's mapping records. All queries see mutations immediately; nothing
//! here touches the workspace database.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Longest accepted semester label, in bytes.
pub const SEMESTER_MAX_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub department: String,
    #[serde(default)]
    pub designation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub code: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub id: String,
    pub teacher_id: String,
    pub course_id: String,
    pub semester: String,
    pub created_at: String,
}

/// One line of the assignments summary table, with both references resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub mapping_id: String,
    pub semester: String,
    pub teacher_id: String,
    pub teacher_name: String,
    pub course_id: String,
    pub course_name: String,
    pub course_code: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("teacher not found: {0}")]
    TeacherNotFound(String),
    #[error("course not found: {0}")]
    CourseNotFound(String),
    #[error("mapping not found: {0}")]
    MappingNotFound(String),
    #[error("teacher {teacher_id} is already assigned to course {course_id} for {semester}")]
    DuplicateMapping {
        teacher_id: String,
        course_id: String,
        semester: String,
        existing_id: String,
    },
    #[error("semester must not be empty")]
    EmptySemester,
    #[error("semester length must be <= {}", SEMESTER_MAX_LEN)]
    SemesterTooLong,
}

impl MappingError {
    /// Stable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TeacherNotFound(_) => "teacher_not_found",
            Self::CourseNotFound(_) => "course_not_found",
            Self::MappingNotFound(_) => "mapping_not_found",
            Self::DuplicateMapping { .. } => "duplicate_mapping",
            Self::EmptySemester | Self::SemesterTooLong => "bad_params",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Allow,
    Reject,
}

impl DuplicatePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartmentFilter<'a> {
    All,
    Code(&'a str),
}

impl<'a> DepartmentFilter<'a> {
    /// `None`, empty and `"all"` select every department.
    pub fn parse(raw: Option<&'a str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::All,
            Some(s) if s.eq_ignore_ascii_case("all") => Self::All,
            Some(s) => Self::Code(s),
        }
    }

    pub fn matches(&self, department: &str) -> bool {
        match self {
            Self::All => true,
            Self::Code(code) => department.eq_ignore_ascii_case(code),
        }
    }
}

#[derive(Debug, Default)]
pub struct MappingStore {
    teachers: Vec<Teacher>,
    courses: Vec<Course>,
    mappings: Vec<Mapping>,
    policy: DuplicatePolicy,
    /// Ids of the last saved snapshot, in order.
    saved_ids: Vec<String>,
}

impl MappingStore {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: DuplicatePolicy) {
        self.policy = policy;
    }

    pub fn set_teachers(&mut self, teachers: Vec<Teacher>) {
        self.teachers = teachers;
    }

    pub fn set_courses(&mut self, courses: Vec<Course>) {
        self.courses = courses;
    }

    /// Replaces the mapping set with a previously saved one. Leaves the store clean.
    pub fn replace_mappings(&mut self, mappings: Vec<Mapping>) {
        self.saved_ids = mappings.iter().map(|m| m.id.clone()).collect();
        self.mappings = mappings;
    }

    pub fn teachers(&self) -> &[Teacher] {
        &self.teachers
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// True when the mapping set differs from the last saved snapshot.
    /// Mappings are immutable, so comparing ids in order is enough.
    pub fn is_dirty(&self) -> bool {
        self.mappings.len() != self.saved_ids.len()
            || self
                .mappings
                .iter()
                .zip(&self.saved_ids)
                .any(|(m, id)| m.id != *id)
    }

    pub fn mark_saved(&mut self) {
        self.saved_ids = self.mappings.iter().map(|m| m.id.clone()).collect();
    }

    pub fn teacher_by_id(&self, id: &str) -> Option<&Teacher> {
        self.teachers.iter().find(|t| t.id == id)
    }

    pub fn course_by_id(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    pub fn add_mapping(
        &mut self,
        teacher_id: &str,
        course_id: &str,
        semester: &str,
    ) -> Result<Mapping, MappingError> {
        let semester = semester.trim();
        if semester.is_empty() {
            return Err(MappingError::EmptySemester);
        }
        if semester.len() > SEMESTER_MAX_LEN {
            return Err(MappingError::SemesterTooLong);
        }
        if self.teacher_by_id(teacher_id).is_none() {
            return Err(MappingError::TeacherNotFound(teacher_id.to_string()));
        }
        if self.course_by_id(course_id).is_none() {
            return Err(MappingError::CourseNotFound(course_id.to_string()));
        }
        if self.policy == DuplicatePolicy::Reject {
            if let Some(existing) = self.mappings.iter().find(|m| {
                m.teacher_id == teacher_id && m.course_id == course_id && m.semester == semester
            }) {
                return Err(MappingError::DuplicateMapping {
                    teacher_id: teacher_id.to_string(),
                    course_id: course_id.to_string(),
                    semester: semester.to_string(),
                    existing_id: existing.id.clone(),
                });
            }
        }

        let mapping = Mapping {
            id: Uuid::new_v4().to_string(),
            teacher_id: teacher_id.to_string(),
            course_id: course_id.to_string(),
            semester: semester.to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        self.mappings.push(mapping.clone());
        Ok(mapping)
    }

    pub fn remove_mapping(&mut self, mapping_id: &str) -> Result<Mapping, MappingError> {
        let Some(idx) = self.mappings.iter().position(|m| m.id == mapping_id) else {
            return Err(MappingError::MappingNotFound(mapping_id.to_string()));
        };
        Ok(self.mappings.remove(idx))
    }

    pub fn mappings_for_course(&self, course_id: &str) -> Vec<&Mapping> {
        self.mappings
            .iter()
            .filter(|m| m.course_id == course_id)
            .collect()
    }

    pub fn mappings_for_teacher(&self, teacher_id: &str) -> Vec<&Mapping> {
        self.mappings
            .iter()
            .filter(|m| m.teacher_id == teacher_id)
            .collect()
    }

    pub fn teachers_in_department(&self, filter: DepartmentFilter<'_>) -> Vec<&Teacher> {
        self.teachers
            .iter()
            .filter(|t| filter.matches(&t.department))
            .collect()
    }

    pub fn courses_in_department(&self, filter: DepartmentFilter<'_>) -> Vec<&Course> {
        self.courses
            .iter()
            .filter(|c| filter.matches(&c.department))
            .collect()
    }

    /// Teachers assigned to a course, in mapping order. Dangling references are skipped.
    pub fn assigned_teachers(&self, course_id: &str) -> Vec<&Teacher> {
        self.mappings_for_course(course_id)
            .into_iter()
            .filter_map(|m| self.teacher_by_id(&m.teacher_id))
            .collect()
    }

    pub fn assignment_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for m in &self.mappings {
            *counts.entry(m.course_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> Vec<SummaryRow> {
        self.mappings
            .iter()
            .filter_map(|m| {
                let teacher = self.teacher_by_id(&m.teacher_id)?;
                let course = self.course_by_id(&m.course_id)?;
                Some(SummaryRow {
                    mapping_id: m.id.clone(),
                    semester: m.semester.clone(),
                    teacher_id: teacher.id.clone(),
                    teacher_name: teacher.name.clone(),
                    course_id: course.id.clone(),
                    course_name: course.name.clone(),
                    course_code: course.code.clone(),
                    department: course.department.clone(),
                })
            })
            .collect()
    }

    /// Drops every mapping that references the teacher. Returns how many went.
    pub fn purge_teacher(&mut self, teacher_id: &str) -> usize {
        self.retain_mappings(|m| m.teacher_id != teacher_id)
    }

    pub fn purge_course(&mut self, course_id: &str) -> usize {
        self.retain_mappings(|m| m.course_id != course_id)
    }

    /// Purges drop the mappings from the saved snapshot as well, since the
    /// workspace delete cascades to the stored rows.
    fn retain_mappings(&mut self, keep: impl Fn(&Mapping) -> bool) -> usize {
        let (kept, dropped): (Vec<Mapping>, Vec<Mapping>) =
            self.mappings.drain(..).partition(|m| keep(m));
        self.mappings = kept;
        self.saved_ids
            .retain(|id| !dropped.iter().any(|m| &m.id == id));
        dropped.len()
    }
}
