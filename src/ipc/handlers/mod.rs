pub mod core;
pub mod courses;
pub mod departments;
pub mod mappings;
pub mod setup;
pub mod teachers;
