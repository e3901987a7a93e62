//! HTTP handlers for entity CRUD and project relations.

pub mod entity;
pub mod membership;
