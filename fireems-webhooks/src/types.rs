//! Common identifier types.
//!
//! - [`DepartmentId`]: tenant (department) identifier, the primary key of a webhook configuration
//! - [`ResourceId`]: identifier of the business resource an event refers to

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Department (tenant) identifier.
pub type DepartmentId = i64;

/// Identifier of the resource an event is about.
///
/// Most FireEMS resources use integer keys, but some (e.g. imported records) carry
/// string identifiers. Serializes as a bare JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Int(id) => write!(f, "{id}"),
            ResourceId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        ResourceId::Int(id)
    }
}

impl From<i32> for ResourceId {
    fn from(id: i32) -> Self {
        ResourceId::Int(id.into())
    }
}

impl From<u32> for ResourceId {
    fn from(id: u32) -> Self {
        ResourceId::Int(id.into())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        ResourceId::Text(id)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        ResourceId::Text(id.to_string())
    }
}

impl From<Uuid> for ResourceId {
    fn from(id: Uuid) -> Self {
        ResourceId::Text(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_serializes_bare() {
        assert_eq!(serde_json::to_string(&ResourceId::from(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&ResourceId::from("abc-1")).unwrap(), r#""abc-1""#);
    }

    #[test]
    fn test_resource_id_deserializes_either_form() {
        let int: ResourceId = serde_json::from_str("7").unwrap();
        let text: ResourceId = serde_json::from_str(r#""7""#).unwrap();
        assert_eq!(int, ResourceId::Int(7));
        assert_eq!(text, ResourceId::Text("7".to_string()));
    }
}
