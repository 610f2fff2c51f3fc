use crate::error::AuthzError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const RELATION_GET: &str = "get";
pub const RELATION_CREATE: &str = "create";
pub const RELATION_UPDATE: &str = "update";
pub const RELATION_DELETE: &str = "delete";
pub const RELATION_GET_PERMISSIONS: &str = "get_permissions";
pub const RELATION_SET_PERMISSIONS: &str = "set_permissions";

/// Relation lookup tables, versioned together with the authorization model.
///
/// Built once at startup and shared read-only between requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationTable {
    /// Verb -> relation
    #[serde(default)]
    pub verbs: HashMap<String, String>,

    /// Resource relation -> relation checked on the containing folder
    #[serde(default)]
    pub folder_relations: HashMap<String, String>,

    /// Relations that can be granted on a whole group/resource
    #[serde(default)]
    pub group_resource_relations: HashSet<String>,

    /// Relations declared by generic (folder-scoped) resources
    #[serde(default)]
    pub generic_relations: HashSet<String>,

    /// Typed resources keyed by `group/resource`
    #[serde(default)]
    pub types: HashMap<String, TypeInfo>,
}

/// Resource kind with its own first-class relation set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub type_name: String,
    pub relations: HashSet<String>,
}

impl TypeInfo {
    pub fn new(type_name: &str, relations: &[&str]) -> Self {
        Self {
            type_name: type_name.to_string(),
            relations: to_set(relations),
        }
    }
}

impl RelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables matching the standard authorization model
    pub fn standard() -> Self {
        let basic = [RELATION_GET, RELATION_CREATE, RELATION_UPDATE, RELATION_DELETE];
        let all = [
            RELATION_GET,
            RELATION_CREATE,
            RELATION_UPDATE,
            RELATION_DELETE,
            RELATION_GET_PERMISSIONS,
            RELATION_SET_PERMISSIONS,
        ];

        let mut table = Self::new()
            .with_verb("get", RELATION_GET)
            .with_verb("list", RELATION_GET)
            .with_verb("watch", RELATION_GET)
            .with_verb("create", RELATION_CREATE)
            .with_verb("update", RELATION_UPDATE)
            .with_verb("patch", RELATION_UPDATE)
            .with_verb("delete", RELATION_DELETE)
            .with_verb("deletecollection", RELATION_DELETE)
            .with_verb("get_permissions", RELATION_GET_PERMISSIONS)
            .with_verb("set_permissions", RELATION_SET_PERMISSIONS)
            .with_group_resource_relations(&basic)
            .with_generic_relations(&all)
            .with_type("folder.grafana.app/folders", "folder", &all)
            .with_type("iam.grafana.app/teams", "team", &basic)
            .with_type("iam.grafana.app/users", "user", &basic)
            .with_type("iam.grafana.app/serviceaccounts", "service-account", &basic);

        for relation in all {
            table = table.with_folder_relation(relation, &format!("resource_{}", relation));
        }
        table
    }

    pub fn with_verb(mut self, verb: &str, relation: &str) -> Self {
        self.verbs.insert(verb.to_string(), relation.to_string());
        self
    }

    pub fn with_folder_relation(mut self, relation: &str, folder_relation: &str) -> Self {
        self.folder_relations
            .insert(relation.to_string(), folder_relation.to_string());
        self
    }

    pub fn with_group_resource_relations(mut self, relations: &[&str]) -> Self {
        self.group_resource_relations.extend(to_set(relations));
        self
    }

    pub fn with_generic_relations(mut self, relations: &[&str]) -> Self {
        self.generic_relations.extend(to_set(relations));
        self
    }

    pub fn with_type(mut self, group_resource: &str, type_name: &str, relations: &[&str]) -> Self {
        self.types
            .insert(group_resource.to_string(), TypeInfo::new(type_name, relations));
        self
    }

    /// Relation granted by a verb, `None` when the verb grants nothing
    pub fn relation_for(&self, verb: &str) -> Option<&str> {
        self.verbs.get(verb).map(String::as_str)
    }

    /// Relation to evaluate on the containing folder, `None` when the
    /// relation cannot be inherited from folders
    pub fn folder_relation_for(&self, relation: &str) -> Option<&str> {
        self.folder_relations.get(relation).map(String::as_str)
    }

    pub fn is_group_resource_relation(&self, relation: &str) -> bool {
        self.group_resource_relations.contains(relation)
    }

    pub fn type_info(&self, group_resource: &str) -> Option<&TypeInfo> {
        self.types.get(group_resource)
    }

    pub fn generic_relations(&self) -> &HashSet<String> {
        &self.generic_relations
    }

    /// Check the tables are internally consistent
    pub fn validate(&self) -> Result<(), AuthzError> {
        for (verb, relation) in &self.verbs {
            let known = self.generic_relations.contains(relation)
                || self.group_resource_relations.contains(relation)
                || self.types.values().any(|t| t.relations.contains(relation));
            if !known {
                return Err(AuthzError::Configuration(format!(
                    "Verb '{}' maps to undeclared relation '{}'",
                    verb, relation
                )));
            }
        }

        for relation in self.folder_relations.keys() {
            if !self.generic_relations.contains(relation) {
                return Err(AuthzError::Configuration(format!(
                    "Folder mapping for '{}' which generic resources do not declare",
                    relation
                )));
            }
        }

        for (group_resource, info) in &self.types {
            if info.type_name.is_empty() || info.type_name.contains(':') {
                return Err(AuthzError::Configuration(format!(
                    "Invalid type name '{}' for '{}'",
                    info.type_name, group_resource
                )));
            }
        }

        Ok(())
    }
}

fn to_set(relations: &[&str]) -> HashSet<String> {
    relations.iter().map(|r| r.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_verb_mapping() {
        let table = RelationTable::standard();
        assert_eq!(table.relation_for("list"), Some(RELATION_GET));
        assert_eq!(table.relation_for("watch"), Some(RELATION_GET));
        assert_eq!(table.relation_for("patch"), Some(RELATION_UPDATE));
        assert_eq!(table.relation_for("deletecollection"), Some(RELATION_DELETE));
        assert_eq!(table.relation_for("impersonate"), None);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_folder_relations() {
        let table = RelationTable::standard();
        assert_eq!(table.folder_relation_for("get"), Some("resource_get"));
        assert_eq!(
            table.folder_relation_for("set_permissions"),
            Some("resource_set_permissions")
        );
        assert_eq!(table.folder_relation_for("viewer"), None);
    }

    #[test]
    fn test_group_resource_relations_exclude_permissions() {
        let table = RelationTable::standard();
        assert!(table.is_group_resource_relation("get"));
        assert!(!table.is_group_resource_relation("set_permissions"));
    }

    #[test]
    fn test_typed_lookup() {
        let table = RelationTable::standard();
        let folder = table.type_info("folder.grafana.app/folders").unwrap();
        assert_eq!(folder.type_name, "folder");
        assert!(folder.relations.contains("set_permissions"));

        let team = table.type_info("iam.grafana.app/teams").unwrap();
        assert!(!team.relations.contains("get_permissions"));

        assert!(table.type_info("dashboard.grafana.app/dashboards").is_none());
    }

    #[test]
    fn test_validate_rejects_dangling_verb() {
        let table = RelationTable::new().with_verb("view", "viewer");
        assert!(table.validate().is_err());

        let table = table.with_generic_relations(&["viewer"]);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_deserialize_table() {
        let table: RelationTable = serde_json::from_value(serde_json::json!({
            "verbs": { "view": "viewer" },
            "generic_relations": ["viewer"],
            "types": {
                "folder.grafana.app/folders": { "type_name": "folder", "relations": ["viewer"] }
            }
        }))
        .unwrap();

        assert_eq!(table.relation_for("view"), Some("viewer"));
        assert!(table.folder_relations.is_empty());
        assert!(table.validate().is_ok());
    }
}
