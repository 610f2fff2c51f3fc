use crate::{
    codec,
    error::Result,
    models::{CheckRequest, Context, GroupResource, ListRequest},
    relations::RelationTable,
};
use std::collections::HashSet;

/// Context attribute carrying the requested `group/resource`
pub const REQUESTED_GROUP: &str = "requested_group";

/// A requested resource, classified by how access to it is modelled
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceInfo<'a> {
    /// Resource kind with its own relations, independent of folders
    Typed {
        group_resource: GroupResource,
        type_name: &'a str,
        name: Option<String>,
        relations: &'a HashSet<String>,
    },
    /// Resource governed by its containing folder plus direct grants
    Generic {
        group_resource: GroupResource,
        name: Option<String>,
        folder: Option<String>,
        relations: &'a HashSet<String>,
        context: Context,
    },
}

impl<'a> ResourceInfo<'a> {
    pub fn from_list(request: &ListRequest, table: &'a RelationTable) -> Self {
        Self::classify(
            &request.group_resource,
            None,
            None,
            request.context.as_ref(),
            table,
        )
    }

    pub fn from_check(request: &CheckRequest, table: &'a RelationTable) -> Self {
        Self::classify(
            &request.group_resource,
            Some(request.name.as_str()),
            request.folder.as_deref(),
            request.context.as_ref(),
            table,
        )
    }

    fn classify(
        group_resource: &GroupResource,
        name: Option<&str>,
        folder: Option<&str>,
        extra: Option<&Context>,
        table: &'a RelationTable,
    ) -> Self {
        let name = name.filter(|n| !n.is_empty()).map(str::to_string);

        if let Some(info) = table.type_info(&group_resource.base()) {
            return ResourceInfo::Typed {
                group_resource: group_resource.clone(),
                type_name: &info.type_name,
                name,
                relations: &info.relations,
            };
        }

        let mut context = extra.cloned().unwrap_or_default();
        context.insert(
            REQUESTED_GROUP.to_string(),
            serde_json::Value::String(group_resource.to_string()),
        );

        ResourceInfo::Generic {
            group_resource: group_resource.clone(),
            name,
            folder: folder.filter(|f| !f.is_empty()).map(str::to_string),
            relations: table.generic_relations(),
            context,
        }
    }

    /// Backend object type listed for this resource
    pub fn type_name(&self) -> &str {
        match self {
            ResourceInfo::Typed { type_name, .. } => *type_name,
            ResourceInfo::Generic { .. } => codec::TYPE_RESOURCE,
        }
    }

    pub fn group_resource(&self) -> &GroupResource {
        match self {
            ResourceInfo::Typed { group_resource, .. } => group_resource,
            ResourceInfo::Generic { group_resource, .. } => group_resource,
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, ResourceInfo::Generic { .. })
    }

    pub fn is_valid_relation(&self, relation: &str) -> bool {
        match self {
            ResourceInfo::Typed { relations, .. } => relations.contains(relation),
            ResourceInfo::Generic { relations, .. } => relations.contains(relation),
        }
    }

    /// Attributes for conditional evaluation.
    ///
    /// Typed resources have none: caller-supplied context is dropped for them.
    pub fn context(&self) -> Option<Context> {
        match self {
            ResourceInfo::Typed { .. } => None,
            ResourceInfo::Generic { context, .. } => Some(context.clone()),
        }
    }

    /// Object used for the type-level check
    pub fn group_resource_ident(&self) -> String {
        codec::encode_group_resource(self.group_resource())
    }

    pub fn resource_ident(&self) -> Option<String> {
        match self {
            ResourceInfo::Typed { type_name, name, .. } => {
                name.as_deref().map(|n| codec::encode_typed(type_name, n))
            }
            ResourceInfo::Generic { group_resource, name, .. } => {
                name.as_deref().map(|n| codec::encode_generic(group_resource, n))
            }
        }
    }

    pub fn folder_ident(&self) -> Option<String> {
        match self {
            ResourceInfo::Typed { .. } => None,
            ResourceInfo::Generic { folder, .. } => folder.as_deref().map(codec::encode_folder),
        }
    }

    /// Strip the object-type prefix from a key listed for this resource
    pub fn decode_item(&self, key: &str) -> Result<String> {
        match self {
            ResourceInfo::Typed { type_name, .. } => codec::decode_typed(type_name, key),
            ResourceInfo::Generic { group_resource, .. } => codec::decode_generic(group_resource, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_typed() {
        let table = RelationTable::standard();
        let req = ListRequest::new("default", "user:1", "list", "folder.grafana.app", "folders");
        let info = ResourceInfo::from_list(&req, &table);

        assert!(!info.is_generic());
        assert_eq!(info.type_name(), "folder");
        assert!(info.is_valid_relation("get"));
        assert!(!info.is_valid_relation("resource_get"));
        assert_eq!(info.context(), None);
        assert_eq!(info.resource_ident(), None);
        assert_eq!(
            info.group_resource_ident(),
            "group_resource:folder.grafana.app/folders"
        );
    }

    #[test]
    fn test_classify_generic() {
        let table = RelationTable::standard();
        let req = CheckRequest::new(
            "default",
            "user:1",
            "get",
            "dashboard.grafana.app",
            "dashboards",
            "d1",
        )
        .in_folder("eng");
        let info = ResourceInfo::from_check(&req, &table);

        assert!(info.is_generic());
        assert_eq!(info.type_name(), "resource");
        assert_eq!(
            info.resource_ident().as_deref(),
            Some("resource:dashboard.grafana.app/dashboards/d1")
        );
        assert_eq!(info.folder_ident().as_deref(), Some("folder:eng"));

        let ctx = info.context().unwrap();
        assert_eq!(ctx[REQUESTED_GROUP], json!("dashboard.grafana.app/dashboards"));
    }

    #[test]
    fn test_subresource_is_part_of_context_but_not_classification() {
        let table = RelationTable::standard();
        let req = ListRequest::new("default", "user:1", "get", "folder.grafana.app", "folders")
            .with_subresource("access");
        assert!(!ResourceInfo::from_list(&req, &table).is_generic());

        let req = ListRequest::new("default", "user:1", "get", "dashboard.grafana.app", "dashboards")
            .with_subresource("versions");
        let info = ResourceInfo::from_list(&req, &table);
        assert_eq!(
            info.context().unwrap()[REQUESTED_GROUP],
            json!("dashboard.grafana.app/dashboards/versions")
        );
    }

    #[test]
    fn test_caller_context_cannot_override_requested_group() {
        let table = RelationTable::standard();
        let mut extra = Context::new();
        extra.insert(REQUESTED_GROUP.to_string(), json!("folder.grafana.app/folders"));
        extra.insert("client".to_string(), json!("ui"));

        let req = ListRequest::new("default", "user:1", "get", "dashboard.grafana.app", "dashboards")
            .with_context(extra);
        let ctx = ResourceInfo::from_list(&req, &table).context().unwrap();

        assert_eq!(ctx[REQUESTED_GROUP], json!("dashboard.grafana.app/dashboards"));
        assert_eq!(ctx["client"], json!("ui"));
    }

    #[test]
    fn test_typed_resource_drops_caller_context() {
        let table = RelationTable::standard();
        let mut extra = Context::new();
        extra.insert("client".to_string(), json!("ui"));

        let req = ListRequest::new("default", "user:1", "get", "folder.grafana.app", "folders")
            .with_context(extra);
        assert_eq!(ResourceInfo::from_list(&req, &table).context(), None);
    }

    #[test]
    fn test_decode_item_uses_resource_prefix() {
        let table = RelationTable::standard();
        let req = ListRequest::new("default", "user:1", "get", "iam.grafana.app", "teams");
        let info = ResourceInfo::from_list(&req, &table);
        assert_eq!(info.decode_item("team:7").unwrap(), "7");
        assert!(info.decode_item("user:7").is_err());
    }
}
