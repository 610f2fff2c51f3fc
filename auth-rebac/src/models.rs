use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attributes attached to a backend query for conditional relation evaluation
pub type Context = serde_json::Map<String, serde_json::Value>;

/// Backend coordinates holding the authorization data of a namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub model_id: String,
}

impl Store {
    pub fn new(id: &str, model_id: &str) -> Self {
        Self {
            id: id.to_string(),
            model_id: model_id.to_string(),
        }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.model_id)
    }
}

/// API group plus resource kind, optionally narrowed to a subresource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
    pub subresource: Option<String>,
}

impl GroupResource {
    pub fn new(group: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            resource: resource.to_string(),
            subresource: None,
        }
    }

    pub fn with_subresource(mut self, subresource: &str) -> Self {
        if !subresource.is_empty() {
            self.subresource = Some(subresource.to_string());
        }
        self
    }

    /// `group/resource`, ignoring any subresource
    pub fn base(&self) -> String {
        format!("{}/{}", self.group, self.resource)
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subresource {
            Some(ref sub) => write!(f, "{}/{}/{}", self.group, self.resource, sub),
            None => write!(f, "{}/{}", self.group, self.resource),
        }
    }
}

/// List request: which resources of a kind may the subject act on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRequest {
    pub namespace: String,
    pub subject: String,
    pub verb: String,
    pub group_resource: GroupResource,
    pub context: Option<Context>,
}

impl ListRequest {
    pub fn new(namespace: &str, subject: &str, verb: &str, group: &str, resource: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            subject: subject.to_string(),
            verb: verb.to_string(),
            group_resource: GroupResource::new(group, resource),
            context: None,
        }
    }

    pub fn with_subresource(mut self, subresource: &str) -> Self {
        self.group_resource = self.group_resource.with_subresource(subresource);
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }
}

/// List result.
///
/// When `all` is set, `items` and `folders` are empty and the caller must
/// treat the absence of enumeration as "everything is allowed". Otherwise the
/// accessible set is `items` plus every resource contained in one of
/// `folders`; expanding folders is left to the resource store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub all: bool,
    pub items: Vec<String>,
    pub folders: Vec<String>,
}

impl ListResponse {
    pub fn allow_all() -> Self {
        Self {
            all: true,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.items.is_empty() && self.folders.is_empty()
    }
}

/// Point-wise authorization question for one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub namespace: String,
    pub subject: String,
    pub verb: String,
    pub group_resource: GroupResource,
    pub name: String,
    /// Parent folder of the resource, if any
    pub folder: Option<String>,
    pub context: Option<Context>,
}

impl CheckRequest {
    pub fn new(
        namespace: &str,
        subject: &str,
        verb: &str,
        group: &str,
        resource: &str,
        name: &str,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            subject: subject.to_string(),
            verb: verb.to_string(),
            group_resource: GroupResource::new(group, resource),
            name: name.to_string(),
            folder: None,
            context: None,
        }
    }

    pub fn in_folder(mut self, folder: &str) -> Self {
        if !folder.is_empty() {
            self.folder = Some(folder.to_string());
        }
        self
    }

    pub fn with_subresource(mut self, subresource: &str) -> Self {
        self.group_resource = self.group_resource.with_subresource(subresource);
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

/// Point query sent to the tuple backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckQuery {
    pub store: Store,
    pub object: String,
    pub relation: String,
    pub user: String,
    pub context: Option<Context>,
}

/// Bulk listing query sent to the tuple backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListObjectsQuery {
    pub store: Store,
    pub object_type: String,
    pub relation: String,
    pub user: String,
    pub context: Option<Context>,
}

/// Relationship tuple: user has relation to object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuple {
    pub user: String,
    pub relation: String,
    pub object: String,
    /// Restricts the tuple to requests whose `requested_group` is listed
    pub allowed_groups: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl Tuple {
    pub fn new(user: &str, relation: &str, object: &str) -> Self {
        Self {
            user: user.to_string(),
            relation: relation.to_string(),
            object: object.to_string(),
            allowed_groups: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_group_filter(mut self, groups: &[&str]) -> Self {
        self.allowed_groups = Some(groups.iter().map(|g| g.to_string()).collect());
        self
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.user, self.relation, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_resource_display() {
        let gr = GroupResource::new("dashboard.grafana.app", "dashboards");
        assert_eq!(gr.to_string(), "dashboard.grafana.app/dashboards");

        let gr = gr.with_subresource("versions");
        assert_eq!(gr.to_string(), "dashboard.grafana.app/dashboards/versions");
        assert_eq!(gr.base(), "dashboard.grafana.app/dashboards");

        // empty subresource is ignored
        let gr = GroupResource::new("a", "b").with_subresource("");
        assert_eq!(gr.subresource, None);
    }

    #[test]
    fn test_allow_all_response() {
        let res = ListResponse::allow_all();
        assert!(res.all);
        assert!(res.items.is_empty());
        assert!(res.folders.is_empty());
        assert!(!res.is_empty());
        assert!(ListResponse::default().is_empty());
    }
}
