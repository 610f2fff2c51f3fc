use crate::{
    error::Result,
    models::*,
    resource::REQUESTED_GROUP,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Tuple-store engine answering point and bulk authorization queries
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TupleBackend: Send + Sync {
    /// Does the user hold the relation on the object
    async fn check(&self, query: CheckQuery) -> Result<bool>;

    /// All objects of a type the user holds the relation on
    async fn list_objects(&self, query: ListObjectsQuery) -> Result<Vec<String>>;

    /// Streaming variant of [`TupleBackend::list_objects`]; the accumulated
    /// stream must equal the bulk result
    async fn streamed_list_objects(
        &self,
        query: ListObjectsQuery,
    ) -> Result<mpsc::Receiver<Result<String>>> {
        let objects = self.list_objects(query).await?;
        let (tx, rx) = mpsc::channel(objects.len().max(1));
        for object in objects {
            if tx.send(Ok(object)).await.is_err() {
                break;
            }
        }
        Ok(rx)
    }
}

/// In-memory tuple backend for testing and development.
///
/// Evaluates direct tuples only, with an optional group filter condition
/// matched against the `requested_group` context attribute.
pub struct InMemoryTupleBackend {
    tuples: Arc<DashMap<String, Tuple>>,
}

impl InMemoryTupleBackend {
    pub fn new() -> Self {
        Self {
            tuples: Arc::new(DashMap::new()),
        }
    }

    fn tuple_key(store: &Store, tuple: &Tuple) -> String {
        format!("{}|{}|{}|{}", store.id, tuple.user, tuple.relation, tuple.object)
    }

    pub fn write_tuple(&self, store: &Store, tuple: Tuple) {
        debug!(store = %store, tuple = %tuple, "Writing tuple");
        self.tuples.insert(Self::tuple_key(store, &tuple), tuple);
    }

    pub fn delete_tuple(&self, store: &Store, tuple: &Tuple) {
        self.tuples.remove(&Self::tuple_key(store, tuple));
    }

    fn matching<F>(&self, store: &Store, context: Option<&Context>, filter: F) -> BTreeSet<String>
    where
        F: Fn(&Tuple) -> bool,
    {
        let prefix = format!("{}|", store.id);
        self.tuples
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .filter(|entry| filter(entry.value()) && condition_holds(entry.value(), context))
            .map(|entry| entry.value().object.clone())
            .collect()
    }
}

impl Default for InMemoryTupleBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn condition_holds(tuple: &Tuple, context: Option<&Context>) -> bool {
    let Some(ref groups) = tuple.allowed_groups else {
        return true;
    };
    context
        .and_then(|ctx| ctx.get(REQUESTED_GROUP))
        .and_then(|value| value.as_str())
        .map(|requested| groups.iter().any(|g| g == requested))
        .unwrap_or(false)
}

#[async_trait]
impl TupleBackend for InMemoryTupleBackend {
    async fn check(&self, query: CheckQuery) -> Result<bool> {
        let found = self.matching(&query.store, query.context.as_ref(), |t| {
            t.user == query.user && t.relation == query.relation && t.object == query.object
        });
        Ok(!found.is_empty())
    }

    async fn list_objects(&self, query: ListObjectsQuery) -> Result<Vec<String>> {
        let prefix = format!("{}:", query.object_type);
        let found = self.matching(&query.store, query.context.as_ref(), |t| {
            t.user == query.user && t.relation == query.relation && t.object.starts_with(&prefix)
        });
        Ok(found.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list_query(store: &Store, object_type: &str, relation: &str) -> ListObjectsQuery {
        ListObjectsQuery {
            store: store.clone(),
            object_type: object_type.to_string(),
            relation: relation.to_string(),
            user: "user:alice".to_string(),
            context: None,
        }
    }

    #[tokio::test]
    async fn test_in_memory_backend() {
        let backend = InMemoryTupleBackend::new();
        let store = Store::new("s1", "m1");
        let tuple = Tuple::new("user:alice", "get", "team:7");

        backend.write_tuple(&store, tuple.clone());

        let query = CheckQuery {
            store: store.clone(),
            object: "team:7".to_string(),
            relation: "get".to_string(),
            user: "user:alice".to_string(),
            context: None,
        };
        assert!(backend.check(query.clone()).await.unwrap());

        backend.delete_tuple(&store, &tuple);
        assert!(!backend.check(query).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_scoped_by_store_and_type() {
        let backend = InMemoryTupleBackend::new();
        let s1 = Store::new("s1", "m1");
        let s2 = Store::new("s2", "m2");

        backend.write_tuple(&s1, Tuple::new("user:alice", "get", "team:b"));
        backend.write_tuple(&s1, Tuple::new("user:alice", "get", "team:a"));
        backend.write_tuple(&s1, Tuple::new("user:alice", "get", "user:x"));
        backend.write_tuple(&s2, Tuple::new("user:alice", "get", "team:c"));

        let objects = backend.list_objects(list_query(&s1, "team", "get")).await.unwrap();
        assert_eq!(objects, vec!["team:a", "team:b"]);
    }

    #[tokio::test]
    async fn test_group_filter_condition() {
        let backend = InMemoryTupleBackend::new();
        let store = Store::new("s1", "m1");
        backend.write_tuple(
            &store,
            Tuple::new("user:alice", "resource_get", "folder:eng")
                .with_group_filter(&["dashboard.grafana.app/dashboards"]),
        );

        let mut query = list_query(&store, "folder", "resource_get");
        assert!(backend.list_objects(query.clone()).await.unwrap().is_empty());

        let mut ctx = Context::new();
        ctx.insert(REQUESTED_GROUP.to_string(), json!("dashboard.grafana.app/dashboards"));
        query.context = Some(ctx);
        assert_eq!(backend.list_objects(query).await.unwrap(), vec!["folder:eng"]);
    }

    #[tokio::test]
    async fn test_streamed_listing_matches_bulk() {
        let backend = InMemoryTupleBackend::new();
        let store = Store::new("s1", "m1");
        for id in ["a", "b", "c"] {
            backend.write_tuple(&store, Tuple::new("user:alice", "get", &format!("team:{}", id)));
        }

        let bulk = backend.list_objects(list_query(&store, "team", "get")).await.unwrap();
        let mut rx = backend
            .streamed_list_objects(list_query(&store, "team", "get"))
            .await
            .unwrap();
        let mut streamed = Vec::new();
        while let Some(object) = rx.recv().await {
            streamed.push(object.unwrap());
        }
        assert_eq!(streamed, bulk);
    }
}
