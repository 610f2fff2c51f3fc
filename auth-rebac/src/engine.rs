use crate::{
    backend::TupleBackend,
    codec,
    config::EngineConfig,
    error::{AuthzError, Result},
    models::*,
    relations::RelationTable,
    resource::ResourceInfo,
    store::{CachingStoreResolver, StoreResolver},
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// List/check authorization engine.
///
/// Stateless per request: every call resolves the namespace store, maps the
/// verb to a relation and queries the tuple backend. The engine itself only
/// holds read-only tables and configuration.
pub struct AuthorizationEngine {
    /// Tuple-store backend answering check and list queries
    backend: Arc<dyn TupleBackend>,

    /// Namespace -> store resolution
    stores: Arc<dyn StoreResolver>,

    /// Set when `stores` is the engine's own resolution cache
    store_cache: Option<Arc<CachingStoreResolver>>,

    /// Verb, folder and type relation tables
    relations: Arc<RelationTable>,

    config: EngineConfig,
}

impl AuthorizationEngine {
    /// Create an engine with the standard relation tables and default config
    pub fn new(backend: Arc<dyn TupleBackend>, stores: Arc<dyn StoreResolver>) -> Self {
        let config = EngineConfig::default();
        let (stores, store_cache) = Self::wrap_resolver(stores, &config);
        Self {
            backend,
            stores,
            store_cache,
            relations: Arc::new(RelationTable::standard()),
            config,
        }
    }

    /// Create an engine from configuration, validating its relation tables
    pub fn from_config(
        backend: Arc<dyn TupleBackend>,
        stores: Arc<dyn StoreResolver>,
        config: EngineConfig,
    ) -> Result<Self> {
        let relations = Arc::new(config.relation_table()?);
        let (stores, store_cache) = Self::wrap_resolver(stores, &config);
        info!(
            streamed = config.use_streamed_list_objects,
            concurrent = config.concurrent_generic_listing,
            "Authorization engine configured"
        );
        Ok(Self {
            backend,
            stores,
            store_cache,
            relations,
            config,
        })
    }

    /// Replace the relation tables, rejecting inconsistent ones
    pub fn with_relations(mut self, relations: RelationTable) -> Result<Self> {
        relations.validate()?;
        self.relations = Arc::new(relations);
        Ok(self)
    }

    pub fn relations(&self) -> &RelationTable {
        &self.relations
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forget the cached store of a namespace, e.g. after it was re-provisioned.
    ///
    /// No-op when store resolution caching is disabled.
    pub fn invalidate_store(&self, namespace: &str) {
        if let Some(cache) = &self.store_cache {
            debug!(namespace, "Invalidating cached store");
            cache.invalidate(namespace);
        }
    }

    fn wrap_resolver(
        stores: Arc<dyn StoreResolver>,
        config: &EngineConfig,
    ) -> (Arc<dyn StoreResolver>, Option<Arc<CachingStoreResolver>>) {
        if config.cache_store_resolution {
            let cache = Arc::new(CachingStoreResolver::new(stores));
            let resolver: Arc<dyn StoreResolver> = cache.clone();
            (resolver, Some(cache))
        } else {
            (stores, None)
        }
    }

    // =============================================================================
    // Check
    // =============================================================================

    /// Can the subject perform the verb on one resource
    #[instrument(skip_all, fields(namespace = %request.namespace, verb = %request.verb))]
    pub async fn check(&self, request: &CheckRequest) -> Result<CheckResponse> {
        self.with_deadline(self.check_request(request)).await
    }

    async fn check_request(&self, request: &CheckRequest) -> Result<CheckResponse> {
        let store = self.stores.resolve(&request.namespace).await?;

        let Some(relation) = self.relations.relation_for(&request.verb) else {
            debug!("Verb has no relation, denying");
            return Ok(CheckResponse { allowed: false });
        };

        let resource = ResourceInfo::from_check(request, &self.relations);

        if self
            .check_group_resource(&request.subject, relation, &resource, &store)
            .await?
        {
            return Ok(CheckResponse { allowed: true });
        }

        let allowed = match resource {
            ResourceInfo::Typed { .. } => {
                self.check_typed(&request.subject, relation, &resource, &store).await?
            }
            ResourceInfo::Generic { .. } => {
                self.check_generic(&request.subject, relation, &resource, &store).await?
            }
        };

        debug!(relation, allowed, "Check completed");
        Ok(CheckResponse { allowed })
    }

    /// Type-level check: does the subject hold the relation on every
    /// resource of the kind
    async fn check_group_resource(
        &self,
        subject: &str,
        relation: &str,
        resource: &ResourceInfo<'_>,
        store: &Store,
    ) -> Result<bool> {
        if !self.relations.is_group_resource_relation(relation) {
            return Ok(false);
        }

        self.backend
            .check(CheckQuery {
                store: store.clone(),
                object: resource.group_resource_ident(),
                relation: relation.to_string(),
                user: subject.to_string(),
                context: None,
            })
            .await
    }

    async fn check_typed(
        &self,
        subject: &str,
        relation: &str,
        resource: &ResourceInfo<'_>,
        store: &Store,
    ) -> Result<bool> {
        if !resource.is_valid_relation(relation) {
            return Ok(false);
        }
        let Some(object) = resource.resource_ident() else {
            return Ok(false);
        };

        self.backend
            .check(CheckQuery {
                store: store.clone(),
                object,
                relation: relation.to_string(),
                user: subject.to_string(),
                context: None,
            })
            .await
    }

    async fn check_generic(
        &self,
        subject: &str,
        relation: &str,
        resource: &ResourceInfo<'_>,
        store: &Store,
    ) -> Result<bool> {
        let context = resource.context();

        // 1. Inherited through the parent folder
        if let (Some(folder), Some(folder_relation)) = (
            resource.folder_ident(),
            self.relations.folder_relation_for(relation),
        ) {
            let allowed = self
                .backend
                .check(CheckQuery {
                    store: store.clone(),
                    object: folder,
                    relation: folder_relation.to_string(),
                    user: subject.to_string(),
                    context: context.clone(),
                })
                .await?;
            if allowed {
                return Ok(true);
            }
        }

        // 2. Granted directly on the resource
        if !resource.is_valid_relation(relation) {
            return Ok(false);
        }
        let Some(object) = resource.resource_ident() else {
            return Ok(false);
        };

        self.backend
            .check(CheckQuery {
                store: store.clone(),
                object,
                relation: relation.to_string(),
                user: subject.to_string(),
                context,
            })
            .await
    }

    // =============================================================================
    // List
    // =============================================================================

    /// Narrow the resources of a kind the subject may act on.
    ///
    /// The result is not authoritative: folders are returned unexpanded and the
    /// resource store must still filter what it serves.
    #[instrument(skip_all, fields(namespace = %request.namespace, verb = %request.verb))]
    pub async fn list(&self, request: &ListRequest) -> Result<ListResponse> {
        self.with_deadline(self.list_request(request)).await
    }

    async fn list_request(&self, request: &ListRequest) -> Result<ListResponse> {
        let store = self.stores.resolve(&request.namespace).await?;

        let Some(relation) = self.relations.relation_for(&request.verb) else {
            debug!("Verb has no relation, listing nothing");
            return Ok(ListResponse::default());
        };

        let resource = ResourceInfo::from_list(request, &self.relations);

        if self
            .check_group_resource(&request.subject, relation, &resource, &store)
            .await?
        {
            debug!(relation, "Subject holds relation on the whole resource kind");
            return Ok(ListResponse::allow_all());
        }

        let response = match resource {
            ResourceInfo::Typed { .. } => {
                self.list_typed(&request.subject, relation, &resource, &store).await?
            }
            ResourceInfo::Generic { .. } => {
                self.list_generic(&request.subject, relation, &resource, &store).await?
            }
        };

        debug!(
            relation,
            items = response.items.len(),
            folders = response.folders.len(),
            "List completed"
        );
        Ok(response)
    }

    async fn list_typed(
        &self,
        subject: &str,
        relation: &str,
        resource: &ResourceInfo<'_>,
        store: &Store,
    ) -> Result<ListResponse> {
        if !resource.is_valid_relation(relation) {
            return Ok(ListResponse::default());
        }

        let objects = self
            .list_objects(ListObjectsQuery {
                store: store.clone(),
                object_type: resource.type_name().to_string(),
                relation: relation.to_string(),
                user: subject.to_string(),
                context: None,
            })
            .await?;

        Ok(ListResponse {
            all: false,
            items: codec::decode_all(objects, |key| resource.decode_item(key))?,
            folders: Vec::new(),
        })
    }

    async fn list_generic(
        &self,
        subject: &str,
        relation: &str,
        resource: &ResourceInfo<'_>,
        store: &Store,
    ) -> Result<ListResponse> {
        let folders = self.list_folders(subject, relation, resource, store);
        let items = self.list_direct(subject, relation, resource, store);

        // try_join drops the sibling query as soon as one fails
        let (folders, items) = if self.config.concurrent_generic_listing {
            tokio::try_join!(folders, items)?
        } else {
            (folders.await?, items.await?)
        };

        Ok(ListResponse {
            all: false,
            items,
            folders,
        })
    }

    /// Folders the subject can access resources of this kind in
    async fn list_folders(
        &self,
        subject: &str,
        relation: &str,
        resource: &ResourceInfo<'_>,
        store: &Store,
    ) -> Result<Vec<String>> {
        let Some(folder_relation) = self.relations.folder_relation_for(relation) else {
            return Ok(Vec::new());
        };

        let objects = self
            .list_objects(ListObjectsQuery {
                store: store.clone(),
                object_type: codec::TYPE_FOLDER.to_string(),
                relation: folder_relation.to_string(),
                user: subject.to_string(),
                context: resource.context(),
            })
            .await?;

        codec::decode_all(objects, codec::decode_folder)
    }

    /// Resources directly granted to the subject
    async fn list_direct(
        &self,
        subject: &str,
        relation: &str,
        resource: &ResourceInfo<'_>,
        store: &Store,
    ) -> Result<Vec<String>> {
        if !resource.is_valid_relation(relation) {
            return Ok(Vec::new());
        }

        let objects = self
            .list_objects(ListObjectsQuery {
                store: store.clone(),
                object_type: resource.type_name().to_string(),
                relation: relation.to_string(),
                user: subject.to_string(),
                context: resource.context(),
            })
            .await?;

        codec::decode_all(objects, |key| resource.decode_item(key))
    }

    async fn list_objects(&self, query: ListObjectsQuery) -> Result<Vec<String>> {
        if !self.config.use_streamed_list_objects {
            return self.backend.list_objects(query).await;
        }

        let mut stream = self.backend.streamed_list_objects(query).await?;
        let mut objects = Vec::new();
        while let Some(object) = stream.recv().await {
            objects.push(object?);
        }
        Ok(objects)
    }

    async fn with_deadline<T, F>(&self, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.config.request_timeout() {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| AuthzError::DeadlineExceeded(limit))?,
            None => request.await,
        }
    }
}
