//! Relationship-based list/check authorization engine
//!
//! Decides which resources of a kind a subject may act on (`list`) and
//! answers point-wise authorization questions (`check`) on top of a
//! tuple-store backend. Two access models are reconciled:
//!
//! - **Typed** resources (folders, teams, users, service accounts) with their
//!   own first-class relations
//! - **Generic** resources whose access is inherited from the folder they
//!   live in, plus optional direct grants
//!
//! A type-level check runs before any enumeration; when it succeeds the list
//! result is `all = true` and nothing is enumerated. List results are a
//! best-effort narrowing: returned folders are not expanded and the resource
//! store remains responsible for final filtering.
//!
//! # Example
//!
//! ```rust
//! use auth_rebac::{AuthorizationEngine, ListRequest, Tuple};
//! use auth_rebac::backend::InMemoryTupleBackend;
//! use auth_rebac::store::StaticStoreResolver;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(InMemoryTupleBackend::new());
//!     let stores = Arc::new(StaticStoreResolver::new());
//!     let store = stores.provision("default");
//!
//!     backend.write_tuple(&store, Tuple::new("user:alice", "resource_get", "folder:eng"));
//!
//!     let engine = AuthorizationEngine::new(backend, stores);
//!     let res = engine
//!         .list(&ListRequest::new("default", "user:alice", "list", "dashboard.grafana.app", "dashboards"))
//!         .await?;
//!
//!     assert_eq!(res.folders, vec!["eng"]);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod relations;
pub mod resource;
pub mod store;

pub use engine::*;
pub use error::*;
pub use models::*;
pub use relations::RelationTable;
pub use resource::ResourceInfo;
