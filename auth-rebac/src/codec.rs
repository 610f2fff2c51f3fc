//! Object key codec.
//!
//! Backend objects are addressed by opaque keys:
//!
//! - `<type>:<id>` for typed resources (`folder:eng`, `team:7`)
//! - `resource:<group>/<resource>/<id>` for generic resources
//! - `folder:<id>` for folders holding generic resources
//! - `group_resource:<group>/<resource>` for type-level checks
//!
//! Decoding is the exact left-inverse of encoding. A key that does not carry
//! the expected prefix means the backend and the engine disagree on the
//! protocol, so it is reported as [`AuthzError::MalformedObjectKey`].

use crate::error::{AuthzError, Result};
use crate::models::GroupResource;
use tracing::warn;

pub const TYPE_FOLDER: &str = "folder";
pub const TYPE_RESOURCE: &str = "resource";
pub const TYPE_GROUP_RESOURCE: &str = "group_resource";

const FOLDER_PREFIX: &str = "folder:";

pub fn encode_typed(object_type: &str, id: &str) -> String {
    format!("{}:{}", object_type, id)
}

pub fn encode_generic(group_resource: &GroupResource, id: &str) -> String {
    format!("{}:{}/{}", TYPE_RESOURCE, group_resource, id)
}

pub fn encode_folder(id: &str) -> String {
    format!("{}{}", FOLDER_PREFIX, id)
}

pub fn encode_group_resource(group_resource: &GroupResource) -> String {
    format!("{}:{}", TYPE_GROUP_RESOURCE, group_resource)
}

pub fn decode_typed(object_type: &str, key: &str) -> Result<String> {
    strip(key, &format!("{}:", object_type))
}

pub fn decode_generic(group_resource: &GroupResource, key: &str) -> Result<String> {
    strip(key, &format!("{}:{}/", TYPE_RESOURCE, group_resource))
}

pub fn decode_folder(key: &str) -> Result<String> {
    strip(key, FOLDER_PREFIX)
}

/// Decode every key of a listing, failing on the first malformed one
pub fn decode_all<F>(keys: Vec<String>, decode: F) -> Result<Vec<String>>
where
    F: Fn(&str) -> Result<String>,
{
    keys.iter().map(|key| decode(key)).collect()
}

fn strip(key: &str, prefix: &str) -> Result<String> {
    match key.strip_prefix(prefix) {
        Some(id) => Ok(id.to_string()),
        None => {
            warn!(key, prefix, "Backend returned object key with unexpected prefix");
            Err(AuthzError::MalformedObjectKey {
                key: key.to_string(),
                expected: prefix.to_string(),
            })
        }
    }
}
