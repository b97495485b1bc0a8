//! Cache bindings for the archive admin tabs.
//!
//! Each resource module knows its API paths and which cached views a write has to touch,
//! so callers get consistent list and detail views without writing rules themselves.

pub mod correspondences;
pub mod letters;
pub mod recipients;

use serde_json::Value;

use crate::application::mutation::MutationDescriptor;
use crate::application::query::QueryDescriptor;
use crate::application::rules::MutationParams;
use crate::cache::{CacheKey, InvalidKeyError, compute_key};

/// Query parameter carrying the pagination cursor of list reads.
pub const CURSOR_PARAM: &str = "lastEvaluatedKey";

/// An API collection with list and detail reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub path: &'static str,
    pub id_field: &'static str,
}

impl Resource {
    /// Key of one list page; `None` is the first page.
    pub fn list_key(&self, cursor: Option<&str>) -> Result<CacheKey, InvalidKeyError> {
        compute_key(self.path, cursor.map(|cursor| (CURSOR_PARAM, cursor)))
    }

    pub fn detail_key(&self, id: &str) -> Result<CacheKey, InvalidKeyError> {
        CacheKey::from_path(&self.item_path(id))
    }

    pub fn list(
        &self,
        cursor: Option<&str>,
        token: Option<String>,
    ) -> Result<QueryDescriptor, InvalidKeyError> {
        Ok(QueryDescriptor::new(self.list_key(cursor)?, token))
    }

    pub fn detail(
        &self,
        id: &str,
        token: Option<String>,
    ) -> Result<QueryDescriptor, InvalidKeyError> {
        Ok(QueryDescriptor::new(self.detail_key(id)?, token))
    }

    /// `DELETE {path}/{id}`; the id travels in the params so rules can match on it.
    pub fn delete_descriptor(&self, id: &str) -> MutationDescriptor {
        MutationDescriptor::new(self.item_path(id), self.id_params(id))
    }

    /// `PUT {path}/{id}` with `fields`; the id field is always set to `id`.
    pub fn update_descriptor(&self, id: &str, mut fields: MutationParams) -> MutationDescriptor {
        fields.insert(self.id_field.to_string(), Value::String(id.to_string()));
        MutationDescriptor::new(self.item_path(id), fields)
    }

    /// `POST {path}` with `fields`.
    pub fn create_descriptor(&self, fields: MutationParams) -> MutationDescriptor {
        MutationDescriptor::new(self.path, fields)
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path, id.trim())
    }

    fn id_params(&self, id: &str) -> MutationParams {
        let mut params = MutationParams::new();
        params.insert(self.id_field.to_string(), Value::String(id.to_string()));
        params
    }
}
