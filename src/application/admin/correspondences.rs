use crate::application::mutation::{MutationConfig, MutationMethod};
use crate::application::rules::{UpdateRuleBinding, patch_where, remove_where, upsert_by};
use crate::cache::InvalidKeyError;

use super::Resource;

pub const CORRESPONDENCES: Resource = Resource {
    path: "/correspondence",
    id_field: "correspondenceId",
};

/// Delete a correspondence from every cached list page. Its detail entry is left for the
/// caller to drop or revalidate.
pub fn delete(correspondence_id: &str) -> Result<MutationConfig, InvalidKeyError> {
    Ok(MutationConfig::new(MutationMethod::Delete).cache(vec![
        UpdateRuleBinding::new(
            CORRESPONDENCES.list_key(None)?,
            remove_where(CORRESPONDENCES.id_field),
        )
        .every_page(),
        UpdateRuleBinding::untouched(CORRESPONDENCES.detail_key(correspondence_id)?),
    ]))
}

/// Rename or re-describe a correspondence on every cached list page and in its detail view.
pub fn update(correspondence_id: &str) -> Result<MutationConfig, InvalidKeyError> {
    Ok(MutationConfig::new(MutationMethod::Put).cache(vec![
        UpdateRuleBinding::new(
            CORRESPONDENCES.list_key(None)?,
            patch_where(CORRESPONDENCES.id_field),
        )
        .every_page(),
        UpdateRuleBinding::new(
            CORRESPONDENCES.detail_key(correspondence_id)?,
            patch_where(CORRESPONDENCES.id_field),
        ),
    ]))
}

pub fn create() -> Result<MutationConfig, InvalidKeyError> {
    Ok(MutationConfig::new(MutationMethod::Post)
        .key(CORRESPONDENCES.list_key(None)?)
        .on_update(upsert_by(CORRESPONDENCES.id_field)))
}
