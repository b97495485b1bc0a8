//! Recipients tab. Recipients are listed on their own and embedded in correspondence details.

use crate::application::mutation::{MutationConfig, MutationMethod};
use crate::application::rules::{
    UpdateRuleBinding, patch_where, remove_embedded, remove_where, upsert_by,
};
use crate::cache::InvalidKeyError;

use super::Resource;
use super::correspondences::CORRESPONDENCES;

pub const RECIPIENTS: Resource = Resource {
    path: "/recipient",
    id_field: "recipientId",
};

/// Delete a recipient from every cached list page and, when given, from a correspondence.
pub fn delete(correspondence_id: Option<&str>) -> Result<MutationConfig, InvalidKeyError> {
    let mut bindings = vec![
        UpdateRuleBinding::new(RECIPIENTS.list_key(None)?, remove_where(RECIPIENTS.id_field))
            .every_page(),
    ];
    if let Some(correspondence_id) = correspondence_id {
        bindings.push(UpdateRuleBinding::new(
            CORRESPONDENCES.detail_key(correspondence_id)?,
            remove_embedded("recipients", RECIPIENTS.id_field),
        ));
    }
    Ok(MutationConfig::new(MutationMethod::Delete).cache(bindings))
}

pub fn update() -> Result<MutationConfig, InvalidKeyError> {
    Ok(MutationConfig::new(MutationMethod::Put).cache(vec![
        UpdateRuleBinding::new(RECIPIENTS.list_key(None)?, patch_where(RECIPIENTS.id_field))
            .every_page(),
    ]))
}

pub fn create() -> Result<MutationConfig, InvalidKeyError> {
    Ok(MutationConfig::new(MutationMethod::Post)
        .key(RECIPIENTS.list_key(None)?)
        .on_update(upsert_by(RECIPIENTS.id_field)))
}
