//! Letters tab.
//!
//! A letter shows up in the letter list and embedded in its correspondence's detail view.

use crate::application::mutation::{MutationConfig, MutationMethod};
use crate::application::rules::{
    UpdateRuleBinding, patch_where, remove_embedded, remove_where, upsert_by,
};
use crate::cache::InvalidKeyError;

use super::Resource;
use super::correspondences::CORRESPONDENCES;

pub const LETTERS: Resource = Resource {
    path: "/letter",
    id_field: "letterId",
};

/// Delete a letter, dropping it from every cached list page and from the detail of the
/// correspondence it belongs to.
pub fn delete(correspondence_id: Option<&str>) -> Result<MutationConfig, InvalidKeyError> {
    let mut bindings = vec![
        UpdateRuleBinding::new(LETTERS.list_key(None)?, remove_where(LETTERS.id_field))
            .every_page(),
    ];
    if let Some(correspondence_id) = correspondence_id {
        bindings.push(UpdateRuleBinding::new(
            CORRESPONDENCES.detail_key(correspondence_id)?,
            remove_embedded("letters", LETTERS.id_field),
        ));
    }
    Ok(MutationConfig::new(MutationMethod::Delete).cache(bindings))
}

/// Update a letter on every cached list page and in its own detail view.
pub fn update(letter_id: &str) -> Result<MutationConfig, InvalidKeyError> {
    Ok(MutationConfig::new(MutationMethod::Put).cache(vec![
        UpdateRuleBinding::new(LETTERS.list_key(None)?, patch_where(LETTERS.id_field))
            .every_page(),
        UpdateRuleBinding::new(LETTERS.detail_key(letter_id)?, patch_where(LETTERS.id_field)),
    ]))
}

/// Create a letter. The first list page gets the new item; later pages are left alone.
/// Without a client-side id the list stays as it is until revalidated.
pub fn create() -> Result<MutationConfig, InvalidKeyError> {
    Ok(MutationConfig::new(MutationMethod::Post)
        .key(LETTERS.list_key(None)?)
        .on_update(upsert_by(LETTERS.id_field)))
}
