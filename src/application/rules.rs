//! Update rules: pure transforms applied to cached values after a successful write.
//!
//! A rule receives the key's current value and the mutation's params and returns the new
//! value, or `None` to leave the entry as it is. Binding rules to several keys lets one
//! mutation keep unrelated list and detail views consistent without a refetch.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::cache::CacheKey;

/// Params of one mutation, passed verbatim to every bound rule.
pub type MutationParams = Map<String, Value>;

type RuleFn = dyn Fn(Option<&Value>, &MutationParams) -> Option<Value> + Send + Sync;

#[derive(Clone)]
pub struct UpdateRule(Arc<RuleFn>);

impl UpdateRule {
    pub fn new<F>(rule: F) -> Self
    where
        F: Fn(Option<&Value>, &MutationParams) -> Option<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(rule))
    }

    pub fn apply(&self, previous: Option<&Value>, params: &MutationParams) -> Option<Value> {
        (self.0)(previous, params)
    }
}

impl fmt::Debug for UpdateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UpdateRule(..)")
    }
}

/// A cache key and the rule to run on it. Without a rule the entry is left for an explicit
/// refetch.
#[derive(Debug, Clone)]
pub struct UpdateRuleBinding {
    pub key: CacheKey,
    pub rule: Option<UpdateRule>,
    /// Also run the rule on every cached key with the same path, e.g. later list pages.
    pub every_page: bool,
}

impl UpdateRuleBinding {
    pub fn new(key: CacheKey, rule: UpdateRule) -> Self {
        Self {
            key,
            rule: Some(rule),
            every_page: false,
        }
    }

    pub fn untouched(key: CacheKey) -> Self {
        Self {
            key,
            rule: None,
            every_page: false,
        }
    }

    /// Extend the binding to every page of the key's path cached when the mutation runs.
    pub fn every_page(mut self) -> Self {
        self.every_page = true;
        self
    }
}

fn matches_field(item: &Value, field: &str, expected: &Value) -> bool {
    item.get(field) == Some(expected)
}

fn merge_into(target: &mut Value, params: &MutationParams) {
    if let Value::Object(fields) = target {
        for (name, value) in params {
            fields.insert(name.clone(), value.clone());
        }
    }
}

/// Drop list items whose `field` equals `params[field]`.
pub fn remove_where(field: &'static str) -> UpdateRule {
    UpdateRule::new(move |previous, params| {
        let expected = params.get(field)?;
        let items = previous?.as_array()?;
        Some(Value::Array(
            items
                .iter()
                .filter(|item| !matches_field(item, field, expected))
                .cloned()
                .collect(),
        ))
    })
}

/// Replace the list item matching `params[field]` with `params`, or append it.
pub fn upsert_by(field: &'static str) -> UpdateRule {
    UpdateRule::new(move |previous, params| {
        let expected = params.get(field)?;
        let mut items = previous?.as_array()?.clone();
        let item = Value::Object(params.clone());
        match items
            .iter_mut()
            .find(|candidate| matches_field(candidate, field, expected))
        {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
        Some(Value::Array(items))
    })
}

/// Merge `params` into the item matching `params[field]`.
///
/// Works on lists and on a single detail object.
pub fn patch_where(field: &'static str) -> UpdateRule {
    UpdateRule::new(move |previous, params| {
        let expected = params.get(field)?;
        let mut next = previous?.clone();
        if let Some(items) = next.as_array_mut() {
            let target = items
                .iter_mut()
                .find(|item| matches_field(item, field, expected))?;
            merge_into(target, params);
        } else if next.is_object() && matches_field(&next, field, expected) {
            merge_into(&mut next, params);
        } else {
            return None;
        }
        Some(next)
    })
}

/// Drop items of the list nested under `collection` whose `field` equals `params[field]`.
pub fn remove_embedded(collection: &'static str, field: &'static str) -> UpdateRule {
    UpdateRule::new(move |previous, params| {
        let expected = params.get(field)?;
        let mut next = previous?.clone();
        let items = next.get_mut(collection)?.as_array_mut()?;
        items.retain(|item| !matches_field(item, field, expected));
        Some(next)
    })
}

/// Replace the cached value with the mutation's params.
pub fn replace_with_params() -> UpdateRule {
    UpdateRule::new(|_, params| Some(Value::Object(params.clone())))
}
