use std::collections::HashMap;
use std::sync::Arc;

use quota_core::{Dispatcher, Error};

pub const DEFAULT_TIER: &str = "default";

/// Shared application state handed to every handler (spec §6), extended
/// with the named-tier lookup `quota-service`'s expanded configuration
/// (spec §6 "limits (default + named tiers)") adds on top of spec.md's
/// single default limit: each tier gets its own fully-constructed
/// `Dispatcher`, keyed by tier name, with `"default"` always present. All
/// tiers share one underlying store (one `LocalStore`/`SharedStore`
/// instance), so [`Self::storage_key`] folds the tier into the key for
/// every non-default tier — otherwise two tiers checking the same
/// `(identifier, resource)` pair would silently pool one counter.
#[derive(Clone)]
pub struct AppState {
    dispatchers: Arc<HashMap<String, Arc<Dispatcher>>>,
}

impl AppState {
    pub fn new(dispatchers: HashMap<String, Arc<Dispatcher>>) -> Self {
        debug_assert!(dispatchers.contains_key(DEFAULT_TIER));
        Self {
            dispatchers: Arc::new(dispatchers),
        }
    }

    /// Storage key for an `(identifier, resource)` pair. For the default
    /// tier this is exactly spec §6's `identifier + ':' + resource`; a
    /// named tier is folded in as a prefix (`tier + ':' + identifier +
    /// ':' + resource`) so its counters never collide with another
    /// tier's for the same pair.
    pub fn storage_key(identifier: &str, resource: &str, tier: Option<&str>) -> String {
        match tier.filter(|t| *t != DEFAULT_TIER) {
            Some(tier) => format!("{tier}:{identifier}:{resource}"),
            None => format!("{identifier}:{resource}"),
        }
    }

    /// Resolves a request's `tier` parameter to its `Dispatcher`. An
    /// explicitly named but unregistered tier is a `BadRequest`, the same
    /// treatment spec §7 gives an unknown `algorithm` name.
    pub fn dispatcher(&self, tier: Option<&str>) -> quota_core::error::Result<&Arc<Dispatcher>> {
        let name = tier.unwrap_or(DEFAULT_TIER);
        self.dispatchers
            .get(name)
            .ok_or_else(|| Error::BadRequest(format!("unknown limit tier '{name}'")))
    }
}
