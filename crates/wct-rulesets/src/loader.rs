//! URI-based ruleset loading with a process-wide cache.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use tracing::debug;

use wct_core::RulesetData;
use wct_core::rules::RuleName;

use crate::error::RulesetError;
use crate::registry;
use crate::uri::RulesetUri;

/// Loaded rulesets, keyed by `(name, version)`. Entries are type-erased so
/// one cache serves every rule type; a lookup with the wrong type is a
/// runtime error rather than a silent re-parse.
static CACHE: Lazy<RwLock<HashMap<(String, String), Arc<dyn Any + Send + Sync>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Load a ruleset by URI, parsing it on first use and serving every later
/// call from the cache.
///
/// The expected rule type is the type parameter; asking for a cached
/// ruleset with a different rule type fails with
/// [`RulesetError::RuleTypeMismatch`].
pub fn load_ruleset<R>(uri: &str) -> Result<Arc<RulesetData<R>>, RulesetError>
where
    R: DeserializeOwned + RuleName + Send + Sync + 'static,
{
    let parsed = RulesetUri::parse(uri)?;

    if parsed.provider != "local" {
        return Err(RulesetError::UnsupportedProvider {
            provider: parsed.provider,
        });
    }

    let key = (parsed.name.clone(), parsed.version.clone());

    if let Some(cached) = CACHE.read().expect("ruleset cache poisoned").get(&key) {
        return Arc::clone(cached)
            .downcast::<RulesetData<R>>()
            .map_err(|_| RulesetError::RuleTypeMismatch {
                name: parsed.name.clone(),
                version: parsed.version.clone(),
            });
    }

    let info = registry::find(&parsed.name, &parsed.version).ok_or_else(|| {
        RulesetError::NotFound {
            name: parsed.name.clone(),
            version: parsed.version.clone(),
        }
    })?;

    debug!(ruleset = %uri, "Loading bundled ruleset");

    let data: RulesetData<R> =
        serde_yaml::from_str(info.yaml).map_err(|e| RulesetError::Parse {
            name: parsed.name.clone(),
            version: parsed.version.clone(),
            reason: e.to_string(),
        })?;

    if data.name != parsed.name || data.version != parsed.version {
        return Err(RulesetError::IdentityMismatch {
            name: parsed.name,
            version: parsed.version,
            declared_name: data.name,
            declared_version: data.version,
        });
    }

    let ruleset = Arc::new(data);
    CACHE
        .write()
        .expect("ruleset cache poisoned")
        .insert(key, Arc::clone(&ruleset) as Arc<dyn Any + Send + Sync>);

    Ok(ruleset)
}
