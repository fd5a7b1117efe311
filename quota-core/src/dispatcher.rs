use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::algorithms::{LimitInfo, RateLimitAlgorithm};
use crate::error::{Error, Result};

/// Name -> algorithm lookup table (spec §4.5). Chooses the algorithm for
/// a request (explicit parameter beats the configured default), invokes
/// `decide`, and logs the outcome with cardinality-bounded labels.
pub struct Dispatcher {
    algorithms: HashMap<String, Arc<dyn RateLimitAlgorithm>>,
    default: String,
}

impl Dispatcher {
    pub fn new(
        algorithms: Vec<Arc<dyn RateLimitAlgorithm>>,
        default: impl Into<String>,
    ) -> Result<Self> {
        let default = default.into();
        let map: HashMap<String, Arc<dyn RateLimitAlgorithm>> = algorithms
            .into_iter()
            .map(|a| (a.name().to_string(), a))
            .collect();

        if !map.contains_key(&default) {
            return Err(Error::ConfigInvalid(format!(
                "default algorithm '{default}' is not one of the registered algorithms"
            )));
        }

        Ok(Self {
            algorithms: map,
            default,
        })
    }

    /// `resource`'s first dotted segment, used as a low-cardinality
    /// telemetry label (spec §4.5).
    fn resource_prefix(resource: &str) -> &str {
        resource.split('.').next().unwrap_or(resource)
    }

    /// Routes `key` to the named algorithm (or the configured default),
    /// invokes `decide`, and records outcome telemetry tagged with the
    /// algorithm name and `resource`'s dotted prefix.
    pub async fn decide(
        &self,
        key: &str,
        resource: &str,
        algorithm: Option<&str>,
        n: u64,
    ) -> Result<(bool, LimitInfo)> {
        let name = algorithm.unwrap_or(&self.default);
        let algo = self.algorithms.get(name).ok_or_else(|| {
            Error::BadRequest(format!("unknown algorithm '{name}'"))
        })?;

        let prefix = Self::resource_prefix(resource);
        match algo.decide(key, n).await {
            Ok((allowed, info)) => {
                info!(algorithm = name, resource_prefix = prefix, allowed, "rate limit decision");
                Ok((allowed, info))
            }
            Err(e) => {
                warn!(algorithm = name, resource_prefix = prefix, error = %e, "rate limit decision failed");
                Err(e)
            }
        }
    }

    /// `get_status` is `decide` with `n=0` (spec §9 open question).
    pub async fn status(
        &self,
        key: &str,
        resource: &str,
        algorithm: Option<&str>,
    ) -> Result<LimitInfo> {
        let (_, info) = self.decide(key, resource, algorithm, 0).await?;
        Ok(info)
    }

    pub async fn reset(&self, key: &str, algorithm: Option<&str>) -> Result<()> {
        let name = algorithm.unwrap_or(&self.default);
        let algo = self.algorithms.get(name).ok_or_else(|| {
            Error::BadRequest(format!("unknown algorithm '{name}'"))
        })?;
        algo.reset(key).await
    }

    pub fn default_algorithm(&self) -> &str {
        &self.default
    }
}
