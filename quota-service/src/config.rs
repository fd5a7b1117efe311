use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use quota_core::LimitConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Local,
    Shared,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: Option<String>,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlgorithmConfig {
    pub default: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitTierConfig {
    pub limit: u64,
    pub window_seconds: u64,
    #[serde(default)]
    pub burst: u64,
}

impl LimitTierConfig {
    pub fn to_limit_config(&self) -> anyhow::Result<LimitConfig> {
        Ok(LimitConfig::new(
            self.limit,
            Duration::from_secs(self.window_seconds),
            self.burst,
        )?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub default: LimitTierConfig,
    #[serde(default)]
    pub tiers: HashMap<String, LimitTierConfig>,
}

impl LimitsConfig {
    /// Looks up a named tier, falling back to `default` (spec §6 "limits
    /// (default + named tiers)").
    pub fn resolve(&self, tier: Option<&str>) -> &LimitTierConfig {
        tier.and_then(|t| self.tiers.get(t)).unwrap_or(&self.default)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub algorithm: AlgorithmConfig,
    pub limits: LimitsConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Layers, lowest to highest precedence: hard-coded defaults, an
    /// optional YAML file, `QUOTA__`-prefixed environment variables
    /// (spec §6 "Configuration file... Defaults MUST apply when fields
    /// are absent").
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("store.backend", "local")?
            .set_default("store.ttl_seconds", 86_400)?
            .set_default("algorithm.default", "token_bucket")?
            .set_default("limits.default.limit", 100)?
            .set_default("limits.default.window_seconds", 60)?
            .set_default("limits.default.burst", 0)?
            .set_default("observability.log_level", "info")?
            .set_default("observability.log_format", "pretty")?;

        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder.add_source(config::File::with_name("config/default").required(false)),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("QUOTA")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let app: AppConfig = cfg.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.limits.default.to_limit_config()?;
        for tier in self.limits.tiers.values() {
            tier.to_limit_config()?;
        }
        if self.store.backend == StoreBackend::Shared && self.store.redis_url.is_none() {
            anyhow::bail!("store.backend = shared requires store.redis_url");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_with_no_file_or_env() {
        // Loading with a nonexistent path falls back to defaults only.
        let app = AppConfig::load(Some("config/does-not-exist")).unwrap_err();
        // A missing explicit path is a hard error (vs. the implicit
        // `config/default` lookup, which is optional); this asserts we
        // didn't silently succeed with garbage.
        assert!(app.to_string().contains("does-not-exist") || app.to_string().contains("not found"));
    }

    #[test]
    fn resolves_named_tier_over_default() {
        let mut tiers = HashMap::new();
        tiers.insert(
            "premium".to_string(),
            LimitTierConfig {
                limit: 1000,
                window_seconds: 60,
                burst: 0,
            },
        );
        let limits = LimitsConfig {
            default: LimitTierConfig {
                limit: 10,
                window_seconds: 60,
                burst: 0,
            },
            tiers,
        };
        assert_eq!(limits.resolve(Some("premium")).limit, 1000);
        assert_eq!(limits.resolve(Some("unknown")).limit, 10);
        assert_eq!(limits.resolve(None).limit, 10);
    }
}
