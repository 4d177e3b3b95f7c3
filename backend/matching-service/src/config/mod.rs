use serde::Deserialize;

const ENV_PREFIX: &str = "MATCHING_";

#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub redis: RedisConfig,
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
    pub store: StoreBackend,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Knobs of the indices and the recommend pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    /// Namespace segment of every index key
    pub key_namespace: String,
    /// Matches must score strictly above this
    pub score_threshold: f64,
    /// TTL put on per-query scratch lists in case cleanup never runs
    pub scratch_ttl_secs: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            key_namespace: default_key_namespace(),
            score_threshold: default_score_threshold(),
            scratch_ttl_secs: default_scratch_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

/// Flat `MATCHING_*` environment as envy sees it
#[derive(Debug, Deserialize)]
struct EnvConfig {
    #[serde(default = "default_service_name")]
    service_name: String,
    #[serde(default)]
    store: StoreBackend,
    #[serde(default = "default_redis_url")]
    redis_url: String,
    #[serde(default = "default_key_namespace")]
    key_namespace: String,
    #[serde(default = "default_score_threshold")]
    score_threshold: f64,
    #[serde(default = "default_scratch_ttl_secs")]
    scratch_ttl_secs: u64,
}

fn default_service_name() -> String {
    "matching-service".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_namespace() -> String {
    "match".to_string()
}

fn default_score_threshold() -> f64 {
    0.01
}

fn default_scratch_ttl_secs() -> u64 {
    30
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        let env: EnvConfig = envy::prefixed(ENV_PREFIX).from_env()?;
        Self::from_parts(env)
    }

    /// Same as [`Config::from_env`] over an explicit variable set
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: EnvConfig = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        Self::from_parts(env)
    }

    fn from_parts(env: EnvConfig) -> Result<Self, envy::Error> {
        if !env.score_threshold.is_finite() || env.score_threshold < 0.0 {
            return Err(envy::Error::Custom(format!(
                "{}SCORE_THRESHOLD must be a finite non-negative number, got {}",
                ENV_PREFIX, env.score_threshold
            )));
        }
        if env.key_namespace.is_empty() {
            return Err(envy::Error::Custom(format!(
                "{}KEY_NAMESPACE must not be empty",
                ENV_PREFIX
            )));
        }

        Ok(Config {
            service: ServiceConfig {
                service_name: env.service_name,
                store: env.store,
            },
            redis: RedisConfig { url: env.redis_url },
            matching: MatchingConfig {
                key_namespace: env.key_namespace,
                score_threshold: env.score_threshold,
                scratch_ttl_secs: env.scratch_ttl_secs,
            },
        })
    }
}
