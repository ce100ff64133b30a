use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recommendations::{
    EngineSettings, PriceBand, ScoringPolicy, ScoringWeights, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_LIMIT, DEFAULT_LOCATION_RADIUS_KM, DEFAULT_PRICE_BANDS, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_WEIGHTS, MAX_CANDIDATES, MAX_LIMIT, STRONG_THRESHOLD, UNREVIEWED_RATING_SCORE,
    WEAK_THRESHOLD,
};

pub const DEFAULT_CONFIG_FILE: &str = "wedmatch.toml";
pub const NESTED_CONFIG_FILE: &str = "config/wedmatch.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub recommendations: RecommendationsConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RecommendationsConfig {
    pub weights: ScoringWeights,
    /// Dollar bands for price tiers 1 through 4.
    pub price_bands: Vec<PriceBand>,
    pub strong_threshold: f64,
    pub weak_threshold: f64,
    pub unreviewed_rating_score: f64,
    pub location_radius_km: f64,
    pub cache_ttl_secs: u64,
    pub default_limit: usize,
    pub max_limit: usize,
    pub max_candidates: usize,
    pub retry_backoff_ms: u64,
    pub dedupe_consecutive_interest: bool,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub backend: CacheBackend,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Where computed recommendations are memoized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Shared by every process using the same database.
    Sqlite,
    /// Local to one process.
    Memory,
    Disabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub cache_backend: Option<CacheBackend>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://wedmatch.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            recommendations: RecommendationsConfig::default(),
            cache: CacheConfig { backend: CacheBackend::Sqlite },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for RecommendationsConfig {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            price_bands: DEFAULT_PRICE_BANDS.to_vec(),
            strong_threshold: STRONG_THRESHOLD,
            weak_threshold: WEAK_THRESHOLD,
            unreviewed_rating_score: UNREVIEWED_RATING_SCORE,
            location_radius_km: DEFAULT_LOCATION_RADIUS_KM,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            max_candidates: MAX_CANDIDATES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            dedupe_consecutive_interest: false,
        }
    }
}

impl RecommendationsConfig {
    pub fn scoring_policy(&self) -> ScoringPolicy {
        let price_bands =
            <[PriceBand; 4]>::try_from(self.price_bands.as_slice()).unwrap_or(DEFAULT_PRICE_BANDS);
        ScoringPolicy {
            weights: self.weights,
            price_bands,
            strong_threshold: self.strong_threshold,
            weak_threshold: self.weak_threshold,
            unreviewed_rating_score: self.unreviewed_rating_score,
            location_radius_km: self.location_radius_km,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            policy: self.scoring_policy(),
            default_limit: self.default_limit,
            max_limit: self.max_limit,
            max_candidates: self.max_candidates,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            dedupe_consecutive_interest: self.dedupe_consecutive_interest,
        }
    }
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
            Self::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            "disabled" | "none" => Ok(Self::Disabled),
            other => Err(ConfigError::Validation(format!(
                "unsupported cache backend `{other}` (expected sqlite|memory|disabled)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn bind_target(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(recommendations) = patch.recommendations {
            self.recommendations.apply_patch(recommendations);
        }

        if let Some(cache) = patch.cache {
            if let Some(backend) = cache.backend {
                self.cache.backend = backend;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("WEDMATCH_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("WEDMATCH_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("WEDMATCH_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("WEDMATCH_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("WEDMATCH_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("WEDMATCH_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("WEDMATCH_SERVER_PORT") {
            self.server.port = parse_env("WEDMATCH_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("WEDMATCH_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("WEDMATCH_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let recommendations = &mut self.recommendations;
        if let Some(value) = read_env("WEDMATCH_RECOMMENDATIONS_CACHE_TTL_SECS") {
            recommendations.cache_ttl_secs =
                parse_env("WEDMATCH_RECOMMENDATIONS_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("WEDMATCH_RECOMMENDATIONS_DEFAULT_LIMIT") {
            recommendations.default_limit =
                parse_env("WEDMATCH_RECOMMENDATIONS_DEFAULT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("WEDMATCH_RECOMMENDATIONS_MAX_LIMIT") {
            recommendations.max_limit = parse_env("WEDMATCH_RECOMMENDATIONS_MAX_LIMIT", &value)?;
        }
        if let Some(value) = read_env("WEDMATCH_RECOMMENDATIONS_MAX_CANDIDATES") {
            recommendations.max_candidates =
                parse_env("WEDMATCH_RECOMMENDATIONS_MAX_CANDIDATES", &value)?;
        }
        if let Some(value) = read_env("WEDMATCH_RECOMMENDATIONS_RETRY_BACKOFF_MS") {
            recommendations.retry_backoff_ms =
                parse_env("WEDMATCH_RECOMMENDATIONS_RETRY_BACKOFF_MS", &value)?;
        }
        if let Some(value) = read_env("WEDMATCH_RECOMMENDATIONS_DEDUPE_CONSECUTIVE_INTEREST") {
            recommendations.dedupe_consecutive_interest =
                parse_env("WEDMATCH_RECOMMENDATIONS_DEDUPE_CONSECUTIVE_INTEREST", &value)?;
        }
        if let Some(value) = read_env("WEDMATCH_RECOMMENDATIONS_LOCATION_RADIUS_KM") {
            recommendations.location_radius_km =
                parse_env("WEDMATCH_RECOMMENDATIONS_LOCATION_RADIUS_KM", &value)?;
        }

        if let Some(value) = read_env("WEDMATCH_CACHE_BACKEND") {
            self.cache.backend = value.parse()?;
        }

        let log_level =
            read_env("WEDMATCH_LOGGING_LEVEL").or_else(|| read_env("WEDMATCH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("WEDMATCH_LOGGING_FORMAT").or_else(|| read_env("WEDMATCH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(cache_backend) = overrides.cache_backend {
            self.cache.backend = cache_backend;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_recommendations(&self.recommendations)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl RecommendationsConfig {
    fn apply_patch(&mut self, patch: RecommendationsPatch) {
        if let Some(weights) = patch.weights {
            let current = &mut self.weights;
            current.budget = weights.budget.unwrap_or(current.budget);
            current.style = weights.style.unwrap_or(current.style);
            current.location = weights.location.unwrap_or(current.location);
            current.rating = weights.rating.unwrap_or(current.rating);
            current.availability = weights.availability.unwrap_or(current.availability);
            current.popularity = weights.popularity.unwrap_or(current.popularity);
        }
        if let Some(price_bands) = patch.price_bands {
            self.price_bands = price_bands
                .into_iter()
                .map(|band| PriceBand { low: band.low, typical: band.typical, high: band.high })
                .collect();
        }
        if let Some(value) = patch.strong_threshold {
            self.strong_threshold = value;
        }
        if let Some(value) = patch.weak_threshold {
            self.weak_threshold = value;
        }
        if let Some(value) = patch.unreviewed_rating_score {
            self.unreviewed_rating_score = value;
        }
        if let Some(value) = patch.location_radius_km {
            self.location_radius_km = value;
        }
        if let Some(value) = patch.cache_ttl_secs {
            self.cache_ttl_secs = value;
        }
        if let Some(value) = patch.default_limit {
            self.default_limit = value;
        }
        if let Some(value) = patch.max_limit {
            self.max_limit = value;
        }
        if let Some(value) = patch.max_candidates {
            self.max_candidates = value;
        }
        if let Some(value) = patch.retry_backoff_ms {
            self.retry_backoff_ms = value;
        }
        if let Some(value) = patch.dedupe_consecutive_interest {
            self.dedupe_consecutive_interest = value;
        }
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommendations(recommendations: &RecommendationsConfig) -> Result<(), ConfigError> {
    if recommendations.price_bands.len() != 4 {
        return Err(ConfigError::Validation(format!(
            "recommendations.price_bands must list exactly 4 tiers, got {}",
            recommendations.price_bands.len()
        )));
    }

    recommendations
        .scoring_policy()
        .validate()
        .map_err(|error| ConfigError::Validation(format!("recommendations: {error}")))?;

    if recommendations.default_limit == 0 || recommendations.max_limit == 0 {
        return Err(ConfigError::Validation(
            "recommendations.default_limit and max_limit must be greater than zero".to_string(),
        ));
    }
    if recommendations.default_limit > recommendations.max_limit {
        return Err(ConfigError::Validation(
            "recommendations.default_limit must not exceed max_limit".to_string(),
        ));
    }
    if recommendations.max_candidates < recommendations.max_limit {
        return Err(ConfigError::Validation(
            "recommendations.max_candidates must be at least max_limit".to_string(),
        ));
    }
    if recommendations.cache_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "recommendations.cache_ttl_secs must be greater than zero".to_string(),
        ));
    }
    if recommendations.retry_backoff_ms > 10_000 {
        return Err(ConfigError::Validation(
            "recommendations.retry_backoff_ms must be at most 10000".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    recommendations: Option<RecommendationsPatch>,
    cache: Option<CachePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationsPatch {
    weights: Option<WeightsPatch>,
    price_bands: Option<Vec<PriceBandPatch>>,
    strong_threshold: Option<f64>,
    weak_threshold: Option<f64>,
    unreviewed_rating_score: Option<f64>,
    location_radius_km: Option<f64>,
    cache_ttl_secs: Option<u64>,
    default_limit: Option<usize>,
    max_limit: Option<usize>,
    max_candidates: Option<usize>,
    retry_backoff_ms: Option<u64>,
    dedupe_consecutive_interest: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct WeightsPatch {
    budget: Option<f64>,
    style: Option<f64>,
    location: Option<f64>,
    rating: Option<f64>,
    availability: Option<f64>,
    popularity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PriceBandPatch {
    low: f64,
    typical: f64,
    high: f64,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    backend: Option<CacheBackend>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    use tempfile::TempDir;

    use super::{AppConfig, CacheBackend, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn write_config(dir: &TempDir, body: &str) -> Result<std::path::PathBuf, String> {
        let path = dir.path().join("wedmatch.toml");
        fs::write(&path, body).map_err(|err| err.to_string())?;
        Ok(path)
    }

    #[test]
    fn defaults_match_documented_scoring_policy() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        let settings = config.recommendations.engine_settings();

        ensure(settings.default_limit == 10, "default limit should be 10")?;
        ensure(settings.cache_ttl == Duration::from_secs(3_600), "ttl should be one hour")?;
        ensure(settings.retry_backoff == Duration::from_millis(150), "backoff should be 150ms")?;
        ensure(!settings.dedupe_consecutive_interest, "duplicates are appended by default")?;
        ensure(config.cache.backend == CacheBackend::Sqlite, "sqlite cache by default")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_WEDMATCH_DB_FILE", "from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[database]
url = "sqlite://${TEST_WEDMATCH_DB_FILE}"
"#,
            )?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-env.db",
                "database url should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_WEDMATCH_DB_FILE"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WEDMATCH_LOG_LEVEL", "warn");
        env::set_var("WEDMATCH_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )
        })();

        clear_vars(&["WEDMATCH_LOG_LEVEL", "WEDMATCH_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WEDMATCH_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("WEDMATCH_RECOMMENDATIONS_CACHE_TTL_SECS", "600");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[database]
url = "sqlite://from-file.db"

[recommendations]
cache_ttl_secs = 120
max_limit = 25

[cache]
backend = "memory"

[logging]
level = "warn"
"#,
            )?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.recommendations.cache_ttl_secs == 600,
                "env ttl should win over file and defaults",
            )?;
            ensure(config.recommendations.max_limit == 25, "file max_limit should apply")?;
            ensure(config.cache.backend == CacheBackend::Memory, "file cache backend should apply")
        })();

        clear_vars(&["WEDMATCH_DATABASE_URL", "WEDMATCH_RECOMMENDATIONS_CACHE_TTL_SECS"]);
        result
    }

    #[test]
    fn custom_weights_and_price_bands_flow_into_scoring_policy() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[recommendations.weights]
budget = 0.30
style = 0.15

[[recommendations.price_bands]]
low = 400.0
typical = 800.0
high = 1200.0

[[recommendations.price_bands]]
low = 1500.0
typical = 2500.0
high = 3500.0

[[recommendations.price_bands]]
low = 3500.0
typical = 5000.0
high = 6500.0

[[recommendations.price_bands]]
low = 6500.0
typical = 9000.0
high = 15000.0
"#,
        )?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;
        let policy = config.recommendations.scoring_policy();

        ensure((policy.weights.budget - 0.30).abs() < 1e-9, "budget weight from file")?;
        ensure((policy.weights.style - 0.15).abs() < 1e-9, "style weight from file")?;
        ensure((policy.price_bands[3].typical - 9000.0).abs() < 1e-9, "tier 4 band from file")
    }

    #[test]
    fn weights_that_do_not_sum_to_one_fail_fast() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[recommendations.weights]
budget = 0.90
"#,
        )?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("sum to 1.0")
        );
        ensure(has_message, "validation failure should mention the weight sum")
    }

    #[test]
    fn price_band_table_must_cover_four_tiers() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[[recommendations.price_bands]]
low = 1.0
typical = 2.0
high = 3.0
"#,
        )?;

        let result =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        let has_message = matches!(
            result,
            Err(ConfigError::Validation(ref message)) if message.contains("exactly 4 tiers")
        );
        ensure(has_message, "validation failure should mention the tier count")
    }

    #[test]
    fn invalid_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WEDMATCH_SERVER_PORT", "not-a-port");
        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["WEDMATCH_SERVER_PORT"]);

        let has_key = matches!(
            result,
            Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "WEDMATCH_SERVER_PORT"
        );
        ensure(has_key, "invalid port should name the offending variable")
    }

    #[test]
    fn missing_required_file_is_an_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let result = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..LoadOptions::default()
        });
        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "missing required file should be reported",
        )
    }
}
