use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use wedmatch_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE};

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.to_string(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    let recommendations = &config.recommendations;
    let weights = &recommendations.weights;
    vec![
        Field::new("database.url", &config.database.url, &["WEDMATCH_DATABASE_URL"]),
        Field::new(
            "database.max_connections",
            config.database.max_connections,
            &["WEDMATCH_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs,
            &["WEDMATCH_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["WEDMATCH_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port, &["WEDMATCH_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs,
            &["WEDMATCH_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "recommendations.weights",
            format!(
                "budget={} style={} location={} rating={} availability={} popularity={}",
                weights.budget,
                weights.style,
                weights.location,
                weights.rating,
                weights.availability,
                weights.popularity
            ),
            &[],
        ),
        Field::new("recommendations.strong_threshold", recommendations.strong_threshold, &[]),
        Field::new("recommendations.weak_threshold", recommendations.weak_threshold, &[]),
        Field::new(
            "recommendations.location_radius_km",
            recommendations.location_radius_km,
            &["WEDMATCH_RECOMMENDATIONS_LOCATION_RADIUS_KM"],
        ),
        Field::new(
            "recommendations.cache_ttl_secs",
            recommendations.cache_ttl_secs,
            &["WEDMATCH_RECOMMENDATIONS_CACHE_TTL_SECS"],
        ),
        Field::new(
            "recommendations.default_limit",
            recommendations.default_limit,
            &["WEDMATCH_RECOMMENDATIONS_DEFAULT_LIMIT"],
        ),
        Field::new(
            "recommendations.max_limit",
            recommendations.max_limit,
            &["WEDMATCH_RECOMMENDATIONS_MAX_LIMIT"],
        ),
        Field::new(
            "recommendations.max_candidates",
            recommendations.max_candidates,
            &["WEDMATCH_RECOMMENDATIONS_MAX_CANDIDATES"],
        ),
        Field::new(
            "recommendations.retry_backoff_ms",
            recommendations.retry_backoff_ms,
            &["WEDMATCH_RECOMMENDATIONS_RETRY_BACKOFF_MS"],
        ),
        Field::new(
            "recommendations.dedupe_consecutive_interest",
            recommendations.dedupe_consecutive_interest,
            &["WEDMATCH_RECOMMENDATIONS_DEDUPE_CONSECUTIVE_INTEREST"],
        ),
        Field::new("cache.backend", config.cache.backend.as_str(), &["WEDMATCH_CACHE_BACKEND"]),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["WEDMATCH_LOGGING_LEVEL", "WEDMATCH_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["WEDMATCH_LOGGING_FORMAT", "WEDMATCH_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
