use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use shipflow_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use toml::Value;

struct Field {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
    overridden: bool,
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in fields(&config, &options.overrides) {
        let source = field_source(&field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key_path, field.value));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig, overrides: &ConfigOverrides) -> Vec<Field> {
    let format = match config.logging.format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    };

    vec![
        Field {
            key_path: "database.url",
            value: config.database.url.clone(),
            env_keys: &["SHIPFLOW_DATABASE_URL"],
            overridden: overrides.database_url.is_some(),
        },
        Field {
            key_path: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["SHIPFLOW_DATABASE_MAX_CONNECTIONS"],
            overridden: false,
        },
        Field {
            key_path: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["SHIPFLOW_DATABASE_TIMEOUT_SECS"],
            overridden: false,
        },
        Field {
            key_path: "drafts.session_key",
            value: config.drafts.session_key.clone(),
            env_keys: &["SHIPFLOW_DRAFTS_SESSION_KEY"],
            overridden: overrides.drafts_session_key.is_some(),
        },
        Field {
            key_path: "drafts.staleness_secs",
            value: config.drafts.staleness_secs.to_string(),
            env_keys: &["SHIPFLOW_DRAFTS_STALENESS_SECS"],
            overridden: overrides.drafts_staleness_secs.is_some(),
        },
        Field {
            key_path: "drafts.fallback_enabled",
            value: config.drafts.fallback_enabled.to_string(),
            env_keys: &["SHIPFLOW_DRAFTS_FALLBACK_ENABLED"],
            overridden: overrides.drafts_fallback_enabled.is_some(),
        },
        Field {
            key_path: "drafts.fallback_quota_bytes",
            value: config.drafts.fallback_quota_bytes.to_string(),
            env_keys: &["SHIPFLOW_DRAFTS_FALLBACK_QUOTA_BYTES"],
            overridden: false,
        },
        Field {
            key_path: "auth.grace_secs",
            value: config.auth.grace_secs.to_string(),
            env_keys: &["SHIPFLOW_AUTH_GRACE_SECS"],
            overridden: overrides.auth_grace_secs.is_some(),
        },
        Field {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["SHIPFLOW_LOGGING_LEVEL", "SHIPFLOW_LOG_LEVEL"],
            overridden: overrides.log_level.is_some(),
        },
        Field {
            key_path: "logging.format",
            value: format.to_string(),
            env_keys: &["SHIPFLOW_LOGGING_FORMAT", "SHIPFLOW_LOG_FORMAT"],
            overridden: overrides.log_format.is_some(),
        },
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("shipflow.toml"), PathBuf::from("config/shipflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if field.overridden {
        return "flag".to_string();
    }

    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, field.key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
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
