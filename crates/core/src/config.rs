use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SESSION_KEY: &str = "shipflow.workflow_draft";
pub const DEFAULT_STALENESS_SECS: u64 = 3_600;
pub const MAX_GRACE_SECS: i64 = 3_600;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub drafts: DraftConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftConfig {
    pub session_key: String,
    pub staleness_secs: u64,
    pub fallback_enabled: bool,
    pub fallback_quota_bytes: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    pub grace_secs: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub log_format: Option<LogFormat>,
    pub drafts_session_key: Option<String>,
    pub drafts_staleness_secs: Option<u64>,
    pub drafts_fallback_enabled: Option<bool>,
    pub auth_grace_secs: Option<i64>,
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
                url: "sqlite://shipflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            drafts: DraftConfig {
                session_key: DEFAULT_SESSION_KEY.to_string(),
                staleness_secs: DEFAULT_STALENESS_SECS,
                fallback_enabled: true,
                fallback_quota_bytes: 5 * 1024 * 1024,
            },
            auth: AuthConfig { grace_secs: 60 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("shipflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
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

        if let Some(drafts) = patch.drafts {
            if let Some(session_key) = drafts.session_key {
                self.drafts.session_key = session_key;
            }
            if let Some(staleness_secs) = drafts.staleness_secs {
                self.drafts.staleness_secs = staleness_secs;
            }
            if let Some(fallback_enabled) = drafts.fallback_enabled {
                self.drafts.fallback_enabled = fallback_enabled;
            }
            if let Some(fallback_quota_bytes) = drafts.fallback_quota_bytes {
                self.drafts.fallback_quota_bytes = fallback_quota_bytes;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(grace_secs) = auth.grace_secs {
                self.auth.grace_secs = grace_secs;
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
        if let Some(value) = read_env("SHIPFLOW_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SHIPFLOW_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_value("SHIPFLOW_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SHIPFLOW_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_value("SHIPFLOW_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SHIPFLOW_DRAFTS_SESSION_KEY") {
            self.drafts.session_key = value;
        }
        if let Some(value) = read_env("SHIPFLOW_DRAFTS_STALENESS_SECS") {
            self.drafts.staleness_secs = parse_value("SHIPFLOW_DRAFTS_STALENESS_SECS", &value)?;
        }
        if let Some(value) = read_env("SHIPFLOW_DRAFTS_FALLBACK_ENABLED") {
            self.drafts.fallback_enabled =
                parse_value("SHIPFLOW_DRAFTS_FALLBACK_ENABLED", &value)?;
        }
        if let Some(value) = read_env("SHIPFLOW_DRAFTS_FALLBACK_QUOTA_BYTES") {
            self.drafts.fallback_quota_bytes =
                parse_value("SHIPFLOW_DRAFTS_FALLBACK_QUOTA_BYTES", &value)?;
        }

        if let Some(value) = read_env("SHIPFLOW_AUTH_GRACE_SECS") {
            self.auth.grace_secs = parse_value("SHIPFLOW_AUTH_GRACE_SECS", &value)?;
        }

        let log_level =
            read_env("SHIPFLOW_LOGGING_LEVEL").or_else(|| read_env("SHIPFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SHIPFLOW_LOGGING_FORMAT").or_else(|| read_env("SHIPFLOW_LOG_FORMAT"));
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
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(session_key) = overrides.drafts_session_key {
            self.drafts.session_key = session_key;
        }
        if let Some(staleness_secs) = overrides.drafts_staleness_secs {
            self.drafts.staleness_secs = staleness_secs;
        }
        if let Some(fallback_enabled) = overrides.drafts_fallback_enabled {
            self.drafts.fallback_enabled = fallback_enabled;
        }
        if let Some(grace_secs) = overrides.auth_grace_secs {
            self.auth.grace_secs = grace_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_drafts(&self.drafts)?;
        validate_auth(&self.auth)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("shipflow.toml"), PathBuf::from("config/shipflow.toml")]
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

fn validate_drafts(drafts: &DraftConfig) -> Result<(), ConfigError> {
    if drafts.session_key.trim().is_empty() {
        return Err(ConfigError::Validation("drafts.session_key must not be empty".to_string()));
    }

    if drafts.staleness_secs == 0 || drafts.staleness_secs > 86_400 {
        return Err(ConfigError::Validation(
            "drafts.staleness_secs must be in range 1..=86400".to_string(),
        ));
    }

    if drafts.fallback_enabled && drafts.fallback_quota_bytes == 0 {
        return Err(ConfigError::Validation(
            "drafts.fallback_quota_bytes must be greater than zero when fallback is enabled"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    if !(0..=MAX_GRACE_SECS).contains(&auth.grace_secs) {
        return Err(ConfigError::Validation(format!(
            "auth.grace_secs must be in range 0..={MAX_GRACE_SECS}"
        )));
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

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    drafts: Option<DraftPatch>,
    auth: Option<AuthPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DraftPatch {
    session_key: Option<String>,
    staleness_secs: Option<u64>,
    fallback_enabled: Option<bool>,
    fallback_quota_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    grace_secs: Option<i64>,
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

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

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

    #[test]
    fn defaults_validate_and_match_documented_horizon() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.drafts.staleness_secs == 3_600, "default staleness horizon is one hour")?;
        ensure(
            config.drafts.session_key == "shipflow.workflow_draft",
            "default session key should be stable",
        )?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "default format is compact")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SHIPFLOW_DB_PATH", "from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("shipflow.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://${TEST_SHIPFLOW_DB_PATH}"

[drafts]
staleness_secs = 600
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-env.db",
                "database url should be interpolated from environment",
            )?;
            ensure(config.drafts.staleness_secs == 600, "file staleness should apply")?;
            Ok(())
        })();

        clear_vars(&["TEST_SHIPFLOW_DB_PATH"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHIPFLOW_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("SHIPFLOW_AUTH_GRACE_SECS", "90");
        env::set_var("SHIPFLOW_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("shipflow.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[auth]
grace_secs = 30

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

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
            ensure(config.auth.grace_secs == 90, "env grace should win over file")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env alias",
            )?;
            Ok(())
        })();

        clear_vars(&["SHIPFLOW_DATABASE_URL", "SHIPFLOW_AUTH_GRACE_SECS", "SHIPFLOW_LOG_FORMAT"]);
        result
    }

    #[test]
    fn invalid_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SHIPFLOW_DRAFTS_STALENESS_SECS", "an hour");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override to fail".to_string()),
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "SHIPFLOW_DRAFTS_STALENESS_SECS", "error should name the variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(&["SHIPFLOW_DRAFTS_STALENESS_SECS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://nope".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure".to_string()),
            Err(error) => error,
        };
        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("database.url")
        );
        ensure(has_message, "validation failure should mention database.url")
    }

    #[test]
    fn zero_staleness_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                drafts_staleness_secs: Some(0),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        let names_field = matches!(
            result,
            Err(ConfigError::Validation(ref message)) if message.contains("drafts.staleness_secs")
        );
        ensure(names_field, "zero staleness should fail validation")
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let missing = dir.path().join("absent.toml");
        let result = AppConfig::load(LoadOptions {
            config_path: Some(missing.clone()),
            require_file: true,
            ..LoadOptions::default()
        });
        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(ref path)) if *path == missing),
            "missing required file should be reported with its path",
        )
    }
}
