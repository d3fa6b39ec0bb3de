use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use procura_core::config::{AppConfig, LoadOptions};
use secrecy::SecretString;
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let fields = [
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["PROCURA_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["PROCURA_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["PROCURA_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["PROCURA_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["PROCURA_SERVER_PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["PROCURA_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "approval.enabled",
            value: config.approval.enabled.to_string(),
            env_keys: &["PROCURA_APPROVAL_ENABLED"],
        },
        Field {
            key: "approval.base_url",
            value: or_unset(&config.approval.base_url),
            env_keys: &["PROCURA_APPROVAL_BASE_URL"],
        },
        Field {
            key: "approval.endpoint_path",
            value: config.approval.endpoint_path.clone(),
            env_keys: &["PROCURA_APPROVAL_ENDPOINT_PATH"],
        },
        Field {
            key: "approval.api_key",
            value: redact_secret(config.approval.api_key.as_ref()),
            env_keys: &["PROCURA_APPROVAL_API_KEY"],
        },
        Field {
            key: "approval.bearer_token",
            value: redact_secret(config.approval.bearer_token.as_ref()),
            env_keys: &["PROCURA_APPROVAL_BEARER_TOKEN"],
        },
        Field {
            key: "approval.timeout_secs",
            value: config.approval.timeout_secs.to_string(),
            env_keys: &["PROCURA_APPROVAL_TIMEOUT_SECS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["PROCURA_LOGGING_LEVEL", "PROCURA_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
            env_keys: &["PROCURA_LOGGING_FORMAT", "PROCURA_LOG_FORMAT"],
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        fields
            .into_iter()
            .map(|field| render_line(field.key, &field.value, source(field.key, field.env_keys))),
    );
    lines.push(format!(
        "- approval delegation: {}",
        if config.approval.is_active() { "active" } else { "inactive" }
    ));

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("procura.toml"), PathBuf::from("config/procura.toml")]
        .into_iter()
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

fn redact_secret(secret: Option<&SecretString>) -> String {
    let shown = if secret.is_some() { "<redacted>" } else { "<unset>" };
    shown.to_string()
}

fn or_unset(value: &str) -> String {
    if value.trim().is_empty() {
        "<unset>".to_string()
    } else {
        value.to_string()
    }
}
