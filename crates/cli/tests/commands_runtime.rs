use std::env;
use std::sync::{Mutex, OnceLock};

use procura_cli::commands::{config, migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("PROCURA_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_reports_config_failure_for_non_sqlite_url() {
    with_env(&[("PROCURA_DATABASE_URL", "postgres://localhost/procura")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_lists_the_demo_catalog() {
    with_env(&[("PROCURA_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("  - 1: Cloud Object Storage - Capacity Pack (Storage, 1299.00)"));
        assert!(message.contains("  - 2: Analytics Workstation Instance (Compute, 1899.00)"));
        assert!(message.contains("  - 3: API Gateway Throughput Bundle (Integration, 450.00)"));
        assert!(message.contains("  - 4: Developer Productivity Toolkit (Tooling, 275.00)"));
    });
}

#[test]
fn seed_is_idempotent_against_a_file_database() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("procura.db").display());

    with_env(&[("PROCURA_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed success: {}", first.output);
        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed success: {}", second.output);

        assert_eq!(parse_payload(&first.output)["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn config_attributes_sources_and_redacts_secrets() {
    with_env(
        &[
            ("PROCURA_DATABASE_URL", "sqlite::memory:"),
            ("PROCURA_APPROVAL_ENABLED", "true"),
            ("PROCURA_APPROVAL_BASE_URL", "https://approvals.example.test"),
            ("PROCURA_APPROVAL_API_KEY", "super-secret-key"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0, "expected config output: {}", result.output);

            assert!(!result.output.contains("super-secret-key"));
            assert!(result
                .output
                .contains("- approval.api_key = <redacted> (source: env (PROCURA_APPROVAL_API_KEY))"));
            assert!(result.output.contains(
                "- database.url = sqlite::memory: (source: env (PROCURA_DATABASE_URL))"
            ));
            assert!(result.output.contains("- approval.bearer_token = <unset> (source: default)"));
            assert!(result.output.contains("- approval delegation: active"));
        },
    );
}

#[test]
fn config_reports_invalid_values_as_json_failure() {
    with_env(&[("PROCURA_APPROVAL_TIMEOUT_SECS", "0")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PROCURA_DATABASE_URL",
        "PROCURA_DATABASE_MAX_CONNECTIONS",
        "PROCURA_DATABASE_TIMEOUT_SECS",
        "PROCURA_SERVER_BIND_ADDRESS",
        "PROCURA_SERVER_PORT",
        "PROCURA_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PROCURA_APPROVAL_ENABLED",
        "PROCURA_APPROVAL_BASE_URL",
        "PROCURA_APPROVAL_ENDPOINT_PATH",
        "PROCURA_APPROVAL_API_KEY",
        "PROCURA_APPROVAL_BEARER_TOKEN",
        "PROCURA_APPROVAL_TIMEOUT_SECS",
        "PROCURA_LOGGING_LEVEL",
        "PROCURA_LOGGING_FORMAT",
        "PROCURA_LOG_LEVEL",
        "PROCURA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
