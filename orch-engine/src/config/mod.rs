use std::time::Duration;

/// Engine-wide configuration, sourced entirely from environment variables
/// per the external-interfaces contract. There is no config file: the
/// engine is a library, and callers own whatever configuration surface
/// they expose to their own users.
#[derive(Debug, Clone)]
pub struct Config {
    pub terraform_service_url: String,
    pub kubernetes_service_url: String,
    pub helm_service_url: String,
    pub generator_service_url: String,
    pub fs_service_url: String,
    pub state_service_url: String,
    pub rollback_backup_dir: std::path::PathBuf,
    /// 0 disables the token-budget safety check.
    pub max_tokens_per_task: u64,
    pub adapter_health_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            terraform_service_url: "http://localhost:8081".to_string(),
            kubernetes_service_url: "http://localhost:8082".to_string(),
            helm_service_url: "http://localhost:8083".to_string(),
            generator_service_url: "http://localhost:8084".to_string(),
            fs_service_url: "http://localhost:8085".to_string(),
            state_service_url: "http://localhost:8086".to_string(),
            rollback_backup_dir: std::env::temp_dir().join("orch-engine").join("rollback-backups"),
            max_tokens_per_task: 0,
            adapter_health_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            terraform_service_url: std::env::var("TERRAFORM_SERVICE_URL")
                .unwrap_or(defaults.terraform_service_url),
            kubernetes_service_url: std::env::var("KUBERNETES_SERVICE_URL")
                .unwrap_or(defaults.kubernetes_service_url),
            helm_service_url: std::env::var("HELM_SERVICE_URL").unwrap_or(defaults.helm_service_url),
            generator_service_url: std::env::var("GENERATOR_SERVICE_URL")
                .unwrap_or(defaults.generator_service_url),
            fs_service_url: std::env::var("FS_SERVICE_URL").unwrap_or(defaults.fs_service_url),
            state_service_url: std::env::var("STATE_SERVICE_URL")
                .unwrap_or(defaults.state_service_url),
            rollback_backup_dir: std::env::var("ROLLBACK_BACKUP_DIR")
                .map(std::path::PathBuf::from)
                .unwrap_or(defaults.rollback_backup_dir),
            max_tokens_per_task: std::env::var("MAX_TOKENS_PER_TASK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            adapter_health_timeout: defaults.adapter_health_timeout,
        }
    }
}

/// Initializes the process-wide `tracing` subscriber from `RUST_LOG`,
/// defaulting to `info`. Mirrors the bootstrap every m87 binary performs
/// before doing anything else; safe to call more than once (later calls
/// are no-ops).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_token_budget() {
        let cfg = Config::default();
        assert_eq!(cfg.max_tokens_per_task, 0);
    }

    #[test]
    fn env_override_wins() {
        std::env::set_var("MAX_TOKENS_PER_TASK", "1000");
        let cfg = Config::from_env();
        assert_eq!(cfg.max_tokens_per_task, 1000);
        std::env::remove_var("MAX_TOKENS_PER_TASK");
    }
}
