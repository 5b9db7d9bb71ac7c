//! Configuration for Gatehouse
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::interaction::routing::{ensure_trailing_slash, join_url};

/// Upper bound for every configured lifetime and interval (one year)
pub const MAX_LIFETIME_MINUTES: u64 = 365 * 24 * 60;

/// Gatehouse - account and identity server for personal data pods
#[derive(Parser, Debug, Clone)]
#[command(name = "gatehouse")]
#[command(about = "Account, identity and access-control server for personal data pods")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Public base URL of the server; pods and account URLs live under it
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:3000/")]
    pub base_url: String,

    /// Path of the account API relative to the base URL
    #[arg(long, env = "ACCOUNT_PATH", default_value = ".account/")]
    pub account_path: String,

    /// Name of the session cookie
    #[arg(long, env = "COOKIE_NAME", default_value = "gatehouse-account")]
    pub cookie_name: String,

    /// Session cookie lifetime in minutes, refreshed on every use
    #[arg(long, env = "COOKIE_TTL_MINUTES", default_value = "20160")]
    pub cookie_ttl_minutes: u64,

    /// Lifetime of password reset links in minutes
    #[arg(long, env = "FORGOT_PASSWORD_MINUTES", default_value = "15")]
    pub forgot_password_minutes: u64,

    /// Allow creating a pod at the base URL itself
    #[arg(long, env = "ALLOW_ROOT_POD", default_value = "false")]
    pub allow_root_pod: bool,

    /// Path of the generated WebID relative to a new pod
    #[arg(long, env = "WEB_ID_SUFFIX", default_value = "profile/card#me")]
    pub web_id_suffix: String,

    /// Link WebIDs outside the account's own pods without verification
    #[arg(long, env = "ALLOW_EXTERNAL_WEBIDS", default_value = "false")]
    pub allow_external_webids: bool,

    /// Argon2 memory cost in KiB
    #[arg(long, env = "PASSWORD_MEMORY_KIB", default_value = "19456")]
    pub password_memory_kib: u32,

    /// Argon2 iteration count
    #[arg(long, env = "PASSWORD_ITERATIONS", default_value = "2")]
    pub password_iterations: u32,

    /// JSON file with accounts to register at start-up
    #[arg(long, env = "SEEDED_ACCOUNTS")]
    pub seeded_accounts: Option<PathBuf>,

    /// Interval in seconds between sweeps of expired storage entries
    #[arg(long, env = "STORAGE_SWEEP_SECONDS", default_value = "60")]
    pub storage_sweep_seconds: u64,

    /// Interval in minutes between sweeps of expired notification sockets
    #[arg(long, env = "SOCKET_SWEEP_MINUTES", default_value = "60")]
    pub socket_sweep_minutes: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    /// Base URL with a trailing slash
    pub fn base_url(&self) -> String {
        ensure_trailing_slash(&self.base_url)
    }

    /// Full URL of the account API root
    pub fn account_base_url(&self) -> String {
        ensure_trailing_slash(&join_url(&self.base_url, &self.account_path))
    }

    /// Path component of the account API root, e.g. `/.account/`
    pub fn account_path_prefix(&self) -> String {
        ensure_trailing_slash(&format!("/{}", self.account_path.trim_matches('/')))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("BASE_URL must be an http(s) URL".to_string());
        }

        if self.account_path.trim_matches('/').is_empty() {
            return Err("ACCOUNT_PATH must not be empty".to_string());
        }

        if self.cookie_name.is_empty()
            || !self
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("COOKIE_NAME may only contain letters, digits, '-' and '_'".to_string());
        }

        if self.cookie_ttl_minutes == 0 || self.forgot_password_minutes == 0 {
            return Err("Cookie and password reset lifetimes must be positive".to_string());
        }

        if self.storage_sweep_seconds == 0 || self.socket_sweep_minutes == 0 {
            return Err("Sweep intervals must be positive".to_string());
        }

        let minutes = [
            self.cookie_ttl_minutes,
            self.forgot_password_minutes,
            self.socket_sweep_minutes,
            self.storage_sweep_seconds / 60,
        ];
        if minutes.iter().any(|&m| m > MAX_LIFETIME_MINUTES) {
            return Err(format!(
                "Lifetimes and sweep intervals may not exceed {} minutes",
                MAX_LIFETIME_MINUTES
            ));
        }

        if self.password_iterations == 0 {
            return Err("PASSWORD_ITERATIONS must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["gatehouse"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults_are_valid() {
        let args = args(&[]);
        assert!(args.validate().is_ok());
        assert_eq!(args.cookie_ttl_minutes, 20160);
        assert_eq!(args.account_base_url(), "http://localhost:3000/.account/");
        assert_eq!(args.account_path_prefix(), "/.account/");
    }

    #[test]
    fn test_base_url_normalization() {
        let args = args(&["--base-url", "https://pods.example", "--account-path", "/accounts"]);
        assert_eq!(args.base_url(), "https://pods.example/");
        assert_eq!(args.account_base_url(), "https://pods.example/accounts/");
        assert_eq!(args.account_path_prefix(), "/accounts/");
    }

    #[test]
    fn test_validation_errors() {
        assert!(args(&["--base-url", "pods.example"]).validate().is_err());
        assert!(args(&["--account-path", "/"]).validate().is_err());
        assert!(args(&["--cookie-name", "bad name"]).validate().is_err());
        assert!(args(&["--cookie-ttl-minutes", "0"]).validate().is_err());
    }

    #[test]
    fn test_lifetimes_are_capped() {
        let max = MAX_LIFETIME_MINUTES.to_string();
        let over = (MAX_LIFETIME_MINUTES + 1).to_string();
        assert!(args(&["--cookie-ttl-minutes", &max]).validate().is_ok());
        assert!(args(&["--cookie-ttl-minutes", &over]).validate().is_err());
        assert!(args(&["--forgot-password-minutes", &over]).validate().is_err());
        assert!(args(&["--socket-sweep-minutes", &over]).validate().is_err());
        assert!(args(&["--cookie-ttl-minutes", "18446744073709551615"])
            .validate()
            .is_err());
    }
}
