//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `CLOUDFILER_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `CLOUDFILER_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `CLOUDFILER_AUTH__SESSION__TIMEOUT=2h` sets `auth.session.timeout`.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use cloudfiler::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`
//! - **Admin User**: `admin_login`, `admin_password` - ensured to exist on startup
//! - **Authentication**: `auth.login_path`, redirects, `auth.admin_role`,
//!   `auth.session` (cookie and timeout), `auth.password` (length rules, Argon2 cost)
//! - **Files**: `files.max_file_size`
//! - **Telemetry**: `enable_otel_export`
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! CLOUDFILER_PORT=8080
//! CLOUDFILER_ADMIN_PASSWORD=change-me
//! CLOUDFILER_AUTH__SESSION__COOKIE_SECURE=false
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CLOUDFILER_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Login of the administrator account ensured on startup
    pub admin_login: String,
    /// Password for the administrator account. When set, it is (re)applied on every startup.
    pub admin_password: Option<String>,
    pub auth: AuthConfig,
    pub files: FilesConfig,
    /// Export traces over OTLP (configured through the standard `OTEL_*` variables)
    pub enable_otel_export: bool,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Path of the login action; callers without a session are redirected here
    pub login_path: String,
    /// Where a successful form login lands
    pub post_login_redirect: String,
    /// Where logout lands
    pub post_logout_redirect: String,
    /// Role required for user and role administration
    pub admin_role: String,
    pub session: SessionConfig,
    pub password: PasswordConfig,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Session timeout duration
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cookie name for session token
    pub cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
    /// SameSite cookie attribute ("strict", "lax", or "none")
    pub cookie_same_site: String,
}

/// Password validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
    /// Argon2 memory cost in KiB (default: 19456 KiB = 19 MB)
    pub argon2_memory_kib: u32,
    /// Argon2 iterations (default: 2)
    pub argon2_iterations: u32,
    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

/// File upload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    /// Largest accepted upload, in bytes
    pub max_file_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            admin_login: "admin".to_string(),
            admin_password: Some("hunter2".to_string()),
            auth: AuthConfig::default(),
            files: FilesConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "/auth/login".to_string(),
            post_login_redirect: "/".to_string(),
            post_logout_redirect: "/auth/login".to_string(),
            admin_role: "Admin".to_string(),
            session: SessionConfig::default(),
            password: PasswordConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(24 * 60 * 60), // 24 hours
            cookie_name: "cloudfiler_session".to_string(),
            cookie_secure: true,
            cookie_same_site: "strict".to_string(),
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 64,
            // Argon2id RFC recommendations
            argon2_memory_kib: 19456,
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024, // 100 MB
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("CLOUDFILER_").ignore(&["config"]).split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |message: String| Error::Internal {
            operation: format!("Config validation: {message}"),
        };

        for (name, path) in [
            ("auth.login_path", &self.auth.login_path),
            ("auth.post_login_redirect", &self.auth.post_login_redirect),
            ("auth.post_logout_redirect", &self.auth.post_logout_redirect),
        ] {
            if !path.starts_with('/') {
                return Err(invalid(format!("{name} must be an absolute path starting with '/', got '{path}'")));
            }
        }

        if self.auth.admin_role.trim().is_empty() {
            return Err(invalid("auth.admin_role cannot be empty".to_string()));
        }

        if self.admin_login.trim().is_empty() {
            return Err(invalid("admin_login cannot be empty".to_string()));
        }

        let password = &self.auth.password;
        if password.min_length < 1 {
            return Err(invalid("Invalid password configuration: min_length must be at least 1".to_string()));
        }
        if password.min_length > password.max_length {
            return Err(invalid(format!(
                "Invalid password configuration: min_length ({}) cannot be greater than max_length ({})",
                password.min_length, password.max_length
            )));
        }

        if self.auth.session.cookie_name.is_empty() {
            return Err(invalid("auth.session.cookie_name cannot be empty".to_string()));
        }
        if !["strict", "lax", "none"].contains(&self.auth.session.cookie_same_site.to_ascii_lowercase().as_str()) {
            return Err(invalid(format!(
                "auth.session.cookie_same_site must be one of strict, lax or none, got '{}'",
                self.auth.session.cookie_same_site
            )));
        }
        if self.auth.session.timeout.is_zero() {
            return Err(invalid("auth.session.timeout must be positive".to_string()));
        }

        if self.files.max_file_size == 0 {
            return Err(invalid("files.max_file_size must be positive".to_string()));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_yaml_and_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 9000
admin_login: root
auth:
  admin_role: Administrators
  session:
    timeout: 30m
    cookie_secure: false
files:
  max_file_size: 1024
"#,
            )?;

            jail.set_env("CLOUDFILER_HOST", "127.0.0.1");
            jail.set_env("CLOUDFILER_AUTH__PASSWORD__MIN_LENGTH", "12");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.bind_address(), "127.0.0.1:9000");
            assert_eq!(config.admin_login, "root");
            assert_eq!(config.auth.admin_role, "Administrators");
            assert_eq!(config.auth.session.timeout, Duration::from_secs(30 * 60));
            assert!(!config.auth.session.cookie_secure);
            assert_eq!(config.auth.session.cookie_name, "cloudfiler_session");
            assert_eq!(config.auth.password.min_length, 12);
            assert_eq!(config.auth.login_path, "/auth/login");
            assert_eq!(config.files.max_file_size, 1024);

            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("does-not-exist.yaml"))?;
            assert_eq!(config.port, 3001);
            assert_eq!(config.auth.admin_role, "Admin");
            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "auth:\n  login_pth: /login\n")?;
            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.auth.login_path = "auth/login".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.admin_role = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.password.min_length = 20;
        config.auth.password.max_length = 10;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.session.cookie_same_site = "sometimes".to_string();
        assert!(config.validate().is_err());
    }
}
