//! Warehouse connection configuration.

use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    443
}

fn default_use_ssl() -> bool {
    true
}

/// Connection settings for the warehouse's SQL API.
///
/// Loaded from the `[connection]` table of `floe.toml`; the password can be
/// overridden with `FLOE_CONNECTION__PASSWORD` so credentials stay out of
/// checked-in configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WarehouseConfig {
    /// Account identifier, e.g. `acme-analytics`.
    pub account: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Role assumed for every statement.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "default_use_ssl")]
    pub use_ssl: bool,
}

impl WarehouseConfig {
    /// Base URL of the SQL API.
    pub fn base_url(&self) -> String {
        let protocol = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", protocol, self.host, self.port)
    }

    /// Connection string for display, without the password.
    pub fn display_connection(&self) -> String {
        format!(
            "{}@{} (account: {})",
            self.user,
            self.base_url(),
            self.account
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_port_and_ssl() {
        let config: WarehouseConfig = toml::from_str(
            r#"
            account = "acme-analytics"
            host = "acme.warehouse.example.com"
            user = "deployer"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 443);
        assert!(config.use_ssl);
        assert_eq!(
            config.base_url(),
            "https://acme.warehouse.example.com:443"
        );
    }

    #[test]
    fn test_display_connection_omits_password() {
        let config = WarehouseConfig {
            account: "acme".to_string(),
            host: "localhost".to_string(),
            port: 8080,
            user: "deployer".to_string(),
            password: "hunter2".to_string(),
            role: None,
            use_ssl: false,
        };
        let display = config.display_connection();
        assert!(display.contains("deployer@http://localhost:8080"));
        assert!(!display.contains("hunter2"));
    }
}
