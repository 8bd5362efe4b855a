//! Configuration loading and management

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address `serve` binds to
    pub bind_addr: String,

    /// Logical database name advertised to login callers. When set, a login
    /// body naming a different database is rejected; when unset the `db`
    /// field is ignored.
    pub database: Option<String>,

    pub pagination: PaginationConfig,
    pub expansion: ExpansionConfig,
    pub tokens: TokenConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database: None,
            pagination: PaginationConfig::default(),
            expansion: ExpansionConfig::default(),
            tokens: TokenConfig::default(),
        }
    }
}

/// Bounds for list reads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when the caller sends none
    pub default_limit: usize,

    /// Hard cap; larger requested limits are clamped
    pub max_limit: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 80,
            max_limit: 500,
        }
    }
}

/// Bounds for nested relation expansion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Maximum number of nested expansion levels
    pub max_depth: usize,

    /// Maximum distinct target ids fetched at one level
    pub max_ids_per_level: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_ids_per_level: 1000,
        }
    }
}

/// Token issuance policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime of issued tokens in seconds; `None` means tokens never
    /// expire (revocation and re-issue still invalidate them)
    pub ttl_seconds: Option<i64>,
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default_config();
        assert_eq!(config.pagination.default_limit, 80);
        assert_eq!(config.pagination.max_limit, 500);
        assert_eq!(config.expansion.max_depth, 4);
        assert!(config.tokens.ttl_seconds.is_none());
        assert!(config.database.is_none());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = GatewayConfig::default_config();
        let yaml = serde_yaml::to_string(&config).unwrap();

        let parsed = GatewayConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.pagination.default_limit, config.pagination.default_limit);
        assert_eq!(parsed.bind_addr, config.bind_addr);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed = GatewayConfig::from_yaml_str(
            "database: production\npagination:\n  default_limit: 25\n",
        )
        .unwrap();
        assert_eq!(parsed.database.as_deref(), Some("production"));
        assert_eq!(parsed.pagination.default_limit, 25);
        // Unspecified sections keep their defaults
        assert_eq!(parsed.pagination.max_limit, 500);
        assert_eq!(parsed.expansion.max_depth, 4);
    }

    #[test]
    fn test_yaml_file_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");
        std::fs::write(&path, "tokens:\n  ttl_seconds: 3600\n").unwrap();

        let parsed = GatewayConfig::from_yaml_file(path.to_str().unwrap()).unwrap();
        assert_eq!(parsed.tokens.ttl_seconds, Some(3600));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(GatewayConfig::from_yaml_str("pagination: [not, a, map]").is_err());
    }
}
