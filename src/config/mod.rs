use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub tenancy: TenancyConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Tenant identifier exempt from isolation (platform operator scope)
    pub super_tenant_id: String,
    /// Column carrying the tenant identifier on classified entities
    pub tenant_field: String,
    /// Entities classified in addition to the built-in registry
    pub extra_entities: Vec<String>,
    /// Request header consulted by the request boundary
    pub header_name: String,
    /// Accept the tenant header when no upstream identity was resolved.
    /// Only for deployments whose edge strips or sets the header itself.
    pub trust_header: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub log_rewrites: bool,
    pub log_denials: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Tenancy overrides
        if let Ok(v) = env::var("TENANCY_SUPER_TENANT_ID") {
            if !v.trim().is_empty() {
                self.tenancy.super_tenant_id = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var("TENANCY_TENANT_FIELD") {
            if !v.trim().is_empty() {
                self.tenancy.tenant_field = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var("TENANCY_EXTRA_ENTITIES") {
            self.tenancy.extra_entities = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("TENANCY_HEADER_NAME") {
            if !v.trim().is_empty() {
                self.tenancy.header_name = v.trim().to_ascii_lowercase();
            }
        }
        if let Ok(v) = env::var("TENANCY_TRUST_HEADER") {
            self.tenancy.trust_header = v.parse().unwrap_or(self.tenancy.trust_header);
        }

        // Audit overrides
        if let Ok(v) = env::var("AUDIT_LOG_REWRITES") {
            self.audit.log_rewrites = v.parse().unwrap_or(self.audit.log_rewrites);
        }
        if let Ok(v) = env::var("AUDIT_LOG_DENIALS") {
            self.audit.log_denials = v.parse().unwrap_or(self.audit.log_denials);
        }

        self
    }

    fn tenancy_defaults() -> TenancyConfig {
        TenancyConfig {
            super_tenant_id: "000000".to_string(),
            tenant_field: "tenantId".to_string(),
            extra_entities: Vec::new(),
            header_name: "tenant-id".to_string(),
            trust_header: false,
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            tenancy: Self::tenancy_defaults(),
            audit: AuditConfig {
                log_rewrites: true,
                log_denials: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            tenancy: Self::tenancy_defaults(),
            audit: AuditConfig {
                log_rewrites: false,
                log_denials: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            tenancy: Self::tenancy_defaults(),
            audit: AuditConfig {
                log_rewrites: false,
                log_denials: true,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.tenancy.super_tenant_id, "000000");
        assert_eq!(config.tenancy.tenant_field, "tenantId");
        assert!(config.audit.log_rewrites);
        assert!(config.tenancy.extra_entities.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert!(!config.audit.log_rewrites);
        assert!(config.audit.log_denials);
        assert_eq!(config.tenancy.header_name, "tenant-id");
        assert!(!config.tenancy.trust_header);
    }
}
