use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashSet};

use crate::config::config;

/// Entities carrying a tenant column in the shipped schema
pub const DEFAULT_TENANT_ENTITIES: &[&str] = &[
    "SysConfig",
    "SysDept",
    "SysDictData",
    "SysDictType",
    "SysJob",
    "SysLogininfor",
    "SysMenu",
    "SysNotice",
    "SysOperLog",
    "SysPost",
    "SysRole",
    "SysUpload",
    "SysUser",
];

/// Discrepancy between the registry and schema metadata
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegistryDrift {
    /// Schema has a tenant column but the registry does not classify the entity
    Unclassified(String),
    /// Registry classifies the entity but the schema reports no tenant column
    MissingColumn(String),
}

/// Set of entity names subject to tenant isolation
#[derive(Debug, Clone, Default)]
pub struct TenantRegistry {
    entities: HashSet<String>,
}

impl TenantRegistry {
    pub fn new<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entities: entities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TENANT_ENTITIES.iter().copied())
    }

    pub fn extend<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities.extend(entities.into_iter().map(Into::into));
        self
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains(entity)
    }

    /// Classified entity names in sorted order
    pub fn entities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Compare against schema metadata given as `(entity, has_tenant_column)`.
    /// Registry entries the schema does not mention count as `MissingColumn`.
    pub fn drift<'a, I>(&self, schema: I) -> Vec<RegistryDrift>
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut drift = BTreeSet::new();
        let mut seen = HashSet::new();

        for (entity, has_tenant_column) in schema {
            seen.insert(entity);
            match (has_tenant_column, self.contains(entity)) {
                (true, false) => {
                    drift.insert(RegistryDrift::Unclassified(entity.to_string()));
                }
                (false, true) => {
                    drift.insert(RegistryDrift::MissingColumn(entity.to_string()));
                }
                _ => {}
            }
        }

        for entity in &self.entities {
            if !seen.contains(entity.as_str()) {
                drift.insert(RegistryDrift::MissingColumn(entity.clone()));
            }
        }

        drift.into_iter().collect()
    }
}

// Built once on first use, read-only afterwards
static REGISTRY: Lazy<TenantRegistry> = Lazy::new(|| {
    let registry = TenantRegistry::with_defaults()
        .extend(config().tenancy.extra_entities.iter().cloned());
    tracing::debug!("Tenant registry initialized: {:?}", registry.entities());
    registry
});

pub fn registry() -> &'static TenantRegistry {
    &REGISTRY
}

/// Whether `entity` carries a tenant column and is therefore rewritten
pub fn has_tenant_field(entity: &str) -> bool {
    registry().contains(entity)
}
