use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

pub const BIOLINK_PREFIX: &str = "biolink:";

const DEFAULT_TYPE_MAPPING: &str = include_str!("../data/type_mapping.json");

/// Types that carry no information and must not be sent as a filter.
const UNINFORMATIVE_TYPES: [&str; 6] = [
    "na",
    "none",
    "entity",
    "biolink:entity",
    "namedthing",
    "biolink:namedthing",
];

pub fn normalize_type_hint(value: &str) -> String {
    let trimmed = value.trim();
    let lowered = trimmed.to_lowercase();
    if UNINFORMATIVE_TYPES.contains(&lowered.as_str()) {
        String::new()
    } else {
        trimmed.to_string()
    }
}

pub fn ensure_biolink_prefix(value: &str) -> String {
    if value.is_empty() || value.starts_with(BIOLINK_PREFIX) {
        value.to_string()
    } else {
        format!("{BIOLINK_PREFIX}{value}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeResolution {
    Empty,
    AlreadyBiolink(String),
    Mapped(String),
    Unmapped(String),
}

impl TypeResolution {
    pub fn hint(&self) -> &str {
        match self {
            Self::AlreadyBiolink(value) | Self::Mapped(value) => value,
            Self::Empty | Self::Unmapped(_) => "",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeMapping {
    entries: BTreeMap<String, String>,
}

impl TypeMapping {
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_TYPE_MAPPING).context("failed to parse built-in type mapping")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read type mapping {}", path.display()))?;
        let mapping = Self::from_json(&raw)
            .with_context(|| format!("failed to parse type mapping {}", path.display()))?;
        info!(path = %path.display(), entries = mapping.len(), "loaded type mapping");
        Ok(mapping)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: BTreeMap<String, String> = serde_json::from_str(raw)?;
        let mut entries = BTreeMap::new();
        for (label, biolink_type) in parsed {
            let key = label.trim().to_lowercase();
            if key.is_empty() {
                bail!("type mapping contains an empty label");
            }
            entries.insert(key, biolink_type.trim().to_string());
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn resolve(&self, label: &str) -> TypeResolution {
        let normalized = normalize_type_hint(label);
        if normalized.is_empty() {
            return TypeResolution::Empty;
        }
        if normalized.starts_with(BIOLINK_PREFIX) {
            return TypeResolution::AlreadyBiolink(normalized);
        }

        match self.entries.get(&normalized.to_lowercase()) {
            Some(mapped) => TypeResolution::Mapped(normalize_type_hint(mapped)),
            None => TypeResolution::Unmapped(normalized),
        }
    }

    pub fn resolve_logged(&self, label: &str, warned: &mut HashSet<String>) -> String {
        let resolution = self.resolve(label);
        if let TypeResolution::Unmapped(value) = &resolution {
            if warned.insert(value.to_lowercase()) {
                warn!(label = %value, "no Biolink type mapping for label; sending no type hint");
            }
        }
        resolution.hint().to_string()
    }
}
