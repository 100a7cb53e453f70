// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Configuration for execution contexts.
//!
//! Values come from a TOML file, environment variables, or direct calls to
//! [`ContextConfig::set`]. Later sources override earlier ones.
//!
//! ```toml
//! memory_limit = "10m"
//! max_stack_size = 262144
//! ```

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "SPACEY_EMBED_";

/// Keys read from the environment, after [`ENV_PREFIX`]
const ENV_KEYS: [&str; 3] = ["MEMORY_LIMIT", "MAX_STACK_SIZE", "GC_THRESHOLD"];

/// Resource configuration applied to a context before its first evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Heap ceiling in bytes
    #[serde(deserialize_with = "deserialize_size")]
    pub memory_limit: Option<usize>,

    /// Call-stack ceiling in bytes
    #[serde(deserialize_with = "deserialize_size")]
    pub max_stack_size: Option<usize>,

    /// Allocation volume that triggers an automatic collection
    #[serde(deserialize_with = "deserialize_size")]
    pub gc_threshold: Option<usize>,
}

impl ContextConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BridgeError::config(e.to_string()))
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `SPACEY_EMBED_MEMORY_LIMIT`, `SPACEY_EMBED_MAX_STACK_SIZE` and
    /// `SPACEY_EMBED_GC_THRESHOLD`. Other variables are ignored.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        for key in ENV_KEYS {
            if let Some(value) = lookup(&format!("{}{}", ENV_PREFIX, key)) {
                self.set(key, &value)?;
            }
        }
        Ok(())
    }

    /// Set a configuration value by key.
    ///
    /// Keys accept either `-` or `_` separators.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let slot = match key.to_ascii_lowercase().replace('_', "-").as_str() {
            "memory-limit" => &mut self.memory_limit,
            "max-stack-size" | "stack-size" => &mut self.max_stack_size,
            "gc-threshold" => &mut self.gc_threshold,
            other => return Err(BridgeError::config(format!("unknown key '{}'", other))),
        };
        *slot = Some(parse_size(value)?);
        Ok(())
    }
}

/// Parse a byte size such as `4096`, `512k`, `10m` or `1g` (binary units).
pub fn parse_size(text: &str) -> Result<usize> {
    let trimmed = text.trim().to_ascii_lowercase();
    let trimmed = trimmed
        .strip_suffix("ib")
        .or_else(|| trimmed.strip_suffix('b'))
        .unwrap_or(&trimmed);

    let (digits, multiplier) = match trimmed.chars().last() {
        Some('k') => (&trimmed[..trimmed.len() - 1], 1usize << 10),
        Some('m') => (&trimmed[..trimmed.len() - 1], 1 << 20),
        Some('g') => (&trimmed[..trimmed.len() - 1], 1 << 30),
        _ => (trimmed, 1),
    };

    digits
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| BridgeError::config(format!("invalid size '{}'", text)))
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Bytes(usize),
        Text(String),
    }

    match Option::<Size>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Size::Bytes(n)) => Ok(Some(n)),
        Some(Size::Text(text)) => parse_size(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("512k").unwrap(), 512 * 1024);
        assert_eq!(parse_size("10M").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size("1GiB").unwrap(), 1 << 30);
        assert_eq!(parse_size(" 2 mb ").unwrap(), 2 << 20);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = ContextConfig::from_toml_str(
            r#"
            memory_limit = "10m"
            max_stack_size = 262144
            "#,
        )
        .unwrap();

        assert_eq!(config.memory_limit, Some(10 << 20));
        assert_eq!(config.max_stack_size, Some(262144));
        assert_eq!(config.gc_threshold, None);
    }

    #[test]
    fn test_unknown_toml_key_rejected() {
        assert!(ContextConfig::from_toml_str("heap = 1").is_err());
    }

    #[test]
    fn test_set() {
        let mut config = ContextConfig::default();
        config.set("memory-limit", "1m").unwrap();
        config.set("gc_threshold", "256k").unwrap();
        assert_eq!(config.memory_limit, Some(1 << 20));
        assert_eq!(config.gc_threshold, Some(256 << 10));
        assert!(config.set("colour", "blue").is_err());
    }

    #[test]
    fn test_env_reads_only_known_keys() {
        let vars = |name: &str| match name {
            "SPACEY_EMBED_MEMORY_LIMIT" => Some("8m".to_string()),
            "SPACEY_EMBED_LOG" => Some("1".to_string()),
            _ => None,
        };

        let mut config = ContextConfig::default();
        config.apply_vars(vars).unwrap();
        assert_eq!(config.memory_limit, Some(8 << 20));
        assert_eq!(config.max_stack_size, None);
    }

    #[test]
    fn test_invalid_env_value_rejected() {
        let mut config = ContextConfig::default();
        let result = config.apply_vars(|name| {
            (name == "SPACEY_EMBED_GC_THRESHOLD").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.toml");
        std::fs::write(&path, "gc_threshold = \"1m\"\n").unwrap();

        let config = ContextConfig::load(&path).unwrap();
        assert_eq!(config.gc_threshold, Some(1 << 20));
    }
}
