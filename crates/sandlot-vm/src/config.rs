//! Runtime configuration.
//!
//! Loaded from TOML by the orchestrator and shared read-only by every
//! execution context it spawns.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::metering::GasSchedule;
use crate::{DEFAULT_INSTRUCTION_LIMIT, MAX_CALL_DEPTH, MAX_MODULE_ID_LEN};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Upper bound on instructions per transaction
    pub instruction_limit: u64,
    /// Maximum frames on the call stack, top-level frame included
    pub max_call_depth: usize,
    /// Allow a contract already on the stack to be called again
    pub allow_reentrancy: bool,
    /// Seed randomness for the top-level frame
    pub enable_random: bool,
    /// Longest accepted module id, in bytes
    pub max_module_id_len: usize,
    /// Surcharges for host round-trips
    pub gas: GasSchedule,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            instruction_limit: DEFAULT_INSTRUCTION_LIMIT,
            max_call_depth: MAX_CALL_DEPTH,
            allow_reentrancy: false,
            enable_random: true,
            max_module_id_len: MAX_MODULE_ID_LEN,
            gas: GasSchedule::default(),
        }
    }
}

impl VmConfig {
    /// Load configuration from file.
    /// Paths containing `..` are refused.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        check_path(path)?;
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to load config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: VmConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        check_path(path)?;
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.instruction_limit == 0 {
            anyhow::bail!("Instruction limit cannot be 0");
        }
        if self.max_call_depth == 0 {
            anyhow::bail!("Max call depth must be at least 1");
        }
        if self.max_module_id_len == 0 {
            anyhow::bail!("Max module id length must be at least 1");
        }
        Ok(())
    }
}

fn check_path(path: &Path) -> anyhow::Result<()> {
    if path.to_string_lossy().contains("..") {
        anyhow::bail!("Invalid path: directory traversal detected");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = VmConfig::default();
        assert_eq!(config.max_call_depth, 64);
        assert!(!config.allow_reentrancy);
        assert!(config.enable_random);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = VmConfig::from_toml_str(
            r#"
            instruction_limit = 5000
            [gas]
            transfer = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.instruction_limit, 5_000);
        assert_eq!(config.gas.transfer, 10);
        assert_eq!(config.gas.storage_read, GasSchedule::default().storage_read);
        assert_eq!(config.max_call_depth, 64);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        assert!(VmConfig::from_toml_str("instruction_limit = 0").is_err());
        assert!(VmConfig::from_toml_str("max_call_depth = 0").is_err());
        assert!(VmConfig::from_toml_str("max_module_id_len = 0").is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vm.toml");
        let config = VmConfig {
            allow_reentrancy: true,
            ..VmConfig::default()
        };
        config.to_file(&path).unwrap();
        assert_eq!(VmConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_traversal_rejected() {
        let err = VmConfig::from_file(Path::new("../vm.toml")).unwrap_err();
        assert!(err.to_string().contains("directory traversal"));
    }
}
