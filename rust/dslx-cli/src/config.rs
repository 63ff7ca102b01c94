//! Configuration file parsing for `dslx.toml`.
//!
//! Searches the current directory then its ancestors. A missing file, or a
//! missing section, falls back to defaults.

use dslx_vm::VmOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "dslx.toml";

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct DslxConfig {
    #[serde(default)]
    pub vm: VmOptions,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct LogSection {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl DslxConfig {
    /// Load config from `dslx.toml`, searching current dir then parents.
    /// Returns `Default` when no file is found.
    pub fn load() -> Result<Self, String> {
        Ok(Self::load_with_path()?.map(|(_, cfg)| cfg).unwrap_or_default())
    }

    /// Load config and return the path to the config file that was found.
    pub fn load_with_path() -> Result<Option<(PathBuf, Self)>, String> {
        let dir = std::env::current_dir().map_err(|e| format!("cannot read current directory: {}", e))?;
        Self::find_from(&dir)
    }

    /// Search `start` and its ancestors. A file that exists but does not
    /// parse is an error, not a fallback.
    pub fn find_from(start: &Path) -> Result<Option<(PathBuf, Self)>, String> {
        for dir in start.ancestors() {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.is_file() {
                let cfg = Self::load_from(&config_path)?;
                return Ok(Some((config_path, cfg)));
            }
        }
        Ok(None)
    }

    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("invalid toml in '{}': {}", path.display(), e))
    }

    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Generate a default `dslx.toml` template.
    pub fn default_template() -> &'static str {
        r#"# DSLX interpreter configuration

[vm]
# Abort an execution after this many instructions (unset = unbounded)
# instruction_limit = 1000000
max_call_depth = 256

[log]
# tracing filter used when RUST_LOG is unset
# filter = "dslx_vm=debug"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dslx_vm::MAX_CALL_DEPTH;

    #[test]
    fn parse_full_config() {
        let cfg = DslxConfig::parse(
            r#"
[vm]
instruction_limit = 500
max_call_depth = 16

[log]
filter = "dslx_vm=trace"
"#,
        )
        .expect("should parse");
        assert_eq!(cfg.vm.instruction_limit, Some(500));
        assert_eq!(cfg.vm.max_call_depth, 16);
        assert_eq!(cfg.log.filter.as_deref(), Some("dslx_vm=trace"));
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg = DslxConfig::parse("").unwrap();
        assert_eq!(cfg, DslxConfig::default());
        assert_eq!(cfg.vm.max_call_depth, MAX_CALL_DEPTH);

        let cfg = DslxConfig::parse("[vm]\ninstruction_limit = 3\n").unwrap();
        assert_eq!(cfg.vm.max_call_depth, MAX_CALL_DEPTH);
        assert_eq!(cfg.log.filter, None);
    }

    #[test]
    fn template_parses_to_defaults() {
        let cfg = DslxConfig::parse(DslxConfig::default_template()).unwrap();
        assert_eq!(cfg, DslxConfig::default());
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(DslxConfig::parse("[vm]\nmax_call_depth = \"deep\"\n").is_err());
    }

    #[test]
    fn find_from_walks_up_to_ancestors() {
        let root = std::env::temp_dir().join(format!("dslx_config_find_{}", std::process::id()));
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join(CONFIG_FILE), "[vm]\nmax_call_depth = 4\n").unwrap();

        let (path, cfg) = DslxConfig::find_from(&nested).unwrap().expect("config found");
        assert_eq!(path, root.join(CONFIG_FILE));
        assert_eq!(cfg.vm.max_call_depth, 4);

        std::fs::write(root.join(CONFIG_FILE), "[vm\n").unwrap();
        assert!(DslxConfig::find_from(&nested).is_err());
        let _ = std::fs::remove_dir_all(&root);
    }
}
