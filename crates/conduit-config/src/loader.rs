// SPDX-License-Identifier: Apache-2.0
//! Minimal YAML hydration for [`Config`].
//!
//! File *discovery* (search paths, layered merging, `--config` flags) is the
//! CLI's job and out of scope here — this module only turns YAML text into a
//! `Config` value.

use std::path::Path;

use anyhow::Context;

use crate::Config;

/// Parse a `Config` from a YAML string.
pub fn load_str(yaml: &str) -> anyhow::Result<Config> {
    serde_yaml::from_str(yaml).context("parsing config YAML")
}

/// Parse a `Config` from a YAML file on disk.
pub fn load_file(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    load_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_partial_yaml_with_defaults() {
        let cfg = load_str("port: 9090\nfirewall:\n  enabled: false\n").unwrap();
        assert_eq!(cfg.port, 9090);
        assert!(!cfg.firewall.enabled);
        assert!(cfg.quality_gate.enabled);
    }
}
