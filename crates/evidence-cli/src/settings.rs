//! Layered configuration: defaults, then the TOML file, then `EVIDENCE_*`
//! environment variables. Command-line flags are applied on top by `main`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use evidence_core::summary::SummaryThresholds;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
  /// SQLite database file.
  pub store_path:       PathBuf,
  /// Verification older than this many days is reported by `stale`.
  pub stale_after_days: u32,
  pub thresholds:       SummaryThresholds,
}

impl Default for RegistryConfig {
  fn default() -> Self {
    Self {
      store_path:       PathBuf::from("registry.db"),
      stale_after_days: 180,
      thresholds:       SummaryThresholds::default(),
    }
  }
}

impl RegistryConfig {
  /// Load from `path` (optional) and the environment.
  ///
  /// Nested keys use a double underscore, e.g.
  /// `EVIDENCE_THRESHOLDS__STRONG_THRESHOLD=10`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("EVIDENCE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise RegistryConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let cfg = RegistryConfig::load(Path::new("definitely-not-here.toml")).unwrap();
    assert_eq!(cfg.stale_after_days, 180);
    assert_eq!(cfg.thresholds, SummaryThresholds::default());
  }

  #[test]
  fn relative_paths_are_untouched() {
    assert_eq!(expand_tilde(Path::new("data/registry.db")), PathBuf::from("data/registry.db"));
  }
}
