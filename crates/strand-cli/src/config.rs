use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use strand_graph::GraphConfig;
use strand_router::PathRouter;

/// File read when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "strand.toml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Root of the fixture tree served as the remote API.
    pub fixtures: PathBuf,
    /// Per-request timeout.
    pub timeout_ms: Option<u64>,
    /// Redirect table, source path to target path.
    pub redirects: BTreeMap<String, String>,
    pub graph: GraphConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            fixtures: PathBuf::from("fixtures"),
            timeout_ms: Some(10_000),
            redirects: BTreeMap::new(),
            graph: GraphConfig::default(),
        }
    }
}

impl CliConfig {
    /// Read `explicit`, or [`DEFAULT_CONFIG_FILE`] if it exists, or fall
    /// back to defaults. A missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn router(&self) -> PathRouter {
        self.redirects
            .iter()
            .fold(PathRouter::new(), |router, (from, to)| router.with_redirect(from, to.clone()))
    }
}
