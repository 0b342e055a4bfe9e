//! Per-deployment configuration read from the watched tree.
//!
//! The file lives at the root of the share, so whoever publishes a new build
//! can also change how it is started:
//!
//! ```json
//! {
//!   "deploy_location": "/opt/kiosk",
//!   "executable": "/opt/kiosk/run.sh",
//!   "args": ["--fullscreen"],
//!   "source_location": "build/kiosk",
//!   "env_variables": ["APP_MODE=production"]
//! }
//! ```

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{DeployError, DeployResult};

/// Name of the deploy config at the root of the watched tree.
pub const CONFIG_FILE_NAME: &str = "deploy.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeployConfig {
    /// Where sources are copied to; also the child's working directory
    pub deploy_location: PathBuf,

    /// Program to start after copying
    pub executable: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    /// Path inside the share to copy from
    #[serde(default)]
    pub source_location: String,

    /// `KEY=VALUE` entries added to the child's environment
    #[serde(default)]
    pub env_variables: Vec<String>,
}

impl DeployConfig {
    /// Read and parse `deploy.json` under `root`.
    ///
    /// Either the whole file parses or an error is returned; there is no
    /// partially applied result.
    pub fn load(root: &Path) -> DeployResult<Self> {
        let path = root.join(CONFIG_FILE_NAME);

        let data = std::fs::read_to_string(&path).map_err(|source| DeployError::ConfigRead {
            path: path.clone(),
            source,
        })?;

        serde_json::from_str(&data).map_err(|source| DeployError::ConfigParse { path, source })
    }

    /// The source prefix without `.` components or trailing separators.
    pub fn source_prefix(&self) -> PathBuf {
        Path::new(&self.source_location)
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }

    /// Absolute source directory under the watched root.
    pub fn source_dir(&self, root: &Path) -> PathBuf {
        root.join(self.source_prefix())
    }

    /// Whether a path relative to the root lies inside the source subtree.
    ///
    /// Matching is per path component, so `src` covers `src/app.py` but not
    /// `src2/app.py`. An empty prefix covers the whole tree.
    pub fn covers(&self, relative_path: &Path) -> bool {
        let relative: PathBuf = relative_path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        relative.starts_with(self.source_prefix())
    }

    /// Parsed `env_variables`, in order. Entries without `=` or with an
    /// empty key are skipped.
    pub fn environment(&self) -> Vec<(String, String)> {
        self.env_variables
            .iter()
            .filter_map(|entry| match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => Some((key.to_string(), value.to_string())),
                _ => {
                    tracing::warn!("[config] ignoring malformed env entry '{entry}'");
                    None
                }
            })
            .collect()
    }
}
