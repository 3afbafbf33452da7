use anyhow::{Context, Result};
use serde::Deserialize;

/// Base URL used to expand a bare avatar id into a model URL.
pub const MODELS_BASE_URL: &str = "https://models.readyplayer.me";

/// Textual layout of metadata timestamps: `yyyy-MM-dd'T'HH:mm:ss.fff'Z'`.
pub const METADATA_TIME_FORMAT: &str = "yyyy-MM-dd'T'HH:mm:ss.fff'Z'";

/// Per-request network timeout applied when the config does not override it.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Extension of downloaded avatar models.
pub const MODEL_EXTENSION: &str = "glb";

/// Extension of avatar metadata files, both remote and cached.
pub const METADATA_EXTENSION: &str = "json";

/// Extension of 2D renders.
pub const RENDER_EXTENSION: &str = "png";

/// Query parameter appended to metadata URLs when cache busting is on.
pub const CACHE_BUST_PARAM: &str = "tail";

/// Project-relative directory used when avatars are saved into the host project.
pub const DEFAULT_PROJECT_DIR: &str = "Assets/Avatars";

/// Top-level configuration for avatar loading.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Timeout in seconds for each network request. `0` disables the timeout.
    pub timeout_secs: u64,
    /// Keep downloaded avatars in the persistent cache and reuse them while unchanged.
    pub avatar_caching_enabled: bool,
    /// Write avatars under `project_dir` instead of the persistent cache.
    pub save_in_project_folder: bool,
    /// Append a unique query parameter to metadata URLs to defeat HTTP caches.
    pub cache_busting: bool,
    /// Persistent cache root. Empty selects the platform cache directory.
    pub cache_dir: String,
    /// Root used when `save_in_project_folder` is set.
    pub project_dir: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            avatar_caching_enabled: true,
            save_in_project_folder: false,
            // Browser hosts serve repeated URLs from their own cache.
            cache_busting: cfg!(target_arch = "wasm32"),
            cache_dir: String::new(),
            project_dir: DEFAULT_PROJECT_DIR.to_string(),
        }
    }
}

impl LoaderConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parse loader config")
    }
}
