use std::path::PathBuf;

use reqwest::Url;

use crate::cache::CacheLayout;
use crate::config::{METADATA_EXTENSION, MODELS_BASE_URL, MODEL_EXTENSION};
use crate::error::{AvatarError, AvatarResult, FailureType};

/// Resolved locations of one avatar, remote and local.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AvatarUri {
    pub guid: String,
    pub model_url: String,
    pub metadata_url: String,
    pub local_model_path: PathBuf,
    pub local_metadata_path: PathBuf,
}

fn invalid(message: String) -> AvatarError {
    AvatarError::new(FailureType::InvalidInput, message)
}

fn is_bare_id(input: &str) -> bool {
    !input.is_empty()
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl AvatarUri {
    /// Resolve a model URL (`http(s)://…/<guid>.glb`) or a bare avatar id.
    ///
    /// The metadata URL is the model URL with a `.json` extension and no query.
    /// Local paths come from `layout`, under the project root when `in_project` is set.
    pub fn resolve(input: &str, layout: &CacheLayout, in_project: bool) -> AvatarResult<Self> {
        let input = input.trim();
        let raw = if is_bare_id(input) {
            format!("{}/{}.{}", MODELS_BASE_URL, input, MODEL_EXTENSION)
        } else {
            input.to_string()
        };

        let model_url =
            Url::parse(&raw).map_err(|e| invalid(format!("invalid avatar url '{}': {}", input, e)))?;
        if !matches!(model_url.scheme(), "http" | "https") {
            return Err(invalid(format!(
                "unsupported url scheme '{}' in '{}'",
                model_url.scheme(),
                input
            )));
        }

        let suffix = format!(".{}", MODEL_EXTENSION);
        let guid = model_url
            .path_segments()
            .and_then(|segments| segments.last())
            .and_then(|file| file.strip_suffix(suffix.as_str()))
            .filter(|guid| !guid.is_empty())
            .map(str::to_string)
            .ok_or_else(|| invalid(format!("'{}' does not point at a {} model", input, suffix)))?;

        let mut metadata_url = model_url.clone();
        metadata_url.set_query(None);
        metadata_url.set_fragment(None);
        metadata_url
            .path_segments_mut()
            .map_err(|_| invalid(format!("'{}' cannot carry a path", input)))?
            .pop()
            .push(&format!("{}.{}", guid, METADATA_EXTENSION));

        Ok(Self {
            local_model_path: layout.model_path(&guid, in_project),
            local_metadata_path: layout.metadata_path(&guid, in_project),
            model_url: model_url.to_string(),
            metadata_url: metadata_url.to_string(),
            guid,
        })
    }

    /// True for the zero value, i.e. a locator that was never resolved.
    pub fn is_default(&self) -> bool {
        *self == AvatarUri::default()
    }
}
