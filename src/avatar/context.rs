// Per-load context handed from stage to stage by value.

use bytes::Bytes;
use image::DynamicImage;

use super::metadata::AvatarMetadata;
use super::uri::AvatarUri;
use crate::config::LoaderConfig;
use crate::stages::render_url::RenderSettings;

/// Payload produced by whichever stage owns it.
#[derive(Debug, Clone, Default)]
pub enum AvatarPayload {
    #[default]
    Empty,
    /// Raw model bytes.
    Bytes(Bytes),
    /// Decoded 2D render.
    Image(DynamicImage),
}

impl AvatarPayload {
    pub fn is_empty(&self) -> bool {
        matches!(self, AvatarPayload::Empty)
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            AvatarPayload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&DynamicImage> {
        match self {
            AvatarPayload::Image(image) => Some(image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AvatarContext {
    pub avatar_uri: AvatarUri,
    pub metadata: Option<AvatarMetadata>,
    pub data: AvatarPayload,
    /// Set by the metadata stage; tells later stages whether cached payloads are stale.
    pub is_update_required: bool,
    pub render_settings: RenderSettings,
    save_in_project_folder: bool,
    avatar_caching_enabled: bool,
    revision: u64,
}

impl AvatarContext {
    pub fn new(avatar_uri: AvatarUri, save_in_project_folder: bool, avatar_caching_enabled: bool) -> Self {
        Self {
            avatar_uri,
            save_in_project_folder,
            avatar_caching_enabled,
            ..Self::default()
        }
    }

    pub fn from_config(avatar_uri: AvatarUri, config: &LoaderConfig) -> Self {
        Self::new(
            avatar_uri,
            config.save_in_project_folder,
            config.avatar_caching_enabled,
        )
    }

    pub fn with_render_settings(self, render_settings: RenderSettings) -> Self {
        Self {
            render_settings,
            ..self
        }
    }

    pub fn save_in_project_folder(&self) -> bool {
        self.save_in_project_folder
    }

    pub fn avatar_caching_enabled(&self) -> bool {
        self.avatar_caching_enabled
    }

    /// Number of pipeline stages applied to this context so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn advance(&mut self) {
        self.revision += 1;
    }
}
