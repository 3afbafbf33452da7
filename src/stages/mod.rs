// Pipeline stages: metadata, model and 2D render downloads.

pub mod metadata;
pub mod model;
pub mod render;
pub mod render_url;

pub use metadata::MetadataDownloader;
pub use model::ModelDownloader;
pub use render::AvatarRenderDownloader;
pub use render_url::{RenderParameters, RenderScene, RenderSettings, RenderUrlBuilder};
