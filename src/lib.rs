// Avatar fetch-and-cache engine: metadata, model and render downloads behind
// a cancellable stage pipeline, with a local cache kept in step with the
// remote last-modified signal.

pub mod api;
pub mod avatar;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod net;
pub mod pipeline;
pub mod stages;

pub use avatar::{AvatarContext, AvatarMetadata, AvatarPayload, AvatarUri, BodyType};
pub use engine::loader::AvatarLoader;
pub use error::{AvatarError, AvatarResult, FailureType};
pub use pipeline::{Operation, Pipeline};
