// Avatar data model: locator, metadata record and the per-load context.

pub mod context;
pub mod metadata;
pub mod uri;

pub use context::{AvatarContext, AvatarPayload};
pub use metadata::{AvatarMetadata, BodyType, OutfitGender};
pub use uri::AvatarUri;
