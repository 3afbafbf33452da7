// Load orchestration on top of the pipeline and stages.

pub mod loader;

pub use loader::AvatarLoader;
