use thiserror::Error;

mod image;
pub use image::*;
mod model;
pub use model::*;
mod ingest;
pub use ingest::*;
mod ops;
pub use ops::*;

#[derive(Debug, Error)]
pub enum StoryboardError {
    #[error("image reference is not a data URL")]
    NotDataUrl,
    #[error("image payload decode failed: {0}")]
    PayloadDecode(#[from] base64::DecodeError),
}
