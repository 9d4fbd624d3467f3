pub mod models;
pub mod providers;
mod service;

pub use models::*;
pub use providers::{ProviderConfig, ProviderError};
pub use service::*;
