pub mod config;
pub mod error;
pub mod paths;
pub mod platform;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use paths::Paths;
pub use platform::PlatformProfile;
pub use types::{ChatMessage, LLMResponse, TaskRequest, ToolCallRequest};
