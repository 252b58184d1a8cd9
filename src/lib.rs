pub mod config;
pub mod engine;
pub mod extractor;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
