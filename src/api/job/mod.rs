pub mod dto;
pub mod handlers;
pub mod locks;
pub mod models;
pub mod service;

// Re-export commonly used types
pub use models::{Job, JobKind, JobState};
pub use service::{JobOrchestrator, ServiceError};
