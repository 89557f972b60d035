// Application layer - use cases and orchestration on top of the repository.

pub mod error;
pub mod reporting;
pub mod service;
pub mod settings;

pub use error::*;
pub use reporting::*;
pub use service::*;
pub use settings::*;
