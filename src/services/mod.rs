pub mod engine; // Translation engine client and stub
pub mod error;
pub mod lifecycle;
pub mod resource_cache; // Single-flight per-database cache
pub mod schema_bootstrapper;
pub mod translation_service;
pub mod warmup_service;

pub use engine::{EngineError, RemoteEngine, StubEngine, TranslationEngine};
pub use error::*;
pub use lifecycle::*;
pub use resource_cache::*;
pub use schema_bootstrapper::*;
pub use translation_service::*;
pub use warmup_service::*;
