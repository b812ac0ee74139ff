//! Infrastructure Layer
//!
//! Adapters for the outbound ports.

pub mod gateway;
pub mod messaging;
pub mod persistence;

pub use gateway::{HttpPaymentGateway, ScriptedGateway, ScriptedResponse};
pub use messaging::{NoOpEventPublisher, RecordingEventPublisher, TracingEventPublisher};
pub use persistence::{CatalogSeed, InMemoryCourseCatalog, InMemoryRecordStore, InMemoryStudentDirectory};
