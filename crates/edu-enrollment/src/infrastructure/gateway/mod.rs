//! Payment gateway adapters

pub mod http;
pub mod scripted;

pub use http::HttpPaymentGateway;
pub use scripted::{ScriptedGateway, ScriptedResponse};
