//! Domain module
//!
//! Value objects, the two payment aggregates and their events. No I/O.

pub mod aggregates;
pub mod events;
pub mod value_objects;

pub use aggregates::*;
pub use events::*;
pub use value_objects::*;
