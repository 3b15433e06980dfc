//! vidredact Annotation Model
//!
//! Defines the data contracts for redaction annotations:
//! - **Regions:** Box, ellipse and polygon shapes bound to a frame number
//! - **Index:** Frame number to regions, in document order
//! - **Loader:** CVAT-style XML track documents
//!
//! All coordinates are source-frame pixels.

pub mod index;
pub mod loader;
pub mod region;

pub use index::*;
pub use loader::*;
pub use region::*;
