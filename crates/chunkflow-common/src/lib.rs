//! Chunkflow-Common: Shared types, IDs, and errors.
//!
//! This crate provides the vocabulary shared by the chunkflow crates:
//!
//! - **Typed IDs**: UUID wrappers identifying sample buffers
//! - **Core Types**: selection triggers and microsecond time ranges
//! - **Error Handling**: the validation error type and result alias
//!
//! # Examples
//!
//! ```
//! use chunkflow_common::{SelectionTrigger, TimeRange, Error};
//!
//! let range = TimeRange::new(0, 2_000_000).unwrap();
//! assert_eq!(range.duration_us(), 2_000_000);
//!
//! assert_eq!(SelectionTrigger::Adaptive.code(), 3);
//!
//! assert!(matches!(TimeRange::new(10, 5), Err(Error::InvalidInput(_))));
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
