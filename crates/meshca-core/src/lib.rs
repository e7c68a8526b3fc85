//! # meshca core
//!
//! Foundation types shared by every meshca crate:
//!
//! - [`MeshcaError`]: the unified, request-facing error
//! - [`time`]: injectable clocks plus duration and relative-time expressions
//! - [`config`]: accumulating configuration validation

pub mod config;
pub mod errors;
pub mod time;

pub use config::{ConfigValidator, ValidationError};
pub use errors::{MeshcaError, Result};
pub use time::{FixedClock, PhysicalClock, SystemClock, TimeDuration};
