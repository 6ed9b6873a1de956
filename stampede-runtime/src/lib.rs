pub mod report;
pub mod runtime;

mod error;

pub use crate::error::RuntimeError;
pub use crate::report::ReportFormat;
pub use crate::runtime::{Protocol, StampedeCli, StampedeRuntime};
