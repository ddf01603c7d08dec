//! Text rendering for tool responses.
//!
//! Tool results are plain text blocks; these builders keep their layout in
//! one place so the dispatcher only decides *what* to report.

mod builder;

pub use builder::{ExecutionReportBuilder, PolicyListingBuilder, truncate_command};
