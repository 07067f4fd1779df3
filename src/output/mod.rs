//! Output module for run reports and store statistics
//!
//! This module handles:
//! - The end-of-run harvest summary
//! - The liveness sweep report
//! - Statistics over stored records

mod report;
pub mod stats;

pub use report::{format_liveness, format_summary, print_liveness, print_summary};
pub use stats::{format_statistics, print_statistics};
