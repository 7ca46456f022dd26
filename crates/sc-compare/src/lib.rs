//! Drift detection between client-side and server-side scoring dumps.
//!
//! Loads two loosely-shaped JSON dumps, aligns their records by timestamp,
//! compares weather, derived and scoring fields within per-field tolerances
//! and reports every mismatch.

pub mod align;
pub mod diff;
pub mod dump;
pub mod record;
pub mod report;
pub mod time;
pub mod tolerance;

pub use diff::{FieldDiff, compare_records};
pub use dump::{DumpError, load_dump};
pub use record::{Record, Timestamp};
pub use report::ComparisonReport;
pub use tolerance::{ToleranceTable, approx_equal};
