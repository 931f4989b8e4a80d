//! Warranty lifecycle rules: period parsing, status classification and
//! reminder scheduling. Everything here is pure and clock-free; callers pass
//! the reference date in.

pub mod duration;
pub mod schedule;
pub mod status;

pub use duration::*;
pub use schedule::*;
pub use status::*;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Expiry date out of range for purchase on {purchase_date} with period \"{period}\"")]
    DateOverflow {
        purchase_date: NaiveDate,
        period: String,
    },
}
