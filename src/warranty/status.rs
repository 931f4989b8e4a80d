use chrono::NaiveDate;

use super::duration::parse_warranty_duration;
use super::schedule::{build_alert_schedule, ReminderPreferences};
use super::ClassifyError;
use crate::config::EXPIRING_SOON_WINDOW_DAYS;
use crate::models::{WarrantyState, WarrantyStatus};

/// Classify a warranty relative to `reference_date`.
///
/// A missing purchase date or an unreadable warranty period yields
/// `Unknown` (zero days, no expiry, no reminders); that is the only way to
/// get `Unknown`. Otherwise the expiry date is `purchase_date + period`
/// and the state follows from the signed number of days left:
///
/// | days left | state          |
/// |-----------|----------------|
/// | `< 0`     | `Expired`      |
/// | `0..=30`  | `ExpiringSoon` |
/// | `> 30`    | `Active`       |
///
/// Pure: the same inputs always produce the same status.
pub fn classify(
    purchase_date: Option<NaiveDate>,
    warranty_period: Option<&str>,
    reference_date: NaiveDate,
) -> Result<WarrantyStatus, ClassifyError> {
    let (Some(purchased), Some(period)) = (purchase_date, warranty_period) else {
        return Ok(WarrantyStatus::unknown());
    };
    let Some(duration) = parse_warranty_duration(period) else {
        return Ok(WarrantyStatus::unknown());
    };

    let expiry_date = duration
        .add_to(purchased)
        .ok_or_else(|| ClassifyError::DateOverflow {
            purchase_date: purchased,
            period: period.to_string(),
        })?;

    let days_until_expiry = (expiry_date - reference_date).num_days();

    Ok(WarrantyStatus {
        state: state_for(days_until_expiry),
        days_until_expiry,
        expiry_date: Some(expiry_date),
        alert_schedule: build_alert_schedule(
            expiry_date,
            reference_date,
            &ReminderPreferences::default(),
        ),
    })
}

/// Map signed days-until-expiry to a state.
pub fn state_for(days_until_expiry: i64) -> WarrantyState {
    if days_until_expiry < 0 {
        WarrantyState::Expired
    } else if days_until_expiry <= EXPIRING_SOON_WINDOW_DAYS {
        WarrantyState::ExpiringSoon
    } else {
        WarrantyState::Active
    }
}
