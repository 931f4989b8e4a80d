use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Product, ReminderKind};

/// Which expiry reminders the user wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPreferences {
    pub thirty_day: bool,
    pub seven_day: bool,
    pub day_of: bool,
}

impl Default for ReminderPreferences {
    fn default() -> Self {
        Self {
            thirty_day: true,
            seven_day: true,
            day_of: true,
        }
    }
}

impl ReminderPreferences {
    pub fn is_enabled(&self, kind: ReminderKind) -> bool {
        match kind {
            ReminderKind::ThirtyDaysBefore => self.thirty_day,
            ReminderKind::SevenDaysBefore => self.seven_day,
            ReminderKind::DayOf => self.day_of,
        }
    }
}

/// Date on which `kind` fires for a warranty expiring on `expiry_date`.
pub fn reminder_date(expiry_date: NaiveDate, kind: ReminderKind) -> Option<NaiveDate> {
    expiry_date.checked_sub_days(Days::new(kind.lead_days().unsigned_abs()))
}

/// Enabled reminders (30 days before, 7 days before, day of expiry) that
/// fall strictly after `reference_date`, ascending.
pub fn build_alert_schedule(
    expiry_date: NaiveDate,
    reference_date: NaiveDate,
    prefs: &ReminderPreferences,
) -> Vec<NaiveDate> {
    ReminderKind::all()
        .iter()
        .filter(|kind| prefs.is_enabled(**kind))
        .filter_map(|kind| reminder_date(expiry_date, *kind))
        .filter(|date| *date > reference_date)
        .collect()
}

/// A reminder that fires on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueReminder {
    pub product_id: Uuid,
    pub product: String,
    pub kind: ReminderKind,
    pub expiry_date: NaiveDate,
}

/// Reminders due on `date` across `products`, in catalog order.
/// Computed from each product's expiry date, not its stored schedule.
pub fn due_reminders(
    products: &[Product],
    date: NaiveDate,
    prefs: &ReminderPreferences,
) -> Vec<DueReminder> {
    let mut due = Vec::new();
    for product in products {
        let Some(expiry_date) = product.warranty_status.expiry_date else {
            continue;
        };
        for kind in ReminderKind::all() {
            if !prefs.is_enabled(*kind) {
                continue;
            }
            if reminder_date(expiry_date, *kind) == Some(date) {
                due.push(DueReminder {
                    product_id: product.id,
                    product: product.invoice_details.display_name(),
                    kind: *kind,
                    expiry_date,
                });
            }
        }
    }
    due
}
