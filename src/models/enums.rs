use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Confidence {
    High => "HIGH",
    Medium => "MEDIUM",
    Low => "LOW",
});

impl Default for Confidence {
    /// Unknown confidence is displayed as medium.
    fn default() -> Self {
        Self::Medium
    }
}

str_enum!(CatalogFilter {
    All => "all",
    ExpiringSoon => "expiring_soon",
    Expired => "expired",
    Manual => "manual",
});

impl Default for CatalogFilter {
    fn default() -> Self {
        Self::All
    }
}

impl CatalogFilter {
    /// Tab label shown by the presentation layer.
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::ExpiringSoon => "Expiring Soon",
            Self::Expired => "Expired",
            Self::Manual => "Manual Entry Required",
        }
    }
}

str_enum!(ReminderKind {
    ThirtyDaysBefore => "thirty_day",
    SevenDaysBefore => "seven_day",
    DayOf => "day_of",
});

impl ReminderKind {
    /// Days before expiry at which this reminder fires.
    pub fn lead_days(&self) -> i64 {
        match self {
            Self::ThirtyDaysBefore => 30,
            Self::SevenDaysBefore => 7,
            Self::DayOf => 0,
        }
    }

    /// Earliest reminder first.
    pub fn all() -> &'static [ReminderKind] {
        &[Self::ThirtyDaysBefore, Self::SevenDaysBefore, Self::DayOf]
    }
}
