use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a package runs. Calendar months keep the day-of-month where the
/// target month allows it (Jan 31 + 1 month lands on the last day of
/// February), which is the billing convention the rest of the system expects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "unit", content = "count")]
pub enum PackageTerm {
    Days(u32),
    Months(u32),
}

impl PackageTerm {
    /// Derived end of the service window. `None` only on calendar overflow.
    pub fn end_date(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            PackageTerm::Days(n) => start.checked_add_days(Days::new(u64::from(*n))),
            PackageTerm::Months(n) => start.checked_add_months(Months::new(*n)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PackageTerm::Days(n) => format!("{n} day(s)"),
            PackageTerm::Months(n) => format!("{n} month(s)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageStatus {
    Active,
    Inactive,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Active => "ACTIVE",
            PackageStatus::Inactive => "INACTIVE",
        }
    }
}

impl std::str::FromStr for PackageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(PackageStatus::Active),
            "INACTIVE" => Ok(PackageStatus::Inactive),
            other => Err(format!("unknown package status: {other}")),
        }
    }
}

/// A purchasable duration/price unit for an amenity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmenityPackage {
    pub package_id: Uuid,
    pub amenity_id: Uuid,
    pub name: String,
    pub price_vnd: i64,
    pub term: PackageTerm,
    pub status: PackageStatus,
}

impl AmenityPackage {
    pub fn new(
        amenity_id: Uuid,
        name: impl Into<String>,
        price_vnd: i64,
        term: PackageTerm,
    ) -> Self {
        Self {
            package_id: Uuid::new_v4(),
            amenity_id,
            name: name.into(),
            price_vnd,
            term,
            status: PackageStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PackageStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_term_advances_calendar_months() {
        let term = PackageTerm::Months(1);
        assert_eq!(
            term.end_date(date(2024, 6, 1)),
            Some(date(2024, 7, 1))
        );
    }

    #[test]
    fn month_term_clamps_to_end_of_shorter_month() {
        let term = PackageTerm::Months(1);
        assert_eq!(
            term.end_date(date(2024, 1, 31)),
            Some(date(2024, 2, 29))
        );
    }

    #[test]
    fn day_term_adds_exact_days() {
        let term = PackageTerm::Days(3);
        assert_eq!(
            term.end_date(date(2024, 12, 30)),
            Some(date(2025, 1, 2))
        );
    }

    #[test]
    fn multi_month_term() {
        let term = PackageTerm::Months(3);
        assert_eq!(
            term.end_date(date(2024, 11, 15)),
            Some(date(2025, 2, 15))
        );
    }
}
