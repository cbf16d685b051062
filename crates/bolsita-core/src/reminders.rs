//! # Reminders
//!
//! Low-stock products and debts coming due. Both are pure filters over data
//! the caller already holds; the clock is passed in.

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Debt, Product};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
pub const DEFAULT_DUE_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettings {
    /// Products at or below this stock are flagged.
    pub low_stock_threshold: i64,
    /// Days after today included in the due window.
    pub due_window_days: u32,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        ReminderSettings {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            due_window_days: DEFAULT_DUE_WINDOW_DAYS,
        }
    }
}

/// Half-open instant range `[start, end)`: from the start of today to the
/// start of the day after `today + days`, in the caller's time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DueWindow {
    pub fn starting_today<Tz: TimeZone>(now: &DateTime<Tz>, days: u32) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let after_last = today
            .checked_add_days(Days::new(u64::from(days) + 1))
            .unwrap_or(today);

        let to_utc = |date: chrono::NaiveDate| {
            let local = date.and_time(NaiveTime::MIN);
            tz.from_local_datetime(&local)
                .earliest()
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&local))
        };

        DueWindow {
            start: to_utc(today),
            end: to_utc(after_last),
        }
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start && *instant < self.end
    }
}

/// Products whose stock is at or below `threshold`, lowest stock first.
pub fn low_stock(products: &[Product], threshold: i64) -> Vec<&Product> {
    let mut flagged: Vec<&Product> = products.iter().filter(|p| p.stock <= threshold).collect();
    flagged.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
    flagged
}

/// Unsettled debts with a due date inside `window`, soonest first.
pub fn upcoming_debts<'a>(debts: &'a [Debt], window: &DueWindow) -> Vec<&'a Debt> {
    let mut due: Vec<&Debt> = debts
        .iter()
        .filter(|d| !d.is_settled())
        .filter(|d| d.due_date.as_ref().is_some_and(|due| window.contains(due)))
        .collect();
    due.sort_by_key(|d| d.due_date);
    due
}

/// Both reminder lists at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub low_stock: Vec<Product>,
    pub upcoming_debts: Vec<Debt>,
}

impl Reminders {
    pub fn collect<Tz: TimeZone>(
        products: &[Product],
        debts: &[Debt],
        now: &DateTime<Tz>,
        settings: &ReminderSettings,
    ) -> Self {
        let window = DueWindow::starting_today(now, settings.due_window_days);
        Reminders {
            low_stock: low_stock(products, settings.low_stock_threshold)
                .into_iter()
                .cloned()
                .collect(),
            upcoming_debts: upcoming_debts(debts, &window).into_iter().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.low_stock.is_empty() && self.upcoming_debts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::DebtDirection;
    use chrono::Duration;

    fn product(name: &str, stock: i64) -> Product {
        Product {
            id: name.to_string(),
            owner_id: "owner".to_string(),
            name: name.to_string(),
            cost_price: Money::from_cents(100),
            sale_price: Money::from_cents(200),
            stock,
            barcode: None,
            created_at: Utc::now(),
        }
    }

    fn debt(id: &str, due: Option<DateTime<Utc>>, balance: i64) -> Debt {
        Debt {
            id: id.to_string(),
            owner_id: "owner".to_string(),
            direction: DebtDirection::Receivable,
            person_name: "Ana".to_string(),
            initial_amount: Money::from_cents(5000),
            current_balance: Money::from_cents(balance),
            concept: "Fiado".to_string(),
            created_at: Utc::now(),
            due_date: due,
        }
    }

    #[test]
    fn test_low_stock_includes_threshold() {
        let products = vec![product("a", 6), product("b", 5), product("c", 0)];
        let flagged = low_stock(&products, 5);
        let names: Vec<&str> = flagged.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[test]
    fn test_due_window_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 15, 30, 0).unwrap();
        let window = DueWindow::starting_today(&now, 7);

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 6, 18, 0, 0, 0).unwrap());

        // Earlier today still counts; the last day counts until midnight.
        assert!(window.contains(&Utc.with_ymd_and_hms(2024, 6, 10, 1, 0, 0).unwrap()));
        assert!(window.contains(&Utc.with_ymd_and_hms(2024, 6, 17, 23, 59, 59).unwrap()));
        assert!(!window.contains(&Utc.with_ymd_and_hms(2024, 6, 9, 23, 59, 59).unwrap()));
        assert!(!window.contains(&Utc.with_ymd_and_hms(2024, 6, 18, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_upcoming_debts_filters_and_sorts() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();
        let debts = vec![
            debt("late", Some(now + Duration::days(6)), 100),
            debt("soon", Some(now + Duration::days(1)), 100),
            debt("past", Some(now - Duration::days(2)), 100),
            debt("far", Some(now + Duration::days(30)), 100),
            debt("none", None, 100),
            debt("settled", Some(now + Duration::days(2)), 0),
        ];

        let reminders = Reminders::collect(&[], &debts, &now, &ReminderSettings::default());
        let ids: Vec<&str> = reminders.upcoming_debts.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["soon", "late"]);
    }
}
