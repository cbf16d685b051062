//! # Ledger Summaries
//!
//! Aggregations behind the home dashboard, the daily closing and the
//! reports: balance, per-day series, expenses by category, sales by product,
//! inventory valuation and debt totals.
//!
//! ## Sales Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two sale shapes live in the same ledger:                               │
//! │                                                                         │
//! │  single-item  { productId, quantity, amount }                           │
//! │     revenue = amount, cost = product.costPrice × quantity               │
//! │                                                                         │
//! │  multi-item   { items: [{productId, productName, quantity, salePrice}] }│
//! │     revenue = salePrice × quantity per line, cost as above              │
//! │                                                                         │
//! │  sales_by_product() folds both into one row per product.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cost uses the product's current cost price; a line whose product was
//! deleted keeps its revenue and reports zero cost.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Category, Debt, DebtDirection, EntryKind, LedgerEntry, PaymentMethod, Product};

// =============================================================================
// Balance
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BalanceSummary {
    pub total_income: Money,
    pub total_expense: Money,
    pub net: Money,
}

impl BalanceSummary {
    pub fn of<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a LedgerEntry>,
    {
        let mut summary = BalanceSummary::default();
        for entry in entries {
            summary.add(entry);
        }
        summary
    }

    fn add(&mut self, entry: &LedgerEntry) {
        match entry.kind {
            EntryKind::Income => self.total_income += entry.amount,
            EntryKind::Expense => self.total_expense += entry.amount,
        }
        self.net = self.total_income - self.total_expense;
    }
}

// =============================================================================
// Daily Closing
// =============================================================================

/// The cash-register close for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DailyClosing {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub balance: BalanceSummary,
    pub entry_count: usize,
    /// Income per payment method; sales without one are not listed.
    pub by_payment_method: Vec<(PaymentMethod, Money)>,
}

/// Closes `date` as seen in the time zone of `tz`.
pub fn daily_closing<Tz: TimeZone>(entries: &[LedgerEntry], date: NaiveDate, tz: &Tz) -> DailyClosing {
    let of_day: Vec<&LedgerEntry> = entries
        .iter()
        .filter(|e| e.created_at.with_timezone(tz).date_naive() == date)
        .collect();

    let mut by_method: HashMap<PaymentMethod, Money> = HashMap::new();
    for entry in of_day.iter().filter(|e| e.is_income()) {
        if let Some(method) = entry.payment_method {
            *by_method.entry(method).or_default() += entry.amount;
        }
    }

    DailyClosing {
        date,
        balance: BalanceSummary::of(of_day.iter().copied()),
        entry_count: of_day.len(),
        by_payment_method: PaymentMethod::ALL
            .iter()
            .filter_map(|m| by_method.get(m).map(|total| (*m, *total)))
            .collect(),
    }
}

// =============================================================================
// Series & Categories
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DayTotals {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub income: Money,
    pub expense: Money,
}

/// Income and expense per day for the `days` days ending at `today`,
/// oldest first. Days without entries are present with zeros.
pub fn daily_series<Tz: TimeZone>(
    entries: &[LedgerEntry],
    today: NaiveDate,
    days: u32,
    tz: &Tz,
) -> Vec<DayTotals> {
    let mut series: Vec<DayTotals> = (0..days)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(u64::from(back))))
        .map(|date| DayTotals {
            date,
            income: Money::zero(),
            expense: Money::zero(),
        })
        .collect();

    for entry in entries {
        let day = entry.created_at.with_timezone(tz).date_naive();
        if let Some(slot) = series.iter_mut().find(|s| s.date == day) {
            match entry.kind {
                EntryKind::Income => slot.income += entry.amount,
                EntryKind::Expense => slot.expense += entry.amount,
            }
        }
    }
    series
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryTotal {
    pub category_id: String,
    pub name: String,
    pub total: Money,
}

/// Expense totals per category, largest first. Uncategorized expenses and
/// entries pointing at a deleted category are left out.
pub fn expenses_by_category(entries: &[LedgerEntry], categories: &[Category]) -> Vec<CategoryTotal> {
    let names: HashMap<&str, &str> = categories
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();

    let mut totals: BTreeMap<&str, Money> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.is_expense()) {
        if let Some(id) = entry.category_id.as_deref() {
            if names.contains_key(id) {
                *totals.entry(id).or_default() += entry.amount;
            }
        }
    }

    let mut rows: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(id, total)| CategoryTotal {
            category_id: id.to_string(),
            name: names.get(id).copied().unwrap_or_default().to_string(),
            total,
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    rows
}

/// Entries created in `[start, end]`.
pub fn entries_between<'a, Tz: TimeZone>(
    entries: &'a [LedgerEntry],
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
) -> Vec<&'a LedgerEntry> {
    entries
        .iter()
        .filter(|e| e.created_at >= *start && e.created_at <= *end)
        .collect()
}

// =============================================================================
// Sales by Product
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductSales {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub revenue: Money,
    pub cost: Money,
    pub gross_profit: Money,
}

/// One row per product sold, by revenue descending.
pub fn sales_by_product(entries: &[LedgerEntry], products: &[Product]) -> Vec<ProductSales> {
    let catalog: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut rows: HashMap<String, ProductSales> = HashMap::new();

    let mut record = |id: &str, name: &str, quantity: i64, revenue: Money| {
        let unit_cost = catalog.get(id).map(|p| p.cost_price).unwrap_or_default();
        let row = rows.entry(id.to_string()).or_insert_with(|| ProductSales {
            product_id: id.to_string(),
            name: name.to_string(),
            quantity: 0,
            revenue: Money::zero(),
            cost: Money::zero(),
            gross_profit: Money::zero(),
        });
        row.quantity += quantity;
        row.revenue += revenue;
        row.cost += unit_cost.multiply_quantity(quantity);
        row.gross_profit = row.revenue - row.cost;
    };

    for entry in entries.iter().filter(|e| e.is_income()) {
        if let Some(items) = &entry.items {
            for item in items {
                record(&item.product_id, &item.product_name, item.quantity, item.line_total());
            }
        } else if let (Some(id), Some(quantity)) = (entry.product_id.as_deref(), entry.quantity) {
            // Single-item sales only count while the product still exists.
            if let Some(product) = catalog.get(id) {
                record(id, &product.name, quantity, entry.amount);
            }
        }
    }

    let mut rows: Vec<ProductSales> = rows.into_values().collect();
    rows.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    rows
}

// =============================================================================
// Inventory & Debts
// =============================================================================

/// Σ(stock × cost price).
pub fn inventory_value(products: &[Product]) -> Money {
    products.iter().map(Product::stock_value).sum()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DebtTotals {
    /// Owed to the business.
    pub receivable: Money,
    /// Owed by the business.
    pub payable: Money,
}

pub fn debt_totals(debts: &[Debt]) -> DebtTotals {
    let mut totals = DebtTotals::default();
    for debt in debts {
        match debt.direction {
            DebtDirection::Receivable => totals.receivable += debt.current_balance,
            DebtDirection::Payable => totals.payable += debt.current_balance,
        }
    }
    totals
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LineItem;
    use chrono::{Utc, TimeZone};

    fn entry(kind: EntryKind, cents: i64, day: u32) -> LedgerEntry {
        LedgerEntry {
            id: format!("{:?}-{}-{}", kind, cents, day),
            owner_id: "owner".to_string(),
            kind,
            amount: Money::from_cents(cents),
            concept: "x".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap(),
            category_id: None,
            product_id: None,
            quantity: None,
            items: None,
            payment_method: None,
            discount_amount: None,
        }
    }

    fn product(id: &str, cost: i64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            owner_id: "owner".to_string(),
            name: format!("Product {}", id),
            cost_price: Money::from_cents(cost),
            sale_price: Money::from_cents(cost * 2),
            stock,
            barcode: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_balance_summary() {
        let entries = vec![
            entry(EntryKind::Income, 1000, 1),
            entry(EntryKind::Income, 500, 2),
            entry(EntryKind::Expense, 300, 2),
        ];
        let summary = BalanceSummary::of(&entries);
        assert_eq!(summary.total_income.cents(), 1500);
        assert_eq!(summary.total_expense.cents(), 300);
        assert_eq!(summary.net.cents(), 1200);
    }

    #[test]
    fn test_daily_closing_groups_payment_methods() {
        let mut cash = entry(EntryKind::Income, 1000, 5);
        cash.payment_method = Some(PaymentMethod::Cash);
        let mut card = entry(EntryKind::Income, 700, 5);
        card.payment_method = Some(PaymentMethod::Card);
        let other_day = entry(EntryKind::Income, 9999, 6);
        let expense = entry(EntryKind::Expense, 200, 5);

        let closing = daily_closing(
            &[cash, card, other_day, expense],
            NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
            &Utc,
        );
        assert_eq!(closing.entry_count, 3);
        assert_eq!(closing.balance.net.cents(), 1500);
        assert_eq!(
            closing.by_payment_method,
            vec![
                (PaymentMethod::Cash, Money::from_cents(1000)),
                (PaymentMethod::Card, Money::from_cents(700)),
            ]
        );
    }

    #[test]
    fn test_daily_series_fills_gaps() {
        let entries = vec![entry(EntryKind::Income, 1000, 9), entry(EntryKind::Expense, 50, 7)];
        let series = daily_series(&entries, NaiveDate::from_ymd_opt(2024, 6, 9).unwrap(), 7, &Utc);

        assert_eq!(series.len(), 7);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(series[6].income.cents(), 1000);
        assert_eq!(series[4].expense.cents(), 50);
        assert!(series[5].income.is_zero());
    }

    #[test]
    fn test_expenses_by_category_skips_uncategorized() {
        let rent = Category {
            id: "c1".to_string(),
            owner_id: "owner".to_string(),
            name: "Alquiler".to_string(),
            kind: EntryKind::Expense,
            created_at: Utc::now(),
        };
        let mut a = entry(EntryKind::Expense, 400, 1);
        a.category_id = Some("c1".to_string());
        let mut b = entry(EntryKind::Expense, 100, 2);
        b.category_id = Some("c1".to_string());
        let loose = entry(EntryKind::Expense, 999, 3);

        let rows = expenses_by_category(&[a, b, loose], &[rent]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Alquiler");
        assert_eq!(rows[0].total.cents(), 500);
    }

    #[test]
    fn test_sales_by_product_counts_both_shapes() {
        let products = vec![product("A", 400, 3)];

        let mut legacy = entry(EntryKind::Income, 2000, 1);
        legacy.product_id = Some("A".to_string());
        legacy.quantity = Some(2);

        let mut multi = entry(EntryKind::Income, 1900, 2);
        multi.items = Some(vec![
            LineItem {
                product_id: "A".to_string(),
                product_name: "Product A".to_string(),
                quantity: 1,
                sale_price: Money::from_cents(1000),
            },
            LineItem {
                product_id: "gone".to_string(),
                product_name: "Old thing".to_string(),
                quantity: 2,
                sale_price: Money::from_cents(500),
            },
        ]);

        let rows = sales_by_product(&[legacy, multi], &products);
        assert_eq!(rows.len(), 2);

        let a = &rows[0];
        assert_eq!(a.product_id, "A");
        assert_eq!(a.quantity, 3);
        assert_eq!(a.revenue.cents(), 3000);
        assert_eq!(a.cost.cents(), 1200);
        assert_eq!(a.gross_profit.cents(), 1800);

        let gone = &rows[1];
        assert_eq!(gone.name, "Old thing");
        assert!(gone.cost.is_zero());
    }

    #[test]
    fn test_inventory_and_debt_totals() {
        let products = vec![product("A", 400, 3), product("B", 100, 0)];
        assert_eq!(inventory_value(&products).cents(), 1200);
        assert!(debt_totals(&[]).receivable.is_zero());
    }
}
