//! # bolsita-report: Documents for Mi Bolsita
//!
//! Read-only views over store data: spreadsheet exports, PDF reports and
//! receipts, plus the inventory sheet reader used for bulk import.
//!
//! ## Module Organization
//!
//! - [`import`] - Inventory sheet (xlsx or CSV) into `NewProduct` rows
//! - [`spreadsheet`] - xlsx workbooks for inventory, statement, sales, debts
//! - [`pdf`] - Paginated A4 reports and the 80 mm receipt
//! - [`error`] - Report error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bolsita_report::{import::read_inventory_file, pdf::inventory_pdf};
//!
//! let rows = read_inventory_file(Path::new("inventario.xlsx"))?;
//! let imported = shop.products().import(rows).await?;
//!
//! let products = shop.products().list().await?;
//! std::fs::write("inventario.pdf", inventory_pdf(&products, today)?)?;
//! ```

pub mod error;
pub mod import;
pub mod pdf;
pub mod spreadsheet;

pub use error::{ReportError, ReportResult};
pub use import::{read_inventory, read_inventory_file, read_inventory_xlsx};
pub use pdf::{
    daily_closing_pdf, debts_pdf, inventory_pdf, receipt_pdf, sales_pdf, statement_pdf, Period,
    Receipt,
};
pub use spreadsheet::{
    debts_workbook, inventory_workbook, sales_workbook, statement_workbook, Cell, Sheet, Workbook,
};
