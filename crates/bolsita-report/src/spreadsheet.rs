//! # Spreadsheet Exports
//!
//! Every export is a [`Workbook`] of named [`Sheet`]s, saved as one `.xlsx`
//! file with a sheet per table.
//!
//! ```text
//! Workbook "Reporte_Deudas"  ──► Reporte_Deudas_2026-10-17.xlsx
//!   ├── Sheet "Cuentas por Cobrar"
//!   └── Sheet "Cuentas por Pagar"
//! ```
//!
//! Money cells are numbers with the `"$"#,##0.00` format and dates are real
//! dates shown as `dd/mm/yyyy`, so totals and sorting work in any
//! spreadsheet program. Each sheet can also be written as CSV.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, TimeZone};
use csv::WriterBuilder;
use rust_xlsxwriter::{ExcelDateTime, Format};
use tracing::info;

use bolsita_core::summary::sales_by_product;
use bolsita_core::{Category, Debt, DebtDirection, LedgerEntry, Money, Product};

use crate::error::ReportResult;

/// Placeholder for an entry without a (known) category.
pub const NO_CATEGORY: &str = "N/A";

const MONEY_FORMAT: &str = "\"$\"#,##0.00";
const DATE_FORMAT: &str = "dd/mm/yyyy";

// =============================================================================
// Cells & Sheets
// =============================================================================

/// A typed cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Money(Money),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }
}

/// The text a CSV export writes for the cell.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(text) => f.write_str(text),
            Cell::Integer(n) => write!(f, "{}", n),
            Cell::Money(money) => write!(f, "{}", money.to_decimal()),
            Cell::Date(date) => write!(f, "{}", date.format("%d/%m/%Y")),
        }
    }
}

/// One table with a header row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    /// Column widths in characters.
    pub widths: Vec<f64>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn new(name: &str, columns: &[(&str, f64)]) -> Self {
        Sheet {
            name: name.to_string(),
            headers: columns.iter().map(|(h, _)| h.to_string()).collect(),
            widths: columns.iter().map(|(_, w)| *w).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows as the strings a CSV export would carry.
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(Cell::to_string).collect())
            .collect()
    }

    /// Writes the header row and every data row as CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> ReportResult<()> {
        let mut wrt = WriterBuilder::new().from_writer(writer);
        wrt.write_record(&self.headers)?;
        for row in self.text_rows() {
            wrt.write_record(&row)?;
        }
        wrt.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> ReportResult<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn write_worksheet(
        &self,
        worksheet: &mut rust_xlsxwriter::Worksheet,
        styles: &Styles,
    ) -> ReportResult<()> {
        worksheet.set_name(&self.name)?;

        for (col, header) in self.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, &styles.header)?;
        }
        for (col, width) in self.widths.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }

        for (index, row) in self.rows.iter().enumerate() {
            let r = (index + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let c = col as u16;
                match cell {
                    Cell::Text(text) => {
                        worksheet.write_string(r, c, text)?;
                    }
                    Cell::Integer(n) => {
                        worksheet.write_number(r, c, *n as f64)?;
                    }
                    Cell::Money(money) => {
                        let value = money.cents() as f64 / 100.0;
                        worksheet.write_number_with_format(r, c, value, &styles.money)?;
                    }
                    Cell::Date(date) => {
                        let value = ExcelDateTime::from_ymd(
                            date.year() as u16,
                            date.month() as u8,
                            date.day() as u8,
                        )?;
                        worksheet.write_datetime_with_format(r, c, &value, &styles.date)?;
                    }
                }
            }
        }
        Ok(())
    }
}

struct Styles {
    header: Format,
    money: Format,
    date: Format,
}

impl Styles {
    fn new() -> Self {
        Styles {
            header: Format::new().set_bold(),
            money: Format::new().set_num_format(MONEY_FORMAT),
            date: Format::new().set_num_format(DATE_FORMAT),
        }
    }
}

/// Named group of sheets, saved under a dated file stem.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub stem: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Builds the `.xlsx` file in memory.
    pub fn to_xlsx(&self) -> ReportResult<Vec<u8>> {
        let styles = Styles::new();
        let mut workbook = rust_xlsxwriter::Workbook::new();
        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            sheet.write_worksheet(worksheet, &styles)?;
        }
        Ok(workbook.save_to_buffer()?)
    }

    /// Writes `<stem>_<date>.xlsx` into `dir` and returns its path.
    pub fn save(&self, dir: &Path, date: NaiveDate) -> ReportResult<PathBuf> {
        let path = dir.join(file_name(&self.stem, date, "xlsx"));
        std::fs::write(&path, self.to_xlsx()?)?;
        info!(workbook = %self.stem, sheets = self.sheets.len(), path = %path.display(), "Spreadsheet saved");
        Ok(path)
    }

    /// Writes one CSV per sheet into `dir` and returns the paths written.
    ///
    /// Single-sheet workbooks are saved as `<stem>_<date>.csv`, others as
    /// `<stem>_<sheet>_<date>.csv`.
    pub fn save_csv(&self, dir: &Path, date: NaiveDate) -> ReportResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.sheets.len());
        for sheet in &self.sheets {
            let stem = if self.sheets.len() == 1 {
                self.stem.clone()
            } else {
                format!("{}_{}", self.stem, sheet.name)
            };
            let path = dir.join(file_name(&stem, date, "csv"));
            sheet.write_csv(File::create(&path)?)?;
            written.push(path);
        }
        info!(workbook = %self.stem, files = written.len(), "CSV sheets saved");
        Ok(written)
    }
}

/// `Reporte_Inventario` + 2026-10-17 + `xlsx` → `Reporte_Inventario_2026-10-17.xlsx`
pub fn file_name(stem: &str, date: NaiveDate, extension: &str) -> String {
    format!("{}_{}.{}", stem, date.format("%Y-%m-%d"), extension)
}

// =============================================================================
// Exports
// =============================================================================

pub fn inventory_workbook(products: &[Product]) -> Workbook {
    let mut sheet = Sheet::new(
        "Inventario",
        &[
            ("Producto", 30.0),
            ("Stock Actual", 15.0),
            ("Precio Costo", 15.0),
            ("Precio Venta", 15.0),
            ("Valor Total (Costo)", 20.0),
        ],
    );
    sheet.rows = products
        .iter()
        .map(|p| {
            vec![
                Cell::text(&p.name),
                Cell::Integer(p.stock),
                Cell::Money(p.cost_price),
                Cell::Money(p.sale_price),
                Cell::Money(p.stock_value()),
            ]
        })
        .collect();

    Workbook {
        stem: "Reporte_Inventario".to_string(),
        sheets: vec![sheet],
    }
}

/// Ledger entries with dates as seen in `tz`.
pub fn statement_workbook<Tz: TimeZone>(
    entries: &[LedgerEntry],
    categories: &[Category],
    tz: &Tz,
) -> Workbook {
    let mut sheet = Sheet::new(
        "Movimientos",
        &[
            ("Fecha", 12.0),
            ("Tipo", 10.0),
            ("Categoría", 20.0),
            ("Concepto", 30.0),
            ("Monto", 15.0),
        ],
    );
    sheet.rows = entries
        .iter()
        .map(|e| {
            vec![
                Cell::Date(e.created_at.with_timezone(tz).date_naive()),
                Cell::text(e.kind.label()),
                Cell::text(category_name(categories, e.category_id.as_deref())),
                Cell::text(&e.concept),
                Cell::Money(e.amount),
            ]
        })
        .collect();

    Workbook {
        stem: "Reporte_Financiero".to_string(),
        sheets: vec![sheet],
    }
}

pub fn sales_workbook(entries: &[LedgerEntry], products: &[Product]) -> Workbook {
    let mut sheet = Sheet::new(
        "Ventas",
        &[
            ("Producto", 30.0),
            ("Cantidad Vendida", 18.0),
            ("Ingresos Totales", 18.0),
            ("Costo de Venta", 18.0),
            ("Ganancia Bruta", 18.0),
        ],
    );
    sheet.rows = sales_by_product(entries, products)
        .into_iter()
        .map(|row| {
            vec![
                Cell::Text(row.name),
                Cell::Integer(row.quantity),
                Cell::Money(row.revenue),
                Cell::Money(row.cost),
                Cell::Money(row.gross_profit),
            ]
        })
        .collect();

    Workbook {
        stem: "Reporte_Ventas".to_string(),
        sheets: vec![sheet],
    }
}

/// Receivables and payables on separate sheets of one workbook.
pub fn debts_workbook(debts: &[Debt]) -> Workbook {
    let sheet_for = |name: &str, direction: DebtDirection| {
        let mut sheet = Sheet::new(
            name,
            &[("Persona", 25.0), ("Concepto", 30.0), ("Saldo Pendiente", 20.0)],
        );
        sheet.rows = debts
            .iter()
            .filter(|d| d.direction == direction)
            .map(|d| {
                vec![
                    Cell::text(&d.person_name),
                    Cell::text(&d.concept),
                    Cell::Money(d.current_balance),
                ]
            })
            .collect();
        sheet
    };

    Workbook {
        stem: "Reporte_Deudas".to_string(),
        sheets: vec![
            sheet_for("Cuentas por Cobrar", DebtDirection::Receivable),
            sheet_for("Cuentas por Pagar", DebtDirection::Payable),
        ],
    }
}

pub(crate) fn category_name<'a>(categories: &'a [Category], id: Option<&str>) -> &'a str {
    id.and_then(|id| categories.iter().find(|c| c.id == id))
        .map(|c| c.name.as_str())
        .unwrap_or(NO_CATEGORY)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bolsita_core::EntryKind;
    use calamine::{Data, Reader, Xlsx};
    use chrono::{TimeZone as _, Utc};
    use std::io::Cursor;

    fn product(name: &str, cost: i64, price: i64, stock: i64) -> Product {
        Product {
            id: name.to_lowercase(),
            owner_id: "o".to_string(),
            name: name.to_string(),
            cost_price: Money::from_cents(cost),
            sale_price: Money::from_cents(price),
            stock,
            barcode: None,
            created_at: Utc::now(),
        }
    }

    fn debt(name: &str, direction: DebtDirection, balance: i64) -> Debt {
        Debt {
            id: name.to_string(),
            owner_id: "o".to_string(),
            direction,
            person_name: name.to_string(),
            initial_amount: Money::from_cents(balance),
            current_balance: Money::from_cents(balance),
            concept: "Fiado".to_string(),
            created_at: Utc::now(),
            due_date: None,
        }
    }

    fn open(bytes: Vec<u8>) -> Xlsx<Cursor<Vec<u8>>> {
        Xlsx::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_inventory_rows() {
        let wb = inventory_workbook(&[product("Arroz", 80, 125, 10)]);
        let csv = wb.sheets[0].to_csv_string().unwrap();
        assert_eq!(
            csv,
            "Producto,Stock Actual,Precio Costo,Precio Venta,Valor Total (Costo)\n\
             Arroz,10,0.80,1.25,8.00\n"
        );
    }

    #[test]
    fn test_inventory_xlsx_has_numeric_cells() {
        let wb = inventory_workbook(&[product("Arroz", 80, 125, 10)]);
        let mut xlsx = open(wb.to_xlsx().unwrap());

        assert_eq!(xlsx.sheet_names(), vec!["Inventario".to_string()]);
        let range = xlsx.worksheet_range("Inventario").unwrap();
        assert_eq!(range.get((0, 0)), Some(&Data::String("Producto".to_string())));
        assert_eq!(range.get((1, 0)), Some(&Data::String("Arroz".to_string())));
        assert!(matches!(range.get((1, 1)), Some(Data::Float(n)) if *n == 10.0));
        assert!(matches!(range.get((1, 4)), Some(Data::Float(n)) if (*n - 8.0).abs() < 1e-9));
    }

    #[test]
    fn test_statement_uses_category_names() {
        let category = Category {
            id: "c1".to_string(),
            owner_id: "o".to_string(),
            name: "Renta".to_string(),
            kind: EntryKind::Expense,
            created_at: Utc::now(),
        };
        let entry = |id: &str, category_id: Option<&str>| LedgerEntry {
            id: id.to_string(),
            owner_id: "o".to_string(),
            kind: EntryKind::Expense,
            amount: Money::from_cents(25_000),
            concept: "Local".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap(),
            category_id: category_id.map(str::to_string),
            product_id: None,
            quantity: None,
            items: None,
            payment_method: None,
            discount_amount: None,
        };

        let wb = statement_workbook(
            &[entry("1", Some("c1")), entry("2", Some("gone"))],
            &[category],
            &Utc,
        );
        let rows = wb.sheets[0].text_rows();
        assert_eq!(rows[0], vec!["01/03/2026", "Gasto", "Renta", "Local", "250.00"]);
        assert_eq!(rows[1][2], NO_CATEGORY);
        assert_eq!(
            wb.sheets[0].rows[0][0],
            Cell::Date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
        );

        let mut xlsx = open(wb.to_xlsx().unwrap());
        let range = xlsx.worksheet_range("Movimientos").unwrap();
        assert!(matches!(range.get((1, 0)), Some(Data::DateTime(_))));
        assert!(matches!(range.get((1, 4)), Some(Data::Float(n)) if *n == 250.0));
    }

    #[test]
    fn test_debts_split_by_direction() {
        let wb = debts_workbook(&[
            debt("Carmen", DebtDirection::Receivable, 4500),
            debt("El Sol", DebtDirection::Payable, 30000),
            debt("Luis", DebtDirection::Receivable, 100),
        ]);
        assert_eq!(wb.sheets.len(), 2);
        assert_eq!(wb.sheets[0].rows.len(), 2);
        assert_eq!(wb.sheets[1].text_rows(), vec![vec!["El Sol", "Fiado", "300.00"]]);

        let mut xlsx = open(wb.to_xlsx().unwrap());
        assert_eq!(
            xlsx.sheet_names(),
            vec!["Cuentas por Cobrar".to_string(), "Cuentas por Pagar".to_string()]
        );
        let payables = xlsx.worksheet_range("Cuentas por Pagar").unwrap();
        assert_eq!(payables.get((1, 0)), Some(&Data::String("El Sol".to_string())));
    }

    #[test]
    fn test_save_writes_one_xlsx_and_csv_per_sheet() {
        let dir = std::env::temp_dir().join(format!("bolsita-sheets-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let wb = debts_workbook(&[debt("Carmen", DebtDirection::Receivable, 4500)]);

        let path = wb.save(&dir, date).unwrap();
        assert_eq!(path, dir.join("Reporte_Deudas_2026-10-17.xlsx"));
        assert!(std::fs::read(&path).unwrap().starts_with(b"PK"));

        let csvs = wb.save_csv(&dir, date).unwrap();
        assert_eq!(csvs.len(), 2);
        assert_eq!(
            csvs[0],
            dir.join("Reporte_Deudas_Cuentas por Cobrar_2026-10-17.csv")
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_name() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(file_name("Reporte_Ventas", date, "xlsx"), "Reporte_Ventas_2026-10-17.xlsx");
    }
}
