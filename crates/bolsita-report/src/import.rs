//! # Inventory Import
//!
//! Reads an inventory sheet into products ready for
//! `ProductRepository::import`. The sheet is the first worksheet of an
//! `.xlsx` workbook ([`read_inventory_xlsx`]) or a CSV file
//! ([`read_inventory`]); both go through the same row rules.
//!
//! ## Columns
//! ```text
//! ┌────────────┬──────────────┬────────────────────────────────────────┐
//! │ Column     │ Also accepts │ Parsed as                              │
//! ├────────────┼──────────────┼────────────────────────────────────────┤
//! │ Name       │ Nombre       │ trimmed; blank rows are dropped        │
//! │ Cost       │ Costo        │ money, 0 when absent or not a number   │
//! │ SalePrice  │ Venta        │ money, 0 when absent or not a number   │
//! │ Stock      │              │ floored, negatives clamp to 0          │
//! │ Barcode    │ CodigoBarras │ trimmed, empty means none              │
//! └────────────┴──────────────┴────────────────────────────────────────┘
//! ```
//! Header matching ignores case and surrounding spaces. Columns may come in
//! any order and unknown columns are ignored.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};

use bolsita_core::{Money, NewProduct};

use crate::error::{ReportError, ReportResult};

const NAME: &[&str] = &["name", "nombre"];
const COST: &[&str] = &["cost", "costo"];
const SALE_PRICE: &[&str] = &["saleprice", "venta"];
const STOCK: &[&str] = &["stock"];
const BARCODE: &[&str] = &["barcode", "codigobarras"];

/// Column positions found in the header row.
#[derive(Debug, Default)]
struct Columns {
    name: usize,
    cost: Option<usize>,
    sale_price: Option<usize>,
    stock: Option<usize>,
    barcode: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &[String]) -> ReportResult<Self> {
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ReportError::Empty("inventory sheet has no header row"));
        }
        let find = |aliases: &[&str]| {
            headers
                .iter()
                .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
        };
        let Some(name) = find(NAME) else {
            return Err(ReportError::Empty("inventory sheet has no Name column"));
        };
        Ok(Columns {
            name,
            cost: find(COST),
            sale_price: find(SALE_PRICE),
            stock: find(STOCK),
            barcode: find(BARCODE),
        })
    }
}

/// Reads every CSV row with a non-blank name.
///
/// ## Errors
/// - `Empty` when the input has no header row or no name column
/// - `Csv` when the input is not valid CSV
pub fn read_inventory<R: Read>(reader: R) -> ReportResult<Vec<NewProduct>> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let columns = Columns::from_headers(&headers)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        rows.push(record?.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(products_from_rows(&columns, &rows))
}

/// Reads the first worksheet of an `.xlsx` workbook.
///
/// Numeric cells are read as the number they hold, so a `Costo` of `1.1`
/// imports as $1.10 and a numeric barcode keeps its digits.
///
/// ## Errors
/// - `Empty` when the workbook has no sheets, no header row or no name column
/// - `XlsxRead` when the file is not a readable workbook
pub fn read_inventory_xlsx<R: Read + Seek>(reader: R) -> ReportResult<Vec<NewProduct>> {
    let mut workbook: Xlsx<R> = Xlsx::new(reader)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ReportError::Empty("workbook has no sheets"))??;

    let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let Some(headers) = rows.next() else {
        return Err(ReportError::Empty("inventory sheet has no header row"));
    };
    let columns = Columns::from_headers(&headers)?;
    let rows: Vec<Vec<String>> = rows.collect();
    Ok(products_from_rows(&columns, &rows))
}

/// Picks the reader from the file extension: `.csv` is CSV, anything else
/// is read as an `.xlsx` workbook.
pub fn read_inventory_file(path: &Path) -> ReportResult<Vec<NewProduct>> {
    let file = BufReader::new(File::open(path)?);
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        read_inventory(file)
    } else {
        read_inventory_xlsx(file)
    }
}

/// Spreadsheet cell as the text the row rules parse.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(n) => n.to_string(),
        Data::Int(n) => n.to_string(),
        _ => String::new(),
    }
}

fn products_from_rows(columns: &Columns, rows: &[Vec<String>]) -> Vec<NewProduct> {
    let mut products = Vec::new();
    let mut dropped = 0usize;

    for row in rows {
        let cell = |column: Option<usize>| column.and_then(|i| row.get(i)).map(|c| c.trim());

        let name = cell(Some(columns.name)).unwrap_or_default();
        if name.is_empty() {
            dropped += 1;
            continue;
        }

        products.push(NewProduct {
            name: name.to_string(),
            cost_price: money_cell(cell(columns.cost)),
            sale_price: money_cell(cell(columns.sale_price)),
            stock: stock_cell(cell(columns.stock)),
            barcode: cell(columns.barcode)
                .filter(|b| !b.is_empty())
                .map(str::to_string),
        });
    }

    if dropped > 0 {
        warn!(dropped, "Dropped inventory rows without a name");
    }
    debug!(rows = products.len(), "Inventory sheet read");
    products
}

fn money_cell(cell: Option<&str>) -> Money {
    cell.and_then(Money::parse).unwrap_or_default()
}

fn stock_cell(cell: Option<&str>) -> i64 {
    cell.and_then(|c| c.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .map(|n| n.floor().max(0.0) as i64)
        .unwrap_or(0)
}

// =============================================================================
// Unit Tests
// =============================================================================
