//! # PDF Reports & Receipts
//!
//! Paginated A4 reports and the 80 mm sale receipt, drawn with printpdf's
//! built-in Helvetica fonts.
//!
//! ## Page Layout (A4 reports)
//! ```text
//! ┌──────────────────────────────── 210 mm ───────────────────────────────┐
//! │  Reporte de Inventario Actual                     ← title, 18 pt      │
//! │  Generado el: 17/10/2026                          ← subtitle, 11 pt   │
//! │                                                                       │
//! │  Valor Total del Inventario (a costo): $1,250.00  ← summary lines     │
//! │                                                                       │
//! │  Producto        Stock   Precio Costo   ...       ← table header      │
//! │  ──────────────────────────────────────────────                       │
//! │  Arroz              10          $0.80   ...       ← rows, 6 mm apart  │
//! │  ...                                                                  │
//! │                                         page break below 20 mm,       │
//! │                                         header repeated on next page  │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Built-in fonts carry no metrics here, so right alignment and truncation
//! use an average Helvetica glyph width.

use std::io::BufWriter;

use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};
use tracing::debug;

use bolsita_core::sale::{change_due, CartLine, SaleTotals};
use bolsita_core::summary::{
    debt_totals, inventory_value, sales_by_product, BalanceSummary, DailyClosing,
};
use bolsita_core::words::amount_in_words;
use bolsita_core::{Category, Debt, DebtDirection, LedgerEntry, Money, PaymentMethod, Product, UserProfile};

use crate::error::{ReportError, ReportResult};
use crate::spreadsheet::category_name;

const A4_WIDTH: f32 = 210.0;
const A4_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 14.0;
const BOTTOM: f32 = 20.0;
const ROW_HEIGHT: f32 = 6.0;

const RECEIPT_WIDTH: f32 = 80.0;
const RECEIPT_MARGIN: f32 = 5.0;

/// Points to millimetres.
const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph width, in em.
const AVG_GLYPH_EM: f32 = 0.5;

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_EM * PT_TO_MM
}

/// Cuts `text` to fit `width` mm, marking the cut with `..`.
fn fit(text: &str, width: f32, size: f32) -> String {
    if text_width(text, size) <= width {
        return text.to_string();
    }
    let max_chars = (width / (size * AVG_GLYPH_EM * PT_TO_MM)) as usize;
    let kept: String = text.chars().take(max_chars.saturating_sub(2)).collect();
    format!("{kept}..")
}

/// Greedy word wrap to lines no wider than `width` mm.
fn wrap(text: &str, width: f32, size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, size) > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn date_es(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

// =============================================================================
// Canvas
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// A table column: left edge, width and alignment.
#[derive(Debug, Clone, Copy)]
struct Column {
    title: &'static str,
    x: f32,
    width: f32,
    align: Align,
}

impl Column {
    const fn left(title: &'static str, x: f32, width: f32) -> Self {
        Column { title, x, width, align: Align::Left }
    }

    const fn right(title: &'static str, x: f32, width: f32) -> Self {
        Column { title, x, width, align: Align::Right }
    }
}

/// Current page plus a cursor that moves down the page.
struct Canvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    width: f32,
    height: f32,
    y: f32,
    pages: usize,
}

impl Canvas {
    fn new(title: &str, width: f32, height: f32) -> ReportResult<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(width), Mm(height), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;

        Ok(Canvas {
            doc,
            layer,
            regular,
            bold,
            width,
            height,
            y: height - 14.0,
            pages: 1,
        })
    }

    fn a4(title: &str) -> ReportResult<Self> {
        Canvas::new(title, A4_WIDTH, A4_HEIGHT)
    }

    fn font(&self, bold: bool) -> &IndirectFontRef {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), self.font(bold));
    }

    fn text_right(&self, text: &str, size: f32, right: f32, bold: bool) {
        self.text(text, size, right - text_width(text, size), bold);
    }

    fn text_center(&self, text: &str, size: f32, bold: bool) {
        self.text(text, size, (self.width - text_width(text, size)) / 2.0, bold);
    }

    fn rule(&self, from: f32, to: f32) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(from), Mm(self.y)), false),
                (Point::new(Mm(to), Mm(self.y)), false),
            ],
            is_closed: false,
        });
    }

    fn down(&mut self, mm: f32) {
        self.y -= mm;
    }

    /// Starts a new page when less than `needed` mm remain above the bottom margin.
    fn ensure_space(&mut self, needed: f32) -> bool {
        if self.y - needed >= BOTTOM {
            return false;
        }
        let (page, layer) = self.doc.add_page(Mm(self.width), Mm(self.height), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = self.height - 14.0;
        self.pages += 1;
        true
    }

    fn heading(&mut self, title: &str, subtitle: &str) {
        self.y = self.height - 22.0;
        self.text(title, 18.0, MARGIN, true);
        self.down(7.0);
        self.text(subtitle, 11.0, MARGIN, false);
        self.down(12.0);
    }

    fn table_header(&mut self, columns: &[Column]) {
        for col in columns {
            self.cell(col, col.title, 10.0, true);
        }
        self.down(3.5);
        self.rule(MARGIN, self.width - MARGIN);
        self.down(ROW_HEIGHT);
    }

    fn cell(&self, col: &Column, text: &str, size: f32, bold: bool) {
        let text = fit(text, col.width, size);
        match col.align {
            Align::Left => self.text(&text, size, col.x, bold),
            Align::Right => self.text_right(&text, size, col.x + col.width, bold),
        }
    }

    /// Draws a table, repeating the header on every page it spans.
    fn table(&mut self, columns: &[Column], rows: &[Vec<String>]) {
        self.ensure_space(ROW_HEIGHT * 3.0);
        self.table_header(columns);
        for row in rows {
            if self.ensure_space(ROW_HEIGHT) {
                self.table_header(columns);
            }
            for (col, value) in columns.iter().zip(row) {
                self.cell(col, value, 9.0, false);
            }
            self.down(ROW_HEIGHT);
        }
    }

    fn finish(self) -> ReportResult<Vec<u8>> {
        debug!(pages = self.pages, "PDF rendered");
        let mut writer = BufWriter::new(Vec::<u8>::new());
        self.doc
            .save(&mut writer)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| ReportError::Io(e.into_error()))
    }
}

// =============================================================================
// A4 Reports
// =============================================================================

/// Reporting period shown under a report title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    fn label(&self) -> String {
        format!("Período: {} al {}", date_es(self.start), date_es(self.end))
    }
}

/// Income statement: totals, net profit, then every entry.
pub fn statement_pdf<Tz: TimeZone>(
    entries: &[LedgerEntry],
    categories: &[Category],
    period: Period,
    tz: &Tz,
) -> ReportResult<Vec<u8>> {
    let mut canvas = Canvas::a4("Reporte de Estado de Resultados")?;
    canvas.heading("Reporte de Estado de Resultados", &period.label());

    let summary = BalanceSummary::of(entries);
    canvas.text("Resumen General", 12.0, MARGIN, false);
    canvas.down(7.0);
    canvas.text(&format!("Total Ingresos: {}", summary.total_income), 10.0, MARGIN, false);
    canvas.down(7.0);
    canvas.text(&format!("Total Gastos: {}", summary.total_expense), 10.0, MARGIN, false);
    canvas.down(9.0);
    canvas.text(&format!("Ganancia Neta: {}", summary.net), 11.0, MARGIN, true);
    canvas.down(10.0);

    let columns = [
        Column::left("Fecha", MARGIN, 24.0),
        Column::left("Tipo", 40.0, 18.0),
        Column::left("Categoría", 60.0, 36.0),
        Column::left("Concepto", 98.0, 62.0),
        Column::right("Monto", 162.0, 34.0),
    ];
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                date_es(e.created_at.with_timezone(tz).date_naive()),
                e.kind.label().to_string(),
                category_name(categories, e.category_id.as_deref()).to_string(),
                e.concept.clone(),
                e.amount.to_string(),
            ]
        })
        .collect();
    canvas.table(&columns, &rows);
    canvas.finish()
}

/// Quantity, revenue, cost and gross profit per product sold.
pub fn sales_pdf(entries: &[LedgerEntry], products: &[Product], period: Period) -> ReportResult<Vec<u8>> {
    let mut canvas = Canvas::a4("Reporte de Ventas por Producto")?;
    canvas.heading("Reporte de Ventas por Producto", &period.label());

    let columns = [
        Column::left("Producto", MARGIN, 60.0),
        Column::right("Cantidad Vendida", 76.0, 28.0),
        Column::right("Ingresos Totales", 106.0, 30.0),
        Column::right("Costo de Venta", 138.0, 28.0),
        Column::right("Ganancia Bruta", 168.0, 28.0),
    ];
    let rows: Vec<Vec<String>> = sales_by_product(entries, products)
        .into_iter()
        .map(|row| {
            vec![
                row.name,
                row.quantity.to_string(),
                row.revenue.to_string(),
                row.cost.to_string(),
                row.gross_profit.to_string(),
            ]
        })
        .collect();
    canvas.table(&columns, &rows);
    canvas.finish()
}

/// Current stock valued at cost.
pub fn inventory_pdf(products: &[Product], generated_on: NaiveDate) -> ReportResult<Vec<u8>> {
    let mut canvas = Canvas::a4("Reporte de Inventario Actual")?;
    canvas.heading(
        "Reporte de Inventario Actual",
        &format!("Generado el: {}", date_es(generated_on)),
    );
    canvas.text(
        &format!(
            "Valor Total del Inventario (a costo): {}",
            inventory_value(products)
        ),
        12.0,
        MARGIN,
        false,
    );
    canvas.down(10.0);

    let columns = [
        Column::left("Producto", MARGIN, 64.0),
        Column::right("Stock Actual", 80.0, 24.0),
        Column::right("Precio Costo", 106.0, 28.0),
        Column::right("Precio Venta", 136.0, 28.0),
        Column::right("Valor Total", 166.0, 30.0),
    ];
    let rows: Vec<Vec<String>> = products
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.stock.to_string(),
                p.cost_price.to_string(),
                p.sale_price.to_string(),
                p.stock_value().to_string(),
            ]
        })
        .collect();
    canvas.table(&columns, &rows);
    canvas.finish()
}

/// Outstanding receivables, then payables, each with its total.
pub fn debts_pdf(debts: &[Debt], generated_on: NaiveDate) -> ReportResult<Vec<u8>> {
    let mut canvas = Canvas::a4("Reporte de Deudas Pendientes")?;
    canvas.heading(
        "Reporte de Deudas Pendientes",
        &format!("Generado el: {}", date_es(generated_on)),
    );

    let totals = debt_totals(debts);
    let columns = [
        Column::left("Persona", MARGIN, 56.0),
        Column::left("Concepto", 72.0, 84.0),
        Column::right("Saldo Pendiente", 158.0, 38.0),
    ];

    for (title, direction, total_label, total) in [
        (
            "Cuentas por Cobrar (Me Deben)",
            DebtDirection::Receivable,
            "Total por Cobrar",
            totals.receivable,
        ),
        (
            "Cuentas por Pagar (Yo Debo)",
            DebtDirection::Payable,
            "Total por Pagar",
            totals.payable,
        ),
    ] {
        canvas.ensure_space(ROW_HEIGHT * 4.0);
        canvas.text(title, 14.0, MARGIN, true);
        canvas.down(8.0);

        let rows: Vec<Vec<String>> = debts
            .iter()
            .filter(|d| d.direction == direction)
            .map(|d| {
                vec![
                    d.person_name.clone(),
                    d.concept.clone(),
                    d.current_balance.to_string(),
                ]
            })
            .collect();
        canvas.table(&columns, &rows);

        canvas.ensure_space(ROW_HEIGHT);
        canvas.text(&format!("{}: {}", total_label, total), 10.0, MARGIN, true);
        canvas.down(15.0);
    }
    canvas.finish()
}

/// One day's totals and income by payment method.
pub fn daily_closing_pdf(closing: &DailyClosing) -> ReportResult<Vec<u8>> {
    let mut canvas = Canvas::a4("Cierre del Día")?;
    canvas.heading(
        "Cierre del Día",
        &format!(
            "Fecha: {}  ·  Movimientos: {}",
            date_es(closing.date),
            closing.entry_count
        ),
    );

    let columns = [
        Column::left("Concepto", MARGIN, 100.0),
        Column::right("Monto", 150.0, 46.0),
    ];
    let mut rows = vec![
        vec!["Total Ingresos".to_string(), closing.balance.total_income.to_string()],
        vec!["Total Gastos".to_string(), closing.balance.total_expense.to_string()],
        vec!["Balance del Día".to_string(), closing.balance.net.to_string()],
    ];
    rows.extend(closing.by_payment_method.iter().map(|(method, total)| {
        vec![format!("Ventas en {}", method.label()), total.to_string()]
    }));
    canvas.table(&columns, &rows);
    canvas.finish()
}

// =============================================================================
// Receipt
// =============================================================================

/// Everything printed on a sale receipt.
#[derive(Debug, Clone)]
pub struct Receipt<'a> {
    pub profile: &'a UserProfile,
    pub number: i64,
    /// Local date and time of the sale.
    pub issued_at: NaiveDateTime,
    pub lines: &'a [CartLine],
    pub totals: SaleTotals,
    pub payment_method: PaymentMethod,
    /// Cash handed over; change is printed only for cash sales it covers.
    pub cash_tendered: Option<Money>,
}

impl Receipt<'_> {
    /// `0000042`
    pub fn number_label(&self) -> String {
        format!("{:07}", self.number)
    }

    pub fn change(&self) -> Option<(Money, Money)> {
        if self.payment_method != PaymentMethod::Cash {
            return None;
        }
        let tendered = self.cash_tendered?;
        change_due(self.totals.total, tendered)
            .ok()
            .map(|change| (tendered, change))
    }
}

/// 80 mm wide receipt; the page grows with the number of lines.
pub fn receipt_pdf(receipt: &Receipt<'_>) -> ReportResult<Vec<u8>> {
    if receipt.lines.is_empty() {
        return Err(ReportError::Empty("receipt has no lines"));
    }

    let height = 160.0 + receipt.lines.len() as f32 * 5.0;
    let right = RECEIPT_WIDTH - RECEIPT_MARGIN;
    let mut c = Canvas::new("Recibo", RECEIPT_WIDTH, height)?;
    c.y = height - 10.0;

    let divider = |c: &mut Canvas| {
        c.down(1.5);
        c.rule(RECEIPT_MARGIN, right);
        c.down(4.0);
    };

    c.text_center("<< RECIBO DE VENTA INTERNA >>", 10.0, true);
    c.down(4.0);
    c.text_center("<< COMPROBANTE NO FISCAL >>", 8.0, false);
    c.down(2.5);
    divider(&mut c);

    let profile = receipt.profile;
    c.text_center(
        profile.business_name.as_deref().unwrap_or("Nombre no configurado"),
        9.0,
        false,
    );
    c.down(4.0);
    c.text_center(
        profile
            .business_address
            .as_deref()
            .unwrap_or("Dirección no configurada"),
        8.0,
        false,
    );
    c.down(4.0);
    c.text_center(
        &format!("TEL: {}", profile.business_phone.as_deref().unwrap_or("N/A")),
        8.0,
        false,
    );
    c.down(2.5);
    divider(&mut c);

    c.text(&format!("RECIBO No. {}", receipt.number_label()), 8.0, RECEIPT_MARGIN, false);
    c.down(4.0);
    c.text(
        &format!("FECHA: {}", date_es(receipt.issued_at.date())),
        8.0,
        RECEIPT_MARGIN,
        false,
    );
    c.text_right(
        &format!("HORA: {}", receipt.issued_at.format("%I:%M %p")),
        8.0,
        right,
        false,
    );
    c.down(6.0);

    let columns = [
        Column::left("CANT.", RECEIPT_MARGIN, 10.0),
        Column::left("DESCRIPCIÓN", 16.0, 42.0),
        Column::right("PRECIO", 58.0, 17.0),
    ];
    for col in &columns {
        c.cell(col, col.title, 8.0, true);
    }
    c.down(5.0);
    for line in receipt.lines {
        c.cell(&columns[0], &line.quantity.to_string(), 8.0, false);
        c.cell(&columns[1], &line.product_name, 8.0, false);
        c.cell(&columns[2], &line.line_total().to_string(), 8.0, false);
        c.down(5.0);
    }
    divider(&mut c);

    let totals = receipt.totals;
    let row = |c: &mut Canvas, label: &str, value: Money, bold: bool| {
        c.text(label, 8.0, RECEIPT_MARGIN, bold);
        c.text_right(&value.to_string(), 8.0, right, bold);
        c.down(4.0);
    };
    row(&mut c, "SUBTOTAL:", totals.subtotal, false);
    row(&mut c, "(-) Descuento:", totals.discount, false);
    divider(&mut c);
    row(&mut c, "TOTAL A PAGAR:", totals.total, true);
    if let Some((tendered, change)) = receipt.change() {
        row(&mut c, "Efectivo Recibido:", tendered, false);
        row(&mut c, "Cambio a Devolver:", change, true);
    }
    divider(&mut c);

    let words = format!("VALOR EN LETRAS: {}", amount_in_words(totals.total));
    for line in wrap(&words, right - RECEIPT_MARGIN, 7.0) {
        c.text(&line, 7.0, RECEIPT_MARGIN, false);
        c.down(3.5);
    }
    c.down(2.0);
    c.text(
        &format!("FORMA DE PAGO: {}", receipt.payment_method.label().to_uppercase()),
        7.0,
        RECEIPT_MARGIN,
        false,
    );
    c.down(2.5);
    divider(&mut c);

    c.text_center("¡ESTE NO ES UN DOCUMENTO FISCAL!", 7.0, true);
    c.down(4.0);
    c.text_center("NO ES VÁLIDO PARA CRÉDITO FISCAL O IVA.", 7.0, false);
    c.down(2.5);
    divider(&mut c);
    c.text_center("¡GRACIAS POR SU PREFERENCIA!", 8.0, false);
    c.down(4.0);
    c.text_center("Conserve su recibo para cualquier reclamo.", 8.0, false);

    c.finish()
}

// =============================================================================
// Unit Tests
// =============================================================================
