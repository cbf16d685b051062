//! Error types for document generation and import.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Building or saving an `.xlsx` workbook failed.
    #[error("Spreadsheet error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    /// The import file is not a readable `.xlsx` workbook.
    #[error("Could not read workbook: {0}")]
    XlsxRead(#[from] calamine::XlsxError),

    /// printpdf failed to build or serialize the document.
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Nothing to produce a document from.
    #[error("Nothing to export: {0}")]
    Empty(&'static str),
}

pub type ReportResult<T> = Result<T, ReportError>;
