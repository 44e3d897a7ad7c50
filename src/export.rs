//! Spreadsheet export of generated code batches
//!
//! Batches are written to an in-memory xlsx workbook with `rust_xlsxwriter`
//! and shipped to the browser as base64.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Datelike, Timelike, Utc};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use crate::error::AppError;
use crate::model::CodeBatch;

pub const SHEET_NAME: &str = "Promo Codes";

/// Header text and column width for each exported column
const COLUMNS: [(&str, f64); 3] = [
    ("Generated Promo Code", 30.0),
    ("Generation Date", 25.0),
    ("User", 20.0),
];

impl CodeBatch {
    /// Renders the batch as an xlsx workbook: one header row, then one row
    /// per code with the generation date and operator.
    pub fn to_xlsx(&self) -> Result<Vec<u8>, AppError> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
        let generated_at = excel_datetime(&self.generated_at)?;

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        for (col, (title, width)) in COLUMNS.iter().enumerate() {
            let col = col as u16;
            worksheet.set_column_width(col, *width)?;
            worksheet.write_string_with_format(0, col, *title, &header)?;
        }

        for (i, code) in self.codes.iter().enumerate() {
            let row = i as u32 + 1;
            worksheet.write_string(row, 0, code.as_str())?;
            worksheet.write_datetime_with_format(row, 1, &generated_at, &date_format)?;
            worksheet.write_string(row, 2, self.user.as_str())?;
        }

        Ok(workbook.save_to_buffer()?)
    }
}

fn excel_datetime(ts: &DateTime<Utc>) -> Result<ExcelDateTime, AppError> {
    let date = ExcelDateTime::from_ymd(ts.year() as u16, ts.month() as u8, ts.day() as u8)?;
    Ok(date.and_hms(ts.hour() as u16, ts.minute() as u8, f64::from(ts.second()))?)
}

/// Exports the batch and base64-encodes the workbook for the wire
pub fn encode_file(batch: &CodeBatch) -> Result<String, AppError> {
    let bytes = batch.to_xlsx()?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// `promo-codes-part-{n}-{date}.xlsx`, `n` counted from 1
pub fn partial_file_name(part: u64, generated_at: &DateTime<Utc>) -> String {
    format!(
        "promo-codes-part-{}-{}.xlsx",
        part,
        generated_at.format("%Y-%m-%d")
    )
}

pub fn final_file_name(generated_at: &DateTime<Utc>) -> String {
    format!("promo-codes-final-{}.xlsx", generated_at.format("%Y-%m-%d"))
}
