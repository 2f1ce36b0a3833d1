use crate::{
    row::SheetRow,
    Result,
};
use gsheets_client::CellValue;
use std::{
    future::Future,
    pin::Pin,
};

/// The two worksheet operations appending needs.
pub trait Worksheet {
    /// Values of a column (1-based) down to its last non-empty cell.
    fn col_values(&self, column: u32) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>>;

    /// Write `cells` into `row`, starting at column 1, as one user-entered batch.
    fn update_row<'a>(
        &'a self,
        row: u32,
        cells: &'a [CellValue],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

impl Worksheet for gsheets_client::Worksheet {
    fn col_values(&self, column: u32) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        Box::pin(async move { Ok(gsheets_client::Worksheet::col_values(self, column).await?) })
    }

    fn update_row<'a>(
        &'a self,
        row: u32,
        cells: &'a [CellValue],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move { Ok(gsheets_client::Worksheet::update_row(self, row, cells).await?) })
    }
}

/// Append `row` below the existing content of column 1 and return the row number written.
///
/// Appending the same row twice writes it twice.
pub async fn append_row<W>(worksheet: &W, row: &SheetRow) -> Result<u32>
where
    W: Worksheet + ?Sized,
{
    let next_row = worksheet.col_values(1).await?.len() as u32 + 1;
    debug!(next_row, "Writing row");
    worksheet.update_row(next_row, row.cells()).await?;
    Ok(next_row)
}
