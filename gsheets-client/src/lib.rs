//! # Google Sheets Client
//!
//! A small client for the parts of the Google Sheets v4 REST API needed to append measurement rows:
//!
//! 1. Authenticate with a service-account key file (OAuth2 JWT bearer grant)
//! 2. Open a spreadsheet by its document key
//! 3. Select a worksheet by its tab name
//! 4. Read the values of a column and write a batch of cells into one row
//!
//! ## Usage
//!
//! ```no_run
//! # async fn example() -> Result<(), gsheets_client::Error> {
//! use gsheets_client::{
//!     CellValue,
//!     Client,
//!     ClientOptions,
//!     ServiceAccountKey,
//! };
//!
//! let key = ServiceAccountKey::from_file("service-account.json")?;
//! let client = Client::authorize(&key, ClientOptions::default()).await?;
//! let worksheet = client.open_by_key("DOC_KEY").await?.worksheet("Sheet1")?;
//! let next_row = worksheet.col_values(1).await?.len() as u32 + 1;
//! worksheet
//!     .update_row(next_row, &[CellValue::from("hello"), CellValue::from(42_u64)])
//!     .await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

mod a1;
mod client;
mod credentials;
mod value;

pub use a1::{
    column_letter,
    quote_sheet_name,
    row_range,
};
pub use client::{
    Client,
    ClientOptions,
    Spreadsheet,
    Worksheet,
};
pub use credentials::{
    AccessToken,
    ServiceAccountKey,
    SCOPES,
};
pub use value::CellValue;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read service account key {path}: {source}")]
    KeyFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid service account key: {0}")]
    Credentials(String),

    #[error("failed to sign token request")]
    Signing,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("worksheet {0:?} not found")]
    WorksheetNotFound(String),

    #[error("invalid API url: {0}")]
    Url(String),
}
