//! Remote table source abstraction
//!
//! Implementations:
//! - `GoogleSheetsSource`: production Sheets v4 REST backend
//! - test stubs built on top of in-memory rows

use crate::error::SourceError;
use async_trait::async_trait;

/// Rows as returned by the source, one `Vec<String>` per sheet row
pub type Rows = Vec<Vec<String>>;

/// Read-only access to a spreadsheet-like table source
#[async_trait]
pub trait TableSource: Send + Sync + 'static {
    /// Fetch the cell values of an A1 range (`Sheet!A2:H1000`)
    async fn fetch_values(&self, range: &str) -> Result<Rows, SourceError>;

    /// List the tab titles of the spreadsheet
    async fn sheet_titles(&self) -> Result<Vec<String>, SourceError>;
}
