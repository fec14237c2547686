//! CSV export of ledger rows.

use crate::domain::error::LedgerError;
use crate::domain::trade::Trade;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Writes one row per trade with a header line. Returns the row count.
    pub fn export_trades(&self, trades: &[&Trade]) -> Result<usize, LedgerError> {
        let file = File::create(&self.path)?;
        write_trades(file, trades).map_err(|e| match e {
            LedgerError::Io(io) => LedgerError::Io(std::io::Error::new(
                io.kind(),
                format!("failed to write {}: {}", self.path.display(), io),
            )),
            other => other,
        })
    }
}

pub fn write_trades<W: Write>(writer: W, trades: &[&Trade]) -> Result<usize, LedgerError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for trade in trades {
        wtr.serialize(trade).map_err(csv_error)?;
    }
    wtr.flush()?;
    Ok(trades.len())
}

fn csv_error(e: csv::Error) -> LedgerError {
    LedgerError::Io(std::io::Error::other(format!("CSV write error: {e}")))
}
