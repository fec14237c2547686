//! Backup documents on disk as pretty-printed JSON.

use crate::domain::backup::Backup;
use crate::domain::error::LedgerError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub fn write_backup<P: AsRef<Path>>(path: P, backup: &Backup) -> Result<(), LedgerError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, backup).map_err(|e| LedgerError::Backup {
        reason: format!("failed to write {}: {}", path.display(), e),
    })?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn read_backup<P: AsRef<Path>>(path: P) -> Result<Backup, LedgerError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let backup: Backup =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| LedgerError::Backup {
            reason: format!("failed to parse {}: {}", path.display(), e),
        })?;
    backup.validate()?;
    Ok(backup)
}
