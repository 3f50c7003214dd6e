//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over replayed commands from a CSV file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `Result<CommandRecord, ExchangeError>` for each CSV row:
//!
//! ```no_run
//! use swap_exchange_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("commands.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(record) => println!("{}", record.command.name()),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Opening the file fails fast from `new()`
//! - A row that does not parse is yielded as a `ParseError` carrying its line
//! - A read failure in the middle of the file is yielded as an `IoError`;
//!   callers treat it as fatal

use crate::io::csv_format::{convert_csv_command, CsvCommand};
use crate::types::{CommandRecord, ExchangeError};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Synchronous CSV reader
///
/// Reads one row at a time, so memory use does not grow with the file.
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl SyncReader {
    /// Open a command log
    ///
    /// The CSV reader trims whitespace from every field and accepts rows
    /// with fewer columns than the header.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be opened.
    pub fn new(path: &Path) -> Result<Self, ExchangeError> {
        let file = File::open(path).map_err(|e| ExchangeError::IoError {
            message: format!("failed to open file '{}': {}", path.display(), e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<CommandRecord, ExchangeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.reader.deserialize::<CsvCommand>().next()?;
        self.line_num += 1;
        let line = self.line_num;

        Some(match row {
            Ok(row) => convert_csv_command(row).map_err(|e| ExchangeError::ParseError {
                line: Some(line),
                message: e.to_string(),
            }),
            Err(e) if e.is_io_error() => Err(e.into()),
            Err(e) => Err(ExchangeError::ParseError {
                line: Some(line),
                message: e.to_string(),
            }),
        })
    }
}
