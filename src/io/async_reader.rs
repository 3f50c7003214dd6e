//! Asynchronous CSV reader with batch interface
//!
//! The AsyncReader uses csv-async for streaming CSV parsing and hands out
//! commands in batches, so the async strategy can overlap reading the next
//! batch with applying the current one.
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of CommandRecords
//!                  ↓
//!           csv_format module
//!           (CsvCommand, convert_csv_command)
//! ```

use crate::io::csv_format::{convert_csv_command, CsvCommand};
use crate::types::{CommandRecord, ExchangeError};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: u64,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 1,
        }
    }

    /// Read up to `batch_size` commands
    ///
    /// Rows that do not parse are logged with their line number and
    /// skipped. An empty batch means the end of the input.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the underlying reader fails.
    pub async fn read_batch(
        &mut self,
        batch_size: usize,
    ) -> Result<Vec<CommandRecord>, ExchangeError> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut rows = self.csv_reader.deserialize::<CsvCommand>();

        while batch.len() < batch_size {
            let Some(row) = rows.next().await else {
                break;
            };
            self.line_num += 1;

            match row {
                Ok(row) => match convert_csv_command(row) {
                    Ok(record) => batch.push(record),
                    Err(error) => warn!(line = self.line_num, %error, "skipping command"),
                },
                Err(error) if error.is_io_error() => {
                    return Err(ExchangeError::IoError {
                        message: error.to_string(),
                    })
                }
                Err(error) => warn!(line = self.line_num, %error, "skipping unreadable row"),
            }
        }

        Ok(batch)
    }
}
