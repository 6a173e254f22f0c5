//! Asynchronous CSV reader with batch interface
//!
//! Reads command rows through `csv-async` and hands them out in batches.
//! Rows that fail to parse or convert are logged and skipped.
//!
//! ```text
//! tokio File ─compat─> AsyncReader ──read_batch──> Vec<Command>
//!                           │
//!                    csv_format module
//!        (CommandCsvRecord, convert_command_record)
//! ```

use crate::io::csv_format::{convert_command_record, CommandCsvRecord};
use crate::types::Command;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous command reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    decimals: u32,
    line_num: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    ///
    /// # Arguments
    ///
    /// * `reader` - Async reader providing CSV data
    /// * `decimals` - Fractional digits of the `amount` column
    pub fn new(reader: R, decimals: u32) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            decimals,
            line_num: 0,
        }
    }

    /// Read up to `batch_size` commands
    ///
    /// # Returns
    ///
    /// The successfully converted commands, in file order. An empty vector
    /// means the end of the input was reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<Command> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CommandCsvRecord>();

        while batch.len() < batch_size {
            let Some(next) = records.next().await else {
                break;
            };
            self.line_num += 1;
            let line = self.line_num + 1;
            match next {
                Ok(record) => match convert_command_record(record, self.decimals) {
                    Ok(command) => batch.push(command),
                    Err(e) => warn!(line, error = %e, "skipping command record"),
                },
                Err(e) => warn!(line, error = %e, "CSV parse error"),
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxId;
    use futures::io::Cursor;

    const HEADER: &str = "command,account,counterparty,amount,tx,release_time\n";

    fn reader(body: &str) -> AsyncReader<Cursor<Vec<u8>>> {
        let content = format!("{}{}", HEADER, body);
        AsyncReader::new(Cursor::new(content.into_bytes()), 2)
    }

    #[tokio::test]
    async fn test_async_reader_read_batches() {
        let mut async_reader = reader(
            "cash_in,0xa1,,1,0x1,\n\
             cash_in,0xa2,,2,0x2,\n\
             request,0xa1,,1,0x3,\n",
        );

        let batch = async_reader.read_batch(2).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].tx_id(), TxId::from(1));
        assert_eq!(batch[1].tx_id(), TxId::from(2));

        let batch = async_reader.read_batch(2).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].tx_id(), TxId::from(3));

        assert!(async_reader.read_batch(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_empty_csv() {
        let mut async_reader = reader("");
        assert!(async_reader.read_batch(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_skips_invalid_records() {
        let mut async_reader = reader(
            "airdrop,0xa1,,1,0x1,\n\
             cash_in,0xa1,,-5,0x2,\n\
             confirm,,,,0x3,\n",
        );

        let batch = async_reader.read_batch(10).await;
        assert_eq!(batch, vec![Command::ConfirmCashOut { tx_id: TxId::from(3) }]);
    }

    #[tokio::test]
    async fn test_async_reader_whitespace_and_case() {
        let mut async_reader = reader("  CASH_IN  ,  0xa1 ,, 1.50 , 0x1 ,\n");
        let batch = async_reader.read_batch(10).await;
        assert_eq!(batch.len(), 1);
        assert!(matches!(batch[0], Command::CashIn { amount: 150, .. }));
    }
}
