//! Synchronous CSV reader with iterator interface
//!
//! Streams [`Command`]s out of a command CSV file one row at a time, so memory
//! use does not grow with the file. Row-level problems (bad CSV, unknown
//! command, malformed amount) are yielded as `Err` items carrying the line
//! number; only failing to open the file is fatal.
//!
//! ```no_run
//! use sharded_cashier::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("commands.csv"), 2).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(command) => println!("{:?}", command),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! ```

use crate::io::csv_format::{convert_command_record, CommandCsvRecord};
use crate::types::Command;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Synchronous command reader
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    decimals: u32,
    line_num: usize,
}

impl SyncReader {
    /// Open a command CSV file
    ///
    /// Fields are trimmed and rows may omit trailing optional columns.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the CSV file
    /// * `decimals` - Fractional digits of the `amount` column
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReader)` if file opened successfully
    /// * `Err(String)` if file could not be opened
    pub fn new(path: &Path, decimals: u32) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            decimals,
            line_num: 0,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<Command, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CommandCsvRecord>();
        let next = deserializer.next()?;
        self.line_num += 1;
        // +1 for the header row
        let line = self.line_num + 1;

        Some(match next {
            Ok(record) => convert_command_record(record, self.decimals)
                .map_err(|e| format!("Line {}: {}", line, e)),
            Err(e) => Err(format!("Line {}: CSV parse error: {}", line, e)),
        })
    }
}
