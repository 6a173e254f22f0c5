//! I/O module
//!
//! Handles command CSV parsing and account CSV output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, amount scaling, output)
//! - `sync_reader` - Synchronous command reader with iterator interface
//! - `async_reader` - Asynchronous command reader with batch reading interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_command_record, format_base_units, to_base_units, write_accounts_csv,
    CommandCsvRecord,
};
pub use sync_reader::SyncReader;
