//! # seq-io
//!
//! Concrete I/O for the sequence engine: CSV dataset loading, the GraphQL
//! HTTP transport, the INI configuration file, the sequence document
//! loader, and the result/request-log sinks. Everything here implements a
//! trait seam defined in `seq-core`, which knows nothing about the
//! filesystem or the network.

pub mod config;
pub mod csv_loader;
pub mod sequence_loader;
pub mod sink;
pub mod transport;

pub use config::AppConfig;
pub use csv_loader::CsvDatasetLoader;
pub use transport::HttpTransport;
