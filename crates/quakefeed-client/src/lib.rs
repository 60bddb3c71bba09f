pub mod blocks;
#[cfg(feature = "browser")]
pub mod browser_source;
pub mod csv_sink;
pub mod snapshot;

pub use blocks::HtmlBlockParser;
#[cfg(feature = "browser")]
pub use browser_source::{BrowserSource, ScrollPacing};
pub use csv_sink::CsvSink;
pub use snapshot::SnapshotSource;
