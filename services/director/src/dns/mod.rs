//! Local DNS: exporting instance addresses as a record set and publishing it.

mod exporter;
mod publisher;
mod worker;

pub use exporter::LocalDnsExporter;
pub use publisher::{FileRecordsPublisher, RecordsPublisher};
pub use worker::DnsPublishWorker;
