//! Background jobs of the director.

mod result_sink;
mod vm_state;
mod worker;

pub use result_sink::{FileResultSink, MemoryResultSink, ResultSink, SinkError};
pub use vm_state::{PollError, PollSummary, VmStatePoller, VmStatusReport, UNRESPONSIVE_AGENT};
pub use worker::{VmStateWorker, MIN_INTERVAL};
