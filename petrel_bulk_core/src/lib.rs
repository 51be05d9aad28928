pub mod buffer;
pub mod error;
pub mod gate;
pub mod listener;
pub mod operation;
pub mod processor;
pub mod scheduler;
pub mod transport;
pub mod wire;

pub use buffer::BatchBuffer;
pub use error::{ProcessorError, Result};
pub use gate::{AdmissionGate, AdmissionPermit};
pub use listener::{BatchListener, NoopListener};
pub use operation::{Batch, Operation, OperationKind, OPERATION_OVERHEAD_BYTES};
pub use processor::{BatchProcessor, ProcessorOptions};
pub use scheduler::FlushScheduler;
pub use transport::{BulkResponse, BulkTransport, ItemOutcome, ItemResult, TransportError};
