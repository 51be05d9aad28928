use snafu::Snafu;

use crate::transport::TransportError;
use crate::wire::WireError;

/// Errors surfaced by the batch processor.
///
/// `Closed` and `Wire` are usage errors reported synchronously to the
/// caller. `Admission` and `Transport` are batch-level failures delivered to
/// the listener's failure callback.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProcessorError {
    /// The processor no longer accepts operations.
    #[snafu(display("batch processor already closed"))]
    Closed,
    /// A permit could not be acquired for a batch waiting to be dispatched.
    ///
    /// The operations in that batch are not re-buffered.
    #[snafu(display("admission gate rejected the batch"))]
    Admission,
    /// The transport reported a failure for the whole batch.
    #[snafu(display("bulk transport failed"))]
    Transport { source: TransportError },
    /// A framed input stream could not be parsed past the operations already
    /// added.
    #[snafu(display("framed bulk input malformed"))]
    Wire { source: WireError },
}

pub type Result<T, E = ProcessorError> = std::result::Result<T, E>;
