use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};
use snafu::ResultExt;

use crate::operation::{Batch, Operation, OperationKind};

use super::{ActionHeader, ActionMetadata, EncodeSnafu, RECORD_SEPARATOR, WireError};

/// Serialize a batch into a framed bulk body: one header record per
/// operation, a payload record for everything except deletes, every record
/// terminated by the separator.
pub fn encode_batch(batch: &Batch) -> Result<Bytes, WireError> {
    let mut out = BytesMut::with_capacity(batch.estimated_size_in_bytes() as usize);
    for operation in batch.operations() {
        encode_operation(operation, &mut out)?;
    }
    Ok(out.freeze())
}

/// Append one operation's records to `out`.
pub fn encode_operation(operation: &Operation, out: &mut BytesMut) -> Result<(), WireError> {
    let meta = ActionMetadata {
        collection: Some(Cow::Borrowed(operation.collection())),
        id: operation.id().map(Cow::Borrowed),
        routing: operation.routing().map(Cow::Borrowed),
        version: operation.version(),
        op_type: None,
    };
    let header = match operation.kind() {
        OperationKind::Index => ActionHeader::Index(meta),
        OperationKind::Create => ActionHeader::Create(meta),
        OperationKind::Delete => ActionHeader::Delete(meta),
        OperationKind::Update => ActionHeader::Update(meta),
    };

    serde_json::to_writer((&mut *out).writer(), &header).context(EncodeSnafu {})?;
    out.put_u8(RECORD_SEPARATOR);

    if let Some(payload) = operation.payload() {
        out.extend_from_slice(payload);
        out.put_u8(RECORD_SEPARATOR);
    }

    Ok(())
}
