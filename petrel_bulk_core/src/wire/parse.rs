use bytes::Bytes;
use snafu::ResultExt;

use crate::operation::{Operation, OperationKind};

use super::{
    ActionHeader, ActionMetadata, InvalidHeaderSnafu, MissingCollectionSnafu,
    MissingDelimiterSnafu, MissingPayloadSnafu, RECORD_SEPARATOR, WireError,
};

/// Defaults applied to headers that omit a field.
#[derive(Debug, Clone, Default)]
pub struct FramedDefaults {
    /// Collection used when a header names none.
    pub collection: Option<String>,
}

impl FramedDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `collection` for headers that do not name one.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }
}

/// Streaming reader over a framed bulk body.
///
/// Yields one [`Operation`] per action. Header records are inspected by
/// token-level deserialization into a borrowed header struct and payload
/// records are sliced out of the input without copying. The first error ends
/// the stream; records before it have already been yielded.
#[derive(Debug)]
pub struct FramedReader {
    data: Bytes,
    defaults: FramedDefaults,
    pos: usize,
    record: usize,
    failed: bool,
}

impl FramedReader {
    pub fn new(data: Bytes, defaults: FramedDefaults) -> Self {
        Self {
            data,
            defaults,
            pos: 0,
            record: 0,
            failed: false,
        }
    }

    /// Slice the next record, consuming its separator.
    ///
    /// Returns `Ok(None)` at end of input and an error when the remaining
    /// bytes have no separator.
    fn next_record(&mut self) -> Result<Option<(usize, usize)>, WireError> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        let start = self.pos;
        match self.data[start..].iter().position(|b| *b == RECORD_SEPARATOR) {
            Some(offset) => {
                self.pos = start + offset + 1;
                self.record += 1;
                Ok(Some((start, start + offset)))
            }
            None => MissingDelimiterSnafu {
                record: self.record + 1,
            }
            .fail(),
        }
    }

    /// Slice the next non-empty record.
    fn next_populated_record(&mut self) -> Result<Option<(usize, usize)>, WireError> {
        loop {
            match self.next_record()? {
                None => return Ok(None),
                Some((start, end)) if start == end => continue,
                Some(span) => return Ok(Some(span)),
            }
        }
    }

    fn parse_next(&mut self) -> Result<Option<Operation>, WireError> {
        // Keep a handle to the underlying buffer so the borrowed header can
        // outlive the cursor updates below.
        let data = self.data.clone();

        let Some((start, end)) = self.next_populated_record()? else {
            return Ok(None);
        };
        let header_record = self.record;

        let header: ActionHeader<'_> =
            serde_json::from_slice(&data[start..end]).context(InvalidHeaderSnafu {
                record: header_record,
            })?;

        let (kind, meta) = match header {
            ActionHeader::Index(meta) => {
                // The convention allows an index action to request create
                // semantics through its op_type field.
                let create = meta.op_type.as_deref() == Some("create");
                let kind = if create {
                    OperationKind::Create
                } else {
                    OperationKind::Index
                };
                (kind, meta)
            }
            ActionHeader::Create(meta) => (OperationKind::Create, meta),
            ActionHeader::Delete(meta) => (OperationKind::Delete, meta),
            ActionHeader::Update(meta) => (OperationKind::Update, meta),
        };

        let payload = if kind == OperationKind::Delete {
            None
        } else {
            let Some((start, end)) = self.next_record()? else {
                return MissingPayloadSnafu {
                    record: header_record,
                }
                .fail();
            };
            Some(self.data.slice(start..end))
        };

        self.build_operation(kind, meta, payload, header_record)
            .map(Some)
    }

    fn build_operation(
        &self,
        kind: OperationKind,
        meta: ActionMetadata<'_>,
        payload: Option<Bytes>,
        record: usize,
    ) -> Result<Operation, WireError> {
        let collection = match meta.collection {
            Some(collection) => collection.into_owned(),
            None => self
                .defaults
                .collection
                .clone()
                .ok_or_else(|| MissingCollectionSnafu { record }.build())?,
        };

        let mut operation = match (kind, payload) {
            (OperationKind::Index, Some(payload)) => Operation::index(collection, payload),
            (OperationKind::Create, Some(payload)) => Operation::create(collection, payload),
            (OperationKind::Update, Some(payload)) => Operation::update(collection, payload),
            _ => Operation::delete(collection),
        };
        if let Some(id) = meta.id {
            operation = operation.with_id(id);
        }
        if let Some(routing) = meta.routing {
            operation = operation.with_routing(routing);
        }
        if let Some(version) = meta.version {
            operation = operation.with_version(version);
        }

        Ok(operation)
    }
}

impl Iterator for FramedReader {
    type Item = Result<Operation, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.parse_next() {
            Ok(Some(operation)) => Some(Ok(operation)),
            Ok(None) => None,
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(body: &'static str) -> Vec<Result<Operation, WireError>> {
        FramedReader::new(Bytes::from_static(body.as_bytes()), FramedDefaults::new()).collect()
    }

    #[test]
    fn test_parses_alternating_header_and_payload_records() {
        let body = concat!(
            "{\"index\":{\"_index\":\"logs\",\"_id\":\"1\"}}\n",
            "{\"message\":\"hello\"}\n",
            "{\"delete\":{\"_index\":\"logs\",\"_id\":\"2\"}}\n",
            "{\"update\":{\"_index\":\"logs\",\"_id\":\"3\",\"_routing\":\"r1\"}}\n",
            "{\"doc\":{\"message\":\"patched\"}}\n",
        );

        let operations: Vec<_> = read_all(body).into_iter().map(Result::unwrap).collect();
        assert_eq!(operations.len(), 3);

        assert_eq!(operations[0].kind(), OperationKind::Index);
        assert_eq!(operations[0].collection(), "logs");
        assert_eq!(operations[0].id(), Some("1"));
        assert_eq!(
            operations[0].payload().unwrap().as_ref(),
            b"{\"message\":\"hello\"}"
        );

        assert_eq!(operations[1].kind(), OperationKind::Delete);
        assert!(operations[1].payload().is_none());

        assert_eq!(operations[2].kind(), OperationKind::Update);
        assert_eq!(operations[2].routing(), Some("r1"));
    }

    #[test]
    fn test_op_type_create_rewrites_index_action() {
        let body = concat!(
            "{\"index\":{\"_index\":\"logs\",\"_id\":\"1\",\"op_type\":\"create\"}}\n",
            "{}\n",
        );
        let operations: Vec<_> = read_all(body).into_iter().map(Result::unwrap).collect();
        assert_eq!(operations[0].kind(), OperationKind::Create);
    }

    #[test]
    fn test_default_collection_applies_when_header_omits_it() {
        let body = "{\"delete\":{\"_id\":\"1\"}}\n";
        let defaults = FramedDefaults::new().with_collection("fallback");
        let operations: Vec<_> =
            FramedReader::new(Bytes::from_static(body.as_bytes()), defaults)
                .map(Result::unwrap)
                .collect();
        assert_eq!(operations[0].collection(), "fallback");

        let result = read_all("{\"delete\":{\"_id\":\"1\"}}\n");
        assert!(matches!(
            result[0],
            Err(WireError::MissingCollection { record: 1 })
        ));
    }

    #[test]
    fn test_legacy_header_fields_are_tolerated() {
        let body = concat!(
            "{\"index\":{\"_index\":\"logs\",\"_type\":\"doc\",\"_ttl\":5000,",
            "\"_timestamp\":\"now\",\"_parent\":\"p\",\"_version_type\":\"external\"}}\n",
            "{}\n",
        );
        let operations: Vec<_> = read_all(body).into_iter().map(Result::unwrap).collect();
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].kind(), OperationKind::Index);
    }

    #[test]
    fn test_empty_records_are_skipped() {
        let body = "\n\n{\"delete\":{\"_index\":\"logs\",\"_id\":\"1\"}}\n\n";
        let operations: Vec<_> = read_all(body).into_iter().map(Result::unwrap).collect();
        assert_eq!(operations.len(), 1);
    }

    #[test]
    fn test_malformed_header_aborts_but_keeps_earlier_operations() {
        let body = concat!(
            "{\"delete\":{\"_index\":\"logs\",\"_id\":\"1\"}}\n",
            "[\"not\",\"a\",\"header\"]\n",
            "{\"delete\":{\"_index\":\"logs\",\"_id\":\"2\"}}\n",
        );

        let results = read_all(body);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(WireError::InvalidHeader { record: 2, .. })
        ));
    }

    #[test]
    fn test_missing_payload_record_is_an_error() {
        let results = read_all("{\"index\":{\"_index\":\"logs\"}}\n");
        assert!(matches!(
            results[0],
            Err(WireError::MissingPayload { record: 1 })
        ));
    }

    #[test]
    fn test_unterminated_record_is_an_error() {
        let results = read_all("{\"delete\":{\"_index\":\"logs\",\"_id\":\"1\"}}");
        assert!(matches!(
            results[0],
            Err(WireError::MissingDelimiter { record: 1 })
        ));
    }
}
