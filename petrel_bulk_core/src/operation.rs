use bytes::Bytes;

/// Fixed per-operation overhead added to every size estimate, covering the
/// action metadata that frames the payload on the wire.
pub const OPERATION_OVERHEAD_BYTES: u64 = 50;

/// The kind of write an [`Operation`] performs against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Index the document, replacing any existing document with the same id.
    Index,
    /// Create the document, failing if the id already exists.
    Create,
    /// Delete the document with the given id.
    Delete,
    /// Apply a partial update to the document with the given id.
    Update,
}

/// A single write destined for the store.
///
/// Operations are immutable once constructed. Index, create and update
/// operations carry a payload; delete operations never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    kind: OperationKind,
    collection: String,
    id: Option<String>,
    routing: Option<String>,
    version: Option<u64>,
    payload: Option<Bytes>,
}

impl Operation {
    /// Create an index operation with the given payload.
    pub fn index(collection: impl Into<String>, payload: Bytes) -> Self {
        Self::with_payload(OperationKind::Index, collection, payload)
    }

    /// Create a create operation with the given payload.
    pub fn create(collection: impl Into<String>, payload: Bytes) -> Self {
        Self::with_payload(OperationKind::Create, collection, payload)
    }

    /// Create an update operation with the given payload.
    pub fn update(collection: impl Into<String>, payload: Bytes) -> Self {
        Self::with_payload(OperationKind::Update, collection, payload)
    }

    /// Create a delete operation. Deletes carry no payload.
    pub fn delete(collection: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            collection: collection.into(),
            id: None,
            routing: None,
            version: None,
            payload: None,
        }
    }

    fn with_payload(kind: OperationKind, collection: impl Into<String>, payload: Bytes) -> Self {
        Self {
            kind,
            collection: collection.into(),
            id: None,
            routing: None,
            version: None,
            payload: Some(payload),
        }
    }

    /// Set the document id. Without an id the store assigns one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the routing key used to pick the target shard.
    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    /// Set the expected document version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn routing(&self) -> Option<&str> {
        self.routing.as_deref()
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    /// The document payload. `None` only for delete operations.
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Estimated wire size of the operation: payload length plus the fixed
    /// per-operation overhead.
    pub fn estimated_size_in_bytes(&self) -> u64 {
        let payload_len = self.payload.as_ref().map(|p| p.len() as u64).unwrap_or(0);
        payload_len + OPERATION_OVERHEAD_BYTES
    }
}

/// An immutable, ordered group of operations extracted from a
/// [`BatchBuffer`](crate::BatchBuffer) and submitted as one bulk call.
#[derive(Debug, Clone)]
pub struct Batch {
    operations: Vec<Operation>,
    estimated_size_in_bytes: u64,
}

impl Batch {
    /// Build a batch from a list of operations, computing the total size.
    pub fn from_operations(operations: Vec<Operation>) -> Self {
        let estimated_size_in_bytes = operations
            .iter()
            .map(Operation::estimated_size_in_bytes)
            .sum();
        Self {
            operations,
            estimated_size_in_bytes,
        }
    }

    /// The operations in submission order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The sum of the operations' estimated sizes.
    pub fn estimated_size_in_bytes(&self) -> u64 {
        self.estimated_size_in_bytes
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }
}
