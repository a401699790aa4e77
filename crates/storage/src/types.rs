//! Common types shared by backends and the connector.

/// A key-value pair destined for the ledger's state table.
///
/// # Examples
///
/// ```
/// use ledger_kv_storage::StateEntry;
///
/// let entry = StateEntry::new(b"contract:42".to_vec(), b"payload".to_vec());
/// assert_eq!(entry.key, b"contract:42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    /// The state key. Unique within the state table.
    pub key: Vec<u8>,

    /// The value stored at this key.
    pub value: Vec<u8>,
}

impl StateEntry {
    /// Creates a new state entry.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>> From<(K, V)> for StateEntry {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}
