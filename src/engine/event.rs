use bytes::Bytes;

/// Value type of a key carried by the RDB stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    String,
    List,
    Set,
    SortedSet,
    Hash,
    Stream,
    Module,
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeTag::String => f.write_str("string"),
            TypeTag::List => f.write_str("list"),
            TypeTag::Set => f.write_str("set"),
            TypeTag::SortedSet => f.write_str("zset"),
            TypeTag::Hash => f.write_str("hash"),
            TypeTag::Stream => f.write_str("stream"),
            TypeTag::Module => f.write_str("module"),
        }
    }
}

/// A tagged record from the upstream RDB parser or replication client.
///
/// Each `KeyValue` is self-contained: the payload is the opaque serialized
/// form consumable by Redis `RESTORE`.
#[derive(Debug, Clone)]
pub enum Event {
    /// The snapshot stream opened
    BeginRdb,
    /// One key with its dump payload
    KeyValue {
        db: i64,
        key: Bytes,
        type_tag: TypeTag,
        /// Remaining time to live in milliseconds, `0` for no expiry.
        /// Negative remainders (already-expired keys) are clamped to `0`
        /// at dispatch.
        ttl: i64,
        dump_payload: Bytes,
    },
    /// A write command replayed from inside the snapshot, scoped to a
    /// database
    Command { db: i64, argv: Vec<Bytes> },
    /// The snapshot stream is complete; every endpoint is drained when
    /// this is seen
    EndRdb,
    /// A post-snapshot replicated write command. Database selection
    /// travels in-band as `SELECT` commands.
    StreamCommand { argv: Vec<Bytes> },
}
