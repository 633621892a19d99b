/*!
rdbferry replays Redis RDB snapshots and replication streams into live
Redis servers.

# Philosophy
* Streaming: the snapshot is never buffered in memory
* Full async library (tokio)
* Per-key ordering preserved across the whole run
* Rust idiomatic API

# Features
* Pipelined, multi-connection dispatch of `RESTORE`/`DEL`/`SELECT`
  against standalone servers and clusters
* Cluster slot routing (CRC16 over the hash-tag region) from a
  `nodes.conf`-compatible topology description
* At most one inflight batch per endpoint, bounded by the pipe budget
* Socket-level retry and reconnection preserving lane identity
* Event filtering by database, value type, and key patterns
* Per-endpoint counters emitted to a pluggable metric sink
* [TLS](https://redis.io/docs/manual/security/encryption/) support
  (`native-tls` feature)

# Basic Usage

```no_run
use futures_util::stream;
use rdbferry::{
    Result,
    engine::{Event, MigrationEngine, TypeTag},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // the RDB parser feeds the engine; three events stand in for it here
    let events = stream::iter(vec![
        Event::BeginRdb,
        Event::KeyValue {
            db: 0,
            key: "key".into(),
            type_tag: TypeTag::String,
            ttl: 0,
            dump_payload: "\x00\x05value\x0b\x00...".into(),
        },
        Event::EndRdb,
    ]);

    let engine = MigrationEngine::new(
        "redis://127.0.0.1:6379?migrate_threads=4&restore_mode=replace",
    )?;
    let report = engine.run(events).await?;
    assert!(report.is_success());

    Ok(())
}
```

# Configuration

[`Config`] is built from a `redis://`/`rediss://` URI or a dedicated
builder; query keys keep the ecosystem names (`migrate_batch_size`,
`migrate_threads`, `migrate_flush`, `migrate_retries`, `auth_user`,
`auth_password`, `connection_timeout`, `metric_gateway`). Cluster targets
carry their topology as a `nodes.conf`-compatible description in
[`ClusterConfig`].
*/
pub mod cluster;
mod config;
pub mod engine;
mod error;
pub mod metrics;
mod network;
pub mod resp;

pub use config::*;
pub use error::*;
pub use network::Endpoint;

/// Library general result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests;
