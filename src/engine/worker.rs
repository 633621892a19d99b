use crate::{
    RedisErrorKind, RestoreMode, Result,
    engine::Lane,
    resp::{Command, cmd},
};
use bytes::Bytes;
use log::{error, warn};
use tokio::sync::mpsc;

/// `DEL` + `RESTORE` performed atomically server-side, for targets that
/// predate `RESTORE … REPLACE`.
const DEL_RESTORE_SCRIPT: &str =
    "redis.call('DEL', KEYS[1]) return redis.call('RESTORE', KEYS[1], ARGV[1], ARGV[2])";

/// One unit of work routed to a lane by the demultiplexer.
pub(crate) enum WorkItem {
    Restore {
        db: i64,
        key: Bytes,
        ttl: i64,
        payload: Bytes,
        node: usize,
    },
    Command {
        db: i64,
        command: Command,
        node: usize,
    },
    /// Batch boundary: drain every endpoint of the lane
    Flush,
}

#[derive(Debug, Default)]
pub(crate) struct WorkerStats {
    pub restored: u64,
    pub commands: u64,
    pub reply_errors: u64,
    pub io_failures: u64,
    pub reconnects: u64,
}

/// Consumes the lane's queue until the demultiplexer closes it, then
/// drains the last batches and releases the endpoints.
///
/// Endpoint-local faults are logged and counted; the worker never aborts
/// the run for one bad endpoint.
pub(crate) async fn worker_loop(
    mut lane: Lane,
    mut items: mpsc::Receiver<WorkItem>,
    mode: RestoreMode,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    while let Some(item) = items.recv().await {
        match item {
            WorkItem::Restore {
                db,
                key,
                ttl,
                payload,
                node,
            } => match restore(&mut lane, mode, db, &key, ttl, &payload, node).await {
                Ok(reply_errors) => {
                    stats.restored += 1;
                    stats.reply_errors += reply_errors;
                }
                Err(e) => {
                    stats.io_failures += 1;
                    error!(
                        "restore of {:?} failed: {e}",
                        String::from_utf8_lossy(&key)
                    );
                }
            },
            WorkItem::Command { db, command, node } => {
                match replay(&mut lane, db, &command, node).await {
                    Ok(reply_errors) => {
                        stats.commands += 1;
                        stats.reply_errors += reply_errors;
                    }
                    Err(e) => {
                        stats.io_failures += 1;
                        error!("replay of {command} failed: {e}");
                    }
                }
            }
            WorkItem::Flush => match lane.flush_all().await {
                Ok(errors) => stats.reply_errors += errors.len() as u64,
                Err(e) => {
                    stats.io_failures += 1;
                    error!("drain failed: {e}");
                }
            },
        }
    }

    // upstream is done: drain the last batches, then release the endpoints
    match lane.flush_all().await {
        Ok(errors) => stats.reply_errors += errors.len() as u64,
        Err(e) => {
            stats.io_failures += 1;
            error!("final drain failed: {e}");
        }
    }
    lane.close_all().await;

    stats.reconnects = lane.reconnects();
    stats
}

async fn restore(
    lane: &mut Lane,
    mode: RestoreMode,
    db: i64,
    key: &Bytes,
    ttl: i64,
    payload: &Bytes,
    node: usize,
) -> Result<u64> {
    let mut reply_errors = ensure_db(lane, node, db).await?;

    // keys that expired while the snapshot was in flight land with no expiry
    let ttl = ttl.max(0);

    let command = match mode {
        RestoreMode::Append | RestoreMode::Fallback => {
            cmd("RESTORE").arg(key).arg(ttl).arg(payload)
        }
        RestoreMode::Replace => cmd("RESTORE").arg(key).arg(ttl).arg(payload).arg("REPLACE"),
        RestoreMode::Legacy => cmd("EVAL")
            .arg(DEL_RESTORE_SCRIPT)
            .arg(1)
            .arg(key)
            .arg(ttl)
            .arg(payload),
    };

    let mut errors = lane.batch(node, &command).await?;

    if mode == RestoreMode::Fallback {
        // drain now so a BUSYKEY is attributable to this command
        errors.extend(lane.flush(node).await?);

        for error in errors {
            if error.kind == RedisErrorKind::BusyKey {
                warn!(
                    "existing key {:?}, replaying as DEL + RESTORE",
                    String::from_utf8_lossy(key)
                );
                let mut retry_errors = lane.batch(node, &cmd("DEL").arg(key)).await?;
                retry_errors.extend(lane.batch(node, &command).await?);
                retry_errors.extend(lane.flush(node).await?);
                reply_errors += retry_errors.len() as u64;
            } else {
                reply_errors += 1;
            }
        }
    } else {
        reply_errors += errors.len() as u64;
    }

    Ok(reply_errors)
}

async fn replay(lane: &mut Lane, db: i64, command: &Command, node: usize) -> Result<u64> {
    let mut reply_errors = ensure_db(lane, node, db).await?;
    reply_errors += lane.batch(node, command).await?.len() as u64;
    Ok(reply_errors)
}

/// Batches a `SELECT` when the endpoint's cached database differs from
/// the event's, updating the cache optimistically.
async fn ensure_db(lane: &mut Lane, node: usize, db: i64) -> Result<u64> {
    if db < 0 || lane.endpoint(node).db() == db {
        return Ok(0);
    }

    let errors = lane.batch(node, &cmd("SELECT").arg(db)).await?;
    lane.endpoint(node).set_db(db);

    Ok(errors.len() as u64)
}
