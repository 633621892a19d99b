use crate::{
    Config, Error, RedisError, Result,
    metrics::{Metric, MetricsSink, reason},
    network::Endpoint,
    resp::Command,
};
use log::warn;
use smallvec::SmallVec;
use std::sync::Arc;

/// One target endpoint address with the slot ranges it owns (empty for a
/// standalone peer).
pub(crate) type Target = (String, u16, Vec<(u16, u16)>);

/// One worker's set of endpoints: one per cluster master, or a single
/// standalone peer. A lane is driven by exactly one worker, so its
/// endpoints are never concurrently mutated; the lane is the unit of
/// per-key ordering.
///
/// The lane is also the reconnect supervisor: on a socket fault it
/// rebuilds the endpoint in place, preserving the lane identity, slot
/// assignment and pipe budget, and re-emits the failed command when
/// per-command flushes make it unambiguous.
pub(crate) struct Lane {
    index: usize,
    endpoints: Vec<Endpoint>,
    per_command_flush: bool,
    retries: u32,
    metrics: Option<Arc<dyn MetricsSink>>,
    reconnects: u64,
}

impl Lane {
    pub async fn open(
        index: usize,
        targets: &[Target],
        db: i64,
        metrics: Option<Arc<dyn MetricsSink>>,
        config: &Config,
    ) -> Result<Self> {
        let mut endpoints = Vec::with_capacity(targets.len());
        for (host, port, slots) in targets {
            let mut endpoint = Endpoint::open(host, *port, db, metrics.clone(), config).await?;
            endpoint.set_slots(slots.clone());
            endpoints.push(endpoint);
        }

        Ok(Self {
            index,
            endpoints,
            per_command_flush: config.migrate_flush,
            retries: config.migrate_retries,
            metrics,
            reconnects: 0,
        })
    }

    pub fn endpoint(&mut self, node: usize) -> &mut Endpoint {
        &mut self.endpoints[node]
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Appends a command on `node`, recovering the endpoint on a socket
    /// fault. Error replies surfaced by an auto-drain are returned.
    pub async fn batch(
        &mut self,
        node: usize,
        command: &Command,
    ) -> Result<SmallVec<[RedisError; 2]>> {
        match self.endpoints[node].batch(self.per_command_flush, command).await {
            Ok(errors) => Ok(errors),
            Err(e) if is_endpoint_fault(&e) => self.recover(node, command, e).await,
            Err(e) => Err(e),
        }
    }

    /// Drains `node`'s replies. On a read-side fault the batch boundary is
    /// ambiguous: the inflight commands are lost and the endpoint is only
    /// rebuilt.
    pub async fn flush(&mut self, node: usize) -> Result<SmallVec<[RedisError; 2]>> {
        match self.endpoints[node].flush().await {
            Ok(errors) => Ok(errors),
            Err(e) if is_endpoint_fault(&e) => {
                warn!(
                    "[lane {}][{}] endpoint fault while draining: {e}",
                    self.index,
                    self.endpoints[node].tag()
                );
                match self.endpoints[node].reopen().await {
                    Ok(()) => {
                        self.reconnects += 1;
                        Err(e)
                    }
                    Err(reopen_err) => {
                        self.record_connect_failure(node);
                        Err(reopen_err)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn flush_all(&mut self) -> Result<SmallVec<[RedisError; 2]>> {
        let mut errors = SmallVec::new();
        for node in 0..self.endpoints.len() {
            errors.extend(self.flush(node).await?);
        }
        Ok(errors)
    }

    pub async fn close_all(&mut self) {
        for endpoint in &mut self.endpoints {
            endpoint.close().await;
        }
    }

    /// Rebuilds the endpoint after a write-side fault. With per-command
    /// flushes the failed command is known exactly and is re-emitted, up
    /// to `migrate_retries` attempts; otherwise the endpoint is rebuilt
    /// and the original fault surfaces to the worker.
    async fn recover(
        &mut self,
        node: usize,
        command: &Command,
        err: Error,
    ) -> Result<SmallVec<[RedisError; 2]>> {
        let retries = if self.per_command_flush {
            self.retries
        } else {
            0
        };
        let mut attempt = 0u32;

        warn!(
            "[lane {}][{}] endpoint fault: {err}",
            self.index,
            self.endpoints[node].tag()
        );

        loop {
            match self.endpoints[node].reopen().await {
                Ok(()) => {
                    self.reconnects += 1;

                    if attempt >= retries {
                        return Err(err);
                    }
                    attempt += 1;

                    match self.endpoints[node].batch(true, command).await {
                        Ok(errors) => return Ok(errors),
                        Err(e) if is_endpoint_fault(&e) && attempt < retries => {
                            warn!(
                                "[lane {}][{}] retry {attempt} failed: {e}",
                                self.index,
                                self.endpoints[node].tag()
                            );
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => {
                    self.record_connect_failure(node);
                    if attempt >= retries {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn record_connect_failure(&self, node: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record(
                self.endpoints[node].label(),
                Metric::Failure {
                    reason: reason::CONNECT,
                    count: 1,
                },
            );
        }
    }
}

fn is_endpoint_fault(e: &Error) -> bool {
    matches!(e, Error::IO(_) | Error::Protocol(_))
}
