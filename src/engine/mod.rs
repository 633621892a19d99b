/*!
The migration engine: a fan-out, pipelined dispatcher turning a stream of
RDB key/value records and replicated commands into `RESTORE`/`DEL`/`SELECT`
requests against one or more target Redis endpoints.

A single demultiplexer consumes the upstream [`Event`] stream and hands
work to `migrate_threads` workers over bounded queues; each worker drives
one lane (its own set of endpoints), so per-key ordering holds within a
run: the same key always hashes to the same lane.
*/
mod event;
mod filter;
mod keys;
mod pool;
mod worker;

pub use event::*;
pub use filter::*;
pub use keys::*;
pub(crate) use pool::*;
pub(crate) use worker::*;

use crate::{
    Config, Error, IntoConfig, MetricGateway, Result, ServerConfig,
    cluster::{SlotMap, hash_slot, same_slot},
    metrics::{LogSink, Metric, MetricsSink, endpoint_label, reason},
    resp::Command,
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

pub use crate::config::RestoreMode;

/// Aggregate counts of one migration run.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Upstream events consumed
    pub events: u64,
    /// Events rejected by the filter set
    pub filtered: u64,
    /// Work items handed to lanes
    pub dispatched: u64,
    /// Keys restored
    pub restored: u64,
    /// Replicated commands replayed
    pub commands: u64,
    /// Error replies drained (non-fatal)
    pub reply_errors: u64,
    /// Multi-key commands dropped because their keys span several slots
    pub cross_slot_drops: u64,
    /// Endpoint-level faults surfaced to workers
    pub io_failures: u64,
    /// Supervisor-triggered endpoint rebuilds
    pub reconnects: u64,
}

impl MigrationReport {
    /// `false` iff a fatal error class fired during the run; the launcher
    /// maps this to a non-zero exit status.
    pub fn is_success(&self) -> bool {
        self.io_failures == 0
    }
}

/// The pipelined, fan-out migration engine.
///
/// ```no_run
/// use rdbferry::{engine::{Event, MigrationEngine}, Result};
/// use futures_util::stream;
///
/// # async fn example() -> Result<()> {
/// let engine = MigrationEngine::new("redis://127.0.0.1:6379?migrate_threads=4")?;
/// let report = engine.run(stream::iter(Vec::<Event>::new())).await?;
/// assert!(report.is_success());
/// # Ok(())
/// # }
/// ```
pub struct MigrationEngine {
    config: Config,
    filter: FilterSet,
    metrics: Option<Arc<dyn MetricsSink>>,
    default_lane: usize,
}

impl MigrationEngine {
    pub fn new(config: impl IntoConfig) -> Result<Self> {
        let config = config.into_config()?;

        if config.migrate_threads == 0 {
            return Err(Error::Config("migrate_threads must be at least 1".to_owned()));
        }

        if config.restore_mode == RestoreMode::Fallback && !config.migrate_flush {
            return Err(Error::Config(
                "restore_mode=fallback requires migrate_flush=yes".to_owned(),
            ));
        }

        let metrics: Option<Arc<dyn MetricsSink>> = match config.metric_gateway {
            MetricGateway::None => None,
            MetricGateway::Influxdb => Some(Arc::new(LogSink)),
        };

        Ok(Self {
            config,
            filter: FilterSet::default(),
            metrics,
            default_lane: 0,
        })
    }

    /// Replaces the event admission predicates.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterSet) -> Self {
        self.filter = filter;
        self
    }

    /// Replaces the metric sink chosen by `metric_gateway`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Lane receiving keyless commands in cluster mode.
    #[must_use]
    pub fn with_default_lane(mut self, lane: usize) -> Self {
        self.default_lane = lane;
        self
    }

    /// Runs the engine over the upstream event stream.
    ///
    /// Returns once the stream ends and every endpoint has been drained.
    /// In sync-follow mode the caller keeps the stream open until its
    /// shutdown signal, which triggers the same graceful drain.
    /// Configuration and authentication errors abort the run; endpoint
    /// faults are counted in the report instead.
    pub async fn run(
        self,
        mut events: impl Stream<Item = Event> + Unpin,
    ) -> Result<MigrationReport> {
        let threads = self.config.migrate_threads;

        let (targets, slot_map): (Vec<Target>, Option<SlotMap>) = match &self.config.server {
            ServerConfig::Standalone { host, port } => {
                (vec![(host.clone(), *port, Vec::new())], None)
            }
            ServerConfig::Cluster(cluster_config) => {
                let slot_map = SlotMap::from_topology(&cluster_config.topology)?;
                let targets = slot_map
                    .nodes()
                    .iter()
                    .map(|node| (node.host.clone(), node.port, node.slot_ranges.clone()))
                    .collect();
                (targets, Some(slot_map))
            }
        };

        // bounded queues between the demultiplexer and the workers; when a
        // worker falls behind the send blocks, throttling the upstream
        // reader
        let queue_capacity = 4 * self.config.migrate_batch_size.max(16) as usize;

        let mut senders = Vec::with_capacity(threads);
        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let lane = Lane::open(
                index,
                &targets,
                self.config.database as i64,
                self.metrics.clone(),
                &self.config,
            )
            .await?;
            let (sender, receiver) = mpsc::channel(queue_capacity);
            senders.push(sender);
            workers.push(tokio::spawn(worker_loop(
                lane,
                receiver,
                self.config.restore_mode,
            )));
        }

        let mut report = MigrationReport::default();
        // post-snapshot stream commands select their database in-band
        let mut stream_db = -1i64;
        let mut next_lane = 0usize;

        while let Some(event) = events.next().await {
            report.events += 1;
            match event {
                Event::BeginRdb => info!("RDB stream started"),
                Event::EndRdb => {
                    info!("RDB stream complete, draining endpoints");
                    for sender in &senders {
                        let _ = sender.send(WorkItem::Flush).await;
                    }
                }
                Event::KeyValue {
                    db,
                    key,
                    type_tag,
                    ttl,
                    dump_payload,
                } => {
                    if !self.filter.passes_key(db, &key, type_tag) {
                        report.filtered += 1;
                        continue;
                    }

                    let slot = hash_slot(&key);
                    let node = match &slot_map {
                        Some(map) => map.owner_of_slot(slot),
                        None => 0,
                    };
                    let lane = slot as usize % threads;

                    report.dispatched += 1;
                    let item = WorkItem::Restore {
                        db,
                        key,
                        ttl,
                        payload: dump_payload,
                        node,
                    };
                    if senders[lane].send(item).await.is_err() {
                        warn!("lane {lane} is gone, dropping key");
                    }
                }
                Event::Command { db, argv } => {
                    self.route_command(
                        db,
                        argv,
                        &slot_map,
                        threads,
                        &senders,
                        &mut next_lane,
                        &mut report,
                    )
                    .await;
                }
                Event::StreamCommand { argv } => {
                    if argv
                        .first()
                        .is_some_and(|name| name.eq_ignore_ascii_case(b"SELECT"))
                    {
                        if let Some(db) = argv
                            .get(1)
                            .and_then(|db| std::str::from_utf8(db).ok())
                            .and_then(|db| db.parse::<i64>().ok())
                        {
                            stream_db = db;
                        }
                        continue;
                    }

                    self.route_command(
                        stream_db,
                        argv,
                        &slot_map,
                        threads,
                        &senders,
                        &mut next_lane,
                        &mut report,
                    )
                    .await;
                }
            }
        }

        // closing the queues lets each worker drain its last batches and
        // release its endpoints
        drop(senders);

        for worker in workers {
            let stats = worker
                .await
                .map_err(|e| Error::Client(format!("worker failed: {e}")))?;
            report.restored += stats.restored;
            report.commands += stats.commands;
            report.reply_errors += stats.reply_errors;
            report.io_failures += stats.io_failures;
            report.reconnects += stats.reconnects;
        }

        info!(
            "migration finished: {} keys restored, {} commands replayed, {} reply errors, {} endpoint faults, {} reconnects",
            report.restored,
            report.commands,
            report.reply_errors,
            report.io_failures,
            report.reconnects
        );

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn route_command(
        &self,
        db: i64,
        argv: Vec<Bytes>,
        slot_map: &Option<SlotMap>,
        threads: usize,
        senders: &[mpsc::Sender<WorkItem>],
        next_lane: &mut usize,
        report: &mut MigrationReport,
    ) {
        let keys = extract_keys(&argv);

        let db_filter = if db >= 0 { Some(db) } else { None };
        if !self
            .filter
            .passes_command(db_filter, keys.first().map(|k| k.as_ref()))
        {
            report.filtered += 1;
            return;
        }

        let (node, lane) = match slot_map {
            Some(map) => {
                if keys.is_empty() {
                    // keyless commands cannot be slot-routed; they go to
                    // the default lane on the first master
                    (0, self.default_lane % threads)
                } else {
                    match same_slot(keys.iter().map(|k| k.as_ref())) {
                        Some(slot) => (map.owner_of_slot(slot), slot as usize % threads),
                        None => {
                            let name = argv
                                .first()
                                .map(|n| String::from_utf8_lossy(n).into_owned())
                                .unwrap_or_default();
                            warn!("Dropping cross-slot command {name}");
                            report.cross_slot_drops += 1;

                            if let (Some(metrics), Some(key)) = (&self.metrics, keys.first()) {
                                let owner = &map.nodes()[map.owner_of(key)];
                                metrics.record(
                                    &endpoint_label(&owner.host, owner.port),
                                    Metric::Failure {
                                        reason: reason::CROSS_SLOT,
                                        count: 1,
                                    },
                                );
                            }
                            return;
                        }
                    }
                }
            }
            None => match keys.first() {
                Some(key) => (0, hash_slot(key) as usize % threads),
                None => {
                    // keyless commands round-robin across lanes
                    let lane = *next_lane;
                    *next_lane = (*next_lane + 1) % threads;
                    (0, lane)
                }
            },
        };

        let Some(command) = Command::from_argv(argv) else {
            return;
        };

        report.dispatched += 1;
        let item = WorkItem::Command { db, command, node };
        if senders[lane].send(item).await.is_err() {
            warn!("lane {lane} is gone, dropping command");
        }
    }
}
