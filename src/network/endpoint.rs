use crate::{
    Config, Error, RedisError, Result,
    metrics::{Metric, MetricsSink, endpoint_label, reason},
    network::{TcpStreamReader, TcpStreamWriter, tcp_connect},
    resp::{Command, CommandEncoder, Value, ValueDecoder, cmd},
};
#[cfg(feature = "native-tls")]
use crate::network::{TcpTlsStreamReader, TcpTlsStreamWriter, tcp_tls_connect};
use futures_util::{SinkExt, StreamExt};
use log::{Level, debug, log_enabled, warn};
use smallvec::SmallVec;
use std::{io, sync::Arc, time::Instant};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{FramedRead, FramedWrite};

/// Writer flush threshold when `migrate_flush` is `no`.
const WRITE_FLUSH_THRESHOLD: usize = 64 * 1024;

pub(crate) enum Streams {
    Tcp(
        FramedRead<TcpStreamReader, ValueDecoder>,
        FramedWrite<TcpStreamWriter, CommandEncoder>,
    ),
    #[cfg(feature = "native-tls")]
    TcpTls(
        FramedRead<TcpTlsStreamReader, ValueDecoder>,
        FramedWrite<TcpTlsStreamWriter, CommandEncoder>,
    ),
}

impl Streams {
    pub async fn connect(host: &str, port: u16, config: &Config) -> Result<Self> {
        #[cfg(feature = "native-tls")]
        if let Some(tls_config) = &config.tls_config {
            let (reader, writer) = tcp_tls_connect(host, port, tls_config, config).await?;
            let framed_read = FramedRead::new(reader, ValueDecoder);
            let framed_write = FramedWrite::new(writer, CommandEncoder);
            return Ok(Streams::TcpTls(framed_read, framed_write));
        }

        let (reader, writer) = tcp_connect(host, port, config).await?;
        let framed_read = FramedRead::new(reader, ValueDecoder);
        let framed_write = FramedWrite::new(writer, CommandEncoder);
        Ok(Streams::Tcp(framed_read, framed_write))
    }
}

/// One full-duplex connection to a Redis server with its own pipelined
/// batch state.
///
/// Commands appended with [`batch`](Endpoint::batch) are buffered and
/// their replies drained later with [`sync`](Endpoint::sync) or
/// [`flush`](Endpoint::flush); replies are consumed in strict FIFO order
/// of submission, the endpoint never reorders commands.
pub struct Endpoint {
    host: String,
    port: u16,
    config: Config,
    streams: Streams,
    tag: String,
    label: String,
    /// Database selected after the last accepted `SELECT`, `-1` if unknown
    db: i64,
    pipe_budget: i32,
    inflight: u32,
    /// Slot ranges owned by this endpoint when it is a cluster master
    slots: Vec<(u16, u16)>,
    metrics: Option<Arc<dyn MetricsSink>>,
    batch_started: Option<Instant>,
    unflushed_bytes: usize,
    unflushed_commands: u64,
}

impl Endpoint {
    /// Establishes the connection, authenticates (`AUTH` when credentials
    /// are configured, `PING` otherwise) and selects `db` when `db >= 0`.
    pub async fn open(
        host: &str,
        port: u16,
        db: i64,
        metrics: Option<Arc<dyn MetricsSink>>,
        config: &Config,
    ) -> Result<Self> {
        let streams = Streams::connect(host, port, config).await?;

        let mut endpoint = Self {
            host: host.to_owned(),
            port,
            config: config.clone(),
            streams,
            tag: format!("{host}:{port}"),
            label: endpoint_label(host, port),
            db: -1,
            pipe_budget: config.migrate_batch_size,
            inflight: 0,
            slots: Vec::new(),
            metrics,
            batch_started: None,
            unflushed_bytes: 0,
            unflushed_commands: 0,
        };

        endpoint.post_connect(db).await?;

        Ok(endpoint)
    }

    async fn post_connect(&mut self, db: i64) -> Result<()> {
        let username = self.config.username.clone();
        let password = self.config.password.clone();

        match password {
            Some(password) => {
                let command = match username {
                    Some(username) => cmd("AUTH").arg(username).arg(password),
                    None => cmd("AUTH").arg(password),
                };
                self.handshake(&command).await?;
            }
            None => {
                self.handshake(&cmd("PING")).await?;
            }
        }

        if db >= 0 {
            self.handshake(&cmd("SELECT").arg(db)).await?;
            self.db = db;
        }

        Ok(())
    }

    /// `AUTH`/`PING`/`SELECT` error replies are fatal for the run, not a
    /// reply-class failure.
    async fn handshake(&mut self, command: &Command) -> Result<()> {
        match self.send(command).await? {
            Value::Error(e) => Err(Error::Auth(format!("[{}] {e}", self.tag))),
            _ => Ok(()),
        }
    }

    /// Synchronous single-shot request.
    ///
    /// Any pending pipelined batch is drained first so replies do not
    /// interleave with this request.
    pub async fn send(&mut self, command: &Command) -> Result<Value> {
        if self.inflight > 0 {
            self.flush().await?;
        }

        self.feed(command).await?;
        self.unflushed_commands += 1;
        self.flush_writer().await?;

        let value = self.read().await?;
        match &value {
            Value::Error(_) => self.record(Metric::Failure {
                reason: reason::RESPOND,
                count: 1,
            }),
            _ => self.record(Metric::Success { count: 1 }),
        }

        Ok(value)
    }

    /// Appends the command to the outbound buffer.
    ///
    /// With `force` the writer is flushed immediately; otherwise it is
    /// flushed once 64 KiB accumulated. When `inflight` reaches the pipe
    /// budget the endpoint drains its replies, so a batch never exceeds
    /// the budget; error replies collected by that drain are returned.
    pub async fn batch(&mut self, force: bool, command: &Command) -> Result<SmallVec<[RedisError; 2]>> {
        if self.inflight == 0 {
            self.batch_started = Some(Instant::now());
        }

        self.feed(command).await?;
        self.inflight += 1;
        self.unflushed_bytes += command.encoded_len();
        self.unflushed_commands += 1;

        if force || self.unflushed_bytes >= WRITE_FLUSH_THRESHOLD {
            self.flush_writer().await?;
        }

        if self.pipe_budget >= 0 && self.inflight >= self.pipe_budget as u32 {
            return self.flush().await;
        }

        Ok(SmallVec::new())
    }

    /// Flushes and reads exactly `inflight` replies in submission order.
    ///
    /// Used when the caller needs reply bodies; the migration hot path
    /// uses [`flush`](Endpoint::flush) instead.
    pub async fn sync(&mut self) -> Result<Vec<Value>> {
        self.flush_writer().await?;

        let mut replies = Vec::with_capacity(self.inflight as usize);
        while self.inflight > 0 {
            match self.read().await {
                Ok(value) => {
                    self.inflight -= 1;
                    replies.push(value);
                }
                Err(e) => {
                    // the rest of the batch is lost with the connection
                    self.inflight = 0;
                    return Err(e);
                }
            }
        }

        Ok(replies)
    }

    /// Like [`sync`](Endpoint::sync), but discards reply bodies after
    /// classifying each as success or error and updating the counters.
    /// Error replies are returned so the caller can react to specific
    /// kinds (`BUSYKEY` fallback).
    pub async fn flush(&mut self) -> Result<SmallVec<[RedisError; 2]>> {
        self.flush_writer().await?;

        let mut errors = SmallVec::new();
        while self.inflight > 0 {
            match self.read().await {
                Ok(Value::Error(e)) => {
                    self.inflight -= 1;
                    warn!("[{}] error reply: {e}", self.tag);
                    self.record(Metric::Failure {
                        reason: reason::RESPOND,
                        count: 1,
                    });
                    errors.push(e);
                }
                Ok(_) => {
                    self.inflight -= 1;
                    self.record(Metric::Success { count: 1 });
                }
                Err(e) => {
                    self.inflight = 0;
                    return Err(e);
                }
            }
        }

        Ok(errors)
    }

    /// Best-effort teardown; failures are logged and swallowed.
    pub async fn close(&mut self) {
        let result = match &mut self.streams {
            Streams::Tcp(_, framed_write) => framed_write.get_mut().shutdown().await,
            #[cfg(feature = "native-tls")]
            Streams::TcpTls(_, framed_write) => framed_write.get_mut().shutdown().await,
        };

        if let Err(e) = result {
            debug!("[{}] error while closing: {e}", self.tag);
        }
    }

    /// Rebuilds the connection with the same host/port/pipe/stats/config,
    /// keeping the slot assignment. Commands inflight at the time of
    /// failure are considered lost.
    pub async fn reopen(&mut self) -> Result<()> {
        self.close().await;

        self.streams = Streams::connect(&self.host, self.port, &self.config).await?;
        self.inflight = 0;
        self.batch_started = None;
        self.unflushed_bytes = 0;
        self.unflushed_commands = 0;

        let db = self.db;
        self.db = -1;
        self.post_connect(db).await?;

        self.record(Metric::Reconnect);
        warn!("[{}] endpoint reconnected", self.tag);

        Ok(())
    }

    async fn feed(&mut self, command: &Command) -> Result<()> {
        if log_enabled!(Level::Debug) {
            debug!("[{}] Sending command: {command}", self.tag);
        }
        match &mut self.streams {
            Streams::Tcp(_, framed_write) => framed_write.feed(command).await,
            #[cfg(feature = "native-tls")]
            Streams::TcpTls(_, framed_write) => framed_write.feed(command).await,
        }
    }

    async fn flush_writer(&mut self) -> Result<()> {
        match &mut self.streams {
            Streams::Tcp(_, framed_write) => framed_write.flush().await?,
            #[cfg(feature = "native-tls")]
            Streams::TcpTls(_, framed_write) => framed_write.flush().await?,
        }

        if self.unflushed_commands > 0 {
            let latency = self
                .batch_started
                .take()
                .map(|started| started.elapsed())
                .unwrap_or_default();
            self.record(Metric::Send {
                count: self.unflushed_commands,
                latency,
            });
            self.unflushed_commands = 0;
            self.unflushed_bytes = 0;
        }

        Ok(())
    }

    async fn read(&mut self) -> Result<Value> {
        let result = match &mut self.streams {
            Streams::Tcp(framed_read, _) => framed_read.next().await,
            #[cfg(feature = "native-tls")]
            Streams::TcpTls(framed_read, _) => framed_read.next().await,
        };

        match result {
            Some(result) => {
                if log_enabled!(Level::Debug) {
                    match &result {
                        Ok(value) => debug!("[{}] Received reply {value}", self.tag),
                        Err(err) => debug!("[{}] Received error {err:?}", self.tag),
                    }
                }
                result
            }
            None => {
                debug!("[{}] Socket is closed", self.tag);
                Err(Error::IO(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("[{}] disconnected by peer", self.tag),
                )))
            }
        }
    }

    fn record(&self, metric: Metric) {
        if let Some(metrics) = &self.metrics {
            metrics.record(&self.label, metric);
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database selected after the last accepted `SELECT`, `-1` if unknown
    pub fn db(&self) -> i64 {
        self.db
    }

    /// Updates the cached database after the caller batched a `SELECT`.
    /// The cache is optimistic: a rejected `SELECT` surfaces later as an
    /// error reply when the batch is drained.
    pub fn set_db(&mut self, db: i64) {
        self.db = db;
    }

    pub fn inflight(&self) -> u32 {
        self.inflight
    }

    pub fn pipe_budget(&self) -> i32 {
        self.pipe_budget
    }

    /// Slot ranges owned by this endpoint; empty for a standalone peer.
    pub fn slots(&self) -> &[(u16, u16)] {
        &self.slots
    }

    pub fn set_slots(&mut self, slots: Vec<(u16, u16)>) {
        self.slots = slots;
    }

    pub(crate) fn tag(&self) -> &str {
        &self.tag
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
