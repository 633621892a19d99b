use crate::{Error, Result};
#[cfg(feature = "native-tls")]
use native_tls::{Certificate, Identity, Protocol, TlsConnector, TlsConnectorBuilder};
use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

const DEFAULT_PORT: u16 = 6379;
const DEFAULT_DATABASE: usize = 0;
const DEFAULT_CONNECT_TIMEOUT: u64 = 10_000;
const DEFAULT_MIGRATE_BATCH_SIZE: i32 = 4096;
const DEFAULT_MIGRATE_THREADS: usize = 4;
const DEFAULT_MIGRATE_FLUSH: bool = true;
const DEFAULT_MIGRATE_RETRIES: u32 = 1;
const DEFAULT_KEEP_ALIVE: Option<Duration> = None;
const DEFAULT_NO_DELAY: bool = true;

type Uri<'a> = (
    &'a str,
    Option<&'a str>,
    Option<&'a str>,
    Vec<(&'a str, u16)>,
    Vec<&'a str>,
    Option<HashMap<String, String>>,
);

/// Configuration options for the migration engine and its endpoints.
///
/// Query keys in a `redis://` URI keep the ecosystem names
/// (`migrate_batch_size`, `migrate_threads`, `migrate_flush`,
/// `migrate_retries`, `auth_user`, `auth_password`, `connection_timeout`,
/// `metric_gateway`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Target server configuration (standalone or cluster)
    pub server: ServerConfig,
    /// An optional ACL username for authentication (`auth_user`).
    ///
    /// See [`ACL`](https://redis.io/docs/management/security/acl/)
    pub username: Option<String>,
    /// An optional password for authentication (`auth_password`).
    ///
    /// The password could be either coupled with an ACL username either used alone.
    pub password: Option<String>,
    /// The default database selected after connecting.
    ///
    /// If `database` is not set to `0`, a [`SELECT`](https://redis.io/commands/select/)
    /// command is issued at connection or reconnection. The worker switches
    /// databases afterwards as the event stream dictates.
    pub database: usize,
    /// An optional TLS configuration.
    #[cfg(feature = "native-tls")]
    pub tls_config: Option<TlsConfig>,
    /// The time to attempt a connection before timing out (`connection_timeout`).
    /// The default is 10 seconds.
    pub connect_timeout: Duration,
    /// Pipeline budget per endpoint (`migrate_batch_size`).
    ///
    /// When `inflight` reaches the budget the endpoint drains its replies.
    /// `-1` disables auto-drain; the worker then flushes at batch boundaries.
    pub migrate_batch_size: i32,
    /// Lane count per target (`migrate_threads`). One worker drives one lane.
    pub migrate_threads: usize,
    /// `true` = flush the writer per command, `false` = flush per 64 KiB
    /// (`migrate_flush`, `yes`/`no`).
    pub migrate_flush: bool,
    /// Retries on socket failure (`migrate_retries`).
    ///
    /// Only honored when `migrate_flush` is `true`: with per-command flushes
    /// the failed command is unambiguous and can be re-emitted.
    pub migrate_retries: u32,
    /// How `RESTORE` behaves when the target key already exists.
    pub restore_mode: RestoreMode,
    /// Metric sink selection (`metric_gateway`, `none` or `influxdb`).
    pub metric_gateway: MetricGateway,
    /// Enable/disable keep-alive functionality (default `None`)
    pub keep_alive: Option<Duration>,
    /// Enable/disable the use of Nagle's algorithm (default `true`)
    pub no_delay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: Default::default(),
            username: Default::default(),
            password: Default::default(),
            database: DEFAULT_DATABASE,
            #[cfg(feature = "native-tls")]
            tls_config: Default::default(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT),
            migrate_batch_size: DEFAULT_MIGRATE_BATCH_SIZE,
            migrate_threads: DEFAULT_MIGRATE_THREADS,
            migrate_flush: DEFAULT_MIGRATE_FLUSH,
            migrate_retries: DEFAULT_MIGRATE_RETRIES,
            restore_mode: Default::default(),
            metric_gateway: Default::default(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            no_delay: DEFAULT_NO_DELAY,
        }
    }
}

impl FromStr for Config {
    type Err = Error;

    /// Build a config from an URI or a standard address format `host`:`port`
    fn from_str(str: &str) -> Result<Config> {
        if let Some(config) = Self::parse_uri(str) {
            Ok(config)
        } else if let Some(addr) = Self::parse_addr(str) {
            addr.into_config()
        } else {
            Err(Error::Config(format!("Cannot parse config from {str}")))
        }
    }
}

impl Config {
    /// Parse address in the standard format `host`:`port`
    fn parse_addr(str: &str) -> Option<(&str, u16)> {
        let mut iter = str.split(':');

        match (iter.next(), iter.next(), iter.next()) {
            (Some(host), Some(port), None) => {
                if let Ok(port) = port.parse::<u16>() {
                    Some((host, port))
                } else {
                    None
                }
            }
            (Some(host), None, None) => Some((host, DEFAULT_PORT)),
            _ => None,
        }
    }

    fn parse_uri(uri: &str) -> Option<Config> {
        let (scheme, username, password, mut hosts, path_segments, mut query) =
            Self::break_down_uri(uri)?;
        let mut path_segments = path_segments.into_iter();

        #[cfg(feature = "native-tls")]
        let tls_config = match scheme {
            "redis" => None,
            "rediss" => Some(TlsConfig::default()),
            _ => {
                return None;
            }
        };

        #[cfg(not(feature = "native-tls"))]
        match scheme {
            "redis" => (),
            _ => {
                return None;
            }
        }

        if hosts.len() > 1 {
            return None;
        }
        let (host, port) = hosts.pop()?;
        let server = ServerConfig::Standalone {
            host: host.to_owned(),
            port,
        };

        let database = match path_segments.next() {
            Some(database) => match database.parse::<usize>() {
                Ok(database) => database,
                Err(_) => {
                    return None;
                }
            },
            None => DEFAULT_DATABASE,
        };

        let mut config = Config {
            server,
            username: username.map(|u| u.to_owned()),
            password: password.map(|p| p.to_owned()),
            database,
            #[cfg(feature = "native-tls")]
            tls_config,
            ..Default::default()
        };

        if let Some(ref mut query) = query {
            if let Some(username) = query.remove("auth_user") {
                config.username = Some(username);
            }

            if let Some(password) = query.remove("auth_password") {
                config.password = Some(password);
            }

            if let Some(millis) = query.remove("connection_timeout")
                && let Ok(millis) = millis.parse::<u64>()
            {
                config.connect_timeout = Duration::from_millis(millis);
            }

            if let Some(batch_size) = query.remove("migrate_batch_size")
                && let Ok(batch_size) = batch_size.parse::<i32>()
            {
                config.migrate_batch_size = batch_size;
            }

            if let Some(threads) = query.remove("migrate_threads")
                && let Ok(threads) = threads.parse::<usize>()
            {
                config.migrate_threads = threads;
            }

            if let Some(flush) = query.remove("migrate_flush") {
                config.migrate_flush = matches!(flush.as_str(), "yes" | "true");
            }

            if let Some(retries) = query.remove("migrate_retries")
                && let Ok(retries) = retries.parse::<u32>()
            {
                config.migrate_retries = retries;
            }

            if let Some(mode) = query.remove("restore_mode")
                && let Ok(mode) = mode.parse::<RestoreMode>()
            {
                config.restore_mode = mode;
            }

            if let Some(gateway) = query.remove("metric_gateway")
                && let Ok(gateway) = gateway.parse::<MetricGateway>()
            {
                config.metric_gateway = gateway;
            }

            if let Some(keep_alive) = query.remove("keep_alive")
                && let Ok(keep_alive) = keep_alive.parse::<u64>()
            {
                config.keep_alive = Some(Duration::from_millis(keep_alive));
            }

            if let Some(no_delay) = query.remove("no_delay")
                && let Ok(no_delay) = no_delay.parse::<bool>()
            {
                config.no_delay = no_delay;
            }
        }

        Some(config)
    }

    /// break down an uri in a tuple (scheme, username, password, hosts, path_segments, query)
    fn break_down_uri(uri: &str) -> Option<Uri> {
        let end_of_scheme = match uri.find("://") {
            Some(index) => index,
            None => {
                return None;
            }
        };

        let scheme = &uri[..end_of_scheme];

        let after_scheme = &uri[end_of_scheme + 3..];

        let (before_query, query) = match after_scheme.find('?') {
            Some(index) => match Self::exclusive_split_at(after_scheme, index) {
                (Some(before_query), after_query) => (before_query, after_query),
                _ => {
                    return None;
                }
            },
            None => (after_scheme, None),
        };

        let (authority, path) = match before_query.find('/') {
            Some(index) => match Self::exclusive_split_at(before_query, index) {
                (Some(authority), path) => (authority, path),
                _ => {
                    return None;
                }
            },
            None => (before_query, None),
        };

        let (user_info, hosts) = match authority.rfind('@') {
            Some(index) => {
                // if '@' is in the host section, it MUST be interpreted as a request for
                // authentication, even if the credentials are empty.
                let (user_info, hosts) = Self::exclusive_split_at(authority, index);
                match hosts {
                    Some(hosts) => (user_info, hosts),
                    None => {
                        // missing hosts
                        return None;
                    }
                }
            }
            None => (None, authority),
        };

        let (username, password) = match user_info {
            Some(user_info) => match user_info.find(':') {
                Some(index) => match Self::exclusive_split_at(user_info, index) {
                    (username, None) => (username, Some("")),
                    (username, password) => (username, password),
                },
                None => {
                    // username without password is not accepted
                    return None;
                }
            },
            None => (None, None),
        };

        let hosts = hosts
            .split(',')
            .map(Self::parse_addr)
            .collect::<Option<Vec<_>>>();
        let hosts = hosts?;

        let path_segments = match path {
            Some(path) => path.split('/').collect::<Vec<_>>(),
            None => Vec::new(),
        };

        let query = match query.map(|q| {
            q.split('&')
                .map(|s| s.split_once('=').map(|(k, v)| (k.to_owned(), v.to_owned())))
                .collect::<Option<HashMap<String, String>>>()
        }) {
            Some(Some(query)) => Some(query),
            Some(None) => return None,
            None => None,
        };

        Some((scheme, username, password, hosts, path_segments, query))
    }

    /// Splits a string into a section before a given index and a section exclusively after the index.
    /// Empty portions are returned as `None`.
    fn exclusive_split_at(s: &str, i: usize) -> (Option<&str>, Option<&str>) {
        let (l, r) = s.split_at(i);

        let lout = if !l.is_empty() { Some(l) } else { None };
        let rout = if r.len() > 1 { Some(&r[1..]) } else { None };

        (lout, rout)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(feature = "native-tls")]
        let scheme = if self.tls_config.is_some() {
            "rediss://"
        } else {
            "redis://"
        };

        #[cfg(not(feature = "native-tls"))]
        let scheme = "redis://";

        f.write_str(scheme)?;

        if let Some(username) = &self.username {
            f.write_str(username)?;
        }

        if let Some(password) = &self.password {
            write!(f, ":{password}@")?;
        }

        match &self.server {
            ServerConfig::Standalone { host, port } => {
                f.write_str(host)?;
                if *port != DEFAULT_PORT {
                    write!(f, ":{port}")?;
                }
            }
            ServerConfig::Cluster(_) => {
                f.write_str("cluster")?;
            }
        }

        if self.database > 0 {
            write!(f, "/{}", self.database)?;
        }

        let mut query_separator = false;
        let mut push = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if !query_separator {
                query_separator = true;
                f.write_str("?")
            } else {
                f.write_str("&")
            }
        };

        let connect_timeout = self.connect_timeout.as_millis() as u64;
        if connect_timeout != DEFAULT_CONNECT_TIMEOUT {
            push(f)?;
            write!(f, "connection_timeout={connect_timeout}")?;
        }

        if self.migrate_batch_size != DEFAULT_MIGRATE_BATCH_SIZE {
            push(f)?;
            write!(f, "migrate_batch_size={}", self.migrate_batch_size)?;
        }

        if self.migrate_threads != DEFAULT_MIGRATE_THREADS {
            push(f)?;
            write!(f, "migrate_threads={}", self.migrate_threads)?;
        }

        if self.migrate_flush != DEFAULT_MIGRATE_FLUSH {
            push(f)?;
            write!(
                f,
                "migrate_flush={}",
                if self.migrate_flush { "yes" } else { "no" }
            )?;
        }

        if self.migrate_retries != DEFAULT_MIGRATE_RETRIES {
            push(f)?;
            write!(f, "migrate_retries={}", self.migrate_retries)?;
        }

        if self.restore_mode != RestoreMode::default() {
            push(f)?;
            write!(f, "restore_mode={}", self.restore_mode)?;
        }

        if self.metric_gateway != MetricGateway::default() {
            push(f)?;
            write!(f, "metric_gateway={}", self.metric_gateway)?;
        }

        if let Some(keep_alive) = self.keep_alive {
            push(f)?;
            write!(f, "keep_alive={}", keep_alive.as_millis())?;
        }

        if self.no_delay != DEFAULT_NO_DELAY {
            push(f)?;
            write!(f, "no_delay={}", self.no_delay)?;
        }

        Ok(())
    }
}

/// Configuration for connecting to the target Redis deployment
#[derive(Debug, Clone)]
pub enum ServerConfig {
    /// A standalone server (no cluster)
    Standalone {
        /// The hostname or IP address of the Redis server.
        host: String,
        /// The port on which the Redis server is listening.
        port: u16,
    },
    /// A Redis [`Cluster`](https://redis.io/docs/management/scaling/),
    /// described by a `nodes.conf`-compatible topology
    Cluster(ClusterConfig),
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::Standalone {
            host: "127.0.0.1".to_owned(),
            port: 6379,
        }
    }
}

/// Configuration for connecting to a Redis cluster.
///
/// The topology is a `nodes.conf`-compatible description
/// (one line per node: `id host:port@cport flags master-id ping-sent
/// pong-recv epoch link-state slot-ranges…`). It is parsed and validated
/// at engine startup; gaps, overlaps, or migrating slots are fatal.
#[derive(Debug, Clone, Default)]
pub struct ClusterConfig {
    /// Raw `nodes.conf` content
    pub topology: String,
}

impl ClusterConfig {
    pub fn new(topology: impl Into<String>) -> Self {
        Self {
            topology: topology.into(),
        }
    }
}

/// How `RESTORE` behaves when the target key already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestoreMode {
    /// Plain `RESTORE`; an existing key surfaces `BUSYKEY` which is counted
    /// as an endpoint failure and the run continues.
    #[default]
    Append,
    /// `RESTORE … REPLACE`
    Replace,
    /// Plain `RESTORE`; on `BUSYKEY` the worker re-emits `DEL` + `RESTORE`.
    /// Requires `migrate_flush=yes` so the failed command is unambiguous.
    Fallback,
    /// `EVAL` of a script performing `DEL` + `RESTORE` atomically, for
    /// targets that predate `RESTORE … REPLACE`.
    Legacy,
}

impl FromStr for RestoreMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "append" => Ok(Self::Append),
            "replace" => Ok(Self::Replace),
            "fallback" => Ok(Self::Fallback),
            "legacy" => Ok(Self::Legacy),
            _ => Err(Error::Config(format!("Unknown restore mode {s}"))),
        }
    }
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => f.write_str("append"),
            Self::Replace => f.write_str("replace"),
            Self::Fallback => f.write_str("fallback"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

/// Metric sink selection (`metric_gateway`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricGateway {
    /// Counters are kept in memory only
    #[default]
    None,
    /// Counters are emitted to the logging facade for the external
    /// InfluxDB relay to scrape
    Influxdb,
}

impl FromStr for MetricGateway {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "influxdb" => Ok(Self::Influxdb),
            _ => Err(Error::Config(format!("Unknown metric gateway {s}"))),
        }
    }
}

impl fmt::Display for MetricGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Influxdb => f.write_str("influxdb"),
        }
    }
}

/// Config for TLS.
///
/// See [TlsConnectorBuilder](https://docs.rs/tokio-native-tls/0.3.0/tokio_native_tls/native_tls/struct.TlsConnectorBuilder.html) documentation
#[cfg(feature = "native-tls")]
#[derive(Clone)]
pub struct TlsConfig {
    identity: Option<Identity>,
    root_certificates: Option<Vec<Certificate>>,
    min_protocol_version: Option<Protocol>,
    max_protocol_version: Option<Protocol>,
    disable_built_in_roots: bool,
    danger_accept_invalid_certs: bool,
    danger_accept_invalid_hostnames: bool,
    use_sni: bool,
}

#[cfg(feature = "native-tls")]
impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            identity: None,
            root_certificates: None,
            min_protocol_version: Some(Protocol::Tlsv10),
            max_protocol_version: None,
            disable_built_in_roots: false,
            danger_accept_invalid_certs: false,
            danger_accept_invalid_hostnames: false,
            use_sni: true,
        }
    }
}

#[cfg(feature = "native-tls")]
impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("min_protocol_version", &self.min_protocol_version)
            .field("max_protocol_version", &self.max_protocol_version)
            .field("disable_built_in_roots", &self.disable_built_in_roots)
            .field(
                "danger_accept_invalid_certs",
                &self.danger_accept_invalid_certs,
            )
            .field(
                "danger_accept_invalid_hostnames",
                &self.danger_accept_invalid_hostnames,
            )
            .field("use_sni", &self.use_sni)
            .finish()
    }
}

#[cfg(feature = "native-tls")]
impl TlsConfig {
    pub fn identity(&mut self, identity: Identity) -> &mut Self {
        self.identity = Some(identity);
        self
    }

    pub fn root_certificates(&mut self, root_certificates: Vec<Certificate>) -> &mut Self {
        self.root_certificates = Some(root_certificates);
        self
    }

    pub fn danger_accept_invalid_certs(&mut self, danger_accept_invalid_certs: bool) -> &mut Self {
        self.danger_accept_invalid_certs = danger_accept_invalid_certs;
        self
    }

    pub fn danger_accept_invalid_hostnames(
        &mut self,
        danger_accept_invalid_hostnames: bool,
    ) -> &mut Self {
        self.danger_accept_invalid_hostnames = danger_accept_invalid_hostnames;
        self
    }

    pub fn use_sni(&mut self, use_sni: bool) -> &mut Self {
        self.use_sni = use_sni;
        self
    }

    pub fn into_tls_connector_builder(&self) -> TlsConnectorBuilder {
        let mut builder = TlsConnector::builder();

        if let Some(root_certificates) = &self.root_certificates {
            for root_certificate in root_certificates {
                builder.add_root_certificate(root_certificate.clone());
            }
        }

        if let Some(identity) = &self.identity {
            builder.identity(identity.clone());
        }

        builder.min_protocol_version(self.min_protocol_version);
        builder.max_protocol_version(self.max_protocol_version);
        builder.disable_built_in_roots(self.disable_built_in_roots);
        builder.danger_accept_invalid_certs(self.danger_accept_invalid_certs);
        builder.danger_accept_invalid_hostnames(self.danger_accept_invalid_hostnames);
        builder.use_sni(self.use_sni);

        builder
    }
}

/// A value-to-[`Config`](crate::Config) conversion that consumes the input value.
///
/// This allows the engine and endpoint constructors to accept connection
/// information in a range of different formats.
pub trait IntoConfig {
    /// Converts this type into a [`Config`](crate::Config).
    fn into_config(self) -> Result<Config>;
}

impl IntoConfig for Config {
    fn into_config(self) -> Result<Config> {
        Ok(self)
    }
}

impl<T: Into<String>> IntoConfig for (T, u16) {
    fn into_config(self) -> Result<Config> {
        Ok(Config {
            server: ServerConfig::Standalone {
                host: self.0.into(),
                port: self.1,
            },
            ..Default::default()
        })
    }
}

impl IntoConfig for &str {
    fn into_config(self) -> Result<Config> {
        Config::from_str(self)
    }
}

impl IntoConfig for String {
    fn into_config(self) -> Result<Config> {
        Config::from_str(&self)
    }
}
