use std::{
    fmt::{Display, Formatter},
    str::Utf8Error,
};

/// All error kinds
#[derive(Debug)]
pub enum Error {
    /// Raised if an error occurs within the engine itself
    Client(String),
    /// TCP or TLS establishment failed
    Connect(String),
    /// The server replied with an error to `AUTH`, `PING` or `SELECT`
    Auth(String),
    /// Raised if an error occurs in the [`Config`](crate::Config) parsing
    /// or in the cluster topology description
    Config(String),
    /// Malformed reply bytes on the wire
    Protocol(String),
    /// Well-formed error reply issued by the Redis server
    Redis(RedisError),
    /// IO error when reading or writing the socket
    IO(std::io::Error),
    /// An I/O operation did not complete within its deadline
    Timeout(String),
    #[cfg(feature = "native-tls")]
    /// Raised by the TLS library
    Tls(String),
}

impl Error {
    /// `true` for the error classes that abort an endpoint or the whole run;
    /// server error replies are the only non-fatal class.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Redis(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Client(e) => f.write_fmt(format_args!("Client error: {e}")),
            Error::Connect(e) => f.write_fmt(format_args!("Connect error: {e}")),
            Error::Auth(e) => f.write_fmt(format_args!("Auth error: {e}")),
            Error::Config(e) => f.write_fmt(format_args!("Config error: {e}")),
            Error::Protocol(e) => f.write_fmt(format_args!("Protocol error: {e}")),
            Error::Redis(e) => f.write_fmt(format_args!("Redis error: {e}")),
            Error::IO(e) => f.write_fmt(format_args!("IO error: {e}")),
            Error::Timeout(e) => f.write_fmt(format_args!("Timeout: {e}")),
            #[cfg(feature = "native-tls")]
            Error::Tls(e) => f.write_fmt(format_args!("Tls error: {e}")),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IO(e)
    }
}

impl From<Utf8Error> for Error {
    fn from(e: Utf8Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

#[cfg(feature = "native-tls")]
impl From<native_tls::Error> for Error {
    fn from(e: native_tls::Error) -> Self {
        Error::Tls(e.to_string())
    }
}

/// Redis server error kind
///
/// Only the kinds a migration run actually meets are matched by name;
/// everything else falls through to [`RedisErrorKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedisErrorKind {
    BusyKey,
    ClusterDown,
    CrossSlot,
    Err,
    Loading,
    MasterDown,
    NoAuth,
    NoPerm,
    OutOfMemory,
    Readonly,
    WrongPass,
    WrongType,
    Other(String),
}

impl From<&str> for RedisErrorKind {
    fn from(str: &str) -> Self {
        match str {
            "BUSYKEY" => Self::BusyKey,
            "CLUSTERDOWN" => Self::ClusterDown,
            "CROSSSLOT" => Self::CrossSlot,
            "ERR" => Self::Err,
            "LOADING" => Self::Loading,
            "MASTERDOWN" => Self::MasterDown,
            "NOAUTH" => Self::NoAuth,
            "NOPERM" => Self::NoPerm,
            "OOM" => Self::OutOfMemory,
            "READONLY" => Self::Readonly,
            "WRONGPASS" => Self::WrongPass,
            "WRONGTYPE" => Self::WrongType,
            _ => Self::Other(str.to_owned()),
        }
    }
}

impl Display for RedisErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RedisErrorKind::BusyKey => f.write_str("BUSYKEY"),
            RedisErrorKind::ClusterDown => f.write_str("CLUSTERDOWN"),
            RedisErrorKind::CrossSlot => f.write_str("CROSSSLOT"),
            RedisErrorKind::Err => f.write_str("ERR"),
            RedisErrorKind::Loading => f.write_str("LOADING"),
            RedisErrorKind::MasterDown => f.write_str("MASTERDOWN"),
            RedisErrorKind::NoAuth => f.write_str("NOAUTH"),
            RedisErrorKind::NoPerm => f.write_str("NOPERM"),
            RedisErrorKind::OutOfMemory => f.write_str("OOM"),
            RedisErrorKind::Readonly => f.write_str("READONLY"),
            RedisErrorKind::WrongPass => f.write_str("WRONGPASS"),
            RedisErrorKind::WrongType => f.write_str("WRONGTYPE"),
            RedisErrorKind::Other(e) => f.write_str(e),
        }
    }
}

/// Error issued by the Redis server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisError {
    pub kind: RedisErrorKind,
    pub description: String,
}

impl From<&str> for RedisError {
    fn from(error: &str) -> Self {
        match error.split_once(' ') {
            Some((kind, description)) => Self {
                kind: kind.into(),
                description: description.to_owned(),
            },
            None => Self {
                kind: error.into(),
                description: "".to_owned(),
            },
        }
    }
}

impl Display for RedisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{} {}", self.kind, self.description))
    }
}
