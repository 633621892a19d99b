#[cfg(feature = "native-tls")]
use crate::TlsConfig;
use crate::{Config, Error, Result};
use log::{debug, info};
use socket2::TcpKeepalive;
use std::{future::Future, time::Duration};

pub(crate) type TcpStreamReader = tokio::io::ReadHalf<tokio::net::TcpStream>;
pub(crate) type TcpStreamWriter = tokio::io::WriteHalf<tokio::net::TcpStream>;
#[cfg(feature = "native-tls")]
pub(crate) type TcpTlsStreamReader =
    tokio::io::ReadHalf<tokio_native_tls::TlsStream<tokio::net::TcpStream>>;
#[cfg(feature = "native-tls")]
pub(crate) type TcpTlsStreamWriter =
    tokio::io::WriteHalf<tokio_native_tls::TlsStream<tokio::net::TcpStream>>;

pub(crate) async fn tcp_connect(
    host: &str,
    port: u16,
    config: &Config,
) -> Result<(TcpStreamReader, TcpStreamWriter)> {
    debug!(
        "Connecting to {host}:{port} with timeout {:?}...",
        config.connect_timeout
    );

    let stream = timeout(
        config.connect_timeout,
        tokio::net::TcpStream::connect((host, port)),
    )
    .await
    .map_err(|_| Error::Connect(format!("Connect timeout to {host}:{port}")))?
    .map_err(|e| Error::Connect(format!("{host}:{port}: {e}")))?;

    if let Some(keep_alive) = config.keep_alive {
        socket2::SockRef::from(&stream)
            .set_tcp_keepalive(&TcpKeepalive::new().with_time(keep_alive))?;
    }

    if config.no_delay {
        stream.set_nodelay(true)?;
    }

    let (reader, writer) = tokio::io::split(stream);

    info!("Connected to {host}:{port}");

    Ok((reader, writer))
}

#[cfg(feature = "native-tls")]
pub(crate) async fn tcp_tls_connect(
    host: &str,
    port: u16,
    tls_config: &TlsConfig,
    config: &Config,
) -> Result<(TcpTlsStreamReader, TcpTlsStreamWriter)> {
    debug!(
        "Connecting to {host}:{port} with timeout {:?}...",
        config.connect_timeout
    );

    let stream = timeout(
        config.connect_timeout,
        tokio::net::TcpStream::connect((host, port)),
    )
    .await
    .map_err(|_| Error::Connect(format!("Connect timeout to {host}:{port}")))?
    .map_err(|e| Error::Connect(format!("{host}:{port}: {e}")))?;

    if let Some(keep_alive) = config.keep_alive {
        socket2::SockRef::from(&stream)
            .set_tcp_keepalive(&TcpKeepalive::new().with_time(keep_alive))?;
    }

    if config.no_delay {
        stream.set_nodelay(true)?;
    }

    let builder = tls_config.into_tls_connector_builder();
    let tls_connector: native_tls::TlsConnector = builder
        .build()
        .map_err(|e| Error::Connect(e.to_string()))?;
    let tls_connector = tokio_native_tls::TlsConnector::from(tls_connector);
    let tls_stream = tls_connector
        .connect(host, stream)
        .await
        .map_err(|e| Error::Connect(e.to_string()))?;
    let (reader, writer) = tokio::io::split(tls_stream);

    info!("Connected to {host}:{port} (TLS)");

    Ok((reader, writer))
}

/// Await on a future for a maximum amount of time before returning an error.
pub(crate) async fn timeout<F: Future>(timeout: Duration, future: F) -> Result<F::Output> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| Error::Timeout("The I/O operation's timeout expired".to_owned()))
}
