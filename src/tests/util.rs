use crate::resp::{Value, ValueDecoder};
use futures_util::StreamExt;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};
use tokio_util::codec::FramedRead;

pub(crate) fn log_try_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scripted reply of the [`MockServer`]
pub(crate) enum MockReply {
    Ok,
    Pong,
    Error(&'static str),
    /// Drop the connection without replying
    Close,
}

/// An in-process Redis stand-in: accepts any number of connections,
/// decodes inbound commands with the crate's own [`ValueDecoder`], records
/// them, and answers according to the handler.
pub(crate) struct MockServer {
    port: u16,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockServer {
    /// `+PONG` to `PING`, `+OK` to everything else.
    pub async fn spawn() -> Self {
        Self::spawn_with(|argv: &[String]| {
            if argv.first().is_some_and(|name| name.eq_ignore_ascii_case("PING")) {
                MockReply::Pong
            } else {
                MockReply::Ok
            }
        })
        .await
    }

    pub async fn spawn_with(
        handler: impl Fn(&[String]) -> MockReply + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        {
            let commands = commands.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(serve_connection(
                        stream,
                        commands.clone(),
                        handler.clone(),
                    ));
                }
            });
        }

        Self { port, commands }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub fn uri(&self, query: &str) -> String {
        format!("redis://127.0.0.1:{}?{query}", self.port)
    }

    /// Every argv received so far, across all connections, in arrival order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().unwrap().clone()
    }

    /// The received command names, handshake traffic included.
    pub fn command_names(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter_map(|argv| argv.first().cloned())
            .collect()
    }
}

async fn serve_connection(
    stream: TcpStream,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
    handler: Arc<dyn Fn(&[String]) -> MockReply + Send + Sync>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut framed_read = FramedRead::new(reader, ValueDecoder);

    while let Some(Ok(value)) = framed_read.next().await {
        let Value::Array(Some(items)) = value else {
            continue;
        };
        let argv = items
            .iter()
            .filter_map(|item| match item {
                Value::BulkString(Some(bytes)) => {
                    Some(String::from_utf8_lossy(bytes).into_owned())
                }
                _ => None,
            })
            .collect::<Vec<_>>();

        commands.lock().unwrap().push(argv.clone());

        let reply: &[u8] = match handler(&argv) {
            MockReply::Ok => b"+OK\r\n",
            MockReply::Pong => b"+PONG\r\n",
            MockReply::Error(e) => {
                let bytes = format!("-{e}\r\n").into_bytes();
                if writer.write_all(&bytes).await.is_err() {
                    return;
                }
                continue;
            }
            MockReply::Close => return,
        };

        if writer.write_all(reply).await.is_err() {
            return;
        }
    }
}

/// Counts how many times a given command name arrived; `Fn` handlers get
/// interior mutability through this.
pub(crate) struct CommandCounter {
    name: &'static str,
    count: AtomicUsize,
}

impl CommandCounter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            count: AtomicUsize::new(0),
        }
    }

    /// Returns the 1-based occurrence index when `argv` matches, `0`
    /// otherwise.
    pub fn observe(&self, argv: &[String]) -> usize {
        if argv.first().is_some_and(|n| n.eq_ignore_ascii_case(self.name)) {
            self.count.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            0
        }
    }
}
