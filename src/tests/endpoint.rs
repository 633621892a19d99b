use crate::{
    Endpoint, Error, IntoConfig, RedisErrorKind, Result, ServerConfig,
    metrics::{CounterSink, MetricsSink, endpoint_label},
    resp::{Value, cmd},
    tests::{MockReply, MockServer, log_try_init},
};
use serial_test::serial;
use std::sync::Arc;

async fn open_endpoint(
    server: &MockServer,
    query: &str,
    metrics: Option<Arc<dyn MetricsSink>>,
) -> Result<Endpoint> {
    let config = server.uri(query).into_config()?;
    let ServerConfig::Standalone { host, port } = config.server.clone() else {
        panic!("expected standalone config");
    };
    Endpoint::open(&host, port, 0, metrics, &config).await
}

#[tokio::test]
async fn open_handshake() -> Result<()> {
    log_try_init();

    let server = MockServer::spawn().await;
    let endpoint = open_endpoint(&server, "", None).await?;

    assert_eq!(0, endpoint.db());
    assert_eq!(0, endpoint.inflight());
    assert_eq!(
        vec![vec!["PING".to_owned()], vec!["SELECT".to_owned(), "0".to_owned()]],
        server.commands()
    );

    Ok(())
}

#[tokio::test]
async fn open_authenticates_with_credentials() -> Result<()> {
    log_try_init();

    let server = MockServer::spawn().await;
    open_endpoint(&server, "auth_user=app&auth_password=secret", None).await?;

    assert_eq!(
        vec!["AUTH".to_owned(), "app".to_owned(), "secret".to_owned()],
        server.commands()[0]
    );

    Ok(())
}

#[tokio::test]
async fn auth_error_is_fatal() {
    log_try_init();

    let server = MockServer::spawn_with(|argv: &[String]| {
        if argv[0].eq_ignore_ascii_case("AUTH") {
            MockReply::Error("WRONGPASS invalid username-password pair")
        } else {
            MockReply::Ok
        }
    })
    .await;

    let result = open_endpoint(&server, "auth_password=wrong", None).await;
    assert!(matches!(result, Err(Error::Auth(_))));
}

#[tokio::test]
async fn pipe_budget_one_degenerates_to_send_then_wait() -> Result<()> {
    log_try_init();

    let server = MockServer::spawn().await;
    let mut endpoint = open_endpoint(&server, "migrate_batch_size=1", None).await?;

    endpoint.batch(true, &cmd("SET").arg("k").arg("v")).await?;
    // the budget forced an immediate drain
    assert_eq!(0, endpoint.inflight());

    Ok(())
}

#[tokio::test]
async fn disabled_budget_drains_only_on_flush() -> Result<()> {
    log_try_init();

    let server = MockServer::spawn().await;
    let sink = Arc::new(CounterSink::new());
    let mut endpoint =
        open_endpoint(&server, "migrate_batch_size=-1", Some(sink.clone())).await?;

    endpoint.batch(false, &cmd("SET").arg("a").arg("1")).await?;
    endpoint.batch(false, &cmd("SET").arg("b").arg("2")).await?;
    endpoint.batch(false, &cmd("SET").arg("c").arg("3")).await?;
    assert_eq!(3, endpoint.inflight());

    let errors = endpoint.flush().await?;
    assert!(errors.is_empty());
    assert_eq!(0, endpoint.inflight());

    let counters = sink.snapshot(&endpoint_label("127.0.0.1", server.port()));
    // 3 batched + the 2 handshake commands
    assert_eq!(5, counters.success);
    assert_eq!(0, counters.failure);

    Ok(())
}

#[tokio::test]
async fn send_drains_pending_batch_first() -> Result<()> {
    log_try_init();

    let server = MockServer::spawn().await;
    let mut endpoint = open_endpoint(&server, "migrate_batch_size=-1", None).await?;

    endpoint.batch(false, &cmd("SET").arg("a").arg("1")).await?;
    endpoint.batch(false, &cmd("SET").arg("b").arg("2")).await?;

    // the batched +OK replies must not interleave with the PING reply
    let value = endpoint.send(&cmd("PING")).await?;
    assert_eq!(Value::SimpleString("PONG".to_owned()), value);
    assert_eq!(0, endpoint.inflight());

    Ok(())
}

#[tokio::test]
async fn sync_returns_replies_in_submission_order() -> Result<()> {
    log_try_init();

    let server = MockServer::spawn_with(|argv: &[String]| {
        if argv[0] == "FAILME" {
            MockReply::Error("ERR scripted failure")
        } else {
            MockReply::Ok
        }
    })
    .await;
    let mut endpoint = open_endpoint(&server, "migrate_batch_size=-1", None).await?;

    endpoint.batch(false, &cmd("SET").arg("a").arg("1")).await?;
    endpoint.batch(false, &cmd("FAILME")).await?;
    endpoint.batch(false, &cmd("SET").arg("b").arg("2")).await?;

    let replies = endpoint.sync().await?;
    assert_eq!(3, replies.len());
    assert_eq!(Value::SimpleString("OK".to_owned()), replies[0]);
    assert!(replies[1].is_error());
    assert_eq!(Value::SimpleString("OK".to_owned()), replies[2]);

    Ok(())
}

#[tokio::test]
async fn flush_classifies_and_returns_error_replies() -> Result<()> {
    log_try_init();

    let server = MockServer::spawn_with(|argv: &[String]| {
        if argv[0].eq_ignore_ascii_case("RESTORE") {
            MockReply::Error("BUSYKEY Target key name already exists.")
        } else {
            MockReply::Ok
        }
    })
    .await;
    let sink = Arc::new(CounterSink::new());
    let mut endpoint =
        open_endpoint(&server, "migrate_batch_size=-1", Some(sink.clone())).await?;

    endpoint
        .batch(false, &cmd("RESTORE").arg("k").arg(0).arg("payload"))
        .await?;
    endpoint.batch(false, &cmd("SET").arg("a").arg("1")).await?;

    let errors = endpoint.flush().await?;
    assert_eq!(1, errors.len());
    assert_eq!(RedisErrorKind::BusyKey, errors[0].kind);

    let counters = sink.snapshot(&endpoint_label("127.0.0.1", server.port()));
    assert_eq!(1, counters.failure);
    assert_eq!(Some(&1), counters.failure_reasons.get("respond"));

    Ok(())
}

#[tokio::test]
#[serial]
async fn reopen_rebuilds_the_connection() -> Result<()> {
    log_try_init();

    let server = MockServer::spawn_with(|argv: &[String]| {
        if argv[0] == "DIE" {
            MockReply::Close
        } else {
            MockReply::Ok
        }
    })
    .await;
    let sink = Arc::new(CounterSink::new());
    let mut endpoint =
        open_endpoint(&server, "migrate_batch_size=1", Some(sink.clone())).await?;

    let result = endpoint.batch(true, &cmd("DIE")).await;
    assert!(matches!(result, Err(Error::IO(_))));

    endpoint.reopen().await?;
    assert_eq!(0, endpoint.db()); // the previous database was re-selected
    endpoint.batch(true, &cmd("SET").arg("a").arg("1")).await?;

    let counters = sink.snapshot(&endpoint_label("127.0.0.1", server.port()));
    assert_eq!(1, counters.reconnect);

    Ok(())
}
