mod common;

use std::{
    panic::AssertUnwindSafe,
    time::{Duration, Instant},
};

use hdmimatrix::{
    Client, ClientBuilder, Endpoint, ErrorKind, PortState, RoutingMap,
    mock::{MockScript, MockServer},
};

use common::{device_script, fast, routing_script, wait_until};

#[tokio::test]
async fn info_getters_return_trimmed_replies() -> hdmimatrix::Result<()> {
    let server = MockServer::start(device_script())?;
    let mut client = fast(server.endpoint()).connect().await?;

    assert_eq!(client.get_device_name().await?, "TMX44PRO");
    assert_eq!(client.get_device_type().await?, "HDMI Matrix 4x4");
    assert_eq!(client.get_device_version().await?, "V2.3.1");
    assert!(client.get_device_status().await?.starts_with("Name: TMX44PRO"));

    assert_eq!(
        server.received(),
        vec!["/*Name.", "/*Type.", "/^Version.", "STA."]
    );

    client.disconnect().await;
    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn route_sends_exact_command_for_every_valid_pair() -> hdmimatrix::Result<()> {
    let server = MockServer::start(routing_script())?;
    let mut client = fast(server.endpoint()).connect().await?;

    let mut expected = Vec::new();
    for input in 1..=client.input_count() {
        for output in 1..=client.output_count() {
            let ack = client.route_input_to_output(input, output).await?;
            assert_eq!(ack, format!("Output {output:02} Switch To In {input:02}!"));
            expected.push(format!("OUT{output:02}:{input:02}."));
        }
    }
    assert_eq!(server.received(), expected);

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn out_of_range_ports_fail_without_sending() -> hdmimatrix::Result<()> {
    let server = MockServer::start(routing_script())?;
    let mut client = fast(server.endpoint()).connect().await?;

    for (input, output) in [(0, 1), (5, 1), (1, 0), (1, 5), (200, 200)] {
        let err = client
            .route_input_to_output(input, output)
            .await
            .expect_err("must be rejected locally");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert_eq!(client.output_on(9).await.unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(client.output_off(0).await.unwrap_err().kind(), ErrorKind::Validation);

    assert!(server.received().is_empty());
    assert!(client.is_connected());

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn video_status_parsed_skips_malformed_lines() -> hdmimatrix::Result<()> {
    let script = MockScript::new().reply(
        "STA_VIDEO.",
        "Output 01 switch to Input 03\r\n???\r\nOutput 02 switch to Input 03\r\n",
    );
    let server = MockServer::start(script)?;
    let mut client = fast(server.endpoint()).connect().await?;

    let routing = client.get_video_status_parsed().await?;
    assert_eq!(routing, RoutingMap::from_iter([(1, 3), (2, 3)]));

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn commands_while_disconnected_fail_without_io() -> hdmimatrix::Result<()> {
    let server = MockServer::start(device_script())?;
    let mut client = fast(server.endpoint()).build();

    let err = client.get_device_name().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(matches!(err, hdmimatrix::Error::NotConnected));
    assert_eq!(client.power_on().await.unwrap_err().kind(), ErrorKind::Connection);
    assert_eq!(server.connections(), 0);

    client.connect().await?;
    client.disconnect().await;
    client.disconnect().await;
    assert_eq!(
        client.get_video_status().await.unwrap_err().kind(),
        ErrorKind::Connection
    );
    assert!(server.received().is_empty());

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn rejection_and_parse_errors_keep_the_connection() -> hdmimatrix::Result<()> {
    let script = MockScript::new()
        .reply("PowerON.", "Command code error!\r\n")
        .reply("STA_VIDEO.", "nothing to see\r\n")
        .reply("STA_IN.", "IN1 maybe\r\n");
    let server = MockServer::start(script)?;
    let mut client = fast(server.endpoint()).connect().await?;

    let err = client.power_on().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommandRejected);

    let err = client.get_video_status_parsed().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);

    let err = client.get_input_status().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(client.get_input_status_raw().await?, "IN1 maybe");

    assert!(client.is_connected());
    assert_eq!(server.connections(), 1);

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn reply_timeout_drops_the_connection() -> hdmimatrix::Result<()> {
    let server = MockServer::start(device_script().silent("PowerOFF."))?;
    let mut client = fast(server.endpoint()).connect().await?;

    let err = client.power_off().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(!client.is_connected());
    assert!(matches!(
        client.get_device_name().await,
        Err(hdmimatrix::Error::NotConnected)
    ));

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn late_reply_never_answers_the_next_command() -> hdmimatrix::Result<()> {
    // PWOFF arrives after the 600 ms response timeout has expired.
    let script = device_script().reply_chunks(
        "PowerOFF.",
        ["", "PWOFF\r\n"],
        Duration::from_millis(700),
    );
    let server = MockServer::start(script)?;
    let mut client = fast(server.endpoint()).connect().await?;

    let err = client.power_off().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(wait_until(|| server.closed_connections() == 1));

    client.connect().await?;
    assert_eq!(client.get_device_name().await?, "TMX44PRO");
    assert_eq!(server.received(), vec!["PowerOFF.", "/*Name."]);

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn route_rejects_contradicting_echo() -> hdmimatrix::Result<()> {
    let script = MockScript::new().reply("OUT01:03.", "Output 01 Switch To In 02!\r\n");
    let server = MockServer::start(script)?;
    let mut client = fast(server.endpoint()).connect().await?;

    let err = client.route_input_to_output(3, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommandRejected);

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn with_connection_disconnects_on_error() -> hdmimatrix::Result<()> {
    let server = MockServer::start(device_script())?;
    let mut client = fast(server.endpoint()).build();

    let result = client
        .with_connection(async |c: &mut Client| {
            c.power_on().await?;
            c.route_input_to_output(1, 7).await
        })
        .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    assert!(!client.is_connected());
    assert!(wait_until(|| server.closed_connections() == 1));
    assert_eq!(server.received(), vec!["PowerON."]);

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn session_guard_disconnects_when_dropped_early() -> hdmimatrix::Result<()> {
    let server = MockServer::start(device_script().reply("STA_DS.", "junk\r\n"))?;
    let mut client = fast(server.endpoint()).build();

    async fn run(client: &mut Client) -> hdmimatrix::Result<()> {
        let mut session = client.session().await?;
        session.get_device_name().await?;
        session.get_downscaling_status().await?;
        session.close().await;
        Ok(())
    }

    let err = run(&mut client).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(!client.is_connected());
    assert!(wait_until(|| server.closed_connections() == 1));

    // The client is reusable after the scope ends.
    let mut session = client.session().await?;
    assert_eq!(session.get_device_version().await?, "V2.3.1");
    session.close().await;
    assert!(!client.is_connected());
    assert_eq!(server.connections(), 2);

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn peer_close_drops_the_connection() -> hdmimatrix::Result<()> {
    let server = MockServer::start(device_script().close_on("STA_OUT."))?;
    let mut client = fast(server.endpoint()).connect().await?;

    let err = client.get_output_status().await.unwrap_err();
    assert!(matches!(err, hdmimatrix::Error::Disconnected));
    assert!(!client.is_connected());

    client.connect().await?;
    assert_eq!(client.get_device_name().await?, "TMX44PRO");

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn chunked_reply_is_assembled_until_idle() -> hdmimatrix::Result<()> {
    let script = MockScript::new().reply_chunks(
        "STA_VIDEO.",
        ["Output 1 Switch", " To In 2!\r\nOutput 2 Sw", "itch To In 4!\r\n"],
        Duration::from_millis(20),
    );
    let server = MockServer::start(script)?;
    let mut client = fast(server.endpoint()).connect().await?;

    let routing = client.get_video_status_parsed().await?;
    assert_eq!(routing.input_for(1), Some(2));
    assert_eq!(routing.input_for(2), Some(4));

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn terminator_ends_reply_before_idle_period() -> hdmimatrix::Result<()> {
    let server = MockServer::start(device_script())?;
    let mut client = ClientBuilder::new(server.endpoint())
        .banner_timeout(Duration::from_millis(200))
        .idle_timeout(Duration::from_secs(2))
        .response_timeout(Duration::from_secs(4))
        .terminator("!")
        .connect()
        .await?;

    let started = Instant::now();
    let status = client.get_input_status_raw().await?;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(status.starts_with("IN1 Connect!"));

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn per_port_status_is_parsed() -> hdmimatrix::Result<()> {
    let server = MockServer::start(device_script())?;
    let mut client = fast(server.endpoint()).connect().await?;

    let inputs = client.get_input_status().await?;
    assert_eq!(inputs.get(1), Some(PortState::On));
    assert_eq!(inputs.get(2), Some(PortState::Off));
    assert_eq!(inputs.len(), 4);

    let hdcp = client.get_hdcp_status().await?;
    assert!(hdcp.is_on(1));
    assert!(!hdcp.is_on(2));

    let status = client.get_device_status_parsed().await?;
    assert_eq!(status.name.as_deref(), Some("TMX44PRO"));
    assert_eq!(status.power, Some(PortState::On));
    assert_eq!(status.outputs.get(2), Some(PortState::Off));

    assert_eq!(client.output_on(2).await?, "OUT02 ON");
    assert_eq!(client.output_off(2).await?, "OUT02 OFF");

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn connect_failure_is_a_connection_error() {
    // Bind then drop to find a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("ephemeral port");

    let mut client = Client::builder(Endpoint::new("127.0.0.1", port))
        .connect_timeout(Duration::from_secs(1))
        .build();
    let err = client.connect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn connect_timeout_is_a_connection_error() -> hdmimatrix::Result<()> {
    let server = MockServer::start(device_script())?;
    let mut client = fast(server.endpoint())
        .connect_timeout(Duration::ZERO)
        .build();

    match client.connect().await {
        Err(err @ hdmimatrix::Error::Connect { .. }) => {
            assert_eq!(err.kind(), ErrorKind::Connection);
            let source = std::error::Error::source(&err)
                .and_then(|s| s.downcast_ref::<std::io::Error>())
                .map(std::io::Error::kind);
            assert_eq!(source, Some(std::io::ErrorKind::TimedOut));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!client.is_connected());
    assert_eq!(server.connections(), 0);

    server.shutdown();
    Ok(())
}

#[test]
fn panic_inside_a_connected_scope_still_disconnects() -> hdmimatrix::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let server = MockServer::start(device_script())?;
    let mut client = fast(server.endpoint()).build();

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        rt.block_on(client.with_connection(async |c: &mut Client| {
            c.get_device_name().await?;
            if c.is_connected() {
                panic!("operator code blew up");
            }
            Ok(())
        }))
    }));
    assert!(outcome.is_err());
    assert!(!client.is_connected());
    assert!(wait_until(|| server.closed_connections() == 1));

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        rt.block_on(async {
            let mut session = client.session().await?;
            session.get_device_version().await?;
            if session.is_connected() {
                panic!("operator code blew up");
            }
            Ok::<(), hdmimatrix::Error>(())
        })
    }));
    assert!(outcome.is_err());
    assert!(!client.is_connected());
    assert!(wait_until(|| server.closed_connections() == 2));
    assert_eq!(server.received(), vec!["/*Name.", "/^Version."]);

    server.shutdown();
    Ok(())
}
