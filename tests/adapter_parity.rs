//! Both client flavours must produce the same outcome for the same device.

mod common;

use hdmimatrix::{
    BlockingClient, Client, ErrorKind,
    mock::{MockScript, MockServer},
};

use common::{fast, routing_script};

#[derive(Debug, Clone, Copy)]
enum Op {
    Name,
    Type,
    Version,
    Status,
    Video,
    VideoParsed,
    InputsRaw,
    Inputs,
    Outputs,
    Hdcp,
    Downscaling,
    HdbtPower,
    PowerOn,
    PowerOff,
    Route(u8, u8),
    OutputOn(u8),
    OutputOff(u8),
}

const OPS: &[Op] = &[
    Op::Name,
    Op::Type,
    Op::Version,
    Op::Status,
    Op::Video,
    Op::VideoParsed,
    Op::InputsRaw,
    Op::Inputs,
    Op::Outputs,
    Op::Hdcp,
    Op::HdbtPower,
    Op::PowerOn,
    Op::PowerOff,
    Op::Route(1, 1),
    Op::Route(4, 2),
    Op::Route(5, 1),
    Op::Route(1, 0),
    Op::OutputOn(2),
    Op::OutputOn(3),
    Op::OutputOff(2),
    Op::OutputOff(9),
    // Times out, which ends the connection; keep it last.
    Op::Downscaling,
];

type Outcome = Result<String, ErrorKind>;

fn outcome<T: std::fmt::Debug>(result: hdmimatrix::Result<T>) -> Outcome {
    result.map(|v| format!("{v:?}")).map_err(|e| e.kind())
}

fn script() -> MockScript {
    routing_script()
        .silent("STA_DS.")
        .reply("STA_OUT.", "OUT1 Connect!\r\nOUT2 Connect!\r\n")
        .reply("STA_PHDBT.", "HDBT power: not supported\r\n")
}

fn run_blocking(client: &mut BlockingClient, op: Op) -> Outcome {
    match op {
        Op::Name => outcome(client.get_device_name()),
        Op::Type => outcome(client.get_device_type()),
        Op::Version => outcome(client.get_device_version()),
        Op::Status => outcome(client.get_device_status_parsed()),
        Op::Video => outcome(client.get_video_status()),
        Op::VideoParsed => outcome(client.get_video_status_parsed()),
        Op::InputsRaw => outcome(client.get_input_status_raw()),
        Op::Inputs => outcome(client.get_input_status()),
        Op::Outputs => outcome(client.get_output_status()),
        Op::Hdcp => outcome(client.get_hdcp_status()),
        Op::Downscaling => outcome(client.get_downscaling_status()),
        Op::HdbtPower => outcome(client.get_hdbt_power_status()),
        Op::PowerOn => outcome(client.power_on()),
        Op::PowerOff => outcome(client.power_off()),
        Op::Route(input, output) => outcome(client.route_input_to_output(input, output)),
        Op::OutputOn(output) => outcome(client.output_on(output)),
        Op::OutputOff(output) => outcome(client.output_off(output)),
    }
}

async fn run_async(client: &mut Client, op: Op) -> Outcome {
    match op {
        Op::Name => outcome(client.get_device_name().await),
        Op::Type => outcome(client.get_device_type().await),
        Op::Version => outcome(client.get_device_version().await),
        Op::Status => outcome(client.get_device_status_parsed().await),
        Op::Video => outcome(client.get_video_status().await),
        Op::VideoParsed => outcome(client.get_video_status_parsed().await),
        Op::InputsRaw => outcome(client.get_input_status_raw().await),
        Op::Inputs => outcome(client.get_input_status().await),
        Op::Outputs => outcome(client.get_output_status().await),
        Op::Hdcp => outcome(client.get_hdcp_status().await),
        Op::Downscaling => outcome(client.get_downscaling_status().await),
        Op::HdbtPower => outcome(client.get_hdbt_power_status().await),
        Op::PowerOn => outcome(client.power_on().await),
        Op::PowerOff => outcome(client.power_off().await),
        Op::Route(input, output) => outcome(client.route_input_to_output(input, output).await),
        Op::OutputOn(output) => outcome(client.output_on(output).await),
        Op::OutputOff(output) => outcome(client.output_off(output).await),
    }
}

#[test]
fn adapters_agree_on_every_operation() -> hdmimatrix::Result<()> {
    let blocking_server = MockServer::start(script())?;
    let mut blocking = fast(blocking_server.endpoint()).connect_blocking()?;
    let blocking_outcomes: Vec<Outcome> =
        OPS.iter().map(|op| run_blocking(&mut blocking, *op)).collect();
    assert!(!blocking.is_connected());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let async_server = MockServer::start(script())?;
    let async_outcomes: Vec<Outcome> = rt.block_on(async {
        let mut client = fast(async_server.endpoint()).connect().await?;
        let mut outcomes = Vec::new();
        for op in OPS {
            outcomes.push(run_async(&mut client, *op).await);
        }
        assert!(!client.is_connected());
        Ok::<_, hdmimatrix::Error>(outcomes)
    })?;

    for ((op, b), a) in OPS.iter().zip(&blocking_outcomes).zip(&async_outcomes) {
        assert_eq!(b, a, "adapters disagree on {op:?}");
    }

    // Spot-check that the list exercises every outcome class.
    assert!(blocking_outcomes.iter().any(Result::is_ok));
    for kind in [
        ErrorKind::Validation,
        ErrorKind::CommandRejected,
        ErrorKind::Timeout,
        ErrorKind::Parse,
    ] {
        assert!(
            blocking_outcomes.contains(&Err(kind)),
            "no operation produced {kind:?}"
        );
    }

    assert_eq!(blocking_server.received(), async_server.received());

    blocking_server.shutdown();
    async_server.shutdown();
    Ok(())
}

#[test]
fn adapters_agree_on_connect_timeout() -> hdmimatrix::Result<()> {
    let server = MockServer::start(script())?;
    let builder = fast(server.endpoint()).connect_timeout(std::time::Duration::ZERO);

    let blocking = builder.clone().connect_blocking().map(|_| ()).map_err(|e| e.kind());
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let tokio = rt
        .block_on(builder.connect())
        .map(|_| ())
        .map_err(|e| e.kind());

    assert_eq!(blocking, Err(ErrorKind::Connection));
    assert_eq!(tokio, blocking);

    server.shutdown();
    Ok(())
}
