use std::{env, process};

use hdmimatrix::{Client, Endpoint};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: route_input [INPUT] [OUTPUT]";

fn port_arg(arg: Option<String>, name: &str) -> u8 {
    let Some(arg) = arg else {
        return 1;
    };
    match arg.parse::<u8>() {
        Ok(port) => port,
        Err(e) => {
            eprintln!("invalid {name} port {arg:?}: {e}\n{USAGE}");
            process::exit(2);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> hdmimatrix::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let input = port_arg(args.next(), "input");
    let output = port_arg(args.next(), "output");

    // Adjust the address to your environment.
    let mut matrix = Client::builder(Endpoint::new("192.168.0.178", 4001))
        .connect()
        .await?;

    let ack = matrix.route_input_to_output(input, output).await?;
    println!("{ack}");

    for (output, input) in matrix.get_video_status_parsed().await?.iter() {
        println!("output {output} <- input {input}");
    }

    matrix.disconnect().await;
    Ok(())
}
