use hdmimatrix::{Client, Endpoint};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> hdmimatrix::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Adjust the address to your environment.
    let mut matrix = Client::new(Endpoint::new("192.168.0.178", 4001));

    let name = matrix
        .with_connection(async |m: &mut Client| {
            m.power_on().await?;
            m.get_device_name().await
        })
        .await?;
    println!("{name} powered on");

    Ok(())
}
