use hdmimatrix::{BlockingClient, Endpoint};

fn main() -> hdmimatrix::Result<()> {
    // Adjust the address to your environment.
    let mut matrix = BlockingClient::new(Endpoint::new("192.168.0.178", 4001));
    let mut session = matrix.session()?;

    println!("name:     {}", session.get_device_name()?);
    println!("type:     {}", session.get_device_type()?);
    println!("firmware: {}", session.get_device_version()?);

    let status = session.get_device_status_parsed()?;
    println!("{}", serde_json::to_string_pretty(&status).unwrap_or(status.raw));

    let inputs = session.get_input_status()?;
    for (port, state) in inputs.iter() {
        println!("input {port}: {state:?}");
    }

    Ok(())
}
