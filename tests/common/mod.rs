#![allow(dead_code)]

use std::time::{Duration, Instant};

use hdmimatrix::{ClientBuilder, Endpoint, mock::MockScript};

pub const VIDEO_STATUS: &str = "Output 1 Switch To In 1!\r\n\
                                Output 2 Switch To In 3!\r\n\
                                Output 3 Switch To In 2!\r\n\
                                Output 4 Switch To In 4!\r\n";

pub const INPUT_STATUS: &str = "IN1 Connect!\r\nIN2 Disconnect!\r\nIN3 Disconnect!\r\nIN4 Connect!\r\n";

/// Builder tuned for a loopback fake device.
pub fn fast(endpoint: Endpoint) -> ClientBuilder {
    ClientBuilder::new(endpoint)
        .connect_timeout(Duration::from_secs(2))
        .banner_timeout(Duration::from_millis(200))
        .idle_timeout(Duration::from_millis(80))
        .response_timeout(Duration::from_millis(600))
}

/// A matrix that answers the usual queries.
pub fn device_script() -> MockScript {
    MockScript::new()
        .reply("/*Name.", "TMX44PRO\r\n")
        .reply("/*Type.", "  HDMI Matrix 4x4  \r\n")
        .reply("/^Version.", "V2.3.1\r\n")
        .reply("STA.", "Name: TMX44PRO\r\nPower ON\r\nOutput 1 ON\r\nOutput 2 OFF\r\n")
        .reply("STA_VIDEO.", VIDEO_STATUS)
        .reply("STA_IN.", INPUT_STATUS)
        .reply("STA_HDCP.", "HDCP IN1 ON\r\nHDCP IN2 OFF\r\n")
        .reply("PowerON.", "PWON\r\n")
        .reply("PowerOFF.", "PWOFF\r\n")
        .reply("@OUT02.", "OUT02 ON\r\n")
        .reply("$OUT02.", "OUT02 OFF\r\n")
}

/// Script acknowledging every valid route on a 4x4 matrix.
pub fn routing_script() -> MockScript {
    let mut script = device_script();
    for output in 1..=4u8 {
        for input in 1..=4u8 {
            script = script.reply(
                format!("OUT{output:02}:{input:02}."),
                format!("Output {output:02} Switch To In {input:02}!\r\n"),
            );
        }
    }
    script
}

/// Poll `cond` for up to two seconds.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
