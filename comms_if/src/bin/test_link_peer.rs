//! Scripted link peer
//!
//! Stands in for the simulation: listens on an address, and once the navigation core has
//! connected replays a script of telemetry messages, printing the command received in response
//! to each one.

use std::{fs, path::PathBuf, thread, time::Duration};

use comms_if::{
    msg::{LinkMsg, Telemetry},
    net::{LineSocket, LineSocketError, LineTransport, SocketOptions},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "test_link_peer", about = "Replay scripted telemetry to the navigation core")]
struct Opts {
    /// Address to listen on
    #[structopt(short, long, default_value = "127.0.0.1:8080")]
    address: String,

    /// File of telemetry messages, one JSON object per line. The `type` field may be omitted.
    #[structopt(parse(from_os_str))]
    script: PathBuf,

    /// Delay between telemetry messages in milliseconds
    #[structopt(short, long, default_value = "100")]
    period_ms: u64,

    /// Seconds to wait for the navigation core to connect
    #[structopt(long, default_value = "30")]
    wait_s: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::from_args();

    let script = fs::read_to_string(&opts.script)?;
    let mut telemetry = Vec::new();
    for (i, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tm: Telemetry = serde_json::from_str(line)
            .map_err(|e| format!("Line {} of the script is not telemetry: {}", i + 1, e))?;
        telemetry.push(tm);
    }
    println!("Loaded {} telemetry messages", telemetry.len());

    let socket_options = SocketOptions {
        bind: true,
        connect_timeout_ms: opts.wait_s * 1000,
        recv_timeout_ms: 1000,
        ..Default::default()
    };

    println!("Waiting for a connection on {}", opts.address);
    let mut socket = LineSocket::new(socket_options, &opts.address)?;

    for tm in telemetry {
        let tick = tm.tick;
        socket.send_line(&LinkMsg::Telemetry(tm).to_line()?)?;

        match socket.recv_line() {
            Ok(line) => match LinkMsg::from_line(&line).map(|m| m.into_command()) {
                Ok(Ok(cmd)) => println!(
                    "[{:>5}] {:<10} steer {:+.2}{}",
                    tick,
                    cmd.command,
                    cmd.steer,
                    match cmd.tick == tick {
                        true => "",
                        false => " (stale)",
                    }
                ),
                _ => println!("[{:>5}] unexpected message: {}", tick, line),
            },
            Err(LineSocketError::Timeout) => println!("[{:>5}] no response", tick),
            Err(LineSocketError::Closed) => {
                println!("Navigation core closed the connection");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        thread::sleep(Duration::from_millis(opts.period_ms));
    }

    Ok(())
}
