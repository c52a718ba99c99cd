//! # Link Client
//!
//! The LinkClient exchanges telemetry and commands with the simulation over a
//! [`LineTransport`], and owns the policy for a best-effort link:
//!
//! - Malformed messages are dropped. Only when more than `malformed_budget` arrive in a row is
//!   [`LinkError::Malformed`] returned, which the control loop treats as fatal.
//! - A receive which times out returns [`LinkError::Timeout`]. More than `timeout_budget`
//!   consecutive timeouts are treated as a lost connection.
//! - A lost connection is re-established with up to `retry_budget` attempts, with exponential
//!   backoff between them. If every attempt fails the link is permanently down and every call
//!   returns [`LinkError::Disconnected`].
//! - Each connection is an epoch. Telemetry whose tick is not newer than the last accepted tick
//!   of the epoch is stale and dropped, and a command is only sent if it answers the last
//!   accepted telemetry of the current epoch.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{thread, time::Duration};

use comms_if::{
    msg::{CommandMsg, LinkMsg, Telemetry},
    net::{LineSocket, LineSocketError, LineTransport, SocketOptions},
};
use log::{debug, error, info, warn};
use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct LinkClient<T: LineTransport> {
    transport: T,

    params: LinkParams,

    /// Number of connections made so far
    epoch: u64,

    /// Tick of the last telemetry accepted in this epoch
    last_tick: Option<u64>,

    num_consec_malformed: u32,

    num_consec_timeouts: u32,

    down: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkParams {
    /// Address of the simulation, e.g. `"127.0.0.1:8080"`.
    pub link_address: String,

    /// Maximum number of attempts made to (re)establish the connection.
    pub retry_budget: u32,

    /// Delay after the first failed attempt, doubled after each further failure.
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Number of consecutive malformed messages tolerated.
    #[serde(default = "default_malformed_budget")]
    pub malformed_budget: u32,

    /// Number of consecutive receive timeouts tolerated before reconnecting.
    #[serde(default = "default_timeout_budget")]
    pub timeout_budget: u32,

    #[serde(default)]
    pub socket: SocketOptions,
}

/// Exponential backoff between connection attempts.
struct Backoff {
    next_ms: u64,
    max_ms: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinkError {
    #[error("The link is down and the retry budget is exhausted")]
    Disconnected,

    #[error("Too many consecutive malformed messages, last: {0}")]
    Malformed(String),

    #[error("No telemetry was received before the timeout")]
    Timeout,
}

/// Result of sending a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,

    /// The command doesn't answer the latest telemetry of this connection and was discarded.
    Stale,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LinkClient<LineSocket> {
    /// Connect to the simulation over TCP, using the retry budget for the first connection too.
    pub fn connect(params: LinkParams) -> Result<Self, LinkError> {
        let mut backoff = Backoff::new(&params);
        let num_attempts = params.retry_budget.max(1);

        for attempt in 1..=num_attempts {
            match LineSocket::new(params.socket.clone(), &params.link_address) {
                Ok(socket) => {
                    info!("Link connected to {}", params.link_address);
                    return Ok(Self::new(socket, params));
                }
                Err(e) => {
                    warn!("Connection attempt {}/{} failed: {}", attempt, num_attempts, e);
                    if attempt < num_attempts {
                        backoff.wait();
                    }
                }
            }
        }

        error!("Could not connect to {}", params.link_address);
        Err(LinkError::Disconnected)
    }
}

impl<T: LineTransport> LinkClient<T> {
    /// Wrap an already connected transport.
    pub fn new(transport: T, params: LinkParams) -> Self {
        Self {
            transport,
            params,
            epoch: 1,
            last_tick: None,
            num_consec_malformed: 0,
            num_consec_timeouts: 0,
            down: false,
        }
    }

    /// Receive the next fresh telemetry message.
    pub fn receive(&mut self) -> Result<Telemetry, LinkError> {
        loop {
            if self.down {
                return Err(LinkError::Disconnected);
            }

            if !self.transport.connected() {
                self.reconnect()?;
            }

            let line = match self.transport.recv_line() {
                Ok(l) => l,
                Err(LineSocketError::Timeout) => {
                    self.num_consec_timeouts += 1;

                    if self.num_consec_timeouts > self.params.timeout_budget {
                        warn!(
                            "{} consecutive receive timeouts, reconnecting",
                            self.num_consec_timeouts
                        );
                        self.reconnect()?;
                    }

                    return Err(LinkError::Timeout);
                }
                Err(LineSocketError::Frame(e)) => {
                    self.malformed(e.to_string())?;
                    continue;
                }
                Err(e) => {
                    warn!("Link receive failed: {}", e);
                    self.reconnect()?;
                    continue;
                }
            };

            self.num_consec_timeouts = 0;

            let tm = match LinkMsg::from_line(&line).and_then(|m| m.into_telemetry()) {
                Ok(tm) => tm,
                Err(e) => {
                    self.malformed(e.to_string())?;
                    continue;
                }
            };

            self.num_consec_malformed = 0;

            if let Some(last) = self.last_tick {
                if tm.tick <= last {
                    debug!("Dropping stale telemetry for tick {} (last {})", tm.tick, last);
                    continue;
                }
            }

            self.last_tick = Some(tm.tick);
            return Ok(tm);
        }
    }

    /// Send a command answering the latest telemetry.
    pub fn send(&mut self, cmd: &CommandMsg) -> Result<Delivery, LinkError> {
        if self.down {
            return Err(LinkError::Disconnected);
        }

        if self.last_tick != Some(cmd.tick) {
            debug!(
                "Not sending {} for tick {}, latest telemetry is {:?}",
                cmd.command, cmd.tick, self.last_tick
            );
            return Ok(Delivery::Stale);
        }

        let line = LinkMsg::Command(cmd.clone())
            .to_line()
            .map_err(|e| LinkError::Malformed(e.to_string()))?;

        match self.transport.send_line(&line) {
            Ok(()) => Ok(Delivery::Sent),
            Err(LineSocketError::Timeout) => Err(LinkError::Timeout),
            Err(e) => {
                warn!("Link send failed: {}", e);
                // The command belonged to the old connection
                self.reconnect()?;
                Ok(Delivery::Stale)
            }
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    pub fn is_down(&self) -> bool {
        self.down
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn malformed(&mut self, reason: String) -> Result<(), LinkError> {
        self.num_consec_malformed += 1;
        warn!("Dropped malformed message: {}", reason);

        if self.num_consec_malformed > self.params.malformed_budget {
            self.num_consec_malformed = 0;
            return Err(LinkError::Malformed(reason));
        }

        Ok(())
    }

    /// Start a new epoch on a fresh connection.
    fn reconnect(&mut self) -> Result<(), LinkError> {
        if self.down {
            return Err(LinkError::Disconnected);
        }

        self.epoch += 1;
        self.last_tick = None;
        self.num_consec_malformed = 0;
        self.num_consec_timeouts = 0;

        let mut backoff = Backoff::new(&self.params);

        for attempt in 1..=self.params.retry_budget {
            match self.transport.reconnect() {
                Ok(()) => {
                    info!("Link reconnected, epoch {}", self.epoch);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Reconnect attempt {}/{} failed: {}",
                        attempt, self.params.retry_budget, e
                    );
                    if attempt < self.params.retry_budget {
                        backoff.wait();
                    }
                }
            }
        }

        error!(
            "Link retry budget of {} exhausted, link is down",
            self.params.retry_budget
        );
        self.down = true;

        Err(LinkError::Disconnected)
    }
}

impl Backoff {
    fn new(params: &LinkParams) -> Self {
        Self {
            next_ms: params.backoff_initial_ms,
            max_ms: params.backoff_max_ms.max(params.backoff_initial_ms),
        }
    }

    fn wait(&mut self) {
        thread::sleep(Duration::from_millis(self.next_ms));
        self.next_ms = (self.next_ms * 2).min(self.max_ms);
    }
}

fn default_backoff_initial_ms() -> u64 {
    100
}

fn default_backoff_max_ms() -> u64 {
    2000
}

fn default_malformed_budget() -> u32 {
    5
}

fn default_timeout_budget() -> u32 {
    10
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::msg::Command;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct MockTransport {
        incoming: VecDeque<Result<String, LineSocketError>>,
        sent: Vec<String>,
        disconnected: bool,
        /// Outcome of each reconnect attempt, success when empty
        reconnects: VecDeque<bool>,
        num_reconnects: usize,
    }

    impl LineTransport for MockTransport {
        fn send_line(&mut self, line: &str) -> Result<(), LineSocketError> {
            if self.disconnected {
                return Err(LineSocketError::NotConnected);
            }
            self.sent.push(line.to_string());
            Ok(())
        }

        fn recv_line(&mut self) -> Result<String, LineSocketError> {
            match self.incoming.pop_front() {
                Some(Err(LineSocketError::Closed)) => {
                    self.disconnected = true;
                    Err(LineSocketError::Closed)
                }
                Some(r) => r,
                None => Err(LineSocketError::Timeout),
            }
        }

        fn reconnect(&mut self) -> Result<(), LineSocketError> {
            self.num_reconnects += 1;
            match self.reconnects.pop_front().unwrap_or(true) {
                true => {
                    self.disconnected = false;
                    Ok(())
                }
                false => Err(LineSocketError::NotConnected),
            }
        }

        fn connected(&self) -> bool {
            !self.disconnected
        }
    }

    fn params() -> LinkParams {
        LinkParams {
            link_address: "127.0.0.1:0".into(),
            retry_budget: 3,
            backoff_initial_ms: 1,
            backoff_max_ms: 2,
            malformed_budget: 2,
            timeout_budget: 2,
            socket: SocketOptions::default(),
        }
    }

    fn tm_line(tick: u64) -> Result<String, LineSocketError> {
        Ok(format!(
            r#"{{"type":"telemetry","position":[0,0],"sensors":[0.0,1.0,0.0],"tick":{}}}"#,
            tick
        ))
    }

    fn client(incoming: Vec<Result<String, LineSocketError>>) -> LinkClient<MockTransport> {
        LinkClient::new(
            MockTransport {
                incoming: incoming.into(),
                ..Default::default()
            },
            params(),
        )
    }

    #[test]
    fn test_receive_drops_stale() {
        let mut lc = client(vec![tm_line(5), tm_line(5), tm_line(3), tm_line(6)]);

        assert_eq!(lc.receive().unwrap().tick, 5);
        assert_eq!(lc.receive().unwrap().tick, 6);
        assert_eq!(lc.receive(), Err(LinkError::Timeout));
    }

    #[test]
    fn test_malformed_budget() {
        let mut lc = client(vec![
            Ok("not json".into()),
            Ok(r#"{"type":"command","command":"stop","tick":1}"#.into()),
            tm_line(1),
            Ok("{".into()),
            Err(LineSocketError::Frame(comms_if::net::FrameError::TooLong(100))),
            Ok("}".into()),
            tm_line(2),
        ]);

        // Two malformed within budget are skipped
        assert_eq!(lc.receive().unwrap().tick, 1);

        // Third consecutive is surfaced, then the next valid message is returned
        assert!(matches!(lc.receive(), Err(LinkError::Malformed(_))));
        assert_eq!(lc.receive().unwrap().tick, 2);
    }

    #[test]
    fn test_timeouts_escalate_to_reconnect() {
        let mut lc = client(vec![tm_line(1)]);
        assert_eq!(lc.receive().unwrap().tick, 1);

        assert_eq!(lc.receive(), Err(LinkError::Timeout));
        assert_eq!(lc.receive(), Err(LinkError::Timeout));
        assert_eq!(lc.transport().num_reconnects, 0);

        assert_eq!(lc.receive(), Err(LinkError::Timeout));
        assert_eq!(lc.transport().num_reconnects, 1);
        assert_eq!(lc.epoch(), 2);
        assert_eq!(lc.last_tick(), None);
    }

    #[test]
    fn test_reconnect_starts_new_epoch() {
        let mut lc = client(vec![tm_line(10), Err(LineSocketError::Closed), tm_line(1)]);

        assert_eq!(lc.receive().unwrap().tick, 10);

        // Simulation restarted, tick 1 is accepted in the new epoch
        assert_eq!(lc.receive().unwrap().tick, 1);
        assert_eq!(lc.epoch(), 2);

        // A command for the old epoch's tick is never sent
        assert_eq!(
            lc.send(&CommandMsg::new(Command::Forward, 10)),
            Ok(Delivery::Stale)
        );
        assert_eq!(
            lc.send(&CommandMsg::new(Command::Forward, 1)),
            Ok(Delivery::Sent)
        );
        assert_eq!(lc.transport().sent.len(), 1);
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let mut lc = client(vec![tm_line(1), Err(LineSocketError::Closed)]);
        lc.transport.reconnects = vec![false, false, false].into();

        assert_eq!(lc.receive().unwrap().tick, 1);
        assert_eq!(lc.receive(), Err(LinkError::Disconnected));
        assert_eq!(lc.transport().num_reconnects, 3);
        assert!(lc.is_down());

        // Permanently down
        assert_eq!(lc.receive(), Err(LinkError::Disconnected));
        assert_eq!(
            lc.send(&CommandMsg::new(Command::Stop, 1)),
            Err(LinkError::Disconnected)
        );
        assert_eq!(lc.transport().num_reconnects, 3);
    }

    #[test]
    fn test_send_wire_format() {
        let mut lc = client(vec![tm_line(4)]);
        lc.receive().unwrap();

        let mut cmd = CommandMsg::new(Command::TurnLeft, 4);
        cmd.steer = -0.25;
        assert_eq!(lc.send(&cmd), Ok(Delivery::Sent));

        let sent = LinkMsg::from_line(&lc.transport().sent[0])
            .unwrap()
            .into_command()
            .unwrap();
        assert_eq!(sent, cmd);
    }
}
