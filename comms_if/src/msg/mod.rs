//! # Link messages
//!
//! Every message on the link is a single JSON object terminated by a newline. The object's
//! `type` field names the message kind, which fixes the remaining field names:
//!
//! - `"telemetry"` - [`Telemetry`], sent by the simulation once per control tick.
//! - `"command"` - [`CommandMsg`], sent back to the simulation in response to each telemetry.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod cmd;
mod tm;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

pub use cmd::{Command, CommandMsg};
pub use tm::Telemetry;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Delimiter terminating every message on the link.
pub const MSG_DELIMITER: u8 = b'\n';

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Any message which can be sent over the link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkMsg {
    Telemetry(Telemetry),
    Command(CommandMsg),
}

#[derive(Debug, thiserror::Error)]
pub enum MsgError {
    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the message: {0}")]
    DeserializeError(serde_json::Error),

    #[error("Message is well formed JSON but invalid: {0}")]
    Invalid(String),

    #[error("Expected a {expected} message but got a {found} message")]
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LinkMsg {
    /// Serialize the message to a single line, without the trailing delimiter.
    pub fn to_line(&self) -> Result<String, MsgError> {
        serde_json::to_string(self).map_err(MsgError::SerializationError)
    }

    /// Parse and validate a message from a single line.
    pub fn from_line(line: &str) -> Result<Self, MsgError> {
        let msg: LinkMsg = serde_json::from_str(line).map_err(MsgError::DeserializeError)?;

        if let LinkMsg::Telemetry(ref tm) = msg {
            tm.validate()?;
        }

        Ok(msg)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LinkMsg::Telemetry(_) => "telemetry",
            LinkMsg::Command(_) => "command",
        }
    }

    /// Unwrap a telemetry message.
    pub fn into_telemetry(self) -> Result<Telemetry, MsgError> {
        match self {
            LinkMsg::Telemetry(tm) => Ok(tm),
            m => Err(MsgError::UnexpectedKind {
                expected: "telemetry",
                found: m.kind(),
            }),
        }
    }

    /// Unwrap a command message.
    pub fn into_command(self) -> Result<CommandMsg, MsgError> {
        match self {
            LinkMsg::Command(cmd) => Ok(cmd),
            m => Err(MsgError::UnexpectedKind {
                expected: "command",
                found: m.kind(),
            }),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
