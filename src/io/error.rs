// src/io/error.rs
//
// Error type shared by the codec, the device session and the panel controller.
// Constructed through the helper functions so every message carries the
// device label it came from.

use std::fmt;

use crate::io::types::SWITCH_COUNT;

/// Errors raised while talking to the memory device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IoError {
    /// A response line could not be parsed.
    Protocol { device: String, message: String },
    /// The device output stream produced no data (closed or exited).
    SessionClosed { device: String },
    /// The device executable could not be launched.
    Spawn { device: String, message: String },
    /// Writing the request line failed.
    Write { device: String, message: String },
    /// Reading the response line failed.
    Read { device: String, message: String },
    /// No response within the configured bounded wait.
    Timeout { device: String, timeout_ms: u64 },
    /// Invalid settings or arguments.
    Configuration { message: String },
    /// A DIN switch index outside 0..SWITCH_COUNT.
    InvalidSwitch { index: usize },
}

impl IoError {
    pub fn protocol(device: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Protocol {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn session_closed(device: impl Into<String>) -> Self {
        IoError::SessionClosed {
            device: device.into(),
        }
    }

    pub fn spawn(device: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Spawn {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn write(device: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Write {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn read(device: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Read {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn timeout(device: impl Into<String>, timeout_ms: u64) -> Self {
        IoError::Timeout {
            device: device.into(),
            timeout_ms,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        IoError::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_switch(index: usize) -> Self {
        IoError::InvalidSwitch { index }
    }

    /// True when the error means the device gave no usable response stream.
    /// The controller treats all of these like a closed session.
    pub fn is_session_closed(&self) -> bool {
        matches!(
            self,
            IoError::SessionClosed { .. }
                | IoError::Write { .. }
                | IoError::Read { .. }
                | IoError::Timeout { .. }
        )
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Protocol { device, message } => {
                write!(f, "{}: protocol error: {}", device, message)
            }
            IoError::SessionClosed { device } => write!(f, "{}: session closed", device),
            IoError::Spawn { device, message } => {
                write!(f, "{}: failed to launch device: {}", device, message)
            }
            IoError::Write { device, message } => write!(f, "{}: write error: {}", device, message),
            IoError::Read { device, message } => write!(f, "{}: read error: {}", device, message),
            IoError::Timeout { device, timeout_ms } => {
                write!(f, "{}: no response within {} ms", device, timeout_ms)
            }
            IoError::Configuration { message } => write!(f, "configuration error: {}", message),
            IoError::InvalidSwitch { index } => write!(
                f,
                "switch index {} out of range (0-{})",
                index,
                SWITCH_COUNT - 1
            ),
        }
    }
}

impl std::error::Error for IoError {}

impl From<IoError> for String {
    fn from(e: IoError) -> Self {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_device() {
        let e = IoError::protocol("sim(../sim/sim)", "expected 2 tokens, got 1");
        assert_eq!(
            e.to_string(),
            "sim(../sim/sim): protocol error: expected 2 tokens, got 1"
        );
    }

    #[test]
    fn test_session_closed_classification() {
        assert!(IoError::session_closed("d").is_session_closed());
        assert!(IoError::read("d", "broken pipe").is_session_closed());
        assert!(IoError::write("d", "broken pipe").is_session_closed());
        assert!(IoError::timeout("d", 50).is_session_closed());
        assert!(!IoError::protocol("d", "garbage").is_session_closed());
        assert!(!IoError::spawn("d", "not found").is_session_closed());
        assert!(!IoError::configuration("empty path").is_session_closed());
        assert!(!IoError::invalid_switch(4).is_session_closed());
    }

    #[test]
    fn test_invalid_switch_message() {
        assert_eq!(
            IoError::invalid_switch(7).to_string(),
            "switch index 7 out of range (0-3)"
        );
    }

    #[test]
    fn test_into_string() {
        let s: String = IoError::timeout("sim", 250).into();
        assert_eq!(s, "sim: no response within 250 ms");
    }
}
