// src/io/mod.rs
//
// Device I/O for the nibble memory simulator: wire codec, control/status
// vectors, and the child-process session that carries transactions.

pub mod codec; // LineCodec trait and the nibble memory codec
mod error;
pub mod session; // Child process session
mod types;

pub use codec::{LineCodec, NibbleMemCodec, EXIT_COMMAND};
pub use error::IoError;
pub use session::{DeviceSession, SessionConfig};
pub use types::{ControlVector, StatusVector, ADDRESS_MASK, DATA_MASK, SWITCH_COUNT};

// ============================================================================
// Transport Trait
// ============================================================================

/// One request line out, one response line back.
///
/// Implementations carry exactly one transaction at a time and keep strict
/// request/response pairing. `DeviceSession` is the production transport;
/// tests drive the controller through scripted ones.
pub trait Transport {
    /// Send `request` (newline appended by the transport) and block for the
    /// matching response line, returned without its trailing whitespace.
    fn transact(&mut self, request: &str) -> Result<String, IoError>;

    /// Release the device. Idempotent and infallible.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}
