// src/io/codec.rs
//
// Line codec trait and the nibble memory ASCII protocol codec.
//
// Frame formats:
//   Request:  <DIN:1hex> <STORE:0|1> <NEXT:0|1> <PREV:0|1> <RST:0|1>
//   Response: <ADDR:hex> <DOUT:hex>
//   Shutdown: exit
//
// Examples:
//   `A 1 0 0 0` -> DIN=0xA, store asserted
//   `1F 7`      -> ADDR=0x1F, DOUT=0x7

use crate::io::error::IoError;
use crate::io::types::{ControlVector, StatusVector, DATA_MASK};

/// Line asking the device process to exit. No response follows.
pub const EXIT_COMMAND: &str = "exit";

/// Label used in protocol errors raised by the codec itself.
const CODEC_LABEL: &str = "nibble-mem";

/// Only the low 32 bits of a response token can affect a masked field.
const MAX_SIGNIFICANT_DIGITS: usize = 8;

// ============================================================================
// Line Codec Trait
// ============================================================================

/// Trait for line-oriented device codecs.
///
/// Encoding is total: every request value has a wire line. Decoding fails
/// with `IoError::Protocol` when a line does not match the response grammar.
pub trait LineCodec {
    /// Value sent on one transaction
    type Request;

    /// Value decoded from one response line
    type Response;

    /// Encode a request into a line (without the trailing newline).
    fn encode(request: &Self::Request) -> String;

    /// Decode a response line (trailing whitespace allowed).
    fn decode(line: &str) -> Result<Self::Response, IoError>;
}

// ============================================================================
// Nibble Memory Codec
// ============================================================================

/// Codec for the 64x4 nibble memory front panel protocol.
pub struct NibbleMemCodec;

impl LineCodec for NibbleMemCodec {
    type Request = ControlVector;
    type Response = StatusVector;

    fn encode(vector: &ControlVector) -> String {
        format!(
            "{:X} {} {} {} {}",
            vector.data_in & DATA_MASK,
            flag(vector.store),
            flag(vector.next),
            flag(vector.prev),
            flag(vector.reset)
        )
    }

    /// Decode `ADDR DOUT`.
    ///
    /// Both tokens are hex of any width and either case. Over-wide values are
    /// masked, never rejected.
    fn decode(line: &str) -> Result<StatusVector, IoError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(IoError::protocol(
                CODEC_LABEL,
                format!("expected 2 hex tokens, got {}: {:?}", tokens.len(), line),
            ));
        }

        let address = parse_hex_token(tokens[0])?;
        let data_out = parse_hex_token(tokens[1])?;

        Ok(StatusVector::from_raw(address, data_out))
    }
}

fn flag(asserted: bool) -> char {
    if asserted {
        '1'
    } else {
        '0'
    }
}

/// Parse a hex token, keeping only its low 32 bits.
fn parse_hex_token(token: &str) -> Result<u32, IoError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(IoError::protocol(
            CODEC_LABEL,
            format!("invalid hex token: {:?}", token),
        ));
    }

    // All ASCII at this point, so byte slicing is on char boundaries
    let low = &token[token.len().saturating_sub(MAX_SIGNIFICANT_DIGITS)..];
    u32::from_str_radix(low, 16)
        .map_err(|_| IoError::protocol(CODEC_LABEL, format!("invalid hex token: {:?}", token)))
}

// ============================================================================
// Tests
// ============================================================================
