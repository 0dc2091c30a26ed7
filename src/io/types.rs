// src/io/types.rs
//
// Control and status vectors exchanged with the nibble memory device.

// ============================================================================
// Bit Widths
// ============================================================================

/// DIN / DOUT are one nibble wide
pub const DATA_MASK: u8 = 0x0F;

/// 64 locations -> 6 address bits
pub const ADDRESS_MASK: u8 = 0x3F;

/// Number of DIN switches on the panel
pub const SWITCH_COUNT: usize = 4;

// ============================================================================
// Control Vector
// ============================================================================

/// Inputs presented to the device on one transaction.
///
/// The flags are independent control lines, not an exclusive enum. The device
/// defines what happens when several are asserted at once; the controller
/// never does that.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlVector {
    /// DIN (masked to 4 bits on encode)
    pub data_in: u8,
    /// Write DIN at the current address, then advance
    pub store: bool,
    /// Advance address
    pub next: bool,
    /// Retreat address
    pub prev: bool,
    /// Force address to its initial value
    pub reset: bool,
}

impl ControlVector {
    /// Data only, all control lines released.
    pub fn idle(data_in: u8) -> Self {
        Self {
            data_in,
            ..Self::default()
        }
    }

    pub fn store(data_in: u8) -> Self {
        Self {
            data_in,
            store: true,
            ..Self::default()
        }
    }

    pub fn next(data_in: u8) -> Self {
        Self {
            data_in,
            next: true,
            ..Self::default()
        }
    }

    pub fn prev(data_in: u8) -> Self {
        Self {
            data_in,
            prev: true,
            ..Self::default()
        }
    }

    /// Reset line asserted; DIN cleared.
    pub fn reset_asserted() -> Self {
        Self {
            reset: true,
            ..Self::default()
        }
    }

    /// Reset line released; DIN cleared.
    pub fn reset_released() -> Self {
        Self::default()
    }
}

// ============================================================================
// Status Vector
// ============================================================================

/// Outputs returned by one transaction. Always masked to bit width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusVector {
    /// ADDR, 0..=63
    pub address: u8,
    /// DOUT, 0..=15
    pub data_out: u8,
}

impl StatusVector {
    /// Build from raw device values, discarding out-of-range bits.
    pub fn from_raw(address: u32, data_out: u32) -> Self {
        Self {
            address: (address & ADDRESS_MASK as u32) as u8,
            data_out: (data_out & DATA_MASK as u32) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_masks() {
        let s = StatusVector::from_raw(0xFF, 0xFF);
        assert_eq!(s.address, 0x3F);
        assert_eq!(s.data_out, 0x0F);

        let s = StatusVector::from_raw(0x41, 0x17);
        assert_eq!(s.address, 0x01);
        assert_eq!(s.data_out, 0x07);
    }

    #[test]
    fn test_action_vectors_assert_one_flag() {
        let vectors = [
            ControlVector::store(0xA),
            ControlVector::next(0xA),
            ControlVector::prev(0xA),
            ControlVector::reset_asserted(),
        ];
        for v in vectors {
            let asserted = [v.store, v.next, v.prev, v.reset]
                .iter()
                .filter(|f| **f)
                .count();
            assert_eq!(asserted, 1, "{:?}", v);
        }
        assert_eq!(ControlVector::idle(5), ControlVector { data_in: 5, ..Default::default() });
    }

    #[test]
    fn test_reset_clears_data_in() {
        assert_eq!(ControlVector::reset_asserted().data_in, 0);
        assert!(!ControlVector::reset_released().reset);
    }
}
