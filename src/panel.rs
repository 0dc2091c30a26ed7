// src/panel.rs
//
// Front panel controller: turns operator actions into device transactions and
// keeps the last observed status.
//
// Every action maps to exactly one transaction except reset, which is a pulse:
// one transaction with RST asserted, then one with RST released. A single
// combined transaction is not a pulse. No transaction is ever retried.

use crate::display::{PanelDisplay, PanelView};
use crate::io::{
    ControlVector, DeviceSession, IoError, LineCodec, NibbleMemCodec, SessionConfig,
    StatusVector, Transport, DATA_MASK, SWITCH_COUNT,
};

// ============================================================================
// Types
// ============================================================================

/// Device-visible panel condition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelState {
    /// Reset pulse issued, actions accepted
    Ready,
    /// Terminal; actions are no-ops
    Closed,
}

/// Result of one operator action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Device answered; retained status overwritten
    Updated(StatusVector),
    /// No usable answer; retained status unchanged
    Stale,
    /// Panel closed; nothing sent
    Skipped,
}

// ============================================================================
// Controller
// ============================================================================

/// Drives one device through a `Transport` and reports to a `PanelDisplay`.
pub struct FrontPanelController<T: Transport, D: PanelDisplay> {
    transport: T,
    display: D,
    view: PanelView,
    state: PanelState,
    transactions: u64,
}

impl<D: PanelDisplay> FrontPanelController<DeviceSession, D> {
    /// Launch the device process and reset it.
    ///
    /// Fails only when the process cannot be started.
    pub fn launch(config: SessionConfig, display: D) -> Result<Self, IoError> {
        let session = DeviceSession::spawn(config)?;
        Ok(Self::new(session, display))
    }
}

impl<T: Transport, D: PanelDisplay> FrontPanelController<T, D> {
    /// Take ownership of an open transport and issue the power-on reset pulse.
    pub fn new(transport: T, display: D) -> Self {
        let mut controller = Self {
            transport,
            display,
            view: PanelView::default(),
            state: PanelState::Ready,
            transactions: 0,
        };
        controller.reset_pulse();
        controller
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    /// Last status read from the device
    pub fn status(&self) -> Option<StatusVector> {
        self.view.status
    }

    pub fn view(&self) -> &PanelView {
        &self.view
    }

    /// Current DIN switch value
    pub fn switches(&self) -> u8 {
        self.view.din
    }

    /// Transactions attempted so far, reset pulse included
    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ------------------------------------------------------------------------
    // Operator actions
    // ------------------------------------------------------------------------

    /// Switches changed. Observes the device without changing its state.
    pub fn input_changed(&mut self, bits: u8) -> StepOutcome {
        if self.state == PanelState::Closed {
            return StepOutcome::Skipped;
        }
        self.view.din = bits & DATA_MASK;
        self.step(ControlVector::idle(self.view.din))
    }

    /// Set one DIN switch, then behave as `input_changed`.
    pub fn set_switch(&mut self, index: usize, on: bool) -> Result<StepOutcome, IoError> {
        let mask = switch_mask(index)?;
        if self.state == PanelState::Closed {
            return Ok(StepOutcome::Skipped);
        }
        let bits = if on {
            self.view.din | mask
        } else {
            self.view.din & !mask
        };
        Ok(self.input_changed(bits))
    }

    /// Flip one DIN switch, then behave as `input_changed`.
    pub fn toggle_switch(&mut self, index: usize) -> Result<StepOutcome, IoError> {
        let mask = switch_mask(index)?;
        let on = self.view.din & mask == 0;
        self.set_switch(index, on)
    }

    /// Write DIN at the current address, then advance.
    pub fn store(&mut self) -> StepOutcome {
        self.step(ControlVector::store(self.view.din))
    }

    pub fn next(&mut self) -> StepOutcome {
        self.step(ControlVector::next(self.view.din))
    }

    pub fn prev(&mut self) -> StepOutcome {
        self.step(ControlVector::prev(self.view.din))
    }

    /// Pulse the reset line. Outcome is that of the release transaction.
    pub fn reset(&mut self) -> StepOutcome {
        self.reset_pulse()
    }

    /// Shut the device down. Idempotent; later actions are no-ops.
    pub fn close(&mut self) {
        if self.state == PanelState::Closed {
            return;
        }
        self.state = PanelState::Closed;
        self.transport.close();
        tlog!(
            "[panel] Closed after {} transactions",
            self.transactions
        );
    }

    // ------------------------------------------------------------------------
    // Sequencing
    // ------------------------------------------------------------------------

    fn reset_pulse(&mut self) -> StepOutcome {
        // Release is sent even if the assert got no answer, so RST never sticks
        self.step(ControlVector::reset_asserted());
        self.step(ControlVector::reset_released())
    }

    /// One transaction: encode, exchange, decode, publish.
    fn step(&mut self, vector: ControlVector) -> StepOutcome {
        if self.state == PanelState::Closed {
            return StepOutcome::Skipped;
        }

        let request = NibbleMemCodec::encode(&vector);
        self.transactions += 1;

        let result = self
            .transport
            .transact(&request)
            .and_then(|response| NibbleMemCodec::decode(&response));

        match result {
            Ok(status) => {
                self.view.status = Some(status);
                self.view.available = true;
                self.display.show_status(&self.view);
                StepOutcome::Updated(status)
            }
            Err(e) => {
                if !e.is_session_closed() {
                    tlog!("[panel] Ignoring response to {:?}: {}", request, e);
                }
                self.view.available = false;
                self.display.show_unavailable(&self.view, &e);
                StepOutcome::Stale
            }
        }
    }
}

impl<T: Transport, D: PanelDisplay> Drop for FrontPanelController<T, D> {
    fn drop(&mut self) {
        self.close();
    }
}

fn switch_mask(index: usize) -> Result<u8, IoError> {
    if index >= SWITCH_COUNT {
        return Err(IoError::invalid_switch(index));
    }
    Ok(1 << index)
}

// ============================================================================
// Tests
// ============================================================================
