// src/display.rs
//
// Boundary between the panel controller and whatever renders it.
// The controller owns a PanelView and lends it to the display after every
// action; the display never reaches back into controller state.

use std::io::Write;

use crate::io::{IoError, StatusVector, SWITCH_COUNT};

const LED_ON: char = '●';
const LED_OFF: char = '○';

// ============================================================================
// Panel View
// ============================================================================

/// Everything a front panel renders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PanelView {
    /// Current DIN switch value (bit i = switch DIN<i>)
    pub din: u8,
    /// Last status read from the device (None before the first one)
    pub status: Option<StatusVector>,
    /// False while the last transaction produced no status update
    pub available: bool,
}

impl PanelView {
    /// Address as two hex digits, `--` before any status
    pub fn address_text(&self) -> String {
        match self.status {
            Some(s) => format!("{:02X}", s.address),
            None => "--".to_string(),
        }
    }

    /// DOUT as one hex digit, `-` before any status
    pub fn data_out_text(&self) -> String {
        match self.status {
            Some(s) => format!("{:X}", s.data_out),
            None => "-".to_string(),
        }
    }

    /// DOUT LEDs, DOUT0 first
    pub fn led_glyphs(&self) -> String {
        let dout = self.status.map(|s| s.data_out).unwrap_or(0);
        bit_glyphs(dout)
    }

    /// DIN switches, DIN0 first
    pub fn switch_glyphs(&self) -> String {
        bit_glyphs(self.din)
    }

    /// DIN as a 4-digit binary number, DIN3 first
    pub fn din_text(&self) -> String {
        format!("{:04b}", self.din & 0x0F)
    }

    /// One-line rendering used by the console panel
    pub fn summary(&self) -> String {
        format!(
            "ADDR: {}  DOUT: {}  LEDS: {}  DIN: {}",
            self.address_text(),
            self.data_out_text(),
            self.led_glyphs(),
            self.din_text()
        )
    }
}

fn bit_glyphs(value: u8) -> String {
    (0..SWITCH_COUNT)
        .map(|i| if (value >> i) & 1 == 1 { LED_ON } else { LED_OFF })
        .collect()
}

// ============================================================================
// Display Trait
// ============================================================================

/// Receives panel state from the controller.
pub trait PanelDisplay {
    /// A transaction succeeded; `view.status` is current.
    fn show_status(&mut self, view: &PanelView);

    /// A transaction produced no status update; `view.status` is stale.
    fn show_unavailable(&mut self, view: &PanelView, reason: &IoError);
}

// ============================================================================
// Console Display
// ============================================================================

/// Writes one summary line per update.
pub struct ConsoleDisplay<W: Write> {
    out: W,
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Free-form line (help, input errors)
    pub fn message(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
    }
}

impl<W: Write> PanelDisplay for ConsoleDisplay<W> {
    fn show_status(&mut self, view: &PanelView) {
        let _ = writeln!(self.out, "{}", view.summary());
        let _ = self.out.flush();
    }

    fn show_unavailable(&mut self, view: &PanelView, reason: &IoError) {
        let _ = writeln!(
            self.out,
            "{}  [stale: device unavailable: {}]",
            view.summary(),
            reason
        );
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_text_before_status() {
        let view = PanelView::default();
        assert_eq!(view.address_text(), "--");
        assert_eq!(view.data_out_text(), "-");
        assert_eq!(view.led_glyphs(), "○○○○");
    }

    #[test]
    fn test_view_text() {
        let view = PanelView {
            din: 0b1010,
            status: Some(StatusVector { address: 5, data_out: 0xA }),
            available: true,
        };
        assert_eq!(view.address_text(), "05");
        assert_eq!(view.data_out_text(), "A");
        assert_eq!(view.led_glyphs(), "○●○●");
        assert_eq!(view.switch_glyphs(), "○●○●");
        assert_eq!(view.din_text(), "1010");
        assert_eq!(view.summary(), "ADDR: 05  DOUT: A  LEDS: ○●○●  DIN: 1010");
    }

    #[test]
    fn test_console_display_lines() {
        let view = PanelView {
            din: 1,
            status: Some(StatusVector { address: 0x3F, data_out: 1 }),
            available: true,
        };
        let mut display = ConsoleDisplay::new(Vec::new());
        display.show_status(&view);
        display.show_unavailable(&view, &IoError::session_closed("sim"));

        let text = String::from_utf8(display.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ADDR: 3F  DOUT: 1  LEDS: ●○○○  DIN: 0001");
        assert!(lines[1].ends_with("[stale: device unavailable: sim: session closed]"));
    }
}
