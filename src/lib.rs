#[macro_use]
pub mod logging;

pub mod display;
pub mod io;
pub mod panel;
pub mod settings;

use std::io::{BufRead, Write};
use std::path::PathBuf;

use display::{ConsoleDisplay, PanelDisplay};
use io::{Transport, DATA_MASK, SWITCH_COUNT};
use panel::{FrontPanelController, StepOutcome};

// ============================================================================
// Console Commands
// ============================================================================

const HELP_TEXT: &str = "commands: sw <bits|0xH>, t <0-3>, store, next, prev, reset, status, help, quit";

/// One line typed at the console front panel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Set all four switches
    Switches(u8),
    /// Flip one switch
    Toggle(usize),
    Store,
    Next,
    Prev,
    Reset,
    /// Re-print the retained state without a transaction
    Status,
    Help,
    Quit,
}

/// Parse a console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut parts = line.split_whitespace();
    let verb = match parts.next() {
        Some(v) => v.to_ascii_lowercase(),
        None => return Ok(None),
    };
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many arguments: {}", line.trim()));
    }

    let command = match (verb.as_str(), arg) {
        ("sw", Some(bits)) => ConsoleCommand::Switches(parse_switch_bits(bits)?),
        ("t", Some(index)) => {
            let index: usize = index
                .parse()
                .map_err(|_| format!("invalid switch index: {}", index))?;
            if index >= SWITCH_COUNT {
                return Err(format!("switch index {} out of range (0-3)", index));
            }
            ConsoleCommand::Toggle(index)
        }
        ("store", None) => ConsoleCommand::Store,
        ("next", None) => ConsoleCommand::Next,
        ("prev", None) => ConsoleCommand::Prev,
        ("reset", None) => ConsoleCommand::Reset,
        ("status", None) => ConsoleCommand::Status,
        ("help" | "?", None) => ConsoleCommand::Help,
        ("quit" | "exit", None) => ConsoleCommand::Quit,
        _ => return Err(format!("unknown command: {}", line.trim())),
    };
    Ok(Some(command))
}

/// `1010` (binary, DIN3 first) or `0xA` (hex)
fn parse_switch_bits(text: &str) -> Result<u8, String> {
    // from_str_radix alone would accept a leading '+'
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            u8::from_str_radix(hex, 16).ok()
        } else {
            None
        }
    } else if !text.is_empty() && text.len() <= SWITCH_COUNT && text.bytes().all(|b| b == b'0' || b == b'1') {
        u8::from_str_radix(text, 2).ok()
    } else {
        None
    };

    match value {
        Some(v) if v <= DATA_MASK => Ok(v),
        _ => Err(format!("invalid switch value: {}", text)),
    }
}

// ============================================================================
// Console Front Panel
// ============================================================================

/// Feed console commands to the controller until `quit` or end of input.
pub fn run_console<R, T, W>(
    input: R,
    controller: &mut FrontPanelController<T, ConsoleDisplay<W>>,
) -> Result<(), String>
where
    R: BufRead,
    T: Transport,
    W: Write,
{
    for line in input.lines() {
        let line = line.map_err(|e| format!("Failed to read console input: {}", e))?;

        let command = match parse_command(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(e) => {
                controller.display_mut().message(&format!("{} ({})", e, HELP_TEXT));
                continue;
            }
        };

        let outcome = match command {
            ConsoleCommand::Switches(bits) => controller.input_changed(bits),
            ConsoleCommand::Toggle(index) => controller
                .toggle_switch(index)
                .map_err(String::from)?,
            ConsoleCommand::Store => controller.store(),
            ConsoleCommand::Next => controller.next(),
            ConsoleCommand::Prev => controller.prev(),
            ConsoleCommand::Reset => controller.reset(),
            ConsoleCommand::Status => {
                let view = *controller.view();
                controller.display_mut().show_status(&view);
                continue;
            }
            ConsoleCommand::Help => {
                controller.display_mut().message(HELP_TEXT);
                continue;
            }
            ConsoleCommand::Quit => break,
        };

        if outcome == StepOutcome::Skipped {
            controller.display_mut().message("panel closed");
        }
    }

    controller.close();
    Ok(())
}

/// Entry point of the `nibble-panel` binary: stdin/stdout front panel.
pub fn run() -> Result<(), String> {
    let settings_path = std::env::var_os("NIBBLE_PANEL_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(settings::default_settings_path);
    let settings = settings::load_settings(&settings_path)?;

    if let Some(dir) = &settings.log_dir {
        logging::init_file_logging(&PathBuf::from(dir))?;
    }

    let display = ConsoleDisplay::new(std::io::stdout());
    let mut controller =
        FrontPanelController::launch(settings.session_config(), display).map_err(String::from)?;
    controller.display_mut().message(HELP_TEXT);

    let stdin = std::io::stdin();
    let result = run_console(stdin.lock(), &mut controller);

    logging::stop_file_logging();
    result
}
