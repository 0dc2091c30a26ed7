//! Terminal front panel for the 64x4 nibble memory simulator.
//!
//! Keys: `0`-`3` toggle DIN switches, `s` store, `n`/`→` next, `p`/`←` prev,
//! `r` reset, `q`/`Esc` quit. Each key's transaction completes before the next
//! event is read, so the device sees actions in the order they were typed.

use std::path::PathBuf;

use clap::Parser;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use ratatui::{DefaultTerminal, Frame};

use nibble_panel_lib::display::{PanelDisplay, PanelView};
use nibble_panel_lib::io::{DeviceSession, IoError, SWITCH_COUNT};
use nibble_panel_lib::panel::FrontPanelController;
use nibble_panel_lib::{logging, settings, tlog};

#[derive(Parser, Debug)]
#[command(
    name = "panel_cli",
    about = "Terminal front panel for the 64x4 nibble memory simulator"
)]
struct Args {
    /// Simulator executable (overrides settings)
    #[arg(short, long)]
    device: Option<String>,

    /// Extra simulator argument, repeatable
    #[arg(long = "arg", allow_hyphen_values = true)]
    device_args: Vec<String>,

    /// Give up on a response after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log every request/response pair
    #[arg(long)]
    trace: bool,

    /// Settings file (default: <config dir>/nibble-panel/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

// ============================================================================
// Display
// ============================================================================

/// Keeps the last status message for the footer; the panel itself is drawn
/// from the controller's view.
#[derive(Default)]
struct TuiDisplay {
    message: String,
    stale: bool,
}

impl PanelDisplay for TuiDisplay {
    fn show_status(&mut self, view: &PanelView) {
        self.stale = false;
        self.message = format!("ADDR {} DOUT {}", view.address_text(), view.data_out_text());
    }

    fn show_unavailable(&mut self, _view: &PanelView, reason: &IoError) {
        self.stale = true;
        self.message = format!("device unavailable: {}", reason);
    }
}

type Panel = FrontPanelController<DeviceSession, TuiDisplay>;

// ============================================================================
// Input
// ============================================================================

/// Returns false when the operator asked to quit.
fn handle_key(panel: &mut Panel, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
        KeyCode::Char('q') | KeyCode::Esc => return false,
        KeyCode::Char(c @ '0'..='3') => {
            let index = (c as u8 - b'0') as usize;
            if let Err(e) = panel.toggle_switch(index) {
                panel.display_mut().message = e.to_string();
            }
        }
        KeyCode::Char('s') => {
            panel.store();
        }
        KeyCode::Char('n') | KeyCode::Right => {
            panel.next();
        }
        KeyCode::Char('p') | KeyCode::Left => {
            panel.prev();
        }
        KeyCode::Char('r') => {
            panel.reset();
        }
        _ => {}
    }
    true
}

// ============================================================================
// Rendering
// ============================================================================

fn bit_spans(value: u8, label: &str, on_colour: Color) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for i in 0..SWITCH_COUNT {
        let on = (value >> i) & 1 == 1;
        let style = if on {
            Style::default().fg(on_colour).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::raw(format!(" {}{} ", label, i)));
        spans.push(Span::styled(if on { "●" } else { "○" }, style));
        spans.push(Span::raw("  "));
    }
    spans
}

fn render(frame: &mut Frame, panel: &Panel) {
    let view = panel.view();
    let display = panel.display();

    let [din_area, dout_area, status_area, footer_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(2),
    ])
    .areas(frame.area());

    frame.render_widget(
        Paragraph::new(Line::from(bit_spans(view.din, "DIN", Color::Yellow)))
            .block(Block::bordered().title(" DIN (4 switches) ")),
        din_area,
    );

    let dout = view.status.map(|s| s.data_out).unwrap_or(0);
    frame.render_widget(
        Paragraph::new(Line::from(bit_spans(dout, "DOUT", Color::Green)))
            .block(Block::bordered().title(" DOUT (4 LEDs) ")),
        dout_area,
    );

    let value_style = Style::default().add_modifier(Modifier::BOLD);
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw(" ADDR: "),
            Span::styled(view.address_text(), value_style),
            Span::raw("    DOUT hex: "),
            Span::styled(view.data_out_text(), value_style),
            Span::raw(format!("    transactions: {}", panel.transactions())),
        ]))
        .block(Block::bordered().title(" Nibble Memory Front Panel (64x4) ")),
        status_area,
    );

    let message_style = if display.stale {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    frame.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(format!(" {}", display.message), message_style)),
            Line::from(" 0-3 toggle DIN  s store  n/→ next  p/← prev  r reset  q quit"),
        ]),
        footer_area,
    );
}

async fn run_panel(terminal: &mut DefaultTerminal, panel: &mut Panel) -> std::io::Result<()> {
    let mut events = EventStream::new();
    loop {
        terminal.draw(|frame| render(frame, panel))?;

        match events.next().await {
            Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                if !handle_key(panel, key) {
                    return Ok(());
                }
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e),
            None => return Ok(()),
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn load_settings(args: &Args) -> Result<settings::PanelSettings, String> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(settings::default_settings_path);
    let mut loaded = settings::load_settings(&path)?;

    if let Some(device) = &args.device {
        loaded.device_path = device.clone();
    }
    if !args.device_args.is_empty() {
        loaded.device_args = args.device_args.clone();
    }
    if args.timeout_ms.is_some() {
        loaded.response_timeout_ms = args.timeout_ms;
    }
    if args.trace {
        loaded.trace_transactions = true;
    }
    if let Some(dir) = &args.log_dir {
        loaded.log_dir = Some(dir.to_string_lossy().to_string());
    }
    Ok(loaded)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let settings = match load_settings(&args) {
        Ok(s) => s,
        Err(e) => {
            tlog!("[panel_cli] {}", e);
            std::process::exit(1);
        }
    };

    if let Some(dir) = &settings.log_dir {
        if let Err(e) = logging::init_file_logging(&PathBuf::from(dir)) {
            tlog!("[panel_cli] {}", e);
        }
    }

    let mut panel = match FrontPanelController::launch(settings.session_config(), TuiDisplay::default()) {
        Ok(p) => p,
        Err(e) => {
            tlog!("[panel_cli] {}", e);
            std::process::exit(1);
        }
    };

    // The alternate screen owns the terminal; log lines go to the file only
    logging::set_stderr_logging(false);
    let mut terminal = ratatui::init();
    let result = run_panel(&mut terminal, &mut panel).await;
    ratatui::restore();
    logging::set_stderr_logging(true);

    panel.close();
    logging::stop_file_logging();

    if let Err(e) = result {
        tlog!("[panel_cli] Terminal error: {}", e);
        std::process::exit(1);
    }
}
