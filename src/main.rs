use nibble_panel_lib::tlog;

fn main() {
    if let Err(e) = nibble_panel_lib::run() {
        tlog!("[main] {}", e);
        std::process::exit(1);
    }
}
