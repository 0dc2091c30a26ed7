// src/io/session.rs
//
// Device session: owns the simulator child process and its stdin/stdout pipes,
// and performs one blocking request/response transaction at a time.
//
// Responses are read on a dedicated thread and handed over through a channel,
// so a transaction can either block indefinitely (reference behaviour) or wait
// a bounded time when a response timeout is configured.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use crate::io::codec::EXIT_COMMAND;
use crate::io::error::IoError;
use crate::io::Transport;

// ============================================================================
// Constants
// ============================================================================

/// How long `close()` waits for the device to honour `exit` before killing it
const GRACEFUL_EXIT_MS: u64 = 100;

/// Poll interval while waiting for a graceful exit
const EXIT_POLL_MS: u64 = 10;

// ============================================================================
// Configuration
// ============================================================================

/// Device process configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Simulator executable path (e.g., "../sim/sim")
    pub program: String,
    /// Extra command-line arguments
    pub args: Vec<String>,
    /// Bounded wait per transaction in milliseconds (None = block forever)
    pub response_timeout_ms: Option<u64>,
    /// Log every request/response pair
    pub trace_transactions: bool,
}

impl SessionConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            response_timeout_ms: None,
            trace_transactions: false,
        }
    }

    /// Label used in log lines and errors, e.g. `sim(../sim/sim)`
    pub fn device_label(&self) -> String {
        format!("sim({})", self.program)
    }

    pub fn validate(&self) -> Result<(), IoError> {
        if self.program.trim().is_empty() {
            return Err(IoError::configuration("device path is empty"));
        }
        if self.response_timeout_ms == Some(0) {
            return Err(IoError::configuration(
                "response timeout must be greater than 0 ms",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Reader Thread
// ============================================================================

/// Message from the stdout reader thread
enum ReaderMessage {
    /// One response line, terminator included
    Line(String),
    /// A whole line that is not valid UTF-8
    Invalid(Vec<u8>),
    /// Stream closed (process exited)
    Eof,
    /// Read failed
    Error(String),
}

fn spawn_reader(
    device: &str,
    stdout: ChildStdout,
) -> Result<std_mpsc::Receiver<ReaderMessage>, IoError> {
    let (tx, rx) = std_mpsc::channel::<ReaderMessage>();

    std::thread::Builder::new()
        .name("nibble-session-reader".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut raw = Vec::new();
                let message = match reader.read_until(b'\n', &mut raw) {
                    Ok(0) => ReaderMessage::Eof,
                    Ok(_) => match String::from_utf8(raw) {
                        Ok(line) => ReaderMessage::Line(line),
                        Err(e) => ReaderMessage::Invalid(e.into_bytes()),
                    },
                    Err(e) => ReaderMessage::Error(e.to_string()),
                };
                // A bad line is still a whole line, so pairing survives it
                let last = matches!(message, ReaderMessage::Eof | ReaderMessage::Error(_));
                if tx.send(message).is_err() || last {
                    break;
                }
            }
        })
        .map_err(|e| IoError::spawn(device, format!("reader thread: {}", e)))?;

    Ok(rx)
}

// ============================================================================
// Device Session
// ============================================================================

/// The child process and both protocol pipes. Released exactly once.
struct ChildHandle {
    child: Child,
    stdin: ChildStdin,
    responses: std_mpsc::Receiver<ReaderMessage>,
}

/// One simulator process, spoken to over its stdin/stdout line protocol.
pub struct DeviceSession {
    device: String,
    config: SessionConfig,
    handle: Option<ChildHandle>,
    /// Set once request/response pairing can no longer be trusted
    poisoned: bool,
}

impl DeviceSession {
    /// Launch the device process with fresh stdin/stdout pipes.
    ///
    /// Stderr is not part of the protocol and is discarded.
    pub fn spawn(config: SessionConfig) -> Result<Self, IoError> {
        config.validate()?;
        let device = config.device_label();

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| IoError::spawn(&device, e.to_string()))?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(IoError::spawn(&device, "child pipes unavailable"));
            }
        };

        let responses = match spawn_reader(&device, stdout) {
            Ok(rx) => rx,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        tlog!(
            "[session] Started {} (pid {}, timeout: {})",
            device,
            child.id(),
            config
                .response_timeout_ms
                .map(|ms| format!("{} ms", ms))
                .unwrap_or_else(|| "none".to_string())
        );

        Ok(Self {
            device,
            config,
            handle: Some(ChildHandle {
                child,
                stdin,
                responses,
            }),
            poisoned: false,
        })
    }

    /// OS process id while the session is open
    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(|h| h.child.id())
    }

    fn wait_response(&mut self) -> Result<String, IoError> {
        let handle = match self.handle.as_mut() {
            Some(h) => h,
            None => return Err(IoError::session_closed(&self.device)),
        };

        let message = match self.config.response_timeout_ms {
            Some(ms) => match handle.responses.recv_timeout(Duration::from_millis(ms)) {
                Ok(m) => m,
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    return Err(IoError::timeout(&self.device, ms))
                }
                Err(std_mpsc::RecvTimeoutError::Disconnected) => ReaderMessage::Eof,
            },
            None => handle.responses.recv().unwrap_or(ReaderMessage::Eof),
        };

        match message {
            ReaderMessage::Line(line) => Ok(line.trim_end().to_string()),
            ReaderMessage::Invalid(raw) => Err(IoError::protocol(
                &self.device,
                format!(
                    "response is not valid UTF-8: {:?}",
                    String::from_utf8_lossy(&raw).trim_end()
                ),
            )),
            ReaderMessage::Eof => Err(IoError::session_closed(&self.device)),
            ReaderMessage::Error(e) => Err(IoError::read(&self.device, e)),
        }
    }

    /// Ask the process to exit, then make sure it is gone and reaped.
    fn shutdown(device: &str, mut handle: ChildHandle) {
        let exit_line = format!("{}\n", EXIT_COMMAND);
        if let Err(e) = handle
            .stdin
            .write_all(exit_line.as_bytes())
            .and_then(|_| handle.stdin.flush())
        {
            tlog!("[session] {}: failed to send exit: {}", device, e);
        }
        // EOF on stdin also ends the reference device's read loop
        drop(handle.stdin);

        let deadline = Instant::now() + Duration::from_millis(GRACEFUL_EXIT_MS);
        let mut exited = false;
        while Instant::now() < deadline {
            match handle.child.try_wait() {
                Ok(Some(_)) => {
                    exited = true;
                    break;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(EXIT_POLL_MS)),
                Err(e) => {
                    tlog!("[session] {}: failed to poll exit status: {}", device, e);
                    break;
                }
            }
        }

        if !exited {
            if let Err(e) = handle.child.kill() {
                tlog!("[session] {}: failed to terminate: {}", device, e);
            }
        }
        match handle.child.wait() {
            Ok(status) => tlog!("[session] Stopped {} ({})", device, status),
            Err(e) => tlog!("[session] {}: failed to reap process: {}", device, e),
        }
    }
}

impl Transport for DeviceSession {
    fn transact(&mut self, request: &str) -> Result<String, IoError> {
        if self.poisoned {
            return Err(IoError::session_closed(&self.device));
        }
        let handle = match self.handle.as_mut() {
            Some(h) => h,
            None => return Err(IoError::session_closed(&self.device)),
        };

        let line = format!("{}\n", request);
        if let Err(e) = handle
            .stdin
            .write_all(line.as_bytes())
            .and_then(|_| handle.stdin.flush())
        {
            self.poisoned = true;
            return Err(IoError::write(&self.device, e.to_string()));
        }

        let result = self.wait_response();
        if let Err(ref e) = result {
            if e.is_session_closed() {
                // A late response would pair with the wrong request
                self.poisoned = true;
            }
            tlog!("[session] {}", e);
        }

        if self.config.trace_transactions {
            match &result {
                Ok(response) => tlog!("[session] {} -> {:?} <- {:?}", self.device, request, response),
                Err(_) => tlog!("[session] {} -> {:?} <- (none)", self.device, request),
            }
        }

        result
    }

    /// Idempotent. Never fails; errors are logged.
    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            Self::shutdown(&self.device, handle);
        }
    }

    fn is_closed(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> SessionConfig {
        let mut config = SessionConfig::new("/bin/sh");
        config.args = vec!["-c".to_string(), script.to_string()];
        config
    }

    /// Replies `05 A` to every line until `exit`
    const RESPONDER: &str =
        "while read line; do [ \"$line\" = exit ] && exit 0; echo '05 A'; done";

    #[test]
    fn test_transact_returns_trimmed_line() {
        let mut session = DeviceSession::spawn(shell(RESPONDER)).unwrap();
        assert_eq!(session.transact("A 1 0 0 0").unwrap(), "05 A");
        assert_eq!(session.transact("0 0 1 0 0").unwrap(), "05 A");
        session.close();
    }

    #[test]
    fn test_transact_sends_request_line() {
        // Echo each request back so the exact bytes written can be checked
        let mut session = DeviceSession::spawn(shell(
            "while read line; do [ \"$line\" = exit ] && exit 0; echo \"$line  \"; done",
        ))
        .unwrap();
        assert_eq!(session.transact("A 1 0 0 0").unwrap(), "A 1 0 0 0");
        assert_eq!(session.transact("F 0 0 0 1").unwrap(), "F 0 0 0 1");
    }

    #[test]
    fn test_empty_response_line_is_not_closed() {
        let mut session = DeviceSession::spawn(shell(
            "read line; echo ''; read line; echo '01 2'; read line",
        ))
        .unwrap();
        assert_eq!(session.transact("0 0 0 0 0").unwrap(), "");
        assert_eq!(session.transact("0 0 1 0 0").unwrap(), "01 2");
    }

    #[test]
    fn test_non_utf8_line_keeps_session_open() {
        let mut session = DeviceSession::spawn(shell(
            "read line; printf '\\377\\376 1\\n'; read line; echo '05 A'; read line",
        ))
        .unwrap();

        let err = session.transact("0 0 1 0 0").unwrap_err();
        assert!(matches!(err, IoError::Protocol { .. }), "{:?}", err);
        assert!(!err.is_session_closed());

        // Next reply still pairs with the next request
        assert_eq!(session.transact("0 0 1 0 0").unwrap(), "05 A");
    }

    /// True while the OS still has a process table entry for `pid`
    #[cfg(target_os = "linux")]
    fn process_exists(pid: u32) -> bool {
        std::path::Path::new(&format!("/proc/{}", pid)).exists()
    }

    #[test]
    fn test_exited_device_is_session_closed() {
        let mut session = DeviceSession::spawn(shell("read line; echo '00 0'")).unwrap();
        assert_eq!(session.transact("0 0 0 0 1").unwrap(), "00 0");

        let err = session.transact("0 0 0 0 0").unwrap_err();
        assert!(err.is_session_closed(), "{:?}", err);

        // Stays failed without touching the pipes again
        assert!(session.transact("0 0 0 0 0").unwrap_err().is_session_closed());
        assert!(!session.is_closed());
        session.close();
        assert!(session.is_closed());
    }

    #[test]
    fn test_spawn_failure() {
        let err = DeviceSession::spawn(SessionConfig::new("/nonexistent/nibble-sim")).err();
        match err {
            Some(IoError::Spawn { .. }) => {}
            other => panic!("expected spawn error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            DeviceSession::spawn(SessionConfig::new("  ")),
            Err(IoError::Configuration { .. })
        ));

        let mut config = SessionConfig::new("/bin/sh");
        config.response_timeout_ms = Some(0);
        assert!(matches!(
            DeviceSession::spawn(config),
            Err(IoError::Configuration { .. })
        ));
    }

    #[test]
    fn test_timeout_promotes_to_closed() {
        let mut config = shell("read line; sleep 5");
        config.response_timeout_ms = Some(50);
        let mut session = DeviceSession::spawn(config).unwrap();

        let started = Instant::now();
        let err = session.transact("0 0 0 0 0").unwrap_err();
        assert!(matches!(err, IoError::Timeout { timeout_ms: 50, .. }));
        assert!(err.is_session_closed());
        assert!(started.elapsed() < Duration::from_secs(4));

        // Close must still terminate the hung process
        session.close();
        assert!(session.is_closed());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = DeviceSession::spawn(shell(RESPONDER)).unwrap();
        let pid = session.pid().unwrap();

        session.close();
        assert!(session.is_closed());
        assert!(session.pid().is_none());
        #[cfg(target_os = "linux")]
        assert!(!process_exists(pid), "pid {} still alive after close", pid);

        session.close();
        assert!(session.is_closed());
        assert!(session.transact("0 0 0 0 0").unwrap_err().is_session_closed());
    }

    #[test]
    fn test_close_kills_device_ignoring_exit() {
        // Ignores `exit` and stdin EOF, so only the forced kill can stop it
        let mut session = DeviceSession::spawn(shell("trap '' TERM; while :; do sleep 1; done")).unwrap();
        let pid = session.pid().unwrap();
        let started = Instant::now();
        session.close();
        assert!(session.is_closed());
        assert!(started.elapsed() < Duration::from_secs(4));
        #[cfg(target_os = "linux")]
        assert!(!process_exists(pid), "pid {} still alive after close", pid);
    }

    #[test]
    fn test_device_label() {
        assert_eq!(SessionConfig::new("../sim/sim").device_label(), "sim(../sim/sim)");
    }
}
