//! Unix named-pipe transport.
//!
//! The controller owns one inbound FIFO shared by all agents; each agent
//! owns a private reply FIFO the controller writes to. Lines are the message
//! boundary. Reply writes open the pipe non-blocking so that an agent that
//! never opened (or has abandoned) its pipe fails only its own delivery.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, warn};

use crate::channel::{ChannelError, IntakeEvent, ReplySender};
use crate::protocol::{Inbound, Outbound};

/// Creates a FIFO at `path` if it does not already exist.
///
/// # Errors
///
/// Returns the underlying I/O error from `mkfifo`, except `EEXIST`, which is
/// treated as success (a leftover pipe from a previous run is reused).
pub fn create_fifo(path: &Path) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    // SAFETY: c_path is a valid NUL-terminated string for the call duration.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EEXIST) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Removes a FIFO, ignoring an already-missing file.
///
/// # Errors
///
/// Returns any I/O error other than `NotFound`.
pub fn remove_fifo(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// A reply channel writing lines to an agent-owned FIFO.
#[derive(Debug, Clone)]
pub struct FifoReply {
    path: PathBuf,
    address: String,
}

impl FifoReply {
    /// Creates a reply handle for the FIFO at `path`. The pipe is opened per
    /// send, mirroring one writer line per delivery.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let address = path.display().to_string();
        Self { path, address }
    }
}

impl ReplySender for FifoReply {
    fn send(&self, message: &Outbound) -> Result<(), ChannelError> {
        let unreachable = |err: io::Error| ChannelError::Unreachable {
            address: self.address.clone(),
            message: err.to_string(),
        };
        // O_NONBLOCK: opening a FIFO with no reader must fail, not wait.
        let mut pipe = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path)
            .map_err(unreachable)?;
        pipe.write_all(message.encode_line().as_bytes())
            .map_err(unreachable)
    }

    fn address(&self) -> &str {
        &self.address
    }
}

/// Connector resolving REGISTER addresses to [`FifoReply`] handles.
///
/// Connecting always succeeds; an unreachable pipe surfaces at send time so
/// one dead agent cannot poison registration handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct FifoConnector;

impl crate::channel::ReplyConnector for FifoConnector {
    fn connect(
        &self,
        address: &str,
    ) -> Result<std::sync::Arc<dyn ReplySender>, ChannelError> {
        Ok(std::sync::Arc::new(FifoReply::new(address)))
    }
}

/// Reader side of the controller's inbound FIFO.
///
/// A dedicated thread accumulates lines, decodes them, and forwards
/// [`IntakeEvent`]s; malformed lines are logged and surface only as a
/// `Malformed` marker. On EOF (all writers gone) the pipe is reopened until
/// [`FifoIntake::unblock`] is called.
#[derive(Debug)]
pub struct FifoIntake {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl FifoIntake {
    /// Spawns the reader thread for the FIFO at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the thread cannot be spawned.
    pub fn spawn(path: impl Into<PathBuf>, tx: Sender<IntakeEvent>) -> io::Result<Self> {
        let path = path.into();
        let stop = Arc::new(AtomicBool::new(false));
        let join = thread::Builder::new().name("parksim-intake".to_string()).spawn({
            let path = path.clone();
            let stop = Arc::clone(&stop);
            move || read_loop(&path, &tx, &stop)
        })?;
        Ok(Self {
            path,
            stop,
            join: Some(join),
        })
    }

    /// Asks the reader to stop and wakes it if it is blocked on the pipe.
    ///
    /// Blocking FIFO reads cannot observe a flag, so the wake-up is a
    /// newline written through a transient write end; the reader drops the
    /// blank line and then sees the flag.
    pub fn unblock(&self) {
        self.stop.store(true, Ordering::SeqCst);
        wake(&self.path);
    }

    /// Waits for the reader thread to finish.
    pub fn join(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for FifoIntake {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        wake(&self.path);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn wake(path: &Path) {
    let pipe = OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path);
    match pipe {
        Ok(mut pipe) => {
            let _ = pipe.write_all(b"\n");
        }
        Err(err) => debug!(error = %err, "intake wake-up open failed"),
    }
}

fn read_loop(path: &Path, tx: &Sender<IntakeEvent>, stop: &Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        // Blocks until some agent opens the write end.
        let pipe = match File::open(path) {
            Ok(pipe) => pipe,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "inbound pipe open failed");
                return;
            }
        };
        for line in BufReader::new(pipe).lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, "inbound pipe read failed");
                    break;
                }
            };
            if stop.load(Ordering::SeqCst) {
                return;
            }
            if line.trim().is_empty() {
                continue;
            }
            let event = match Inbound::decode_line(&line) {
                Ok(message) => IntakeEvent::Message(message),
                Err(err) => {
                    warn!(error = %err, "dropping malformed inbound line");
                    IntakeEvent::Malformed
                }
            };
            if !forward(tx, stop, event) {
                return;
            }
        }
        // EOF: every writer closed its end; reopen and keep listening.
    }
}

/// How long the reader waits before retrying a full intake queue.
const BACKPRESSURE_INTERVAL: Duration = Duration::from_millis(20);

/// Hands one event to the intake queue without ever parking in a blocking
/// send. A blocking send could not observe the stop flag once the consumer
/// halts with the queue full, which would wedge shutdown; instead the full
/// case retries with a bounded sleep, rechecking the flag each pass.
/// Returns false when the reader should exit (stopped or consumer gone).
fn forward(tx: &Sender<IntakeEvent>, stop: &AtomicBool, mut event: IntakeEvent) -> bool {
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        match tx.try_send(event) {
            Ok(()) => return true,
            Err(TrySendError::Full(returned)) => {
                event = returned;
                thread::sleep(BACKPRESSURE_INTERVAL);
            }
            Err(TrySendError::Disconnected(_)) => {
                // Controller gone; nothing left to feed.
                return false;
            }
        }
    }
}
