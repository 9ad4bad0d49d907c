//! Agent-side request loop.
//!
//! An agent reads its day's reservation requests from a CSV file (rows of
//! `family,hour,party_size`, optionally terminated by a `Fin,0,0` row),
//! registers with the controller, and submits one request at a time, waiting
//! for each response while absorbing TIME updates. Rows whose hour is
//! already past the latest known simulated hour are skipped locally - the
//! controller would only reprogram them anyway.

use std::io::Read;

use serde::Deserialize;
use tracing::warn;

/// One reservation request read from the agent's CSV file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestRow {
    /// Family asking for the block.
    pub family: String,
    /// Requested start hour.
    pub hour: u8,
    /// People in the party.
    pub party_size: u32,
}

/// Marker family name ending the file early.
const TERMINATOR: &str = "fin";

/// Reads request rows from a headerless CSV source.
///
/// Unparseable rows are logged and skipped; a row whose family is `Fin`
/// (case-insensitive) ends the file. This loader never fails outright: a
/// half-broken request file still yields its good rows.
pub fn load_requests<R: Read>(reader: R) -> Vec<RequestRow> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.deserialize::<RequestRow>().enumerate() {
        match record {
            Ok(row) if row.family.eq_ignore_ascii_case(TERMINATOR) => break,
            Ok(row) => rows.push(row),
            Err(err) => warn!(row = index + 1, error = %err, "skipping unparseable request row"),
        }
    }
    rows
}

#[cfg(unix)]
pub use unix::{run, AgentOptions};

#[cfg(unix)]
mod unix {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read, Write};
    use std::os::unix::fs::OpenOptionsExt;
    use std::path::{Path, PathBuf};
    use std::thread;
    use std::time::{Duration, Instant};

    use tracing::{info, warn};

    use super::load_requests;
    use crate::channel::fifo;
    use crate::error::{ParkError, ParkResult};
    use crate::protocol::{Inbound, Outbound};

    /// How long the poll loop sleeps when the reply pipe has no data.
    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Parameters for one agent process.
    #[derive(Debug, Clone)]
    pub struct AgentOptions {
        /// Agent id announced to the controller.
        pub name: String,
        /// Path of the CSV request file.
        pub requests: PathBuf,
        /// Path of the controller's inbound FIFO.
        pub controller_pipe: PathBuf,
        /// Pause between consecutive requests.
        pub delay: Duration,
        /// Send CLOSE and leave once the file is done instead of waiting
        /// for END.
        pub close_when_done: bool,
        /// How long to keep waiting for END after the last request when the
        /// controller has gone silent. A dead controller leaves the reply
        /// pipe open-ended, so this is the agent's only liveness bound.
        pub end_wait: Duration,
    }

    impl AgentOptions {
        /// The agent's private reply pipe, created next to the controller's.
        #[must_use]
        pub fn reply_path(&self) -> PathBuf {
            self.controller_pipe
                .with_file_name(format!("reply_{}.fifo", self.name))
        }
    }

    /// Non-blocking line reader over the agent's reply FIFO.
    ///
    /// The read end opens immediately regardless of writers; the controller
    /// connects per delivery. `Ok(0)` (no writer) and `WouldBlock` (writer,
    /// no data) both mean "poll again later".
    struct LineStream {
        pipe: File,
        buffer: Vec<u8>,
    }

    impl LineStream {
        fn open(path: &Path) -> io::Result<Self> {
            let pipe = OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path)?;
            Ok(Self {
                pipe,
                buffer: Vec::new(),
            })
        }

        fn take_line(&mut self) -> Option<String> {
            let end = self.buffer.iter().position(|&b| b == b'\n')?;
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            Some(String::from_utf8_lossy(&raw).trim().to_string())
        }

        /// Polls until one full line is available or the deadline passes;
        /// `None` means the deadline expired with nothing to read.
        fn poll_line(&mut self, deadline: Option<Instant>) -> io::Result<Option<String>> {
            loop {
                if let Some(line) = self.take_line() {
                    if line.is_empty() {
                        continue;
                    }
                    return Ok(Some(line));
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Ok(None);
                }
                let mut chunk = [0u8; 512];
                match self.pipe.read(&mut chunk) {
                    Ok(0) => thread::sleep(POLL_INTERVAL),
                    Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                        thread::sleep(POLL_INTERVAL);
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        /// Next decodable controller message, skipping undecodable lines.
        /// Blocks without bound; used while a response is still owed.
        fn next_message(&mut self) -> io::Result<Outbound> {
            loop {
                if let Some(message) = self.next_message_by(None)? {
                    return Ok(message);
                }
            }
        }

        /// Deadline-bounded variant of [`Self::next_message`]; `None` means
        /// the controller stayed silent past the deadline.
        fn next_message_by(&mut self, deadline: Option<Instant>) -> io::Result<Option<Outbound>> {
            loop {
                let Some(line) = self.poll_line(deadline)? else {
                    return Ok(None);
                };
                match Outbound::decode_line(&line) {
                    Ok(message) => return Ok(Some(message)),
                    Err(err) => warn!(error = %err, "dropping undecodable controller line"),
                }
            }
        }
    }

    fn send_line(pipe: &mut File, message: &Inbound) -> io::Result<()> {
        pipe.write_all(message.encode_line().as_bytes())
    }

    /// Runs one agent to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`ParkError`] when the request file is unreadable, the
    /// pipes cannot be created or opened, or the controller pipe breaks
    /// mid-run.
    pub fn run(options: &AgentOptions) -> ParkResult<()> {
        let reply_path = options.reply_path();
        fifo::create_fifo(&reply_path)?;

        // Read end first: the controller replies the moment REGISTER lands,
        // and a reply with no reader is dropped as unreachable.
        let mut stream = LineStream::open(&reply_path)?;
        let mut controller = OpenOptions::new()
            .write(true)
            .open(&options.controller_pipe)?;

        send_line(
            &mut controller,
            &Inbound::Register {
                agent: options.name.clone(),
                reply_to: reply_path.display().to_string(),
            },
        )?;

        let mut current_hour = loop {
            match stream.next_message()? {
                Outbound::Time { hour } => break hour,
                Outbound::End => {
                    info!(agent = %options.name, "END before the first request");
                    return finish(&reply_path);
                }
                Outbound::Response { .. } => {}
            }
        };
        info!(agent = %options.name, current_hour, "registered");

        let requests = File::open(&options.requests).map_err(ParkError::Io)?;
        for row in load_requests(requests) {
            if row.hour < current_hour {
                info!(
                    agent = %options.name,
                    family = %row.family,
                    hour = row.hour,
                    current_hour,
                    "skipping request already in the past"
                );
                continue;
            }

            send_line(
                &mut controller,
                &Inbound::Request {
                    agent: options.name.clone(),
                    family: row.family.clone(),
                    hour: row.hour,
                    party_size: row.party_size,
                },
            )?;
            info!(agent = %options.name, family = %row.family, hour = row.hour, "request sent");

            loop {
                match stream.next_message()? {
                    Outbound::Time { hour } => current_hour = hour,
                    Outbound::Response { family, decision } => {
                        info!(agent = %options.name, family = %family, ?decision, "response");
                        break;
                    }
                    Outbound::End => {
                        info!(agent = %options.name, "END received mid-run");
                        return finish(&reply_path);
                    }
                }
            }
            thread::sleep(options.delay);
        }

        if options.close_when_done {
            send_line(
                &mut controller,
                &Inbound::Close {
                    agent: options.name.clone(),
                },
            )?;
            info!(agent = %options.name, "closed, leaving without waiting for END");
            return finish(&reply_path);
        }

        info!(agent = %options.name, "no more requests, waiting for END");
        let mut deadline = Instant::now() + options.end_wait;
        loop {
            match stream.next_message_by(Some(deadline))? {
                Some(Outbound::End) => {
                    info!(agent = %options.name, "END received");
                    return finish(&reply_path);
                }
                Some(Outbound::Time { .. } | Outbound::Response { .. }) => {
                    // Any traffic proves the controller is alive.
                    deadline = Instant::now() + options.end_wait;
                }
                None => {
                    warn!(
                        agent = %options.name,
                        wait_secs = options.end_wait.as_secs(),
                        "controller went silent before END, giving up"
                    );
                    return finish(&reply_path);
                }
            }
        }
    }

    fn finish(reply_path: &Path) -> ParkResult<()> {
        fifo::remove_fifo(reply_path)?;
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn silent_pipe_hits_the_deadline_instead_of_polling_forever() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("reply.fifo");
            fifo::create_fifo(&path).expect("mkfifo");

            let mut stream = LineStream::open(&path).expect("open");
            let deadline = Instant::now() + Duration::from_millis(300);
            let message = stream
                .next_message_by(Some(deadline))
                .expect("polling a silent pipe is not an I/O error");
            assert!(message.is_none());
        }

        #[test]
        fn deadline_still_yields_lines_that_arrive_in_time() {
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("reply.fifo");
            fifo::create_fifo(&path).expect("mkfifo");

            let mut stream = LineStream::open(&path).expect("open");
            {
                let mut writer = OpenOptions::new()
                    .write(true)
                    .custom_flags(libc::O_NONBLOCK)
                    .open(&path)
                    .expect("open write end");
                writer.write_all(b"END\n").expect("write");
            }
            let deadline = Instant::now() + Duration::from_secs(5);
            let message = stream.next_message_by(Some(deadline)).expect("read");
            assert_eq!(message, Some(Outbound::End));
        }
    }
}
