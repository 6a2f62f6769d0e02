use std::time::{Duration, Instant};

use shared::error::ProvisionError;
use shared::provision::{ENTER_MODE_SENTINEL, EXIT_MODE_SENTINEL, ProvisionCommand};
use shared::secrets::{MAX_SLOTS, SecretRecord};

use super::{echo_line, lossy, send_command, slot};
use crate::constants::{ABORT_EXIT_MAX_READS, DEFAULT_READ_TIMEOUT_MS};
use crate::transport::LineTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Per-line read timeout.
    pub read_timeout: Duration,
    /// Total bound on waiting for the enter/leave sentinels; `None` waits forever.
    pub mode_wait: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            mode_wait: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingPhase {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Entering,
    Listing(ListingPhase),
    Uploading,
    Exiting,
    Closed,
    Aborted,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub before: Vec<String>,
    pub after: Vec<String>,
    pub slots_written: usize,
}

#[derive(Debug, Clone, Copy)]
enum WaitBound {
    Total(Option<Duration>),
    /// Every poll counts, so a chatty console cannot hold the wait open.
    Reads(usize),
}

/// Drives the device through provisioning mode for one batch of records.
///
/// The session owns its transport for its whole lifetime; dropping the
/// session releases the port on every path, including after an abort.
pub struct ProvisioningSession<T>
where
    T: LineTransport,
{
    transport: T,
    config: SessionConfig,
    state: SessionState,
}

impl<T> ProvisioningSession<T>
where
    T: LineTransport,
{
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Upload `records` into slots `0..records.len()`.
    ///
    /// An empty list is a no-op that never touches the device. The first slot
    /// failure stops the remaining slots; the session then tries to leave
    /// provisioning mode and returns the slot error.
    pub fn run(&mut self, records: &[SecretRecord]) -> Result<SessionReport, ProvisionError> {
        self.ensure_idle()?;

        if records.is_empty() {
            log::info!("no secrets present");
            self.transition(SessionState::Closed);
            return Ok(SessionReport::default());
        }
        if records.len() > MAX_SLOTS {
            self.transition(SessionState::Closed);
            return Err(ProvisionError::TooManyRecords {
                count: records.len(),
                max: MAX_SLOTS,
            });
        }

        if let Err(err) = self.enter() {
            return Err(self.abort(err));
        }
        let before = self.list(ListingPhase::Before);

        self.transition(SessionState::Uploading);
        let slots_written = match self.upload_all(records) {
            Ok(count) => count,
            Err(err) => return Err(self.abort(err)),
        };

        let after = self.list(ListingPhase::After);
        if let Err(err) = self.exit() {
            self.transition(SessionState::Aborted);
            return Err(err);
        }
        self.transition(SessionState::Closed);

        Ok(SessionReport {
            before,
            after,
            slots_written,
        })
    }

    /// Enter provisioning mode, list the stored slots, and leave again.
    pub fn inspect(&mut self) -> Result<Vec<String>, ProvisionError> {
        self.ensure_idle()?;

        if let Err(err) = self.enter() {
            return Err(self.abort(err));
        }
        let listing = self.list(ListingPhase::Before);
        if let Err(err) = self.exit() {
            self.transition(SessionState::Aborted);
            return Err(err);
        }
        self.transition(SessionState::Closed);
        Ok(listing)
    }

    fn ensure_idle(&self) -> Result<(), ProvisionError> {
        match self.state {
            SessionState::Idle => Ok(()),
            _ => Err(ProvisionError::SessionClosed),
        }
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("session {:?} -> {next:?}", self.state);
        self.state = next;
    }

    fn enter(&mut self) -> Result<(), ProvisionError> {
        self.transition(SessionState::Entering);
        log::info!("entering secrets mode");
        send_command(&mut self.transport, ProvisionCommand::EnterMode)?;
        self.wait_for(ENTER_MODE_SENTINEL, WaitBound::Total(self.config.mode_wait))
    }

    fn exit(&mut self) -> Result<(), ProvisionError> {
        self.transition(SessionState::Exiting);
        log::info!("leaving secrets mode");
        send_command(&mut self.transport, ProvisionCommand::LeaveMode)?;
        self.wait_for(EXIT_MODE_SENTINEL, WaitBound::Total(self.config.mode_wait))
    }

    /// Observational only: failures are logged and yield whatever was read.
    fn list(&mut self, phase: ListingPhase) -> Vec<String> {
        self.transition(SessionState::Listing(phase));
        match phase {
            ListingPhase::Before => log::info!("listing current secrets:"),
            ListingPhase::After => log::info!("listing new secrets:"),
        }

        if let Err(err) = send_command(&mut self.transport, ProvisionCommand::List) {
            log::warn!("list request failed: {err}");
            return Vec::new();
        }

        match self.transport.drain_available_lines(self.config.read_timeout) {
            Ok(lines) => lines
                .iter()
                .map(|line| {
                    echo_line(line);
                    lossy(line)
                })
                .collect(),
            Err(err) => {
                log::warn!("reading slot listing failed: {err}");
                Vec::new()
            }
        }
    }

    fn upload_all(&mut self, records: &[SecretRecord]) -> Result<usize, ProvisionError> {
        log::info!("uploading secrets");
        for (index, record) in records.iter().enumerate() {
            log::info!("slot {index}: {record}");
            slot::upload(
                &mut self.transport,
                index,
                record,
                self.config.read_timeout,
            )?;
        }
        Ok(records.len())
    }

    /// Best-effort exit after a failure; the original error is handed back unchanged.
    fn abort(&mut self, err: ProvisionError) -> ProvisionError {
        log::error!("provisioning aborted: {err}");
        self.transition(SessionState::Aborted);

        let cleanup = send_command(&mut self.transport, ProvisionCommand::LeaveMode).and_then(
            |()| self.wait_for(EXIT_MODE_SENTINEL, WaitBound::Reads(ABORT_EXIT_MAX_READS)),
        );
        if let Err(cleanup_err) = cleanup {
            log::warn!("could not leave secrets mode cleanly: {cleanup_err}");
        }

        err
    }

    fn wait_for(&mut self, sentinel: &[u8], bound: WaitBound) -> Result<(), ProvisionError> {
        let started = Instant::now();
        let mut reads = 0usize;

        loop {
            reads += 1;
            match self.transport.poll_line(self.config.read_timeout)? {
                Some(line) => {
                    echo_line(&line);
                    if line == sentinel {
                        return Ok(());
                    }
                }
                None => log::debug!("still waiting for {:?}", lossy(sentinel)),
            }

            let exhausted = match bound {
                WaitBound::Total(Some(limit)) => started.elapsed() >= limit,
                WaitBound::Total(None) => false,
                WaitBound::Reads(limit) => reads >= limit,
            };
            if exhausted {
                return Err(ProvisionError::ModeChangeTimedOut {
                    sentinel: char::from(sentinel.first().copied().unwrap_or(b'?')),
                    waited: started.elapsed(),
                });
            }
        }
    }
}
