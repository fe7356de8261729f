//! Command dispatcher for one session

use sluice_core::{platform_string, Workspace};
use sluice_protocol::{
    parse_line, Command, CommandKind, Failure, Reply, FILE_SENTINEL,
};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::Metrics;
#[cfg(feature = "metrics")]
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::listing::{send_listing, ListingOutcome};
use crate::stream::ChunkStream;
use crate::transfer::{drain_payload, receive_file, send_file, TransferOutcome};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Terminated,
}

/// What the session loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Per-command bookkeeping for logs and metrics
#[derive(Debug, Default)]
struct Outcome {
    failed: bool,
    received: u64,
    sent: u64,
}

/// Executes commands for one connection
pub struct SessionHandler {
    session_id: String,
    workspace: Workspace,
    config: SessionConfig,
    state: SessionState,
    #[cfg(feature = "metrics")]
    metrics: Option<Arc<Metrics>>,
}

impl SessionHandler {
    pub fn new(session_id: impl Into<String>, workspace: Workspace, config: SessionConfig) -> Self {
        Self {
            session_id: session_id.into(),
            workspace,
            config,
            state: SessionState::Active,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Attach a metrics collector
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: Option<Arc<Metrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle one received command line. Lines that do not parse get
    /// `Invalid command.` and the session continues.
    pub async fn handle_line<S>(&mut self, stream: &mut ChunkStream<S>, line: &str) -> SessionResult<Flow>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match parse_line(line) {
            Ok(command) => self.handle_command(stream, command).await,
            Err(e) => {
                debug!(session = %self.session_id, error = %e, "Rejected command line");
                #[cfg(feature = "metrics")]
                {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_failure("INVALID");
                    }
                }
                stream.send_reply(&Reply::InvalidCommand).await?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Execute a parsed command, writing its reply or payload to `stream`
    pub async fn handle_command<S>(&mut self, stream: &mut ChunkStream<S>, command: Command) -> SessionResult<Flow>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let kind = command.kind;
        debug!(
            session = %self.session_id,
            command = %kind,
            argument = command.arg(),
            "Processing command"
        );

        let started = Instant::now();
        let (flow, outcome) = self.dispatch(stream, command).await?;

        debug!(
            session = %self.session_id,
            command = %kind,
            failed = outcome.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );

        #[cfg(feature = "metrics")]
        {
            if let Some(metrics) = &self.metrics {
                metrics.record_command(kind.as_str(), started.elapsed().as_secs_f64());
                if outcome.failed {
                    metrics.record_failure(kind.as_str());
                }
                metrics.record_bytes(outcome.received, outcome.sent);
            }
        }

        Ok(flow)
    }

    async fn dispatch<S>(&mut self, stream: &mut ChunkStream<S>, command: Command) -> SessionResult<(Flow, Outcome)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut outcome = Outcome::default();

        let reply = match command.kind {
            CommandKind::Quit => {
                stream.send_reply(&Reply::Goodbye).await?;
                self.state = SessionState::Terminated;
                return Ok((Flow::Close, outcome));
            }

            CommandKind::Pwd => Reply::working_directory(self.workspace.cwd().display().to_string()),

            CommandKind::Syst => Reply::system(platform_string()),

            CommandKind::Cd => {
                let path = command.arg();
                match self.workspace.change_dir(path) {
                    Ok(cwd) => {
                        debug!(session = %self.session_id, cwd = %cwd.display(), "Directory changed");
                        Reply::DirectoryChanged
                    }
                    Err(e) => {
                        debug!(session = %self.session_id, error = %e, "CD failed");
                        outcome.failed = true;
                        Reply::no_such_directory(path)
                    }
                }
            }

            CommandKind::Size => match command.argument.as_deref().map(|p| self.workspace.file_size(p)) {
                Some(Ok(size)) => Reply::Size(size),
                Some(Err(e)) => {
                    debug!(session = %self.session_id, error = %e, "SIZE failed");
                    outcome.failed = true;
                    Reply::failure(Failure::OpenFile)
                }
                None => {
                    outcome.failed = true;
                    Reply::failure(Failure::OpenFile)
                }
            },

            CommandKind::Dir => {
                match send_listing(stream, self.workspace.cwd()).await? {
                    ListingOutcome::Sent { entries, bytes } => {
                        debug!(session = %self.session_id, entries, "Listing sent");
                        outcome.sent = bytes;
                    }
                    ListingOutcome::Rejected(_) => outcome.failed = true,
                }
                return Ok((Flow::Continue, outcome));
            }

            CommandKind::Get => {
                let Some(arg) = command.argument.as_deref() else {
                    outcome.failed = true;
                    stream.send_reply(&Reply::failure(Failure::OpenFile)).await?;
                    return Ok((Flow::Continue, outcome));
                };
                let path = self.workspace.resolve(arg);
                match send_file(stream, &path, |_| {}).await? {
                    TransferOutcome::Completed(report) => {
                        info!(session = %self.session_id, path = %path.display(), bytes = report.bytes, "File sent");
                        outcome.sent = report.bytes;
                    }
                    TransferOutcome::Rejected(_) => outcome.failed = true,
                }
                return Ok((Flow::Continue, outcome));
            }

            // The payload always follows PUT, so it is consumed even when
            // the file cannot be written. Exactly one reply follows it.
            CommandKind::Put => {
                let mode = self.config.scan_mode;
                match command.argument.as_deref() {
                    None => {
                        drain_payload(stream, FILE_SENTINEL, mode).await?;
                        outcome.failed = true;
                        Reply::failure(Failure::CreateFile)
                    }
                    Some(arg) => {
                        let path = self.workspace.resolve(arg);
                        match receive_file(stream, &path, mode, |_| {}).await? {
                            TransferOutcome::Completed(report) => {
                                info!(session = %self.session_id, path = %path.display(), bytes = report.bytes, "File received");
                                outcome.received = report.bytes;
                                Reply::TransferComplete
                            }
                            TransferOutcome::Rejected(e) => {
                                warn!(session = %self.session_id, path = %path.display(), error = %e, "Cannot store upload");
                                outcome.failed = true;
                                Reply::failure(Failure::CreateFile)
                            }
                        }
                    }
                }
            }
        };

        stream.send_reply(&reply).await?;
        Ok((Flow::Continue, outcome))
    }
}
