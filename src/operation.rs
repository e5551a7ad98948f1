//! Operation lifecycle
//!
//! A [`Session`] owns everything one encrypt or decrypt card needs: the
//! selected technique, the raw artifacts the user supplied, and the current
//! [`OperationState`]. Each state carries only the data valid for it, so a
//! result and an error can never be held at the same time.
//!
//! ```text
//! Idle -> Validating -> Requesting -> Succeeded
//!              \             \------> Failed
//!               \--------------------> Failed
//! ```
//!
//! Validation is synchronous; the service call is the only suspension point.
//! If a `run` future is dropped while the call is outstanding, the session
//! ends up `Failed` with a transport reason.
//! Changing any input moves a finished session back to `Idle`.

use std::io;
use std::path::Path;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::artifact::{self, ArtifactKind, ContentArtifact, KeyMaterial};
use crate::client::{CryptoService, TRANSPORT_REASON};
use crate::error::{CryptdeskError, ErrorCategory, ErrorKind, Result};
use crate::outcome::OperationResult;
use crate::package::{self, DownloadableArtifact};
use crate::request::{self, OperationRequest};
use crate::technique::{Mode, Technique};

/// Which user-supplied artifact a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Content,
    Key,
}

/// Identifies one read into a slot. Only the most recently issued ticket for
/// a slot is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket {
    slot: Slot,
    generation: u64,
}

impl ReadTicket {
    pub fn slot(&self) -> Slot {
        self.slot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Requesting,
    Succeeded,
    Failed,
}

#[derive(Debug)]
pub enum OperationState {
    Idle,
    Validating,
    Requesting,
    Succeeded {
        result: OperationResult,
        artifacts: Vec<DownloadableArtifact>,
    },
    Failed {
        error: CryptdeskError,
    },
}

impl OperationState {
    pub fn phase(&self) -> Phase {
        match self {
            OperationState::Idle => Phase::Idle,
            OperationState::Validating => Phase::Validating,
            OperationState::Requesting => Phase::Requesting,
            OperationState::Succeeded { .. } => Phase::Succeeded,
            OperationState::Failed { .. } => Phase::Failed,
        }
    }

    pub fn result(&self) -> Option<&OperationResult> {
        match self {
            OperationState::Succeeded { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Downloadable outputs; empty unless the operation succeeded.
    pub fn artifacts(&self) -> &[DownloadableArtifact] {
        match self {
            OperationState::Succeeded { artifacts, .. } => artifacts,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&CryptdeskError> {
        match self {
            OperationState::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum SlotState {
    Empty,
    Loaded {
        filename: String,
        bytes: Zeroizing<Vec<u8>>,
    },
    Unreadable {
        category: ErrorCategory,
        message: String,
    },
}

#[derive(Debug)]
struct ArtifactSlot {
    generation: u64,
    state: SlotState,
}

impl ArtifactSlot {
    fn new() -> Self {
        Self {
            generation: 0,
            state: SlotState::Empty,
        }
    }

    /// Invalidate any outstanding read and empty the slot.
    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        self.state = SlotState::Empty;
        self.generation
    }
}

pub struct Session<S> {
    mode: Mode,
    service: S,
    technique: Option<Technique>,
    content: ArtifactSlot,
    key: ArtifactSlot,
    state: OperationState,
    trail: Vec<Phase>,
}

impl<S: CryptoService> Session<S> {
    pub fn new(mode: Mode, service: S) -> Self {
        Self {
            mode,
            service,
            technique: None,
            content: ArtifactSlot::new(),
            key: ArtifactSlot::new(),
            state: OperationState::Idle,
            trail: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn technique(&self) -> Option<Technique> {
        self.technique
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn state(&self) -> &OperationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn into_state(self) -> OperationState {
        self.state
    }

    /// Phases entered by the most recent operation, starting with `Idle`.
    pub fn trail(&self) -> &[Phase] {
        &self.trail
    }

    /// False while a request is in flight.
    pub fn can_trigger(&self) -> bool {
        !matches!(self.state, OperationState::Requesting)
    }

    /// Select (or clear) the technique. The key artifact is discarded, since
    /// its expected shape depends on the technique.
    pub fn select_technique(&mut self, technique: Option<Technique>) {
        if self.technique != technique {
            self.key.supersede();
        }
        self.technique = technique;
        self.reset();
    }

    /// Start reading a new artifact into `slot`. Any earlier read into the
    /// same slot that has not completed yet will be ignored when it does.
    pub fn begin_read(&mut self, slot: Slot) -> ReadTicket {
        let generation = self.slot_mut(slot).supersede();
        self.reset();
        ReadTicket { slot, generation }
    }

    /// Deliver the outcome of a read. Returns false if the read was
    /// superseded and its result discarded.
    pub fn complete_read(
        &mut self,
        ticket: ReadTicket,
        filename: impl Into<String>,
        read: io::Result<Vec<u8>>,
    ) -> bool {
        let filename = filename.into();
        let slot = self.slot_mut(ticket.slot);
        if slot.generation != ticket.generation {
            debug!(slot = ?ticket.slot, %filename, "discarding superseded artifact read");
            return false;
        }

        slot.state = match read {
            Ok(bytes) => SlotState::Loaded {
                filename,
                bytes: Zeroizing::new(bytes),
            },
            Err(e) => {
                let category = if e.kind() == io::ErrorKind::NotFound {
                    ErrorCategory::User
                } else {
                    ErrorCategory::Internal
                };
                SlotState::Unreadable {
                    category,
                    message: format!("failed to read from {}: {}", filename, e),
                }
            }
        };
        self.reset();
        true
    }

    /// Read `path` into `slot`.
    pub async fn load(&mut self, slot: Slot, path: &Path) -> bool {
        let ticket = self.begin_read(slot);
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let read = tokio::fs::read(path).await;
        self.complete_read(ticket, filename, read)
    }

    /// Run one operation to completion.
    ///
    /// Prior results and errors are cleared, inputs are validated, and only
    /// if validation passes is the service called, exactly once. Refused with
    /// [`ErrorKind::Busy`] while a request is already in flight.
    pub async fn run(&mut self) -> Result<&OperationState> {
        if !self.can_trigger() {
            warn!(mode = %self.mode, "operation already in flight, ignoring trigger");
            return Err(CryptdeskError::with_kind(
                ErrorCategory::User,
                ErrorKind::Busy,
                "an operation is already in progress",
            ));
        }

        self.trail.clear();
        self.enter(OperationState::Idle);
        self.enter(OperationState::Validating);

        let request = match self.validate() {
            Ok(request) => request,
            Err(error) => {
                self.fail(error);
                return Ok(&self.state);
            }
        };

        self.enter(OperationState::Requesting);
        let outcome = {
            let guard = InFlight {
                state: &mut self.state,
                trail: &mut self.trail,
                armed: true,
            };
            let outcome = self.service.execute(&request).await;
            guard.disarm();
            outcome
        };
        match outcome {
            Ok(result) => {
                let artifacts = package::package(&result);
                info!(
                    mode = %self.mode,
                    technique = %request.technique(),
                    artifacts = artifacts.len(),
                    "operation succeeded"
                );
                self.enter(OperationState::Succeeded { result, artifacts });
            }
            Err(error) => self.fail(error),
        }
        Ok(&self.state)
    }

    fn validate(&self) -> Result<OperationRequest> {
        let content = self.parse_content()?;
        let key = match (&content, self.mode, self.technique) {
            (Some(_), Mode::Decrypt, Some(technique)) => self.parse_key(technique)?,
            _ => None,
        };
        request::build_request(self.mode, content.as_ref(), self.technique, key.as_ref())
    }

    fn parse_content(&self) -> Result<Option<ContentArtifact>> {
        let kind = match self.mode {
            Mode::Encrypt => ArtifactKind::PlaintextContent,
            Mode::Decrypt => ArtifactKind::EncryptedContent,
        };
        match &self.content.state {
            SlotState::Empty => Ok(None),
            SlotState::Loaded { filename, bytes } => {
                artifact::parse_content(bytes, filename, kind).map(Some)
            }
            SlotState::Unreadable { category, message } => Err(unreadable(*category, message)),
        }
    }

    fn parse_key(&self, technique: Technique) -> Result<Option<KeyMaterial>> {
        match &self.key.state {
            SlotState::Empty => Ok(None),
            SlotState::Loaded { filename, bytes } => {
                artifact::parse_key_material(bytes, filename, technique).map(Some)
            }
            SlotState::Unreadable { category, message } => Err(unreadable(*category, message)),
        }
    }

    fn enter(&mut self, state: OperationState) {
        self.trail.push(state.phase());
        self.state = state;
    }

    fn fail(&mut self, error: CryptdeskError) {
        info!(mode = %self.mode, reason = %error, "operation failed");
        self.enter(OperationState::Failed { error });
    }

    /// Drop a finished result or error. An in-flight request is left alone.
    fn reset(&mut self) {
        if matches!(
            self.state,
            OperationState::Succeeded { .. } | OperationState::Failed { .. }
        ) {
            self.state = OperationState::Idle;
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut ArtifactSlot {
        match slot {
            Slot::Content => &mut self.content,
            Slot::Key => &mut self.key,
        }
    }
}

/// Held across the service call. If the `run` future is dropped before the
/// call completes, the session is moved to `Failed` so it can be triggered
/// again.
struct InFlight<'a> {
    state: &'a mut OperationState,
    trail: &'a mut Vec<Phase>,
    armed: bool,
}

impl InFlight<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("crypto service request abandoned before completing");
            *self.state = OperationState::Failed {
                error: CryptdeskError::with_kind(
                    ErrorCategory::Service,
                    ErrorKind::TransportFailure,
                    TRANSPORT_REASON,
                ),
            };
            self.trail.push(Phase::Failed);
        }
    }
}

fn unreadable(category: ErrorCategory, message: &str) -> CryptdeskError {
    CryptdeskError::with_kind(category, ErrorKind::UnreadableArtifact, message)
}
