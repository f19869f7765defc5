//! Single owner of everything the supervisory console displays.
//!
//! Every input (transcript snapshots, insight messages, form actions,
//! connection changes) is a [`ConsoleEvent`] applied one at a time through
//! [`ConsoleState::apply`]. The returned commands are what the caller must
//! push onto the session channel.

use crate::command::{ClaimDraft, Command, DraftField, LookupForm};
use crate::insight::InsightState;
use crate::interpreter::{interpret, ClaimOutcome, Extraction};
use crate::session::{format_duration, CommandSink, ConnectionState, SendError, SessionConfig};
use crate::transcript::{ConversationLog, Segment, TranscriptMerger};
use crate::{Claim, Contract, CustomerRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    AgentTranscript(Vec<Segment>),
    UserTranscript(Vec<Segment>),
    InsightReceived(Vec<u8>),
    LookupSubmitted(LookupForm),
    ListContractsRequested,
    ListClaimsRequested,
    DraftEdited { field: DraftField, value: String },
    ClaimSubmitted,
    SendFailed(SendError),
    ConnectRequested,
    Connected { at: DateTime<Utc> },
    ConnectFailed(String),
    Disconnected,
    Tick,
}

impl ConsoleEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentTranscript(_) => "agent_transcript",
            Self::UserTranscript(_) => "user_transcript",
            Self::InsightReceived(_) => "insight_received",
            Self::LookupSubmitted(_) => "lookup_submitted",
            Self::ListContractsRequested => "list_contracts",
            Self::ListClaimsRequested => "list_claims",
            Self::DraftEdited { .. } => "draft_edited",
            Self::ClaimSubmitted => "claim_submitted",
            Self::SendFailed(_) => "send_failed",
            Self::ConnectRequested => "connect_requested",
            Self::Connected { .. } => "connected",
            Self::ConnectFailed(_) => "connect_failed",
            Self::Disconnected => "disconnected",
            Self::Tick => "tick",
        }
    }
}

/// Read-only copy handed to the rendering side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleSnapshot {
    pub identity: String,
    pub room_name: String,
    pub connection: ConnectionState,
    pub call_duration: String,
    pub conversation: ConversationLog,
    pub customer: Option<CustomerRecord>,
    pub contracts: Vec<Contract>,
    pub claims: Vec<Claim>,
    pub draft: ClaimDraft,
    pub notice: Option<String>,
    pub insights: InsightState,
}

#[derive(Debug, Clone, Default)]
pub struct ConsoleState {
    session: SessionConfig,
    connection: ConnectionState,
    call_seconds: u64,
    transcript: TranscriptMerger,
    customer: Option<CustomerRecord>,
    contracts: Vec<Contract>,
    claims: Vec<Claim>,
    draft: ClaimDraft,
    notice: Option<String>,
    insights: InsightState,
}

impl ConsoleState {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, event: ConsoleEvent) -> Vec<Command> {
        debug!(event = "console_event", kind = event.kind());
        match event {
            ConsoleEvent::AgentTranscript(segments) => {
                for utterance in self.transcript.replace_agent(segments) {
                    self.interpret_agent_output(&utterance.text);
                }
                Vec::new()
            }
            ConsoleEvent::UserTranscript(segments) => {
                self.transcript.replace_user(segments);
                Vec::new()
            }
            ConsoleEvent::InsightReceived(bytes) => {
                self.insights.receive(&bytes);
                Vec::new()
            }
            ConsoleEvent::LookupSubmitted(form) => match form.to_command() {
                Ok(command) => {
                    self.set_customer(None);
                    vec![command]
                }
                Err(err) => {
                    debug!(event = "lookup_skipped", reason = %err);
                    Vec::new()
                }
            },
            ConsoleEvent::ListContractsRequested => {
                self.validated(Command::list_contracts(self.has_customer_id()))
            }
            ConsoleEvent::ListClaimsRequested => {
                self.validated(Command::list_claims(self.has_customer_id()))
            }
            ConsoleEvent::DraftEdited { field, value } => {
                self.draft.set(field, value);
                Vec::new()
            }
            ConsoleEvent::ClaimSubmitted => {
                let command = self.draft.to_command();
                self.validated(command)
            }
            ConsoleEvent::SendFailed(err) => {
                warn!(event = "command_send_failed", error = %err);
                self.notice = Some(err.to_string());
                Vec::new()
            }
            ConsoleEvent::ConnectRequested => {
                self.connection = ConnectionState::Connecting;
                Vec::new()
            }
            ConsoleEvent::Connected { at } => {
                info!(event = "session_connected", identity = %self.session.identity);
                self.connection = ConnectionState::Connected { since: at };
                self.call_seconds = 0;
                Vec::new()
            }
            ConsoleEvent::ConnectFailed(reason) => {
                warn!(event = "session_connect_failed", reason = %reason);
                self.connection = ConnectionState::Failed { reason };
                Vec::new()
            }
            ConsoleEvent::Disconnected => {
                info!(event = "session_disconnected", call_seconds = self.call_seconds);
                self.connection = ConnectionState::Idle;
                Vec::new()
            }
            ConsoleEvent::Tick => {
                if self.connection.is_connected() {
                    self.call_seconds += 1;
                }
                Vec::new()
            }
        }
    }

    /// Applies `event` and pushes the resulting commands through `sink`.
    /// A rejected send only becomes a notice. Returns how many commands the
    /// sink accepted.
    pub fn handle<S: CommandSink + ?Sized>(&mut self, event: ConsoleEvent, sink: &mut S) -> usize {
        let mut sent = 0;
        for command in self.apply(event) {
            match sink.send(&command) {
                Ok(()) => {
                    info!(event = "command_sent", command = command.name());
                    sent += 1;
                }
                Err(err) => {
                    self.apply(ConsoleEvent::SendFailed(err));
                }
            }
        }
        sent
    }

    fn interpret_agent_output(&mut self, text: &str) {
        self.notice = None;
        let Some(extraction) = interpret(text) else {
            return;
        };
        match extraction {
            Extraction::Record {
                customer,
                contracts,
                claims,
            } => {
                self.customer = Some(customer);
                self.contracts = contracts;
                self.claims = claims;
            }
            Extraction::Contracts(contracts) => {
                if !contracts.is_empty() {
                    self.contracts = contracts;
                }
            }
            Extraction::Claims(claims) => {
                if !claims.is_empty() {
                    self.claims = claims;
                }
            }
            Extraction::ClaimOutcome { outcome, notice } => {
                if outcome == ClaimOutcome::Created {
                    self.draft.clear();
                }
                self.notice = Some(notice);
            }
            Extraction::LineRecord(customer) => self.set_customer(Some(customer)),
        }
    }

    fn set_customer(&mut self, customer: Option<CustomerRecord>) {
        self.customer = customer;
        self.contracts.clear();
        self.claims.clear();
    }

    fn validated<E: std::fmt::Display>(&mut self, command: Result<Command, E>) -> Vec<Command> {
        match command {
            Ok(command) => vec![command],
            Err(err) => {
                self.notice = Some(err.to_string());
                Vec::new()
            }
        }
    }

    fn has_customer_id(&self) -> bool {
        self.customer.as_ref().is_some_and(CustomerRecord::has_id)
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn call_seconds(&self) -> u64 {
        self.call_seconds
    }

    pub fn conversation(&self) -> &ConversationLog {
        self.transcript.log()
    }

    pub fn customer(&self) -> Option<&CustomerRecord> {
        self.customer.as_ref()
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn draft(&self) -> &ClaimDraft {
        &self.draft
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn insights(&self) -> &InsightState {
        &self.insights
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        ConsoleSnapshot {
            identity: self.session.identity.clone(),
            room_name: self.session.room_name.clone(),
            connection: self.connection.clone(),
            call_duration: format_duration(self.call_seconds),
            conversation: self.transcript.log().clone(),
            customer: self.customer.clone(),
            contracts: self.contracts.clone(),
            claims: self.claims.clone(),
            draft: self.draft.clone(),
            notice: self.notice.clone(),
            insights: self.insights.clone(),
        }
    }
}
