use aria_core::tap::{encode_frame, CommandPayload, DecodeReport};
use aria_core::{Command, CommandSink, ConsoleState, SendError, TapEnvelope, TapMsg};
use tracing::{debug, warn};

/// Buffers outbound tap frames until the driver flushes them to stdout.
pub struct FrameSink {
    session_id: String,
    max_frame_bytes: usize,
    require_connection: bool,
    connected: bool,
    pending: Vec<Vec<u8>>,
}

impl FrameSink {
    pub fn new(session_id: &str, max_frame_bytes: usize, require_connection: bool) -> Self {
        Self {
            session_id: session_id.to_string(),
            max_frame_bytes,
            require_connection,
            connected: false,
            pending: Vec::new(),
        }
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn push_snapshot(&mut self, state: &ConsoleState) {
        let msg = TapMsg::Snapshot(Box::new(state.snapshot()));
        if let Err(err) = self.push(msg) {
            warn!(event = "snapshot_dropped", error = %err);
        }
    }

    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending)
    }

    fn push(&mut self, msg: TapMsg) -> Result<(), SendError> {
        let envelope = TapEnvelope::new(&self.session_id, msg);
        let frame = encode_frame(&envelope, self.max_frame_bytes)
            .map_err(|err| SendError::Transport(err.to_string()))?;
        self.pending.push(frame);
        Ok(())
    }
}

impl CommandSink for FrameSink {
    fn send(&mut self, command: &Command) -> Result<(), SendError> {
        if self.require_connection && !self.connected {
            return Err(SendError::NotConnected);
        }
        self.push(TapMsg::Command(CommandPayload::from(command)))
    }
}

/// Applies every decoded frame in arrival order. Malformed lines are logged
/// and skipped.
pub fn process(
    state: &mut ConsoleState,
    sink: &mut FrameSink,
    report: DecodeReport,
    emit_snapshots: bool,
) -> usize {
    for err in &report.errors {
        warn!(event = "tap_frame_dropped", error = %err);
    }

    let mut applied = 0;
    for envelope in report.frames {
        let Some(event) = envelope.msg.into_event() else {
            debug!(event = "tap_outbound_ignored");
            continue;
        };
        sink.set_connected(state.connection().is_connected());
        state.handle(event, sink);
        applied += 1;
        if emit_snapshots {
            sink.push_snapshot(state);
        }
    }
    applied
}
