use fxlab_contracts::events::{EventLog, NodeEvent};
use fxlab_contracts::SessionId;

/// Per-invocation progress and event sink. Progress is advisory only.
#[derive(Debug, Clone)]
pub struct Reporter {
    node: String,
    session: SessionId,
    events: EventLog,
}

impl Reporter {
    pub fn new(node: impl Into<String>, session: SessionId, events: EventLog) -> Self {
        Self {
            node: node.into(),
            session,
            events,
        }
    }

    pub fn progress(&self, percent: u8) {
        let percent = percent.min(100);
        log::debug!("{} [{}] {percent}%", self.node, self.session);
        self.events.emit(
            &self.session,
            NodeEvent::Progress {
                node: self.node.clone(),
                percent,
            },
        );
    }

    pub fn record(&self, event: NodeEvent) {
        self.events.emit(&self.session, event);
    }
}
