use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::session::SessionId;

/// Structured record of what happened during one node invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    Progress {
        node: String,
        percent: u8,
    },
    CaptionDerived {
        role: String,
        chars: usize,
    },
    StoryboardDerived {
        chars: usize,
    },
    ImagesDecoded {
        requested: usize,
        decoded: usize,
        skipped: usize,
    },
    FallbackUsed {
        stage: String,
        reason: String,
    },
}

/// Append-only `events.jsonl` sink.
///
/// Each line is one compact object: `type`, `session_id`, `ts`, then the event
/// fields. A disabled log accepts and drops everything.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    inner: Option<Arc<EventLogInner>>,
}

#[derive(Debug)]
struct EventLogInner {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Some(Arc::new(EventLogInner {
                path: path.into(),
                lock: Mutex::new(()),
            })),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.as_ref().map(|inner| inner.path.as_path())
    }

    pub fn record(&self, session: &SessionId, event: &NodeEvent) -> anyhow::Result<Option<Value>> {
        let Some(inner) = self.inner.as_ref() else {
            return Ok(None);
        };

        let mut fields = match serde_json::to_value(event)? {
            Value::Object(fields) => fields,
            other => anyhow::bail!("event did not serialize to an object: {other}"),
        };
        let mut line = Map::new();
        if let Some(kind) = fields.remove("type") {
            line.insert("type".to_string(), kind);
        }
        line.insert(
            "session_id".to_string(),
            Value::String(session.as_str().to_string()),
        );
        line.insert("ts".to_string(), Value::String(now_utc_iso()));
        line.extend(fields);

        if let Some(parent) = inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_string(&line)?;
        let _guard = inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&inner.path)?;
        file.write_all(encoded.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Some(Value::Object(line)))
    }

    /// Like [`EventLog::record`], but a write failure only produces a log line.
    pub fn emit(&self, session: &SessionId, event: NodeEvent) {
        if let Err(err) = self.record(session, &event) {
            log::warn!("failed to record event: {err:#}");
        }
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
