use std::fmt;
use std::time::Instant;

use regstep_core::{EntityId, EntityKind};

/// Status of a handler in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandlerStatus {
    /// Handler started but has not finished.
    Running,
    /// A new entity was inserted.
    Inserted,
    /// A preloaded entity was updated.
    Updated,
    /// Update handler found nothing to update and inserted instead.
    InsertedInsteadOfUpdate,
    /// Handler decided there was nothing to persist.
    Skipped,
    /// Persistence ran but returned no entity.
    NothingProduced,
    /// Persistence failed.
    Failed,
    /// The handler's effect was undone during rollback.
    Compensated,
    /// Undoing the handler's effect failed.
    CompensationFailed,
}

impl HandlerStatus {
    fn symbol(self) -> &'static str {
        match self {
            Self::Running => "…",
            Self::Inserted | Self::Updated | Self::InsertedInsteadOfUpdate => "✓",
            Self::Skipped | Self::NothingProduced => "-",
            Self::Failed => "✗",
            Self::Compensated => "↩",
            Self::CompensationFailed => "⚠",
        }
    }
}

/// Severity of a handler message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageLevel {
    /// Normal progress, such as an inserted or updated row.
    Info,
    /// The handler fell back or skipped work.
    Warning,
    /// Persisting or compensating the entity failed.
    Error,
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Message recorded while a handler ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerMessage {
    /// Severity.
    pub level: MessageLevel,
    /// Human-readable text.
    pub text: String,
}

/// Record of one handler's run.
#[derive(Debug)]
pub struct HandlerRecord {
    /// Entity kind the handler persists.
    pub kind: EntityKind,
    /// Table the handler wrote to.
    pub table: String,
    /// Current status.
    pub status: HandlerStatus,
    /// Id of the entity the handler produced, if any.
    pub entity_id: Option<EntityId>,
    /// Messages in the order they were recorded.
    pub messages: Vec<HandlerMessage>,
    /// When the handler started.
    pub started_at: Instant,
    /// When the handler finished (persistence or compensation).
    pub completed_at: Option<Instant>,
}

/// Audit log of a chain run.
#[derive(Debug, Default)]
pub struct ChainAuditLog {
    records: Vec<HandlerRecord>,
}

impl ChainAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&mut self, kind: EntityKind, table: &str) {
        self.records.push(HandlerRecord {
            kind,
            table: table.to_string(),
            status: HandlerStatus::Running,
            entity_id: None,
            messages: Vec::new(),
            started_at: Instant::now(),
            completed_at: None,
        });
    }

    /// Attach a message to the handler currently running.
    pub(crate) fn message(&mut self, level: MessageLevel, text: impl Into<String>) {
        if let Some(record) = self.records.last_mut() {
            record.messages.push(HandlerMessage {
                level,
                text: text.into(),
            });
        }
    }

    pub(crate) fn record_finish(&mut self, status: HandlerStatus, entity_id: Option<EntityId>) {
        if let Some(record) = self.records.last_mut() {
            record.status = status;
            record.entity_id = entity_id;
            record.completed_at = Some(Instant::now());
        }
    }

    pub(crate) fn record_compensated(&mut self, kind: EntityKind) {
        self.set_status(kind, HandlerStatus::Compensated);
    }

    pub(crate) fn record_compensation_failed(&mut self, kind: EntityKind, message: String) {
        self.set_status(kind, HandlerStatus::CompensationFailed);
        if let Some(record) = self.records.iter_mut().find(|r| r.kind == kind) {
            record.messages.push(HandlerMessage {
                level: MessageLevel::Error,
                text: message,
            });
        }
    }

    fn set_status(&mut self, kind: EntityKind, status: HandlerStatus) {
        for record in &mut self.records {
            if record.kind == kind {
                record.status = status;
                record.completed_at = Some(Instant::now());
            }
        }
    }

    #[must_use]
    pub fn records(&self) -> &[HandlerRecord] {
        &self.records
    }

    #[must_use]
    pub fn record(&self, kind: EntityKind) -> Option<&HandlerRecord> {
        self.records.iter().find(|r| r.kind == kind)
    }

    /// All messages of one level, in the order they were logged.
    #[must_use]
    pub fn messages(&self, level: MessageLevel) -> Vec<&str> {
        self.records
            .iter()
            .flat_map(|r| r.messages.iter())
            .filter(|m| m.level == level)
            .map(|m| m.text.as_str())
            .collect()
    }

    #[must_use]
    pub fn failed_kinds(&self) -> Vec<EntityKind> {
        self.records
            .iter()
            .filter(|r| r.status == HandlerStatus::Failed)
            .map(|r| r.kind)
            .collect()
    }

    /// One line per handler for display.
    #[must_use]
    pub fn summary(&self) -> String {
        self.records
            .iter()
            .map(|record| format!("{} {}", record.status.symbol(), record.kind))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
