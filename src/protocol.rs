//! Wire messages exchanged with the UI layer, and the reporter that emits
//! them.
//!
//! Inbound commands and outbound status events keep the `{type: ...}` JSON
//! shape the UI already speaks. Outbound events additionally carry an
//! optional structured [`RunEvent`] so consumers (and tests) can key off
//! phase/row/section/outcome instead of parsing message strings.

use crate::model::RunSummary;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Commands accepted on the inbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiCommand {
    #[serde(rename_all = "camelCase")]
    StartGeneration {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        spreadsheet_id: Option<String>,
        #[serde(default)]
        delete_master_templates: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    TestConnection {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        spreadsheet_id: Option<String>,
    },
    DeleteMasterTemplates,
    Cancel,
}

/// Severity of an outbound status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Ready,
    Status,
    Warning,
    Error,
    Success,
}

/// Pipeline phase a [`RunEvent`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Validate,
    Catalog,
    Fonts,
    Fetch,
    Row,
    Section,
    Cleanup,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Started,
    Completed,
    Skipped,
    Failed,
}

/// Structured record attached to a status event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub outcome: Outcome,
}

impl RunEvent {
    pub fn new(phase: Phase, outcome: Outcome) -> Self {
        Self {
            phase,
            row_index: None,
            section: None,
            outcome,
        }
    }

    pub fn row(mut self, index: usize) -> Self {
        self.row_index = Some(index);
        self
    }

    pub fn section(mut self, name: impl Into<String>) -> Self {
        self.section = Some(name.into());
        self
    }
}

/// One outbound message to the UI layer. Purely observational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<RunEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

impl StatusEvent {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            event: None,
            summary: None,
        }
    }

    pub fn with_event(mut self, event: RunEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_summary(mut self, summary: RunSummary) -> Self {
        self.summary = Some(summary);
        self
    }
}

/// Sends status events to the UI layer and mirrors them into the log.
///
/// A dropped receiver never fails the pipeline: generation keeps running and
/// the events still land in the log.
#[derive(Clone)]
pub struct Reporter {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl Reporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, event: StatusEvent) {
        match event.kind {
            StatusKind::Warning => tracing::warn!(message = %event.message, "status"),
            StatusKind::Error => tracing::error!(message = %event.message, "status"),
            _ => tracing::info!(message = %event.message, "status"),
        }
        let _ = self.tx.send(event);
    }

    pub fn ready(&self) {
        self.send(StatusEvent::new(StatusKind::Ready, "ready"));
    }

    pub fn status(&self, message: impl Into<String>) {
        self.send(StatusEvent::new(StatusKind::Status, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.send(StatusEvent::new(StatusKind::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(StatusEvent::new(StatusKind::Error, message));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.send(StatusEvent::new(StatusKind::Success, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_command_parses_the_ui_wire_shape() {
        let command: UiCommand = serde_json::from_str(
            r#"{"type": "start-generation", "apiKey": "k", "spreadsheetId": "s",
                "deleteMasterTemplates": true}"#,
        )
        .unwrap();
        assert_eq!(
            command,
            UiCommand::StartGeneration {
                api_key: Some("k".to_string()),
                spreadsheet_id: Some("s".to_string()),
                delete_master_templates: Some(true),
            }
        );
    }

    #[test]
    fn bare_commands_parse_without_fields() {
        let cancel: UiCommand = serde_json::from_str(r#"{"type": "cancel"}"#).unwrap();
        assert_eq!(cancel, UiCommand::Cancel);

        let delete: UiCommand =
            serde_json::from_str(r#"{"type": "delete-master-templates"}"#).unwrap();
        assert_eq!(delete, UiCommand::DeleteMasterTemplates);
    }

    #[test]
    fn status_events_serialize_with_a_type_tag() {
        let event = StatusEvent::new(StatusKind::Warning, "Row 3 failed")
            .with_event(RunEvent::new(Phase::Row, Outcome::Failed).row(3));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "warning");
        assert_eq!(json["message"], "Row 3 failed");
        assert_eq!(json["event"]["phase"], "row");
        assert_eq!(json["event"]["row_index"], 3);
        assert_eq!(json["event"]["outcome"], "failed");
        assert!(json.get("summary").is_none());
    }

    #[test]
    fn reporter_delivers_in_order() {
        let (reporter, mut rx) = Reporter::channel();
        reporter.status("one");
        reporter.warning("two");
        assert_eq!(rx.blocking_recv().unwrap().message, "one");
        let second = rx.blocking_recv().unwrap();
        assert_eq!(second.kind, StatusKind::Warning);
        assert_eq!(second.message, "two");
    }
}
