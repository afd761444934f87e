//! Event sinks
//!
//! Consumers of triggers, warnings and per-tick status. Delivery is
//! fire-and-forget: the engine calls each hook at most once per event, logs a
//! failure and moves on.

use crate::error::SinkError;
use crate::types::{StatusReport, TriggerEvent, WarningMessage};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

/// Any event the engine produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Trigger(TriggerEvent),
    Warning(WarningMessage),
    Status(StatusReport),
}

/// Consumer of engine events; implementations must not block
pub trait EventSink: Send {
    fn on_trigger(&mut self, event: &TriggerEvent) -> Result<(), SinkError>;

    fn on_warning(&mut self, warning: &WarningMessage) -> Result<(), SinkError>;

    fn on_status(&mut self, _status: &StatusReport) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes events to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_trigger(&mut self, event: &TriggerEvent) -> Result<(), SinkError> {
        info!(
            "protocol triggered (score {:.2}): {}",
            event.score, event.reason
        );
        Ok(())
    }

    fn on_warning(&mut self, warning: &WarningMessage) -> Result<(), SinkError> {
        info!("{}", warning.message);
        Ok(())
    }

    fn on_status(&mut self, status: &StatusReport) -> Result<(), SinkError> {
        debug!(
            "score {:.2} (raw {:.2}, baseline {:.1})",
            status.score, status.raw, status.baseline
        );
        Ok(())
    }
}

/// Forwards events over an unbounded channel without waiting on the receiver
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<EngineEvent>,
    include_status: bool,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<EngineEvent>) -> Self {
        Self {
            tx,
            include_status: false,
        }
    }

    /// Also forward per-tick status reports
    pub fn with_status(mut self) -> Self {
        self.include_status = true;
        self
    }

    fn send(&self, event: EngineEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::Closed)
    }
}

impl EventSink for ChannelSink {
    fn on_trigger(&mut self, event: &TriggerEvent) -> Result<(), SinkError> {
        self.send(EngineEvent::Trigger(event.clone()))
    }

    fn on_warning(&mut self, warning: &WarningMessage) -> Result<(), SinkError> {
        self.send(EngineEvent::Warning(warning.clone()))
    }

    fn on_status(&mut self, status: &StatusReport) -> Result<(), SinkError> {
        if self.include_status {
            self.send(EngineEvent::Status(*status))
        } else {
            Ok(())
        }
    }
}

/// Collects events in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
    include_status: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self) -> Self {
        self.include_status = true;
        self
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<EngineEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Remove and return everything recorded so far
    pub fn drain(&self) -> Vec<EngineEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn triggers(&self) -> Vec<TriggerEvent> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Trigger(trigger) => Some(trigger),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<WarningMessage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Warning(warning) => Some(warning),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: EngineEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl EventSink for MemorySink {
    fn on_trigger(&mut self, event: &TriggerEvent) -> Result<(), SinkError> {
        self.push(EngineEvent::Trigger(event.clone()));
        Ok(())
    }

    fn on_warning(&mut self, warning: &WarningMessage) -> Result<(), SinkError> {
        self.push(EngineEvent::Warning(warning.clone()));
        Ok(())
    }

    fn on_status(&mut self, status: &StatusReport) -> Result<(), SinkError> {
        if self.include_status {
            self.push(EngineEvent::Status(*status));
        }
        Ok(())
    }
}

/// Writes one JSON event per line
pub struct NdjsonSink<W: Write + Send> {
    writer: W,
    include_status: bool,
}

impl<W: Write + Send> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            include_status: false,
        }
    }

    pub fn with_status(mut self) -> Self {
        self.include_status = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, event: &EngineEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(event)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> EventSink for NdjsonSink<W> {
    fn on_trigger(&mut self, event: &TriggerEvent) -> Result<(), SinkError> {
        self.write(&EngineEvent::Trigger(event.clone()))
    }

    fn on_warning(&mut self, warning: &WarningMessage) -> Result<(), SinkError> {
        self.write(&EngineEvent::Warning(warning.clone()))
    }

    fn on_status(&mut self, status: &StatusReport) -> Result<(), SinkError> {
        if self.include_status {
            self.write(&EngineEvent::Status(*status))
        } else {
            Ok(())
        }
    }
}

/// Delivers every event to each inner sink; one failing sink does not starve the rest
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    fn deliver(
        &mut self,
        mut call: impl FnMut(&mut dyn EventSink) -> Result<(), SinkError>,
    ) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in self.sinks.iter_mut() {
            if let Err(err) = call(sink.as_mut()) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl EventSink for FanoutSink {
    fn on_trigger(&mut self, event: &TriggerEvent) -> Result<(), SinkError> {
        self.deliver(|sink| sink.on_trigger(event))
    }

    fn on_warning(&mut self, warning: &WarningMessage) -> Result<(), SinkError> {
        self.deliver(|sink| sink.on_warning(warning))
    }

    fn on_status(&mut self, status: &StatusReport) -> Result<(), SinkError> {
        self.deliver(|sink| sink.on_status(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WarningTier;
    use chrono::{TimeZone, Utc};

    fn trigger() -> TriggerEvent {
        TriggerEvent::new(
            "Productivity detected: visual 0.75",
            0.72,
            Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap(),
        )
    }

    struct ClosedSink;

    impl EventSink for ClosedSink {
        fn on_trigger(&mut self, _event: &TriggerEvent) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }

        fn on_warning(&mut self, _warning: &WarningMessage) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    #[test]
    fn test_ndjson_lines_are_tagged() {
        let mut sink = NdjsonSink::new(Vec::new());
        sink.on_trigger(&trigger()).unwrap();
        sink.on_warning(&WarningMessage {
            level: 0.3,
            tier: WarningTier::Elevated,
            message: "levels rising".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap(),
        })
        .unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "trigger");
        assert_eq!(first["score"], 0.72);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["type"], "warning");
        assert_eq!(second["tier"], "elevated");
    }

    #[test]
    fn test_channel_sink_reports_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let mut sink = ChannelSink::new(tx);

        assert!(sink.on_trigger(&trigger()).is_ok());
        drop(rx);
        assert!(matches!(sink.on_trigger(&trigger()), Err(SinkError::Closed)));
    }

    #[test]
    fn test_fanout_keeps_delivering_after_failure() {
        let memory = MemorySink::new();
        let mut sink = FanoutSink::new().with(ClosedSink).with(memory.clone());

        assert!(sink.on_trigger(&trigger()).is_err());
        assert_eq!(memory.triggers().len(), 1);
    }

    #[test]
    fn test_memory_sink_drain() {
        let mut sink = MemorySink::new();
        sink.on_trigger(&trigger()).unwrap();

        assert_eq!(sink.drain().len(), 1);
        assert!(sink.events().is_empty());
    }
}
