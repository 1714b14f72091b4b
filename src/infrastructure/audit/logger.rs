/// Event sinks for call lifecycle records
use crate::domain::call::event::{EventKind, TerminationEvent};
use crate::domain::call::port::{EventSink, SinkError};
use crate::domain::call::value_object::CallState;
use crate::domain::shared::events::{iso_timestamp, DomainEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Writes every record as one JSON line through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for TracingEventSink {
    async fn record(&self, event: &TerminationEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(event).map_err(|e| SinkError(e.to_string()))?;

        let event_type = event.event_type();
        let occurred_at = iso_timestamp(event.occurred_at());
        match event.event {
            EventKind::CallError => error!(target: "callkeeper::events", event_type, %occurred_at, "{}", line),
            _ => info!(target: "callkeeper::events", event_type, %occurred_at, "{}", line),
        }

        Ok(())
    }
}

/// Query filters for recorded events
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub kind: Option<EventKind>,
    pub state: Option<CallState>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// In-memory event sink
pub struct MemoryEventSink {
    events: Arc<RwLock<VecDeque<TerminationEvent>>>,
    max_events: usize,
}

impl MemoryEventSink {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(VecDeque::new())),
            max_events,
        }
    }

    pub async fn query(&self, filters: EventQuery) -> Vec<TerminationEvent> {
        let events = self.events.read().await;
        let results = events.iter().filter(|event| {
            // Filter by time range
            if let Some(start) = filters.start_time {
                if event.occurred_at() < start {
                    return false;
                }
            }
            if let Some(end) = filters.end_time {
                if event.occurred_at() > end {
                    return false;
                }
            }

            if let Some(kind) = filters.kind {
                if event.event != kind {
                    return false;
                }
            }

            if let Some(state) = filters.state {
                if event.state != state {
                    return false;
                }
            }

            true
        });

        match filters.limit {
            Some(limit) => results.take(limit).cloned().collect(),
            None => results.cloned().collect(),
        }
    }

    /// Every retained event in arrival order
    pub async fn events(&self) -> Vec<TerminationEvent> {
        self.events.read().await.iter().cloned().collect()
    }

    pub async fn kinds(&self) -> Vec<EventKind> {
        self.events.read().await.iter().map(|e| e.event).collect()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl Default for MemoryEventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn record(&self, event: &TerminationEvent) -> Result<(), SinkError> {
        let mut events = self.events.write().await;

        events.push_back(event.clone());

        // Maintain max size (FIFO)
        while events.len() > self.max_events {
            events.pop_front();
        }

        Ok(())
    }
}

/// Delivers each record to several sinks; one failing sink does not stop the others
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl EventSink for FanoutEventSink {
    async fn record(&self, event: &TerminationEvent) -> Result<(), SinkError> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.record(event).await {
                failures.push(e.0);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SinkError(failures.join("; ")))
        }
    }
}
