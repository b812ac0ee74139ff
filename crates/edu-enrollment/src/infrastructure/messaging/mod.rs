//! Event publishers

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::domain::events::DomainEvent;
use crate::ports::outbound::{EventPublisher, RepositoryError};

/// Discards events
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _events: Vec<DomainEvent>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Writes each event to the log as structured JSON
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), RepositoryError> {
        for event in events {
            let payload = serde_json::to_string(&event).map_err(|e| RepositoryError::ConnectionError(e.to_string()))?;
            info!(
                event_type = event.event_type(),
                tenant_id = %event.tenant_id(),
                payload = %payload,
                "domain event"
            );
        }
        Ok(())
    }
}

/// Keeps every published event, for assertions
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(DomainEvent::event_type).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), RepositoryError> {
        self.events.lock().extend(events);
        Ok(())
    }
}
