use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AzureConfig;
use crate::error::Result;
use crate::modes::Mode;
use crate::transport::{Connector, Transport};

/// One answered query, kept for display only
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub mode: Mode,
    pub query: String,
    pub response: String,
    pub answered_at: DateTime<Utc>,
}

/// Per-session context: the cached provider handle and the retained transcript.
/// Created once by the caller and passed to every dispatch.
pub struct Session {
    id: Uuid,
    transport: Option<Arc<dyn Transport>>,
    transcript: Vec<Exchange>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            transport: None,
            transcript: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Returns the cached handle, connecting on first use
    pub fn transport(
        &mut self,
        connector: &dyn Connector,
        cfg: &AzureConfig,
    ) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = &self.transport {
            tracing::debug!(session = %self.id, "Client already initialized");
            return Ok(Arc::clone(transport));
        }

        let transport = connector.connect(cfg)?;
        tracing::info!(session = %self.id, "Client initialized");
        self.transport = Some(Arc::clone(&transport));
        Ok(transport)
    }

    pub fn record(&mut self, mode: Mode, query: &str, response: &str) {
        self.transcript.push(Exchange {
            mode,
            query: query.to_string(),
            response: response.to_string(),
            answered_at: Utc::now(),
        });
    }

    pub fn transcript(&self) -> &[Exchange] {
        &self.transcript
    }

    /// Clears the transcript. The connection handle is kept.
    pub fn clear(&mut self) {
        tracing::info!(session = %self.id, cleared = self.transcript.len(), "Clearing chat");
        self.transcript.clear();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
