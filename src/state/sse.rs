use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Default number of buffered events per session stream.
pub const DEFAULT_SSE_CAPACITY: usize = 64;

/// Simple broadcast hub wrapper used by the SSE services.
///
/// Every live session owns one hub; subscribers only see the events of the
/// session they connected to.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for SseHub {
    fn default() -> Self {
        Self::new(DEFAULT_SSE_CAPACITY)
    }
}
