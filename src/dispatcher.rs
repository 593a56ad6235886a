//! Callback-style event routing on top of [`AmiEventStream`](crate::AmiEventStream).
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiEventType, EventDispatcher};
//!
//! # async fn run() -> Result<(), asterisk_ami_tokio::AmiError> {
//! let (_client, events) = AmiClient::connect("localhost", 5038, "admin", "secret").await?;
//!
//! let mut dispatcher = EventDispatcher::new();
//! dispatcher
//!     .on(AmiEventType::Newstate, |e| println!("state: {:?}", e.channel_state()))
//!     .on(AmiEventType::Hangup, |e| println!("hangup: {:?}", e.channel()))
//!     .on_unhandled(|e| println!("other: {}", e.name()));
//!
//! dispatcher.run(events).await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;

use futures_util::{Stream, StreamExt};
use tracing::trace;

use crate::event::{AmiEvent, AmiEventType};

/// Event callback
pub type EventHandler = Box<dyn FnMut(&AmiEvent) + Send + 'static>;

/// Routes events to handlers registered per [`AmiEventType`].
///
/// Events with no typed handler, including events whose name this crate does
/// not know, go to the `on_unhandled` handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<AmiEventType, Vec<EventHandler>>,
    unhandled: Vec<EventHandler>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event type. Handlers run in registration order.
    pub fn on<F>(&mut self, event_type: AmiEventType, handler: F) -> &mut Self
    where
        F: FnMut(&AmiEvent) + Send + 'static,
    {
        self.handlers
            .entry(event_type)
            .or_default()
            .push(Box::new(handler));
        self
    }

    /// Register a catch-all handler
    pub fn on_unhandled<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&AmiEvent) + Send + 'static,
    {
        self.unhandled
            .push(Box::new(handler));
        self
    }

    pub fn has_handlers(&self, event_type: AmiEventType) -> bool {
        self.handlers
            .get(&event_type)
            .is_some_and(|h| !h.is_empty())
    }

    /// Run the handlers for one event.
    ///
    /// Returns `true` if a typed handler ran, `false` if the event fell
    /// through to the catch-all.
    pub fn dispatch(&mut self, event: &AmiEvent) -> bool {
        let typed = event
            .event_type()
            .and_then(|t| self.handlers.get_mut(&t))
            .filter(|handlers| !handlers.is_empty());

        match typed {
            Some(handlers) => {
                for handler in handlers.iter_mut() {
                    handler(event);
                }
                true
            }
            None => {
                trace!("No handler for event {}", event.name());
                for handler in self.unhandled.iter_mut() {
                    handler(event);
                }
                false
            }
        }
    }

    /// Dispatch every event until the stream ends. Returns the number of events seen.
    pub async fn run<S>(mut self, mut events: S) -> usize
    where
        S: Stream<Item = AmiEvent> + Unpin,
    {
        let mut count = 0;
        while let Some(event) = events
            .next()
            .await
        {
            self.dispatch(&event);
            count += 1;
        }
        count
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut typed: Vec<_> = self
            .handlers
            .iter()
            .map(|(t, h)| (t.as_str(), h.len()))
            .collect();
        typed.sort();
        f.debug_struct("EventDispatcher")
            .field("handlers", &typed)
            .field("unhandled", &self.unhandled.len())
            .finish()
    }
}
