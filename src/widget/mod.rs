pub mod config;
pub mod conversation;
pub mod host;
pub mod view;

use async_trait::async_trait;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;

use crate::models::message::Message;

pub use self::config::WidgetConfig;
pub use self::conversation::{ CompletionOutcome, Conversation, SendOutcome };
pub use self::host::{ ListenerId, WidgetHost };
pub use self::view::{ RenderedMessage, View };

/// External "is AI enabled" query.
#[async_trait]
pub trait AiGate: Send + Sync {
    async fn is_enabled(&self) -> bool;
}

pub struct StaticGate(pub bool);

#[async_trait]
impl AiGate for StaticGate {
    async fn is_enabled(&self) -> bool {
        self.0
    }
}

/// Gate backed by a shared flag that a front end can flip at runtime.
#[derive(Clone, Default)]
pub struct ToggleGate {
    enabled: Arc<AtomicBool>,
}

impl ToggleGate {
    pub fn new(enabled: bool) -> Self {
        Self { enabled: Arc::new(AtomicBool::new(enabled)) }
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiGate for ToggleGate {
    async fn is_enabled(&self) -> bool {
        self.get()
    }
}

/// Receives the full history after every change.
pub trait HistoryListener: Send + Sync {
    fn on_history_changed(&self, history: &[Message]);
}

impl<F> HistoryListener for F where F: Fn(&[Message]) + Send + Sync {
    fn on_history_changed(&self, history: &[Message]) {
        self(history)
    }
}

/// Draws a view. Called on every configuration or history change.
pub trait Renderer: Send {
    fn render(&mut self, view: &View);
}
