use log::debug;
use std::sync::Arc;

use super::config::WidgetConfig;
use super::view::{ build_view, View };
use super::{ AiGate, HistoryListener, Renderer };
use crate::models::message::Message;

/// Owned state of one widget instance: configuration, conversation history
/// and the hooks that observe it.
///
/// Every mutation re-renders. Only history mutations notify listeners, so
/// re-rendering an unchanged widget is silent.
pub struct WidgetHost {
    config: WidgetConfig,
    history: Vec<Message>,
    revision: u64,
    loading: bool,
    ai_gate: Option<Arc<dyn AiGate>>,
    listeners: Vec<(ListenerId, Arc<dyn HistoryListener>)>,
    next_listener: u64,
    renderer: Option<Box<dyn Renderer>>,
}

/// Handle returned by `add_history_listener`, used to detach it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

impl WidgetHost {
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            config,
            history: Vec::new(),
            revision: 0,
            loading: false,
            ai_gate: None,
            listeners: Vec::new(),
            next_listener: 0,
            renderer: None,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Bumped by every append and by every push that actually changes the
    /// history. Renders and identical pushes leave it alone.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn ai_gate(&self) -> Option<Arc<dyn AiGate>> {
        self.ai_gate.clone()
    }

    pub fn set_attribute(&mut self, name: &str, value: Option<&str>) {
        if self.config.apply_attribute(name, value) {
            self.render();
        } else {
            debug!("Ignoring unobserved attribute '{}'", name);
        }
    }

    pub fn set_api_key(&mut self, api_key: Option<String>) {
        self.config.api_key = api_key;
        self.render();
    }

    pub fn set_use_markdown(&mut self, use_markdown: bool) {
        self.config.use_markdown = use_markdown;
        self.render();
    }

    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        self.config.display_name = display_name.into();
        self.render();
    }

    pub fn set_context(&mut self, context: Option<String>) {
        self.config.system_context = context;
        self.render();
    }

    pub fn set_ai_gate(&mut self, gate: Option<Arc<dyn AiGate>>) {
        self.ai_gate = gate;
        self.render();
    }

    pub fn add_history_listener(&mut self, listener: Arc<dyn HistoryListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        self.render();
        id
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn remove_history_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderer = Some(renderer);
        self.render();
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.render();
        }
    }

    /// Replaces the whole history.
    pub fn push_history(&mut self, history: Vec<Message>) {
        if history != self.history {
            self.revision += 1;
        }
        self.history = history;
        self.render();
        self.notify();
    }

    pub fn append(&mut self, message: Message) {
        self.history.push(message);
        self.revision += 1;
        self.render();
        self.notify();
    }

    pub fn render(&mut self) -> View {
        let view = build_view(&self.config, &self.history, self.loading);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.render(&view);
        }
        view
    }

    fn notify(&self) {
        debug!(
            "History changed ({} messages), notifying {} listener(s)",
            self.history.len(),
            self.listeners.len()
        );
        for (_, listener) in &self.listeners {
            listener.on_history_changed(&self.history);
        }
    }
}
