use pulldown_cmark::{ html, Parser };

use super::config::WidgetConfig;
use crate::models::message::{ Message, Role };

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub role: Role,
    pub label: String,
    pub body: String,
    pub is_html: bool,
    pub attachments: usize,
}

/// Snapshot of everything a front end draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub title: String,
    pub loading: bool,
    pub messages: Vec<RenderedMessage>,
}

pub fn markdown_to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, Parser::new(text));
    out
}

/// Markdown applies to model replies only; user text is shown verbatim.
pub fn render_message(config: &WidgetConfig, message: &Message) -> RenderedMessage {
    let text = message.text();
    let as_html = config.use_markdown && message.role == Role::Model;
    let label = match message.role {
        Role::User if message.is_local => "You".to_string(),
        Role::User => "Remote".to_string(),
        Role::Model => config.display_name.clone(),
    };

    RenderedMessage {
        role: message.role,
        label,
        body: if as_html { markdown_to_html(text) } else { text.to_string() },
        is_html: as_html,
        attachments: message.parts
            .iter()
            .filter(|p| p.is_attachment())
            .count(),
    }
}

pub fn build_view(config: &WidgetConfig, history: &[Message], loading: bool) -> View {
    View {
        title: config.display_name.clone(),
        loading,
        messages: history
            .iter()
            .map(|m| render_message(config, m))
            .collect(),
    }
}
