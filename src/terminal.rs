use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use futures::StreamExt;
use log::{ error, info };
use std::error::Error;
use std::io::Write;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio_stream::wrappers::LinesStream;

use crate::bridge::RelayBridge;
use crate::cli::ChatArgs;
use crate::llm::{ new_client, LlmConfig };
use crate::models::message::Part;
use crate::widget::{
    Conversation,
    Renderer,
    SendOutcome,
    ToggleGate,
    View,
    WidgetConfig,
    WidgetHost,
};

/// Prints each message once. A shorter history than last time means it was
/// replaced, so everything is printed again.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    printed: usize,
    loading: bool,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0, loading: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, view: &View) -> std::io::Result<()> {
        if view.messages.len() < self.printed {
            writeln!(self.out, "--- {} ---", view.title)?;
            self.printed = 0;
        }
        for message in &view.messages[self.printed..] {
            write!(self.out, "{}: {}", message.label, message.body)?;
            if message.attachments > 0 {
                write!(self.out, " [{} attachment(s)]", message.attachments)?;
            }
            writeln!(self.out)?;
        }
        self.printed = view.messages.len();

        if view.loading && !self.loading {
            writeln!(self.out, "{} is thinking...", view.title)?;
        }
        self.loading = view.loading;
        self.out.flush()
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, view: &View) {
        if let Err(e) = self.draw(view) {
            error!("Failed to draw view: {}", e);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Send(String),
    Ai(bool),
    Attach(PathBuf),
    Quit,
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return Input::Send(line.to_string());
    }
    let mut words = trimmed.splitn(2, char::is_whitespace);
    let command = words.next().unwrap_or("");
    let rest = words.next().map(str::trim).unwrap_or("");
    match (command, rest) {
        ("/quit", _) | ("/exit", _) => Input::Quit,
        ("/ai", "on") => Input::Ai(true),
        ("/ai", "off") => Input::Ai(false),
        ("/attach", path) if !path.is_empty() => Input::Attach(PathBuf::from(path)),
        _ => Input::Unknown(trimmed.to_string()),
    }
}

/// MIME type from the file extension, falling back to octet-stream.
pub fn mime_type_of(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().essence_str().to_string()
}

pub async fn load_attachment(path: &Path) -> std::io::Result<Part> {
    let bytes = tokio::fs::read(path).await?;
    Ok(Part::attachment(mime_type_of(path), STANDARD.encode(bytes)))
}

pub async fn run_chat(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let gate = ToggleGate::new(args.ai_enabled);
    let config = WidgetConfig {
        api_key: args.api_key.clone(),
        use_markdown: args.use_markdown,
        display_name: args.display_name.clone(),
        system_context: args.context.clone(),
    };

    let mut host = WidgetHost::new(config);
    host.set_ai_gate(Some(Arc::new(gate.clone())));
    host.set_renderer(Box::new(TerminalRenderer::new(std::io::stdout())));

    let client = new_client(
        &(LlmConfig {
            model: args.model.clone(),
            base_url: args.base_url.clone(),
            timeout: args.request_timeout_secs.map(Duration::from_secs),
        })
    )?;
    info!("Completion model: {}", client.model());
    let conversation = Conversation::new(host, client);

    let _bridge = match &args.relay_url {
        Some(url) => Some(RelayBridge::connect(url, args.relay_secret.as_deref(), conversation.clone()).await?),
        None => None,
    };

    println!("Type a message. /ai on|off, /attach <path>, /quit");
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut pending: Vec<Part> = Vec::new();

    while let Some(line) = lines.next().await {
        match parse_input(&line?) {
            Input::Send(text) => {
                let attachments = std::mem::take(&mut pending);
                let kept = attachments.clone();
                match conversation.send_detached(&text, attachments).await.0 {
                    SendOutcome::Appended => {}
                    SendOutcome::Empty => {}
                    SendOutcome::Busy => {
                        println!("Still waiting for the last reply.");
                        pending = kept;
                    }
                }
            }
            Input::Ai(enabled) => {
                gate.set(enabled);
                println!("AI {}", if enabled { "enabled" } else { "disabled" });
            }
            Input::Attach(path) =>
                match load_attachment(&path).await {
                    Ok(part) => {
                        pending.push(part);
                        println!("Attached {} (sent with the next message)", path.display());
                    }
                    Err(e) => println!("Could not read {}: {}", path.display(), e),
                }
            Input::Quit => {
                break;
            }
            Input::Unknown(cmd) => println!("Unknown command: {}", cmd),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;
    use crate::widget::view::build_view;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_input("hello"), Input::Send("hello".into()));
        assert_eq!(parse_input("/ai on"), Input::Ai(true));
        assert_eq!(parse_input("/ai off"), Input::Ai(false));
        assert_eq!(parse_input("/attach ./cat.png"), Input::Attach(PathBuf::from("./cat.png")));
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/attach"), Input::Unknown("/attach".into()));
        assert_eq!(parse_input(""), Input::Send(String::new()));
    }

    #[test]
    fn test_mime_guess() {
        assert_eq!(mime_type_of(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_type_of(Path::new("clip.mp3")), "audio/mpeg");
        assert_eq!(mime_type_of(Path::new("table.csv")), "text/csv");
        assert_eq!(mime_type_of(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_renderer_prints_each_message_once() {
        let config = WidgetConfig::default();
        let mut renderer = TerminalRenderer::new(Vec::new());
        let mut history = vec![Message::local_user(vec![Part::text("hi")])];

        renderer.render(&build_view(&config, &history, false));
        renderer.render(&build_view(&config, &history, true));
        history.push(Message::local_model("hello"));
        renderer.render(&build_view(&config, &history, false));

        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, "You: hi\nAI Assistant is thinking...\nAI Assistant: hello\n");
    }

    #[tokio::test]
    async fn test_load_attachment_encodes_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, b"hi").unwrap();

        let part = load_attachment(&path).await.unwrap();
        assert_eq!(part, Part::attachment("text/plain", "aGk="));
    }
}
