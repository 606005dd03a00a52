use log::{ debug, error, info };
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::host::WidgetHost;
use crate::llm::{ CompletionClient, CompletionRequest };
use crate::models::message::{ Message, Part, Role };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Appended,
    /// Whitespace-only input with nothing attached.
    Empty,
    /// A completion is in flight; input is dropped.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NothingPending,
    AlreadyProcessed,
    Busy,
    AiDisabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Appended(Message),
    Skipped(SkipReason),
    Failed,
}

/// Input handling and the completion trigger for one widget instance.
///
/// A completion is keyed to the host's history revision at the moment the
/// triggering message became the newest one. Every send is a new revision,
/// so it fires once even when the text or position repeats an earlier one.
#[derive(Clone)]
pub struct Conversation {
    host: Arc<Mutex<WidgetHost>>,
    client: Arc<dyn CompletionClient>,
    loading: Arc<AtomicBool>,
    last_processed: Arc<Mutex<Option<u64>>>,
}

impl Conversation {
    pub fn new(host: WidgetHost, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            host: Arc::new(Mutex::new(host)),
            client,
            loading: Arc::new(AtomicBool::new(false)),
            last_processed: Arc::new(Mutex::new(None)),
        }
    }

    pub fn host(&self) -> Arc<Mutex<WidgetHost>> {
        self.host.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn history(&self) -> Vec<Message> {
        self.host.lock().await.history().to_vec()
    }

    /// Appends a local user message unless the input is blank or a
    /// completion is running.
    pub async fn submit(&self, input: &str, attachments: Vec<Part>) -> SendOutcome {
        let (outcome, claimed) = self.append_input(input, attachments).await;
        if claimed {
            self.loading.store(false, Ordering::SeqCst);
        }
        outcome
    }

    pub async fn send(
        &self,
        input: &str,
        attachments: Vec<Part>
    ) -> (SendOutcome, Option<CompletionOutcome>) {
        let (outcome, claimed) = self.append_input(input, attachments).await;
        if outcome != SendOutcome::Appended {
            return (outcome, None);
        }
        let completion = if claimed {
            self.run_claimed().await
        } else {
            self.process_pending().await
        };
        (outcome, Some(completion))
    }

    /// Like `send` but runs the completion in the background so the caller
    /// can keep reading input. The in-flight flag is already set when this
    /// returns, so input that follows immediately is reported as busy.
    pub async fn send_detached(
        &self,
        input: &str,
        attachments: Vec<Part>
    ) -> (SendOutcome, Option<JoinHandle<CompletionOutcome>>) {
        let (outcome, claimed) = self.append_input(input, attachments).await;
        if outcome != SendOutcome::Appended {
            return (outcome, None);
        }
        let this = self.clone();
        let handle = tokio::spawn(async move {
            if claimed { this.run_claimed().await } else { this.process_pending().await }
        });
        (outcome, Some(handle))
    }

    pub fn spawn_pending(&self) -> JoinHandle<CompletionOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.process_pending().await })
    }

    /// Replaces the history from outside and re-runs the trigger.
    pub async fn push_history(&self, history: Vec<Message>) -> CompletionOutcome {
        self.host.lock().await.push_history(history);
        self.process_pending().await
    }

    /// Appends a message that originated in another instance.
    pub async fn receive_remote(&self, message: Message) {
        self.host.lock().await.append(message.into_remote());
    }

    /// Issues a completion if the newest message is a fresh local user
    /// message and AI is enabled. Never more than one in flight.
    pub async fn process_pending(&self) -> CompletionOutcome {
        if !self.claim() {
            return CompletionOutcome::Skipped(SkipReason::Busy);
        }
        self.run_claimed().await
    }

    fn claim(&self) -> bool {
        self.loading.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
    }

    async fn ai_enabled(&self) -> bool {
        let gate = self.host.lock().await.ai_gate();
        match gate {
            Some(gate) => gate.is_enabled().await,
            None => false,
        }
    }

    /// Appends the input. When AI is on, the in-flight flag is claimed before
    /// the message lands; the returned bool says whether the caller holds it.
    async fn append_input(&self, input: &str, attachments: Vec<Part>) -> (SendOutcome, bool) {
        let has_text = !input.trim().is_empty();
        if !has_text && attachments.is_empty() {
            return (SendOutcome::Empty, false);
        }
        if self.is_loading() {
            debug!("Completion in flight, ignoring input");
            return (SendOutcome::Busy, false);
        }

        let claimed = if self.ai_enabled().await {
            if !self.claim() {
                debug!("Completion in flight, ignoring input");
                return (SendOutcome::Busy, false);
            }
            true
        } else {
            false
        };

        let mut parts = Vec::with_capacity(attachments.len() + 1);
        if has_text {
            parts.push(Part::text(input));
        }
        parts.extend(attachments);

        self.host.lock().await.append(Message::local_user(parts));
        (SendOutcome::Appended, claimed)
    }

    /// Runs the trigger while holding the in-flight flag and releases it.
    async fn run_claimed(&self) -> CompletionOutcome {
        let outcome = self.complete_pending().await;
        self.loading.store(false, Ordering::SeqCst);
        outcome
    }

    async fn complete_pending(&self) -> CompletionOutcome {
        let revision = {
            let host = self.host.lock().await;
            match host.history().last() {
                Some(m) if m.role == Role::User && m.is_local => host.revision(),
                _ => {
                    return CompletionOutcome::Skipped(SkipReason::NothingPending);
                }
            }
        };

        if *self.last_processed.lock().await == Some(revision) {
            return CompletionOutcome::Skipped(SkipReason::AlreadyProcessed);
        }

        if !self.ai_enabled().await {
            debug!("AI disabled, not requesting a completion");
            return CompletionOutcome::Skipped(SkipReason::AiDisabled);
        }
        *self.last_processed.lock().await = Some(revision);

        let (history, api_key, context) = {
            let mut host = self.host.lock().await;
            host.set_loading(true);
            (
                host.history().to_vec(),
                host.config().api_key.clone(),
                host.config().system_context.clone(),
            )
        };

        let request = CompletionRequest {
            api_key: api_key.as_deref(),
            system_context: context.as_deref(),
            history: &history,
        };
        let result = self.client.complete(request).await;

        let mut host = self.host.lock().await;
        let outcome = match result {
            Ok(text) => {
                info!("Completion from {} appended ({} chars)", self.client.model(), text.len());
                let reply = Message::local_model(text);
                host.append(reply.clone());
                CompletionOutcome::Appended(reply)
            }
            Err(e) => {
                error!("Completion failed: {}", e);
                CompletionOutcome::Failed
            }
        };
        host.set_loading(false);
        outcome
    }
}
