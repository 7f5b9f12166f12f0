//! Chat engine — session state machine over a validated flow graph.
//!
//! DESIGN
//! ======
//! The engine is synchronous and owns a FIFO queue of pending bot
//! deliveries, each stamped with a due instant. User actions append the
//! user's bubble immediately and schedule bot replies; hosts call `poll` to
//! deliver whatever has come due. Each action has an `_at(now)` twin taking
//! an explicit instant, so tests drive time by hand instead of sleeping.
//!
//! A delivery is due at `max(now, last pending due) + lead + typing delay`.
//! Deliveries therefore come out in scheduling order no matter how the
//! typing jitter falls, and the typing indicator (`is_typing`) covers exactly
//! the span from scheduling to the last pending delivery.
//!
//! TRADE-OFFS
//! ==========
//! Options only become selectable once the message presenting them has been
//! delivered. A click racing the typing indicator is rejected rather than
//! guessed at, which keeps "the option set most recently presented" a single
//! field instead of a history.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::delay::{JitteredDelay, TypingDelay};
use super::message::Message;
use crate::config::{ChatConfig, InputMode};
use crate::error::ErrorCode;
use crate::flow::{FlowGraph, FlowNode, FlowOption, ROOT_NODE};

/// Bot reply to any input once a conversation has reached a terminal node.
pub const RESTART_PROMPT: &str =
    "This conversation has ended. Say 'help' to restart and I'll take you back to the main menu.";

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Caller errors. User typos are never errors; see [`TextOutcome`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("chat session is not active")]
    NotStarted,
    #[error("option `{id}` is not among the options currently offered")]
    OptionNotOffered { id: String },
}

impl ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotStarted => "E_NOT_STARTED",
            Self::OptionNotOffered { .. } => "E_OPTION_NOT_OFFERED",
        }
    }
}

/// What the engine did with a line of free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    /// The text named an offered option; moved to `node`.
    Selected { node: String },
    /// Options are offered but none matched; a re-prompt was scheduled.
    Reprompted,
    /// The conversation had ended; a restart from the root was scheduled.
    Restarting,
    /// The bot is still typing and nothing is offered yet.
    Ignored,
}

// =============================================================================
// PENDING DELIVERY
// =============================================================================

struct Pending {
    due: Instant,
    content: String,
    /// Replaces the offered option set on delivery when present.
    presents: Option<Vec<FlowOption>>,
    /// Moves the current node on delivery when present.
    enters: Option<String>,
    /// Re-prompts are withdrawn if the user moves on before they arrive.
    reprompt: bool,
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct ChatEngine {
    graph: Arc<FlowGraph>,
    config: ChatConfig,
    delay: Box<dyn TypingDelay>,
    current: String,
    messages: Vec<Message>,
    offered: Vec<FlowOption>,
    pending: VecDeque<Pending>,
    active: bool,
    /// Bumped on every close.
    generation: u64,
}

impl ChatEngine {
    /// Engine with live-looking jittered typing delays taken from `config`.
    #[must_use]
    pub fn new(graph: Arc<FlowGraph>, config: ChatConfig) -> Self {
        let delay = Box::new(JitteredDelay::from_config(&config));
        Self::with_delay(graph, config, delay)
    }

    /// Engine with an injected typing delay.
    #[must_use]
    pub fn with_delay(graph: Arc<FlowGraph>, config: ChatConfig, delay: Box<dyn TypingDelay>) -> Self {
        Self {
            graph,
            config,
            delay,
            current: ROOT_NODE.to_string(),
            messages: Vec::new(),
            offered: Vec::new(),
            pending: VecDeque::new(),
            active: false,
            generation: 0,
        }
    }

    // --- Actions ---

    /// Open the session at the root node. Returns `false` if already active.
    pub fn start(&mut self) -> bool {
        self.start_at(Instant::now())
    }

    pub fn start_at(&mut self, now: Instant) -> bool {
        if self.active {
            debug!(node = %self.current, "chat already active; start ignored");
            return false;
        }
        self.reset();
        self.active = true;
        info!(node = ROOT_NODE, mode = ?self.config.input_mode, "chat session started");
        self.schedule_node(now, self.config.initial_delay, ROOT_NODE, false);
        true
    }

    /// Choose one of the currently offered options.
    ///
    /// # Errors
    ///
    /// `NotStarted` if the session is closed, `OptionNotOffered` if `option`
    /// is not in the set most recently presented. State is unchanged on error.
    pub fn select_option(&mut self, option: &FlowOption) -> Result<(), ChatError> {
        self.select_option_at(option, Instant::now())
    }

    /// See [`ChatEngine::select_option`].
    ///
    /// # Errors
    ///
    /// Same as [`ChatEngine::select_option`].
    pub fn select_option_at(&mut self, option: &FlowOption, now: Instant) -> Result<(), ChatError> {
        if !self.active {
            return Err(ChatError::NotStarted);
        }
        if !self.offered.contains(option) {
            warn!(option = %option.id, node = %self.current, "option not offered");
            return Err(ChatError::OptionNotOffered { id: option.id.clone() });
        }

        self.messages.push(Message::user(option.label.clone()));
        self.advance(option.clone(), now);
        Ok(())
    }

    /// Handle a line of typed input.
    ///
    /// The text is always echoed as a user message. A trimmed match on an
    /// offered option id behaves like [`ChatEngine::select_option`]; anything
    /// else re-prompts, or restarts from the root once the conversation has
    /// ended.
    ///
    /// # Errors
    ///
    /// `NotStarted` if the session is closed.
    pub fn submit_text(&mut self, text: &str) -> Result<TextOutcome, ChatError> {
        self.submit_text_at(text, Instant::now())
    }

    /// See [`ChatEngine::submit_text`].
    ///
    /// # Errors
    ///
    /// Same as [`ChatEngine::submit_text`].
    pub fn submit_text_at(&mut self, text: &str, now: Instant) -> Result<TextOutcome, ChatError> {
        if !self.active {
            return Err(ChatError::NotStarted);
        }
        self.messages.push(Message::user(text));
        let typed = text.trim();

        if !self.offered.is_empty() {
            if let Some(option) = self.offered.iter().find(|o| o.id == typed).cloned() {
                let node = option.next.clone();
                self.advance(option, now);
                return Ok(TextOutcome::Selected { node });
            }
            debug!(input = typed, node = %self.current, "unmatched input; re-prompting");
            let prompt = reprompt(&self.offered);
            self.schedule(now, self.config.response_lead, prompt, None, None);
            if let Some(last) = self.pending.back_mut() {
                last.reprompt = true;
            }
            return Ok(TextOutcome::Reprompted);
        }

        if self.at_terminal() {
            info!(node = %self.current, "conversation ended; restarting from root");
            self.schedule(now, self.config.response_lead, RESTART_PROMPT.to_string(), None, None);
            self.schedule_node(now, self.config.initial_delay, ROOT_NODE, true);
            return Ok(TextOutcome::Restarting);
        }

        debug!(input = typed, node = %self.current, "input while bot is typing; ignored");
        Ok(TextOutcome::Ignored)
    }

    /// Discard the session and every pending delivery.
    pub fn close(&mut self) {
        let dropped = self.pending.len();
        self.reset();
        self.generation += 1;
        info!(dropped, generation = self.generation, "chat session closed");
    }

    /// Deliver every pending bot message that is due, in scheduling order.
    pub fn poll(&mut self) -> Vec<Message> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Vec<Message> {
        let mut delivered = Vec::new();
        while let Some(front) = self.pending.front() {
            if front.due > now {
                break;
            }
            let Some(pending) = self.pending.pop_front() else {
                break;
            };
            delivered.push(self.deliver(pending));
        }
        delivered
    }

    // --- Queries ---

    #[must_use]
    pub fn current_node(&self) -> &str {
        &self.current
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The option set most recently presented. Empty while the bot is typing
    /// a reply and at terminal nodes.
    #[must_use]
    pub fn offered(&self) -> &[FlowOption] {
        &self.offered
    }

    /// True exactly while a bot delivery is pending.
    #[must_use]
    pub fn is_typing(&self) -> bool {
        !self.pending.is_empty()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Due instant of the next pending delivery.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.front().map(|p| p.due)
    }

    /// Number of closes so far. Lets async hosts drop deliveries that raced a close.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn input_mode(&self) -> InputMode {
        self.config.input_mode
    }

    #[must_use]
    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    // --- Internals ---

    fn reset(&mut self) {
        self.active = false;
        self.current = ROOT_NODE.to_string();
        self.messages.clear();
        self.offered.clear();
        self.pending.clear();
    }

    fn at_terminal(&self) -> bool {
        self.pending.is_empty() && self.graph.get(&self.current).is_some_and(FlowNode::is_end)
    }

    fn advance(&mut self, option: FlowOption, now: Instant) {
        debug!(from = %self.current, to = %option.next, option = %option.id, "flow transition");
        self.offered.clear();
        let withdrawn = self.pending.len();
        self.pending.retain(|p| !p.reprompt);
        let withdrawn = withdrawn - self.pending.len();
        if withdrawn > 0 {
            debug!(withdrawn, "dropped re-prompts for a menu the user already answered");
        }
        self.current.clone_from(&option.next);
        self.schedule_node(now, self.config.response_lead, &option.next, false);
    }

    /// Schedule a node's message, plus an enumeration of its options in
    /// free-text mode. With `enters`, the current node moves on delivery.
    fn schedule_node(&mut self, now: Instant, lead: Duration, key: &str, enters: bool) {
        let graph = Arc::clone(&self.graph);
        let Some(node) = graph.get(key) else {
            warn!(node = key, "flow node missing; nothing scheduled");
            return;
        };
        let enters = enters.then(|| key.to_string());

        if self.config.input_mode == InputMode::FreeText && !node.options.is_empty() {
            self.schedule(now, lead, node.message.clone(), None, enters);
            self.schedule(now, Duration::ZERO, enumerate_options(&node.options), Some(node.options.clone()), None);
        } else {
            self.schedule(now, lead, node.message.clone(), Some(node.options.clone()), enters);
        }
    }

    fn schedule(
        &mut self,
        now: Instant,
        lead: Duration,
        content: String,
        presents: Option<Vec<FlowOption>>,
        enters: Option<String>,
    ) {
        let start = self.pending.back().map_or(now, |last| last.due.max(now));
        let due = start + lead + self.delay.typing_delay();
        debug!(queued = self.pending.len() + 1, due_in = ?due.saturating_duration_since(now), "bot message scheduled");
        self.pending.push_back(Pending { due, content, presents, enters, reprompt: false });
    }

    fn deliver(&mut self, pending: Pending) -> Message {
        let Pending { content, presents, enters, .. } = pending;
        let mut message = Message::bot(content);
        if let Some(options) = presents {
            message = message.with_options(options.clone());
            self.offered = options;
        }
        if let Some(key) = enters {
            debug!(from = %self.current, to = %key, "re-entered flow");
            self.current = key;
        }
        debug!(node = %self.current, offered = self.offered.len(), "bot message delivered");
        self.messages.push(message.clone());
        message
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Follow-up message listing options as `id. label`, one per line.
#[must_use]
pub fn enumerate_options(options: &[FlowOption]) -> String {
    let lines: Vec<String> = options.iter().map(|o| format!("{}. {}", o.id, o.label)).collect();
    format!("Reply with the number of your choice:\n{}", lines.join("\n"))
}

fn reprompt(options: &[FlowOption]) -> String {
    let ids: Vec<&str> = options.iter().map(|o| o.id.as_str()).collect();
    format!("Sorry, I didn't catch that. Please reply with one of: {}.", ids.join(", "))
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
