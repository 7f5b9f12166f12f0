//! Help chat — scripted assistant driven by a [`crate::flow::FlowGraph`].
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Session state machine and delivery queue |
//! | [`message`] | Chat bubbles |
//! | [`delay`] | Injectable typing latency |

pub mod delay;
pub mod engine;
pub mod message;

pub use delay::{FixedDelay, JitteredDelay, TypingDelay};
pub use engine::{ChatEngine, ChatError, TextOutcome};
pub use message::{Message, Role};
