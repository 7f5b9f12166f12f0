//! Scripted help-chat engine for the Springing Stars school portal.
//!
//! A support conversation is a directed graph of bot messages and reply
//! options, authored as YAML. The engine walks that graph, paces bot
//! replies with a simulated typing delay, and hands finished messages to a
//! host. The host renders them and feeds user choices back in.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`flow`] | Conversation graph, YAML loading, validation |
//! | [`chat`] | Session state machine, messages, typing delays |
//! | [`driver`] | Tokio task that delivers due messages to a host |
//! | [`config`] | Timing and input-mode settings from the environment |
//! | [`session`] | Signed-in portal user and role gating |
//! | [`grading`] | Report-card grade cut points and term summaries |
//! | [`error`] | Grepable error codes |

pub mod chat;
pub mod config;
pub mod driver;
pub mod error;
pub mod flow;
pub mod grading;
pub mod session;
