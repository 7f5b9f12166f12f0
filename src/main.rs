//! Terminal host for the help chat.
//!
//! Bot messages are printed as they are delivered. Each stdin line is an
//! option id or free text; `/restart` starts over and `/quit` exits.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use helpdesk::chat::{ChatEngine, ChatError, Message};
use helpdesk::config::{ChatConfig, InputMode};
use helpdesk::driver::{ChatDriver, ChatEvent, ChatEvents};
use helpdesk::error::{ErrorCode, describe};
use helpdesk::flow::{FlowError, FlowGraph};
use helpdesk::session::{DEMO_PASSWORD, Role, SessionContext, SessionError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const BOT_NAME: &str = "Sarah";

#[derive(Debug, thiserror::Error)]
enum HostError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("stdin read failed: {0}")]
    Stdin(#[from] std::io::Error),
}

impl ErrorCode for HostError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Flow(err) => err.error_code(),
            Self::Session(err) => err.error_code(),
            Self::Stdin(_) => "E_STDIN",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "helpdesk", about = "Springing Stars live support chat")]
struct Cli {
    /// YAML flow file to load instead of the built-in support script.
    #[arg(long)]
    flow: Option<PathBuf>,

    /// `buttons` or `free-text`.
    #[arg(long, env = "HELPDESK_INPUT_MODE")]
    mode: Option<InputMode>,

    /// Sign in as this role before chatting.
    #[arg(long)]
    role: Option<Role>,

    /// Username for `--role`; defaults to the role's demo account.
    #[arg(long, requires = "role")]
    username: Option<String>,

    /// Validate the flow and exit.
    #[arg(long)]
    check: bool,

    /// Print each bot message as a JSON line instead of text.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", describe(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), HostError> {
    let graph = match &cli.flow {
        Some(path) => FlowGraph::load(path)?,
        None => FlowGraph::builtin()?,
    };

    if cli.check {
        println!("ok: {} nodes", graph.len());
        for key in graph.unreachable() {
            println!("unreachable: {key}");
        }
        return Ok(());
    }

    let mut session = SessionContext::new();
    if let Some(role) = cli.role {
        let username = cli.username.as_deref().unwrap_or(role.demo_username());
        let user = session.login(role, username, DEMO_PASSWORD)?;
        println!("Signed in as {} ({}), dashboard at {}", user.username, role.display_name(), role.dashboard_path());
    }

    let mut config = ChatConfig::from_env();
    if let Some(mode) = cli.mode {
        config = config.with_input_mode(mode);
    }
    info!(mode = ?config.input_mode, nodes = graph.len(), "starting help chat");

    let (driver, events) = ChatDriver::spawn(ChatEngine::new(Arc::new(graph), config));
    let mode = driver.with_engine(ChatEngine::input_mode);
    let output = if cli.json { Output::Json } else { Output::Text(mode) };
    let printer = tokio::spawn(print_events(events, output));
    driver.start();

    let result = read_input(&driver, mode).await;

    driver.shutdown();
    if let Err(err) = printer.await {
        warn!(error = %err, "printer task failed");
    }
    if let Some(user) = session.logout() {
        println!("Goodbye, {}.", user.initials());
    }
    result
}

async fn read_input(driver: &ChatDriver, mode: InputMode) -> Result<(), HostError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "/quit" => break,
            "/restart" => {
                driver.close();
                driver.start();
            }
            _ => submit(driver, mode, line),
        }
    }
    Ok(())
}

/// In button mode a bare option id counts as a click; anything else goes to
/// the engine as typed text.
fn submit(driver: &ChatDriver, mode: InputMode, line: &str) {
    if mode == InputMode::Buttons {
        match driver.select_option_id(line) {
            Ok(()) => return,
            Err(ChatError::OptionNotOffered { .. }) => {}
            Err(err) => {
                eprintln!("{}", describe(&err));
                return;
            }
        }
    }
    if let Err(err) = driver.submit_text(line) {
        eprintln!("{}", describe(&err));
    }
}

#[derive(Debug, Clone, Copy)]
enum Output {
    Text(InputMode),
    Json,
}

async fn print_events(mut events: ChatEvents, output: Output) {
    while let Some(event) = events.recv().await {
        match (event, output) {
            (ChatEvent::Typing(true), Output::Text(_)) => eprintln!("{BOT_NAME} is typing..."),
            (ChatEvent::Typing(_), _) => {}
            (ChatEvent::Delivered(message), Output::Text(mode)) => print_message(&message, mode),
            (ChatEvent::Delivered(message), Output::Json) => match serde_json::to_string(&message) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!(error = %err, id = %message.id, "message serialization failed"),
            },
        }
    }
}

fn print_message(message: &Message, mode: InputMode) {
    println!("{BOT_NAME}: {}", message.content);
    if mode == InputMode::Buttons {
        for option in &message.options {
            println!("  [{}] {}", option.id, option.label);
        }
    }
}
