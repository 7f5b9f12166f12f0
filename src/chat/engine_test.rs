use std::collections::VecDeque;

use super::*;
use crate::chat::delay::FixedDelay;
use crate::chat::message::Role;

// =============================================================================
// Helpers
// =============================================================================

const TICK: Duration = Duration::from_millis(100);
const LATER: Duration = Duration::from_secs(60);

/// Plays back a fixed list of delays, then repeats the last one.
struct ScriptedDelay(VecDeque<Duration>);

impl TypingDelay for ScriptedDelay {
    fn typing_delay(&mut self) -> Duration {
        if self.0.len() > 1 {
            return self.0.pop_front().unwrap_or(TICK);
        }
        self.0.front().copied().unwrap_or(TICK)
    }
}

fn graph() -> Arc<FlowGraph> {
    Arc::new(FlowGraph::builtin().unwrap())
}

fn engine_with(mode: InputMode, delay: Box<dyn TypingDelay>) -> ChatEngine {
    ChatEngine::with_delay(graph(), ChatConfig::immediate(mode), delay)
}

fn engine(mode: InputMode) -> ChatEngine {
    engine_with(mode, Box::new(FixedDelay(TICK)))
}

/// Start and deliver everything scheduled. Returns the time polled at.
fn started(engine: &mut ChatEngine, t0: Instant) -> Instant {
    assert!(engine.start_at(t0));
    settle(engine, t0)
}

fn settle(engine: &mut ChatEngine, now: Instant) -> Instant {
    let later = now + LATER;
    engine.poll_at(later);
    later
}

fn offered(engine: &ChatEngine, fragment: &str) -> FlowOption {
    engine
        .offered()
        .iter()
        .find(|o| o.label.contains(fragment))
        .cloned()
        .unwrap()
}

fn bot_contents(engine: &ChatEngine) -> Vec<String> {
    engine
        .messages()
        .iter()
        .filter(|m| m.is_bot())
        .map(|m| m.content.clone())
        .collect()
}

fn last(engine: &ChatEngine) -> &Message {
    engine.messages().last().unwrap()
}

// =============================================================================
// start
// =============================================================================

#[test]
fn start_delivers_greeting_after_delay() {
    let mut e = engine(InputMode::Buttons);
    let t0 = Instant::now();

    assert!(e.start_at(t0));
    assert!(e.is_active());
    assert!(e.is_typing());
    assert_eq!(e.current_node(), ROOT_NODE);
    assert!(e.messages().is_empty());
    assert_eq!(e.next_due(), Some(t0 + TICK));

    assert!(e.poll_at(t0 + TICK / 2).is_empty());
    assert!(e.is_typing());

    let delivered = e.poll_at(t0 + TICK);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].role, Role::Bot);
    assert!(delivered[0].content.contains("Sarah"));
    assert_eq!(delivered[0].options.len(), 5);
    assert_eq!(e.offered().len(), 5);
    assert!(!e.is_typing());
    assert_eq!(e.next_due(), None);
}

#[test]
fn start_uses_initial_delay_before_typing() {
    let config = ChatConfig { initial_delay: Duration::from_secs(1), ..ChatConfig::immediate(InputMode::Buttons) };
    let mut e = ChatEngine::with_delay(graph(), config, Box::new(FixedDelay(TICK)));
    let t0 = Instant::now();
    e.start_at(t0);
    assert_eq!(e.next_due(), Some(t0 + Duration::from_secs(1) + TICK));
}

#[test]
fn start_while_active_is_noop() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());
    let before = e.messages().len();

    assert!(!e.start_at(t));
    assert_eq!(e.messages().len(), before);
    assert!(!e.is_typing());
}

#[test]
fn start_then_close_delivers_nothing() {
    let mut e = engine(InputMode::Buttons);
    let t0 = Instant::now();
    e.start_at(t0);
    e.close();

    assert!(e.poll_at(t0 + Duration::from_secs(3600)).is_empty());
    assert!(e.messages().is_empty());
    assert!(!e.is_typing());
    assert!(!e.is_active());
}

#[test]
fn close_mid_reply_cancels_pending_deliveries() {
    let mut e = engine(InputMode::FreeText);
    let t = started(&mut e, Instant::now());
    let academic = offered(&e, "Academic");
    e.select_option_at(&academic, t).unwrap();
    assert!(e.is_typing());

    e.close();
    assert!(e.poll_at(t + LATER).is_empty());
    assert!(e.messages().is_empty());
    assert_eq!(e.current_node(), ROOT_NODE);
}

#[test]
fn reopen_after_close_starts_fresh() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());
    let contact = offered(&e, "Contact");
    e.select_option_at(&contact, t).unwrap();
    let t = settle(&mut e, t);
    e.close();

    let _t = started(&mut e, t);
    assert_eq!(e.current_node(), ROOT_NODE);
    assert_eq!(e.messages().len(), 1);
    assert_eq!(e.offered().len(), 5);
}

// =============================================================================
// select_option
// =============================================================================

#[test]
fn select_before_start_is_rejected() {
    let mut e = engine(InputMode::Buttons);
    let option = FlowOption { id: "1".into(), label: "📚 Academic Issues".into(), next: "academic".into() };
    assert_eq!(e.select_option_at(&option, Instant::now()), Err(ChatError::NotStarted));
}

#[test]
fn select_option_not_offered_is_rejected_without_side_effects() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());
    let foreign = e.graph().get("academic").unwrap().options[0].clone();
    let before = e.messages().to_vec();

    let err = e.select_option_at(&foreign, t).unwrap_err();
    assert_eq!(err, ChatError::OptionNotOffered { id: foreign.id.clone() });
    assert_eq!(err.error_code(), "E_OPTION_NOT_OFFERED");
    assert_eq!(e.current_node(), ROOT_NODE);
    assert_eq!(e.messages(), before.as_slice());
    assert!(!e.is_typing());
}

#[test]
fn select_before_greeting_is_delivered_is_rejected() {
    let mut e = engine(InputMode::Buttons);
    let t0 = Instant::now();
    e.start_at(t0);
    let academic = e.graph().get(ROOT_NODE).unwrap().options[0].clone();

    assert!(matches!(e.select_option_at(&academic, t0), Err(ChatError::OptionNotOffered { .. })));
    assert!(e.messages().is_empty());
}

#[test]
fn select_echoes_label_and_moves_immediately() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());
    let academic = offered(&e, "Academic");

    e.select_option_at(&academic, t).unwrap();

    let echo = last(&e);
    assert_eq!(echo.role, Role::User);
    assert_eq!(echo.content, "📚 Academic Issues");
    assert_eq!(e.current_node(), "academic");
    assert!(e.offered().is_empty());
    assert!(e.is_typing());
    assert_eq!(e.next_due(), Some(t + TICK));
}

#[test]
fn previously_offered_option_is_stale_after_transition() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());
    let academic = offered(&e, "Academic");
    e.select_option_at(&academic, t).unwrap();
    let t = settle(&mut e, t);

    assert!(e.select_option_at(&academic, t).is_err());
    assert_eq!(e.current_node(), "academic");
}

// =============================================================================
// End-to-end scenarios
// =============================================================================

#[test]
fn academic_grades_path_reaches_results_advice() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());

    e.select_option_at(&offered(&e, "Academic Issues"), t).unwrap();
    let t = settle(&mut e, t);
    assert_eq!(e.current_node(), "academic");

    e.select_option_at(&offered(&e, "Can't see my grades"), t).unwrap();
    settle(&mut e, t);

    assert_eq!(e.current_node(), "grades_issue");
    let answer = last(&e);
    assert!(answer.is_bot());
    assert!(answer.content.contains("Results"));
    assert!(answer.content.contains("My Grades"));
    assert!(answer.options.is_empty());
    assert!(e.offered().is_empty());
    assert!(e.graph().get(e.current_node()).unwrap().is_end());
}

#[test]
fn contact_path_lists_phone_number() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());

    e.select_option_at(&offered(&e, "Contact Information"), t).unwrap();
    settle(&mut e, t);

    assert_eq!(e.current_node(), "contact");
    assert!(last(&e).content.contains("+256 123 456 789"));
    assert!(e.offered().is_empty());
}

#[test]
fn message_ids_are_unique_and_log_is_ordered() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());
    e.select_option_at(&offered(&e, "Payment"), t).unwrap();
    let t = settle(&mut e, t);
    e.select_option_at(&offered(&e, "not processing"), t).unwrap();
    settle(&mut e, t);

    let roles: Vec<Role> = e.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::Bot, Role::User, Role::Bot, Role::User, Role::Bot]);

    let mut ids: Vec<_> = e.messages().iter().map(|m| m.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn deliveries_keep_scheduling_order_despite_jitter() {
    // Greeting and its enumeration take a tick each; the Academic reply types
    // slowly and the enumeration that follows it types fast.
    let delays = VecDeque::from([TICK, TICK, Duration::from_millis(2000), Duration::from_millis(10)]);
    let mut e = engine_with(InputMode::FreeText, Box::new(ScriptedDelay(delays)));
    let t0 = Instant::now();
    e.start_at(t0);
    let t1 = t0 + LATER;
    e.poll_at(t1);
    e.submit_text_at("1", t1).unwrap();

    assert!(e.poll_at(t1 + Duration::from_millis(1999)).is_empty());
    let first = e.poll_at(t1 + Duration::from_millis(2000));
    assert_eq!(first.len(), 1);
    assert!(first[0].content.starts_with("I'd be happy to help with academic"));
    assert!(e.is_typing());

    let second = e.poll_at(t1 + Duration::from_millis(2010));
    assert_eq!(second.len(), 1);
    assert!(second[0].content.starts_with("Reply with the number"));
    assert!(!e.is_typing());
}

#[test]
fn late_poll_delivers_backlog_in_order() {
    let mut e = engine(InputMode::FreeText);
    let t0 = Instant::now();
    e.start_at(t0);

    let delivered = e.poll_at(t0 + LATER);
    assert_eq!(delivered.len(), 2);
    assert!(delivered[0].content.contains("Sarah"));
    assert!(delivered[0].options.is_empty());
    assert!(delivered[1].content.contains("1. 📚 Academic Issues"));
    assert_eq!(delivered[1].options.len(), 5);
}

// =============================================================================
// submit_text
// =============================================================================

#[test]
fn submit_before_start_is_rejected() {
    let mut e = engine(InputMode::FreeText);
    assert_eq!(e.submit_text_at("1", Instant::now()), Err(ChatError::NotStarted));
    assert!(e.messages().is_empty());
}

#[test]
fn typed_id_matches_clicking_the_option() {
    let t0 = Instant::now();

    let mut clicked = engine(InputMode::FreeText);
    let t = started(&mut clicked, t0);
    clicked.select_option_at(&offered(&clicked, "Technical"), t).unwrap();
    settle(&mut clicked, t);

    let mut typed = engine(InputMode::FreeText);
    let t = started(&mut typed, t0);
    let outcome = typed.submit_text_at(" 3 ", t).unwrap();
    settle(&mut typed, t);

    assert_eq!(outcome, TextOutcome::Selected { node: "technical".into() });
    assert_eq!(typed.current_node(), clicked.current_node());
    assert_eq!(bot_contents(&typed), bot_contents(&clicked));
    assert_eq!(typed.messages().len(), clicked.messages().len());
    assert_eq!(typed.offered(), clicked.offered());

    let echo = typed.messages().iter().find(|m| m.role == Role::User).unwrap();
    assert_eq!(echo.content, " 3 ");
}

#[test]
fn unmatched_text_reprompts_once_and_stays_put() {
    let mut e = engine(InputMode::FreeText);
    let t = started(&mut e, Instant::now());
    let bots_before = bot_contents(&e).len();
    let offered_before = e.offered().to_vec();

    let outcome = e.submit_text_at("what about lunch?", t).unwrap();
    assert_eq!(outcome, TextOutcome::Reprompted);
    settle(&mut e, t);

    let bots = bot_contents(&e);
    assert_eq!(bots.len(), bots_before + 1);
    assert!(bots[bots.len() - 1].contains("1, 2, 3, 4, 5"));
    assert_eq!(e.current_node(), ROOT_NODE);
    assert_eq!(e.offered(), offered_before.as_slice());
}

#[test]
fn pending_reprompt_is_withdrawn_when_user_answers_first() {
    let mut e = engine(InputMode::FreeText);
    let t = started(&mut e, Instant::now());
    let bots_before = bot_contents(&e).len();

    assert_eq!(e.submit_text_at("hello", t).unwrap(), TextOutcome::Reprompted);
    assert_eq!(e.submit_text_at("1", t).unwrap(), TextOutcome::Selected { node: "academic".into() });
    settle(&mut e, t);

    let bots = bot_contents(&e);
    assert!(bots.iter().all(|b| !b.starts_with("Sorry")), "{bots:?}");
    assert!(bots[bots_before].contains("academic matters"));
    assert_eq!(e.current_node(), "academic");
    assert_eq!(e.offered().len(), 4);
}

#[test]
fn delivered_reprompt_stays_in_transcript_after_answer() {
    let mut e = engine(InputMode::FreeText);
    let t = started(&mut e, Instant::now());

    e.submit_text_at("hello", t).unwrap();
    let t = settle(&mut e, t);
    e.submit_text_at("1", t).unwrap();
    settle(&mut e, t);

    assert_eq!(bot_contents(&e).iter().filter(|b| b.starts_with("Sorry")).count(), 1);
}

#[test]
fn buttons_mode_shares_the_reprompt_policy() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());

    assert_eq!(e.submit_text_at("9", t).unwrap(), TextOutcome::Reprompted);
    let t = settle(&mut e, t);
    assert_eq!(e.submit_text_at("5", t).unwrap(), TextOutcome::Selected { node: "contact".into() });
}

#[test]
fn free_text_mode_enumerates_options_after_node_message() {
    let mut e = engine(InputMode::FreeText);
    let t = started(&mut e, Instant::now());
    e.submit_text_at("2", t).unwrap();
    settle(&mut e, t);

    let bots = bot_contents(&e);
    let n = bots.len();
    assert!(bots[n - 2].starts_with("I can help you with account-related issues"));
    assert_eq!(
        bots[n - 1],
        enumerate_options(&e.graph().get("account").unwrap().options)
    );
    assert_eq!(e.offered().len(), 4);
}

#[test]
fn text_while_bot_is_typing_is_ignored() {
    let mut e = engine(InputMode::FreeText);
    let t = started(&mut e, Instant::now());
    e.submit_text_at("1", t).unwrap();

    assert_eq!(e.submit_text_at("1", t).unwrap(), TextOutcome::Ignored);
    settle(&mut e, t);
    assert_eq!(e.current_node(), "academic");
}

#[test]
fn text_at_terminal_node_restarts_from_root() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());
    e.submit_text_at("5", t).unwrap();
    let t = settle(&mut e, t);
    assert_eq!(e.current_node(), "contact");

    assert_eq!(e.submit_text_at("thanks", t).unwrap(), TextOutcome::Restarting);
    assert_eq!(e.current_node(), "contact");

    let restart = e.poll_at(t + TICK);
    assert_eq!(restart.len(), 1);
    assert_eq!(restart[0].content, RESTART_PROMPT);
    assert_eq!(e.current_node(), "contact");

    let welcome = e.poll_at(t + LATER);
    assert_eq!(welcome.len(), 1);
    assert!(welcome[0].content.contains("Sarah"));
    assert_eq!(e.current_node(), ROOT_NODE);
    assert_eq!(e.offered().len(), 5);
}

#[test]
fn repeated_text_while_restarting_does_not_double_schedule() {
    let mut e = engine(InputMode::Buttons);
    let t = started(&mut e, Instant::now());
    e.submit_text_at("5", t).unwrap();
    let t = settle(&mut e, t);

    e.submit_text_at("help", t).unwrap();
    assert_eq!(e.submit_text_at("help!!", t).unwrap(), TextOutcome::Ignored);
    settle(&mut e, t);

    let greetings = bot_contents(&e).iter().filter(|c| c.contains("Sarah")).count();
    assert_eq!(greetings, 2);
    assert_eq!(bot_contents(&e).iter().filter(|c| *c == RESTART_PROMPT).count(), 1);
}

// =============================================================================
// Helpers
// =============================================================================

#[test]
fn enumerate_options_lists_id_and_label() {
    let options = vec![
        FlowOption { id: "1".into(), label: "Yes".into(), next: "a".into() },
        FlowOption { id: "2".into(), label: "No".into(), next: "b".into() },
    ];
    assert_eq!(enumerate_options(&options), "Reply with the number of your choice:\n1. Yes\n2. No");
}

#[test]
fn reprompt_lists_valid_ids() {
    let options = vec![
        FlowOption { id: "1".into(), label: "Yes".into(), next: "a".into() },
        FlowOption { id: "2".into(), label: "No".into(), next: "b".into() },
    ];
    assert_eq!(reprompt(&options), "Sorry, I didn't catch that. Please reply with one of: 1, 2.");
}

#[test]
fn not_started_error_code() {
    assert_eq!(ChatError::NotStarted.error_code(), "E_NOT_STARTED");
}

#[test]
fn input_mode_reflects_config() {
    assert_eq!(engine(InputMode::FreeText).input_mode(), InputMode::FreeText);
    assert_eq!(engine(InputMode::Buttons).input_mode(), InputMode::Buttons);
}
