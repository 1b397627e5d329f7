//! Utterance → intent → confirmation → desktop action, with local strategies.

use crate::helpers::{Action, RecordingDriver, keyword_harness, local_harness};
use buddy::chat::{ChatCommand, ChatInput};
use buddy::intent::{Intent, ScrollDirection};
use buddy::orchestrator::{APOLOGY, CommandOutcome, FAREWELL, HELP_TEXT, UNKNOWN_MESSAGE};
use buddy::transcript::Speaker;

fn combo(keys: &[&str]) -> Action {
    Action::Combo(keys.iter().map(|k| (*k).to_owned()).collect())
}

#[tokio::test]
async fn open_website_runs_browser_sequence() {
    let h = local_harness();
    let resolution = h.orchestrator.handle_text("open youtube.com").await;

    assert_eq!(resolution.intent(), Intent::Open);
    assert_eq!(resolution.target(), Some("youtube.com"));
    assert_eq!(
        h.driver.actions(),
        vec![
            combo(&["command", "space"]),
            Action::Type("safari".into()),
            Action::Key("enter".into()),
            Action::Type("youtube.com".into()),
            Action::Key("enter".into()),
        ]
    );
    assert_eq!(h.spoken().await, ["I'll open for you now."]);
}

#[tokio::test]
async fn open_application_skips_browser() {
    let h = local_harness();
    h.orchestrator.handle_text("launch calculator").await;

    assert_eq!(
        h.driver.actions(),
        vec![
            combo(&["command", "space"]),
            Action::Type("calculator".into()),
            Action::Key("enter".into()),
        ]
    );
}

#[tokio::test]
async fn click_targets_screen_centre() {
    let h = local_harness();
    let resolution = h.orchestrator.handle_text("click the submit button").await;

    assert_eq!(resolution.target(), Some("the submit button"));
    assert_eq!(h.driver.actions(), vec![Action::Click(Some(960), Some(540))]);
    assert_eq!(h.spoken().await, ["I'll click for you now."]);
}

#[tokio::test]
async fn scroll_and_type_reach_the_driver() {
    let h = local_harness();
    h.orchestrator.handle_text("scroll up 10").await;
    h.orchestrator.handle_text("scroll down abc").await;
    h.orchestrator.handle_text("type hello world").await;

    assert_eq!(
        h.driver.actions(),
        vec![
            Action::Scroll(10, ScrollDirection::Up),
            Action::Scroll(5, ScrollDirection::Down),
            Action::Type("hello world".into()),
        ]
    );
}

#[tokio::test]
async fn unknown_request_gets_help_style_reply() {
    let h = local_harness();
    let resolution = h.orchestrator.handle_text("banana").await;

    assert_eq!(resolution.intent(), Intent::Unknown);
    assert!(h.driver.actions().is_empty());
    assert_eq!(h.spoken().await, [UNKNOWN_MESSAGE]);
}

#[tokio::test]
async fn non_ascii_utterance_is_an_ordinary_miss() {
    let h = local_harness();
    let resolution = h.orchestrator.handle_text("please see a\u{1041}ed now").await;

    assert_eq!(resolution.intent(), Intent::Unknown);
    assert!(h.driver.actions().is_empty());
    assert_eq!(h.spoken().await, [UNKNOWN_MESSAGE]);
    assert!(h.orchestrator.is_running());
}

#[tokio::test]
async fn help_speaks_capabilities() {
    let h = local_harness();
    h.orchestrator.handle_text("what can you do").await;

    assert_eq!(h.spoken().await, ["I'll help for you now.", HELP_TEXT]);
    assert!(h.orchestrator.is_running());
}

#[tokio::test]
async fn exit_says_goodbye_and_stops() {
    let h = local_harness();
    h.orchestrator.handle_text("goodbye").await;

    assert!(!h.orchestrator.is_running());
    assert_eq!(h.spoken().await, ["I'll exit for you now.", FAREWELL]);
}

#[tokio::test]
async fn driver_failure_becomes_one_apology() {
    let h = keyword_harness(RecordingDriver::failing());
    h.orchestrator.handle_text("type hello").await;

    assert_eq!(h.driver.actions(), vec![Action::Type("hello".into())]);
    assert_eq!(h.spoken().await, ["I'll type for you now.", APOLOGY]);
}

#[tokio::test]
async fn website_sequence_stops_at_first_failure() {
    let h = keyword_harness(RecordingDriver::failing());
    h.orchestrator.handle_text("open example.org").await;

    assert_eq!(h.driver.actions(), vec![combo(&["command", "space"])]);
    assert_eq!(h.spoken().await, ["I'll open for you now.", APOLOGY]);
}

#[tokio::test]
async fn transcript_keeps_both_sides() {
    let h = local_harness();
    h.orchestrator.handle_text("scroll down").await;

    let entries = h.transcript.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].speaker, Speaker::User);
    assert_eq!(entries[0].text, "scroll down");
    assert_eq!(entries[1].speaker, Speaker::Assistant);
    assert_eq!(entries[1].text, "I'll scroll for you now.");
}

// ── Chat commands ──────────────────────────────────────────────

async fn command(h: &crate::helpers::Harness, line: &str) -> CommandOutcome {
    match ChatInput::parse(line) {
        ChatInput::Command(c) => h.orchestrator.handle_command(&c).await,
        other => panic!("{line} is not a command: {other:?}"),
    }
}

#[tokio::test]
async fn chat_commands_drive_the_desktop() {
    let h = local_harness();
    assert_eq!(command(&h, "/scroll 3 up").await, CommandOutcome::Handled);
    command(&h, "/key ctrl+c").await;
    command(&h, "/key enter").await;
    command(&h, "/type hi there").await;
    command(&h, "/click ok button").await;

    assert_eq!(
        h.driver.actions(),
        vec![
            Action::Scroll(3, ScrollDirection::Up),
            combo(&["ctrl", "c"]),
            Action::Key("enter".into()),
            Action::Type("hi there".into()),
            Action::Click(Some(960), Some(540)),
        ]
    );
}

#[tokio::test]
async fn chat_info_commands_write_to_transcript() {
    let h = local_harness();
    command(&h, "/help").await;
    command(&h, "/find search box").await;
    command(&h, "/screenshot").await;
    command(&h, "/frobnicate").await;
    command(&h, "/type").await;

    let system: Vec<String> = h
        .transcript
        .entries()
        .into_iter()
        .filter(|e| e.speaker == Speaker::System)
        .map(|e| e.text)
        .collect();
    assert_eq!(system.len(), 5);
    assert!(system[0].starts_with("Available commands:"));
    assert!(system[1].contains("search box"));
    assert!(system[2].starts_with("Screenshot saved to"));
    assert!(system[3].contains("/frobnicate"));
    assert_eq!(system[4], "Usage: /type [text]");
    assert_eq!(h.driver.actions(), vec![Action::Screenshot]);
}

#[tokio::test]
async fn listen_and_exit_commands() {
    let h = local_harness();
    assert_eq!(
        h.orchestrator.handle_command(&ChatCommand::Listen).await,
        CommandOutcome::ToggleListening
    );
    assert!(h.orchestrator.is_running());

    command(&h, "/quit").await;
    assert!(!h.orchestrator.is_running());
    assert_eq!(h.spoken().await, [FAREWELL]);
}
