//! The main loop fed by typed lines and a scripted voice listener.

use crate::helpers::{Action, Harness, ScriptedRecognizer, local_harness, test_config};
use buddy::config::VoiceConfig;
use buddy::intent::ScrollDirection;
use buddy::{AppInput, AudioCaptureLoop, BuddyApp};
use std::time::Duration;

async fn run_to_end(app: BuddyApp) {
    tokio::time::timeout(Duration::from_secs(10), app.run())
        .await
        .unwrap_or_else(|_| panic!("app did not finish"))
        .unwrap_or_else(|e| panic!("app failed: {e}"));
}

#[tokio::test]
async fn typed_lines_until_exit() {
    let Harness {
        orchestrator,
        driver,
        voice,
        speech,
        ..
    } = local_harness();
    let app = BuddyApp::from_parts(test_config(), orchestrator, speech.clone(), None);
    let input = app.input();

    input.send(AppInput::Line("type hello".into())).await.unwrap();
    input.send(AppInput::Line("   ".into())).await.unwrap();
    input.send(AppInput::Line("/exit".into())).await.unwrap();
    input.send(AppInput::Line("type ignored".into())).await.unwrap();
    run_to_end(app).await;

    assert_eq!(driver.actions(), vec![Action::Type("hello".into())]);
    assert_eq!(voice.spoken(), ["I'll type for you now.", "Goodbye!"]);
    assert!(speech.is_closed());
}

#[tokio::test]
async fn end_of_input_stops_text_only_loop() {
    let Harness {
        orchestrator,
        driver,
        speech,
        ..
    } = local_harness();
    let app = BuddyApp::from_parts(test_config(), orchestrator, speech, None);
    let input = app.input();

    input.send(AppInput::Line("scroll up".into())).await.unwrap();
    input.send(AppInput::EndOfInput).await.unwrap();
    run_to_end(app).await;

    assert_eq!(driver.actions(), vec![Action::Scroll(5, ScrollDirection::Up)]);
}

#[tokio::test]
async fn voice_transcripts_are_handled_in_order() {
    let Harness {
        orchestrator,
        driver,
        voice,
        speech,
        ..
    } = local_harness();
    let voice_config = VoiceConfig {
        listen_timeout_ms: 20,
        calibration_ms: 1,
        stop_timeout_ms: 500,
        ..VoiceConfig::default()
    };
    let listener = AudioCaptureLoop::new(
        Box::new(ScriptedRecognizer::new(&["scroll down 3", "quit"])),
        voice_config,
    );
    let app = BuddyApp::from_parts(test_config(), orchestrator, speech, Some(listener));
    run_to_end(app).await;

    assert_eq!(
        driver.actions(),
        vec![Action::Scroll(3, ScrollDirection::Down)]
    );
    assert_eq!(
        voice.spoken(),
        ["I'll scroll for you now.", "I'll exit for you now.", "Goodbye!"]
    );
}

#[tokio::test]
async fn listen_command_without_microphone_reports_it() {
    let Harness {
        orchestrator,
        transcript,
        speech,
        ..
    } = local_harness();
    let app = BuddyApp::from_parts(test_config(), orchestrator, speech, None);
    let input = app.input();

    input.send(AppInput::Line("/listen".into())).await.unwrap();
    input.send(AppInput::EndOfInput).await.unwrap();
    run_to_end(app).await;

    let last = transcript.entries().pop().unwrap();
    assert_eq!(last.text, "Voice input is not available.");
}
