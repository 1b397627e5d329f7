//! Configuration files as a user would write them.

use buddy::config::{BuddyConfig, IntentStrategy, MIN_HISTORY};

#[test]
fn partial_file_fills_in_defaults() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[llm]
model = "mistral"
base_url = "http://10.0.0.5:11434"

[intent]
strategy = "keyword"

[chat_interface]
max_history = 10

[[llm_rules.response_rules]]
rule = "custom_greeting"
intent = "greeting"
response = "At your service."
"#,
    )
    .unwrap();

    let config = BuddyConfig::from_file(&path).unwrap();
    assert_eq!(config.llm.model, "mistral");
    assert_eq!(config.llm.base_url, "http://10.0.0.5:11434");
    assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.intent.strategy, IntentStrategy::Keyword);
    assert_eq!(config.chat_interface.max_history, MIN_HISTORY);
    assert_eq!(
        config.llm_rules.response_for("greeting"),
        Some("At your service.")
    );
    assert_eq!(config.tts.rate, 225);
}

#[test]
fn first_run_writes_defaults() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("config.toml");

    let config = BuddyConfig::load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.chat_interface.assistant_name, "Buddy");

    let reloaded = BuddyConfig::load_or_create(&path).unwrap();
    assert_eq!(reloaded.voice.wake_word, config.voice.wake_word);
    assert_eq!(reloaded.stt.endpoint, config.stt.endpoint);
}

#[test]
fn strategy_names_parse() {
    assert_eq!("auto".parse::<IntentStrategy>().unwrap(), IntentStrategy::Auto);
    assert_eq!("REMOTE".parse::<IntentStrategy>().unwrap(), IntentStrategy::Remote);
    assert!("spacy".parse::<IntentStrategy>().is_err());
}
