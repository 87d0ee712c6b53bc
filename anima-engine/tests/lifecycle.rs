//! End-to-end persona lifecycle against a scripted model.
//!
//! Covers derivation (original and grounded), fail-soft behaviour on errors
//! and timeouts, turn assembly as seen by the model, and per-persona
//! serialization in the registry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use anima_core::{
    AnimaConfig, MoodState, Originality, PersonaId, PersonaIdentity, PersonaPhase, PersonaSnapshot,
    StyleCorpus, TraitProfile, STYLE_PLACEHOLDER,
};
use anima_engine::{ChatTurn, DerivationOutcome, EngineError, Persona, PersonaRegistry, PersonaRuntime};
use anima_llm::{LlmError, Role, ScriptedModel};

const TRAITS_JSON: &str = r#"Sure! ```json
{"openness": 0.82, "conscientiousness": 0.31, "extraversion": 0.12,
 "agreeableness": 0.74, "neuroticism": 0.66, "traits": ["wry", "protective"]}
```"#;

const STYLE_JSON: &str = r#"[
  {"scene": "Patient complains", "inner_monologue": "Third time tonight.",
   "dialogue": "Yes, yes, I'll bring the blanket.", "action_and_tone": "sighing, already moving", "mood": "tired"},
  {"scene": "Doctor is rude", "inner_monologue": "Breathe.",
   "dialogue": "Then do it yourself, doctor.", "action_and_tone": "sweet smile, cold eyes", "mood": "irritated"}
]"#;

fn runtime(model: &Arc<ScriptedModel>, config: AnimaConfig) -> PersonaRuntime {
    PersonaRuntime::new(model.clone(), config).expect("runtime")
}

fn nurse(model: &Arc<ScriptedModel>) -> Persona {
    Persona::new(
        PersonaIdentity::new("Mika Aoyama", "female", Originality::Original),
        runtime(model, AnimaConfig::default()),
    )
}

fn ready_snapshot(name: &str) -> PersonaSnapshot {
    PersonaSnapshot {
        id: PersonaId::new(),
        identity: PersonaIdentity::new(name, "female", Originality::Original),
        phase: PersonaPhase::ProfileReady,
        profile: TraitProfile::default(),
        mood: MoodState::default(),
        style: StyleCorpus::default(),
        saved_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Full lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn original_persona_full_lifecycle() {
    let model = Arc::new(ScriptedModel::with_texts([TRAITS_JSON, STYLE_JSON, "Hmph. You again?"]));
    let mut persona = nurse(&model);
    assert_eq!(persona.phase(), PersonaPhase::Uninitialized);

    let outcome = persona
        .initialize("A night-shift nurse who hides her kindness behind sarcasm.")
        .await
        .expect("initialize");
    assert_eq!(outcome, DerivationOutcome::Derived);
    assert_eq!(persona.phase(), PersonaPhase::ProfileReady);
    assert!((persona.profile().openness() - 0.82).abs() < 1e-6);
    assert_eq!(persona.profile().labels, vec!["wry", "protective"]);

    let outcome = persona.set_style(Vec::new()).await.expect("style");
    assert_eq!(outcome, DerivationOutcome::Derived);
    assert_eq!(persona.phase(), PersonaPhase::StyleReady);
    assert_eq!(
        persona.style().entries(),
        &[
            "[tired] Yes, yes, I'll bring the blanket. (sighing, already moving)".to_string(),
            "[irritated] Then do it yourself, doctor. (sweet smile, cold eyes)".to_string(),
        ]
    );

    persona.apply_stimulus(-0.6, 0.4, 0.3);
    let history = vec![
        ChatTurn::new("system", "ignored"),
        ChatTurn::new("user", "Evening."),
        ChatTurn::new("model", "What now?"),
    ];
    let reply = persona.chat("Can I get some water?", &history).await.expect("chat");
    assert_eq!(reply, "Hmph. You again?");
    assert_eq!(persona.phase(), PersonaPhase::StyleReady);

    let requests = model.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| !r.web_search));

    let turn = &requests[2];
    assert_eq!(turn.prompt, "Can I get some water?");
    let roles: Vec<Role> = turn.history.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    let system = turn.system.as_deref().expect("system instruction");
    assert!(system.starts_with("You are Mika Aoyama (female)."));
    assert!(system.contains("Openness: 0.82"));
    assert!(system.contains("[Current mood: Angry | P=-0.6, A=0.4, D=0.3]"));
    assert!(system.contains("\"Can I get some water?\""));
    assert!(system.contains("Then do it yourself, doctor."));
}

#[tokio::test]
async fn existing_character_is_grounded() {
    let model = Arc::new(ScriptedModel::with_texts([
        r#"{"openness": 0.9, "conscientiousness": 0.8, "extraversion": 0.3, "agreeableness": 0.2,
            "neuroticism": 0.4, "traits": ["deductive"], "source_work": ["A Study in Scarlet"],
            "keywords": ["Baker Street"]}"#,
        STYLE_JSON,
    ]));
    let mut persona = Persona::new(
        PersonaIdentity::new("Sherlock Holmes", "male", Originality::Existing),
        runtime(&model, AnimaConfig::default()),
    );

    persona.initialize("The consulting detective.").await.expect("init");
    assert_eq!(persona.profile().provenance.source_work, vec!["A Study in Scarlet"]);
    persona.set_style(Vec::new()).await.expect("style");

    let requests = model.requests();
    assert!(requests.iter().all(|r| r.web_search));
    assert!(requests[0].prompt.contains("search the web for the character Sherlock Holmes"));
    assert!(requests[1].prompt.contains("Known works: A Study in Scarlet"));
    assert!(requests[1].prompt.contains("Keywords: Baker Street"));
}

#[tokio::test]
async fn explicit_examples_skip_the_model() {
    let model = Arc::new(ScriptedModel::with_texts([TRAITS_JSON]));
    let mut persona = nurse(&model);
    persona.initialize("A nurse.").await.expect("init");

    let outcome = persona
        .set_style(vec!["Don't make me repeat myself.".into(), "Fine. Sit.".into()])
        .await
        .expect("style");
    assert!(outcome.is_derived());
    assert_eq!(persona.style().joined(), "Don't make me repeat myself.\nFine. Sit.");
    assert_eq!(model.call_count(), 1);
}

// ---------------------------------------------------------------------------
// Fail-soft derivation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trait_failures_keep_defaults_and_still_advance() {
    let model = Arc::new(ScriptedModel::new());
    model.push_text("I'm not able to rate fictional people.");
    model.push_empty();
    model.push_error(LlmError::Unavailable("connection refused".into()));

    let mut persona = nurse(&model);
    for _ in 0..3 {
        let outcome = persona.initialize("A nurse.").await.expect("never raises");
        assert!(matches!(outcome, DerivationOutcome::Retained { .. }), "{outcome:?}");
        assert_eq!(persona.profile(), &TraitProfile::default());
        assert_eq!(persona.phase(), PersonaPhase::ProfileReady);
    }
}

#[tokio::test]
async fn failed_rederivation_keeps_previous_profile() {
    let model = Arc::new(ScriptedModel::with_texts([TRAITS_JSON]));
    model.push_error(LlmError::RetriesExhausted { attempts: 3, last_error: "503".into() });
    let mut persona = nurse(&model);

    persona.initialize("A nurse.").await.expect("first");
    let before = persona.profile().clone();
    let outcome = persona.initialize("A different nurse.").await.expect("second");
    assert!(matches!(outcome, DerivationOutcome::Retained { reason } if reason.contains("503")));
    assert_eq!(persona.profile(), &before);
}

#[tokio::test]
async fn unusable_style_answer_gives_placeholder() {
    let model = Arc::new(ScriptedModel::with_texts([TRAITS_JSON, "Sorry, I can't do that."]));
    let mut persona = nurse(&model);
    persona.initialize("A nurse.").await.expect("init");

    let outcome = persona.set_style(Vec::new()).await.expect("style");
    assert!(matches!(outcome, DerivationOutcome::Fallback { .. }));
    assert_eq!(persona.style().entries(), &[STYLE_PLACEHOLDER.to_string()]);
    assert_eq!(persona.phase(), PersonaPhase::StyleReady);
}

#[tokio::test]
async fn failed_style_call_keeps_prior_corpus() {
    let model = Arc::new(ScriptedModel::with_texts([TRAITS_JSON]));
    model.push_error(LlmError::Timeout(30_000));
    let mut persona = nurse(&model);
    persona.initialize("A nurse.").await.expect("init");
    persona.set_style(vec!["Hmph.".into()]).await.expect("explicit");

    let outcome = persona.set_style(Vec::new()).await.expect("style");
    assert!(matches!(outcome, DerivationOutcome::Retained { .. }));
    assert_eq!(persona.style().joined(), "Hmph.");
}

#[tokio::test(start_paused = true)]
async fn slow_model_times_out_and_state_is_kept() {
    let model = Arc::new(ScriptedModel::with_texts([TRAITS_JSON]).with_delay(Duration::from_secs(60)));
    let mut config = AnimaConfig::default();
    config.llm.request_timeout_ms = 1_000;
    let mut persona = Persona::new(
        PersonaIdentity::new("Mika", "female", Originality::Original),
        runtime(&model, config),
    );

    let outcome = persona.initialize("A nurse.").await.expect("never raises");
    assert!(matches!(outcome, DerivationOutcome::Retained { reason } if reason.contains("timed out")));
    assert_eq!(persona.profile(), &TraitProfile::default());
    assert_eq!(persona.phase(), PersonaPhase::ProfileReady);

    let err = persona.chat("hello?", &[]).await.expect_err("times out");
    assert!(matches!(err, EngineError::Llm(LlmError::Timeout(1_000))));
}

// ---------------------------------------------------------------------------
// Chat errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_errors_are_typed() {
    let model = Arc::new(ScriptedModel::with_texts([TRAITS_JSON]));
    let mut persona = nurse(&model);
    persona.initialize("A nurse.").await.expect("init");

    assert!(matches!(persona.chat("  ", &[]).await, Err(EngineError::InvalidArgument(_))));

    model.push_empty();
    assert!(matches!(persona.chat("hi", &[]).await, Err(EngineError::NoResponse)));

    model.push_error(LlmError::Provider { status: 401, body: "bad key".into() });
    let err = persona.chat("hi", &[]).await.expect_err("provider error");
    assert!(matches!(err, EngineError::Llm(LlmError::Provider { status: 401, .. })));

    let mood_before = *persona.mood();
    model.push_text("Fine.");
    persona.chat("hi", &[]).await.expect("ok");
    assert_eq!(persona.mood(), &mood_before);
}

// ---------------------------------------------------------------------------
// Registry concurrency
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn registry_serializes_one_persona_but_not_many() {
    let model = Arc::new(ScriptedModel::with_texts(["a", "b", "c", "d"]).with_delay(Duration::from_millis(100)));
    let registry = PersonaRegistry::new(runtime(&model, AnimaConfig::default()));
    let shared = registry.restore(ready_snapshot("Shared"));
    let other = registry.restore(ready_snapshot("Other"));

    // Same persona twice: the second call waits for the first.
    let start = tokio::time::Instant::now();
    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let handle = Arc::clone(&shared);
            tokio::spawn(async move { handle.lock().await.chat("hi", &[]).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("join").expect("chat");
    }
    assert!(start.elapsed() >= Duration::from_millis(200));

    // Two personas: the calls overlap.
    let start = tokio::time::Instant::now();
    let tasks: Vec<_> = [Arc::clone(&shared), Arc::clone(&other)]
        .into_iter()
        .map(|handle| tokio::spawn(async move { handle.lock().await.chat("hi", &[]).await }))
        .collect();
    for task in tasks {
        task.await.expect("join").expect("chat");
    }
    assert!(start.elapsed() < Duration::from_millis(200));
    assert_eq!(model.call_count(), 4);
}

// ---------------------------------------------------------------------------
// Host integration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_from_json_transport() {
    let history: Vec<ChatTurn> = serde_json::from_str(
        r#"[{"role": "user", "content": "Hi."},
            {"role": "assistant", "content": "Hm."},
            {"role": "narrator", "content": "dropped"}]"#,
    )
    .expect("history json");

    let model = Arc::new(ScriptedModel::with_texts([TRAITS_JSON, "What?"]));
    let mut persona = nurse(&model);
    persona.initialize("A nurse.").await.expect("init");
    persona.chat("Still there?", &history).await.expect("chat");

    let turn = &model.requests()[1];
    assert_eq!(turn.history.len(), 2);
    assert_eq!(turn.history[1].role, Role::Assistant);
    assert_eq!(turn.history[1].content, "Hm.");
}

#[tokio::test]
async fn template_overrides_reach_the_model() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("mood_header.toml"),
        "[prompt]\nversion = \"2\"\ntext = \"(feeling {mood_label})\"\n",
    )
    .expect("write override");

    let mut config = AnimaConfig::default();
    config.prompt.template_dir = Some(dir.path().to_path_buf());
    let model = Arc::new(ScriptedModel::with_texts([TRAITS_JSON, "Mm."]));
    let mut persona = Persona::new(
        PersonaIdentity::new("Mika", "female", Originality::Original),
        runtime(&model, config),
    );
    persona.initialize("A nurse.").await.expect("init");
    persona.chat("hello", &[]).await.expect("chat");

    let system = model.requests()[1].system.clone().expect("system");
    assert!(system.contains("(feeling Neutral)"));
    assert!(!system.contains("[Current mood:"));
}

#[tokio::test]
async fn registry_survives_restart_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let persistence = anima_core::config::PersistenceConfig {
        path: dir.path().join("personas.db"),
        ..Default::default()
    };

    let model = Arc::new(ScriptedModel::with_texts([TRAITS_JSON]));
    let id = {
        let store = parking_lot::Mutex::new(
            anima_core::persistence::PersonaStore::open_configured(&persistence).expect("open"),
        );
        let registry = PersonaRegistry::new(runtime(&model, AnimaConfig::default()));
        let (id, handle) =
            registry.create(PersonaIdentity::new("Mika", "female", Originality::Original));
        handle.lock().await.initialize("A nurse.").await.expect("init");
        assert_eq!(registry.save_all(&store).await.expect("save"), 1);
        id
    };

    let store = anima_core::persistence::PersonaStore::open_configured(&persistence).expect("reopen");
    let registry = PersonaRegistry::new(runtime(&model, AnimaConfig::default()));
    assert_eq!(registry.load_all(&store).expect("load"), 1);
    let handle = registry.get(&id).expect("restored");
    let persona = handle.lock().await;
    assert_eq!(persona.phase(), PersonaPhase::ProfileReady);
    assert!((persona.profile().neuroticism() - 0.66).abs() < 1e-6);
}
