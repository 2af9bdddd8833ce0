//! Property-based tests for the state machine
//!
//! Random event streams are pushed through a real engine; the invariants are
//! checked against the session store after every step.

use super::*;
use crate::engine::{Engine, EngineSettings, LogSink};
use crate::session::{fields, SubjectId};
use crate::validate::{is_valid_email, is_valid_phone};
use proptest::prelude::*;
use tokio::sync::mpsc;

// ============================================================================
// Test Helpers
// ============================================================================

const SUBJECTS: [&str; 3] = ["U1", "U2", "U3"];

fn test_engine() -> (Engine<LogSink>, mpsc::Receiver<Action>) {
    let definition = standard_definition(FlowSettings::default(), &["start".to_string()])
        .expect("standard definition validates");
    let (tx, rx) = mpsc::channel(64);
    (
        Engine::new(definition, LogSink, EngineSettings::default(), tx),
        rx,
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn is_command_like(value: &str) -> bool {
    value.trim_start().starts_with('/')
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_command() -> impl Strategy<Value = Input> {
    prop_oneof![
        Just("start"),
        Just("signup"),
        Just("login"),
        Just("services"),
        Just("support"),
        Just("cancel"),
        Just("help"),
        Just("settings"),
    ]
    .prop_map(Input::command)
}

fn arb_text() -> impl Strategy<Value = Input> {
    prop_oneof![
        "[a-zA-Z ]{0,20}",
        "[a-z]{1,8}@[a-z]{1,8}\\.[a-z]{2,4}",
        "\\+?[0-9]{7,12}",
        "/[a-z]{1,8}",
        ".{0,40}",
    ]
    .prop_map(|text| Input::from_message_text(&text))
}

fn arb_selection() -> impl Strategy<Value = Input> {
    prop_oneof![
        Just("menu:signup".to_string()),
        Just("menu:login".to_string()),
        Just("menu:services".to_string()),
        Just("menu:support".to_string()),
        Just("service:web".to_string()),
        Just("service:mobile".to_string()),
        Just("confirm:yes".to_string()),
        Just("confirm:back".to_string()),
        Just("confirm:cancel".to_string()),
        "[a-z:]{0,12}",
    ]
    .prop_map(|token| Input::Selection {
        token,
        ack: AckHandle("cb".into()),
        origin: Some(MessageRef(7)),
    })
}

fn arb_input() -> impl Strategy<Value = Input> {
    prop_oneof![arb_command(), arb_text(), arb_selection()]
}

fn arb_event() -> impl Strategy<Value = Event> {
    (0..SUBJECTS.len(), arb_input()).prop_map(|(i, input)| Event::new(SUBJECTS[i], input))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// After every dispatch the subject's session is absent or parked in a
    /// declared state, and collected values are never commands.
    #[test]
    fn prop_dispatch_preserves_store_invariants(
        events in proptest::collection::vec(arb_event(), 0..40)
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (engine, _outbox) = test_engine();
            for event in events {
                let subject = event.subject_id.clone();
                engine.dispatch(event).await;

                if let Some(session) = engine.store().get(&subject).await {
                    prop_assert!(engine.definition().is_declared(session.current_state));
                    prop_assert_eq!(&session.subject_id, &subject);
                    for value in session.collected_fields.values() {
                        prop_assert!(!is_command_like(value), "command stored: {value}");
                    }
                    if let Some(email) = session.field(fields::EMAIL) {
                        prop_assert!(is_valid_email(email));
                    }
                    if let Some(phone) = session.field(fields::PHONE) {
                        prop_assert!(is_valid_phone(phone));
                    }
                }
                prop_assert!(engine.store().active_count() <= SUBJECTS.len());
            }
            Ok(())
        })?;
    }

    /// Whatever happened before, an entry command starts over from scratch.
    #[test]
    fn prop_reentry_resets(
        events in proptest::collection::vec(arb_event(), 0..30),
        which in 0..SUBJECTS.len()
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (engine, _outbox) = test_engine();
            for event in events {
                engine.dispatch(event).await;
            }
            let subject = SubjectId::from(SUBJECTS[which]);
            engine.dispatch(Event::command(subject.clone(), "start")).await;

            let session = engine.store().get(&subject).await;
            prop_assert!(session.is_some());
            let session = session.unwrap();
            prop_assert_eq!(session.current_state, State::MainMenu);
            prop_assert!(session.collected_fields.is_empty());
            Ok(())
        })?;
    }

    /// A selection is acknowledged exactly once, after everything else.
    #[test]
    fn prop_selection_acknowledged_once(
        prefix in proptest::collection::vec(arb_event(), 0..20),
        selection in arb_selection()
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (engine, _outbox) = test_engine();
            for event in prefix {
                engine.dispatch(event).await;
            }
            let actions = engine.dispatch(Event::new("U1", selection)).await;

            let acks = actions
                .iter()
                .filter(|a| matches!(a, Action::Acknowledge { .. }))
                .count();
            prop_assert_eq!(acks, 1);
            prop_assert!(
                matches!(actions.last(), Some(Action::Acknowledge { .. })),
                "selection not acknowledged last: {:?}",
                actions
            );
            Ok(())
        })?;
    }

    /// Commands and text never produce an acknowledgement, and the engine
    /// never hands a Notify to the caller.
    #[test]
    fn prop_non_selection_never_acknowledged(
        events in proptest::collection::vec(arb_event(), 0..30)
    ) {
        let rt = runtime();
        rt.block_on(async {
            let (engine, _outbox) = test_engine();
            for event in events {
                let is_selection = event.input.kind() == InputKind::Selection;
                let actions = engine.dispatch(event).await;
                for action in &actions {
                    prop_assert!(
                        !matches!(action, Action::Notify { .. }),
                        "notify leaked into dispatch output: {:?}",
                        action
                    );
                    if !is_selection {
                        prop_assert!(
                            !matches!(action, Action::Acknowledge { .. }),
                            "acknowledged a non-selection: {:?}",
                            action
                        );
                    }
                }
            }
            Ok(())
        })?;
    }

    /// Validators are total and agree with the shapes they advertise.
    #[test]
    fn prop_validators_total(text in ".{0,64}") {
        let _ = is_valid_email(&text);
        let _ = is_valid_phone(&text);
    }

    #[test]
    fn prop_well_formed_contacts_accepted(
        local in "[a-z0-9.]{1,10}",
        domain in "[a-z]{1,10}",
        tld in "[a-z]{2,5}",
        digits in "[0-9]{7,12}"
    ) {
        let email = format!("{local}@{domain}.{tld}");
        prop_assert!(is_valid_email(&email));
        let phone = format!("+{digits}");
        prop_assert!(is_valid_phone(&phone));
    }
}
