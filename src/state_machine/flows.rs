//! The bot's flows, expressed as definition data
//!
//! Every flow contributes its states and bindings to one `Definition`. Which
//! flows exist is decided by `FlowSettings::enabled`; disabled flows leave no
//! states behind and never appear in the main menu.

mod login;
mod services;
mod signup;
mod support;

use super::action::{Action, Content, SubmissionRecord};
use super::definition::{
    Binding, Definition, DefinitionError, FlowSettings, Matcher, Outcome, Turn,
};
use super::state::{FlowKind, State};
use crate::session::fields;

const CANCEL_COMMAND: &str = "cancel";

/// Build and validate the definition for the enabled flows.
///
/// `entry_commands` all open the main menu. Each enabled flow can also be
/// started directly with its own command (`/signup`, `/login`, ...).
pub fn standard_definition(
    settings: FlowSettings,
    entry_commands: &[String],
) -> Result<Definition, DefinitionError> {
    let mut menu = Vec::new();
    for flow in FlowKind::ALL {
        if settings.is_enabled(flow) {
            menu.push(menu_binding(flow));
        }
    }

    let mut def = Definition::new(settings.clone()).with_state(State::MainMenu, menu);
    for command in entry_commands {
        def = def.with_entry(command, State::MainMenu, greet);
    }

    for flow in FlowKind::ALL {
        if !settings.is_enabled(flow) {
            continue;
        }
        def = match flow {
            FlowKind::Signup => signup::declare(def),
            FlowKind::Login => login::declare(def),
            FlowKind::Services => services::declare(def),
            FlowKind::Support => support::declare(def),
        };
        def = def.with_entry(flow.as_str(), flow.first_state(), greet);
    }

    def.with_fallback(Binding::command(CANCEL_COMMAND, cancel))
        .with_fallback(Binding::any_command(unknown_command))
        .with_fallback(Binding::selection(Matcher::Any, stray_selection, &[]))
        .with_fallback(Binding::text(stray_text, &[]))
        .validate()
}

fn menu_token(flow: FlowKind) -> &'static str {
    match flow {
        FlowKind::Signup => "menu:signup",
        FlowKind::Login => "menu:login",
        FlowKind::Services => "menu:services",
        FlowKind::Support => "menu:support",
    }
}

fn menu_binding(flow: FlowKind) -> Binding {
    let matcher = Matcher::Token(menu_token(flow));
    match flow {
        FlowKind::Signup => {
            Binding::selection(matcher, |t| enter_flow(t, FlowKind::Signup), &[State::AwaitName])
        }
        FlowKind::Login => Binding::selection(
            matcher,
            |t| enter_flow(t, FlowKind::Login),
            &[State::LoginUsername],
        ),
        FlowKind::Services => Binding::selection(
            matcher,
            |t| enter_flow(t, FlowKind::Services),
            &[State::ChooseService],
        ),
        FlowKind::Support => Binding::selection(
            matcher,
            |t| enter_flow(t, FlowKind::Support),
            &[State::SupportEmail],
        ),
    }
}

/// What the subject is asked while parked in `state`
pub(super) fn prompt(state: State, turn: &Turn<'_>) -> Content {
    let settings = turn.settings;
    match state {
        State::MainMenu => main_menu(settings),
        State::AwaitName => Content::text("Welcome! What is your full name?"),
        State::AwaitEmail => Content::text("Thanks! Now, what's your email address?"),
        State::AwaitPhone => Content::text("Great! Lastly, please enter your phone number."),
        State::LoginUsername => Content::text("Please enter your username."),
        State::LoginPassword => Content::text("Now enter your password."),
        State::ChooseService => services::catalog(settings),
        State::ConfirmService => match turn.field(fields::SERVICE).and_then(|id| settings.service(id)) {
            Some(option) => services::confirmation(option),
            None => services::catalog(settings),
        },
        State::SupportEmail => Content::text("What email address should we reply to?"),
        State::SupportMessage => Content::text("Please describe your issue in a single message."),
    }
}

fn main_menu(settings: &FlowSettings) -> Content {
    let mut content = Content::text("Welcome! What would you like to do?");
    for flow in FlowKind::ALL {
        if settings.is_enabled(flow) {
            content = content.with_choice(flow.label(), menu_token(flow));
        }
    }
    content
}

/// Entry handler: the session was just created at its entry state
fn greet(turn: &Turn<'_>) -> Outcome {
    let Some(state) = turn.state() else {
        return Outcome::stay();
    };
    Outcome::stay().with_action(turn.send(prompt(state, turn)))
}

fn enter_flow(turn: &Turn<'_>, flow: FlowKind) -> Outcome {
    let first = flow.first_state();
    Outcome::go(first).with_action(turn.reply(prompt(first, turn)))
}

fn start_hint(turn: &Turn<'_>) -> String {
    format!("Send /{} to begin.", turn.settings.start_command)
}

fn cancel(turn: &Turn<'_>) -> Outcome {
    match turn.state() {
        Some(state) => {
            let text = if state.flow() == Some(FlowKind::Signup) {
                "Registration cancelled."
            } else {
                "Cancelled."
            };
            Outcome::terminal().with_action(turn.send(text))
        }
        None => Outcome::stay().with_action(turn.send(format!(
            "Nothing to cancel. {}",
            start_hint(turn)
        ))),
    }
}

/// Commands never become form data: inside a conversation an unknown command
/// is dropped without a reply or a transition.
fn unknown_command(turn: &Turn<'_>) -> Outcome {
    if turn.session.is_some() {
        return Outcome::stay();
    }
    Outcome::stay().with_action(turn.send(format!("Unknown command. {}", start_hint(turn))))
}

fn stray_selection(turn: &Turn<'_>) -> Outcome {
    match turn.state() {
        Some(state) => {
            let mut content = prompt(state, turn);
            if state.awaits_selection() {
                content.text = format!("That option isn't available. {}", content.text);
            }
            Outcome::stay().with_action(turn.reply(content))
        }
        None => Outcome::stay().with_action(turn.send(format!(
            "This menu has expired. {}",
            start_hint(turn)
        ))),
    }
}

fn stray_text(turn: &Turn<'_>) -> Outcome {
    match turn.state() {
        Some(state) => {
            let mut content = prompt(state, turn);
            if state.awaits_selection() {
                content.text = format!("Please choose one of the options below.\n\n{}", content.text);
            }
            Outcome::stay().with_action(turn.send(content))
        }
        None => Outcome::stay().with_action(turn.send(start_hint(turn))),
    }
}

/// Shorthand used by the flow modules for a validation re-prompt
fn reprompt(turn: &Turn<'_>, message: &str) -> Outcome {
    Outcome::stay().with_action(turn.send(message))
}

fn submitted(turn: &Turn<'_>, flow: FlowKind, last: Option<(&str, &str)>) -> Action {
    let mut collected = turn
        .session
        .map(|s| s.collected_fields.clone())
        .unwrap_or_default();
    if let Some((name, value)) = last {
        collected.insert(name.to_string(), value.to_string());
    }
    Action::notify(SubmissionRecord::new(
        turn.subject.clone(),
        flow,
        collected,
        turn.now,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SubjectId};
    use crate::state_machine::event::{AckHandle, Input, MessageRef};
    use crate::state_machine::state::Next;
    use chrono::Utc;
    use std::collections::BTreeSet;

    pub(super) struct Harness {
        pub def: Definition,
        pub subject: SubjectId,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_settings(FlowSettings::default())
        }

        pub fn with_settings(settings: FlowSettings) -> Self {
            Self {
                def: standard_definition(settings, &["start".to_string(), "menu".to_string()])
                    .unwrap(),
                subject: SubjectId::from("u1"),
            }
        }

        /// Run whichever binding the definition resolves for `input` in `state`
        pub fn run(&self, session: Option<&Session>, input: &Input) -> Outcome {
            let binding = session
                .and_then(|s| self.def.resolve(s.current_state, input))
                .or_else(|| self.def.fallback(input))
                .expect("fallbacks cover every input kind");
            let turn = Turn {
                subject: &self.subject,
                session,
                input,
                settings: self.def.settings(),
                now: Utc::now(),
            };
            (binding.handler)(&turn)
        }

        pub fn session(&self, state: State, fields: &[(&str, &str)]) -> Session {
            let mut session = Session::start(self.subject.clone(), state, Utc::now());
            for (k, v) in fields {
                session.collected_fields.insert((*k).to_string(), (*v).to_string());
            }
            session
        }
    }

    pub(super) fn pick(token: &str) -> Input {
        Input::Selection {
            token: token.into(),
            ack: AckHandle("cb-1".into()),
            origin: Some(MessageRef(42)),
        }
    }

    #[test]
    fn test_standard_definition_declares_all_flows() {
        let h = Harness::new();
        for state in State::ALL {
            assert!(h.def.is_declared(state), "{state} should be declared");
        }
        let commands: Vec<&str> = h.def.entries().iter().map(|e| e.command.as_str()).collect();
        assert_eq!(
            commands,
            vec!["start", "menu", "signup", "login", "services", "support"]
        );
    }

    #[test]
    fn test_disabled_flows_are_absent() {
        let h = Harness::with_settings(FlowSettings {
            enabled: BTreeSet::from([FlowKind::Signup]),
            ..FlowSettings::default()
        });
        assert!(h.def.is_declared(State::AwaitPhone));
        assert!(!h.def.is_declared(State::LoginUsername));
        assert!(!h.def.is_declared(State::ChooseService));
        assert!(h.def.entry_for(&Input::command("/login")).is_none());

        let menu = h.session(State::MainMenu, &[]);
        let out = h.run(Some(&menu), &pick("menu:login"));
        assert_eq!(out.next, Next::Stay, "disabled flow is an unmatched selection");

        let greeting = h.run(Some(&menu), &Input::Text("hi".into()));
        let Action::Send { content, .. } = &greeting.actions[0] else {
            panic!("expected a send");
        };
        let tokens: Vec<&str> = content.choices.iter().map(|c| c.token.as_str()).collect();
        assert_eq!(tokens, vec!["menu:signup"]);
    }

    #[test]
    fn test_entry_command_colliding_with_flow_command_fails() {
        let err = standard_definition(FlowSettings::default(), &["signup".to_string()]).unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateEntry("signup".into()));
    }

    #[test]
    fn test_menu_selection_edits_menu_into_first_prompt() {
        let h = Harness::new();
        let menu = h.session(State::MainMenu, &[]);
        let out = h.run(Some(&menu), &pick("menu:signup"));
        assert_eq!(out.next, Next::Go(State::AwaitName));
        assert_eq!(
            out.actions,
            vec![Action::edit(
                &h.subject,
                MessageRef(42),
                "Welcome! What is your full name?"
            )]
        );
    }

    #[test]
    fn test_commands_are_dropped_inside_text_states() {
        let h = Harness::new();
        let session = h.session(State::AwaitEmail, &[("name", "Ann")]);
        let out = h.run(Some(&session), &Input::command("/whatever"));
        assert_eq!(out, Outcome::stay());
    }

    #[test]
    fn test_cancel_ends_conversation() {
        let h = Harness::new();
        let session = h.session(State::AwaitPhone, &[("name", "Ann")]);
        let out = h.run(Some(&session), &Input::command("/cancel"));
        assert_eq!(out.next, Next::Terminal);
        assert_eq!(out.actions[0].text(), Some("Registration cancelled."));

        let out = h.run(None, &Input::command("/cancel"));
        assert_eq!(out.next, Next::Stay);
        assert_eq!(out.actions[0].text(), Some("Nothing to cancel. Send /start to begin."));
    }

    #[test]
    fn test_out_of_conversation_inputs_get_a_hint() {
        let h = Harness::new();
        for input in [
            Input::Text("hello".into()),
            Input::command("/nope"),
            pick("menu:signup"),
        ] {
            let out = h.run(None, &input);
            assert_eq!(out.next, Next::Stay);
            assert_eq!(out.updates, vec![]);
            assert!(out.actions[0].text().unwrap().contains("/start"));
        }
    }

    #[test]
    fn test_text_in_selection_state_reprompts() {
        let h = Harness::new();
        let session = h.session(State::ChooseService, &[]);
        let out = h.run(Some(&session), &Input::Text("web please".into()));
        assert_eq!(out.next, Next::Stay);
        let Action::Send { content, .. } = &out.actions[0] else {
            panic!("expected a send");
        };
        assert!(content.text.starts_with("Please choose one of the options below."));
        assert_eq!(content.choices.len(), 3);
    }

    #[test]
    fn test_unmatched_selection_reprompts_in_place() {
        let h = Harness::new();
        let session = h.session(State::MainMenu, &[]);
        let out = h.run(Some(&session), &pick("bogus"));
        assert_eq!(out.next, Next::Stay);
        assert!(out.updates.is_empty());
        assert!(matches!(out.actions[0], Action::Edit { .. }));
    }
}
