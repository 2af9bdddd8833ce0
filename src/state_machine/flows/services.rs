//! Service enquiry: pick from the catalog, then confirm, go back, or cancel.

use super::{prompt, submitted};
use crate::session::fields;
use crate::state_machine::action::Content;
use crate::state_machine::definition::{
    Binding, Definition, FlowSettings, Matcher, Outcome, ServiceOption, Turn,
};
use crate::state_machine::state::{FlowKind, State};

const SERVICE_PREFIX: &str = "service:";
const CONFIRM: &str = "confirm:yes";
const BACK: &str = "confirm:back";
const CANCEL: &str = "confirm:cancel";

pub(super) fn declare(def: Definition) -> Definition {
    def.with_state(
        State::ChooseService,
        vec![Binding::selection(
            Matcher::TokenPrefix(SERVICE_PREFIX),
            choose,
            &[State::ConfirmService],
        )],
    )
    .with_state(
        State::ConfirmService,
        vec![
            Binding::selection(Matcher::Token(CONFIRM), confirm, &[State::ChooseService]),
            Binding::selection(Matcher::Token(BACK), back, &[State::ChooseService]),
            Binding::selection(Matcher::Token(CANCEL), cancel, &[]),
        ],
    )
}

pub(super) fn catalog(settings: &FlowSettings) -> Content {
    let mut content = Content::text("Which service are you interested in?");
    for option in &settings.services {
        content = content.with_choice(&option.label, format!("{SERVICE_PREFIX}{}", option.id));
    }
    content
}

pub(super) fn confirmation(option: &ServiceOption) -> Content {
    Content::text(format!(
        "You selected: {}. Shall we get in touch about it?",
        option.label
    ))
    .with_choice("Confirm", CONFIRM)
    .with_choice("Back", BACK)
    .with_choice("Cancel", CANCEL)
}

fn choose(turn: &Turn<'_>) -> Outcome {
    let id = turn
        .token()
        .and_then(|t| t.strip_prefix(SERVICE_PREFIX))
        .unwrap_or_default();
    let Some(option) = turn.settings.service(id) else {
        let mut content = catalog(turn.settings);
        content.text = format!("That service isn't available. {}", content.text);
        return Outcome::stay().with_action(turn.reply(content));
    };
    Outcome::go(State::ConfirmService)
        .with_field(fields::SERVICE, &option.id)
        .with_action(turn.reply(confirmation(option)))
}

fn confirm(turn: &Turn<'_>) -> Outcome {
    let Some(option) = turn
        .field(fields::SERVICE)
        .and_then(|id| turn.settings.service(id))
    else {
        // Catalog changed under a live session; ask again.
        return Outcome::go(State::ChooseService)
            .with_action(turn.reply(prompt(State::ChooseService, turn)));
    };
    Outcome::terminal()
        .with_action(turn.reply(format!(
            "Thanks! We'll be in touch about {}.",
            option.label
        )))
        .with_action(submitted(turn, FlowKind::Services, None))
}

fn back(turn: &Turn<'_>) -> Outcome {
    Outcome::go(State::ChooseService).with_action(turn.reply(catalog(turn.settings)))
}

fn cancel(turn: &Turn<'_>) -> Outcome {
    Outcome::terminal().with_action(turn.reply("Cancelled."))
}
