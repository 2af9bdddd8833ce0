//! Registration: name, email, phone, then hand the record to the operator.

use super::{prompt, reprompt, submitted};
use crate::session::fields;
use crate::state_machine::definition::{Binding, Definition, Outcome, Turn};
use crate::state_machine::state::{FlowKind, State};
use crate::validate::{is_valid_email, is_valid_name, is_valid_phone};

pub(super) fn declare(def: Definition) -> Definition {
    def.with_state(State::AwaitName, vec![Binding::text(name, &[State::AwaitEmail])])
        .with_state(State::AwaitEmail, vec![Binding::text(email, &[State::AwaitPhone])])
        .with_state(State::AwaitPhone, vec![Binding::text(phone, &[])])
}

fn name(turn: &Turn<'_>) -> Outcome {
    let text = turn.text().unwrap_or_default();
    if !is_valid_name(text) {
        return reprompt(turn, "Please enter your full name (up to 64 characters).");
    }
    Outcome::go(State::AwaitEmail)
        .with_field(fields::NAME, text)
        .with_action(turn.send(prompt(State::AwaitEmail, turn)))
}

fn email(turn: &Turn<'_>) -> Outcome {
    let text = turn.text().unwrap_or_default();
    if !is_valid_email(text) {
        return reprompt(
            turn,
            "That doesn't look like a valid email address. Please try again.",
        );
    }
    Outcome::go(State::AwaitPhone)
        .with_field(fields::EMAIL, text)
        .with_action(turn.send(prompt(State::AwaitPhone, turn)))
}

fn phone(turn: &Turn<'_>) -> Outcome {
    let text = turn.text().unwrap_or_default();
    if !is_valid_phone(text) {
        return reprompt(
            turn,
            "Please enter a valid phone number, for example +15550001.",
        );
    }
    Outcome::terminal()
        .with_field(fields::PHONE, text)
        .with_action(turn.send("Thank you! Your data has been recorded."))
        .with_action(submitted(turn, FlowKind::Signup, Some((fields::PHONE, text))))
}
