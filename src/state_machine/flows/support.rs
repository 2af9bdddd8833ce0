//! Support request: reply-to email, then one free-text message.

use super::{prompt, reprompt, submitted};
use crate::session::fields;
use crate::state_machine::definition::{Binding, Definition, Outcome, Turn};
use crate::state_machine::state::{FlowKind, State};
use crate::validate::is_valid_email;

const MAX_MESSAGE_CHARS: usize = 2000;

pub(super) fn declare(def: Definition) -> Definition {
    def.with_state(
        State::SupportEmail,
        vec![Binding::text(email, &[State::SupportMessage])],
    )
    .with_state(State::SupportMessage, vec![Binding::text(message, &[])])
}

fn email(turn: &Turn<'_>) -> Outcome {
    let text = turn.text().unwrap_or_default();
    if !is_valid_email(text) {
        return reprompt(
            turn,
            "That doesn't look like a valid email address. Please try again.",
        );
    }
    Outcome::go(State::SupportMessage)
        .with_field(fields::EMAIL, text)
        .with_action(turn.send(prompt(State::SupportMessage, turn)))
}

fn message(turn: &Turn<'_>) -> Outcome {
    let text = turn.text().unwrap_or_default();
    if text.is_empty() || text.chars().count() > MAX_MESSAGE_CHARS {
        return reprompt(
            turn,
            "Please describe your issue in a single message of up to 2000 characters.",
        );
    }
    let reply_to = turn.field(fields::EMAIL).unwrap_or("your email");
    Outcome::terminal()
        .with_field(fields::MESSAGE, text)
        .with_action(turn.send(format!(
            "Thanks! Our support team will get back to you at {reply_to}."
        )))
        .with_action(submitted(turn, FlowKind::Support, Some((fields::MESSAGE, text))))
}
