//! Login demonstration flow.
//!
//! There is no credential backend: every attempt is rejected. The password is
//! never written into the session.

use super::{prompt, reprompt};
use crate::session::fields;
use crate::state_machine::definition::{Binding, Definition, Outcome, Turn};
use crate::state_machine::state::State;
use crate::validate::is_valid_name;

pub(super) fn declare(def: Definition) -> Definition {
    def.with_state(
        State::LoginUsername,
        vec![Binding::text(username, &[State::LoginPassword])],
    )
    .with_state(State::LoginPassword, vec![Binding::text(password, &[])])
}

fn username(turn: &Turn<'_>) -> Outcome {
    let text = turn.text().unwrap_or_default();
    if !is_valid_name(text) {
        return reprompt(turn, "Please enter a username.");
    }
    Outcome::go(State::LoginPassword)
        .with_field(fields::USERNAME, text)
        .with_action(turn.send(prompt(State::LoginPassword, turn)))
}

fn password(turn: &Turn<'_>) -> Outcome {
    tracing::debug!(subject = %turn.subject, "Rejecting login attempt");
    Outcome::terminal().with_action(turn.send("Login failed: invalid username or password."))
}
