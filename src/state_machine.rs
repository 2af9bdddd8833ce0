//! Conversation state machine
//!
//! Handlers are pure: they see the session, the inbound input and the flow
//! settings, and return the next state plus effects as data. The engine is
//! the only place that touches the session store or external collaborators.

mod action;
mod definition;
pub mod event;
mod flows;
pub mod state;

#[cfg(test)]
mod proptests;

pub use action::{Action, Choice, Content, SubmissionRecord};
pub use definition::{
    Binding, Definition, DefinitionError, EntryPoint, FlowSettings, Handler, Matcher, Outcome,
    ServiceOption, Turn,
};
pub use event::{AckHandle, Event, Input, InputKind, MessageRef};
pub use flows::standard_definition;
pub use state::{FlowKind, Next, State};
