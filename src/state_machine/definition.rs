//! Static state machine definition
//!
//! A `Definition` is built once at startup, validated, and shared read-only by
//! every dispatch. It maps each declared state to an ordered list of bindings,
//! lists the entry points, and holds the fallback bindings tried when nothing
//! state-specific matches.

use super::action::{Action, Content};
use super::event::{Input, InputKind};
use super::state::{FlowKind, Next, State};
use crate::session::{Session, SubjectId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// Pure handler: everything it needs arrives in the `Turn`, every effect
/// leaves in the `Outcome`.
pub type Handler = fn(&Turn<'_>) -> Outcome;

/// Inputs to one handler invocation
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    pub subject: &'a SubjectId,
    /// `None` only for fallbacks handling an out-of-conversation event
    pub session: Option<&'a Session>,
    pub input: &'a Input,
    pub settings: &'a FlowSettings,
    pub now: DateTime<Utc>,
}

impl Turn<'_> {
    pub fn state(&self) -> Option<State> {
        self.session.map(|s| s.current_state)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.session.and_then(|s| s.field(name))
    }

    /// Trimmed free text, if this turn carries any
    pub fn text(&self) -> Option<&str> {
        match self.input {
            Input::Text(text) => Some(text.trim()),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self.input {
            Input::Selection { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Respond in place: edit the message whose button was pressed, or send
    /// a new message when there is nothing to edit.
    pub fn reply(&self, content: impl Into<Content>) -> Action {
        match self.input {
            Input::Selection {
                origin: Some(message),
                ..
            } => Action::edit(self.subject, *message, content),
            _ => Action::send(self.subject, content),
        }
    }

    pub fn send(&self, content: impl Into<Content>) -> Action {
        Action::send(self.subject, content)
    }
}

/// Result of a handler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub next: Next,
    pub updates: Vec<(String, String)>,
    pub actions: Vec<Action>,
}

impl Outcome {
    pub fn new(next: Next) -> Self {
        Self {
            next,
            updates: vec![],
            actions: vec![],
        }
    }

    pub fn stay() -> Self {
        Self::new(Next::Stay)
    }

    pub fn go(state: State) -> Self {
        Self::new(Next::Go(state))
    }

    pub fn terminal() -> Self {
        Self::new(Next::Terminal)
    }

    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.updates.push((name.to_string(), value.into()));
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

/// Which inputs a binding accepts, beyond its input kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Any,
    /// Command with exactly this name
    Command(&'static str),
    /// Selection with exactly this token
    Token(&'static str),
    /// Selection whose token starts with this prefix
    TokenPrefix(&'static str),
}

/// (input kind, matcher) -> handler
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub kind: InputKind,
    pub matcher: Matcher,
    pub handler: Handler,
    /// States the handler may move to; checked at startup
    pub targets: &'static [State],
}

impl Binding {
    pub fn text(handler: Handler, targets: &'static [State]) -> Self {
        Self {
            kind: InputKind::Text,
            matcher: Matcher::Any,
            handler,
            targets,
        }
    }

    pub fn command(name: &'static str, handler: Handler) -> Self {
        Self {
            kind: InputKind::Command,
            matcher: Matcher::Command(name),
            handler,
            targets: &[],
        }
    }

    pub fn any_command(handler: Handler) -> Self {
        Self {
            kind: InputKind::Command,
            matcher: Matcher::Any,
            handler,
            targets: &[],
        }
    }

    pub fn selection(matcher: Matcher, handler: Handler, targets: &'static [State]) -> Self {
        Self {
            kind: InputKind::Selection,
            matcher,
            handler,
            targets,
        }
    }

    pub fn matches(&self, input: &Input) -> bool {
        if input.kind() != self.kind {
            return false;
        }
        match (self.matcher, input) {
            (Matcher::Any, _) => true,
            (Matcher::Command(expected), Input::Command { name, .. }) => name == expected,
            (Matcher::Token(expected), Input::Selection { token, .. }) => token == expected,
            (Matcher::TokenPrefix(prefix), Input::Selection { token, .. }) => {
                token.starts_with(prefix)
            }
            _ => false,
        }
    }
}

/// A command that (re)starts a conversation at `state`
#[derive(Debug, Clone)]
pub struct EntryPoint {
    pub command: String,
    pub state: State,
    /// Produces the greeting; runs against the freshly created session
    pub handler: Handler,
}

/// A selectable service in the services flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOption {
    pub id: String,
    pub label: String,
}

impl ServiceOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Flow-level settings visible to handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    pub enabled: BTreeSet<FlowKind>,
    pub services: Vec<ServiceOption>,
    /// Command suggested to subjects who are not in a conversation
    pub start_command: String,
}

impl FlowSettings {
    pub fn is_enabled(&self, flow: FlowKind) -> bool {
        self.enabled.contains(&flow)
    }

    pub fn service(&self, id: &str) -> Option<&ServiceOption> {
        self.services.iter().find(|s| s.id == id)
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            enabled: FlowKind::ALL.into_iter().collect(),
            services: vec![
                ServiceOption::new("web", "Website development"),
                ServiceOption::new("mobile", "Mobile apps"),
                ServiceOption::new("consulting", "Consulting"),
            ],
            start_command: "start".to_string(),
        }
    }
}

/// Problems caught while validating a definition at startup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("No entry points declared")]
    NoEntryPoints,
    #[error("Entry command '/{0}' is declared more than once")]
    DuplicateEntry(String),
    #[error("Entry command '/{command}' targets undeclared state {state}")]
    UndeclaredEntryState { command: String, state: State },
    #[error("Entry command '/{0}' shadows a fallback command")]
    EntryShadowsFallback(String),
    #[error("State {0} has no bindings")]
    EmptyState(State),
    #[error("A binding on {from} may move to undeclared state {target}")]
    UndeclaredTarget { from: State, target: State },
    #[error("Flow {0} is enabled but its states are not declared")]
    FlowNotDeclared(FlowKind),
    #[error("Services flow is enabled with an empty catalog")]
    EmptyServiceCatalog,
}

/// Immutable, process-wide transition table
#[derive(Debug)]
pub struct Definition {
    settings: FlowSettings,
    states: HashMap<State, Vec<Binding>>,
    entries: Vec<EntryPoint>,
    fallbacks: Vec<Binding>,
}

impl Definition {
    pub fn new(settings: FlowSettings) -> Self {
        Self {
            settings,
            states: HashMap::new(),
            entries: vec![],
            fallbacks: vec![],
        }
    }

    pub fn with_state(mut self, state: State, bindings: Vec<Binding>) -> Self {
        self.states.entry(state).or_default().extend(bindings);
        self
    }

    pub fn with_entry(mut self, command: &str, state: State, handler: Handler) -> Self {
        self.entries.push(EntryPoint {
            command: command.trim_start_matches('/').to_ascii_lowercase(),
            state,
            handler,
        });
        self
    }

    pub fn with_fallback(mut self, binding: Binding) -> Self {
        self.fallbacks.push(binding);
        self
    }

    /// Check every cross reference in the table.
    pub fn validate(self) -> Result<Self, DefinitionError> {
        if self.entries.is_empty() {
            return Err(DefinitionError::NoEntryPoints);
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.command.as_str()) {
                return Err(DefinitionError::DuplicateEntry(entry.command.clone()));
            }
            if !self.is_declared(entry.state) {
                return Err(DefinitionError::UndeclaredEntryState {
                    command: entry.command.clone(),
                    state: entry.state,
                });
            }
            let shadows = self.fallbacks.iter().any(|b| {
                matches!(b.matcher, Matcher::Command(name) if name == entry.command)
            });
            if shadows {
                return Err(DefinitionError::EntryShadowsFallback(entry.command.clone()));
            }
        }

        // Deterministic order so the first reported error is stable
        let mut declared: Vec<State> = self.states.keys().copied().collect();
        declared.sort();
        for state in declared {
            let bindings = &self.states[&state];
            if bindings.is_empty() {
                return Err(DefinitionError::EmptyState(state));
            }
            for binding in bindings {
                if let Some(target) = binding.targets.iter().find(|t| !self.is_declared(**t)) {
                    return Err(DefinitionError::UndeclaredTarget {
                        from: state,
                        target: *target,
                    });
                }
            }
        }

        for flow in &self.settings.enabled {
            if !flow.states().iter().all(|s| self.is_declared(*s)) {
                return Err(DefinitionError::FlowNotDeclared(*flow));
            }
        }

        if self.settings.is_enabled(FlowKind::Services) && self.settings.services.is_empty() {
            return Err(DefinitionError::EmptyServiceCatalog);
        }

        Ok(self)
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub fn is_declared(&self, state: State) -> bool {
        self.states.contains_key(&state)
    }

    pub fn declared_states(&self) -> impl Iterator<Item = State> + '_ {
        self.states.keys().copied()
    }

    pub fn entries(&self) -> &[EntryPoint] {
        &self.entries
    }

    /// Entry point for this input, if it is an entry command
    pub fn entry_for(&self, input: &Input) -> Option<&EntryPoint> {
        let Input::Command { name, .. } = input else {
            return None;
        };
        self.entries.iter().find(|e| &e.command == name)
    }

    /// First state binding that accepts `input` in `state`
    pub fn resolve(&self, state: State, input: &Input) -> Option<&Binding> {
        self.states.get(&state)?.iter().find(|b| b.matches(input))
    }

    /// First fallback binding that accepts `input`
    pub fn fallback(&self, input: &Input) -> Option<&Binding> {
        self.fallbacks.iter().find(|b| b.matches(input))
    }
}
