//! Conversation states

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every state a conversation can be parked in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Awaiting a flow choice from the main menu
    MainMenu,

    // Signup
    AwaitName,
    AwaitEmail,
    AwaitPhone,

    // Login
    LoginUsername,
    LoginPassword,

    // Services
    ChooseService,
    ConfirmService,

    // Support
    SupportEmail,
    SupportMessage,
}

impl State {
    pub const ALL: [State; 10] = [
        State::MainMenu,
        State::AwaitName,
        State::AwaitEmail,
        State::AwaitPhone,
        State::LoginUsername,
        State::LoginPassword,
        State::ChooseService,
        State::ConfirmService,
        State::SupportEmail,
        State::SupportMessage,
    ];

    /// The flow this state belongs to; `None` for the main menu.
    pub fn flow(self) -> Option<FlowKind> {
        match self {
            State::MainMenu => None,
            State::AwaitName | State::AwaitEmail | State::AwaitPhone => Some(FlowKind::Signup),
            State::LoginUsername | State::LoginPassword => Some(FlowKind::Login),
            State::ChooseService | State::ConfirmService => Some(FlowKind::Services),
            State::SupportEmail | State::SupportMessage => Some(FlowKind::Support),
        }
    }

    /// Whether this state waits on a button press rather than typed text
    pub fn awaits_selection(self) -> bool {
        matches!(
            self,
            State::MainMenu | State::ChooseService | State::ConfirmService
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::MainMenu => "main_menu",
            State::AwaitName => "await_name",
            State::AwaitEmail => "await_email",
            State::AwaitPhone => "await_phone",
            State::LoginUsername => "login_username",
            State::LoginPassword => "login_password",
            State::ChooseService => "choose_service",
            State::ConfirmService => "confirm_service",
            State::SupportEmail => "support_email",
            State::SupportMessage => "support_message",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a handler sends the conversation next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Remain in the current state (re-prompt, dropped input)
    Stay,
    Go(State),
    /// End the conversation; the session is deleted
    Terminal,
}

/// The menu-selectable flows, each of which can be switched off by config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Signup,
    Login,
    Services,
    Support,
}

impl FlowKind {
    pub const ALL: [FlowKind; 4] = [
        FlowKind::Signup,
        FlowKind::Login,
        FlowKind::Services,
        FlowKind::Support,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FlowKind::Signup => "signup",
            FlowKind::Login => "login",
            FlowKind::Services => "services",
            FlowKind::Support => "support",
        }
    }

    /// Menu button label
    pub fn label(self) -> &'static str {
        match self {
            FlowKind::Signup => "Sign up",
            FlowKind::Login => "Log in",
            FlowKind::Services => "Our services",
            FlowKind::Support => "Contact support",
        }
    }

    /// First state entered when this flow starts
    pub fn first_state(self) -> State {
        match self {
            FlowKind::Signup => State::AwaitName,
            FlowKind::Login => State::LoginUsername,
            FlowKind::Services => State::ChooseService,
            FlowKind::Support => State::SupportEmail,
        }
    }

    pub fn states(self) -> &'static [State] {
        match self {
            FlowKind::Signup => &[State::AwaitName, State::AwaitEmail, State::AwaitPhone],
            FlowKind::Login => &[State::LoginUsername, State::LoginPassword],
            FlowKind::Services => &[State::ChooseService, State::ConfirmService],
            FlowKind::Support => &[State::SupportEmail, State::SupportMessage],
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlowKind::ALL
            .into_iter()
            .find(|flow| flow.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown flow '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_state_belongs_to_at_most_one_flow() {
        for state in State::ALL {
            let owners: Vec<_> = FlowKind::ALL
                .into_iter()
                .filter(|f| f.states().contains(&state))
                .collect();
            match state.flow() {
                Some(flow) => assert_eq!(owners, vec![flow], "{state}"),
                None => assert!(owners.is_empty(), "{state}"),
            }
        }
    }

    #[test]
    fn test_first_state_is_in_flow() {
        for flow in FlowKind::ALL {
            assert_eq!(flow.first_state().flow(), Some(flow));
            assert_eq!(flow.states()[0], flow.first_state());
        }
    }

    #[test]
    fn test_flow_kind_parse() {
        assert_eq!("signup".parse::<FlowKind>(), Ok(FlowKind::Signup));
        assert_eq!(" Support ".parse::<FlowKind>(), Ok(FlowKind::Support));
        assert!("billing".parse::<FlowKind>().is_err());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&State::AwaitEmail).unwrap();
        assert_eq!(json, "\"await_email\"");
        assert_eq!(State::ConfirmService.to_string(), "confirm_service");
    }
}
