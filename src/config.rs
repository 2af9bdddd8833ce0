//! Process configuration from environment variables

use crate::engine::{DeliveryPolicy, EngineSettings};
use crate::session::SubjectId;
use crate::state_machine::{FlowKind, FlowSettings, ServiceOption};
use crate::telegram::DEFAULT_API_URL;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Without a token, replies are only logged
    pub bot_token: Option<String>,
    pub telegram_api_url: String,
    pub webhook_secret: Option<String>,
    pub port: u16,
    /// Commands that open the main menu; the first is the one we advertise
    pub entry_commands: Vec<String>,
    pub flows: FlowSettings,
    /// Where submission summaries go; log-only when unset
    pub operator_chat: Option<SubjectId>,
    pub workers: usize,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    pub notify_timeout: Duration,
    pub notify_attempts: u32,
    pub timeout_notice: bool,
    /// Recent submissions kept in memory for `/health`
    pub journal_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let entry_commands = match get("MENUFLOW_ENTRY_COMMANDS") {
            Some(raw) => parse_commands(&raw)?,
            None => vec!["start".to_string()],
        };

        let mut flows = FlowSettings::default();
        if let Some(raw) = get("MENUFLOW_FLOWS") {
            flows.enabled = parse_flows(&raw)?;
        }
        if let Some(raw) = get("MENUFLOW_SERVICES") {
            flows.services = parse_services(&raw)?;
        }
        flows.start_command = entry_commands[0].clone();

        Ok(Self {
            bot_token: get("BOT_TOKEN"),
            telegram_api_url: get("MENUFLOW_TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            webhook_secret: get("MENUFLOW_WEBHOOK_SECRET"),
            port: parse_or(get("MENUFLOW_PORT"), "MENUFLOW_PORT", 5000)?,
            entry_commands,
            flows,
            operator_chat: get("MENUFLOW_OPERATOR_CHAT_ID").map(|v| SubjectId::new(v.trim())),
            workers: parse_or(get("MENUFLOW_WORKERS"), "MENUFLOW_WORKERS", 4usize)?.max(1),
            idle_timeout: secs(get("MENUFLOW_IDLE_TIMEOUT_SECS"), "MENUFLOW_IDLE_TIMEOUT_SECS", 300)?,
            sweep_interval: secs(
                get("MENUFLOW_SWEEP_INTERVAL_SECS"),
                "MENUFLOW_SWEEP_INTERVAL_SECS",
                30,
            )?,
            notify_timeout: secs(
                get("MENUFLOW_NOTIFY_TIMEOUT_SECS"),
                "MENUFLOW_NOTIFY_TIMEOUT_SECS",
                10,
            )?,
            notify_attempts: parse_or(get("MENUFLOW_NOTIFY_ATTEMPTS"), "MENUFLOW_NOTIFY_ATTEMPTS", 4u32)?
                .max(1),
            timeout_notice: parse_bool(get("MENUFLOW_TIMEOUT_NOTICE"), "MENUFLOW_TIMEOUT_NOTICE")?,
            journal_capacity: parse_or(
                get("MENUFLOW_JOURNAL_CAPACITY"),
                "MENUFLOW_JOURNAL_CAPACITY",
                100usize,
            )?,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            idle_timeout: self.idle_timeout,
            delivery: DeliveryPolicy {
                timeout: self.notify_timeout,
                max_attempts: self.notify_attempts,
                ..DeliveryPolicy::default()
            },
            timeout_notice: self.timeout_notice,
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(var, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn secs(raw: Option<String>, var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let value = parse_or(raw, var, default)?;
    if value == 0 {
        return Err(ConfigError::invalid(var, "0", "must be at least 1 second"));
    }
    Ok(Duration::from_secs(value))
}

fn parse_bool(raw: Option<String>, var: &'static str) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(var, &raw, "expected true or false")),
    }
}

fn parse_commands(raw: &str) -> Result<Vec<String>, ConfigError> {
    let commands: Vec<String> = raw
        .split(',')
        .map(|c| c.trim().trim_start_matches('/').to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    if commands.is_empty() {
        return Err(ConfigError::invalid(
            "MENUFLOW_ENTRY_COMMANDS",
            raw,
            "at least one command is required",
        ));
    }
    if let Some(bad) = commands
        .iter()
        .find(|c| !c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'))
    {
        return Err(ConfigError::invalid(
            "MENUFLOW_ENTRY_COMMANDS",
            raw,
            format!("'{bad}' is not a valid command name"),
        ));
    }
    Ok(commands)
}

fn parse_flows(raw: &str) -> Result<BTreeSet<FlowKind>, ConfigError> {
    let flows = raw
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| f.parse().map_err(|e: String| ConfigError::invalid("MENUFLOW_FLOWS", raw, e)))
        .collect::<Result<BTreeSet<FlowKind>, _>>()?;
    if flows.is_empty() {
        return Err(ConfigError::invalid(
            "MENUFLOW_FLOWS",
            raw,
            "at least one flow is required",
        ));
    }
    Ok(flows)
}

/// `id=Label,id=Label`
fn parse_services(raw: &str) -> Result<Vec<ServiceOption>, ConfigError> {
    let mut services = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let Some((id, label)) = item.split_once('=') else {
            return Err(ConfigError::invalid(
                "MENUFLOW_SERVICES",
                raw,
                format!("'{item}' is not of the form id=Label"),
            ));
        };
        let (id, label) = (id.trim(), label.trim());
        if id.is_empty() || label.is_empty() {
            return Err(ConfigError::invalid(
                "MENUFLOW_SERVICES",
                raw,
                format!("'{item}' has an empty id or label"),
            ));
        }
        services.push(ServiceOption::new(id, label));
    }
    Ok(services)
}
