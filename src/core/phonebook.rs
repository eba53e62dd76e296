// Phonebook module - Dialed number lookup
use crate::domain::config::PhonebookEntry;
use crate::domain::error::{ModemError, ModemResult};
use serde::Serialize;
use std::fmt;

/// Strip the separators a caller may type between digit groups
pub fn normalize_number(number: &str) -> String {
    number.chars().filter(|c| *c != ' ' && *c != '-').collect()
}

/// Split a "host:port" route into its parts
pub fn parse_route(route: &str) -> ModemResult<(String, u16)> {
    let parts: Vec<&str> = route.split(':').collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(ModemError::InvalidRoute(format!(
            "expected host:port, got '{}'",
            route
        )));
    }

    let port = parts[1]
        .parse::<u16>()
        .map_err(|e| ModemError::InvalidRoute(format!("bad port in '{}': {}", route, e)))?;

    Ok((parts[0].to_string(), port))
}

/// What dialing a number leads to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DialPlan {
    /// No phonebook entry matches
    NotFound,
    /// Entry without a route
    Busy { announce: Option<String> },
    /// Entry whose route cannot be parsed
    InvalidRoute {
        route: String,
        reason: String,
        announce: Option<String>,
    },
    /// Entry routed to an upstream endpoint
    Connect {
        host: String,
        port: u16,
        announce: Option<String>,
    },
}

impl DialPlan {
    pub fn announce(&self) -> Option<&str> {
        match self {
            DialPlan::NotFound => None,
            DialPlan::Busy { announce }
            | DialPlan::InvalidRoute { announce, .. }
            | DialPlan::Connect { announce, .. } => announce.as_deref(),
        }
    }
}

impl fmt::Display for DialPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialPlan::NotFound => write!(f, "not in phonebook (NO CARRIER)"),
            DialPlan::Busy { .. } => write!(f, "no route (BUSY)"),
            DialPlan::InvalidRoute { route, reason, .. } => {
                write!(f, "invalid route '{}': {} (NO CARRIER)", route, reason)
            }
            DialPlan::Connect { host, port, .. } => write!(f, "connect to {}:{}", host, port),
        }
    }
}

/// Resolves dialed numbers against the configured phonebook
#[derive(Debug, Clone, Default)]
pub struct PhonebookResolver {
    entries: Vec<PhonebookEntry>,
}

impl PhonebookResolver {
    pub fn new(entries: Vec<PhonebookEntry>) -> Self {
        Self { entries }
    }

    /// Exact match after normalizing both sides; the first entry wins.
    pub fn resolve(&self, number: &str) -> Option<&PhonebookEntry> {
        let wanted = normalize_number(number);
        self.entries
            .iter()
            .find(|entry| normalize_number(&entry.number) == wanted)
    }

    /// Resolve a number and interpret its entry
    pub fn plan(&self, number: &str) -> DialPlan {
        let Some(entry) = self.resolve(number) else {
            return DialPlan::NotFound;
        };

        let announce = entry.announce().map(str::to_string);
        let Some(route) = entry.route() else {
            return DialPlan::Busy { announce };
        };

        match parse_route(route) {
            Ok((host, port)) => DialPlan::Connect {
                host,
                port,
                announce,
            },
            Err(e) => DialPlan::InvalidRoute {
                route: route.to_string(),
                reason: e.to_string(),
                announce,
            },
        }
    }
}
