//! The entity credited with causing an event.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Either the system itself (automatic transitions, timeouts) or a named
/// agent. Kept as an enum rather than a bare `String` so `"SYSTEM"` can
/// never collide with a real agent id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Actor {
    /// The clearinghouse engine acting on its own behalf.
    System,
    /// An external agent, identified by its opaque id string.
    Agent(String),
}

const SYSTEM_LITERAL: &str = "SYSTEM";

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "{SYSTEM_LITERAL}"),
            Self::Agent(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for Actor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == SYSTEM_LITERAL {
            Self::System
        } else {
            Self::Agent(s.to_owned())
        })
    }
}

impl Serialize for Actor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Actor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().expect("Actor::from_str is infallible"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_round_trips() {
        let json = serde_json::to_string(&Actor::System).unwrap();
        assert_eq!(json, "\"SYSTEM\"");
        let back: Actor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Actor::System);
    }

    #[test]
    fn agent_round_trips() {
        let actor = Actor::Agent("agent-buyer-1".to_owned());
        let json = serde_json::to_string(&actor).unwrap();
        let back: Actor = serde_json::from_str(&json).unwrap();
        assert_eq!(actor, back);
    }
}
