//! Value types shared by clients and bus backends.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque session handle assigned by the bus on a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contact port a service accepts sessions on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionPort(pub u16);

impl SessionPort {
    /// Port the sample service binds.
    pub const DEFAULT_CONTACT: Self = Self(42);
}

impl Default for SessionPort {
    fn default() -> Self {
        Self::DEFAULT_CONTACT
    }
}

impl fmt::Display for SessionPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitmask of transports a name was found on or a session may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportMask(pub u16);

impl TransportMask {
    pub const NONE: Self = Self(0x0000);
    pub const LOCAL: Self = Self(0x0001);
    pub const TCP: Self = Self(0x0004);
    pub const UDP: Self = Self(0x0100);
    pub const ANY: Self = Self(0xFFFF);

    /// Whether every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for TransportMask {
    fn default() -> Self {
        Self::ANY
    }
}

/// Kind of traffic carried by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficType {
    /// Bus messages (method calls, signals).
    #[default]
    Messages,
    /// Raw unreliable byte stream.
    RawUnreliable,
    /// Raw reliable byte stream.
    RawReliable,
}

/// Proximity constraint for session peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    #[default]
    Any,
    Physical,
    Network,
}

/// Session options requested on join.
///
/// Opaque to the client: they are handed to the backend unchanged and the
/// backend returns whatever it negotiated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOpts {
    pub traffic: TrafficType,
    pub multipoint: bool,
    pub proximity: Proximity,
    pub transports: TransportMask,
}

/// Expected latency class of a remote member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// Returns promptly.
    #[default]
    Short,
    /// May run for a long time; callers should invoke it off the main flow.
    LongRunning,
}

/// A remotely invocable member of an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSpec {
    /// Member name as it appears on the bus.
    pub name: String,
    /// Number of positional arguments.
    pub arity: usize,
    #[serde(default)]
    pub kind: MemberKind,
}

/// Remote interface contract: the set of members a proxy may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceContract {
    /// Interface name, e.g. `com.my.sample.SampleInterface`.
    pub name: String,
    pub members: Vec<MemberSpec>,
}

impl InterfaceContract {
    /// Create an empty contract.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Add a short-latency method.
    #[must_use]
    pub fn method(self, name: impl Into<String>, arity: usize) -> Self {
        self.member(name, arity, MemberKind::Short)
    }

    /// Add a long-running method.
    #[must_use]
    pub fn long_running(self, name: impl Into<String>, arity: usize) -> Self {
        self.member(name, arity, MemberKind::LongRunning)
    }

    fn member(mut self, name: impl Into<String>, arity: usize, kind: MemberKind) -> Self {
        self.members.push(MemberSpec {
            name: name.into(),
            arity,
            kind,
        });
        self
    }

    /// Look up a member by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&MemberSpec> {
        self.members.iter().find(|m| m.name == name)
    }
}
