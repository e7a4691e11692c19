//! Two-sided contracts
//!
//! A channel's two endpoints are called sides `A` and `B`. Each side
//! declares what it exposes to the other: the requests it answers and the
//! messages it emits. From one side's point of view:
//! - local = its own requests (answered) + the other side's messages (received)
//! - remote = the other side's requests (called) + its own messages (emitted)

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rpc::{MessageDef, RequestDef};

mod two_sided;

pub use two_sided::{define_side, MessageHandlers, SideConfig, SideRpc};

/// One of the two named endpoints of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

/// A set of request names and message names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub requests: BTreeSet<String>,
    pub messages: BTreeSet<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, name: impl Into<String>) -> Self {
        self.requests.insert(name.into());
        self
    }

    pub fn with_message(mut self, name: impl Into<String>) -> Self {
        self.messages.insert(name.into());
        self
    }

    pub fn request<R: RequestDef>(self) -> Self {
        self.with_request(R::METHOD)
    }

    pub fn message<M: MessageDef>(self) -> Self {
        self.with_message(M::NAME)
    }

    pub fn has_request(&self, name: &str) -> bool {
        self.requests.contains(name)
    }

    pub fn has_message(&self, name: &str) -> bool {
        self.messages.contains(name)
    }
}

/// What each side exposes to the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub a: Schema,
    pub b: Schema,
}

/// One side's view of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPair {
    /// Requests this side answers and messages it receives.
    pub local: Schema,
    /// Requests this side may call and messages it may emit.
    pub remote: Schema,
}

impl Contract {
    pub fn new(a: Schema, b: Schema) -> Self {
        Self { a, b }
    }

    pub fn declared_by(&self, side: Side) -> &Schema {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    pub fn pair_for(&self, side: Side) -> SchemaPair {
        let own = self.declared_by(side);
        let other = self.declared_by(side.other());

        SchemaPair {
            local: Schema {
                requests: own.requests.clone(),
                messages: other.messages.clone(),
            },
            remote: Schema {
                requests: other.requests.clone(),
                messages: own.messages.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping_pong() -> Contract {
        Contract::new(
            Schema::new().with_request("ping").with_message("tick"),
            Schema::new().with_request("pong").with_message("tock"),
        )
    }

    #[test]
    fn test_side_a_inversion() {
        let pair = ping_pong().pair_for(Side::A);

        assert!(pair.local.has_request("ping"));
        assert!(pair.local.has_message("tock"));
        assert!(pair.remote.has_request("pong"));
        assert!(pair.remote.has_message("tick"));

        assert!(!pair.local.has_request("pong"));
        assert!(!pair.local.has_message("tick"));
    }

    #[test]
    fn test_side_b_is_mirror_of_a() {
        let contract = ping_pong();
        let a = contract.pair_for(Side::A);
        let b = contract.pair_for(Side::B);

        assert_eq!(a.local.requests, b.remote.requests);
        assert_eq!(a.remote.requests, b.local.requests);
        assert_eq!(a.local.messages, b.remote.messages);
        assert_eq!(a.remote.messages, b.local.messages);
    }

    #[test]
    fn test_other_side() {
        assert_eq!(Side::A.other(), Side::B);
        assert_eq!(Side::B.other(), Side::A);
    }
}
