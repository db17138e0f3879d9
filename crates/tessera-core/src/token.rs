//! Add tokens
//!
//! Every add operation is identified by a token that no other add, on any
//! replica, will ever produce. Tokens are opaque byte strings; the OR-Set
//! only orders and compares them.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Bytes of entropy in a [`RandomTokens`] token (160 bits).
pub const RANDOM_TOKEN_LEN: usize = 20;

/// Unique identifier of one add operation.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(Vec<u8>);

impl Token {
    /// Wrap raw bytes received from elsewhere.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// A fresh 160-bit token from the operating system's CSPRNG.
    pub fn random() -> Self {
        RandomTokens.mint()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.to_hex())
    }
}

// Hex string form so tokens can key a JSON object.
impl Serialize for Token {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded)
            .map(Token)
            .map_err(serde::de::Error::custom)
    }
}

/// Where an OR-Set gets the token for each add.
pub trait TokenSource {
    fn mint(&mut self) -> Token;
}

/// Statistically unique tokens: 160 random bits per add.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomTokens;

impl TokenSource for RandomTokens {
    fn mint(&mut self) -> Token {
        let mut bytes = [0u8; RANDOM_TOKEN_LEN];
        OsRng.fill_bytes(&mut bytes);
        Token(bytes.to_vec())
    }
}

/// Provably unique tokens: the replica id followed by a big-endian counter.
///
/// Unique across the cluster as long as replica ids are unique and a replica
/// never reuses a counter value. A replica that restarts must resume from
/// the counter it had reached, see [`ReplicaTokens::resume`]. Do not mix with
/// [`RandomTokens`] in the same set.
#[derive(Clone, Debug)]
pub struct ReplicaTokens {
    replica_id: String,
    next: u64,
}

impl ReplicaTokens {
    pub fn new(replica_id: impl Into<String>) -> Self {
        Self::resume(replica_id, 0)
    }

    pub fn resume(replica_id: impl Into<String>, next: u64) -> Self {
        Self {
            replica_id: replica_id.into(),
            next,
        }
    }

    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    /// The counter value the next token will carry.
    pub fn next_counter(&self) -> u64 {
        self.next
    }
}

impl TokenSource for ReplicaTokens {
    fn mint(&mut self) -> Token {
        let mut bytes = Vec::with_capacity(self.replica_id.len() + 8);
        bytes.extend_from_slice(self.replica_id.as_bytes());
        bytes.extend_from_slice(&self.next.to_be_bytes());
        self.next += 1;
        Token(bytes)
    }
}
