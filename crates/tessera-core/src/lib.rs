//! Core CRDT contract and the add-wins Observed-Remove Set.
//!
//! [`lattice::Crdt`] is the interface a replication layer drives:
//! `init`, `query`, `query_at`, `update`, `compare`, `merge`.
//! [`orset::ORSet`] is the implementation shipped with it.

pub mod error;
pub mod lattice;
pub mod orset;
pub mod token;

pub use error::ORSetError;
pub use lattice::{Crdt, Lattice};
pub use orset::{Entry, ORSet, ORSetOp, Tag};
pub use token::{RandomTokens, ReplicaTokens, Token, TokenSource};
