//! Join-semilattice and CRDT contract
//!
//! A join-semilattice (S, ≤, ⊔) satisfies, for all a, b, c:
//!  - Commutativity: a ⊔ b = b ⊔ a
//!  - Associativity: (a ⊔ b) ⊔ c = a ⊔ (b ⊔ c)
//!  - Idempotence:  a ⊔ a = a
//!  - Absorption into the order: a ≤ a ⊔ b
//!
//! These properties guarantee convergence regardless of delivery order,
//! duplication, or the grouping in which replica states are merged.

use std::cmp::Ordering;

/// The state-level lattice every CRDT is built on.
pub trait Lattice: Clone + PartialEq {
    /// The bottom element (identity for join)
    fn bottom() -> Self;

    /// Join operation (least upper bound).
    /// Must be commutative, associative, and idempotent.
    fn join(&self, other: &Self) -> Self;

    /// Partial order derived from join: a ≤ b iff a ⊔ b = b
    fn partial_cmp_lattice(&self, other: &Self) -> Option<Ordering> {
        let joined = self.join(other);
        if &joined == self && &joined == other {
            Some(Ordering::Equal)
        } else if &joined == other {
            Some(Ordering::Less)
        } else if &joined == self {
            Some(Ordering::Greater)
        } else {
            None // Concurrent/incomparable
        }
    }

    /// Check if self ≤ other in the lattice order
    fn leq(&self, other: &Self) -> bool {
        matches!(
            self.partial_cmp_lattice(other),
            Some(Ordering::Less) | Some(Ordering::Equal)
        )
    }

    /// Join-assign: self = self ⊔ other
    fn join_assign(&mut self, other: &Self) {
        *self = self.join(other);
    }
}

/// The contract a replicated data type exposes to a replication layer.
///
/// Every operation is pure: states are values, and anything that "changes"
/// a state returns a new one. A failed [`Crdt::update`] leaves the caller's
/// state untouched because it was only ever borrowed.
///
/// Implementors must keep `compare`/`merge` consistent with the [`Lattice`]
/// laws, so that for all reachable `a` and `b`:
///
/// ```text
/// a.merge(&b) == b.merge(&a)
/// a.merge(&b.merge(&c)) == a.merge(&b).merge(&c)
/// a.merge(&a) == a
/// a.compare(&a.merge(&b))
/// ```
pub trait Crdt: Lattice {
    /// Item of the externally visible read view
    type Value;
    /// Key addressing a restricted view of the state
    type Selector: ?Sized;
    /// The restricted view returned by [`Crdt::query_at`]
    type View;
    /// A single local mutation
    type Op;
    /// Why a mutation was rejected
    type Error: std::error::Error;

    /// The empty replica; bottom of the semilattice.
    fn init() -> Self {
        Self::bottom()
    }

    /// The read view, derived from the state on every call.
    fn query(&self) -> Vec<Self::Value>;

    /// Inspect the part of the state addressed by `selector`.
    fn query_at(&self, selector: &Self::Selector) -> Self::View;

    /// Apply one local mutation, returning the resulting state.
    fn update(&self, op: Self::Op) -> Result<Self, Self::Error>;

    /// `self ≤ other` in the semilattice order.
    fn compare(&self, other: &Self) -> bool {
        self.leq(other)
    }

    /// Least upper bound of two replica states.
    fn merge(&self, other: &Self) -> Self {
        self.join(other)
    }

    /// Fold any number of states into one, starting from [`Crdt::init`].
    fn merge_all<'a, I>(states: I) -> Self
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
    {
        states
            .into_iter()
            .fold(Self::init(), |acc, state| acc.merge(state))
    }
}
