//! Observed-Remove Set (OR-Set / Add-Wins Set)
//!
//! Each add mints a unique token and records it as [`Tag::Add`] under the
//! element. Remove retags every token the replica has observed for the
//! element as [`Tag::Remove`]; tokens are never dropped, so removed tokens
//! stay behind as tombstones.
//!
//! Merge is token-wise: a token is `Add` in the result if either side has it
//! as `Add`. A remove can only retag tokens it has seen, so an add that was
//! concurrent with it keeps its token live and the element survives the
//! merge: add wins.
//!
//! ```text
//! element ──► Entry { token ──► Add | Remove }
//! ```

use crate::error::{ORSetError, Result};
use crate::lattice::{Crdt, Lattice};
use crate::token::{RandomTokens, Token, TokenSource};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// State of a single token.
///
/// Ordered `Remove < Add`; the join of two tags is their maximum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tag {
    Remove,
    Add,
}

impl Tag {
    pub fn join(self, other: Tag) -> Tag {
        self.max(other)
    }

    pub fn is_add(self) -> bool {
        self == Tag::Add
    }
}

/// Every token recorded for one element.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entry {
    tokens: BTreeMap<Token, Tag>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Member iff at least one token is still tagged `Add`.
    pub fn is_live(&self) -> bool {
        self.tokens.values().any(|tag| tag.is_add())
    }

    pub fn live_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens
            .iter()
            .filter(|(_, tag)| tag.is_add())
            .map(|(token, _)| token)
    }

    pub fn tombstones(&self) -> impl Iterator<Item = &Token> {
        self.tokens
            .iter()
            .filter(|(_, tag)| !tag.is_add())
            .map(|(token, _)| token)
    }

    pub fn get(&self, token: &Token) -> Option<Tag> {
        self.tokens.get(token).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Token, Tag)> {
        self.tokens.iter().map(|(token, tag)| (token, *tag))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token-wise join. A token missing on one side counts as `Remove`
    /// there, which is the identity for [`Tag::join`].
    pub fn join(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.join_assign(other);
        merged
    }

    fn join_assign(&mut self, other: &Self) {
        for (token, tag) in &other.tokens {
            self.tokens
                .entry(token.clone())
                .and_modify(|mine| *mine = mine.join(*tag))
                .or_insert(*tag);
        }
    }

    /// Every token of `self` is in `other` with an equal or dominating tag.
    fn leq(&self, other: &Self) -> bool {
        self.tokens
            .iter()
            .all(|(token, tag)| other.get(token).is_some_and(|theirs| *tag <= theirs))
    }

    fn record(&mut self, token: Token) {
        self.tokens.insert(token, Tag::Add);
    }

    /// Retag every observed token as removed. Returns how many were live.
    fn retire(&mut self) -> usize {
        let mut retired = 0;
        for tag in self.tokens.values_mut() {
            if tag.is_add() {
                *tag = Tag::Remove;
                retired += 1;
            }
        }
        retired
    }
}

/// A single local mutation of an [`ORSet`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ORSetOp<T> {
    /// Add one element under a fresh token.
    Add(T),
    /// Add each element independently, each under its own token.
    AddAll(Vec<T>),
    /// Remove every observed occurrence of an element.
    Remove(T),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ORSet<T: Ord + Clone> {
    /// Entries are never removed; only their tokens are retagged
    entries: BTreeMap<T, Entry>,
}

impl<T: Ord + Clone> ORSet<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Apply `op`, drawing tokens from `tokens` instead of the default
    /// random source.
    pub fn update_with<S>(&self, op: ORSetOp<T>, tokens: &mut S) -> Result<Self>
    where
        S: TokenSource + ?Sized,
    {
        let mut next = self.clone();
        match op {
            ORSetOp::Add(value) => {
                next.insert(value, tokens.mint());
            }
            ORSetOp::AddAll(values) => {
                if values.is_empty() {
                    return Err(ORSetError::EmptyBatch);
                }
                for value in values {
                    next.insert(value, tokens.mint());
                }
            }
            ORSetOp::Remove(value) => next.remove(&value)?,
        }
        Ok(next)
    }

    /// Add an element with a new random token, returning the token.
    pub fn add(&mut self, value: T) -> Token {
        let token = Token::random();
        self.insert(value, token.clone());
        token
    }

    /// Add each element with its own token.
    pub fn add_all<I>(&mut self, values: I) -> Result<Vec<Token>>
    where
        I: IntoIterator<Item = T>,
    {
        let tokens: Vec<Token> = values.into_iter().map(|value| self.add(value)).collect();
        if tokens.is_empty() {
            return Err(ORSetError::EmptyBatch);
        }
        Ok(tokens)
    }

    /// Remove all observed instances of an element.
    pub fn remove(&mut self, value: &T) -> Result<()> {
        match self.entries.get_mut(value) {
            Some(entry) => {
                let retired = entry.retire();
                trace!(retired, "retired observed tokens");
                Ok(())
            }
            None => {
                debug!("remove rejected: element has no entry");
                Err(ORSetError::NotFound)
            }
        }
    }

    fn insert(&mut self, value: T, token: Token) {
        trace!(%token, "recording add");
        self.entries.entry(value).or_default().record(token);
    }

    pub fn contains(&self, value: &T) -> bool {
        self.entries.get(value).is_some_and(Entry::is_live)
    }

    /// Current members, in element order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(value, _)| value)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry(&self, value: &T) -> Option<&Entry> {
        self.entries.get(value)
    }

    /// Elements with an entry, members or not.
    pub fn element_count(&self) -> usize {
        self.entries.len()
    }

    pub fn tombstone_count(&self) -> usize {
        self.entries
            .values()
            .map(|entry| entry.tombstones().count())
            .sum()
    }
}

impl<T: Ord + Clone> Default for ORSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> Lattice for ORSet<T> {
    fn bottom() -> Self {
        Self::new()
    }

    fn join(&self, other: &Self) -> Self {
        let mut entries = self.entries.clone();
        for (value, theirs) in &other.entries {
            match entries.get_mut(value) {
                Some(mine) => mine.join_assign(theirs),
                None => {
                    entries.insert(value.clone(), theirs.clone());
                }
            }
        }
        Self { entries }
    }

    fn partial_cmp_lattice(&self, other: &Self) -> Option<Ordering> {
        match (self.leq(other), other.leq(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }

    fn leq(&self, other: &Self) -> bool {
        self.entries.iter().all(|(value, mine)| {
            other
                .entries
                .get(value)
                .is_some_and(|theirs| mine.leq(theirs))
        })
    }
}

impl<T: Ord + Clone> Crdt for ORSet<T> {
    type Value = T;
    type Selector = T;
    type View = Entry;
    type Op = ORSetOp<T>;
    type Error = ORSetError;

    fn query(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    fn query_at(&self, selector: &T) -> Entry {
        self.entries.get(selector).cloned().unwrap_or_default()
    }

    fn update(&self, op: ORSetOp<T>) -> Result<Self> {
        self.update_with(op, &mut RandomTokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::ReplicaTokens;

    fn s(value: &str) -> String {
        value.to_string()
    }

    fn add(set: &ORSet<String>, value: &str) -> ORSet<String> {
        set.update(ORSetOp::Add(s(value))).unwrap()
    }

    fn remove(set: &ORSet<String>, value: &str) -> ORSet<String> {
        set.update(ORSetOp::Remove(s(value))).unwrap()
    }

    #[test]
    fn add_then_add_then_remove_scenario() {
        let s0 = ORSet::init();
        let s1 = add(&s0, "foo");
        let s2 = add(&s1, "foo");
        let s3 = add(&s2, "bar");
        let s4 = remove(&s3, "foo");

        assert_eq!(s4.query(), vec![s("bar")]);
        assert_eq!(s4.query_at(&s("foo")).len(), 2);
        assert_eq!(s4.query_at(&s("foo")).tombstones().count(), 2);
    }

    #[test]
    fn remove_of_unknown_element_is_not_found() {
        let s0: ORSet<String> = ORSet::init();
        let result = s0.update(ORSetOp::Remove(s("baz")));

        assert_eq!(result, Err(ORSetError::NotFound));
        assert_eq!(s0, ORSet::init());
    }

    #[test]
    fn remove_after_add_drops_membership() {
        let added = add(&ORSet::init(), "e");
        assert!(added.contains(&s("e")));

        let removed = remove(&added, "e");
        assert!(!removed.contains(&s("e")));
        assert!(removed.query().is_empty());
        // The entry itself survives as a tombstone
        assert_eq!(removed.element_count(), 1);
        assert_eq!(removed.tombstone_count(), 1);
    }

    #[test]
    fn removing_an_already_removed_element_succeeds() {
        let gone = remove(&add(&ORSet::init(), "e"), "e");
        let again = gone.update(ORSetOp::Remove(s("e"))).unwrap();
        assert_eq!(again, gone);
    }

    #[test]
    fn update_leaves_input_untouched() {
        let s1 = add(&ORSet::init(), "foo");
        let before = s1.clone();
        let _ = remove(&s1, "foo");
        let _ = add(&s1, "bar");
        assert_eq!(s1, before);
    }

    #[test]
    fn concurrent_add_wins_over_unobserved_remove() {
        let shared = add(&ORSet::init(), "e");

        // Replica 1 adds e again; replica 2 removes e without seeing that add
        let mut r1 = shared.clone();
        let token = r1.add(s("e"));
        let r2 = remove(&shared, "e");

        for merged in [r1.merge(&r2), r2.merge(&r1)] {
            assert!(merged.contains(&s("e")));
            assert_eq!(merged.query_at(&s("e")).get(&token), Some(Tag::Add));
        }
    }

    #[test]
    fn concurrent_independent_adds_both_survive() {
        let r1 = add(&ORSet::init(), "foo");
        let r2 = add(&ORSet::init(), "bar");

        assert_eq!(r1.merge(&r2).query(), vec![s("bar"), s("foo")]);
        assert_eq!(r1.merge(&r2), r2.merge(&r1));
    }

    #[test]
    fn concurrent_adds_of_same_element_keep_both_tokens() {
        let r1 = add(&ORSet::init(), "foo");
        let r2 = add(&ORSet::init(), "foo");

        let merged = r1.merge(&r2);
        assert_eq!(merged.query_at(&s("foo")).live_tokens().count(), 2);
    }

    #[test]
    fn duplicate_delivery_is_a_no_op() {
        let local = add(&add(&ORSet::init(), "a"), "b");
        let remote = remove(&add(&ORSet::init(), "c"), "c");

        let once = local.merge(&remote);
        let twice = once.merge(&remote).merge(&remote);
        assert_eq!(once, twice);
    }

    #[test]
    fn live_token_on_either_side_keeps_token_live() {
        // Replica 2 received the add but never the remove; its copy of the
        // token is still Add, which dominates the tombstone.
        let added = add(&ORSet::init(), "e");
        let removed = remove(&added, "e");

        let merged = removed.merge(&added);
        assert!(merged.contains(&s("e")));
        assert!(removed.compare(&added));
    }

    #[test]
    fn add_all_gives_each_element_its_own_token() {
        let set = ORSet::<String>::init()
            .update(ORSetOp::AddAll(vec![s("ab"), s("c"), s("ab")]))
            .unwrap();

        // Strings are single elements, never split into characters
        assert_eq!(set.query(), vec![s("ab"), s("c")]);
        assert_eq!(set.query_at(&s("ab")).len(), 2);
        assert!(!set.contains(&s("a")));
    }

    #[test]
    fn add_all_rejects_empty_batch() {
        let s0: ORSet<String> = ORSet::init();
        assert_eq!(
            s0.update(ORSetOp::AddAll(Vec::new())),
            Err(ORSetError::EmptyBatch)
        );

        let mut set: ORSet<String> = ORSet::new();
        assert_eq!(set.add_all(Vec::new()), Err(ORSetError::EmptyBatch));
        assert_eq!(set.add_all([s("x"), s("y")]).map(|t| t.len()), Ok(2));
    }

    #[test]
    fn query_at_unknown_element_is_empty() {
        let set = add(&ORSet::init(), "foo");
        assert!(set.query_at(&s("nope")).is_empty());
    }

    #[test]
    fn compare_is_the_semilattice_order() {
        let s1 = add(&ORSet::init(), "foo");
        let s2 = add(&s1, "bar");
        let other = add(&ORSet::init(), "baz");

        assert!(ORSet::init().compare(&s1));
        assert!(s1.compare(&s2));
        assert!(!s2.compare(&s1));
        assert!(s1.compare(&s1));

        // Concurrent states are incomparable
        assert!(!s1.compare(&other));
        assert!(!other.compare(&s1));
        assert_eq!(s1.partial_cmp_lattice(&other), None);

        assert!(s1.compare(&s1.merge(&other)));
        assert!(other.compare(&s1.merge(&other)));
    }

    #[test]
    fn merge_all_folds_every_replica() {
        let replicas = vec![
            add(&ORSet::init(), "a"),
            add(&ORSet::init(), "b"),
            add(&ORSet::init(), "c"),
        ];
        let merged = ORSet::merge_all(&replicas);
        assert_eq!(merged.query(), vec![s("a"), s("b"), s("c")]);
        assert!(replicas.iter().all(|r| r.compare(&merged)));
    }

    #[test]
    fn update_with_replica_tokens() {
        let mut tokens = ReplicaTokens::new("r1");
        let set = ORSet::<String>::init()
            .update_with(ORSetOp::Add(s("x")), &mut tokens)
            .unwrap();

        let entry = set.query_at(&s("x"));
        let token = entry.live_tokens().next().unwrap();
        assert!(token.as_bytes().starts_with(b"r1"));
        assert_eq!(tokens.next_counter(), 1);
    }

    #[test]
    fn serialization_roundtrip_keeps_tombstones() {
        let set = remove(&add(&add(&ORSet::init(), "a"), "b"), "a");

        let json = serde_json::to_string(&set).unwrap();
        let back: ORSet<String> = serde_json::from_str(&json).unwrap();

        assert_eq!(back, set);
        assert_eq!(back.tombstone_count(), 1);
        assert_eq!(back.query(), vec![s("b")]);
    }
}
