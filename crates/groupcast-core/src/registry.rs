//! Active membership of the multicast group.

use std::{collections::BTreeMap, fmt};

/// Identifies one accepted connection.
///
/// Identity strings are not unique: two connections announcing the same
/// participant id are two distinct handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Set of ACTIVE handles, each with the channel used to reach it.
///
/// Membership here is the definition of ACTIVE: a handle receives multicasts
/// if and only if it is present. Keyed by `HandleId` in a `BTreeMap` so
/// snapshots come out in accept order.
#[derive(Debug, Clone)]
pub struct GroupRegistry<O> {
    members: BTreeMap<HandleId, O>,
}

impl<O> GroupRegistry<O> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { members: BTreeMap::new() }
    }

    /// Add `handle` with its delivery channel.
    ///
    /// Idempotent: registering a present handle keeps the existing channel and
    /// returns `false`.
    pub fn register(&mut self, handle: HandleId, outbound: O) -> bool {
        if self.members.contains_key(&handle) {
            return false;
        }
        self.members.insert(handle, outbound);
        true
    }

    /// Remove `handle`. Returns `false` if it was not a member.
    pub fn deregister(&mut self, handle: HandleId) -> bool {
        self.members.remove(&handle).is_some()
    }

    /// Whether `handle` is currently ACTIVE.
    pub fn is_member(&self, handle: HandleId) -> bool {
        self.members.contains_key(&handle)
    }

    /// Channel registered for `handle`.
    pub fn get(&self, handle: HandleId) -> Option<&O> {
        self.members.get(&handle)
    }

    /// Number of active members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no active members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Ids of all active members, in accept order.
    pub fn handles(&self) -> impl Iterator<Item = HandleId> + '_ {
        self.members.keys().copied()
    }
}

impl<O: Clone> GroupRegistry<O> {
    /// Owned snapshot of the current members for fan-out.
    ///
    /// The snapshot stays valid after the caller releases the group lock;
    /// later membership changes do not affect it.
    pub fn active_members(&self) -> Vec<(HandleId, O)> {
        self.members.iter().map(|(id, o)| (*id, o.clone())).collect()
    }
}

impl<O> Default for GroupRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut registry = GroupRegistry::new();

        assert!(registry.register(HandleId(1), "first"));
        assert!(!registry.register(HandleId(1), "second"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(HandleId(1)), Some(&"first"));
    }

    #[test]
    fn deregister_non_member_is_noop() {
        let mut registry: GroupRegistry<()> = GroupRegistry::new();
        assert!(!registry.deregister(HandleId(7)));
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_later_changes() {
        let mut registry = GroupRegistry::new();
        registry.register(HandleId(2), 'b');
        registry.register(HandleId(1), 'a');

        let snapshot = registry.active_members();
        registry.deregister(HandleId(1));
        registry.register(HandleId(3), 'c');

        assert_eq!(snapshot, vec![(HandleId(1), 'a'), (HandleId(2), 'b')]);
        assert_eq!(registry.handles().collect::<Vec<_>>(), vec![HandleId(2), HandleId(3)]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(u8),
        Deregister(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0u8..8).prop_map(Op::Register), (0u8..8).prop_map(Op::Deregister)]
    }

    proptest! {
        #[test]
        fn membership_is_net_effect_of_operations(ops in prop::collection::vec(op(), 0..64)) {
            let mut registry = GroupRegistry::new();
            let mut model = BTreeSet::new();

            for op in &ops {
                match *op {
                    Op::Register(id) => {
                        let added = registry.register(HandleId(u64::from(id)), ());
                        prop_assert_eq!(added, model.insert(id));
                    },
                    Op::Deregister(id) => {
                        let removed = registry.deregister(HandleId(u64::from(id)));
                        prop_assert_eq!(removed, model.remove(&id));
                    },
                }
            }

            let expected: Vec<_> = model.iter().map(|id| HandleId(u64::from(*id))).collect();
            prop_assert_eq!(registry.handles().collect::<Vec<_>>(), expected);
        }
    }
}
