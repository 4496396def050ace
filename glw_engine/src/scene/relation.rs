/// Membership relation between two kinds of entities
///
/// Ownership lives in the scene arenas; a relation only records which
/// members an owner lists, in insertion order. A member may be listed by
/// several owners and several times by the same owner.

use std::hash::Hash;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct RelationTable<O: Copy + Eq + Hash, M: Copy + Eq> {
    members: FxHashMap<O, Vec<M>>,
}

impl<O: Copy + Eq + Hash, M: Copy + Eq> RelationTable<O, M> {
    pub fn new() -> Self {
        Self { members: FxHashMap::default() }
    }

    /// Append `member` to the list of `owner`
    pub fn add(&mut self, owner: O, member: M) {
        self.members.entry(owner).or_default().push(member);
    }

    /// Remove the first occurrence of `member` from `owner`'s list
    pub fn remove(&mut self, owner: O, member: M) -> bool {
        let Some(list) = self.members.get_mut(&owner) else {
            return false;
        };
        match list.iter().position(|m| *m == member) {
            Some(position) => {
                list.remove(position);
                true
            }
            None => false,
        }
    }

    /// Members of `owner`, in insertion order
    pub fn members(&self, owner: O) -> &[M] {
        self.members.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, owner: O, member: M) -> bool {
        self.members(owner).contains(&member)
    }

    /// Owners listing `member` at least once
    pub fn owners_of(&self, member: M) -> Vec<O> {
        self.members
            .iter()
            .filter(|(_, list)| list.contains(&member))
            .map(|(owner, _)| *owner)
            .collect()
    }

    /// Drop `member` from every list
    pub fn remove_member(&mut self, member: M) {
        for list in self.members.values_mut() {
            list.retain(|m| *m != member);
        }
    }

    /// Forget `owner` and its list
    pub fn remove_owner(&mut self, owner: O) -> Vec<M> {
        self.members.remove(&owner).unwrap_or_default()
    }

    /// Mutable list of `owner`, created empty when missing
    pub fn members_mut(&mut self, owner: O) -> &mut Vec<M> {
        self.members.entry(owner).or_default()
    }
}

impl<O: Copy + Eq + Hash, M: Copy + Eq> Default for RelationTable<O, M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "relation_tests.rs"]
mod tests;
