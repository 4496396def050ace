//! Unit tests for relation.rs

use super::*;

#[test]
fn test_members_keep_insertion_order_and_duplicates() {
    let mut table: RelationTable<u32, char> = RelationTable::new();
    table.add(1, 'a');
    table.add(1, 'b');
    table.add(1, 'a');
    table.add(2, 'a');
    assert_eq!(table.members(1), &['a', 'b', 'a']);
    assert_eq!(table.members(3), &[] as &[char]);

    let mut owners = table.owners_of('a');
    owners.sort();
    assert_eq!(owners, vec![1, 2]);
}

#[test]
fn test_remove_first_occurrence() {
    let mut table: RelationTable<u32, char> = RelationTable::new();
    table.add(1, 'a');
    table.add(1, 'b');
    table.add(1, 'a');
    assert!(table.remove(1, 'a'));
    assert_eq!(table.members(1), &['b', 'a']);
    assert!(!table.remove(1, 'z'));
    assert!(!table.remove(9, 'a'));
}

#[test]
fn test_remove_member_and_owner() {
    let mut table: RelationTable<u32, char> = RelationTable::new();
    table.add(1, 'a');
    table.add(2, 'a');
    table.add(2, 'b');
    table.remove_member('a');
    assert!(table.members(1).is_empty());
    assert_eq!(table.members(2), &['b']);

    assert_eq!(table.remove_owner(2), vec!['b']);
    assert!(!table.contains(2, 'b'));
}
