use wayward::registry::{Handle, Registry};

fn values<T: Copy>(registry: &Registry<T>) -> Vec<T> {
    registry.iter().map(|(_, v)| *v).collect()
}

#[test]
fn test_empty_registry() {
    let registry: Registry<u32> = Registry::new();

    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
    assert!(registry.iter().next().is_none());
    assert!(registry.iter().next_back().is_none());
}

#[test]
fn test_link_front_yields_most_recent_first() {
    let mut registry = Registry::new();
    registry.link_front('a');
    registry.link_front('b');
    registry.link_front('c');

    assert!(!registry.is_empty());
    assert_eq!(values(&registry), vec!['c', 'b', 'a']);
}

#[test]
fn test_link_back_yields_fifo() {
    let mut registry = Registry::new();
    registry.link_back('a');
    registry.link_back('b');
    registry.link_back('c');

    assert_eq!(values(&registry), vec!['a', 'b', 'c']);
}

#[test]
fn test_mixed_linking_and_reverse_iteration() {
    let mut registry = Registry::new();
    registry.link_back(2);
    registry.link_front(1);
    registry.link_back(3);
    registry.link_front(0);

    assert_eq!(values(&registry), vec![0, 1, 2, 3]);
    let reversed: Vec<i32> = registry.iter().rev().map(|(_, v)| *v).collect();
    assert_eq!(reversed, vec![3, 2, 1, 0]);
    assert_eq!(registry.iter().len(), 4);
}

#[test]
fn test_unlink_middle_keeps_neighbours_linked() {
    let mut registry = Registry::new();
    let _a = registry.link_back('a');
    let b = registry.link_back('b');
    let _c = registry.link_back('c');

    assert_eq!(registry.unlink(b), Some('b'));

    assert_eq!(values(&registry), vec!['a', 'c']);
    let reversed: Vec<char> = registry.iter().rev().map(|(_, v)| *v).collect();
    assert_eq!(reversed, vec!['c', 'a']);
}

#[test]
fn test_unlink_head_and_tail() {
    let mut registry = Registry::new();
    let a = registry.link_back('a');
    let _b = registry.link_back('b');
    let c = registry.link_back('c');

    registry.unlink(a);
    registry.unlink(c);
    assert_eq!(values(&registry), vec!['b']);

    registry.link_front('x');
    registry.link_back('y');
    assert_eq!(values(&registry), vec!['x', 'b', 'y']);
}

#[test]
fn test_unlink_all_empties_registry() {
    let mut registry = Registry::new();
    for i in 0..5 {
        registry.link_back(i);
    }

    assert_eq!(registry.unlink_all(), vec![0, 1, 2, 3, 4]);
    assert!(registry.is_empty());
    assert!(registry.iter().next().is_none());
}

#[test]
fn test_unlinked_handle_no_longer_resolves() {
    let mut registry = Registry::new();
    let a = registry.link_back("a");

    assert!(registry.contains(a));
    assert_eq!(registry.unlink(a), Some("a"));
    assert!(!registry.contains(a));
    assert_eq!(registry.get(a), None);
    // A second unlink is a no-op
    assert_eq!(registry.unlink(a), None);
}

#[test]
fn test_value_moves_between_registries() {
    let mut list_a = Registry::new();
    let mut list_b = Registry::new();

    let handle = list_a.link_front(String::from("node"));
    let node = list_a.unlink(handle).unwrap();
    let moved = list_b.link_front(node);

    assert!(list_a.is_empty());
    assert_eq!(list_b.get(moved).map(String::as_str), Some("node"));
}

#[test]
fn test_get_mut_updates_in_place() {
    let mut registry = Registry::new();
    let h = registry.link_back(1);

    *registry.get_mut(h).unwrap() += 41;

    assert_eq!(registry.get(h), Some(&42));
}

#[test]
fn test_handles_match_iteration() {
    let mut registry = Registry::new();
    let handles: Vec<Handle> = (0..3).map(|i| registry.link_back(i)).collect();

    let seen: Vec<Handle> = registry.iter().map(|(h, _)| h).collect();
    assert_eq!(seen, handles);
}

#[test]
fn test_arbitrary_link_unlink_sequence_matches_model() {
    // Deterministic pseudo-random walk compared against a Vec model.
    let mut registry = Registry::new();
    let mut model: Vec<(Handle, u32)> = Vec::new();
    let mut seed: u32 = 0x2545_f491;

    for step in 0..500u32 {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;

        match seed % 3 {
            0 => {
                let h = registry.link_front(step);
                model.insert(0, (h, step));
            }
            1 => {
                let h = registry.link_back(step);
                model.push((h, step));
            }
            _ if !model.is_empty() => {
                let (h, v) = model.remove(seed as usize % model.len());
                assert_eq!(registry.unlink(h), Some(v));
            }
            _ => {}
        }

        assert_eq!(registry.len(), model.len());
    }

    let actual: Vec<(Handle, u32)> = registry.iter().map(|(h, v)| (h, *v)).collect();
    assert_eq!(actual, model);
}

#[test]
#[should_panic(expected = "did not issue it")]
fn test_foreign_handle_is_a_programming_error() {
    let mut list_a = Registry::new();
    let list_b: Registry<u8> = Registry::new();

    let handle = list_a.link_back(1u8);
    let _ = list_b.get(handle);
}
