//! Resource registry.
//!
//! An ordered, owning set of live resources (connections, listeners) addressed
//! by stable [`Handle`]s instead of pointers.
//!
//! Entries live in an arena of slots. Each slot carries a generation counter
//! that is bumped whenever the slot is released, so a handle that outlives its
//! entry can never observe the slot's next occupant. Linked entries are chained
//! through `prev`/`next` slot indices, which gives:
//!
//! - O(1) `link_front` / `link_back`
//! - O(1) `unlink` using only the handle (no search)
//! - forward and backward iteration in link order
//!
//! ```text
//!  head ──► [slot 2] ◄──► [slot 0] ◄──► [slot 3] ◄── tail
//!  free ──► [slot 1] ──► ∅
//! ```
//!
//! A value is moved into the registry when linked and moved back out when
//! unlinked, so it can be a member of at most one registry at a time. Using a
//! handle with a registry other than the one that issued it is a lifecycle bug
//! and panics.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_REGISTRY_ID: AtomicU32 = AtomicU32::new(1);

/// Stable reference to an entry of a [`Registry`].
///
/// Handles are plain values; they stay cheap to copy into tasks and log lines
/// and simply stop resolving once their entry is unlinked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    registry: u32,
    index: u32,
    generation: u32,
}

impl Handle {
    /// Slot index inside the owning registry.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time the entry was linked.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

struct Node<T> {
    value: T,
    prev: Option<u32>,
    next: Option<u32>,
}

enum SlotState<T> {
    Linked(Node<T>),
    /// Released slot; holds the next free slot index.
    Free(Option<u32>),
}

struct Slot<T> {
    generation: u32,
    state: SlotState<T>,
}

/// Ordered owning container of live resources.
///
/// Deliberately not `Clone`: a registry is the single owner of its entries.
pub struct Registry<T> {
    id: u32,
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            free_head: None,
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Number of linked entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Links `value` at the front. Iteration yields most-recently-linked first.
    pub fn link_front(&mut self, value: T) -> Handle {
        let index = self.allocate(Node {
            value,
            prev: None,
            next: self.head,
        });

        match self.head {
            Some(old) => self.node_mut(old).prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
        self.len += 1;

        self.handle_at(index)
    }

    /// Links `value` at the back. Iteration yields entries in FIFO order.
    pub fn link_back(&mut self, value: T) -> Handle {
        let index = self.allocate(Node {
            value,
            prev: self.tail,
            next: None,
        });

        match self.tail {
            Some(old) => self.node_mut(old).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        self.handle_at(index)
    }

    /// Removes the entry behind `handle` and hands ownership back.
    ///
    /// Returns `None` when the entry is already gone, which makes late
    /// completions for a released resource a no-op.
    pub fn unlink(&mut self, handle: Handle) -> Option<T> {
        self.check(handle);

        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || !matches!(slot.state, SlotState::Linked(_)) {
            return None;
        }

        let state = std::mem::replace(&mut slot.state, SlotState::Free(self.free_head));
        slot.generation = slot.generation.wrapping_add(1);
        self.free_head = Some(handle.index);

        let SlotState::Linked(node) = state else {
            unreachable!("slot state checked above");
        };

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.len -= 1;

        Some(node.value)
    }

    /// Unlinks every entry, returning them in iteration order.
    pub fn unlink_all(&mut self) -> Vec<T> {
        let handles: Vec<Handle> = self.iter().map(|(handle, _)| handle).collect();
        handles
            .into_iter()
            .filter_map(|handle| self.unlink(handle))
            .collect()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.check(handle);
        match self.slots.get(handle.index as usize) {
            Some(Slot {
                generation,
                state: SlotState::Linked(node),
            }) if *generation == handle.generation => Some(&node.value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.check(handle);
        match self.slots.get_mut(handle.index as usize) {
            Some(Slot {
                generation,
                state: SlotState::Linked(node),
            }) if *generation == handle.generation => Some(&mut node.value),
            _ => None,
        }
    }

    /// Iterates `(handle, value)` pairs front to back. Use `.rev()` for back to front.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            registry: self,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }

    fn check(&self, handle: Handle) {
        assert_eq!(
            handle.registry, self.id,
            "registry handle {handle} used with a registry that did not issue it"
        );
    }

    fn allocate(&mut self, node: Node<T>) -> u32 {
        match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let SlotState::Free(next_free) = slot.state else {
                    unreachable!("free list points at a linked slot");
                };
                slot.state = SlotState::Linked(node);
                self.free_head = next_free;
                index
            }
            None => {
                let index = u32::try_from(self.slots.len()).expect("registry slot index overflow");
                self.slots.push(Slot {
                    generation: 0,
                    state: SlotState::Linked(node),
                });
                index
            }
        }
    }

    fn handle_at(&self, index: u32) -> Handle {
        Handle {
            registry: self.id,
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    fn node(&self, index: u32) -> &Node<T> {
        match &self.slots[index as usize].state {
            SlotState::Linked(node) => node,
            SlotState::Free(_) => unreachable!("link points at a free slot"),
        }
    }

    fn node_mut(&mut self, index: u32) -> &mut Node<T> {
        match &mut self.slots[index as usize].state {
            SlotState::Linked(node) => node,
            SlotState::Free(_) => unreachable!("link points at a free slot"),
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Front-to-back iterator over a [`Registry`].
pub struct Iter<'a, T> {
    registry: &'a Registry<T>,
    front: Option<u32>,
    back: Option<u32>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Handle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.front?;
        let node = self.registry.node(index);
        self.front = node.next;
        self.remaining -= 1;
        Some((self.registry.handle_at(index), &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.back?;
        let node = self.registry.node(index);
        self.back = node.prev;
        self.remaining -= 1;
        Some((self.registry.handle_at(index), &node.value))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a Registry<T> {
    type Item = (Handle, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
