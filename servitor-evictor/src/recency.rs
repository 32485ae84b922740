//! Slab-backed recency list.
//!
//! A doubly-linked list whose nodes live in a `Vec` and link to each other by
//! index, so unlinking and requeueing are O(1) without raw pointers. The head
//! is the most recently used node, the tail the least recently used one.
//! Vacated slots are recycled through a free list.

/// Stable handle to a node in a [`RecencyList`].
///
/// A slot stays valid until its node is removed; after that the index may be
/// handed out again for a different value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Slot(usize);

struct Node<T> {
    value: T,
    prev: Option<Slot>,
    next: Option<Slot>,
}

pub(crate) struct RecencyList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<Slot>,
    tail: Option<Slot>,
    len: usize,
}

impl<T> RecencyList<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Insert a value at the most-recently-used end.
    pub(crate) fn push_front(&mut self, value: T) -> Slot {
        let node = Node {
            value,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                Slot(index)
            }
            None => {
                self.slots.push(Some(node));
                Slot(self.slots.len() - 1)
            }
        };
        self.link_front(slot);
        self.len += 1;
        slot
    }

    /// Move an existing node to the most-recently-used end.
    pub(crate) fn move_to_front(&mut self, slot: Slot) {
        if self.head == Some(slot) || self.node(slot).is_none() {
            return;
        }
        self.unlink(slot);
        self.link_front(slot);
    }

    /// Unlink a node and hand back its value. `None` for a vacant slot.
    pub(crate) fn remove(&mut self, slot: Slot) -> Option<T> {
        self.node(slot)?;
        self.unlink(slot);
        let node = self.slots.get_mut(slot.0)?.take()?;
        self.free.push(slot.0);
        self.len -= 1;
        Some(node.value)
    }

    pub(crate) fn get(&self, slot: Slot) -> Option<&T> {
        self.node(slot).map(|n| &n.value)
    }

    pub(crate) fn get_mut(&mut self, slot: Slot) -> Option<&mut T> {
        self.slots
            .get_mut(slot.0)
            .and_then(|n| n.as_mut())
            .map(|n| &mut n.value)
    }

    /// Iterate from the least-recently-used end towards the head.
    pub(crate) fn iter_lru(&self) -> IterLru<'_, T> {
        IterLru {
            list: self,
            current: self.tail,
        }
    }

    /// Iterate from the most-recently-used end towards the tail.
    pub(crate) fn iter_mru(&self) -> IterMru<'_, T> {
        IterMru {
            list: self,
            current: self.head,
        }
    }

    fn node(&self, slot: Slot) -> Option<&Node<T>> {
        self.slots.get(slot.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, slot: Slot) -> Option<&mut Node<T>> {
        self.slots.get_mut(slot.0).and_then(|n| n.as_mut())
    }

    fn unlink(&mut self, slot: Slot) {
        let (prev, next) = match self.node(slot) {
            Some(n) => (n.prev, n.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = None;
        }
    }

    fn link_front(&mut self, slot: Slot) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(node) = self.node_mut(h) {
                    node.prev = Some(slot);
                }
            }
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct IterLru<'a, T> {
    list: &'a RecencyList<T>,
    current: Option<Slot>,
}

impl<'a, T> Iterator for IterLru<'a, T> {
    type Item = (Slot, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.current?;
        let node = self.list.node(slot)?;
        self.current = node.prev;
        Some((slot, &node.value))
    }
}

pub(crate) struct IterMru<'a, T> {
    list: &'a RecencyList<T>,
    current: Option<Slot>,
}

impl<'a, T> Iterator for IterMru<'a, T> {
    type Item = (Slot, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.current?;
        let node = self.list.node(slot)?;
        self.current = node.next;
        Some((slot, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mru(list: &RecencyList<&'static str>) -> Vec<&'static str> {
        list.iter_mru().map(|(_, v)| *v).collect()
    }

    fn lru(list: &RecencyList<&'static str>) -> Vec<&'static str> {
        list.iter_lru().map(|(_, v)| *v).collect()
    }

    #[test]
    fn test_push_front_orders_most_recent_first() {
        let mut list = RecencyList::new();
        list.push_front("a");
        list.push_front("b");
        list.push_front("c");

        assert_eq!(list.len(), 3);
        assert_eq!(mru(&list), vec!["c", "b", "a"]);
        assert_eq!(lru(&list), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_move_to_front() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");
        let b = list.push_front("b");
        list.push_front("c");

        list.move_to_front(a);
        assert_eq!(mru(&list), vec!["a", "c", "b"]);

        list.move_to_front(b);
        assert_eq!(mru(&list), vec!["b", "a", "c"]);

        // Already at the head.
        list.move_to_front(b);
        assert_eq!(mru(&list), vec!["b", "a", "c"]);
        assert_eq!(lru(&list), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");
        let b = list.push_front("b");
        let c = list.push_front("c");
        let d = list.push_front("d");

        assert_eq!(list.remove(b), Some("b"));
        assert_eq!(mru(&list), vec!["d", "c", "a"]);
        assert_eq!(list.remove(d), Some("d"));
        assert_eq!(mru(&list), vec!["c", "a"]);
        assert_eq!(list.remove(a), Some("a"));
        assert_eq!(lru(&list), vec!["c"]);
        assert_eq!(list.remove(c), Some("c"));
        assert_eq!(list.len(), 0);
        assert!(list.iter_mru().next().is_none());
        assert!(list.iter_lru().next().is_none());
    }

    #[test]
    fn test_remove_vacant_slot_is_none() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");
        assert_eq!(list.remove(a), Some("a"));
        assert_eq!(list.remove(a), None);
        assert!(list.get(a).is_none());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut list = RecencyList::new();
        let a = list.push_front("a");
        list.push_front("b");
        list.remove(a);
        let c = list.push_front("c");

        assert_eq!(c, a);
        assert_eq!(list.get(c), Some(&"c"));
        assert_eq!(mru(&list), vec!["c", "b"]);
    }

    #[test]
    fn test_get_mut() {
        let mut list = RecencyList::new();
        let slot = list.push_front(1u32);
        if let Some(v) = list.get_mut(slot) {
            *v += 41;
        }
        assert_eq!(list.get(slot), Some(&42));
    }
}
