use std::iter::FusedIterator;
use std::marker::PhantomData;

use crate::node::{Link, Node};

/// An iterator over the entries of an [`AvlTree`](crate::AvlTree), sorted by key.
///
/// Starts at the cached minimum and steps through in-order successors.
pub struct Iter<'a, K, V> {
    next: Link<K, V>,
    remaining: usize,
    marker: PhantomData<&'a Node<K, V>>,
}

impl<K, V> Iter<'_, K, V> {
    pub(crate) fn new(first: Link<K, V>, len: usize) -> Self {
        Self {
            next: first,
            remaining: len,
            marker: PhantomData,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node_ptr = self.next?;
        self.next = Node::successor(node_ptr);
        self.remaining = self.remaining.saturating_sub(1);
        let node = unsafe { &*node_ptr.as_ptr() };
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self::new(self.next, self.remaining)
    }
}
