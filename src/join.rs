use std::mem;

use tracing::trace;

use crate::error::{Result, TreeError};
use crate::node::{Dir, Link, Node, NodePtr};
use crate::tree::{AvlTree, Rebalance};

/// The two halves of a tree split around a key, together with the entry
/// stored at that key.
#[derive(Debug)]
pub struct Split<K, V> {
    /// Every entry with a key smaller than `key`.
    pub smaller: AvlTree<K, V>,
    pub key: K,
    pub value: V,
    /// Every entry with a key bigger than `key`.
    pub bigger: AvlTree<K, V>,
}

impl<K: Ord, V> AvlTree<K, V> {
    /// Joins `other` and the mediator entry `key`/`value` into this tree.
    ///
    /// All keys of one tree must be smaller than `key` and all keys of the
    /// other tree bigger, in either order. Otherwise the call fails with
    /// [`TreeError::OverlappingRanges`] and neither tree is touched. On success
    /// `other` is left empty; its nodes are relinked, not copied.
    ///
    /// Runs in time proportional to the height difference of the two trees.
    pub fn join(&mut self, other: &mut Self, key: K, value: V) -> Result<()> {
        let self_is_smaller = match (self.lies_below(&key)?, other.lies_below(&key)?) {
            (Some(self_below), Some(other_below)) if self_below != other_below => self_below,
            (Some(self_below), None) => self_below,
            (None, Some(other_below)) => !other_below,
            (None, None) => true,
            _ => return Err(TreeError::OverlappingRanges),
        };

        trace!(
            self_height = self.height(),
            other_height = other.height(),
            self_len = self.len(),
            other_len = other.len(),
            "joining trees"
        );

        let mediator = Node::create(key, value);
        let (smaller, bigger) = if self_is_smaller {
            (mem::take(self), mem::take(other))
        } else {
            (mem::take(other), mem::take(self))
        };
        *self = Self::concat(smaller, mediator, bigger);
        Ok(())
    }

    /// Splits the tree around `key`.
    ///
    /// Fails with [`TreeError::KeyNotFound`] if the key is absent, leaving the
    /// tree untouched. On success this tree is left empty and its nodes are
    /// redistributed into [`Split::smaller`] and [`Split::bigger`]; every
    /// ancestor of the split node is reused as the mediator of one join.
    pub fn split(&mut self, key: &K) -> Result<Split<K, V>> {
        let node_ptr = self.find(key).ok_or(TreeError::KeyNotFound)?;
        let (_, _, _, num_nodes) = self.take_parts();

        let (left, right, mut next) = unsafe {
            let node = node_ptr.as_ref();
            (node.left, node.right, node.parent)
        };
        let mut smaller = Self::from_subtree(left);
        let mut bigger = Self::from_subtree(right);

        let mut child_ptr = node_ptr;
        while let Some(parent_ptr) = next {
            let (from_right, sibling) = unsafe {
                let parent = parent_ptr.as_ref();
                next = parent.parent;
                if parent.right == Some(child_ptr) {
                    (true, parent.left)
                } else {
                    (false, parent.right)
                }
            };
            child_ptr = parent_ptr;

            Node::reset(parent_ptr);
            let sibling = Self::from_subtree(sibling);
            if from_right {
                smaller = Self::concat(sibling, parent_ptr, smaller);
            } else {
                bigger = Self::concat(bigger, parent_ptr, sibling);
            }
        }
        let (key, value) = unsafe { Node::destroy(node_ptr) };

        smaller.refresh_extremes();
        bigger.refresh_extremes();
        let mut smaller_len = 0;
        smaller.inorder(|_| smaller_len += 1);
        smaller.num_nodes = smaller_len;
        bigger.num_nodes = num_nodes - 1 - smaller_len;

        trace!(
            smaller_len = smaller.len(),
            bigger_len = bigger.len(),
            "split tree"
        );

        Ok(Split {
            smaller,
            key,
            value,
            bigger,
        })
    }

    /// Returns whether all keys lie below `key` (`Some(true)`), all above it
    /// (`Some(false)`), or `None` for an empty tree.
    fn lies_below(&self, key: &K) -> Result<Option<bool>> {
        match (self.min, self.max) {
            (Some(min_ptr), Some(max_ptr)) => unsafe {
                if max_ptr.as_ref().key < *key {
                    Ok(Some(true))
                } else if min_ptr.as_ref().key > *key {
                    Ok(Some(false))
                } else {
                    Err(TreeError::OverlappingRanges)
                }
            },
            _ => Ok(None),
        }
    }
}

impl<K, V> AvlTree<K, V> {
    /// Wraps a detached subtree into a tree. The cached extremes and the size
    /// are left unset; `split` restores them once all joins are done.
    fn from_subtree(root: Link<K, V>) -> Self {
        if let Some(mut root_ptr) = root {
            unsafe { root_ptr.as_mut().parent = None };
        }
        let mut tree = Self::new();
        tree.root = root;
        tree
    }

    fn refresh_extremes(&mut self) {
        self.min = self.root.map(|root_ptr| Node::extreme(root_ptr, Dir::Left));
        self.max = self.root.map(|root_ptr| Node::extreme(root_ptr, Dir::Right));
    }

    /// Concatenates `smaller`, the detached `mediator` and `bigger`, where all
    /// keys are in that order.
    fn concat(mut smaller: Self, mediator: NodePtr<K, V>, mut bigger: Self) -> Self {
        let (smaller_root, smaller_min, _, smaller_len) = smaller.take_parts();
        let (bigger_root, _, bigger_max, bigger_len) = bigger.take_parts();

        let mut joined = Self::new();
        joined.num_nodes = smaller_len + bigger_len + 1;
        joined.min = if smaller_root.is_some() {
            smaller_min
        } else {
            Some(mediator)
        };
        joined.max = if bigger_root.is_some() {
            bigger_max
        } else {
            Some(mediator)
        };

        match (smaller_root, bigger_root) {
            (Some(big_ptr), small) if Node::height_of(smaller_root) > Node::height_of(small) => {
                joined.graft(big_ptr, mediator, small, Dir::Right)
            }
            (small, Some(big_ptr)) if Node::height_of(bigger_root) > Node::height_of(small) => {
                joined.graft(big_ptr, mediator, small, Dir::Left)
            }
            _ => {
                // Equal heights: the mediator becomes the root.
                Node::attach(mediator, Dir::Left, smaller_root);
                Node::attach(mediator, Dir::Right, bigger_root);
                Node::update_height(mediator);
                joined.root = Some(mediator);
            }
        }
        joined
    }

    /// Hangs `mediator` and the lower tree `small` into the spine of `big`
    /// facing `dir`, then rebalances the path above the mediator.
    fn graft(
        &mut self,
        big_ptr: NodePtr<K, V>,
        mediator: NodePtr<K, V>,
        small: Link<K, V>,
        dir: Dir,
    ) {
        self.root = Some(big_ptr);

        let small_ptr = match small {
            Some(small_ptr) => small_ptr,
            None => {
                // Nothing to hang below the mediator: it becomes the new extreme of `big`.
                let extreme_ptr = Node::extreme(big_ptr, dir);
                Node::attach(extreme_ptr, dir, Some(mediator));
                self.rebalance(Some(extreme_ptr), Rebalance::Delete);
                return;
            }
        };

        let small_height = Node::height_of(small);
        let mut current = big_ptr;
        while Node::height_of(Some(current)) > small_height {
            match Node::child(current, dir) {
                Some(child_ptr) => current = child_ptr,
                None => break,
            }
        }

        Node::attach(mediator, dir, Some(small_ptr));
        if Node::height_of(Some(current)) > small_height {
            // The spine ended above `small`'s height; hang the mediator in the empty slot.
            Node::attach(current, dir, Some(mediator));
        } else {
            self.transplant(current, Some(mediator));
            Node::attach(mediator, !dir, Some(current));
        }
        Node::update_height(mediator);

        let parent = unsafe { mediator.as_ref().parent };
        self.rebalance(parent, Rebalance::Delete);
    }
}
