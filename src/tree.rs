use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{Result, TreeError};
use crate::iter::Iter;
use crate::node::{Dir, Link, Node, NodePtr, NodeRef};

/// An ordered map implemented with an AVL tree.
///
/// Besides the usual map operations the tree supports finger search and
/// finger insertion (starting from the maximum node instead of the root),
/// and the structural operations [`join`](AvlTree::join) and
/// [`split`](AvlTree::split), which move whole subtrees between trees
/// without copying nodes.
pub struct AvlTree<K, V> {
    pub(crate) root: Link<K, V>,
    pub(crate) min: Link<K, V>,
    pub(crate) max: Link<K, V>,
    pub(crate) num_nodes: usize,
    pub(crate) marker: PhantomData<Box<Node<K, V>>>,
}

/// Outcome of a successful [`insert`](AvlTree::insert) or
/// [`finger_insert`](AvlTree::finger_insert).
#[derive(Debug)]
pub struct Insertion<'a, K, V> {
    /// The newly created node.
    pub node: NodeRef<'a, K, V>,
    /// Edges walked to reach the insertion point, plus one.
    pub edges: usize,
    /// Number of ancestors whose height grew before any rotation was needed.
    pub promotions: usize,
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) enum Rebalance {
    /// Stop after the first rotation; one rotation always restores balance after an insert.
    Insert,
    /// Keep walking to the root; deletions and joins may need a rotation per level.
    Delete,
}

enum Visit {
    FromParent,
    FromLeft,
    FromRight,
}

impl<K, V> AvlTree<K, V> {
    /// Creates an empty tree.
    /// No memory is allocated until the first item is inserted.
    pub fn new() -> Self {
        Self {
            root: None,
            min: None,
            max: None,
            num_nodes: 0,
            marker: PhantomData,
        }
    }

    /// Returns true if the tree contains no elements.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of elements in the tree.
    pub fn len(&self) -> usize {
        self.num_nodes
    }

    /// Returns the height of the root, or -1 for an empty tree.
    pub fn height(&self) -> isize {
        Node::height_of(self.root)
    }

    pub fn root(&self) -> Option<NodeRef<'_, K, V>> {
        self.root.map(NodeRef::new)
    }

    /// Returns the node with the smallest key.
    pub fn min_node(&self) -> Option<NodeRef<'_, K, V>> {
        self.min.map(NodeRef::new)
    }

    /// Returns the node with the largest key.
    pub fn max_node(&self) -> Option<NodeRef<'_, K, V>> {
        self.max.map(NodeRef::new)
    }

    /// Clears the tree, deallocating all memory.
    pub fn clear(&mut self) {
        self.postorder(|node_ptr| unsafe {
            Node::destroy(node_ptr);
        });
        self.root = None;
        self.min = None;
        self.max = None;
        self.num_nodes = 0;
    }

    /// Returns an iterator over the entries of the tree, sorted by key.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.min, self.num_nodes)
    }

    /// Returns all entries in key order.
    pub fn to_sorted_pairs(&self) -> Vec<(&K, &V)> {
        self.iter().collect()
    }

    /// Takes the links and counters out of the tree, leaving it empty
    /// without freeing any node.
    pub(crate) fn take_parts(&mut self) -> (Link<K, V>, Link<K, V>, Link<K, V>, usize) {
        let num_nodes = self.num_nodes;
        self.num_nodes = 0;
        (self.root.take(), self.min.take(), self.max.take(), num_nodes)
    }

    /// Replaces `old` by `new` in the slot of `old`'s parent, or as root.
    pub(crate) fn transplant(&mut self, old: NodePtr<K, V>, new: Link<K, V>) {
        unsafe {
            let parent = old.as_ref().parent;
            match parent {
                None => self.root = new,
                Some(mut parent_ptr) => {
                    if parent_ptr.as_ref().left == Some(old) {
                        parent_ptr.as_mut().left = new;
                    } else {
                        parent_ptr.as_mut().right = new;
                    }
                }
            }
            if let Some(mut new_ptr) = new {
                new_ptr.as_mut().parent = parent;
            }
        }
    }

    /// Rotates `node_ptr` down towards `dir`; its child on the other side takes its place.
    /// Only the two nodes that changed children get their heights recomputed.
    fn rotate(&mut self, node_ptr: NodePtr<K, V>, dir: Dir) {
        if let Some(pivot_ptr) = Node::child(node_ptr, !dir) {
            Node::attach(node_ptr, !dir, Node::child(pivot_ptr, dir));
            self.transplant(node_ptr, Some(pivot_ptr));
            Node::attach(pivot_ptr, dir, Some(node_ptr));

            Node::update_height(node_ptr);
            Node::update_height(pivot_ptr);
        }
    }

    /// Restores the AVL condition at a node whose balance factor is +2 or -2.
    fn rotate_heavy(&mut self, node_ptr: NodePtr<K, V>, balance: isize) {
        let heavy = if balance > 0 { Dir::Left } else { Dir::Right };
        if let Some(child_ptr) = Node::child(node_ptr, heavy) {
            let child_balance = Node::balance_factor(child_ptr);
            let leans_inward = match heavy {
                Dir::Left => child_balance < 0,
                Dir::Right => child_balance > 0,
            };
            if leans_inward {
                self.rotate(child_ptr, heavy);
            }
            self.rotate(node_ptr, !heavy);
        }
    }

    /// Walks from `start_from` up to the root, fixing heights and balance.
    /// Stops as soon as a node keeps both its height and its balance.
    /// Returns the number of promotions, i.e. height changes that needed no rotation.
    pub(crate) fn rebalance(&mut self, start_from: Link<K, V>, mode: Rebalance) -> usize {
        let mut promotions = 0;
        let mut current = start_from;
        while let Some(node_ptr) = current {
            let (parent, previous_height) =
                unsafe { (node_ptr.as_ref().parent, node_ptr.as_ref().height) };
            Node::update_height(node_ptr);
            let balance = Node::balance_factor(node_ptr);
            if balance.abs() < 2 {
                if unsafe { node_ptr.as_ref().height } == previous_height {
                    break;
                }
                promotions += 1;
            } else {
                self.rotate_heavy(node_ptr, balance);
                if mode == Rebalance::Insert {
                    break;
                }
            }
            current = parent;
        }
        promotions
    }

    /// Visits children before parents, so the callback may free each node.
    fn postorder<F: FnMut(NodePtr<K, V>)>(&self, f: F) {
        self.traverse(|_| {}, |_| {}, f);
    }

    pub(crate) fn inorder<F: FnMut(NodePtr<K, V>)>(&self, f: F) {
        self.traverse(|_| {}, f, |_| {});
    }

    #[cfg(any(test, feature = "consistency_check"))]
    fn preorder<F: FnMut(NodePtr<K, V>)>(&self, f: F) {
        self.traverse(f, |_| {}, |_| {});
    }

    fn traverse<Pre, In, Post>(&self, mut preorder: Pre, mut inorder: In, mut postorder: Post)
    where
        Pre: FnMut(NodePtr<K, V>),
        In: FnMut(NodePtr<K, V>),
        Post: FnMut(NodePtr<K, V>),
    {
        if let Some(mut node_ptr) = self.root {
            let mut visit = Visit::FromParent;
            loop {
                match visit {
                    Visit::FromParent => {
                        preorder(node_ptr);
                        match Node::child(node_ptr, Dir::Left) {
                            Some(left_ptr) => node_ptr = left_ptr,
                            None => visit = Visit::FromLeft,
                        }
                    }
                    Visit::FromLeft => {
                        inorder(node_ptr);
                        match Node::child(node_ptr, Dir::Right) {
                            Some(right_ptr) => {
                                node_ptr = right_ptr;
                                visit = Visit::FromParent;
                            }
                            None => visit = Visit::FromRight,
                        }
                    }
                    Visit::FromRight => {
                        // The postorder callback may free the node, read its parent first.
                        let parent = unsafe { node_ptr.as_ref().parent };
                        match parent {
                            Some(parent_ptr) => {
                                visit = if Node::child(parent_ptr, Dir::Left) == Some(node_ptr) {
                                    Visit::FromLeft
                                } else {
                                    Visit::FromRight
                                };
                                postorder(node_ptr);
                                node_ptr = parent_ptr;
                            }
                            None => {
                                postorder(node_ptr);
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    /// Returns a reference to the value corresponding to the key.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key)
            .map(|node_ptr| &unsafe { &*node_ptr.as_ptr() }.value)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.find(key)
            .map(|node_ptr| &mut unsafe { &mut *node_ptr.as_ptr() }.value)
    }

    /// Returns references to the key-value pair corresponding to the key.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        self.find(key).map(|node_ptr| {
            let node = unsafe { &*node_ptr.as_ptr() };
            (&node.key, &node.value)
        })
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Searches for `key` starting at the root.
    ///
    /// Returns the matching node, if any, together with the number of edges
    /// on the walked path plus one.
    pub fn search(&self, key: &K) -> (Option<NodeRef<'_, K, V>>, usize) {
        let (found, edges) = Self::search_from(self.root, key, 1);
        (found.map(NodeRef::new), edges)
    }

    /// Searches for `key` starting at the maximum node.
    ///
    /// Ascends from the maximum while keys exceed `key`, then descends like
    /// [`search`](AvlTree::search). Finds the same node as `search`; only the
    /// edge count differs.
    pub fn finger_search(&self, key: &K) -> (Option<NodeRef<'_, K, V>>, usize) {
        match self.finger_start(key, 1) {
            None => (None, 1),
            Some((start_ptr, edges)) => {
                let (found, edges) = Self::search_from(Some(start_ptr), key, edges);
                (found.map(NodeRef::new), edges)
            }
        }
    }

    /// Inserts a key-value pair, descending from the root.
    /// Fails with [`TreeError::DuplicateKey`] if the key is already present.
    pub fn insert(&mut self, key: K, value: V) -> Result<Insertion<'_, K, V>> {
        match self.root {
            None => Ok(self.insert_first(key, value)),
            Some(root_ptr) => self.insert_below(root_ptr, key, value, 2),
        }
    }

    /// Inserts a key-value pair, placing it below the node reached by the
    /// finger ascent from the maximum. Ends in the same tree as [`insert`](AvlTree::insert).
    pub fn finger_insert(&mut self, key: K, value: V) -> Result<Insertion<'_, K, V>> {
        match self.finger_start(&key, 2) {
            None => Ok(self.insert_first(key, value)),
            Some((start_ptr, edges)) => self.insert_below(start_ptr, key, value, edges),
        }
    }

    /// Removes a key from the tree, returning the stored key and value.
    /// Fails with [`TreeError::KeyNotFound`] if the key is absent.
    pub fn delete(&mut self, key: &K) -> Result<(K, V)> {
        let node_ptr = self.find(key).ok_or(TreeError::KeyNotFound)?;
        debug_assert!(self.num_nodes >= 1);
        self.unlink_node(node_ptr);
        Ok(unsafe { Node::destroy(node_ptr) })
    }

    #[cfg(any(test, feature = "consistency_check"))]
    pub fn check_consistency(&self) {
        unsafe {
            // Check root link
            if let Some(root_ptr) = self.root {
                assert!(root_ptr.as_ref().parent.is_none());
            }

            // Check tree nodes
            let mut num_nodes = 0;
            self.preorder(|node_ptr| {
                let node = node_ptr.as_ref();

                if let Some(left_ptr) = node.left {
                    assert!(left_ptr.as_ref().parent == Some(node_ptr));
                }
                if let Some(right_ptr) = node.right {
                    assert!(right_ptr.as_ref().parent == Some(node_ptr));
                }

                let left_height = Node::height_of(node.left);
                let right_height = Node::height_of(node.right);
                assert_eq!(node.height, 1 + left_height.max(right_height));

                // Check AVL condition (nearly balance)
                assert!((left_height - right_height).abs() <= 1);

                num_nodes += 1;
            });
            assert_eq!(num_nodes, self.num_nodes);

            // Check key order
            let mut previous: Link<K, V> = None;
            self.inorder(|node_ptr| {
                if let Some(previous_ptr) = previous {
                    assert!(previous_ptr.as_ref().key < node_ptr.as_ref().key);
                }
                previous = Some(node_ptr);
            });

            // Check cached extremes
            assert!(self.min == self.root.map(|root_ptr| Node::extreme(root_ptr, Dir::Left)));
            assert!(self.max == self.root.map(|root_ptr| Node::extreme(root_ptr, Dir::Right)));
        }
    }

    pub(crate) fn find(&self, key: &K) -> Link<K, V> {
        Self::search_from(self.root, key, 1).0
    }

    fn search_from(start_from: Link<K, V>, key: &K, mut edges: usize) -> (Link<K, V>, usize) {
        let mut current = start_from;
        while let Some(node_ptr) = current {
            current = unsafe {
                match key.cmp(&node_ptr.as_ref().key) {
                    Ordering::Equal => return (Some(node_ptr), edges),
                    Ordering::Less => node_ptr.as_ref().left,
                    Ordering::Greater => node_ptr.as_ref().right,
                }
            };
            edges += 1;
        }
        (None, edges)
    }

    /// Ascends from the maximum while the keys exceed `key`, never past the root.
    /// Returns the node to descend from and the adjusted edge count,
    /// or `None` if the tree is empty.
    fn finger_start(&self, key: &K, mut edges: usize) -> Option<(NodePtr<K, V>, usize)> {
        let max_ptr = self.max?;
        let mut node_ptr = max_ptr;
        unsafe {
            while node_ptr.as_ref().key > *key {
                match node_ptr.as_ref().parent {
                    Some(parent_ptr) => node_ptr = parent_ptr,
                    None => break,
                }
                edges += 1;
            }
            let stopped_above = node_ptr.as_ref().parent.is_none() && node_ptr.as_ref().key > *key;
            if stopped_above || node_ptr == max_ptr {
                Some((node_ptr, edges))
            } else {
                // The descent walks back down the last edge climbed.
                Some((node_ptr, edges - 2))
            }
        }
    }

    fn insert_first(&mut self, key: K, value: V) -> Insertion<'_, K, V> {
        let node_ptr = Node::create(key, value);
        self.root = Some(node_ptr);
        self.min = Some(node_ptr);
        self.max = Some(node_ptr);
        self.num_nodes = 1;
        Insertion {
            node: NodeRef::new(node_ptr),
            edges: 1,
            promotions: 0,
        }
    }

    fn insert_below(
        &mut self,
        start_from: NodePtr<K, V>,
        key: K,
        value: V,
        mut edges: usize,
    ) -> Result<Insertion<'_, K, V>> {
        let mut parent_ptr = start_from;
        let dir = loop {
            let dir = match key.cmp(unsafe { &parent_ptr.as_ref().key }) {
                Ordering::Equal => return Err(TreeError::DuplicateKey),
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
            };
            match Node::child(parent_ptr, dir) {
                Some(child_ptr) => {
                    parent_ptr = child_ptr;
                    edges += 1;
                }
                None => break dir,
            }
        };

        let node_ptr = Node::create(key, value);
        Node::attach(parent_ptr, dir, Some(node_ptr));
        self.num_nodes += 1;

        // A new extreme can only hang off the old one.
        if dir == Dir::Right && self.max == Some(parent_ptr) {
            self.max = Some(node_ptr);
        }
        if dir == Dir::Left && self.min == Some(parent_ptr) {
            self.min = Some(node_ptr);
        }

        let promotions = self.rebalance(Some(parent_ptr), Rebalance::Insert);
        Ok(Insertion {
            node: NodeRef::new(node_ptr),
            edges,
            promotions,
        })
    }

    fn unlink_node(&mut self, node_ptr: NodePtr<K, V>) {
        if self.max == Some(node_ptr) {
            self.max = Node::predecessor(node_ptr);
        }
        if self.min == Some(node_ptr) {
            self.min = Node::successor(node_ptr);
        }
        self.num_nodes -= 1;

        let (left, right, parent) = unsafe {
            let node = node_ptr.as_ref();
            (node.left, node.right, node.parent)
        };
        let rebalance_from = match (left, right) {
            (None, None) => {
                self.transplant(node_ptr, None);
                parent
            }
            (Some(child_ptr), None) | (None, Some(child_ptr)) => {
                self.transplant(node_ptr, Some(child_ptr));
                parent
            }
            (Some(left_ptr), Some(right_ptr)) => {
                let mut successor_ptr = Node::extreme(right_ptr, Dir::Left);
                let rebalance_from = if successor_ptr == right_ptr {
                    successor_ptr
                } else {
                    // Unlink the successor from its own parent first
                    let successor_parent = unsafe { successor_ptr.as_ref().parent };
                    let successor_right = Node::child(successor_ptr, Dir::Right);
                    if let Some(successor_parent_ptr) = successor_parent {
                        Node::attach(successor_parent_ptr, Dir::Left, successor_right);
                    }
                    Node::attach(successor_ptr, Dir::Right, Some(right_ptr));
                    successor_parent.unwrap_or(successor_ptr)
                };
                Node::attach(successor_ptr, Dir::Left, Some(left_ptr));
                self.transplant(node_ptr, Some(successor_ptr));

                // The successor takes over the position's old height so that the
                // upward walk sees whether the position shrank.
                unsafe { successor_ptr.as_mut().height = node_ptr.as_ref().height };
                Some(rebalance_from)
            }
        };
        self.rebalance(rebalance_from, Rebalance::Delete);
    }
}

impl<K, V> Drop for AvlTree<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V> Default for AvlTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> IntoIterator for &'a AvlTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
