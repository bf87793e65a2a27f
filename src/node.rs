use std::cmp;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Not;
use std::ptr::NonNull;

/// Height of the sentinel, so that a leaf has height 0.
pub(crate) const SENTINEL_HEIGHT: isize = -1;

pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) left: Link<K, V>,
    pub(crate) right: Link<K, V>,
    pub(crate) parent: Link<K, V>,
    pub(crate) height: isize,
}

pub(crate) type NodePtr<K, V> = NonNull<Node<K, V>>;

/// A child or parent relation. `None` is the sentinel: every leaf edge and the
/// parent slot of the root hold it, and it carries no tree identity, so whole
/// subtrees can be relinked into another tree as they are.
pub(crate) type Link<K, V> = Option<NodePtr<K, V>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left,
    Right,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

impl<K, V> Node<K, V> {
    /// Allocates a detached leaf.
    pub(crate) fn create(key: K, value: V) -> NodePtr<K, V> {
        let boxed = Box::new(Node {
            key,
            value,
            left: None,
            right: None,
            parent: None,
            height: 0,
        });
        unsafe { NodePtr::new_unchecked(Box::into_raw(boxed)) }
    }

    /// Frees a node that is no longer linked from any tree.
    pub(crate) unsafe fn destroy(node_ptr: NodePtr<K, V>) -> (K, V) {
        let node = Box::from_raw(node_ptr.as_ptr());
        (node.key, node.value)
    }

    /// Turns a linked node back into a detached leaf, keeping its entry.
    pub(crate) fn reset(mut node_ptr: NodePtr<K, V>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.left = None;
            node.right = None;
            node.parent = None;
            node.height = 0;
        }
    }

    pub(crate) fn height_of(link: Link<K, V>) -> isize {
        match link {
            None => SENTINEL_HEIGHT,
            Some(node_ptr) => unsafe { node_ptr.as_ref().height },
        }
    }

    pub(crate) fn child(node_ptr: NodePtr<K, V>, dir: Dir) -> Link<K, V> {
        unsafe {
            match dir {
                Dir::Left => node_ptr.as_ref().left,
                Dir::Right => node_ptr.as_ref().right,
            }
        }
    }

    /// Links `child` below `node_ptr` on the `dir` side, including the back link.
    pub(crate) fn attach(mut node_ptr: NodePtr<K, V>, dir: Dir, child: Link<K, V>) {
        unsafe {
            match dir {
                Dir::Left => node_ptr.as_mut().left = child,
                Dir::Right => node_ptr.as_mut().right = child,
            }
            if let Some(mut child_ptr) = child {
                child_ptr.as_mut().parent = Some(node_ptr);
            }
        }
    }

    pub(crate) fn update_height(mut node_ptr: NodePtr<K, V>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.height = 1 + cmp::max(Self::height_of(node.left), Self::height_of(node.right));
        }
    }

    pub(crate) fn balance_factor(node_ptr: NodePtr<K, V>) -> isize {
        unsafe {
            let node = node_ptr.as_ref();
            Self::height_of(node.left) - Self::height_of(node.right)
        }
    }

    /// Returns the last node reached by following `dir` children from `node_ptr`:
    /// the subtree minimum for `Dir::Left`, the maximum for `Dir::Right`.
    pub(crate) fn extreme(mut node_ptr: NodePtr<K, V>, dir: Dir) -> NodePtr<K, V> {
        while let Some(child_ptr) = Self::child(node_ptr, dir) {
            node_ptr = child_ptr;
        }
        node_ptr
    }

    /// In-order neighbor on the `dir` side: the successor for `Dir::Right`,
    /// the predecessor for `Dir::Left`.
    pub(crate) fn neighbor(node_ptr: NodePtr<K, V>, dir: Dir) -> Link<K, V> {
        if let Some(child_ptr) = Self::child(node_ptr, dir) {
            return Some(Self::extreme(child_ptr, !dir));
        }
        let mut current = node_ptr;
        while let Some(parent_ptr) = unsafe { current.as_ref().parent } {
            if Self::child(parent_ptr, !dir) == Some(current) {
                return Some(parent_ptr);
            }
            current = parent_ptr;
        }
        None
    }

    pub(crate) fn successor(node_ptr: NodePtr<K, V>) -> Link<K, V> {
        Self::neighbor(node_ptr, Dir::Right)
    }

    pub(crate) fn predecessor(node_ptr: NodePtr<K, V>) -> Link<K, V> {
        Self::neighbor(node_ptr, Dir::Left)
    }
}

/// A read-only view of a node inside an [`AvlTree`](crate::AvlTree).
///
/// The view borrows the tree, so the node it points to cannot be moved or
/// freed while it is alive. Two views compare equal when they refer to the
/// same node.
pub struct NodeRef<'a, K, V> {
    node_ptr: NodePtr<K, V>,
    marker: PhantomData<&'a Node<K, V>>,
}

impl<'a, K, V> NodeRef<'a, K, V> {
    pub(crate) fn new(node_ptr: NodePtr<K, V>) -> Self {
        Self {
            node_ptr,
            marker: PhantomData,
        }
    }

    fn node(&self) -> &'a Node<K, V> {
        unsafe { &*self.node_ptr.as_ptr() }
    }

    pub fn key(&self) -> &'a K {
        &self.node().key
    }

    pub fn value(&self) -> &'a V {
        &self.node().value
    }

    /// Height of the subtree rooted at this node; a leaf has height 0.
    pub fn height(&self) -> isize {
        self.node().height
    }

    /// Left subtree height minus right subtree height.
    pub fn balance_factor(&self) -> isize {
        Node::balance_factor(self.node_ptr)
    }

    pub fn left(&self) -> Option<NodeRef<'a, K, V>> {
        self.node().left.map(NodeRef::new)
    }

    pub fn right(&self) -> Option<NodeRef<'a, K, V>> {
        self.node().right.map(NodeRef::new)
    }

    /// Returns `None` for the root.
    pub fn parent(&self) -> Option<NodeRef<'a, K, V>> {
        self.node().parent.map(NodeRef::new)
    }

    pub fn is_leaf(&self) -> bool {
        self.node().left.is_none() && self.node().right.is_none()
    }
}

impl<K, V> Clone for NodeRef<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for NodeRef<'_, K, V> {}

impl<K, V> PartialEq for NodeRef<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.node_ptr == other.node_ptr
    }
}

impl<K, V> Eq for NodeRef<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for NodeRef<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("key", self.key())
            .field("value", self.value())
            .field("height", &self.height())
            .finish()
    }
}
