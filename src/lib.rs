//! An ordered map implemented with an AVL tree, supporting finger search,
//! finger insertion, split and join.
//!
//! ```
//! use avl_finger::AvlTree;
//!
//! let mut tree = AvlTree::new();
//! for key in 1..=7 {
//!     tree.insert(key, key * 10).unwrap();
//! }
//! assert_eq!(tree.height(), 2);
//!
//! let (node, edges) = tree.search(&5);
//! assert_eq!(node.map(|node| *node.value()), Some(50));
//! assert_eq!(edges, 3);
//!
//! let split = tree.split(&4).unwrap();
//! assert_eq!((split.key, split.value), (4, 40));
//! assert_eq!(split.smaller.len(), 3);
//! assert_eq!(split.bigger.len(), 3);
//!
//! let mut joined = split.smaller;
//! let mut bigger = split.bigger;
//! joined.join(&mut bigger, 4, 40).unwrap();
//! assert_eq!(joined.len(), 7);
//! assert!(bigger.is_empty());
//! ```

mod error;
mod iter;
mod join;
mod node;
mod tree;

pub use error::{Result, TreeError};
pub use iter::Iter;
pub use join::Split;
pub use node::NodeRef;
pub use tree::{AvlTree, Insertion};
