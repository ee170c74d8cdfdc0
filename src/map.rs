extern crate alloc;

use alloc::boxed::Box;
use core::{borrow::Borrow, fmt, iter::FusedIterator, marker::PhantomPinned, ptr::NonNull};

use cordyceps::Linked;

use crate::{AvlTree, Links, PreconditionViolation, TreeNode};

/// An ordered map based on an [AVL tree] augmented with subtree sizes.
///
/// Besides the usual dictionary operations, the map supports positional access and splitting
/// or joining whole maps in logarithmic time.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlMap<K: Ord, V> {
    tree: AvlTree<MapNode<K, V>>,
}

struct MapNode<K, V> {
    links: Links<MapNode<K, V>>,
    key: K,
    value: V,
    _unpin: PhantomPinned,
}

impl<K, V> MapNode<K, V> {
    fn new(key: K, value: V) -> Box<Self> {
        Box::new(MapNode {
            links: Links::new(),
            key,
            value,
            _unpin: PhantomPinned,
        })
    }

    #[allow(clippy::boxed_local)]
    fn into_entry(self: Box<Self>) -> (K, V) {
        let MapNode { key, value, .. } = *self;
        (key, value)
    }
}

unsafe impl<K, V> Linked<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<MapNode<K, V>>> {
        let ptr = ptr.as_ptr();
        NonNull::new(core::ptr::addr_of_mut!((*ptr).links)).unwrap()
    }
}

impl<K: Ord, V> TreeNode<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

impl<K: Ord, V> AvlMap<K, V> {
    /// Creates a new, empty `AvlMap`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the map contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the map.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the number of elements in the map. This is an alias of [`len`](AvlMap::len).
    pub fn size(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree, or -1 if the map is empty.
    pub fn height(&self) -> i8 {
        self.tree.height()
    }

    /// Returns `true` if the map contains a value associated with `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns a reference to the value associated with `key`, or `None` if there is none.
    #[inline]
    pub fn search<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| &node.get_ref().value)
    }

    /// Returns a mutable reference to the value associated with `key`.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut node = self.tree.get_raw(key)?;

        // SAFETY: `node` belongs to `self.tree`, which is borrowed mutably for the lifetime of the
        // returned reference. The key is not reachable through it.
        Some(unsafe { &mut node.as_mut().value })
    }

    /// Inserts a key-value pair into the map.
    ///
    /// Returns the number of rebalancing acts the insertion required. If `key` is already
    /// present, the map is not modified and the pair is dropped.
    pub fn insert(&mut self, key: K, value: V) -> Result<usize, PreconditionViolation> {
        if self.tree.contains_key(&key) {
            return Err(PreconditionViolation::DuplicateKey);
        }

        Ok(self.tree.insert(MapNode::new(key, value)))
    }

    /// Removes the entry associated with `key` from the map.
    ///
    /// Returns the removed entry together with the number of rebalancing acts the removal
    /// required.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<(K, V, usize), PreconditionViolation>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let (node, acts) = self
            .tree
            .remove(key)
            .ok_or(PreconditionViolation::MissingKey)?;
        let (key, value) = node.into_entry();

        Ok((key, value, acts))
    }

    /// Splits the map around the entry associated with `key`.
    ///
    /// Returns a map of all entries with smaller keys, the entry for `key` itself, and a map of all
    /// entries with greater keys. On success `self` is left empty.
    #[allow(clippy::type_complexity)]
    pub fn split<Q>(&mut self, key: &Q) -> Result<(Self, (K, V), Self), PreconditionViolation>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let (less, node, greater) = self
            .tree
            .split_at(key)
            .ok_or(PreconditionViolation::MissingKey)?;

        Ok((
            AvlMap { tree: less },
            node.into_entry(),
            AvlMap { tree: greater },
        ))
    }

    /// Joins `other` and the separating entry `(key, value)` into this map, consuming `other`.
    ///
    /// `key` must be strictly greater than every key of one map and strictly less than every key
    /// of the other; either map may hold the smaller keys. Returns the cost of the join,
    /// `|h1 - h2| + 1` for trees of heights `h1` and `h2`.
    pub fn join(&mut self, other: Self, key: K, value: V) -> Result<usize, PreconditionViolation> {
        fn below<K: Ord, V>(map: &AvlMap<K, V>, key: &K) -> bool {
            map.last_key_value().map_or(true, |(last, _)| last < key)
        }

        fn above<K: Ord, V>(map: &AvlMap<K, V>, key: &K) -> bool {
            map.first_key_value().map_or(true, |(first, _)| first > key)
        }

        let ordered = (below(self, &key) && above(&other, &key))
            || (below(&other, &key) && above(self, &key));

        if !ordered {
            return Err(PreconditionViolation::UnorderedJoin);
        }

        Ok(self.tree.join(other.tree, MapNode::new(key, value)))
    }

    /// Returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Returns the key-value pair at position `index` in ascending key order.
    #[inline]
    pub fn select(&self, index: usize) -> Option<(&K, &V)> {
        self.tree.select(index).map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Returns the number of keys in the map that are less than `key`.
    #[inline]
    pub fn rank<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.tree.rank(key)
    }

    /// Returns an iterator over the entries of the map in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    /// Returns the entries of the map in ascending key order.
    ///
    /// The sequence is produced lazily and may be requested again at any time.
    pub fn to_ordered_sequence(&self) -> Iter<'_, K, V> {
        self.iter()
    }

    /// Clears the map, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl<K: Ord, V> Default for AvlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for AvlMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for AvlMap<K, V> {
    /// Builds a map from key-value pairs. A repeated key keeps the last value given for it.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AvlMap::new();

        for (key, value) in iter {
            match map.get_mut(&key) {
                Some(slot) => *slot = value,
                None => {
                    map.tree.insert(MapNode::new(key, value));
                }
            }
        }

        map
    }
}

impl<'map, K: Ord, V> IntoIterator for &'map AvlMap<K, V> {
    type Item = (&'map K, &'map V);
    type IntoIter = Iter<'map, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the entries of an [`AvlMap`] in ascending key order.
pub struct Iter<'map, K: Ord, V> {
    inner: crate::Iter<'map, MapNode<K, V>>,
}

impl<'map, K: Ord, V> Iterator for Iter<'map, K, V> {
    type Item = (&'map K, &'map V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| (&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'map, K: Ord, V> ExactSizeIterator for Iter<'map, K, V> {}

impl<'map, K: Ord, V> FusedIterator for Iter<'map, K, V> {}

impl<'map, K: Ord, V> Clone for Iter<'map, K, V> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}
