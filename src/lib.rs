//! An intrusive AVL tree augmented with subtree sizes, supporting logarithmic split and join.
//#![no_std]

// Conventions used in comments:
// - The height of a node `x` is denoted `h(x)`. A missing child has height -1.
// - The size of a node `x` is denoted `s(x)`: the number of nodes in the subtree rooted at `x`. A
//   missing child has size 0.
// - The balance factor of `x` is `bf(x) = h(left(x)) - h(right(x))`.
// - A node is "heavy" on a side if its balance factor leans toward that side.
//
// The invariants of the tree are:
// 1. For every node, `bf(x) ∈ {-1, 0, 1}`.
// 2. `h(x) = 1 + max(h(left(x)), h(right(x)))`.
// 3. `s(x) = 1 + s(left(x)) + s(right(x))`.
// 4. Keys are strictly increasing in order.
// 5. Parent links are the inverse of child links.
//
// Every public operation that mutates the tree counts its "rebalancing acts": a height change
// observed while walking back up the tree counts one act, a single rotation one act and a double
// rotation two acts. Insertion stops walking at the first ancestor whose height is unchanged;
// deletion and join walk all the way to the root.

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem,
    ops::Not, pin::Pin, ptr::NonNull,
};

use cordyceps::Linked;

mod debug;
mod error;
mod iter;
pub mod map;
mod order;
mod split_join;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use error::PreconditionViolation;
pub use iter::Iter;
pub use map::AvlMap;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree whose nodes also record the size of their subtree.
///
/// The tree owns its elements through [`Linked::Handle`]s. Empty child slots are represented by
/// `None` links rather than allocated sentinel nodes; they report a height of -1 and a size of 0.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
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

/// Selects how a node with a balance factor of ±2 is repaired.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Repair {
    // A single rotation is used only when the heavy child leans the same way as its parent.
    Insert,
    // A single rotation is also used when the heavy child is perfectly balanced.
    Remove,
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: i8,
    size: usize,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

#[inline]
unsafe fn links<'a, T>(node: NonNull<T>) -> &'a Links<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe { T::links(node).as_ref() }
}

#[inline]
unsafe fn links_mut<'a, T>(node: NonNull<T>) -> &'a mut Links<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe { T::links(node).as_mut() }
}

#[inline]
unsafe fn key<'a, T>(node: NonNull<T>) -> &'a T::Key
where
    T: TreeNode<Links<T>> + ?Sized + 'a,
{
    unsafe { node.as_ref().key() }
}

/// Returns the height of the pointed-to node, or -1 for an empty slot.
#[inline]
unsafe fn height<T>(node: Link<T>) -> i8
where
    T: TreeNode<Links<T>> + ?Sized,
{
    node.map(|n| unsafe { links(n).height() }).unwrap_or(-1)
}

/// Returns the subtree size of the pointed-to node, or 0 for an empty slot.
#[inline]
unsafe fn size<T>(node: Link<T>) -> usize
where
    T: TreeNode<Links<T>> + ?Sized,
{
    node.map(|n| unsafe { links(n).size() }).unwrap_or(0)
}

#[inline]
unsafe fn balance_factor<T>(node: NonNull<T>) -> i8
where
    T: TreeNode<Links<T>> + ?Sized,
{
    unsafe {
        let links = links(node);
        height(links.left()) - height(links.right())
    }
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of elements in the tree.
    ///
    /// This reads the size recorded at the root and completes in _O(1)_ time.
    pub fn len(&self) -> usize {
        unsafe { size(self.root) }
    }

    /// Returns the height of the tree, or -1 if the tree is empty.
    pub fn height(&self) -> i8 {
        unsafe { height(self.root) }
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Some(root) = self.root {
            unsafe {
                assert_eq!(links(root).parent(), None, "root must not have a parent");
                self.assert_invariants_at(root);
            }
        }

        let mut prev: Option<&T::Key> = None;
        for item in self.iter() {
            if let Some(prev) = prev {
                assert!(prev < item.key(), "keys must be strictly increasing");
            }
            prev = Some(item.key());
        }
    }

    // Checks the subtree rooted at `node`, returning its height and size.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(&self, node: NonNull<T>) -> (i8, usize) {
        unsafe {
            let mut child_heights = [-1; 2];
            let mut child_sizes = [0; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = links(node).child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = links(child)
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    let expected = match dir {
                        Dir::Left => Ordering::Less,
                        Dir::Right => Ordering::Greater,
                    };
                    assert_eq!(key(child).cmp(key(node)), expected);

                    let (h, s) = self.assert_invariants_at(child);
                    child_heights[dir as usize] = h;
                    child_sizes[dir as usize] = s;
                }
            }

            let height = links(node).height();
            let size = links(node).size();

            assert_eq!(height, 1 + child_heights[0].max(child_heights[1]));
            assert_eq!(size, 1 + child_sizes[0] + child_sizes[1]);

            let bf = child_heights[0] - child_heights[1];
            assert!((-1..=1).contains(&bf), "balance factor {bf} out of range");

            (height, size)
        }
    }

    /// Returns a reference to the node corresponding to `key`.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns `true` if the tree contains a node corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = links(cur).left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = links(cur).right(),
                }
            }
        }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { links_mut(node).set_parent(parent) };
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`, or the
    // root if `parent` is `None`.
    //
    // `new_child`'s parent pointer is not updated.
    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe {
                let dir = self.which_child(parent, old_child);
                links_mut(parent).set_child(dir, new_child);
            },
            None => self.root = new_child,
        }
    }

    // Performs a rotation at `pivot`, moving it down toward `dir`. The child of `pivot` on the
    // opposite side takes its place and is returned.
    //
    // The heights and sizes of `pivot` and the returned node are recomputed, in that order.
    unsafe fn rotate(&mut self, pivot: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let up = links(pivot)
                .child(!dir)
                .expect("rotation requires a child on the rising side");

            // `across` moves from the `dir` child of `up` to the `!dir` child of `pivot`.
            let across = links(up).child(dir);
            links_mut(pivot).set_child(!dir, across);
            self.maybe_set_parent(across, Some(pivot));

            let parent = links_mut(pivot).set_parent(Some(up));
            links_mut(up).set_child(dir, Some(pivot));
            links_mut(up).set_parent(parent);
            self.replace_child_or_set_root(parent, pivot, Some(up));

            self.fix_height(pivot);
            self.fix_size(pivot);
            self.fix_height(up);
            self.fix_size(up);

            up
        }
    }

    // Restores the AVL property at `node`, whose balance factor is `bf` (either 2 or -2).
    //
    // Returns the number of rebalancing acts performed.
    unsafe fn rebalance_at(&mut self, node: NonNull<T>, bf: i8, repair: Repair) -> usize {
        debug_assert_eq!(bf.abs(), 2);

        unsafe {
            let heavy_dir = if bf > 0 { Dir::Left } else { Dir::Right };
            let heavy = links(node)
                .child(heavy_dir)
                .expect("heavy side must not be empty");

            // Positive if `heavy` leans the same way as `node`.
            let lean = match heavy_dir {
                Dir::Left => balance_factor(heavy),
                Dir::Right => -balance_factor(heavy),
            };

            let single = match repair {
                Repair::Insert => lean == 1,
                Repair::Remove => lean >= 0,
            };

            if single {
                self.rotate(node, !heavy_dir);
                1
            } else {
                self.rotate(heavy, heavy_dir);
                self.rotate(node, !heavy_dir);
                2
            }
        }
    }

    /// Inserts an item into the tree, returning the number of rebalancing acts performed.
    ///
    /// The key of `item` must not already be present in the tree. This is checked in debug
    /// builds only.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> usize {
        let ptr = T::into_ptr(item);

        unsafe {
            links_mut(ptr).reset();
            self.insert_raw(ptr)
        }
    }

    // Links a detached node with fresh links into the tree.
    unsafe fn insert_raw(&mut self, ptr: NonNull<T>) -> usize {
        let Some(root) = self.root else {
            // Tree is empty. Set `ptr` as the root and return.
            self.root = Some(ptr);
            return 0;
        };

        let mut cur = root;

        // Descend the tree, looking for a free slot. Every node on the way gains a descendant.
        let parent = loop {
            let ordering = unsafe { key(ptr).cmp(key(cur)) };
            debug_assert_ne!(ordering, Ordering::Equal, "key is already present in the tree");

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal | Ordering::Greater => Dir::Right,
            };

            unsafe {
                let cur_links = links_mut(cur);
                cur_links.set_size(cur_links.size() + 1);

                match cur_links.child(dir) {
                    // Descend.
                    Some(child) => cur = child,

                    // Set `ptr` as child.
                    None => {
                        cur_links.set_child(dir, Some(ptr));
                        links_mut(ptr).set_parent(Some(cur));
                        break cur;
                    }
                }
            }
        };

        unsafe { self.rebalance_inserted(parent) }
    }

    // Performs a bottom-up rebalance of the tree after a leaf was attached below `node`.
    //
    // The walk stops as soon as an ancestor's height is unchanged, or after the first rotation:
    // either restores the ancestor's height to what it was before the insertion.
    unsafe fn rebalance_inserted(&mut self, node: NonNull<T>) -> usize {
        let mut acts = 0;
        let mut cur = node;

        loop {
            unsafe {
                let bf = balance_factor(cur);

                if bf.abs() == 2 {
                    return acts + self.rebalance_at(cur, bf, Repair::Insert);
                }

                if !self.fix_height(cur) {
                    return acts;
                }

                acts += 1;

                match links(cur).parent() {
                    Some(parent) => cur = parent,
                    None => return acts,
                }
            }
        }
    }

    // Recomputes heights and sizes from `node` up to the root, rotating wherever a balance factor
    // of ±2 is found.
    //
    // Unlike insertion, this never stops early: removing a node or splicing in a subtree can
    // require a rotation at every level.
    unsafe fn rebalance_to_root(&mut self, node: NonNull<T>) -> usize {
        let mut acts = 0;
        let mut opt_cur = Some(node);

        while let Some(cur) = opt_cur {
            unsafe {
                let bf = balance_factor(cur);

                self.fix_size(cur);
                let height_changed = self.fix_height(cur);

                if bf.abs() == 2 {
                    acts += self.rebalance_at(cur, bf, Repair::Remove);
                } else if height_changed {
                    acts += 1;
                }

                // After a rotation this is the node which took `cur`'s place; its fields are
                // already up to date.
                opt_cur = links(cur).parent();
            }
        }

        acts
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { links(cur).left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    // Returns the maximum node in the subtree.
    #[inline]
    unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        let mut cur = root;

        while let Some(right) = unsafe { links(cur).right() } {
            cur = right;
        }

        cur
    }

    /// Removes the item corresponding to `key` from the tree.
    ///
    /// Returns the removed item and the number of rebalancing acts performed, or `None` if the key
    /// is not present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(T::Handle, usize)>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;

        // SAFETY: `node` was just found in `self`.
        Some(unsafe { self.delete(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// Returns the removed item and the number of rebalancing acts performed.
    ///
    /// This operation completes in _O(log(n))_ time.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn delete(&mut self, node: NonNull<T>) -> (T::Handle, usize) {
        // There are three possible cases:
        //
        // 1. `node` has two children.
        //
        //    In this case `node`'s successor[^1] is removed from the tree and assumes `node`'s
        //    place and children. The successor's right child is elevated to replace it. Heights
        //    and sizes are stale from the successor's former parent upward.
        //
        // 2. `node` has one child.
        //
        //    The child is elevated to replace `node`.
        //
        // 3. `node` is a leaf.
        //
        //    The parent's slot is emptied.
        //
        // In cases 2 and 3 heights and sizes are stale from `node`'s parent upward.
        //
        // [^1]: The successor of a node `a` is the least node in `a`'s right subtree.

        unsafe {
            let parent = links(node).parent();
            let left = links(node).left();
            let right = links(node).right();

            let resume = match (left, right) {
                (Some(left), Some(right)) => {
                    let (successor, successor_parent) = self.min_in_subtree(right);

                    if let Some(successor_parent) = successor_parent {
                        // Elevate the successor's right child to replace it.
                        let successor_right = links(successor).right();
                        links_mut(successor_parent).set_left(successor_right);
                        self.maybe_set_parent(successor_right, Some(successor_parent));

                        links_mut(successor).set_right(Some(right));
                        links_mut(right).set_parent(Some(successor));
                    }
                    // Otherwise the successor is `right` and keeps its own right subtree.

                    links_mut(successor).set_left(Some(left));
                    links_mut(left).set_parent(Some(successor));

                    links_mut(successor).set_parent(parent);
                    self.replace_child_or_set_root(parent, node, Some(successor));

                    tracing::trace!(case = "two children", "removing node");

                    Some(successor_parent.unwrap_or(successor))
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace_child_or_set_root(parent, node, Some(child));
                    links_mut(child).set_parent(parent);

                    tracing::trace!(case = "one child", "removing node");

                    parent
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);

                    tracing::trace!(case = "leaf", "removing node");

                    parent
                }
            };

            let acts = match resume {
                Some(resume) => self.rebalance_to_root(resume),
                None => 0,
            };

            links_mut(node).reset();

            (T::from_ptr(node), acts)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| links(cur).parent());

                let right = links(cur).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                links_mut(cur).reset();
                drop(T::from_ptr(cur));

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
    }

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    // Support methods ========================================================

    // Recomputes the height of `node` from its children, returning `true` if it changed.
    #[inline]
    unsafe fn fix_height(&mut self, node: NonNull<T>) -> bool {
        unsafe {
            let links = links_mut(node);
            let new = height(links.left())
                .max(height(links.right()))
                .checked_add(1)
                .expect("height overflow");

            mem::replace(&mut links.inner.get_mut().height, new) != new
        }
    }

    #[inline]
    unsafe fn fix_size(&mut self, node: NonNull<T>) {
        unsafe {
            let links = links_mut(node);
            let new = size(links.left()) + size(links.right()) + 1;
            links.set_size(new);
        }
    }

    #[inline]
    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { links(parent).left() } == Some(child) {
            Dir::Left
        } else {
            debug_assert_eq!(
                unsafe { links(parent).right() },
                Some(child),
                "`child` must be a child of `parent`"
            );
            Dir::Right
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        AvlTree::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<'tree, T> IntoIterator for &'tree AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 0,
                size: 1,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns the height of the subtree rooted at this node.
    #[inline]
    pub fn height(&self) -> i8 {
        unsafe { (*self.inner.get()).height }
    }

    /// Returns the number of nodes in the subtree rooted at this node.
    #[inline]
    pub fn size(&self) -> usize {
        unsafe { (*self.inner.get()).size }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_size(&mut self, size: usize) {
        self.inner.get_mut().size = size;
    }

    // Detaches the node: no parent, no children, height 0 and size 1.
    #[inline]
    fn reset(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.height = 0;
        inner.size = 1;
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .field("size", &self.size())
            .finish()
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}
