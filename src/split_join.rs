use core::{borrow::Borrow, ptr::NonNull};

use crate::{height, key, links, links_mut, AvlTree, Dir, Link, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Joins `other` and `separator` into this tree, consuming `other`.
    ///
    /// The key of `separator` must be strictly greater than every key of one tree and strictly
    /// less than every key of the other. Either tree may hold the smaller keys.
    ///
    /// Returns the cost of the join, `|h1 - h2| + 1` where `h1` and `h2` are the heights of the
    /// two trees (-1 for an empty tree).
    ///
    /// Both heights are taken before the separator is linked in, including when one tree is
    /// empty. Joining a tree of height 2 with an empty tree therefore costs 4, not one more than
    /// the height of the tree that results once the separator has been inserted.
    ///
    /// This operation completes in _O(|h1 - h2| + 1)_ time, plus _O(log(n))_ to restore the
    /// augmented fields above the splice point.
    pub fn join(&mut self, mut other: AvlTree<T>, separator: T::Handle) -> usize {
        let sep = T::into_ptr(separator);

        unsafe {
            links_mut(sep).reset();
            self.join_raw(other.root.take(), sep)
        }
    }

    // Joins the subtree rooted at the detached node `other` into `self`, using the detached node
    // `sep` (with fresh links) as the separator.
    unsafe fn join_raw(&mut self, other: Link<T>, sep: NonNull<T>) -> usize {
        let (h1, h2) = unsafe { (height(self.root), height(other)) };
        let cost = usize::from(h1.abs_diff(h2)) + 1;

        tracing::trace!(h1, h2, cost, "joining trees");

        unsafe {
            match (self.root, other) {
                (_, None) => {
                    self.insert_raw(sep);
                }

                (None, Some(other)) => {
                    self.root = Some(other);
                    self.insert_raw(sep);
                }

                // A single node is cheaper to insert than to splice.
                (Some(leaf), Some(other)) if links(leaf).size() == 1 => {
                    self.root = Some(other);
                    self.insert_raw(sep);
                    self.insert_raw(leaf);
                }

                (Some(_), Some(leaf)) if links(leaf).size() == 1 => {
                    self.insert_raw(sep);
                    self.insert_raw(leaf);
                }

                (Some(root), Some(other)) => self.join_spliced(root, other, sep),
            }
        }

        cost
    }

    // Joins two trees of at least two nodes each.
    unsafe fn join_spliced(&mut self, a: NonNull<T>, b: NonNull<T>, sep: NonNull<T>) {
        unsafe {
            let (low, high) = if key(a) < key(b) { (a, b) } else { (b, a) };
            debug_assert!(key(self.max_in_subtree(low)) < key(sep));
            debug_assert!(key(sep) < key(self.min_in_subtree(high).0));

            // Descend the taller tree along the side facing the shorter one.
            let (tall, short, dir) = if links(low).height() <= links(high).height() {
                (high, low, Dir::Left)
            } else {
                (low, high, Dir::Right)
            };

            let short_height = links(short).height();
            let mut cur = tall;

            while links(cur).height() > short_height {
                cur = links(cur)
                    .child(dir)
                    .expect("taller subtree must continue along the spine");
            }

            let parent = links(cur).parent();

            // `sep` takes `cur`'s place, holding `short` on the near side and `cur` on the far
            // side.
            links_mut(sep).set_child(dir, Some(short));
            links_mut(short).set_parent(Some(sep));
            links_mut(sep).set_child(!dir, Some(cur));
            links_mut(cur).set_parent(Some(sep));
            links_mut(sep).set_parent(parent);

            match parent {
                Some(parent) => {
                    links_mut(parent).set_child(dir, Some(sep));
                    self.root = Some(tall);
                }
                None => self.root = Some(sep),
            }

            self.rebalance_to_root(sep);
        }
    }

    /// Splits the tree around `node`.
    ///
    /// Returns a tree holding every element less than `node`, the detached `node` itself, and a
    /// tree holding every element greater than `node`. `self` is left empty.
    ///
    /// The nodes on the path from `node` to the root are reused as join separators; no element is
    /// reallocated. This operation completes in _O(log(n))_ time.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn split(&mut self, node: NonNull<T>) -> (AvlTree<T>, T::Handle, AvlTree<T>) {
        let mut less = AvlTree::new();
        let mut greater = AvlTree::new();

        unsafe {
            let left = links(node).left();
            let right = links(node).right();
            self.maybe_set_parent(left, None);
            self.maybe_set_parent(right, None);
            less.root = left;
            greater.root = right;

            let mut joins = 0;
            let mut opt_ancestor = links(node).parent();

            while let Some(ancestor) = opt_ancestor {
                opt_ancestor = links(ancestor).parent();

                // The subtree hanging off the side of `ancestor` away from `node` belongs with
                // `ancestor` on the same side of the split.
                let (acc, dir) = if key(ancestor) < key(node) {
                    (&mut less, Dir::Left)
                } else {
                    (&mut greater, Dir::Right)
                };

                let subtree = links(ancestor).child(dir);
                self.maybe_set_parent(subtree, None);
                links_mut(ancestor).reset();

                acc.join_raw(subtree, ancestor);
                joins += 1;
            }

            self.root = None;
            links_mut(node).reset();

            tracing::trace!(
                joins,
                less = less.len(),
                greater = greater.len(),
                "split tree"
            );

            (less, T::from_ptr(node), greater)
        }
    }

    /// Splits the tree around the element corresponding to `key`.
    ///
    /// Returns `None`, leaving the tree untouched, if `key` is not present. See [`split`].
    ///
    /// [`split`]: AvlTree::split
    #[allow(clippy::type_complexity)]
    pub fn split_at<Q>(&mut self, key: &Q) -> Option<(AvlTree<T>, T::Handle, AvlTree<T>)>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;

        // SAFETY: `node` was just found in `self`.
        Some(unsafe { self.split(node) })
    }
}
