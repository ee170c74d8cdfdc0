use core::{borrow::Borrow, cmp::Ordering, pin::Pin};

use crate::{links, size, AvlTree, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let (first, _) = self.min_in_subtree(root);
            Some(Pin::new_unchecked(first.as_ref()))
        }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let last = self.max_in_subtree(root);
            Some(Pin::new_unchecked(last.as_ref()))
        }
    }

    /// Returns the element at position `index` in ascending key order, counting from zero.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn select(&self, index: usize) -> Option<Pin<&T>> {
        if index >= self.len() {
            return None;
        }

        let mut remaining = index;
        let mut cur = self.root?;

        loop {
            unsafe {
                let left = links(cur).left();
                let left_size = size(left);

                match remaining.cmp(&left_size) {
                    Ordering::Less => cur = left?,
                    Ordering::Equal => return Some(Pin::new_unchecked(cur.as_ref())),
                    Ordering::Greater => {
                        remaining -= left_size + 1;
                        cur = links(cur).right()?;
                    }
                }
            }
        }
    }

    /// Returns the number of elements whose key is less than `key`.
    ///
    /// `key` need not be present in the tree. This operation completes in _O(log(n))_ time.
    pub fn rank<Q>(&self, key: &Q) -> usize
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut rank = 0;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                let left = links(cur).left();

                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = left,
                    Ordering::Equal => return rank + size(left),
                    Ordering::Greater => {
                        rank += size(left) + 1;
                        opt_cur = links(cur).right();
                    }
                }
            }
        }

        rank
    }
}
