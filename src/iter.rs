extern crate alloc;

use alloc::vec::Vec;
use core::{iter::FusedIterator, marker::PhantomData, ptr::NonNull};

use crate::{links, AvlTree, Link, Links, TreeNode};

/// An iterator over the elements of an [`AvlTree`] in ascending key order.
///
/// The iterator keeps an explicit stack of the ancestors whose elements have not been yielded
/// yet, so it uses _O(height)_ auxiliary space and never recurses.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    stack: Vec<NonNull<T>>,
    len: usize,
    _tree: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        let capacity = usize::try_from(tree.height() + 1).unwrap_or(0);

        let mut iter = Iter {
            stack: Vec::with_capacity(capacity),
            len: tree.len(),
            _tree: PhantomData,
        };

        iter.push_left_spine(tree.root);
        iter
    }

    // Pushes `opt_cur` and all of its left descendants. The top of the stack is then the minimum
    // of the subtree.
    fn push_left_spine(&mut self, mut opt_cur: Link<T>) {
        while let Some(cur) = opt_cur {
            self.stack.push(cur);
            opt_cur = unsafe { links(cur).left() };
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.stack.pop()?;

        // Everything left of `cur` has been yielded; its right subtree comes next.
        self.push_left_spine(unsafe { links(cur).right() });
        self.len -= 1;

        Some(unsafe { cur.as_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'tree, T> {}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'tree, T> {}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Clone for Iter<'tree, T> {
    fn clone(&self) -> Self {
        Iter {
            stack: self.stack.clone(),
            len: self.len,
            _tree: PhantomData,
        }
    }
}
