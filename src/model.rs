extern crate std;

use std::{collections::BTreeMap, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlMap, Links, PreconditionViolation, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Search(ItemValue),
    Delete(ItemValue),
    First,
    Last,
    Select(usize),
    Rank(ItemValue),
    SplitRejoin(ItemValue),
    SplitKeepLess(ItemValue),
    JoinAbove(u8),
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len().max(1)]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Search(item) => FinalOp::Search(get_value(sorted, item)),
            Op::Delete(item) => FinalOp::Delete(get_value(sorted, item)),
            Op::First => FinalOp::First,
            Op::Last => FinalOp::Last,
            Op::Select(index) => FinalOp::Select(index % (sorted.len() + 1)),
            Op::Rank(item) => FinalOp::Rank(get_value(sorted, item)),
            Op::SplitRejoin(item) => FinalOp::SplitRejoin(get_value(sorted, item)),
            Op::SplitKeepLess(item) => FinalOp::SplitKeepLess(get_value(sorted, item)),
            Op::JoinAbove(count) => FinalOp::JoinAbove(count % 64),
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Search(u32),
    Delete(u32),
    First,
    Last,
    Select(usize),
    Rank(u32),
    SplitRejoin(u32),
    SplitKeepLess(u32),
    JoinAbove(u8),
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        8 => value_strategy().prop_map(Op::Insert),
        2 => value_strategy().prop_map(Op::Search),
        4 => value_strategy().prop_map(Op::Delete),
        1 => Just(Op::First),
        1 => Just(Op::Last),
        2 => (0usize..1000).prop_map(Op::Select),
        2 => value_strategy().prop_map(Op::Rank),
        2 => value_strategy().prop_map(Op::SplitRejoin),
        1 => value_strategy().prop_map(Op::SplitKeepLess),
        1 => (0u8..64).prop_map(Op::JoinAbove),
    ]
}

// Values are derived from keys so that misrouted payloads are detected.
fn value_for(key: u32) -> u64 {
    u64::from(key) ^ 0xA5A5_0000
}

fn assert_same(btree: &BTreeMap<u32, u64>, avl: &AvlMap<u32, u64>) {
    avl.assert_invariants();
    assert_eq!(btree.len(), avl.len());
    assert!(btree
        .iter()
        .zip(avl.iter())
        .all(|(a, b)| (a.0, a.1) == (b.0, b.1)));
}

pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut sorted_values = Vec::with_capacity(ops.len());
    let mut btree: BTreeMap<u32, u64> = BTreeMap::new();
    let mut avl: AvlMap<u32, u64> = AvlMap::new();

    fn insert_sorted(v: &mut Vec<u32>, value: u32) {
        if let Err(idx) = v.binary_search(&value) {
            v.insert(idx, value);
        }
    }

    fn remove_sorted(v: &mut Vec<u32>, value: u32) {
        if let Ok(idx) = v.binary_search(&value) {
            v.remove(idx);
        }
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(key) => {
                let from_btree = if btree.contains_key(&key) {
                    Err(PreconditionViolation::DuplicateKey)
                } else {
                    btree.insert(key, value_for(key));
                    insert_sorted(&mut sorted_values, key);
                    Ok(())
                };
                let from_avl = avl.insert(key, value_for(key)).map(|_| ());

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Search(key) => {
                let from_btree = btree.get(&key);
                let from_avl = avl.search(&key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Delete(key) => {
                remove_sorted(&mut sorted_values, key);

                let from_btree = btree
                    .remove(&key)
                    .map(|value| (key, value))
                    .ok_or(PreconditionViolation::MissingKey);
                let from_avl = avl.delete(&key).map(|(k, v, _)| (k, v));

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                let from_btree = btree.first_key_value();
                let from_avl = avl.first_key_value();

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                let from_btree = btree.last_key_value();
                let from_avl = avl.last_key_value();

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Select(index) => {
                let from_btree = btree.iter().nth(index);
                let from_avl = avl.select(index);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Rank(key) => {
                let from_btree = btree.range(..key).count();
                let from_avl = avl.rank(&key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::SplitRejoin(key) => match avl.split(&key) {
                Ok((mut less, (k, v), greater)) => {
                    assert!(avl.is_empty(), "FinalOp #{op_id}: {final_op:?}");
                    assert_eq!((k, Some(&v)), (key, btree.get(&key)));

                    less.assert_invariants();
                    greater.assert_invariants();
                    assert!(btree.range(..key).eq(less.iter()));
                    assert!(btree.range(key + 1..).eq(greater.iter()));

                    less.join(greater, k, v)
                        .unwrap_or_else(|e| panic!("FinalOp #{op_id}: {final_op:?}: {e}"));
                    avl = less;
                }
                Err(e) => {
                    assert_eq!(e, PreconditionViolation::MissingKey);
                    assert!(!btree.contains_key(&key), "FinalOp #{op_id}: {final_op:?}");
                }
            },

            FinalOp::SplitKeepLess(key) => match avl.split(&key) {
                Ok((less, _, _greater)) => {
                    let _ = btree.split_off(&key);
                    sorted_values.retain(|&v| v < key);
                    avl = less;
                }
                Err(e) => {
                    assert_eq!(e, PreconditionViolation::MissingKey);
                    assert!(!btree.contains_key(&key), "FinalOp #{op_id}: {final_op:?}");
                }
            },

            FinalOp::JoinAbove(count) => {
                let separator = btree.last_key_value().map_or(0, |(&k, _)| k + 1);
                let above: AvlMap<u32, u64> = (1..=u32::from(count))
                    .map(|offset| separator + offset)
                    .map(|key| (key, value_for(key)))
                    .collect();

                let expected_cost =
                    usize::from(avl.height().abs_diff(above.height())) + 1;

                for key in separator..=separator + u32::from(count) {
                    btree.insert(key, value_for(key));
                    insert_sorted(&mut sorted_values, key);
                }

                let cost = avl
                    .join(above, separator, value_for(separator))
                    .unwrap_or_else(|e| panic!("FinalOp #{op_id}: {final_op:?}: {e}"));
                assert_eq!(cost, expected_cost, "FinalOp #{op_id}: {final_op:?}");
            }
        }

        assert_same(&btree, &avl);
    }
}
