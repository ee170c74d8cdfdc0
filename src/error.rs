use thiserror::Error;

/// A violated precondition of an [`AvlMap`](crate::AvlMap) operation.
///
/// A lookup that finds nothing is not an error; these are reported only for mutations whose
/// contract the arguments do not satisfy. The map is left unchanged whenever one is returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionViolation {
    #[error("key is already present in the tree")]
    DuplicateKey,
    #[error("key is not present in the tree")]
    MissingKey,
    #[error("separator key does not lie strictly between the keys of the joined trees")]
    UnorderedJoin,
}
