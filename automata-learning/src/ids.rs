//! Stable handles into the arenas owned by [`crate::dtree::DiscriminationTree`]
//! and [`crate::hypothesis::Hypothesis`].
//!
//! The discrimination tree, the hypothesis states and the transitions
//! between them form a cyclic object graph (DT node -> incoming transitions
//! -> source state -> DT leaf -> ...). Rather than modelling that with
//! reference-counted cycles, every node/state/transition lives in a
//! `Vec` owned by its arena and is referred to everywhere else by one of
//! these plain index newtypes.

use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(usize);

        impl $name {
            pub(crate) fn new(index: usize) -> Self {
                Self(index)
            }

            pub(crate) fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

arena_id!(
    /// Handle to a node (inner or leaf) of the discrimination tree.
    NodeId
);
arena_id!(
    /// Handle to a hypothesis state.
    StateId
);
arena_id!(
    /// Handle to a hypothesis transition (tree or non-tree).
    TransitionId
);
