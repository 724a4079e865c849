// Typed handles into the grammar arena.
//
// Nodes, constraints, rule sets and stem lists are allocated once while a
// grammar is built and referenced everywhere else by index.

macro_rules! arena_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub(crate) fn from_usize(i: usize) -> Self {
                Self(i as u32)
            }
        }
    };
}

arena_index! {
    /// Handle of a graph node.
    NodeIndex
}

arena_index! {
    /// Handle of a constraint.
    ConstraintIndex
}

arena_index! {
    /// Handle of an allomorph-generation rule set.
    RuleIndex
}

arena_index! {
    /// Handle of a stem store.
    StemListIndex
}
