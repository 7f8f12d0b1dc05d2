//! Self-checks for the link bookkeeping.
//!
//! [`LinkSet`](crate::link::LinkSet) implements [`DebugInvariants`] to confirm
//! that consolidation left every row in exactly one link. The matcher runs
//! the check after each consolidation. It costs a full pass over the set, so
//! release builds skip it unless the `strict-invariants` feature is on.

use crate::match_error::MatchError;

/// Validate a value and panic, naming its type, when checks are compiled in.
#[macro_export]
macro_rules! debug_invariants {
    ($value:expr) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants"))]
        if let Err(e) = $crate::DebugInvariants::validate_invariants($value) {
            panic!("[invariants] {}: {}", ::std::any::type_name_of_val($value), e);
        }
    };
}

pub trait DebugInvariants {
    /// The first broken invariant, if any.
    fn validate_invariants(&self) -> Result<(), MatchError>;

    /// Panic on a broken invariant in debug builds or with `strict-invariants`.
    fn debug_assert_invariants(&self) {
        debug_invariants!(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl DebugInvariants for Broken {
        fn validate_invariants(&self) -> Result<(), MatchError> {
            Err(MatchError::Config("row claimed twice".into()))
        }
    }

    #[test]
    #[cfg_attr(
        any(debug_assertions, feature = "strict-invariants"),
        should_panic(expected = "row claimed twice")
    )]
    fn broken_values_panic_when_checked() {
        Broken.debug_assert_invariants();
    }
}
