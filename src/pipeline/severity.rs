//! Ordered outcome of a pipeline phase.

use serde::{Deserialize, Serialize};

/// Phase outcome, strictly ordered `Success < LowFailure < StrongFailure`.
///
/// - `LowFailure`: the run stopped but the container is consistent and usable
///   (unscaled, possibly unadapted).
/// - `StrongFailure`: the container may be left scaled or otherwise not
///   directly reusable.
///
/// The derived `Ord` is the "worse-than" order used by severity reductions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Severity {
    #[default]
    Success = 0,
    LowFailure = 1,
    StrongFailure = 2,
}

impl Severity {
    /// Integer code returned to callers of the entry points.
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Inverse of [`code`](Self::code).
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::LowFailure),
            2 => Some(Self::StrongFailure),
            _ => None,
        }
    }

    /// The worse of two outcomes.
    #[inline]
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Success => "SUCCESS",
            Self::LowFailure => "LOW_FAILURE",
            Self::StrongFailure => "STRONG_FAILURE",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use static_assertions::assert_eq_size;

    assert_eq_size!(Severity, u8);

    fn severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Success),
            Just(Severity::LowFailure),
            Just(Severity::StrongFailure),
        ]
    }

    #[test]
    fn codes_round_trip() {
        for s in [Severity::Success, Severity::LowFailure, Severity::StrongFailure] {
            assert_eq!(Severity::from_code(s.code()), Some(s));
        }
        assert_eq!(Severity::from_code(3), None);
        assert!(Severity::Success < Severity::LowFailure);
        assert!(Severity::LowFailure < Severity::StrongFailure);
    }

    proptest! {
        #[test]
        fn worst_is_commutative(a in severity(), b in severity()) {
            prop_assert_eq!(a.worst(b), b.worst(a));
        }

        #[test]
        fn worst_is_associative(a in severity(), b in severity(), c in severity()) {
            prop_assert_eq!(a.worst(b).worst(c), a.worst(b.worst(c)));
        }

        #[test]
        fn fold_order_does_not_matter(mut v in proptest::collection::vec(severity(), 1..16)) {
            let forward = v.iter().copied().fold(Severity::Success, Severity::worst);
            v.reverse();
            let backward = v.iter().copied().fold(Severity::Success, Severity::worst);
            prop_assert_eq!(forward, backward);
            prop_assert_eq!(forward, v.iter().copied().max().unwrap());
        }
    }
}
