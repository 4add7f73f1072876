//! Reaction icons users can raise while an element is running.

use std::fmt;
use std::str::FromStr;

/// One of the five fixed reaction icons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Icon {
    /// "Please slow down."
    Slower,
    /// "I need a break."
    Break,
    /// "You can go faster."
    Faster,
    /// "I have a question."
    Question,
    /// "All good."
    Good,
}

impl Icon {
    /// Every icon, in the order admins receive them on attach.
    pub const ALL: [Icon; 5] = [
        Icon::Slower,
        Icon::Break,
        Icon::Faster,
        Icon::Question,
        Icon::Good,
    ];

    /// Wire name of the icon.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Slower => "slower",
            Self::Break => "break",
            Self::Faster => "faster",
            Self::Question => "question",
            Self::Good => "good",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Slower => 0,
            Self::Break => 1,
            Self::Faster => 2,
            Self::Question => 3,
            Self::Good => 4,
        }
    }
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Icon {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Icon::ALL
            .into_iter()
            .find(|icon| icon.as_str() == s)
            .ok_or(())
    }
}

/// Per-session reaction counters.
///
/// Counters only grow between resets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IconCounters {
    counts: [u64; 5],
}

impl IconCounters {
    /// Increment one counter and return its new value.
    pub fn increment(&mut self, icon: Icon) -> u64 {
        let slot = &mut self.counts[icon.index()];
        *slot = slot.saturating_add(1);
        *slot
    }

    /// Current value of one counter.
    pub fn get(&self, icon: Icon) -> u64 {
        self.counts[icon.index()]
    }

    /// Drive every counter back to zero.
    pub fn reset(&mut self) {
        self.counts = [0; 5];
    }

    /// Iterate `(icon, count)` pairs in [`Icon::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Icon, u64)> + '_ {
        Icon::ALL.into_iter().map(|icon| (icon, self.get(icon)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for icon in Icon::ALL {
            assert_eq!(icon.as_str().parse::<Icon>(), Ok(icon));
        }
    }

    #[test]
    fn unknown_icon_is_rejected() {
        assert!("applause".parse::<Icon>().is_err());
        assert!("Slower".parse::<Icon>().is_err());
    }

    #[test]
    fn increment_returns_new_value() {
        let mut counters = IconCounters::default();
        assert_eq!(counters.increment(Icon::Good), 1);
        assert_eq!(counters.increment(Icon::Good), 2);
        assert_eq!(counters.get(Icon::Good), 2);
        assert_eq!(counters.get(Icon::Break), 0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut counters = IconCounters::default();
        for icon in Icon::ALL {
            let _ = counters.increment(icon);
        }
        counters.reset();
        assert!(counters.iter().all(|(_, n)| n == 0));
    }

    fn icon_strategy() -> impl Strategy<Value = Option<Icon>> {
        prop_oneof![
            Just(None),
            proptest::sample::select(Icon::ALL.to_vec()).prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn counters_never_decrease_between_resets(
            ops in proptest::collection::vec(icon_strategy(), 0..200)
        ) {
            let mut counters = IconCounters::default();
            let mut previous = counters.clone();
            for op in ops {
                match op {
                    Some(icon) => {
                        let _ = counters.increment(icon);
                        for (i, n) in counters.iter() {
                            prop_assert!(n >= previous.get(i));
                        }
                    }
                    None => {
                        counters.reset();
                        prop_assert!(counters.iter().all(|(_, n)| n == 0));
                    }
                }
                previous = counters.clone();
            }
        }
    }
}
