//! Named merge policies for columns that more than one source supplies.
//!
//! Each join stage has a fixed table mapping a [`Column`] to a
//! [`MergePolicy`]. The stage code looks a column up by name, so renaming or
//! reordering a field in a source schema cannot silently change which value
//! wins.

use serde::Serialize;

use crate::config::LimitPreference;

/// Columns resolved across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Fid,
    IsAlert,
    MagFinal,
    EmagFinal,
    Maglim,
}

/// How a column value is chosen when both sides of a join may supply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Anchor (left) value when present, otherwise the history value.
    AnchorPriority,
    /// History (right) value when present, otherwise the anchor value.
    HistoryPriority,
    /// The larger of the present values.
    Max,
}

impl MergePolicy {
    pub fn resolve<T: PartialOrd + Copy>(self, anchor: Option<T>, history: Option<T>) -> Option<T> {
        match self {
            Self::AnchorPriority => anchor.or(history),
            Self::HistoryPriority => history.or(anchor),
            Self::Max => match (anchor, history) {
                (Some(a), Some(h)) => Some(if h > a { h } else { a }),
                (a, h) => a.or(h),
            },
        }
    }
}

impl From<LimitPreference> for MergePolicy {
    fn from(pref: LimitPreference) -> Self {
        match pref {
            LimitPreference::ForcedFiveSigma => Self::AnchorPriority,
            LimitPreference::DiffImage => Self::HistoryPriority,
            LimitPreference::Deepest => Self::Max,
        }
    }
}

/// Per-stage column policy table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyTable {
    entries: Vec<(Column, MergePolicy)>,
}

impl PolicyTable {
    /// Alerts ⋈ forced history. Magnitudes and limits are not listed: they
    /// come from the SNR rule, not from a first-non-null choice.
    pub fn alerts_forced() -> Self {
        Self {
            entries: vec![
                (Column::Fid, MergePolicy::AnchorPriority),
                (Column::IsAlert, MergePolicy::AnchorPriority),
            ],
        }
    }

    /// Stage-1 result ⋈ previous candidates.
    pub fn with_prv_candidates(limits: LimitPreference) -> Self {
        Self {
            entries: vec![
                (Column::Fid, MergePolicy::AnchorPriority),
                (Column::IsAlert, MergePolicy::AnchorPriority),
                (Column::MagFinal, MergePolicy::AnchorPriority),
                (Column::EmagFinal, MergePolicy::AnchorPriority),
                (Column::Maglim, limits.into()),
            ],
        }
    }

    pub fn policy(&self, column: Column) -> MergePolicy {
        self.entries
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, p)| *p)
            .unwrap_or(MergePolicy::AnchorPriority)
    }

    pub fn resolve<T: PartialOrd + Copy>(
        &self,
        column: Column,
        anchor: Option<T>,
        history: Option<T>,
    ) -> Option<T> {
        self.policy(column).resolve(anchor, history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_priority_falls_back() {
        let p = MergePolicy::AnchorPriority;
        assert_eq!(p.resolve(Some(1), Some(2)), Some(1));
        assert_eq!(p.resolve(None, Some(2)), Some(2));
        assert_eq!(p.resolve::<i64>(None, None), None);
    }

    #[test]
    fn history_priority_falls_back() {
        let p = MergePolicy::HistoryPriority;
        assert_eq!(p.resolve(Some(1), Some(2)), Some(2));
        assert_eq!(p.resolve(Some(1), None), Some(1));
    }

    #[test]
    fn max_picks_larger() {
        let p = MergePolicy::Max;
        assert_eq!(p.resolve(Some(19.5), Some(20.1)), Some(20.1));
        assert_eq!(p.resolve(Some(20.5), Some(20.1)), Some(20.5));
        assert_eq!(p.resolve(None, Some(20.1)), Some(20.1));
        // true wins over false
        assert_eq!(p.resolve(Some(false), Some(true)), Some(true));
    }

    #[test]
    fn limit_preference_maps_to_policy() {
        let t = PolicyTable::with_prv_candidates(LimitPreference::DiffImage);
        assert_eq!(t.policy(Column::Maglim), MergePolicy::HistoryPriority);
        assert_eq!(t.policy(Column::MagFinal), MergePolicy::AnchorPriority);

        let t = PolicyTable::with_prv_candidates(LimitPreference::Deepest);
        assert_eq!(t.resolve(Column::Maglim, Some(20.0), Some(20.4)), Some(20.4));
    }

    #[test]
    fn stage_one_table_prefers_alert_values() {
        let t = PolicyTable::alerts_forced();
        assert_eq!(t.resolve(Column::Fid, Some(1i64), Some(2)), Some(1));
        assert_eq!(t.resolve(Column::IsAlert, None, Some(false)), Some(false));
    }
}
