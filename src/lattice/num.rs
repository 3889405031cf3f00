use indexmap::IndexSet;
use ordered_float::OrderedFloat;

use super::{lower_covers, merge_enum, prefer, upper_covers};
use crate::ir::{BooleanSchema, NumberSchema};

impl NumberSchema {
    pub fn accepts(&self, x: OrderedFloat<f64>) -> bool {
        self.enum_.as_ref().is_none_or(|e| e.contains(&x))
            && self.minimum.is_none_or(|m| x >= m)
            && self.maximum.is_none_or(|m| x <= m)
            && (!self.integer || x.0.fract() == 0.0)
    }

    /// Same `format`, nested bounds, integers inside numbers; enums are
    /// compared only when both sides carry one.
    pub(crate) fn is_subset_of(&self, other: &Self) -> bool {
        let enum_within = match (&self.enum_, &other.enum_) {
            (Some(ours), Some(theirs)) => ours.is_subset(theirs),
            _ => true,
        };
        self.format == other.format
            && (self.integer || !other.integer)
            && lower_covers(other.minimum, self.minimum)
            && upper_covers(other.maximum, self.maximum)
            && enum_within
    }

    /// Every number `self` accepts is accepted by `other`.
    fn within(&self, other: &Self) -> bool {
        if other.format.is_some() && other.format != self.format {
            return false;
        }
        if let Some(lits) = &self.enum_ {
            return lits.iter()
                .filter(|x| self.accepts(**x))
                .all(|x| other.accepts(*x));
        }
        other.enum_.is_none()
            && (self.integer || !other.integer)
            && lower_covers(other.minimum, self.minimum)
            && upper_covers(other.maximum, self.maximum)
    }

    pub(crate) fn merge(&self, other: &Self) -> Self {
        let mut out = Self {
            integer: self.integer || other.integer,
            format: prefer(&self.format, &other.format),
            minimum: prefer(&self.minimum, &other.minimum),
            maximum: prefer(&self.maximum, &other.maximum),
            enum_: merge_enum(&self.enum_, &other.enum_),
        };
        let bounds = Self { enum_: None, format: None, ..out.clone() };
        if let Some(e) = out.enum_.as_mut() {
            e.retain(|x| bounds.accepts(*x));
        }
        out
    }

    pub(crate) fn diff(&self, other: &Self) -> Option<Self> {
        if self.within(other) {
            return None;
        }
        let Some(lits) = &self.enum_ else {
            return Some(self.clone());
        };
        let format_shared = other.format.is_none() || other.format == self.format;
        let rest: IndexSet<OrderedFloat<f64>> = lits.iter()
            .copied()
            .filter(|x| !(format_shared && other.accepts(*x)))
            .collect();
        if rest.is_empty() {
            None
        } else {
            Some(Self { enum_: Some(rest), ..self.clone() })
        }
    }
}

impl BooleanSchema {
    /// Any boolean schema subsumes another.
    pub(crate) fn is_subset_of(&self, _other: &Self) -> bool {
        true
    }

    pub(crate) fn merge(&self, other: &Self) -> Self {
        Self { enum_: merge_enum(&self.enum_, &other.enum_) }
    }

    pub(crate) fn diff(&self, other: &Self) -> Option<Self> {
        let theirs = other.values();
        let rest: IndexSet<bool> = self.values()
            .into_iter()
            .filter(|b| !theirs.contains(b))
            .collect();
        if rest.is_empty() { None } else { Some(Self { enum_: Some(rest) }) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(lo: Option<f64>, hi: Option<f64>) -> NumberSchema {
        NumberSchema {
            minimum: lo.map(OrderedFloat),
            maximum: hi.map(OrderedFloat),
            ..NumberSchema::default()
        }
    }

    #[test]
    fn ranges_nest() {
        assert!(range(Some(1.0), Some(5.0)).is_subset_of(&range(Some(0.0), Some(10.0))));
        assert!(!range(Some(0.0), Some(10.0)).is_subset_of(&range(Some(1.0), Some(5.0))));
        assert!(!range(None, Some(5.0)).is_subset_of(&range(Some(0.0), None)));
        assert!(range(Some(3.0), None).is_subset_of(&range(Some(0.0), None)));
    }

    #[test]
    fn integers_fit_inside_numbers_not_the_reverse() {
        let int = NumberSchema { integer: true, ..NumberSchema::default() };
        let num = NumberSchema::default();
        assert!(int.is_subset_of(&num));
        assert!(!num.is_subset_of(&int));
    }

    #[test]
    fn enum_literals_checked_against_range() {
        let lits = NumberSchema {
            enum_: Some([1.0, 4.0].into_iter().map(OrderedFloat).collect()),
            ..NumberSchema::default()
        };
        // a one-sided enum is not compared, only the bounds are
        assert!(lits.is_subset_of(&range(Some(0.0), Some(5.0))));
        assert!(lits.is_subset_of(&range(Some(2.0), None)));
        let d = lits.diff(&range(Some(2.0), None)).unwrap();
        assert_eq!(d.enum_.unwrap().into_iter().collect::<Vec<_>>(), vec![OrderedFloat(1.0)]);
    }

    #[test]
    fn enums_compare_when_both_sides_have_one() {
        let lits = |xs: &[f64]| NumberSchema {
            enum_: Some(xs.iter().copied().map(OrderedFloat).collect()),
            ..NumberSchema::default()
        };
        assert!(lits(&[1.0]).is_subset_of(&lits(&[1.0, 2.0])));
        assert!(!lits(&[1.0, 3.0]).is_subset_of(&lits(&[1.0, 2.0])));
    }

    #[test]
    fn format_must_match_exactly() {
        let int32 = NumberSchema { format: Some("int32".into()), ..NumberSchema::default() };
        assert!(!int32.is_subset_of(&NumberSchema::default()));
        assert!(!NumberSchema::default().is_subset_of(&int32));
        assert_eq!(int32.diff(&NumberSchema::default()), None);
    }

    #[test]
    fn merge_prefers_right_bounds() {
        let m = range(Some(0.0), Some(10.0)).merge(&range(Some(2.0), None));
        assert_eq!(m.minimum, Some(OrderedFloat(2.0)));
        assert_eq!(m.maximum, Some(OrderedFloat(10.0)));
    }

    #[test]
    fn booleans_always_subsume_each_other() {
        let any = BooleanSchema::default();
        let t = BooleanSchema { enum_: Some(IndexSet::from([true])) };
        let f = BooleanSchema { enum_: Some(IndexSet::from([false])) };
        assert!(t.is_subset_of(&any));
        assert!(any.is_subset_of(&t));
        assert!(t.is_subset_of(&f));
        assert_eq!(t.diff(&f), Some(t.clone()));
        assert_eq!(any.diff(&any), None);
        assert_eq!(t.merge(&any), t);
    }
}
