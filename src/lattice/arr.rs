use super::{is_subset_of, lower_covers, merge, prefer, upper_covers};
use crate::ir::ArraySchema;

impl ArraySchema {
    /// Bounds nest and every item alternative of `self` fits some item
    /// alternative of `other`.
    pub(crate) fn is_subset_of(&self, other: &Self) -> bool {
        lower_covers(other.min_items, self.min_items)
            && upper_covers(other.max_items, self.max_items)
            && self.item_alternatives().iter().all(|x| {
                other.item_alternatives().iter().any(|y| is_subset_of(x, y))
            })
    }

    pub(crate) fn merge(&self, other: &Self) -> Self {
        Self {
            items: Box::new(merge(&self.items, &other.items)),
            min_items: prefer(&self.min_items, &other.min_items),
            max_items: prefer(&self.max_items, &other.max_items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Combinator, CombinatorKind, Schema, StringSchema};

    fn enum_items(xs: &[&str]) -> Schema {
        Schema::String(StringSchema {
            enum_: Some(xs.iter().map(|s| s.to_string()).collect()),
            ..StringSchema::default()
        })
    }

    #[test]
    fn item_alternatives_must_each_be_covered() {
        let a = ArraySchema::of(Schema::Combinator(Combinator {
            kind: CombinatorKind::AnyOf,
            branches: vec![enum_items(&["a"]), Schema::number()],
        }));
        let b = ArraySchema::of(Schema::Combinator(Combinator {
            kind: CombinatorKind::AnyOf,
            branches: vec![Schema::string(), Schema::number()],
        }));
        assert!(a.is_subset_of(&b));
        assert!(!b.is_subset_of(&a));
    }

    #[test]
    fn item_counts_nest() {
        let a = ArraySchema { min_items: Some(2), max_items: Some(3), ..ArraySchema::of(Schema::string()) };
        let b = ArraySchema { min_items: Some(1), ..ArraySchema::of(Schema::string()) };
        assert!(a.is_subset_of(&b));
        assert!(!b.is_subset_of(&a));
    }

    #[test]
    fn merge_narrows_items() {
        let a = ArraySchema::of(enum_items(&["a", "b"]));
        let b = ArraySchema { max_items: Some(10), ..ArraySchema::of(enum_items(&["b"])) };
        let m = a.merge(&b);
        assert_eq!(*m.items, enum_items(&["b"]));
        assert_eq!(m.max_items, Some(10));
    }
}
