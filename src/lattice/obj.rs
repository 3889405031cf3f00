use super::{diff, is_subset_of, merge};
use crate::ir::ObjectSchema;

impl ObjectSchema {
    /// Name-identity subsumption.
    ///
    /// Required sets must have equal size and every required field of `self`
    /// must be required in `other` with a subsuming schema; every optional
    /// field of `self` must exist in `other` (optional or required) with a
    /// subsuming schema. `additionalProperties` is not compared.
    pub(crate) fn is_subset_of(&self, other: &Self) -> bool {
        let required_match = self.required.len() == other.required.len()
            && self.required_keys().all(|k| {
                other.is_required(k)
                    && match (self.properties.get(k), other.properties.get(k)) {
                        (Some(x), Some(y)) => is_subset_of(x, y),
                        _ => false,
                    }
            });
        required_match
            && self.optional_keys().all(|k| {
                match (self.properties.get(k), other.properties.get(k)) {
                    (Some(x), Some(y)) => is_subset_of(x, y),
                    _ => false,
                }
            })
    }

    /// Key-by-key overlay; `other` wins on collisions, `required` is unioned.
    pub(crate) fn merge(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (k, theirs) in &other.properties {
            let merged = match self.properties.get(k) {
                Some(ours) => merge(ours, theirs),
                None => theirs.clone(),
            };
            out.properties.insert(k.clone(), merged);
        }
        out.required.extend(other.required.iter().cloned());
        out.additional_properties = other.additional_properties.or(self.additional_properties);
        out.prune_required();
        out
    }

    /// Field-wise difference over the fields `other` mentions. A field with
    /// nothing left is removed (and stops being required).
    pub(crate) fn diff(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (k, theirs) in &other.properties {
            let Some(ours) = self.properties.get(k) else { continue };
            match diff(ours, theirs) {
                Some(rest) => { out.properties.insert(k.clone(), rest); }
                None => { out.remove_property(k); }
            }
        }
        out
    }
}
