use indexmap::IndexSet;
use regex::Regex;

use super::{lower_covers, merge_enum, prefer, upper_covers};
use crate::ir::StringSchema;

impl StringSchema {
    /// Does `s` satisfy every constraint of this schema?
    ///
    /// `format` is not checked here; callers compare formats separately.
    /// An uncompilable `pattern` accepts nothing.
    pub fn accepts(&self, s: &str) -> bool {
        self.acceptor()(s)
    }

    /// [`accepts`](Self::accepts) with the pattern compiled once, for checking
    /// many strings against the same schema.
    pub fn acceptor(&self) -> impl Fn(&str) -> bool + '_ {
        let pattern = self.pattern.as_deref().map(compile);
        move |s: &str| {
            let len = s.chars().count() as u64;
            self.enum_.as_ref().is_none_or(|e| e.contains(s))
                && self.min_len().is_none_or(|m| len >= m)
                && self.max_len().is_none_or(|m| len <= m)
                && pattern.as_ref().is_none_or(|re| re.as_ref().is_some_and(|re| re.is_match(s)))
        }
    }

    /// Same `format` and `pattern`, nested length bounds, and an enum that
    /// is a subset of `other`'s (a missing enum on `other` allows anything).
    pub(crate) fn is_subset_of(&self, other: &Self) -> bool {
        let enum_within = match (&self.enum_, &other.enum_) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(ours), Some(theirs)) => ours.is_subset(theirs),
        };
        self.format == other.format
            && self.pattern == other.pattern
            && lower_covers(other.min_len(), self.min_len())
            && upper_covers(other.max_len(), self.max_len())
            && enum_within
    }

    pub(crate) fn merge(&self, other: &Self) -> Self {
        let mut out = Self {
            format: prefer(&self.format, &other.format),
            length: prefer(&self.length, &other.length),
            min_length: prefer(&self.min_length, &other.min_length),
            max_length: prefer(&self.max_length, &other.max_length),
            pattern: prefer(&self.pattern, &other.pattern),
            enum_: merge_enum(&self.enum_, &other.enum_),
        };
        // literals the merged pattern rejects can never match
        if let (Some(e), Some(rx)) = (out.enum_.as_mut(), other.pattern.as_deref()) {
            match compile(rx) {
                Some(re) => e.retain(|l| re.is_match(l)),
                None => e.clear(),
            }
        }
        out
    }

    /// Values of `self` that `other` rejects. Only enumerated strings can be
    /// narrowed; anything else comes back whole unless `other` accepts every
    /// string `self` does.
    pub(crate) fn diff(&self, other: &Self) -> Option<Self> {
        if self.within(other) {
            return None;
        }
        let Some(lits) = &self.enum_ else {
            return Some(self.clone());
        };
        let format_shared = other.format.is_none() || other.format == self.format;
        let accepted = other.acceptor();
        let rest: IndexSet<String> = lits.iter()
            .filter(|l| !(format_shared && accepted(l.as_str())))
            .cloned()
            .collect();
        if rest.is_empty() {
            None
        } else {
            Some(Self { enum_: Some(rest), ..self.clone() })
        }
    }

    /// Every string `self` accepts is accepted by `other`.
    fn within(&self, other: &Self) -> bool {
        if other.format.is_some() && other.format != self.format {
            return false;
        }
        if let Some(lits) = &self.enum_ {
            let ours = self.acceptor();
            let theirs = other.acceptor();
            return lits.iter().filter(|l| ours(l.as_str())).all(|l| theirs(l.as_str()));
        }
        other.enum_.is_none()
            && (other.pattern.is_none() || other.pattern == self.pattern)
            && lower_covers(other.min_len(), self.min_len())
            && upper_covers(other.max_len(), self.max_len())
    }
}

fn compile(rx: &str) -> Option<Regex> {
    match Regex::new(rx) {
        Ok(re) => Some(re),
        Err(error) => {
            tracing::debug!(pattern = rx, %error, "pattern does not compile");
            None
        }
    }
}
