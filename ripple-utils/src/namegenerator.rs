use crate::Id;
use std::collections::{HashMap, HashSet};

/// Generator of fresh identifiers disjoint from every name already bound in
/// a module. Each prefix gets its own counter, so `gen_name("_RAND")` yields
/// `_RAND_0`, `_RAND_1`, and so on, skipping anything already taken.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    counters: HashMap<Id, u64>,
    taken: HashSet<Id>,
}

impl NameGenerator {
    /// Create a generator that will never produce any of `names`.
    pub fn with_prev_defined_names(names: HashSet<Id>) -> Self {
        NameGenerator {
            counters: HashMap::default(),
            taken: names,
        }
    }

    /// Mark `name` as taken. Returns true when it was previously unused.
    pub fn reserve(&mut self, name: Id) -> bool {
        self.taken.insert(name)
    }

    /// Returns a fresh name of the form `<prefix>_<n>`.
    pub fn gen_name<S>(&mut self, prefix: S) -> Id
    where
        S: Into<Id>,
    {
        let prefix: Id = prefix.into();
        loop {
            let count = self
                .counters
                .entry(prefix)
                .and_modify(|v| *v += 1)
                .or_insert(0);
            let name = prefix.appended(format!("_{}", count));
            if self.taken.insert(name) {
                return name;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_prefix() {
        let mut ns = NameGenerator::default();
        assert_eq!(ns.gen_name("_RAND"), Id::from("_RAND_0"));
        assert_eq!(ns.gen_name("_RAND"), Id::from("_RAND_1"));
        assert_eq!(ns.gen_name("_T"), Id::from("_T_0"));
    }

    #[test]
    fn skips_previously_defined_names() {
        let taken = ["_T_0", "_T_1"].into_iter().map(Id::from).collect();
        let mut ns = NameGenerator::with_prev_defined_names(taken);
        assert_eq!(ns.gen_name("_T"), Id::from("_T_2"));
    }

    #[test]
    fn reserve_reports_collisions() {
        let mut ns = NameGenerator::default();
        assert!(ns.reserve(Id::from("reg_")));
        assert!(!ns.reserve(Id::from("reg_")));
    }
}
