use std::collections::{HashMap, HashSet};

/// Assigns output ids to external channels.
///
/// Ids are keyed by resolved name, so the same channel published by two
/// sources under different native ids converges on one output id. Minted ids
/// live under a dedicated prefix and never collide with an id in `used`.
#[derive(Debug, Clone)]
pub struct IdentityAllocator {
    prefix: String,
    next: u64,
    by_name: HashMap<String, String>,
    minted: HashSet<String>,
}

impl IdentityAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
            by_name: HashMap::new(),
            minted: HashSet::new(),
        }
    }

    /// Output id for `resolved_name`, minting one on first sight.
    pub fn allocate(&mut self, native_id: &str, resolved_name: &str, used: &HashSet<String>) -> String {
        if let Some(id) = self.by_name.get(resolved_name) {
            return id.clone();
        }
        let id = self.mint(used);
        log::debug!("allocated {id} for '{resolved_name}' (native id {native_id})");
        self.by_name.insert(resolved_name.to_string(), id.clone());
        id
    }

    /// Replace the id registered for `resolved_name` after a collision was
    /// detected downstream. Returns the new id.
    pub fn reassign(&mut self, resolved_name: &str, used: &HashSet<String>) -> String {
        let id = self.mint(used);
        self.by_name.insert(resolved_name.to_string(), id.clone());
        id
    }

    pub fn lookup(&self, resolved_name: &str) -> Option<&str> {
        self.by_name.get(resolved_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn mint(&mut self, used: &HashSet<String>) -> String {
        loop {
            let candidate = format!("{}{}", self.prefix, self.next);
            self.next += 1;
            if !used.contains(&candidate) && !self.minted.contains(&candidate) {
                self.minted.insert(candidate.clone());
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_id_across_sources() {
        let mut alloc = IdentityAllocator::new("ext_");
        let used = HashSet::new();
        let a = alloc.allocate("101", "北京卫视", &used);
        let b = alloc.allocate("xyz", "北京卫视", &used);
        assert_eq!(a, b);
        assert_eq!(alloc.len(), 1);
    }

    #[test]
    fn distinct_names_distinct_ids() {
        let mut alloc = IdentityAllocator::new("ext_");
        let used = HashSet::new();
        let a = alloc.allocate("1", "A", &used);
        let b = alloc.allocate("2", "B", &used);
        assert_eq!(a, "ext_1");
        assert_eq!(b, "ext_2");
    }

    #[test]
    fn skips_ids_already_in_use() {
        let mut alloc = IdentityAllocator::new("ext_");
        let used: HashSet<String> = ["ext_1", "ext_2", "ext_4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(alloc.allocate("a", "A", &used), "ext_3");
        assert_eq!(alloc.allocate("b", "B", &used), "ext_5");
    }

    #[test]
    fn reassign_mints_fresh_id() {
        let mut alloc = IdentityAllocator::new("ext_");
        let mut used = HashSet::new();
        let first = alloc.allocate("a", "A", &used);
        used.insert(first.clone());
        let second = alloc.reassign("A", &used);
        assert_ne!(first, second);
        assert_eq!(alloc.lookup("A"), Some(second.as_str()));
    }
}
