use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value};

/// Shared mutable property bag scoped to a project root.
///
/// Callers may depend on object identity: extending a bag mutates it in
/// place rather than replacing it, so every holder observes the update.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag(Rc<RefCell<Map<String, Value>>>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(Rc::new(RefCell::new(map)))
    }

    /// Shallow-merge `other` into this bag; later values win
    pub fn extend(&self, other: &Map<String, Value>) {
        let mut bag = self.0.borrow_mut();
        for (key, value) in other {
            bag.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.borrow_mut().insert(key.into(), value);
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.0.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Whether two handles refer to the same underlying bag
    pub fn ptr_eq(&self, other: &PropertyBag) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extend_preserves_identity() {
        let bag = PropertyBag::new();
        let alias = bag.clone();

        let mut extra = Map::new();
        extra.insert("answer".to_string(), json!(42));
        bag.extend(&extra);

        assert!(bag.ptr_eq(&alias));
        assert_eq!(alias.get("answer"), Some(json!(42)));
    }

    #[test]
    fn test_later_values_win() {
        let mut initial = Map::new();
        initial.insert("mode".to_string(), json!("dev"));
        let bag = PropertyBag::from_map(initial);

        let mut update = Map::new();
        update.insert("mode".to_string(), json!("prod"));
        bag.extend(&update);

        assert_eq!(bag.get("mode"), Some(json!("prod")));
    }
}
