// src/middleware/chain.rs
use crate::errors::Error;
use arc_swap::ArcSwap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

pub struct ChainEntry<T: ?Sized> {
    name: String,
    handler: Arc<T>,
}

impl<T: ?Sized> ChainEntry<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &Arc<T> {
        &self.handler
    }
}

impl<T: ?Sized> Clone for ChainEntry<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// Ordered list of uniquely named handlers.
///
/// Readers take a snapshot and iterate it without locking; writers build a
/// new list and swap it in. A request that is halfway through a chain keeps
/// seeing the list it started with.
pub struct Chain<T: ?Sized> {
    entries: ArcSwap<Vec<ChainEntry<T>>>,
    writer: Mutex<()>,
}

impl<T: ?Sized> Chain<T> {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    /// Adds `handler` at the end. Fails if `name` is taken.
    pub fn append(&self, name: impl Into<String>, handler: Arc<T>) -> Result<(), Error> {
        let name = name.into();
        self.modify(|entries| {
            if entries.iter().any(|e| e.name == name) {
                return Err(Error::DuplicateName(name));
            }
            entries.push(ChainEntry { name, handler });
            Ok(())
        })
    }

    /// Replaces the handler registered under `name` in place, or appends it.
    pub fn update(&self, name: impl Into<String>, handler: Arc<T>) {
        let name = name.into();
        let replaced = self.modify(|entries| {
            match entries.iter_mut().find(|e| e.name == name) {
                Some(entry) => entry.handler = handler,
                None => entries.push(ChainEntry { name, handler }),
            }
            Ok::<(), Infallible>(())
        });
        match replaced {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    pub fn remove(&self, name: &str) -> Result<(), Error> {
        self.modify(|entries| {
            let index = entries
                .iter()
                .position(|e| e.name == name)
                .ok_or_else(|| Error::NotFound(name.to_string()))?;
            entries.remove(index);
            Ok(())
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .load()
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.handler.clone())
    }

    pub fn snapshot(&self) -> Arc<Vec<ChainEntry<T>>> {
        self.entries.load_full()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.load().iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publishes the edited copy only if `f` succeeds.
    fn modify<E, F>(&self, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut Vec<ChainEntry<T>>) -> Result<(), E>,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = Vec::clone(&self.entries.load());
        f(&mut entries)?;
        self.entries.store(Arc::new(entries));
        Ok(())
    }
}

impl<T: ?Sized> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn label(&self) -> &'static str;
    }

    struct Label(&'static str);

    impl Named for Label {
        fn label(&self) -> &'static str {
            self.0
        }
    }

    fn labels(chain: &Chain<dyn Named>) -> Vec<&'static str> {
        chain.snapshot().iter().map(|e| e.handler().label()).collect()
    }

    #[test]
    fn keeps_insertion_order_and_unique_names() {
        let chain: Chain<dyn Named> = Chain::new();
        chain.append("a", Arc::new(Label("a"))).unwrap();
        chain.append("b", Arc::new(Label("b"))).unwrap();
        assert!(matches!(
            chain.append("a", Arc::new(Label("again"))),
            Err(Error::DuplicateName(_))
        ));

        assert_eq!(chain.names(), vec!["a", "b"]);
        assert_eq!(labels(&chain), vec!["a", "b"]);
        assert_eq!(chain.get("b").unwrap().label(), "b");
        assert!(chain.get("c").is_none());
    }

    #[test]
    fn update_replaces_in_place() {
        let chain: Chain<dyn Named> = Chain::new();
        chain.append("a", Arc::new(Label("a"))).unwrap();
        chain.append("b", Arc::new(Label("b"))).unwrap();
        chain.update("a", Arc::new(Label("a2")));
        chain.update("c", Arc::new(Label("c")));

        assert_eq!(labels(&chain), vec!["a2", "b", "c"]);
        assert_eq!(chain.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn failed_edit_publishes_nothing() {
        let chain: Chain<dyn Named> = Chain::new();
        chain.append("a", Arc::new(Label("a"))).unwrap();
        let before = chain.snapshot();

        assert!(chain.append("a", Arc::new(Label("dup"))).is_err());
        assert!(chain.remove("missing").is_err());

        assert!(Arc::ptr_eq(&before, &chain.snapshot()));
    }

    #[test]
    fn remove_leaves_other_entries_alone() {
        let chain: Chain<dyn Named> = Chain::new();
        for name in ["a", "b", "c"] {
            chain.append(name, Arc::new(Label(name))).unwrap();
        }
        chain.remove("b").unwrap();
        assert!(matches!(chain.remove("b"), Err(Error::NotFound(_))));
        assert_eq!(labels(&chain), vec!["a", "c"]);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn snapshot_is_stable_across_writes() {
        let chain: Chain<dyn Named> = Chain::new();
        chain.append("a", Arc::new(Label("a"))).unwrap();

        let snapshot = chain.snapshot();
        chain.append("b", Arc::new(Label("b"))).unwrap();
        chain.remove("a").unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name(), "a");
        assert_eq!(labels(&chain), vec!["b"]);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let chain: Arc<Chain<dyn Named>> = Arc::new(Chain::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let chain = chain.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        chain
                            .append(format!("{}-{}", i, j), Arc::new(Label("x")))
                            .unwrap();
                        let _ = chain.snapshot().len();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(chain.len(), 400);
    }
}
