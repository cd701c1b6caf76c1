//! String interning.

use std::sync::Arc;

use parking_lot::RwLock;
use ram_ir::RamDomain;
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
struct Symbols {
    ids: FxHashMap<Arc<str>, RamDomain>,
    names: Vec<Arc<str>>,
}

/// Bidirectional map between strings and dense domain values.
///
/// Ids are assigned in interning order starting at 0 and never change.
/// Shared between the engine and any reader or printer of relation contents.
#[derive(Debug, Default)]
pub struct SymbolTable {
    inner: RwLock<Symbols>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// A table pre-populated with `symbols`, in order.
    pub fn with_symbols<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Self {
        let table = SymbolTable::new();
        for symbol in symbols {
            table.intern(symbol);
        }
        table
    }

    /// The id of `symbol`, interning it on first use.
    pub fn intern(&self, symbol: &str) -> RamDomain {
        if let Some(id) = self.inner.read().ids.get(symbol) {
            return *id;
        }
        let mut symbols = self.inner.write();
        // another writer may have won the race
        if let Some(id) = symbols.ids.get(symbol) {
            return *id;
        }
        let id = symbols.names.len() as RamDomain;
        let name: Arc<str> = Arc::from(symbol);
        symbols.names.push(name.clone());
        symbols.ids.insert(name, id);
        id
    }

    /// The string behind `id`, if it was ever interned.
    pub fn resolve(&self, id: RamDomain) -> Option<Arc<str>> {
        let index = usize::try_from(id).ok()?;
        self.inner.read().names.get(index).cloned()
    }

    /// The id of an already interned symbol.
    pub fn lookup(&self, symbol: &str) -> Option<RamDomain> {
        self.inner.read().ids.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let table = SymbolTable::new();
        let a = table.intern("alpha");
        let b = table.intern("beta");
        assert_ne!(a, b);
        assert_eq!(table.intern("alpha"), a);
        assert_eq!(table.resolve(b).as_deref(), Some("beta"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_resolve_unknown() {
        let table = SymbolTable::with_symbols(["x"]);
        assert_eq!(table.resolve(1), None);
        assert_eq!(table.resolve(-1), None);
        assert_eq!(table.lookup("x"), Some(0));
        assert_eq!(table.lookup("y"), None);
    }
}
