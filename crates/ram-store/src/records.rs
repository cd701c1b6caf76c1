//! Record interning.

use std::sync::Arc;

use parking_lot::RwLock;
use ram_ir::{RamDomain, fatal};
use rustc_hash::FxHashMap;

/// Id of the empty record.
pub const NIL: RamDomain = 0;

#[derive(Debug)]
struct Records {
    ids: FxHashMap<Arc<[RamDomain]>, RamDomain>,
    // slot 0 stands for nil
    fields: Vec<Arc<[RamDomain]>>,
}

impl Default for Records {
    fn default() -> Self {
        Records {
            ids: FxHashMap::default(),
            fields: vec![Arc::from(Vec::new())],
        }
    }
}

/// Interns fixed-width records of domain values.
///
/// Equal component arrays always get the same id; id [`NIL`] is reserved.
#[derive(Debug, Default)]
pub struct RecordTable {
    inner: RwLock<Records>,
}

impl RecordTable {
    pub fn new() -> Self {
        RecordTable::default()
    }

    pub fn pack(&self, fields: &[RamDomain]) -> RamDomain {
        if let Some(id) = self.inner.read().ids.get(fields) {
            return *id;
        }
        let mut records = self.inner.write();
        if let Some(id) = records.ids.get(fields) {
            return *id;
        }
        let id = records.fields.len() as RamDomain;
        let fields: Arc<[RamDomain]> = Arc::from(fields);
        records.fields.push(fields.clone());
        records.ids.insert(fields, id);
        id
    }

    /// Components of record `id`; `None` for nil.
    ///
    /// Panics if `id` was never packed or was packed with another arity.
    pub fn unpack(&self, id: RamDomain, arity: usize) -> Option<Arc<[RamDomain]>> {
        if id == NIL {
            return None;
        }
        let records = self.inner.read();
        let Some(fields) = usize::try_from(id).ok().and_then(|i| records.fields.get(i)) else {
            fatal!("record {id} was never packed");
        };
        if fields.len() != arity {
            fatal!(
                "record {id} has {} fields, unpacked with arity {arity}",
                fields.len()
            );
        }
        Some(fields.clone())
    }

    /// Number of records, excluding nil.
    pub fn len(&self) -> usize {
        self.inner.read().fields.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
