//! Registry of logical tables.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use tcam_types::{
    LinearLocationMapper, LocationMapper, RangeExpander, SingleSlotExpander, TableId, TcamError,
    TcamResult,
};

use super::config::TableConfig;
use super::tcam_table::TcamTable;

/// Owns every logical table and hands out ids.
///
/// The registry is a plain context object: no global state, no locking.
/// Callers serialize access per table; different tables can be worked on
/// concurrently by cloning `Arc` collaborators into per-table contexts.
#[derive(Default)]
pub struct TableRegistry {
    tables: HashMap<TableId, TcamTable>,
    next_id: u32,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with default collaborators (linear location map,
    /// single-slot expansion).
    pub fn create_table(&mut self, config: TableConfig) -> TcamResult<TableId> {
        let mapper = Arc::new(LinearLocationMapper::new(
            config.partition_slots,
            config.block_size,
        ));
        self.create_table_with(config, mapper, Arc::new(SingleSlotExpander))
    }

    /// Creates a table with caller-supplied collaborators.
    pub fn create_table_with(
        &mut self,
        config: TableConfig,
        mapper: Arc<dyn LocationMapper + Send + Sync>,
        expander: Arc<dyn RangeExpander + Send + Sync>,
    ) -> TcamResult<TableId> {
        let id = TableId::from_raw(self.next_id);
        let table = TcamTable::new(id, config, mapper, expander)?;
        self.next_id += 1;
        self.tables.insert(id, table);
        Ok(id)
    }

    pub fn table(&self, id: TableId) -> TcamResult<&TcamTable> {
        self.tables
            .get(&id)
            .ok_or_else(|| TcamError::invalid(format!("unknown {}", id)))
    }

    pub fn table_mut(&mut self, id: TableId) -> TcamResult<&mut TcamTable> {
        self.tables
            .get_mut(&id)
            .ok_or_else(|| TcamError::invalid(format!("unknown {}", id)))
    }

    /// Destroys a table. Rejected while rules are still placed.
    pub fn destroy_table(&mut self, id: TableId) -> TcamResult<()> {
        let table = self.table(id)?;
        if table.usage() != 0 {
            return Err(TcamError::invalid(format!(
                "{} still holds {} slot(s)",
                id,
                table.usage()
            )));
        }
        self.tables.remove(&id);
        info!("destroyed {}", id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tcam_types::{ActionRef, PipeId, RuleHandle, RulePayload};

    fn config() -> TableConfig {
        TableConfig::new("reg_test").with_partition_slots(8)
    }

    #[test]
    fn test_create_lookup_destroy() {
        let mut reg = TableRegistry::new();
        let id = reg.create_table(config()).unwrap();
        assert_eq!(reg.table(id).unwrap().config().name, "reg_test");

        reg.destroy_table(id).unwrap();
        assert!(reg.table(id).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_destroy_rejected_while_used() {
        let mut reg = TableRegistry::new();
        let id = reg.create_table(config()).unwrap();
        reg.table_mut(id)
            .unwrap()
            .add(
                PipeId::All,
                RuleHandle::from_raw(1),
                0,
                10,
                Arc::new(RulePayload::default()),
                ActionRef::default(),
                0,
            )
            .unwrap();
        assert!(reg.destroy_table(id).is_err());

        reg.table_mut(id).unwrap().delete(RuleHandle::from_raw(1)).unwrap();
        reg.destroy_table(id).unwrap();
    }

    #[test]
    fn test_ids_are_unique() {
        let mut reg = TableRegistry::new();
        let a = reg.create_table(config()).unwrap();
        let b = reg.create_table(config()).unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }
}
