//! Table storage for QuillDB
//!
//! This module performs the per-table file operations: append-only
//! inserts, scans, index point lookups, and the rewrite protocol behind
//! UPDATE and DELETE. File handles are opened per operation and released
//! before return.

use super::btree::BPlusTree;
use super::record::{self, Record};
use super::value::Value;
use crate::catalog::TableSchema;
use crate::error::{Error, Result};
use crate::query::predicate::Filter;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Storage operations for one table.
///
/// Borrows the schema from the catalog for the duration of one
/// operation; the caller owns the table's index.
pub struct TableStore<'a> {
    schema: &'a TableSchema,
}

/// What the rewrite pass does with one record.
enum Rewrite {
    Keep,
    Replace(Record),
    Drop,
}

impl<'a> TableStore<'a> {
    pub fn new(schema: &'a TableSchema) -> Self {
        Self { schema }
    }

    /// Append one record to the data file and index its primary key.
    ///
    /// The record offset is the data file length at the moment of the
    /// write. Fails without touching disk if the record lacks the
    /// primary key, duplicates an existing key, or carries a value of
    /// the wrong type for any column.
    pub fn insert(&self, index: &mut BPlusTree, rec: &Record) -> Result<u32> {
        let frame = record::encode(rec, self.schema)?;

        let key = match self.schema.primary_key() {
            Some(pk) => match rec.get(&pk.name) {
                Some(Value::Int(key)) => Some(*key),
                Some(_) => return Err(Error::TypeMismatch(pk.name.clone())),
                None => return Err(Error::MissingPrimaryKey(pk.name.clone())),
            },
            None => None,
        };
        if let Some(key) = key {
            if index.contains(key) {
                return Err(Error::DuplicateKey(self.schema.name.clone(), key));
            }
        }

        if let Some(parent) = self.schema.data_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.schema.data_path)?;
        let offset = file.metadata()?.len() as u32;
        file.write_all(&frame)?;
        file.flush()?;

        if let Some(key) = key {
            index.insert(key, offset);
            index.save()?;
        }
        debug!(table = %self.schema.name, offset, "inserted record");
        Ok(offset)
    }

    /// Read every record in the data file. A table that was never
    /// written reads as empty.
    pub fn scan(&self) -> Result<Vec<Record>> {
        if !self.schema.data_path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&self.schema.data_path)?;
        let mut cursor = Cursor::new(bytes.as_slice());
        let mut records = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            records.push(record::decode(&mut cursor, self.schema)?);
        }
        Ok(records)
    }

    /// Fetch the records stored under `key` through the index.
    pub fn lookup(&self, index: &BPlusTree, key: i32) -> Result<Vec<Record>> {
        let offsets = index.search(key);
        if offsets.is_empty() || !self.schema.data_path.exists() {
            return Ok(Vec::new());
        }
        let mut file = File::open(&self.schema.data_path)?;
        let mut records = Vec::with_capacity(offsets.len());
        for offset in offsets {
            file.seek(SeekFrom::Start(u64::from(offset)))?;
            records.push(record::decode(&mut file, self.schema)?);
        }
        Ok(records)
    }

    /// Rewrite the data file with `assignments` overlaid onto every
    /// record matching `filter`, then rebuild the index. Returns the
    /// number of records changed.
    pub fn update_where(
        &self,
        index: &mut BPlusTree,
        assignments: &Record,
        filter: &Filter,
    ) -> Result<usize> {
        self.rewrite(index, |rec| {
            if filter.matches(rec) {
                let mut updated = rec.clone();
                updated.merge(assignments);
                Rewrite::Replace(updated)
            } else {
                Rewrite::Keep
            }
        })
    }

    /// Rewrite the data file omitting every record matching `filter`,
    /// then rebuild the index. Returns the number of records removed.
    pub fn delete_where(&self, index: &mut BPlusTree, filter: &Filter) -> Result<usize> {
        self.rewrite(index, |rec| {
            if filter.matches(rec) {
                Rewrite::Drop
            } else {
                Rewrite::Keep
            }
        })
    }

    /// The rewrite protocol: stream records into a temp file, rename it
    /// over the data file, then rebuild the index from the new offsets.
    ///
    /// The rewrite commits at the rename. On any failure before that the
    /// temp file is removed and the original data file stays intact; a
    /// crash after the rename leaves a stale index, which `open_index`
    /// detects and rebuilds.
    fn rewrite(
        &self,
        index: &mut BPlusTree,
        mut apply: impl FnMut(&Record) -> Rewrite,
    ) -> Result<usize> {
        if !self.schema.data_path.exists() {
            return Ok(0);
        }
        let temp = temp_path(&self.schema.data_path);

        let pass = (|| -> Result<usize> {
            let bytes = fs::read(&self.schema.data_path)?;
            let mut cursor = Cursor::new(bytes.as_slice());
            let mut out = BufWriter::new(File::create(&temp)?);
            let mut changed = 0usize;
            while (cursor.position() as usize) < bytes.len() {
                let rec = record::decode(&mut cursor, self.schema)?;
                match apply(&rec) {
                    Rewrite::Keep => out.write_all(&record::encode(&rec, self.schema)?)?,
                    Rewrite::Replace(updated) => {
                        out.write_all(&record::encode(&updated, self.schema)?)?;
                        changed += 1;
                    }
                    Rewrite::Drop => changed += 1,
                }
            }
            out.flush()?;
            Ok(changed)
        })();

        let changed = match pass {
            Ok(changed) => changed,
            Err(e) => {
                let _ = fs::remove_file(&temp);
                return Err(e);
            }
        };
        if changed == 0 {
            let _ = fs::remove_file(&temp);
            return Ok(0);
        }

        if let Err(e) = fs::rename(&temp, &self.schema.data_path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        debug!(table = %self.schema.name, changed, "rewrote data file");

        *index = self.rebuild_index()?;
        Ok(changed)
    }

    /// Build a fresh index from the data file and swap it over the live
    /// index file.
    pub fn rebuild_index(&self) -> Result<BPlusTree> {
        let mut tree = BPlusTree::new(&self.schema.index_path);
        if let Some(pk) = self.schema.primary_key() {
            if self.schema.data_path.exists() {
                let bytes = fs::read(&self.schema.data_path)?;
                let mut cursor = Cursor::new(bytes.as_slice());
                while (cursor.position() as usize) < bytes.len() {
                    let offset = cursor.position() as u32;
                    let rec = record::decode(&mut cursor, self.schema)?;
                    if let Some(Value::Int(key)) = rec.get(&pk.name) {
                        tree.insert(*key, offset);
                    }
                }
            }
        }

        let temp = temp_path(&self.schema.index_path);
        tree.save_to(&temp)?;
        if let Err(e) = fs::rename(&temp, &self.schema.index_path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        debug!(table = %self.schema.name, entries = tree.len(), "rebuilt index");
        Ok(tree)
    }

    /// Open the table's index, rebuilding it when it is unreadable or
    /// its key set no longer matches the data file.
    pub fn open_index(&self) -> Result<BPlusTree> {
        let tree = match BPlusTree::open(&self.schema.index_path) {
            Ok(tree) => tree,
            Err(Error::CorruptIndex(_)) => {
                warn!(table = %self.schema.name, "index unreadable, rebuilding from data file");
                return self.rebuild_index();
            }
            Err(e) => return Err(e),
        };

        let indexed: HashSet<i32> = tree.keys().into_iter().collect();
        if indexed != self.data_keys()? {
            warn!(table = %self.schema.name, "index out of sync with data file, rebuilding");
            return self.rebuild_index();
        }
        Ok(tree)
    }

    /// The set of primary keys present in the data file.
    fn data_keys(&self) -> Result<HashSet<i32>> {
        let mut keys = HashSet::new();
        if let Some(pk) = self.schema.primary_key() {
            for rec in self.scan()? {
                if let Some(Value::Int(key)) = rec.get(&pk.name) {
                    keys.insert(*key);
                }
            }
        }
        Ok(keys)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use crate::query::predicate::{Condition, Filter};
    use crate::storage::value::CompareOp;
    use tempfile::{tempdir, TempDir};

    fn users_fixture() -> (TempDir, TableSchema) {
        let dir = tempdir().unwrap();
        let columns = vec![
            Column::new("id", DataType::Int).primary_key(true),
            Column::new("name", DataType::Str(16)),
        ];
        let schema = TableSchema::new("users", columns, dir.path());
        (dir, schema)
    }

    fn user(id: i32, name: &str) -> Record {
        let mut rec = Record::new();
        rec.set("id", id);
        rec.set("name", name);
        rec
    }

    fn name_is(name: &str) -> Filter {
        Filter::new(
            vec![Condition::new("name", CompareOp::Eq, name)],
            Vec::new(),
        )
        .unwrap()
    }

    fn id_is(id: i32) -> Filter {
        Filter::new(vec![Condition::new("id", CompareOp::Eq, id)], Vec::new()).unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        store.insert(&mut index, &user(1, "alice")).unwrap();
        store.insert(&mut index, &user(2, "bob")).unwrap();

        let hits = store.lookup(&index, 2).unwrap();
        assert_eq!(hits, vec![user(2, "bob")]);
        assert!(store.lookup(&index, 9).unwrap().is_empty());
    }

    #[test]
    fn test_offsets_follow_file_length() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        let width = schema.row_width() as u32;
        assert_eq!(store.insert(&mut index, &user(1, "alice")).unwrap(), 0);
        assert_eq!(store.insert(&mut index, &user(2, "bob")).unwrap(), width);
        assert_eq!(
            store.insert(&mut index, &user(3, "carol")).unwrap(),
            2 * width
        );
    }

    #[test]
    fn test_duplicate_primary_key_rejected() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        store.insert(&mut index, &user(1, "alice")).unwrap();
        let result = store.insert(&mut index, &user(1, "impostor"));
        assert!(matches!(result, Err(Error::DuplicateKey(_, 1))));
        // the reject left no trace on disk
        assert_eq!(store.scan().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_primary_key_rejected() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        let mut rec = Record::new();
        rec.set("name", "anonymous");
        let result = store.insert(&mut index, &rec);
        assert!(matches!(result, Err(Error::MissingPrimaryKey(_))));
    }

    #[test]
    fn test_scan_missing_file_is_empty() {
        let (_dir, schema) = users_fixture();
        assert!(TableStore::new(&schema).scan().unwrap().is_empty());
    }

    #[test]
    fn test_update_rewrites_and_keeps_index_current() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        store.insert(&mut index, &user(1, "alice")).unwrap();
        store.insert(&mut index, &user(2, "bob")).unwrap();

        let mut patch = Record::new();
        patch.set("name", "carol");
        let changed = store.update_where(&mut index, &patch, &id_is(1)).unwrap();
        assert_eq!(changed, 1);

        let hits = store.lookup(&index, 1).unwrap();
        assert_eq!(hits, vec![user(1, "carol")]);
        assert_eq!(store.scan().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_shrinks_file_to_surviving_rows() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        for (id, name) in [(1, "alice"), (2, "bob"), (3, "alice")] {
            store.insert(&mut index, &user(id, name)).unwrap();
        }

        let removed = store.delete_where(&mut index, &id_is(2)).unwrap();
        assert_eq!(removed, 1);

        let len = fs::metadata(&schema.data_path).unwrap().len();
        assert_eq!(len, 2 * schema.row_width() as u64);
        assert!(store.lookup(&index, 2).unwrap().is_empty());
        assert_eq!(store.lookup(&index, 3).unwrap(), vec![user(3, "alice")]);
    }

    #[test]
    fn test_delete_by_non_key_column() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        for (id, name) in [(1, "alice"), (2, "bob"), (3, "alice")] {
            store.insert(&mut index, &user(id, name)).unwrap();
        }

        let removed = store.delete_where(&mut index, &name_is("alice")).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.scan().unwrap(), vec![user(2, "bob")]);
        assert_eq!(index.keys(), vec![2]);
    }

    #[test]
    fn test_no_match_rewrite_leaves_file_alone() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        store.insert(&mut index, &user(1, "alice")).unwrap();
        let before = fs::read(&schema.data_path).unwrap();

        assert_eq!(store.delete_where(&mut index, &id_is(9)).unwrap(), 0);
        assert_eq!(fs::read(&schema.data_path).unwrap(), before);
        assert!(!temp_path(&schema.data_path).exists());
    }

    #[test]
    fn test_stale_index_is_rebuilt_on_open() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        store.insert(&mut index, &user(1, "alice")).unwrap();
        store.insert(&mut index, &user(2, "bob")).unwrap();
        drop(index);

        // simulate a crash between data rename and index rebuild
        fs::remove_file(&schema.index_path).unwrap();
        let reopened = store.open_index().unwrap();
        assert_eq!(reopened.keys(), vec![1, 2]);
        assert_eq!(store.lookup(&reopened, 2).unwrap(), vec![user(2, "bob")]);
    }

    #[test]
    fn test_garbage_index_is_rebuilt_on_open() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        store.insert(&mut index, &user(1, "alice")).unwrap();
        drop(index);

        fs::write(&schema.index_path, b"\xff\xff\xff garbage").unwrap();
        let reopened = store.open_index().unwrap();
        assert_eq!(reopened.keys(), vec![1]);
    }

    #[test]
    fn test_truncated_data_file_fails_scan() {
        let (_dir, schema) = users_fixture();
        let store = TableStore::new(&schema);
        let mut index = store.open_index().unwrap();

        store.insert(&mut index, &user(1, "alice")).unwrap();
        let bytes = fs::read(&schema.data_path).unwrap();
        fs::write(&schema.data_path, &bytes[..bytes.len() - 5]).unwrap();

        assert!(matches!(store.scan(), Err(Error::CorruptTable(_))));
    }
}
