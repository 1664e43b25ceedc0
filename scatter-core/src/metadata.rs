use crate::error::{Result, ScatterError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Location of one chunk: the node it was written to and its object name there.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChunkRecord {
    pub node: String,
    #[serde(rename = "chunk_filename")]
    pub chunk_name: String,
}

/// A stored file. `chunks` is in reassembly order; there is no index field.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct FileEntry {
    pub size: u64,
    pub chunks: Vec<ChunkRecord>,
}

/// Persisted form: file name -> entry.
pub type MetadataDocument = BTreeMap<String, FileEntry>;

/// Owns the metadata document and its backing file.
///
/// Every mutation rewrites the whole document. The rewrite goes through a
/// temporary sibling file and a rename, so a crash leaves either the old or
/// the new document on disk.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    files: MetadataDocument,
}

impl MetadataStore {
    /// Load the document at `path`, or start empty when it does not exist.
    /// An unparsable document is an error, never silently reset.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let files = match fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| ScatterError::CorruptMetadata {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => MetadataDocument::new(),
            Err(source) => return Err(ScatterError::MetadataIo { path, source }),
        };
        tracing::debug!(path = %path.display(), files = files.len(), "loaded metadata");
        Ok(Self { path, files })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serialize the whole document and atomically replace the file on disk.
    pub fn persist(&self) -> Result<()> {
        let io_err = |source: std::io::Error| ScatterError::MetadataIo {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut buf = Vec::new();
        let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
        self.files
            .serialize(&mut ser)
            .map_err(|e| io_err(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        let tmp = self.tmp_path();
        let written = File::create(&tmp).and_then(|mut f| {
            f.write_all(&buf)?;
            f.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(e));
        }
        Ok(())
    }

    /// Insert or replace the entry for `name`, then persist. If the document
    /// cannot be written the in-memory map is rolled back to match disk.
    pub fn put(&mut self, name: &str, entry: FileEntry) -> Result<()> {
        let previous = self.files.insert(name.to_string(), entry);
        if let Err(e) = self.persist() {
            match previous {
                Some(old) => {
                    self.files.insert(name.to_string(), old);
                }
                None => {
                    self.files.remove(name);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FileEntry> {
        self.files.get(name)
    }

    /// All known names, in key order.
    pub fn list_names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "metadata".to_string());
        self.path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(size: u64, names: &[(&str, &str)]) -> FileEntry {
        FileEntry {
            size,
            chunks: names
                .iter()
                .map(|(n, c)| ChunkRecord {
                    node: n.to_string(),
                    chunk_name: c.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn missing_document_loads_empty() {
        let td = tempfile::tempdir().unwrap();
        let store = MetadataStore::load(td.path().join("metadata.json")).unwrap();
        assert!(store.is_empty());
        assert!(store.get("anything").is_none());
    }

    #[test]
    fn put_persists_and_reloads() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("metadata.json");
        let mut store = MetadataStore::load(&path).unwrap();
        store.put("a.txt", entry(3, &[("n1", "a.txt.chunk0")])).unwrap();
        store.put("b.txt", entry(0, &[])).unwrap();

        let again = MetadataStore::load(&path).unwrap();
        assert_eq!(again.list_names(), vec!["a.txt".to_string(), "b.txt".to_string()]);
        assert_eq!(again.get("a.txt"), store.get("a.txt"));
        // no temporary file left behind
        let leftovers: Vec<_> = fs::read_dir(td.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn put_replaces_whole_entry() {
        let td = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::load(td.path().join("m.json")).unwrap();
        store.put("f", entry(10, &[("n1", "f.chunk0"), ("n2", "f.chunk1")])).unwrap();
        store.put("f", entry(4, &[("n1", "f.chunk0")])).unwrap();
        let e = store.get("f").unwrap();
        assert_eq!(e.size, 4);
        assert_eq!(e.chunks.len(), 1);
    }

    #[test]
    fn wire_schema_uses_chunk_filename() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("metadata.json");
        let mut store = MetadataStore::load(&path).unwrap();
        store.put("x.bin", entry(5, &[("node1_storage", "x.bin.chunk0")])).unwrap();

        let v: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(v["x.bin"]["size"], 5);
        assert_eq!(v["x.bin"]["chunks"][0]["node"], "node1_storage");
        assert_eq!(v["x.bin"]["chunks"][0]["chunk_filename"], "x.bin.chunk0");
    }

    #[test]
    fn names_list_in_key_order() {
        let td = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::load(td.path().join("m.json")).unwrap();
        store.put("zeta.bin", entry(1, &[])).unwrap();
        store.put("alpha.bin", entry(1, &[])).unwrap();
        assert_eq!(store.list_names(), vec!["alpha.bin".to_string(), "zeta.bin".to_string()]);
    }

    #[test]
    fn failed_persist_rolls_back_memory() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("metadata.json");
        let mut store = MetadataStore::load(&path).unwrap();
        store.put("kept.bin", entry(3, &[("n1", "kept.bin.chunk0")])).unwrap();

        // a directory at the document path makes every rewrite fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = store.put("new.bin", entry(1, &[("n1", "new.bin.chunk0")])).unwrap_err();
        assert!(matches!(err, ScatterError::MetadataIo { .. }), "{err:?}");
        assert!(store.get("new.bin").is_none());

        let err = store.put("kept.bin", entry(9, &[])).unwrap_err();
        assert!(matches!(err, ScatterError::MetadataIo { .. }), "{err:?}");
        assert_eq!(store.get("kept.bin").unwrap().size, 3);
        assert_eq!(store.list_names(), vec!["kept.bin".to_string()]);
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn corrupt_document_fails_fast() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("metadata.json");
        fs::write(&path, b"{ not json").unwrap();
        let err = MetadataStore::load(&path).unwrap_err();
        assert!(matches!(err, ScatterError::CorruptMetadata { .. }), "{err:?}");
        // the bad document is left untouched
        assert_eq!(fs::read(&path).unwrap(), b"{ not json");
    }
}
