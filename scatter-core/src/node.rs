use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A storage location chunks are written to.
///
/// The placement engine only needs these three operations; the directory
/// backend below is the one shipped, anything else implementing the trait
/// can stand in for it.
pub trait NodeStore {
    /// Identifier recorded in metadata as the chunk's `node`.
    fn id(&self) -> &str;

    /// Write `data` as object `name`, replacing any previous object.
    fn write(&self, name: &str, data: &[u8]) -> io::Result<()>;

    fn read(&self, name: &str) -> io::Result<Vec<u8>>;

    fn exists(&self, name: &str) -> bool;

    /// Address a node by an id found in metadata that is not among the
    /// configured nodes. Backends that cannot do this return `None`.
    fn locate(_id: &str) -> Option<Self>
    where
        Self: Sized,
    {
        None
    }
}

/// A node backed by a local directory.
#[derive(Clone, Debug)]
pub struct DirNode {
    id: String,
    root: PathBuf,
}

impl DirNode {
    /// Open the node at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self::unchecked(root))
    }

    /// Address an existing node directory without touching the filesystem.
    pub fn unchecked(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            id: root.to_string_lossy().into_owned(),
            root,
        }
    }

    pub fn object_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl NodeStore for DirNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        let mut f = File::create(self.object_path(name))?;
        f.write_all(data)?;
        f.flush()
    }

    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.object_path(name))
    }

    fn exists(&self, name: &str) -> bool {
        self.object_path(name).is_file()
    }

    fn locate(id: &str) -> Option<Self> {
        Some(Self::unchecked(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_overwrite() {
        let td = tempfile::tempdir().unwrap();
        let node = DirNode::open(td.path().join("node1")).unwrap();
        assert!(!node.exists("a.chunk0"));
        node.write("a.chunk0", b"first version").unwrap();
        node.write("a.chunk0", b"second").unwrap();
        assert!(node.exists("a.chunk0"));
        assert_eq!(node.read("a.chunk0").unwrap(), b"second");
    }

    #[test]
    fn id_is_the_directory_path() {
        let node = DirNode::unchecked("node2_storage");
        assert_eq!(node.id(), "node2_storage");
        assert_eq!(node.object_path("x.chunk3"), Path::new("node2_storage").join("x.chunk3"));
    }
}
