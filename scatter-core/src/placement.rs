use crate::config::ScatterConfig;
use crate::error::{Result, ScatterError};
use crate::metadata::{ChunkRecord, FileEntry, MetadataStore};
use crate::naming::{base_name, chunk_name, validate_object_name};
use crate::node::{DirNode, NodeStore};
use std::fmt;
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;

/// Node position for chunk `index` among `node_count` nodes.
pub fn round_robin(index: usize, node_count: usize) -> usize {
    index % node_count
}

/// Summary of a completed store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReport {
    pub name: String,
    pub size: u64,
    pub chunks: usize,
}

/// Result of a retrieve. Only `Retrieved` is a success; every other variant
/// may have left a partial destination file behind (except `NotRegistered`,
/// which never touches the destination).
#[derive(Debug)]
pub enum RetrieveOutcome {
    Retrieved { bytes: u64, chunks: usize },
    NotRegistered,
    MissingChunk { record: ChunkRecord },
    Failed(ScatterError),
}

impl RetrieveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RetrieveOutcome::Retrieved { .. })
    }
}

impl fmt::Display for RetrieveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrieveOutcome::Retrieved { bytes, chunks } => {
                write!(f, "retrieved {} bytes from {} chunks", bytes, chunks)
            }
            RetrieveOutcome::NotRegistered => write!(f, "not found in metadata"),
            RetrieveOutcome::MissingChunk { record } => {
                let path = Path::new(&record.node).join(&record.chunk_name);
                write!(f, "missing chunk: {}", path.display())
            }
            RetrieveOutcome::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Splits files into fixed-size chunks, places them round-robin across a
/// fixed node list and reassembles them from the metadata index.
#[derive(Debug)]
pub struct ChunkPlacer<N: NodeStore = DirNode> {
    nodes: Vec<N>,
    chunk_size: usize,
    metadata: MetadataStore,
}

impl ChunkPlacer<DirNode> {
    /// Create node directories and load the metadata document.
    pub fn from_config(cfg: &ScatterConfig) -> Result<Self> {
        cfg.validate()?;
        let mut nodes = Vec::with_capacity(cfg.nodes.len());
        for dir in &cfg.nodes {
            nodes.push(DirNode::open(dir)?);
        }
        let metadata = MetadataStore::load(&cfg.metadata_path)?;
        Self::new(nodes, cfg.chunk_size, metadata)
    }
}

impl<N: NodeStore> ChunkPlacer<N> {
    pub fn new(nodes: Vec<N>, chunk_size: usize, metadata: MetadataStore) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ScatterError::InvalidConfig("chunk size must be non-zero".into()));
        }
        if nodes.is_empty() {
            return Err(ScatterError::InvalidConfig("at least one node is required".into()));
        }
        Ok(Self {
            nodes,
            chunk_size,
            metadata,
        })
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Store `source` under its base name.
    pub fn store(&mut self, source: &Path) -> Result<StoreReport> {
        let name = base_name(source)?;
        self.store_as(source, &name)
    }

    /// Store `source` under an explicit name.
    ///
    /// Chunks are written first; metadata is only updated once every chunk
    /// landed, so a failed store leaves the previous entry intact.
    pub fn store_as(&mut self, source: &Path, name: &str) -> Result<StoreReport> {
        validate_object_name(name)?;
        let not_found = |e: io::Error| ScatterError::SourceNotFound {
            path: source.to_path_buf(),
            source: e,
        };
        let mut f = File::open(source).map_err(not_found)?;
        let meta = f.metadata().map_err(not_found)?;
        if !meta.is_file() {
            let e = io::Error::new(ErrorKind::InvalidInput, "not a regular file");
            return Err(not_found(e));
        }
        let size = meta.len();

        // buffer grows with what is read, never to chunk_size up front
        let mut buf = Vec::new();
        let mut chunks = Vec::new();
        loop {
            buf.clear();
            (&mut f).take(self.chunk_size as u64).read_to_end(&mut buf)?;
            if buf.is_empty() {
                break;
            }
            let idx = chunks.len();
            let node = &self.nodes[round_robin(idx, self.nodes.len())];
            let cname = chunk_name(name, idx);
            node.write(&cname, &buf).map_err(|source| ScatterError::NodeWriteFailure {
                node: node.id().to_string(),
                chunk: cname.clone(),
                source,
            })?;
            tracing::debug!(chunk = %cname, node = node.id(), len = buf.len(), "placed chunk");
            chunks.push(ChunkRecord {
                node: node.id().to_string(),
                chunk_name: cname,
            });
        }

        let count = chunks.len();
        self.metadata.put(name, FileEntry { size, chunks })?;
        tracing::info!(file = name, size, chunks = count, "stored file");
        Ok(StoreReport {
            name: name.to_string(),
            size,
            chunks: count,
        })
    }

    /// Reassemble `name` into `dest`, truncating it first.
    ///
    /// Never returns an error: an unknown name, a missing chunk or an I/O
    /// failure is reported through the outcome. A missing chunk aborts the
    /// copy and leaves the bytes written so far in `dest`.
    pub fn retrieve(&self, name: &str, dest: &Path) -> RetrieveOutcome {
        let Some(entry) = self.metadata.get(name) else {
            tracing::warn!(file = name, "file not found in metadata");
            return RetrieveOutcome::NotRegistered;
        };
        let mut out = match File::create(dest) {
            Ok(f) => f,
            Err(e) => return RetrieveOutcome::Failed(ScatterError::Io(e)),
        };

        let mut bytes = 0u64;
        for record in &entry.chunks {
            if let Err(e) = validate_object_name(&record.chunk_name) {
                return RetrieveOutcome::Failed(e);
            }
            let data = self
                .with_node(&record.node, |n| {
                    n.exists(&record.chunk_name).then(|| n.read(&record.chunk_name))
                })
                .flatten();
            let data = match data {
                None => {
                    tracing::warn!(
                        file = name,
                        node = %record.node,
                        chunk = %record.chunk_name,
                        "missing chunk"
                    );
                    return RetrieveOutcome::MissingChunk {
                        record: record.clone(),
                    };
                }
                Some(Err(source)) => {
                    return RetrieveOutcome::Failed(ScatterError::ChunkRead {
                        node: record.node.clone(),
                        chunk: record.chunk_name.clone(),
                        source,
                    })
                }
                Some(Ok(data)) => data,
            };
            if let Err(e) = out.write_all(&data) {
                return RetrieveOutcome::Failed(ScatterError::Io(e));
            }
            bytes += data.len() as u64;
        }
        if let Err(e) = out.flush() {
            return RetrieveOutcome::Failed(ScatterError::Io(e));
        }
        tracing::info!(file = name, dest = %dest.display(), bytes, "retrieved file");
        RetrieveOutcome::Retrieved {
            bytes,
            chunks: entry.chunks.len(),
        }
    }

    pub fn list_files(&self) -> Vec<String> {
        self.metadata.list_names()
    }

    pub fn entry(&self, name: &str) -> Option<&FileEntry> {
        self.metadata.get(name)
    }

    /// Whether the object a record points at is present on its node.
    pub fn chunk_exists(&self, record: &ChunkRecord) -> bool {
        validate_object_name(&record.chunk_name).is_ok()
            && self.with_node(&record.node, |n| n.exists(&record.chunk_name)).unwrap_or(false)
    }

    // Records may name nodes outside the configured list (the list changed
    // since the store); fall back to the backend's own addressing for those.
    fn with_node<R>(&self, id: &str, f: impl FnOnce(&N) -> R) -> Option<R> {
        if let Some(n) = self.nodes.iter().find(|n| n.id() == id) {
            return Some(f(n));
        }
        N::locate(id).map(|n| f(&n))
    }
}
