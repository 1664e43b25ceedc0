use crate::metadata::ChunkRecord;
use crate::node::NodeStore;
use crate::placement::ChunkPlacer;

#[derive(Debug, Clone)]
pub struct CheckReport {
    pub name: String,
    pub size: u64,
    pub chunks_present: usize,
    pub missing: Vec<ChunkRecord>,
}

impl CheckReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check that every chunk recorded for `name` exists on its node.
/// Contents are not read. Returns `None` for an unknown name.
pub fn check<N: NodeStore>(placer: &ChunkPlacer<N>, name: &str) -> Option<CheckReport> {
    let entry = placer.entry(name)?;
    let mut chunks_present = 0usize;
    let mut missing = Vec::new();
    for record in &entry.chunks {
        if placer.chunk_exists(record) {
            chunks_present += 1;
        } else {
            missing.push(record.clone());
        }
    }
    Some(CheckReport {
        name: name.to_string(),
        size: entry.size,
        chunks_present,
        missing,
    })
}
