//! Memory-mapped file scanning: maps one input file and hands its bytes to
//! a [`Codec`] for record iteration, the way `giga-segy-in`'s
//! `memory_map.rs` maps a SEG-Y file before parsing headers out of it.
use memmap2::Mmap;
use mseed_prune_core::codec::{Codec, RawRecord};
use mseed_prune_core::errors::PruneError;

/// A memory-mapped input file, kept alive alongside its underlying handle
/// for as long as records referencing it may be read.
pub struct MappedFile {
    map: Mmap,
    _file: std::fs::File,
}

impl MappedFile {
    pub fn open(path: &str) -> Result<Self, PruneError> {
        let file = std::fs::File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(PruneError::FileTooShort {
                path: path.to_string(),
            });
        }
        let map = unsafe { Mmap::map(&file).map_err(PruneError::MapFile)? };
        Ok(MappedFile { map, _file: file })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate this file's records via `codec`.
    pub fn scan<'a, C: Codec>(
        &'a self,
        codec: &'a C,
    ) -> Box<dyn Iterator<Item = Result<RawRecord, PruneError>> + 'a> {
        codec.iter_records(&self.map)
    }
}
