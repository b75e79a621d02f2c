use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use quarry_shared::chunk::ChunkProxy;
use quarry_shared::coords::ChunkPos;
use tracing::debug;

use crate::rle;

const CHUNK_FILE_PREFIX: &str = "chunk.";
const CHUNK_FILE_EXTENSION: &str = "rle";

/// One file per chunk coordinate, each holding nothing but the RLE stream of
/// the chunk's block types. A missing file means the chunk was never saved.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_path(&self, pos: ChunkPos) -> PathBuf {
        self.root.join(chunk_file_name(pos))
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.chunk_path(pos).is_file()
    }

    /// Fills `proxy` from its saved file. Returns `Ok(false)` when no file
    /// exists and `InvalidData` when the file does not decode to a full chunk;
    /// in both cases the proxy contents are unspecified.
    pub fn load_into(&self, proxy: &mut ChunkProxy) -> io::Result<bool> {
        let path = self.chunk_path(proxy.coords);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };

        rle::decode_into(&bytes, proxy.as_mut_slice()).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to decode {}: {err}", path.display()),
            )
        })?;

        debug!(
            "Loaded chunk ({}, {}) from {} ({} bytes)",
            proxy.coords.x,
            proxy.coords.y,
            path.display(),
            bytes.len()
        );
        Ok(true)
    }

    /// Writes the proxy through a temporary file so a crash mid-write never
    /// leaves a truncated stream behind.
    pub fn save(&self, proxy: &ChunkProxy) -> io::Result<()> {
        let path = self.chunk_path(proxy.coords);
        let encoded = rle::encode(proxy.as_slice());

        let staging = path.with_extension("tmp");
        fs::write(&staging, &encoded)?;
        fs::rename(&staging, &path)?;

        debug!(
            "Saved chunk ({}, {}) to {} ({} bytes)",
            proxy.coords.x,
            proxy.coords.y,
            path.display(),
            encoded.len()
        );
        Ok(())
    }

    pub fn chunk_positions(&self) -> io::Result<Vec<ChunkPos>> {
        let mut positions = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(pos) = entry.file_name().to_str().and_then(parse_chunk_file_name) {
                positions.push(pos);
            }
        }
        positions.sort_by_key(|pos| (pos.x, pos.y));
        Ok(positions)
    }
}

pub fn chunk_file_name(pos: ChunkPos) -> String {
    format!("{CHUNK_FILE_PREFIX}{}.{}.{CHUNK_FILE_EXTENSION}", pos.x, pos.y)
}

pub fn parse_chunk_file_name(name: &str) -> Option<ChunkPos> {
    let coords = name
        .strip_prefix(CHUNK_FILE_PREFIX)?
        .strip_suffix(CHUNK_FILE_EXTENSION)?
        .strip_suffix('.')?;
    let (x, y) = coords.split_once('.')?;
    Some(ChunkPos::new(x.parse().ok()?, y.parse().ok()?))
}
