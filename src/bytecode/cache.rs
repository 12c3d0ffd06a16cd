//! On-disk compile cache: the CLI stores compiled bytecode next to the
//! source file and reuses it while the source digest matches.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::bytecode::bytecode::Bytecode;
use crate::modules::ModuleMap;

const CACHE_MAGIC: &[u8; 4] = b"RILC";
const CACHE_FORMAT_VERSION: u16 = 1;

pub fn hash_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Cache file path for a source file: the source path with `c` appended
/// (`fib.rill` -> `fib.rillc`).
pub fn cache_path(source_path: &Path) -> PathBuf {
    let mut name = source_path.as_os_str().to_os_string();
    name.push("c");
    PathBuf::from(name)
}

pub fn write_cache(path: &Path, source: &[u8], bytecode: &Bytecode) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(CACHE_MAGIC)?;
    w.write_all(&CACHE_FORMAT_VERSION.to_le_bytes())?;
    w.write_all(&hash_bytes(source))?;
    bytecode.encode(&mut w)?;
    w.flush()
}

/// Loads the cached bytecode if the cache exists, has the right format, and
/// its digest matches the current source. Any mismatch reads as a miss, not
/// an error.
pub fn load_cache(path: &Path, source: &[u8], modules: Option<&ModuleMap>) -> Option<Bytecode> {
    let mut r = BufReader::new(File::open(path).ok()?);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).ok()?;
    if &magic != CACHE_MAGIC {
        return None;
    }
    let mut version = [0u8; 2];
    r.read_exact(&mut version).ok()?;
    if u16::from_le_bytes(version) != CACHE_FORMAT_VERSION {
        return None;
    }
    let mut digest = [0u8; 32];
    r.read_exact(&mut digest).ok()?;
    if digest != hash_bytes(source) {
        return None;
    }
    Bytecode::decode(&mut r, modules).ok()
}
