//! Cheap file identity: `(size, fast_hash)` plus mtime, used to recognize the same
//! physical file across moves without re-reading the whole thing.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// How much of the file's leading bytes feed the fingerprint. Cheap but enough to
/// distinguish unrelated files of the same size; this is an identity hint, not a
/// content-integrity check.
const FAST_HASH_PREFIX_BYTES: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProbe {
    pub size: u64,
    pub mtime: i64,
    pub fast_hash: String,
}

/// Probe a file's `(size, mtime, fast_hash)`. Surfaces I/O errors as `ScanError` so
/// callers can decide whether a probe failure is transient (skip the file, keep
/// scanning) or fatal.
pub fn probe(path: &Path) -> Result<FileProbe, std::io::Error> {
    let mut file = File::open(path)?;
    let metadata = file.metadata()?;
    let size = metadata.len();
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let mut buf = vec![0u8; FAST_HASH_PREFIX_BYTES.min(size as usize)];
    let mut read = 0;
    while read < buf.len() {
        let n = file.read(&mut buf[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }
    buf.truncate(read);

    let fast_hash = blake3::hash(&buf).to_hex().to_string();

    Ok(FileProbe {
        size,
        mtime,
        fast_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn probe_reports_size_and_stable_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mkv");
        std::fs::write(&path, b"hello world").unwrap();

        let p1 = probe(&path).unwrap();
        assert_eq!(p1.size, 11);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b" more").unwrap();
        drop(f);

        let p2 = probe(&path).unwrap();
        assert_eq!(p2.size, 16);
        assert_ne!(p1.fast_hash, p2.fast_hash);
    }

    #[test]
    fn identical_content_same_identity() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mkv");
        let b = dir.path().join("b.mkv");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let pa = probe(&a).unwrap();
        let pb = probe(&b).unwrap();
        assert_eq!(pa.size, pb.size);
        assert_eq!(pa.fast_hash, pb.fast_hash);
    }
}
