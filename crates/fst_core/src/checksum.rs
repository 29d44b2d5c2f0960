//! MD5 checksums for metadata posts and stored media files.
//!
//! Digests are lowercase hex over raw bytes. Files are hashed streaming in
//! 8 KiB chunks so large PDFs never sit fully in memory.

use md5::{Digest, Md5};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 8 * 1024;

/// Returns the lowercase MD5 hex digest of `bytes`.
pub fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Returns the lowercase MD5 hex digest of the file at `path`.
pub fn file_md5(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    md5_reader(&mut file)
}

/// Hashes everything readable from `reader`.
pub fn md5_reader(reader: &mut impl Read) -> std::io::Result<String> {
    let mut hasher = Md5::new();
    let mut buffer = [0_u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::{file_md5, md5_hex, md5_reader};
    use std::io::Cursor;

    #[test]
    fn md5_hex_matches_known_vectors() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn streaming_digest_equals_one_shot_across_chunks() {
        let payload = vec![b'x'; 3 * 8192 + 17];
        let streamed = md5_reader(&mut Cursor::new(payload.as_slice())).unwrap();
        assert_eq!(streamed, md5_hex(&payload));
    }

    #[test]
    fn file_md5_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();
        assert_eq!(file_md5(&path).unwrap(), md5_hex(b"%PDF-1.4 test"));
    }
}
