/*!
    The archive that gets appended to a stub binary to form a standalone executable.

    ```text
    [header length: u64 LE][header: JSON manifest + entry table][payload]
    ```

    The payload is the concatenation of every file in the archive,
    optionally compressed as a whole, see [`compress`].
*/

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::utils::path::join_archive_path;

pub mod compress;
pub mod footer;
pub mod manifest;
pub mod result;

pub use self::footer::{Footer, FOOTER_LEN, MAGIC};
pub use self::manifest::Manifest;
pub use self::result::{PayloadError, PayloadResult};

/**
    A single file stored in the archive payload.
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Archive-relative, `/`-separated path of the file.
    pub path: String,
    /// Offset of the file contents in the uncompressed payload.
    pub offset: u64,
    /// Length of the file contents.
    pub len: u64,
    /// Whether the file should be extracted with the executable bit set.
    pub executable: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveHeader {
    manifest: Manifest,
    entries: Vec<ArchiveEntry>,
    payload_len: u64,
}

/**
    Incrementally collects files into a new [`Archive`].
*/
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<ArchiveEntry>,
    paths: HashSet<String>,
    payload: Vec<u8>,
}

impl ArchiveBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Appends a file to the payload.

        # Errors

        Errors if the path is not a plain relative path, or if
        a file has already been added at the same path.
    */
    pub fn add_file(
        &mut self,
        path: impl Into<String>,
        contents: &[u8],
        executable: bool,
    ) -> PayloadResult<&mut Self> {
        let path = path.into();
        validate_path(&path)?;
        if !self.paths.insert(path.clone()) {
            return Err(PayloadError::DuplicatePath(path));
        }

        self.entries.push(ArchiveEntry {
            path,
            offset: self.payload.len() as u64,
            len: contents.len() as u64,
            executable,
        });
        self.payload.extend_from_slice(contents);

        Ok(self)
    }

    /**
        Finishes the archive using the given manifest.
    */
    #[must_use]
    pub fn finish(self, manifest: Manifest) -> Archive {
        Archive {
            manifest,
            entries: self.entries,
            payload: self.payload,
        }
    }
}

/**
    A manifest together with the files it describes.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    manifest: Manifest,
    entries: Vec<ArchiveEntry>,
    payload: Vec<u8>,
}

impl Archive {
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /**
        Returns the contents of the given entry.

        Entries are validated to lie inside of the payload
        when the archive is built or read, so this never fails
        for entries that came from this archive.
    */
    #[must_use]
    pub fn contents(&self, entry: &ArchiveEntry) -> &[u8] {
        let start = usize::try_from(entry.offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(usize::try_from(entry.len).unwrap_or(usize::MAX));
        self.payload.get(start..end).unwrap_or_default()
    }

    /**
        Serializes the archive, compressing the payload if the manifest says so.

        # Errors

        Errors if the payload is compressed and too large for its size prefix.
    */
    pub fn to_bytes(&self) -> PayloadResult<Vec<u8>> {
        if self.manifest.compressed {
            compress::ensure_compressible(self.payload.len() as u64)?;
        }

        let header = serde_json::to_vec(&ArchiveHeader {
            manifest: self.manifest.clone(),
            entries: self.entries.clone(),
            payload_len: self.payload.len() as u64,
        })?;

        let mut bytes = Vec::with_capacity(8 + header.len() + self.payload.len());
        bytes.extend_from_slice(&(header.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&header);
        if self.manifest.compressed {
            bytes.extend_from_slice(&compress::compress(&self.payload)?);
        } else {
            bytes.extend_from_slice(&self.payload);
        }

        Ok(bytes)
    }

    /**
        Reads an archive previously written using [`Archive::to_bytes`].

        # Errors

        Errors if the archive is truncated or otherwise malformed, if the payload
        fails to decompress, or if any entry is invalid or out of bounds.
    */
    pub fn from_bytes(bytes: &[u8]) -> PayloadResult<Self> {
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(bytes.get(..8).ok_or(PayloadError::Truncated)?);
        let header_len = u64::from_le_bytes(len_bytes);
        let header_end = usize::try_from(header_len)
            .ok()
            .and_then(|len| len.checked_add(8))
            .filter(|end| *end <= bytes.len())
            .ok_or(PayloadError::Truncated)?;

        let header: ArchiveHeader = serde_json::from_slice(&bytes[8..header_end])?;
        let stored = &bytes[header_end..];

        let payload = if header.manifest.compressed {
            compress::decompress(stored, header.payload_len)?
        } else if stored.len() as u64 == header.payload_len {
            stored.to_vec()
        } else {
            return Err(PayloadError::PayloadLength {
                expected: header.payload_len,
                actual: stored.len() as u64,
            });
        };

        let manifest = header.manifest;
        validate_path(&manifest.entry_script)?;
        validate_path(&manifest.interpreter)?;
        for dir in manifest.search_paths.iter().chain(&manifest.library_paths) {
            validate_path(dir)?;
        }

        let mut seen = HashSet::new();
        for entry in &header.entries {
            validate_path(&entry.path)?;
            if !seen.insert(entry.path.as_str()) {
                return Err(PayloadError::DuplicatePath(entry.path.clone()));
            }
            let end = entry.offset.checked_add(entry.len);
            if end.map_or(true, |end| end > payload.len() as u64) {
                return Err(PayloadError::EntryOutOfBounds(entry.path.clone()));
            }
        }

        Ok(Self {
            manifest,
            entries: header.entries,
            payload,
        })
    }
}

fn validate_path(path: &str) -> PayloadResult<()> {
    if path.is_empty() || join_archive_path("", path).is_none() {
        Err(PayloadError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(compressed: bool) -> Archive {
        let mut builder = ArchiveBuilder::new();
        builder
            .add_file("bin/lunepack", b"\x7fELF interpreter", true)
            .unwrap()
            .add_file("app/main.lua", b"require('util')", false)
            .unwrap()
            .add_file("app/util.lua", b"return {}", false)
            .unwrap();
        builder.finish(Manifest {
            entry_script: "app/main.lua".to_string(),
            interpreter: "bin/lunepack".to_string(),
            search_paths: vec!["app".to_string(), "lib/0".to_string()],
            compressed,
            ..Manifest::default()
        })
    }

    #[test]
    fn reads_back_what_it_writes() {
        for compressed in [false, true] {
            let archive = sample(compressed);
            let read = Archive::from_bytes(&archive.to_bytes().unwrap()).unwrap();
            assert_eq!(read, archive);
            let util = &read.entries()[2];
            assert_eq!(read.contents(util), b"return {}");
            assert!(read.entries()[0].executable);
        }
    }

    #[test]
    fn output_is_deterministic() {
        assert_eq!(
            sample(true).to_bytes().unwrap(),
            sample(true).to_bytes().unwrap()
        );
    }

    #[test]
    fn builder_rejects_duplicates_and_escapes() {
        let mut builder = ArchiveBuilder::new();
        builder.add_file("app/a.lua", b"", false).unwrap();
        assert!(matches!(
            builder.add_file("app/a.lua", b"", false),
            Err(PayloadError::DuplicatePath(_))
        ));
        assert!(matches!(
            builder.add_file("../a.lua", b"", false),
            Err(PayloadError::InvalidPath(_))
        ));
    }

    #[test]
    fn rejects_truncated_and_corrupt_archives() {
        let bytes = sample(false).to_bytes().unwrap();
        assert!(matches!(
            Archive::from_bytes(&bytes[..4]),
            Err(PayloadError::Truncated)
        ));
        assert!(matches!(
            Archive::from_bytes(&bytes[..bytes.len() - 1]),
            Err(PayloadError::PayloadLength { .. })
        ));

        let mut corrupt = bytes.clone();
        corrupt[8] = b'#';
        assert!(matches!(
            Archive::from_bytes(&corrupt),
            Err(PayloadError::Header(_))
        ));
    }
}
