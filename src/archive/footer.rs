/// Marks the end of every standalone executable.
pub const MAGIC: &[u8; 8] = b"lunepack";

/// Byte length of the footer, it always sits at the very end of the file.
pub const FOOTER_LEN: usize = 16;

/**
    Fixed-size footer of a standalone executable.

    Holds the absolute offset at which the archive starts, followed by
    [`MAGIC`]. Since it is anchored to the end of the file, the stub binary
    in front of the archive may change size freely between versions.

    ```text
    [stub bytes][archive][offset: u64 LE][MAGIC]
    ```
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub archive_offset: u64,
}

impl Footer {
    #[must_use]
    pub fn new(archive_offset: u64) -> Self {
        Self { archive_offset }
    }

    /**
        Tries to read a footer from the given bytes, which must be
        exactly [`FOOTER_LEN`] long, usually the tail of a file.

        Returns `None` if the bytes do not end with [`MAGIC`].
    */
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != FOOTER_LEN || !bytes.ends_with(MAGIC) {
            return None;
        }
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&bytes[..8]);
        Some(Self {
            archive_offset: u64::from_le_bytes(offset),
        })
    }

    /**
        Reads the footer at the end of the given image, if there is one.
    */
    #[must_use]
    pub fn from_image(image: &[u8]) -> Option<Self> {
        let start = image.len().checked_sub(FOOTER_LEN)?;
        Self::from_bytes(&image[start..])
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; FOOTER_LEN] {
        let mut bytes = [0u8; FOOTER_LEN];
        bytes[..8].copy_from_slice(&self.archive_offset.to_le_bytes());
        bytes[8..].copy_from_slice(MAGIC);
        bytes
    }
}
