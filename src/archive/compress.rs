/*!
    Whole-payload compression.

    The payload is always compressed as one unit, never per entry, so
    the launcher either decompresses everything up front or nothing.
*/

use super::result::{PayloadError, PayloadResult};

/// The size prefix is a `u32`, larger payloads can only be stored uncompressed.
pub const MAX_PAYLOAD_LEN: u64 = u32::MAX as u64;

/**
    Checks that a payload of the given length fits behind the size prefix.
*/
pub fn ensure_compressible(len: u64) -> PayloadResult<()> {
    if len > MAX_PAYLOAD_LEN {
        Err(PayloadError::TooLargeToCompress {
            len,
            max: MAX_PAYLOAD_LEN,
        })
    } else {
        Ok(())
    }
}

/**
    Compresses the given bytes, prefixing them with their uncompressed size.

    # Errors

    Errors if there are more bytes than the size prefix can describe.
*/
pub fn compress(bytes: &[u8]) -> PayloadResult<Vec<u8>> {
    ensure_compressible(bytes.len() as u64)?;
    Ok(lz4_flex::compress_prepend_size(bytes))
}

/**
    Decompresses bytes produced by [`compress`].

    The size prefix must match `expected_len`, so that a corrupt
    payload can not make us allocate an arbitrary amount of memory.
*/
pub fn decompress(bytes: &[u8], expected_len: u64) -> PayloadResult<Vec<u8>> {
    let Some(prefix) = bytes.get(..4) else {
        return Err(PayloadError::Truncated);
    };
    let prefix = u64::from(u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]));
    if prefix != expected_len {
        return Err(PayloadError::PayloadLength {
            expected: expected_len,
            actual: prefix,
        });
    }
    Ok(lz4_flex::decompress_size_prepended(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_size_prefix() {
        let compressed = compress(b"print('hello')").unwrap();
        assert_eq!(decompress(&compressed, 14).unwrap(), b"print('hello')");
        assert!(matches!(
            decompress(&compressed, 1 << 40),
            Err(PayloadError::PayloadLength { .. })
        ));
        assert!(matches!(decompress(&[], 0), Err(PayloadError::Truncated)));
    }

    #[test]
    fn payloads_must_fit_the_size_prefix() {
        assert!(ensure_compressible(MAX_PAYLOAD_LEN).is_ok());
        assert!(matches!(
            ensure_compressible(MAX_PAYLOAD_LEN + 1),
            Err(PayloadError::TooLargeToCompress { .. })
        ));
    }
}
