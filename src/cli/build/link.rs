use lunepack::archive::{Footer, FOOTER_LEN};

/**
    Returns the stub part of an executable image, without any archive
    that may have been appended to it by an earlier build.
*/
pub fn strip_payload(image: &[u8]) -> &[u8] {
    let payload_end = image.len().saturating_sub(FOOTER_LEN);
    match Footer::from_image(image).and_then(|footer| usize::try_from(footer.archive_offset).ok()) {
        Some(offset) if offset <= payload_end => &image[..offset],
        _ => image,
    }
}

/**
    Creates a standalone executable image, from a stub
    executable and the serialized archive to append to it.

    ```text
    [stub][archive][footer]
    ```
*/
pub fn link(stub: &[u8], archive: &[u8]) -> Vec<u8> {
    let stub = strip_payload(stub);
    let footer = Footer::new(stub.len() as u64);

    let mut image = Vec::with_capacity(stub.len() + archive.len() + FOOTER_LEN);
    image.extend_from_slice(stub);
    image.extend_from_slice(archive);
    image.extend_from_slice(&footer.to_bytes());
    image
}

#[cfg(test)]
mod tests {
    use lunepack::archive::MAGIC;

    use super::*;

    #[test]
    fn footer_points_at_the_archive() {
        let image = link(b"STUB", b"ARCHIVE");
        assert_eq!(&image[..11], b"STUBARCHIVE");
        assert!(image.ends_with(MAGIC));

        let footer = Footer::from_image(&image).unwrap();
        assert_eq!(footer.archive_offset, 4);
    }

    #[test]
    fn relinking_replaces_the_previous_archive() {
        let first = link(b"STUB", b"OLD ARCHIVE");
        assert_eq!(strip_payload(&first), b"STUB");
        assert_eq!(link(&first, b"NEW"), link(b"STUB", b"NEW"));
        assert_eq!(strip_payload(b"plain binary"), b"plain binary");
    }
}
