use crate::core::error::{Error, Result};
use crate::core::storage::{map_io_error, ObjectStore};
use flate2::bufread::GzDecoder;
use std::io::Read;
use tracing::debug;

/// Reads a whole gzip-compressed object and returns its text.
pub fn read_gzip_text<S: ObjectStore + ?Sized>(store: &S, object_id: &str) -> Result<String> {
    let mut compressed = Vec::new();
    store
        .open_for_read(object_id)?
        .read_to_end(&mut compressed)
        .map_err(|err| map_io_error(object_id, err))?;

    let text = gunzip_text(object_id, &compressed)?;
    debug!(
        object_id,
        compressed_bytes = compressed.len(),
        text_bytes = text.len(),
        "decompressed object"
    );
    Ok(text)
}

/// Decompresses `bytes` (zero or more gzip members) and decodes them as UTF-8.
///
/// NUL padding between or after members is skipped. An empty object yields
/// empty text.
pub fn gunzip_text(object_id: &str, bytes: &[u8]) -> Result<String> {
    let mut decompressed = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let mut member = GzDecoder::new(rest);
        member
            .read_to_end(&mut decompressed)
            .map_err(|source| Error::Decompression {
                object_id: object_id.to_string(),
                source,
            })?;
        rest = member.into_inner();
        let padding = rest.iter().take_while(|byte| **byte == 0).count();
        rest = &rest[padding..];
    }

    String::from_utf8(decompressed).map_err(|source| Error::Encoding {
        object_id: object_id.to_string(),
        source,
    })
}

#[cfg(test)]
pub(crate) fn gzip(text: &str) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).expect("gzip write");
    encoder.finish().expect("gzip finish")
}
