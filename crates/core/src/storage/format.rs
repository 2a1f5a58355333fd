use crate::errors::CoreError;

/// Magic bytes identifying an FTDS (Finance Tracker Document Snapshot) file.
pub const MAGIC: &[u8; 4] = b"FTDS";

/// Current file format version.
pub const CURRENT_VERSION: u16 = 1;

/// Header size in bytes: magic(4) + version(2) + payload_len(8) = 14
pub const MIN_HEADER_SIZE: usize = 14;

/// Header read from a snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u16,
    pub payload_len: u64,
}

/// Write a complete snapshot file to bytes.
///
/// Layout:
/// ```text
/// [FTDS: 4B] [version: 2B LE] [payload_len: 8B LE] [payload: JSON, variable]
/// ```
pub fn write_file(version: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MIN_HEADER_SIZE + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&version.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Parse the header from raw file bytes.
/// Returns the header and the payload slice.
pub fn read_file(data: &[u8]) -> Result<(FileHeader, &[u8]), CoreError> {
    if data.len() < MIN_HEADER_SIZE {
        return Err(CoreError::InvalidFileFormat(
            "File too small to be a valid FTDS file".into(),
        ));
    }

    if &data[0..4] != MAGIC {
        return Err(CoreError::InvalidFileFormat(
            "Invalid magic bytes: not an FTDS file".into(),
        ));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version == 0 || version > CURRENT_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let payload_len = u64::from_le_bytes(
        data[6..MIN_HEADER_SIZE]
            .try_into()
            .map_err(|_| CoreError::InvalidFileFormat("Failed to read payload length".into()))?,
    );

    let available = (data.len() - MIN_HEADER_SIZE) as u64;
    if available < payload_len {
        return Err(CoreError::InvalidFileFormat(format!(
            "File truncated: expected {payload_len} bytes of payload, got {available}"
        )));
    }

    let end = MIN_HEADER_SIZE + payload_len as usize;
    Ok((
        FileHeader {
            version,
            payload_len,
        },
        &data[MIN_HEADER_SIZE..end],
    ))
}
