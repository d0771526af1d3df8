pub mod codec;

use thiserror::Error;

/// Magic prefix of every snapshot blob.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"AVLN";

/// Container format version this crate reads and writes.
pub const FORMAT_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

/// Hard cap on TLV fields per blob; keeps parsing bounded on garbage input.
const MAX_FIELDS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotVersion {
    pub major: u16,
    pub minor: u16,
}

impl SnapshotVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl std::fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot truncated")]
    UnexpectedEof,
    #[error("bad snapshot magic")]
    InvalidMagic,
    #[error("snapshot is for device {found:?}, expected {expected:?}")]
    DeviceIdMismatch { expected: [u8; 4], found: [u8; 4] },
    #[error("unsupported snapshot format version {found} (supported {supported})")]
    UnsupportedFormatVersion {
        found: SnapshotVersion,
        supported: SnapshotVersion,
    },
    #[error("unsupported device snapshot major version {found} (supported {supported})")]
    UnsupportedDeviceMajorVersion { found: u16, supported: u16 },
    #[error("duplicate snapshot field tag {0}")]
    DuplicateFieldTag(u16),
    #[error("invalid snapshot field encoding: {0}")]
    InvalidFieldEncoding(&'static str),
}

/// A device that can publish and restore its state as a snapshot blob.
pub trait IoSnapshot {
    const DEVICE_ID: [u8; 4];
    const DEVICE_VERSION: SnapshotVersion;

    fn save_state(&self) -> Vec<u8>;
    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError>;
}

/// Serializes one device blob: header then `field_*` calls in tag order of
/// the caller's choosing, then [`SnapshotWriter::finish`].
pub struct SnapshotWriter {
    out: Vec<u8>,
}

impl SnapshotWriter {
    pub fn new(device_id: [u8; 4], device_version: SnapshotVersion) -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(&SNAPSHOT_MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.major.to_le_bytes());
        out.extend_from_slice(&FORMAT_VERSION.minor.to_le_bytes());
        out.extend_from_slice(&device_id);
        out.extend_from_slice(&device_version.major.to_le_bytes());
        out.extend_from_slice(&device_version.minor.to_le_bytes());
        Self { out }
    }

    pub fn field_bytes(&mut self, tag: u16, bytes: Vec<u8>) {
        self.out.extend_from_slice(&tag.to_le_bytes());
        self.out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.out.extend_from_slice(&bytes);
    }

    pub fn field_u32(&mut self, tag: u16, value: u32) {
        self.field_bytes(tag, value.to_le_bytes().to_vec());
    }

    pub fn field_u16(&mut self, tag: u16, value: u16) {
        self.field_bytes(tag, value.to_le_bytes().to_vec());
    }

    pub fn field_u8(&mut self, tag: u16, value: u8) {
        self.field_bytes(tag, vec![value]);
    }

    pub fn field_bool(&mut self, tag: u16, value: bool) {
        self.field_u8(tag, value as u8);
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

/// Parses a device blob's header and TLV fields up front, then hands out
/// fields by tag. Unknown tags are ignored; duplicates are an error.
#[derive(Debug)]
pub struct SnapshotReader<'a> {
    pub device_version: SnapshotVersion,
    fields: Vec<(u16, &'a [u8])>,
}

impl<'a> SnapshotReader<'a> {
    pub fn parse(
        bytes: &'a [u8],
        expected_id: [u8; 4],
        supported: SnapshotVersion,
    ) -> Result<Self, SnapshotError> {
        let mut d = codec::Decoder::new(bytes);
        let magic = d.array::<4>()?;
        if magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic);
        }
        let fmt = SnapshotVersion::new(d.u16()?, d.u16()?);
        if fmt.major != FORMAT_VERSION.major {
            return Err(SnapshotError::UnsupportedFormatVersion {
                found: fmt,
                supported: FORMAT_VERSION,
            });
        }
        let id = d.array::<4>()?;
        if id != expected_id {
            return Err(SnapshotError::DeviceIdMismatch {
                expected: expected_id,
                found: id,
            });
        }
        let device_version = SnapshotVersion::new(d.u16()?, d.u16()?);
        if device_version.major != supported.major {
            return Err(SnapshotError::UnsupportedDeviceMajorVersion {
                found: device_version.major,
                supported: supported.major,
            });
        }

        let mut fields: Vec<(u16, &[u8])> = Vec::new();
        while !d.is_empty() {
            if fields.len() >= MAX_FIELDS {
                return Err(SnapshotError::InvalidFieldEncoding("too many fields"));
            }
            let tag = d.u16()?;
            let len = d.u32()? as usize;
            let body = d.bytes(len)?;
            if fields.iter().any(|&(t, _)| t == tag) {
                return Err(SnapshotError::DuplicateFieldTag(tag));
            }
            fields.push((tag, body));
        }
        Ok(Self {
            device_version,
            fields,
        })
    }

    pub fn field_bytes(&self, tag: u16) -> Option<&'a [u8]> {
        self.fields.iter().find(|&&(t, _)| t == tag).map(|&(_, b)| b)
    }

    /// Fixed-width field access; a present field with the wrong width is a
    /// corrupt blob, reported with the caller's context string.
    pub fn field_u32(&self, tag: u16, ctx: &'static str) -> Result<Option<u32>, SnapshotError> {
        match self.field_bytes(tag) {
            None => Ok(None),
            Some(b) => {
                let arr: [u8; 4] = b
                    .try_into()
                    .map_err(|_| SnapshotError::InvalidFieldEncoding(ctx))?;
                Ok(Some(u32::from_le_bytes(arr)))
            }
        }
    }

    pub fn field_u16(&self, tag: u16, ctx: &'static str) -> Result<Option<u16>, SnapshotError> {
        match self.field_bytes(tag) {
            None => Ok(None),
            Some(b) => {
                let arr: [u8; 2] = b
                    .try_into()
                    .map_err(|_| SnapshotError::InvalidFieldEncoding(ctx))?;
                Ok(Some(u16::from_le_bytes(arr)))
            }
        }
    }

    pub fn field_u8(&self, tag: u16, ctx: &'static str) -> Result<Option<u8>, SnapshotError> {
        match self.field_bytes(tag) {
            None => Ok(None),
            Some(&[v]) => Ok(Some(v)),
            Some(_) => Err(SnapshotError::InvalidFieldEncoding(ctx)),
        }
    }

    pub fn field_bool(&self, tag: u16, ctx: &'static str) -> Result<Option<bool>, SnapshotError> {
        match self.field_u8(tag, ctx)? {
            None => Ok(None),
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            Some(_) => Err(SnapshotError::InvalidFieldEncoding(ctx)),
        }
    }
}
