//! The forensic dump: structured crash record with a stable, versioned
//! wire representation.
//!
//! # Wire layout
//!
//! ```text
//! offset  size   field
//! 0       4      magic  = 'MDMP'
//! 4       2      version (big-endian u16, currently 1)
//! 6       1      memory_codec (0=none, 1=deflate)
//! 7       1      flags (bit0 = memory_truncated)
//! 8       8      fuel_consumed   (big-endian u64)
//! 16      8      fuel_remaining  (big-endian u64)
//! 24      8      wall_time_ns    (big-endian u64)
//! 32      8      captured_at_ns  (big-endian u64)
//! 40      —      TLV fields (1-byte tag + 2-byte len + payload;
//!                the memory TLV carries a 4-byte len instead)
//! end     4      crc32 (IEEE) of all preceding bytes
//! ```
//!
//! Decoders skip unknown TLV tags, so new fields (and new cause payloads)
//! can be added without a version bump. Bad magic, unsupported version,
//! truncation, and CRC mismatch are hard rejections.

use std::fmt;
use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use munition_common::{DumpEncodeError, DumpFormatError, TrapError, TrapKind};

use crate::caps::{Capability, CapabilitySet};
use crate::value::Value;

/// Dump file magic.
pub const DUMP_MAGIC: [u8; 4] = *b"MDMP";

/// Current dump format version.
pub const DUMP_VERSION: u16 = 1;

const FLAG_MEMORY_TRUNCATED: u8 = 0b0000_0001;

/// Fixed header size (magic through `captured_at_ns`).
const HEADER_LEN: usize = 40;
/// CRC-32 trailer size.
const TRAILER_LEN: usize = 4;

mod tag {
    pub const CAUSE: u8 = 0x01;
    pub const FUNCTION: u8 = 0x02;
    pub const ARGS: u8 = 0x03;
    pub const REQUESTED_CAPS: u8 = 0x04;
    pub const GRANTED_CAPS: u8 = 0x05;
    pub const GLOBALS: u8 = 0x06;
    pub const NOTE: u8 = 0x07;
    pub const MEMORY: u8 = 0x10;
}

mod cause_id {
    pub const FUEL_EXHAUSTED: u8 = 1;
    pub const TRAP: u8 = 2;
    pub const TIMEOUT: u8 = 3;
    pub const HOST_DENIED: u8 = 4;
    pub const INSTANTIATION_FAILED: u8 = 5;
    pub const INVALID_MODULE: u8 = 6;
}

/// Why an invocation crashed.
#[derive(Debug, Clone, PartialEq)]
pub enum CrashCause {
    /// The fuel budget was exhausted.
    FuelExhausted,
    /// Execution trapped.
    Trap(TrapError),
    /// The wall-clock timeout fired and the engine was interrupted.
    Timeout,
    /// The module imports a host function whose capability was not granted.
    HostDenied {
        /// The capability gating the missing import.
        capability: Capability,
    },
    /// Instantiation failed for a reason other than a denied capability.
    InstantiationFailed {
        /// Description of the failure.
        reason: String,
    },
    /// The bytes were not a valid WebAssembly module.
    InvalidModule {
        /// Compiler diagnostic.
        reason: String,
    },
}

impl CrashCause {
    /// Stable variant label, used in tracing and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            CrashCause::FuelExhausted => "fuel_exhausted",
            CrashCause::Trap(_) => "trap",
            CrashCause::Timeout => "timeout",
            CrashCause::HostDenied { .. } => "host_denied",
            CrashCause::InstantiationFailed { .. } => "instantiation_failed",
            CrashCause::InvalidModule { .. } => "invalid_module",
        }
    }
}

impl fmt::Display for CrashCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashCause::FuelExhausted | CrashCause::Timeout => f.write_str(self.label()),
            CrashCause::Trap(trap) => write!(f, "trap ({}): {}", trap.kind, trap.message),
            CrashCause::HostDenied { capability } => write!(f, "host_denied ({capability})"),
            CrashCause::InstantiationFailed { reason } => {
                write!(f, "instantiation_failed: {reason}")
            }
            CrashCause::InvalidModule { reason } => write!(f, "invalid_module: {reason}"),
        }
    }
}

/// Memory page compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryCodec {
    /// Raw bytes.
    None = 0,
    /// Raw deflate stream.
    Deflate = 1,
}

impl MemoryCodec {
    fn from_byte(byte: u8) -> Result<Self, DumpFormatError> {
        match byte {
            0 => Ok(MemoryCodec::None),
            1 => Ok(MemoryCodec::Deflate),
            codec => Err(DumpFormatError::UnknownCodec { codec }),
        }
    }
}

/// Captured linear memory, stored in its on-wire (possibly compressed) form.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpMemory {
    /// How `data` is encoded.
    pub codec: MemoryCodec,
    /// Whether the capture was clamped below the actual memory size.
    pub truncated: bool,
    /// Encoded page bytes.
    pub data: Vec<u8>,
}

impl DumpMemory {
    /// No memory captured.
    pub fn empty() -> Self {
        Self {
            codec: MemoryCodec::None,
            truncated: false,
            data: Vec::new(),
        }
    }

    /// Compress raw page bytes for storage.
    ///
    /// Falls back to storing raw bytes if compression fails; the codec tag
    /// records which happened.
    pub fn compress(raw: &[u8], truncated: bool) -> Self {
        if raw.is_empty() {
            return Self {
                truncated,
                ..Self::empty()
            };
        }

        let encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        let compressed = write_all_and_finish(encoder, raw);

        match compressed {
            Some(data) => Self {
                codec: MemoryCodec::Deflate,
                truncated,
                data,
            },
            None => Self {
                codec: MemoryCodec::None,
                truncated,
                data: raw.to_vec(),
            },
        }
    }

    /// Inflate back to raw page bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored stream is corrupt.
    pub fn decompressed(&self) -> Result<Vec<u8>, DumpFormatError> {
        match self.codec {
            MemoryCodec::None => Ok(self.data.clone()),
            MemoryCodec::Deflate => {
                let mut out = Vec::new();
                DeflateDecoder::new(self.data.as_slice())
                    .read_to_end(&mut out)
                    .map_err(|_| DumpFormatError::Malformed { what: "memory" })?;
                Ok(out)
            }
        }
    }

    /// Whether no memory was captured.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn write_all_and_finish(mut encoder: DeflateEncoder<Vec<u8>>, raw: &[u8]) -> Option<Vec<u8>> {
    encoder.write_all(raw).ok()?;
    encoder.finish().ok()
}

/// Immutable post-mortem record of a crashed invocation.
///
/// Produced by forensic capture before any cleanup; once built it is never
/// mutated. `requested_capabilities` holds the caller's atoms/aliases
/// verbatim (pre-expansion), `granted_capabilities` the expanded effective
/// set.
#[derive(Debug, Clone, PartialEq)]
pub struct ForensicDump {
    /// Why the invocation crashed.
    pub cause: CrashCause,
    /// Fuel consumed up to the failure.
    pub fuel_consumed: u64,
    /// Fuel left of the budget.
    pub fuel_remaining: u64,
    /// Wall time from invocation start to capture.
    pub wall_time_ns: u64,
    /// Unix timestamp (nanoseconds) of the capture.
    pub captured_at_ns: u64,
    /// The invoked function name.
    pub function: String,
    /// The invocation arguments.
    pub args: Vec<Value>,
    /// Capabilities as the caller requested them, unexpanded.
    pub requested_capabilities: Vec<String>,
    /// The effective granted set.
    pub granted_capabilities: CapabilitySet,
    /// Exported globals at failure, in export order.
    pub globals: Vec<Value>,
    /// Linear memory at failure.
    pub memory: DumpMemory,
    /// Set when capture itself degraded; the primary cause is preserved.
    pub capture_note: Option<String>,
}

impl ForensicDump {
    /// Encode to the stable wire representation.
    ///
    /// # Errors
    ///
    /// Returns an error if a field exceeds what its length prefix can
    /// express (arguments and strings are bounded by 64 KiB per field).
    pub fn encode(&self) -> Result<Vec<u8>, DumpEncodeError> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.memory.data.len() + 256);

        out.extend_from_slice(&DUMP_MAGIC);
        out.extend_from_slice(&DUMP_VERSION.to_be_bytes());
        out.push(self.memory.codec as u8);

        let mut flags = 0u8;
        if self.memory.truncated {
            flags |= FLAG_MEMORY_TRUNCATED;
        }
        out.push(flags);

        out.extend_from_slice(&self.fuel_consumed.to_be_bytes());
        out.extend_from_slice(&self.fuel_remaining.to_be_bytes());
        out.extend_from_slice(&self.wall_time_ns.to_be_bytes());
        out.extend_from_slice(&self.captured_at_ns.to_be_bytes());

        put_tlv(&mut out, tag::CAUSE, &encode_cause(&self.cause), "cause")?;
        put_tlv(&mut out, tag::FUNCTION, self.function.as_bytes(), "function")?;
        put_tlv(&mut out, tag::ARGS, &encode_values(&self.args), "args")?;
        put_tlv(
            &mut out,
            tag::REQUESTED_CAPS,
            &encode_strings(self.requested_capabilities.iter().map(String::as_str)),
            "requested_capabilities",
        )?;
        put_tlv(
            &mut out,
            tag::GRANTED_CAPS,
            &encode_strings(self.granted_capabilities.iter().map(Capability::as_str)),
            "granted_capabilities",
        )?;
        put_tlv(&mut out, tag::GLOBALS, &encode_values(&self.globals), "globals")?;
        if let Some(note) = &self.capture_note {
            put_tlv(&mut out, tag::NOTE, note.as_bytes(), "capture_note")?;
        }

        // The memory TLV carries a 4-byte length: linear memories exceed
        // what a u16 prefix can express.
        let memory_len = u32::try_from(self.memory.data.len()).map_err(|_| {
            DumpEncodeError::Oversize {
                field: "memory",
                len: self.memory.data.len(),
            }
        })?;
        out.push(tag::MEMORY);
        out.extend_from_slice(&memory_len.to_be_bytes());
        out.extend_from_slice(&self.memory.data);

        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_be_bytes());

        Ok(out)
    }

    /// Decode from the wire representation.
    ///
    /// # Errors
    ///
    /// Rejects bad magic, unsupported version, unknown memory codec,
    /// truncated input, CRC mismatch, and malformed fields.
    pub fn decode(bytes: &[u8]) -> Result<Self, DumpFormatError> {
        if bytes.len() < HEADER_LEN + TRAILER_LEN {
            return Err(DumpFormatError::Truncated { len: bytes.len() });
        }

        if bytes[0..4] != DUMP_MAGIC {
            return Err(DumpFormatError::BadMagic);
        }

        let version = u16::from_be_bytes([bytes[4], bytes[5]]);
        if version != DUMP_VERSION {
            return Err(DumpFormatError::UnsupportedVersion { version });
        }

        let codec = MemoryCodec::from_byte(bytes[6])?;
        let flags = bytes[7];

        let body_end = bytes.len() - TRAILER_LEN;
        let stored = u32::from_be_bytes([
            bytes[body_end],
            bytes[body_end + 1],
            bytes[body_end + 2],
            bytes[body_end + 3],
        ]);
        let computed = crc32fast::hash(&bytes[..body_end]);
        if stored != computed {
            return Err(DumpFormatError::ChecksumMismatch { stored, computed });
        }

        let mut reader = Reader::new(&bytes[8..body_end]);
        let fuel_consumed = reader.u64("fuel_consumed")?;
        let fuel_remaining = reader.u64("fuel_remaining")?;
        let wall_time_ns = reader.u64("wall_time_ns")?;
        let captured_at_ns = reader.u64("captured_at_ns")?;

        let mut cause = None;
        let mut function = String::new();
        let mut args = Vec::new();
        let mut requested = Vec::new();
        let mut granted = CapabilitySet::new();
        let mut globals = Vec::new();
        let mut note = None;
        let mut memory_data = Vec::new();

        while !reader.is_empty() {
            let tag = reader.u8("tlv tag")?;
            let payload = if tag == tag::MEMORY {
                let len = reader.u32("memory length")? as usize;
                reader.take(len, "memory payload")?
            } else {
                let len = reader.u16("tlv length")? as usize;
                reader.take(len, "tlv payload")?
            };

            match tag {
                tag::CAUSE => cause = Some(decode_cause(payload)?),
                tag::FUNCTION => function = utf8(payload, "function")?,
                tag::ARGS => args = decode_values(payload, "args")?,
                tag::REQUESTED_CAPS => requested = decode_strings(payload, "requested_capabilities")?,
                tag::GRANTED_CAPS => {
                    for name in decode_strings(payload, "granted_capabilities")? {
                        let cap = Capability::parse_atom(&name).ok_or(DumpFormatError::Malformed {
                            what: "granted_capabilities",
                        })?;
                        granted.insert(cap);
                    }
                }
                tag::GLOBALS => globals = decode_values(payload, "globals")?,
                tag::NOTE => note = Some(utf8(payload, "capture_note")?),
                tag::MEMORY => memory_data = payload.to_vec(),
                // Unknown tags are skipped: later minor versions may add fields.
                _ => {}
            }
        }

        let cause = cause.ok_or(DumpFormatError::MissingField { what: "cause" })?;

        Ok(Self {
            cause,
            fuel_consumed,
            fuel_remaining,
            wall_time_ns,
            captured_at_ns,
            function,
            args,
            requested_capabilities: requested,
            granted_capabilities: granted,
            globals,
            memory: DumpMemory {
                codec,
                truncated: flags & FLAG_MEMORY_TRUNCATED != 0,
                data: memory_data,
            },
            capture_note: note,
        })
    }

    /// The captured linear memory, decompressed.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored stream is corrupt.
    pub fn memory_bytes(&self) -> Result<Vec<u8>, DumpFormatError> {
        self.memory.decompressed()
    }
}

fn put_tlv(
    out: &mut Vec<u8>,
    tag: u8,
    payload: &[u8],
    field: &'static str,
) -> Result<(), DumpEncodeError> {
    let len = u16::try_from(payload.len()).map_err(|_| DumpEncodeError::Oversize {
        field,
        len: payload.len(),
    })?;
    out.push(tag);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

fn encode_cause(cause: &CrashCause) -> Vec<u8> {
    let mut out = Vec::new();
    match cause {
        CrashCause::FuelExhausted => out.push(cause_id::FUEL_EXHAUSTED),
        CrashCause::Trap(trap) => {
            out.push(cause_id::TRAP);
            let kind = trap.kind.as_str().as_bytes();
            out.push(kind.len() as u8);
            out.extend_from_slice(kind);
            out.extend_from_slice(trap.message.as_bytes());
        }
        CrashCause::Timeout => out.push(cause_id::TIMEOUT),
        CrashCause::HostDenied { capability } => {
            out.push(cause_id::HOST_DENIED);
            out.extend_from_slice(capability.as_str().as_bytes());
        }
        CrashCause::InstantiationFailed { reason } => {
            out.push(cause_id::INSTANTIATION_FAILED);
            out.extend_from_slice(reason.as_bytes());
        }
        CrashCause::InvalidModule { reason } => {
            out.push(cause_id::INVALID_MODULE);
            out.extend_from_slice(reason.as_bytes());
        }
    }
    out
}

fn decode_cause(payload: &[u8]) -> Result<CrashCause, DumpFormatError> {
    let (&id, rest) = payload
        .split_first()
        .ok_or(DumpFormatError::Malformed { what: "cause" })?;

    match id {
        cause_id::FUEL_EXHAUSTED => Ok(CrashCause::FuelExhausted),
        cause_id::TIMEOUT => Ok(CrashCause::Timeout),
        cause_id::TRAP => {
            let (&kind_len, rest) = rest
                .split_first()
                .ok_or(DumpFormatError::Malformed { what: "cause" })?;
            let kind_len = kind_len as usize;
            if rest.len() < kind_len {
                return Err(DumpFormatError::Malformed { what: "cause" });
            }
            let kind = TrapKind::from_name(&utf8(&rest[..kind_len], "cause")?);
            let message = utf8(&rest[kind_len..], "cause")?;
            Ok(CrashCause::Trap(TrapError::new(kind, message)))
        }
        cause_id::HOST_DENIED => {
            let name = utf8(rest, "cause")?;
            let capability = Capability::parse_atom(&name)
                .ok_or(DumpFormatError::Malformed { what: "cause" })?;
            Ok(CrashCause::HostDenied { capability })
        }
        cause_id::INSTANTIATION_FAILED => Ok(CrashCause::InstantiationFailed {
            reason: utf8(rest, "cause")?,
        }),
        cause_id::INVALID_MODULE => Ok(CrashCause::InvalidModule {
            reason: utf8(rest, "cause")?,
        }),
        tag => Err(DumpFormatError::UnknownCause { tag }),
    }
}

fn encode_values(values: &[Value]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 9);
    for value in values {
        match value {
            Value::I32(v) => {
                out.push(1);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Value::I64(v) => {
                out.push(2);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Value::F32(v) => {
                out.push(3);
                out.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Value::F64(v) => {
                out.push(4);
                out.extend_from_slice(&v.to_bits().to_be_bytes());
            }
        }
    }
    out
}

fn decode_values(payload: &[u8], what: &'static str) -> Result<Vec<Value>, DumpFormatError> {
    let mut reader = Reader::new(payload);
    let mut values = Vec::new();

    while !reader.is_empty() {
        let value = match reader.u8(what)? {
            1 => Value::I32(reader.u32(what)? as i32),
            2 => Value::I64(reader.u64(what)? as i64),
            3 => Value::F32(f32::from_bits(reader.u32(what)?)),
            4 => Value::F64(f64::from_bits(reader.u64(what)?)),
            _ => return Err(DumpFormatError::Malformed { what }),
        };
        values.push(value);
    }

    Ok(values)
}

fn encode_strings<'a>(strings: impl Iterator<Item = &'a str>) -> Vec<u8> {
    let mut out = Vec::new();
    for s in strings {
        let bytes = s.as_bytes();
        // Entries beyond a u16 length cannot be legitimate capability
        // names; truncating keeps encode infallible for this field.
        let len = bytes.len().min(u16::MAX as usize);
        out.extend_from_slice(&(len as u16).to_be_bytes());
        out.extend_from_slice(&bytes[..len]);
    }
    out
}

fn decode_strings(payload: &[u8], what: &'static str) -> Result<Vec<String>, DumpFormatError> {
    let mut reader = Reader::new(payload);
    let mut strings = Vec::new();

    while !reader.is_empty() {
        let len = reader.u16(what)? as usize;
        let bytes = reader.take(len, what)?;
        strings.push(utf8(bytes, what)?);
    }

    Ok(strings)
}

fn utf8(bytes: &[u8], what: &'static str) -> Result<String, DumpFormatError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| DumpFormatError::Malformed { what })
}

/// Bounds-checked big-endian reader over a byte slice.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], DumpFormatError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(DumpFormatError::Malformed { what })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, DumpFormatError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, DumpFormatError> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, DumpFormatError> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, DumpFormatError> {
        let b = self.take(8, what)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps;

    fn sample_dump() -> ForensicDump {
        ForensicDump {
            cause: CrashCause::Trap(TrapError::new(TrapKind::Unreachable, "boom")),
            fuel_consumed: 420,
            fuel_remaining: 580,
            wall_time_ns: 1_234_567,
            captured_at_ns: 1_700_000_000_000_000_000,
            function: "boom".into(),
            args: vec![Value::I32(2), Value::I64(-3), Value::F32(0.5), Value::F64(f64::NAN)],
            requested_capabilities: vec!["time_readonly".into(), "full_fs".into()],
            granted_capabilities: caps::effective(&caps::validate(["time_readonly"]).unwrap()),
            globals: vec![Value::I64(99)],
            memory: DumpMemory::compress(&[0u8; 65_536], false),
            capture_note: None,
        }
    }

    #[test]
    fn test_round_trip_identity() {
        let dump = sample_dump();
        let bytes = dump.encode().unwrap();
        let decoded = ForensicDump::decode(&bytes).unwrap();
        assert_eq!(decoded, dump);
    }

    #[test]
    fn test_round_trip_all_causes() {
        let causes = [
            CrashCause::FuelExhausted,
            CrashCause::Timeout,
            CrashCause::Trap(TrapError::new(TrapKind::StackOverflow, "deep")),
            CrashCause::HostDenied {
                capability: Capability::FilesystemRead,
            },
            CrashCause::InstantiationFailed {
                reason: "unknown import `env::x`".into(),
            },
            CrashCause::InvalidModule {
                reason: "bad magic".into(),
            },
        ];

        for cause in causes {
            let mut dump = sample_dump();
            dump.cause = cause.clone();
            let decoded = ForensicDump::decode(&dump.encode().unwrap()).unwrap();
            assert_eq!(decoded.cause, cause);
        }
    }

    #[test]
    fn test_round_trip_with_note_and_empty_memory() {
        let mut dump = sample_dump();
        dump.memory = DumpMemory::empty();
        dump.capture_note = Some("memory capture failed: out of bounds".into());

        let decoded = ForensicDump::decode(&dump.encode().unwrap()).unwrap();
        assert_eq!(decoded, dump);
    }

    #[test]
    fn test_memory_compression_round_trip() {
        let raw: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let memory = DumpMemory::compress(&raw, false);

        assert_eq!(memory.codec, MemoryCodec::Deflate);
        assert!(memory.data.len() < raw.len());
        assert_eq!(memory.decompressed().unwrap(), raw);
    }

    #[test]
    fn test_truncated_flag_round_trips() {
        let mut dump = sample_dump();
        dump.memory = DumpMemory::compress(&[7u8; 1024], true);

        let decoded = ForensicDump::decode(&dump.encode().unwrap()).unwrap();
        assert!(decoded.memory.truncated);
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = sample_dump().encode().unwrap();
        bytes[0] = b'X';
        assert_eq!(
            ForensicDump::decode(&bytes).unwrap_err(),
            DumpFormatError::BadMagic
        );
    }

    #[test]
    fn test_decode_rejects_unsupported_version() {
        let mut bytes = sample_dump().encode().unwrap();
        bytes[4] = 0x7f;
        assert!(matches!(
            ForensicDump::decode(&bytes).unwrap_err(),
            DumpFormatError::UnsupportedVersion { .. }
        ));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = sample_dump().encode().unwrap();
        assert!(matches!(
            ForensicDump::decode(&bytes[..20]).unwrap_err(),
            DumpFormatError::Truncated { .. }
        ));
        // Cut inside the TLV stream: the CRC no longer matches.
        assert!(ForensicDump::decode(&bytes[..bytes.len() - 9]).is_err());
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let mut bytes = sample_dump().encode().unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        assert!(matches!(
            ForensicDump::decode(&bytes).unwrap_err(),
            DumpFormatError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn test_decode_skips_unknown_tlv() {
        let dump = sample_dump();
        let encoded = dump.encode().unwrap();

        // Splice an unknown TLV right after the fixed header and re-seal.
        let mut bytes = encoded[..HEADER_LEN].to_vec();
        bytes.extend_from_slice(&[0x7e, 0x00, 0x03, 1, 2, 3]);
        bytes.extend_from_slice(&encoded[HEADER_LEN..encoded.len() - TRAILER_LEN]);
        let crc = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());

        let decoded = ForensicDump::decode(&bytes).unwrap();
        assert_eq!(decoded, dump);
    }

    #[test]
    fn test_decode_requires_cause() {
        // Header + no TLVs at all.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&DUMP_MAGIC);
        bytes.extend_from_slice(&DUMP_VERSION.to_be_bytes());
        bytes.push(0);
        bytes.push(0);
        bytes.extend_from_slice(&[0u8; 32]);
        let crc = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());

        assert_eq!(
            ForensicDump::decode(&bytes).unwrap_err(),
            DumpFormatError::MissingField { what: "cause" }
        );
    }

    #[test]
    fn test_cause_labels() {
        assert_eq!(CrashCause::FuelExhausted.label(), "fuel_exhausted");
        assert_eq!(
            CrashCause::HostDenied {
                capability: Capability::Network
            }
            .label(),
            "host_denied"
        );
    }
}
