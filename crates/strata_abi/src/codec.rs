//! Command buffer codec
//!
//! Layout of a buffer:
//!
//! ```text
//! offset 0        8            12                 12+n
//!        ┌────────┬────────────┬──────────────────┬─────
//!        │ u64    │ u32 kind   │ payload (n bytes)│ ...
//!        │ size   │            │                  │
//!        └────────┴────────────┴──────────────────┴─────
//!                 └──────────────── size bytes ──────────┘
//! ```
//!
//! The reader never touches bytes outside `[8, 8 + size)`. An unknown
//! discriminant or a record running past the declared end is a hard
//! failure; the reader yields the error once and then ends.

use std::mem::size_of;

use crate::command::{Command, CommandKind, CommandPayload};
use crate::error::{CodecError, Result};

/// Bytes taken by the total-size prefix
pub const SIZE_PREFIX_LEN: usize = size_of::<u64>();

/// Bytes taken by a record discriminant
pub const DISCRIMINANT_LEN: usize = size_of::<u32>();

fn read_prefix(buf: &[u8]) -> Result<u64> {
    let prefix: [u8; SIZE_PREFIX_LEN] = buf
        .get(..SIZE_PREFIX_LEN)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(CodecError::MissingPrefix {
            len: buf.len(),
            prefix: SIZE_PREFIX_LEN,
        })?;
    Ok(u64::from_le_bytes(prefix))
}

/// Appends command records to a caller-provided buffer
///
/// The size prefix is rewritten after every push, so the buffer is a
/// valid command buffer at all times and can be resumed later.
pub struct CommandWriter<'a> {
    buf: &'a mut [u8],
    /// End of the last record, relative to the start of `buf`
    cursor: usize,
}

impl<'a> CommandWriter<'a> {
    /// Start an empty command buffer
    pub fn new(buf: &'a mut [u8]) -> Result<Self> {
        if buf.len() < SIZE_PREFIX_LEN {
            return Err(CodecError::MissingPrefix {
                len: buf.len(),
                prefix: SIZE_PREFIX_LEN,
            });
        }
        let mut writer = Self { buf, cursor: SIZE_PREFIX_LEN };
        writer.write_prefix();
        Ok(writer)
    }

    /// Continue appending to a buffer that already holds records
    pub fn resume(buf: &'a mut [u8]) -> Result<Self> {
        let declared = read_prefix(buf)?;
        let available = buf.len() - SIZE_PREFIX_LEN;
        if declared > available as u64 {
            return Err(CodecError::DeclaredSizeOverflow { declared, available });
        }
        Ok(Self {
            buf,
            cursor: SIZE_PREFIX_LEN + declared as usize,
        })
    }

    /// Append one record
    pub fn push<T: CommandPayload>(&mut self, payload: &T) -> Result<()> {
        let needed = DISCRIMINANT_LEN + size_of::<T>();
        let remaining = self.buf.len() - self.cursor;
        if needed > remaining {
            return Err(CodecError::BufferFull { needed, remaining });
        }

        let discriminant = (T::KIND as u32).to_le_bytes();
        let start = self.cursor;
        self.buf[start..start + DISCRIMINANT_LEN].copy_from_slice(&discriminant);
        self.buf[start + DISCRIMINANT_LEN..start + needed]
            .copy_from_slice(bytemuck::bytes_of(payload));

        self.cursor += needed;
        self.write_prefix();
        Ok(())
    }

    /// Append one owned command
    pub fn push_command(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::AddObject(p) => self.push(p),
            Command::DeleteObject(p) => self.push(p),
            Command::SetObjectProperty(p) => self.push(p),
            Command::AddMaterial(p) => self.push(p),
            Command::DeleteMaterial(p) => self.push(p),
            Command::SwapMaterial(p) => self.push(p),
            Command::SetMaterialTexture(p) => self.push(p),
            Command::SetMaterialProperties(p) => self.push(p),
        }
    }

    /// Drop every record, keeping the buffer
    pub fn clear(&mut self) {
        self.cursor = SIZE_PREFIX_LEN;
        self.write_prefix();
    }

    /// Bytes of records written, excluding the prefix
    pub fn len(&self) -> usize {
        self.cursor - SIZE_PREFIX_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The encoded buffer, prefix included
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.cursor]
    }

    fn write_prefix(&mut self) {
        let size = (self.cursor - SIZE_PREFIX_LEN) as u64;
        self.buf[..SIZE_PREFIX_LEN].copy_from_slice(&size.to_le_bytes());
    }
}

/// One record yielded by a [`CommandReader`]
#[derive(Debug, Clone, Copy)]
pub struct CommandRecord<'a> {
    kind: CommandKind,
    /// Offset of the discriminant within the record region
    offset: usize,
    payload: &'a [u8],
}

impl<'a> CommandRecord<'a> {
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Encoded size including the discriminant
    pub fn encoded_len(&self) -> usize {
        DISCRIMINANT_LEN + self.payload.len()
    }

    pub fn payload_bytes(&self) -> &'a [u8] {
        self.payload
    }

    /// Typed view of the payload
    ///
    /// Returns `None` unless `T` is the payload bound to this record's
    /// discriminant.
    pub fn get<T: CommandPayload>(&self) -> Option<T> {
        if T::KIND != self.kind || self.payload.len() != size_of::<T>() {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(self.payload))
    }

    /// Decode into an owned command
    pub fn decode(&self) -> Command {
        // Payload length was validated against the kind when the record was popped
        fn read<T: CommandPayload>(payload: &[u8]) -> T {
            bytemuck::pod_read_unaligned(payload)
        }

        match self.kind {
            CommandKind::AddObject => Command::AddObject(read(self.payload)),
            CommandKind::DeleteObject => Command::DeleteObject(read(self.payload)),
            CommandKind::SetObjectProperty => Command::SetObjectProperty(read(self.payload)),
            CommandKind::AddMaterial => Command::AddMaterial(read(self.payload)),
            CommandKind::DeleteMaterial => Command::DeleteMaterial(read(self.payload)),
            CommandKind::SwapMaterial => Command::SwapMaterial(read(self.payload)),
            CommandKind::SetMaterialTexture => Command::SetMaterialTexture(read(self.payload)),
            CommandKind::SetMaterialProperties => {
                Command::SetMaterialProperties(read(self.payload))
            }
        }
    }
}

/// Forward-only cursor over a command buffer
///
/// Not restartable; decode again with a fresh reader.
pub struct CommandReader<'a> {
    /// The record region, exactly `size` bytes long
    records: &'a [u8],
    cursor: usize,
    failed: bool,
}

impl<'a> CommandReader<'a> {
    /// Read a buffer that starts with its size prefix
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let declared = read_prefix(buf)?;
        let available = buf.len() - SIZE_PREFIX_LEN;
        if declared > available as u64 {
            return Err(CodecError::DeclaredSizeOverflow { declared, available });
        }
        let end = SIZE_PREFIX_LEN + declared as usize;
        Ok(Self {
            records: &buf[SIZE_PREFIX_LEN..end],
            cursor: 0,
            failed: false,
        })
    }

    /// Read a buffer known only by its address
    ///
    /// # Safety
    /// `ptr` must point to a size prefix followed by at least that many
    /// readable bytes, all valid for `'a`.
    pub unsafe fn from_raw(ptr: *const u8) -> Result<Self> {
        if ptr.is_null() {
            return Err(CodecError::NullBuffer);
        }
        let declared = std::ptr::read_unaligned(ptr as *const u64);
        let declared = u64::from_le(declared);
        let len = usize::try_from(declared).map_err(|_| CodecError::DeclaredSizeOverflow {
            declared,
            available: usize::MAX,
        })?;
        let records = std::slice::from_raw_parts(ptr.add(SIZE_PREFIX_LEN), len);
        Ok(Self { records, cursor: 0, failed: false })
    }

    /// Size from the prefix
    pub fn declared_size(&self) -> u64 {
        self.records.len() as u64
    }

    /// Bytes consumed so far
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    /// The buffer re-encoded with its prefix, for copying out
    pub fn to_owned_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SIZE_PREFIX_LEN + self.records.len());
        bytes.extend_from_slice(&self.declared_size().to_le_bytes());
        bytes.extend_from_slice(self.records);
        bytes
    }

    /// Next record, or `None` at the declared end
    pub fn pop(&mut self) -> Option<Result<CommandRecord<'a>>> {
        if self.failed || self.cursor >= self.records.len() {
            return None;
        }

        let offset = self.cursor;
        let remaining = self.records.len() - offset;
        if remaining < DISCRIMINANT_LEN {
            return Some(self.fail(CodecError::TruncatedRecord {
                offset,
                needed: DISCRIMINANT_LEN,
                remaining,
            }));
        }

        let mut raw = [0u8; DISCRIMINANT_LEN];
        raw.copy_from_slice(&self.records[offset..offset + DISCRIMINANT_LEN]);
        let discriminant = u32::from_le_bytes(raw);

        let kind = match CommandKind::from_raw(discriminant) {
            Some(kind) => kind,
            None => {
                return Some(self.fail(CodecError::UnknownCommand { discriminant, offset }));
            }
        };

        let needed = DISCRIMINANT_LEN + kind.payload_size();
        if needed > remaining {
            return Some(self.fail(CodecError::TruncatedRecord { offset, needed, remaining }));
        }

        let payload = &self.records[offset + DISCRIMINANT_LEN..offset + needed];
        self.cursor += needed;
        Some(Ok(CommandRecord { kind, offset, payload }))
    }

    /// Decode every remaining record into owned commands
    pub fn decode_all(self) -> Result<Vec<Command>> {
        self.map(|record| record.map(|r| r.decode())).collect()
    }

    fn fail(&mut self, error: CodecError) -> Result<CommandRecord<'a>> {
        self.failed = true;
        Err(error)
    }
}

impl<'a> Iterator for CommandReader<'a> {
    type Item = Result<CommandRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop()
    }
}

impl std::iter::FusedIterator for CommandReader<'_> {}
