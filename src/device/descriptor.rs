//! Job descriptors handed to a [`Submitter`](super::Submitter).

use std::fmt;

use bitflags::bitflags;

use super::aecs::{CompressAecs, DecompressAecs, Histogram};

/// Operation executed by a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Noop,
    Decompress,
    Compress,
}

impl Opcode {
    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Noop => 0x00,
            Opcode::Decompress => 0x42,
            Opcode::Compress => 0x43,
        }
    }
}

bitflags! {
    /// Descriptor flags, bit positions as the device defines them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DescriptorFlags: u32 {
        const BLOCK_ON_FAULT = 1 << 1;
        const COMPLETION_RECORD_VALID = 1 << 2;
        const REQUEST_COMPLETION_RECORD = 1 << 3;
        const REQUEST_COMPLETION_INTERRUPT = 1 << 4;
        const COMPLETION_RECORD_STEERING_TAG_SELECTOR = 1 << 5;
        const CACHE_CONTROL = 1 << 8;
        const STRICT_ORDERING = 1 << 13;
        const READ_SOURCE_2_AECS = 1 << 16;
        const READ_SOURCE_2_SECONDARY_INPUT_TO_FILTER_FUNCTION = 1 << 17;
        const WRITE_SOURCE_2_COMPLETION_OF_OPERATION = 1 << 18;
        const WRITE_SOURCE_2_ONLY_IF_OUTPUT_OVERFLOW = 1 << 19;
        const CRC_SELECT_RFC_3720 = 1 << 21;
        const AECS_R_W_TOGGLE_SELECTOR = 1 << 22;
    }
}

bitflags! {
    /// Operation flags of a compress descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompressionFlags: u16 {
        const STATS_MODE = 1;
        const FLUSH_OUTPUT = 1 << 1;
        const END_APPEND_EOB = 1 << 2;
        const END_APPEND_EOB_NON_B_FINAL = 2 << 2;
        const END_APPEND_EOB_AND_B_FINAL = 3 << 2;
        const GENERATE_ALL_LITERALS = 1 << 4;
        const COMPRESS_BIG_ENDIAN = 1 << 5;
    }
}

bitflags! {
    /// Operation flags of a decompress descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DecompressionFlags: u16 {
        const ENABLE_DECOMPRESSION = 1;
        const FLUSH_OUTPUT = 1 << 1;
        const STOP_ON_EOB = 1 << 2;
        const CHECK_FOR_EOB = 1 << 3;
        const SELECT_B_FINAL_EOB = 1 << 4;
        const DECOMPRESS_BIT_ORDER = 1 << 5;
        const IGNORE_END_BITS = 1 << 6;
        const SUPPRESS_OUTPUT = 1 << 7;
    }
}

fn write_names<I>(f: &mut fmt::Formatter<'_>, names: I) -> fmt::Result
where
    I: Iterator<Item = &'static str>,
{
    for (i, name) in names.enumerate() {
        if i != 0 {
            f.write_str(" | ")?;
        }
        f.write_str(name)?;
    }
    Ok(())
}

impl fmt::Display for DescriptorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_names(f, self.iter_names().map(|(name, _)| name))
    }
}

impl fmt::Display for CompressionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_names(f, self.iter_names().map(|(name, _)| name))
    }
}

impl fmt::Display for DecompressionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_names(f, self.iter_names().map(|(name, _)| name))
    }
}

/// Where a job writes its primary output.
pub enum Destination<'a> {
    Bytes(&'a mut [u8]),
    /// Statistics jobs write symbol frequencies
    Histogram(&'a mut Histogram),
}

impl Destination<'_> {
    /// Maximum destination size in bytes
    pub fn capacity(&self) -> usize {
        match self {
            Destination::Bytes(buf) => buf.len(),
            Destination::Histogram(_) => std::mem::size_of::<Histogram>(),
        }
    }
}

/// AECS pair referenced as source 2.
pub enum AecsRegion<'a> {
    Compress(&'a mut [CompressAecs; 2]),
    Decompress(&'a mut [DecompressAecs; 2]),
}

/// A single accelerator job.
pub struct Descriptor<'a> {
    pub opcode: Opcode,
    pub flags: DescriptorFlags,
    /// Raw compression or decompression flags, depending on `opcode`
    pub op_flags: u16,
    pub src1: &'a [u8],
    pub dst: Destination<'a>,
    pub aecs: Option<AecsRegion<'a>>,
}

impl<'a> Descriptor<'a> {
    pub fn new(opcode: Opcode, src1: &'a [u8], dst: Destination<'a>) -> Self {
        Self {
            opcode,
            flags: DescriptorFlags::empty(),
            op_flags: 0,
            src1,
            dst,
            aecs: None,
        }
    }

    pub fn with_flags(mut self, flags: DescriptorFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_compression_flags(mut self, flags: CompressionFlags) -> Self {
        self.op_flags = flags.bits();
        self
    }

    pub fn with_decompression_flags(mut self, flags: DecompressionFlags) -> Self {
        self.op_flags = flags.bits();
        self
    }

    /// Attach an AECS pair; `toggle == 1` selects reads from the second slot
    pub fn with_aecs(mut self, aecs: AecsRegion<'a>, toggle: u8) -> Self {
        if toggle == 1 {
            self.flags |= DescriptorFlags::AECS_R_W_TOGGLE_SELECTOR;
        }
        self.aecs = Some(aecs);
        self
    }

    pub fn compression_flags(&self) -> CompressionFlags {
        CompressionFlags::from_bits_truncate(self.op_flags)
    }

    pub fn decompression_flags(&self) -> DecompressionFlags {
        DecompressionFlags::from_bits_truncate(self.op_flags)
    }

    /// Index of the AECS slot the job reads
    pub fn read_slot(&self) -> usize {
        self.flags.contains(DescriptorFlags::AECS_R_W_TOGGLE_SELECTOR) as usize
    }

    /// Index of the AECS slot the job writes
    pub fn write_slot(&self) -> usize {
        self.read_slot() ^ 1
    }
}

impl fmt::Display for Descriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "opcode:[{}] flags:[{}] ",
            self.opcode.as_u8(),
            self.flags
        )?;
        match self.opcode {
            Opcode::Compress => write!(f, "comp_flag:[{}]", self.compression_flags()),
            Opcode::Decompress => write!(f, "comp_flag:[{}]", self.decompression_flags()),
            Opcode::Noop => write!(f, "comp_flag:[{:b}]", self.op_flags),
        }
    }
}
