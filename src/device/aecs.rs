//! Analytics engine configuration and state (AECS) regions.
//!
//! The layouts are `repr(C)` so a hardware submitter can hand the slots to
//! the device in place. The accelerator reads the slot selected by the
//! toggle and writes its continuation into the other one.

use std::fmt;

/// Literal/length alphabet size used by the accelerator.
pub const LIT_LEN_CODES: usize = 286;
/// Distance alphabet size.
pub const DIST_CODES: usize = 30;

/// Per-block symbol frequencies produced by the statistics job.
#[derive(Clone, PartialEq, Eq)]
#[repr(C)]
pub struct Histogram {
    pub lit_len: [u32; LIT_LEN_CODES],
    _reserved0: [u32; 2],
    pub dist: [u32; DIST_CODES],
    _reserved1: [u32; 2],
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            lit_len: [0; LIT_LEN_CODES],
            _reserved0: [0; 2],
            dist: [0; DIST_CODES],
            _reserved1: [0; 2],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used_lit = self.lit_len.iter().filter(|&&c| c != 0).count();
        let used_dist = self.dist.iter().filter(|&&c| c != 0).count();
        f.debug_struct("Histogram")
            .field("used_lit_len", &used_lit)
            .field("used_dist", &used_dist)
            .finish()
    }
}

/// Packed `(length << 15) | code` entries consumed by the encode job.
///
/// Same footprint as [`Histogram`]; the two are kept as separate types so
/// frequencies are never read back as codes.
#[derive(Clone, PartialEq, Eq)]
#[repr(C)]
pub struct CodeTable {
    pub lit_len: [u32; LIT_LEN_CODES],
    _reserved0: [u32; 2],
    pub dist: [u32; DIST_CODES],
    _reserved1: [u32; 2],
}

impl CodeTable {
    pub fn new() -> Self {
        Self {
            lit_len: [0; LIT_LEN_CODES],
            _reserved0: [0; 2],
            dist: [0; DIST_CODES],
            _reserved1: [0; 2],
        }
    }
}

impl Default for CodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// AECS layout for compress jobs.
#[derive(Clone)]
#[repr(C)]
pub struct CompressAecs {
    /// CRC seed in, running CRC out
    pub crc: u32,
    pub xor_checksum: u16,
    _reserved: [u8; 22],
    /// Number of valid header bits in `output_accumulator`
    pub num_acc_bits_valid: u32,
    /// Block header bits prefixed to the encoded output
    pub output_accumulator: [u8; 256],
    pub codes: CodeTable,
}

impl CompressAecs {
    pub fn new() -> Self {
        Self {
            crc: 0,
            xor_checksum: 0,
            _reserved: [0; 22],
            num_acc_bits_valid: 0,
            output_accumulator: [0; 256],
            codes: CodeTable::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for CompressAecs {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompressAecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressAecs")
            .field("crc", &self.crc)
            .field("num_acc_bits_valid", &self.num_acc_bits_valid)
            .finish_non_exhaustive()
    }
}

/// Size of the opaque decoder state kept by the accelerator.
pub const DECOMPRESS_INTERNAL_STATE: usize = 4880;

/// AECS layout for decompress jobs.
#[derive(Clone)]
#[repr(C)]
pub struct DecompressAecs {
    pub crc: u32,
    pub xor_checksum: u16,
    _pad0: u16,
    pub low_filter_parameter: u32,
    pub high_filter_parameter: u32,
    pub output_modifier_index: u32,
    pub drop_initial_decompress_out_bytes: u16,
    _pad1: u16,
    _pad2: u64,
    _reserved: [u64; 17],
    pub output_accumulator: [u8; 8],
    pub output_bits_valid: u8,
    _reserved1: [u8; 3],
    pub bit_offset_for_indexing: u32,
    pub input_accumulator: [u8; 256],
    pub size_qws: [u8; 32],
    pub internal_state: [u8; DECOMPRESS_INTERNAL_STATE],
    _pad3: [u64; 3],
}

impl DecompressAecs {
    pub fn new() -> Self {
        Self {
            crc: 0,
            xor_checksum: 0,
            _pad0: 0,
            low_filter_parameter: 0,
            high_filter_parameter: 0,
            output_modifier_index: 0,
            drop_initial_decompress_out_bytes: 0,
            _pad1: 0,
            _pad2: 0,
            _reserved: [0; 17],
            output_accumulator: [0; 8],
            output_bits_valid: 0,
            _reserved1: [0; 3],
            bit_offset_for_indexing: 0,
            input_accumulator: [0; 256],
            size_qws: [0; 32],
            internal_state: [0; DECOMPRESS_INTERNAL_STATE],
            _pad3: [0; 3],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for DecompressAecs {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DecompressAecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecompressAecs")
            .field("crc", &self.crc)
            .field("output_bits_valid", &self.output_bits_valid)
            .finish_non_exhaustive()
    }
}

#[repr(C, align(64))]
struct Slots<T>([T; 2]);

/// Two AECS slots in one 64-byte aligned allocation, addressed by a toggle.
///
/// Jobs read `slots[toggle]` and write `slots[toggle ^ 1]`; the owner flips
/// the toggle after every completed job.
pub struct AecsPair<T> {
    slots: Box<Slots<T>>,
    toggle: u8,
}

impl<T: Default> AecsPair<T> {
    pub fn new() -> Self {
        Self {
            slots: Box::new(Slots([T::default(), T::default()])),
            toggle: 0,
        }
    }
}

impl<T: Default> Default for AecsPair<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AecsPair<T> {
    pub fn toggle(&self) -> u8 {
        self.toggle
    }

    pub fn flip(&mut self) {
        self.toggle ^= 1;
    }

    pub fn reset_toggle(&mut self) {
        self.toggle = 0;
    }

    /// Slot the next job reads from
    pub fn current(&self) -> &T {
        &self.slots.0[self.toggle as usize]
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.slots.0[self.toggle as usize]
    }

    /// Slot the next job writes to
    #[cfg(test)]
    pub fn next(&self) -> &T {
        &self.slots.0[(self.toggle ^ 1) as usize]
    }

    pub fn slots_mut(&mut self) -> &mut [T; 2] {
        &mut self.slots.0
    }
}

impl<T> fmt::Debug for AecsPair<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AecsPair")
            .field("toggle", &self.toggle)
            .finish_non_exhaustive()
    }
}
