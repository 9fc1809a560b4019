//! Completion records written by the accelerator when a job finishes.

use std::fmt;

use crate::error::{ErrorCode, StatusCode};

/// Decoded completion record.
///
/// A hardware [`Submitter`](super::Submitter) copies the fields of the raw
/// record into this view once the job completes; software models fill it in
/// directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionRecord {
    /// Raw status byte, see [`StatusCode`]
    pub status: u8,
    /// Raw error code byte, see [`ErrorCode`]
    pub error_code: u8,
    /// Source 1 bytes consumed by the job
    pub bytes_completed: u32,
    pub fault_address: u64,
    pub invalid_flags: u32,
    /// Destination bytes produced by the job
    pub output_size: u32,
    /// Valid bits in the final output byte, 0 when byte aligned
    pub output_bits: u8,
    pub xor_checksum: u16,
    /// Running CRC-32 after the job
    pub crc: u32,
}

impl CompletionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u8(self.status)
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_u8(self.error_code)
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status.as_u8();
    }

    pub fn set_error_code(&mut self, code: ErrorCode) {
        self.error_code = code.as_u8();
    }
}

impl fmt::Display for CompletionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status_code[{}] error_code[{}] completed[{}] fault_address:[{}] invalid_flags:[{:b}] output_size:[{}] output_bits:[{}] XORCheckSum:[{}] CRC:[{}]",
            self.status(),
            self.error_code(),
            self.bytes_completed,
            self.fault_address,
            self.invalid_flags,
            self.output_size,
            self.output_bits,
            self.xor_checksum,
            self.crc,
        )
    }
}
