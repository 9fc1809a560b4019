//! Error types for iaa-deflate
//!
//! This module defines every error a stream can report, plus the status and
//! error codes the accelerator writes into its completion records.

use std::fmt;
use std::io;
use thiserror::Error;

/// Status byte of a completion record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Incomplete,
    Success,
    AnalyticsError,
    OutputBufferOverflow,
    InvalidFlags,
    NonZeroReservedField,
    InvalidSizeValue,
    CompletionRecordAddressNotAligned,
    AecsMisalignedAddress,
    PageRequestTimeout,
    WatchdogExpired,
    InvalidOpFlags,
    InvalidFilterFlags,
    InvalidInputSize,
    InvalidNumberOfElements,
    InvalidSource1Width,
    InvalidInvertOutput,
    Unknown(u8),
}

impl StatusCode {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x00 => StatusCode::Incomplete,
            0x01 => StatusCode::Success,
            0x0a => StatusCode::AnalyticsError,
            0x0b => StatusCode::OutputBufferOverflow,
            0x11 => StatusCode::InvalidFlags,
            0x12 => StatusCode::NonZeroReservedField,
            0x13 => StatusCode::InvalidSizeValue,
            0x1b => StatusCode::CompletionRecordAddressNotAligned,
            0x1c => StatusCode::AecsMisalignedAddress,
            0x23 => StatusCode::PageRequestTimeout,
            0x24 => StatusCode::WatchdogExpired,
            0x30 => StatusCode::InvalidOpFlags,
            0x31 => StatusCode::InvalidFilterFlags,
            0x32 => StatusCode::InvalidInputSize,
            0x33 => StatusCode::InvalidNumberOfElements,
            0x34 => StatusCode::InvalidSource1Width,
            0x35 => StatusCode::InvalidInvertOutput,
            other => StatusCode::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            StatusCode::Incomplete => 0x00,
            StatusCode::Success => 0x01,
            StatusCode::AnalyticsError => 0x0a,
            StatusCode::OutputBufferOverflow => 0x0b,
            StatusCode::InvalidFlags => 0x11,
            StatusCode::NonZeroReservedField => 0x12,
            StatusCode::InvalidSizeValue => 0x13,
            StatusCode::CompletionRecordAddressNotAligned => 0x1b,
            StatusCode::AecsMisalignedAddress => 0x1c,
            StatusCode::PageRequestTimeout => 0x23,
            StatusCode::WatchdogExpired => 0x24,
            StatusCode::InvalidOpFlags => 0x30,
            StatusCode::InvalidFilterFlags => 0x31,
            StatusCode::InvalidInputSize => 0x32,
            StatusCode::InvalidNumberOfElements => 0x33,
            StatusCode::InvalidSource1Width => 0x34,
            StatusCode::InvalidInvertOutput => 0x35,
            StatusCode::Unknown(code) => code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Incomplete => "INCOMPLETE",
            StatusCode::Success => "SUCCESS",
            StatusCode::AnalyticsError => "ANALYTICS_ERROR",
            StatusCode::OutputBufferOverflow => "OUTPUT_BUFFER_OVERFLOW",
            StatusCode::InvalidFlags => "INVALID_FLAGS",
            StatusCode::NonZeroReservedField => "NON_ZERO_RESERVED_FIELD",
            StatusCode::InvalidSizeValue => "INVALID_SIZE_VALUE",
            StatusCode::CompletionRecordAddressNotAligned => {
                "COMPLETION_RECORD_ADDRESS_NOT_ALIGNED"
            }
            StatusCode::AecsMisalignedAddress => "AECS_MISALIGNED_ADDRESS",
            StatusCode::PageRequestTimeout => "PAGE_REQUEST_TIMEOUT",
            StatusCode::WatchdogExpired => "WATCHDOG_EXPIRED",
            StatusCode::InvalidOpFlags => "INVALID_OP_FLAGS",
            StatusCode::InvalidFilterFlags => "INVALID_FILTER_FLAGS",
            StatusCode::InvalidInputSize => "INVALID_INPUT_SIZE",
            StatusCode::InvalidNumberOfElements => "INVALID_NUMBER_OF_ELEMENTS",
            StatusCode::InvalidSource1Width => "INVALID_SOURCE_1_WIDTH",
            StatusCode::InvalidInvertOutput => "INVALID_INVERT_OUTPUT",
            StatusCode::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Unknown(code) => write!(f, "UNKNOWN(0x{code:02x})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Error code byte of a completion record, meaningful when the status is
/// `AnalyticsError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    None = 0,
    HeaderTooLarge = 1,
    UndefinedClCode = 2,
    FirstCodeInLlTreeIs16 = 3,
    FirstCodeInDTreeIs16 = 4,
    NoValidLlCode = 5,
    WrongNumberOfLlCodes = 6,
    WrongNumberOfDistCodes = 7,
    BadClCodeLengths = 8,
    BadLlCodeLengths = 9,
    BadDistCodeLengths = 10,
    BadLlCodes = 11,
    BadDCode = 12,
    InvalidBlockType = 13,
    InvalidStoredLength = 14,
    BadEndOfFile = 15,
    BadLengthDecode = 16,
    BadDistanceDecode = 17,
    DistanceBeforeStartOfFile = 18,
    Timeout = 19,
    PrleFormatError = 20,
    FilterFunctionWordOverflow = 21,
    AecsError = 22,
    Source1TooSmall = 23,
    Source2TooSmall = 24,
    UnrecoverableOutputOverflow = 25,
    DistanceSpansMiniBlocks = 26,
    LengthSpansMiniBlocks = 27,
    InvalidBlockSize = 28,
    ZcompressVerifyFailure = 29,
    InvalidHuffmanCode = 30,
    PrleBitWidthTooLarge = 31,
    TooFewElementsProcessed = 32,
    InvalidRleCount = 33,
    InvalidZDecompressHeader = 34,
    TooManyLlCodes = 35,
    TooManyDCodes = 36,
    AdministrativeTimeout = 37,
    Unknown = 0xff,
}

impl ErrorCode {
    const TABLE: [ErrorCode; 38] = [
        ErrorCode::None,
        ErrorCode::HeaderTooLarge,
        ErrorCode::UndefinedClCode,
        ErrorCode::FirstCodeInLlTreeIs16,
        ErrorCode::FirstCodeInDTreeIs16,
        ErrorCode::NoValidLlCode,
        ErrorCode::WrongNumberOfLlCodes,
        ErrorCode::WrongNumberOfDistCodes,
        ErrorCode::BadClCodeLengths,
        ErrorCode::BadLlCodeLengths,
        ErrorCode::BadDistCodeLengths,
        ErrorCode::BadLlCodes,
        ErrorCode::BadDCode,
        ErrorCode::InvalidBlockType,
        ErrorCode::InvalidStoredLength,
        ErrorCode::BadEndOfFile,
        ErrorCode::BadLengthDecode,
        ErrorCode::BadDistanceDecode,
        ErrorCode::DistanceBeforeStartOfFile,
        ErrorCode::Timeout,
        ErrorCode::PrleFormatError,
        ErrorCode::FilterFunctionWordOverflow,
        ErrorCode::AecsError,
        ErrorCode::Source1TooSmall,
        ErrorCode::Source2TooSmall,
        ErrorCode::UnrecoverableOutputOverflow,
        ErrorCode::DistanceSpansMiniBlocks,
        ErrorCode::LengthSpansMiniBlocks,
        ErrorCode::InvalidBlockSize,
        ErrorCode::ZcompressVerifyFailure,
        ErrorCode::InvalidHuffmanCode,
        ErrorCode::PrleBitWidthTooLarge,
        ErrorCode::TooFewElementsProcessed,
        ErrorCode::InvalidRleCount,
        ErrorCode::InvalidZDecompressHeader,
        ErrorCode::TooManyLlCodes,
        ErrorCode::TooManyDCodes,
        ErrorCode::AdministrativeTimeout,
    ];

    pub fn from_u8(code: u8) -> Self {
        Self::TABLE
            .get(code as usize)
            .copied()
            .unwrap_or(ErrorCode::Unknown)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::None => "",
            ErrorCode::HeaderTooLarge => "ERROR_CODE_HEADER_TOO_LARGE",
            ErrorCode::UndefinedClCode => "ERROR_CODE_UNDEFINED_CL_CODE",
            ErrorCode::FirstCodeInLlTreeIs16 => "ERROR_CODE_FIRST_CODE_IN_LL_TREE_IS_16",
            ErrorCode::FirstCodeInDTreeIs16 => "ERROR_CODE_FIRST_CODE_IN_D_TREE_IS_16",
            ErrorCode::NoValidLlCode => "ERROR_CODE_NO_VALID_LL_CODE",
            ErrorCode::WrongNumberOfLlCodes => "ERROR_CODE_WRONG_NUMBER_OF_LL_CODES",
            ErrorCode::WrongNumberOfDistCodes => "ERROR_CODE_WRONG_NUMBER_OF_DIST_CODES",
            ErrorCode::BadClCodeLengths => "ERROR_CODE_BAD_CL_CODE_LENGTHS",
            ErrorCode::BadLlCodeLengths => "ERROR_CODE_BAD_LL_CODE_LENGTHS",
            ErrorCode::BadDistCodeLengths => "ERROR_CODE_BAD_DIST_CODE_LENGTHS",
            ErrorCode::BadLlCodes => "ERROR_CODE_BAD_LL_CODES",
            ErrorCode::BadDCode => "ERROR_CODE_BAD_D_CODE",
            ErrorCode::InvalidBlockType => "ERROR_CODE_INVALID_BLOCK_TYPE",
            ErrorCode::InvalidStoredLength => "ERROR_CODE_INVALID_STORED_LENGTH",
            ErrorCode::BadEndOfFile => "ERROR_CODE_BAD_END_OF_FILE",
            ErrorCode::BadLengthDecode => "ERROR_CODE_BAD_LENGTH_DECODE",
            ErrorCode::BadDistanceDecode => "ERROR_CODE_BAD_DISTANCE_DECODE",
            ErrorCode::DistanceBeforeStartOfFile => "ERROR_CODE_DISTANCE_BEFORE_START_OF_FILE",
            ErrorCode::Timeout => "ERROR_CODE_TIMEOUT",
            ErrorCode::PrleFormatError => "ERROR_CODE_PRLE_FORMAT_ERROR",
            ErrorCode::FilterFunctionWordOverflow => "ERROR_CODE_FILTER_FUNCTION_WORD_OVERFLOW",
            ErrorCode::AecsError => "ERROR_CODE_AECS_ERROR",
            ErrorCode::Source1TooSmall => "ERROR_CODE_SOURCE_1_TOO_SMALL",
            ErrorCode::Source2TooSmall => "ERROR_CODE_SOURCE_2_TOO_SMALL",
            ErrorCode::UnrecoverableOutputOverflow => "ERROR_CODE_UNRECOVERABLE_OUTPUT_OVERFLOW",
            ErrorCode::DistanceSpansMiniBlocks => "ERROR_CODE_DISTANCE_SPANS_MINI_BLOCKS",
            ErrorCode::LengthSpansMiniBlocks => "ERROR_CODE_LENGTH_SPANS_MINI_BLOCKS",
            ErrorCode::InvalidBlockSize => "ERROR_CODE_INVALID_BLOCK_SIZE",
            ErrorCode::ZcompressVerifyFailure => "ERROR_CODE_ZCOMPRESS_VERIFY_FAILURE",
            ErrorCode::InvalidHuffmanCode => "ERROR_CODE_INVALID_HUFFMAN_CODE",
            ErrorCode::PrleBitWidthTooLarge => "ERROR_CODE_PRLE_BIT_WIDTH_TOO_LARGE",
            ErrorCode::TooFewElementsProcessed => "ERROR_CODE_TOO_FEW_ELEMENTS_PROCESSED",
            ErrorCode::InvalidRleCount => "ERROR_CODE_INVALID_RLE_COUNT",
            ErrorCode::InvalidZDecompressHeader => "ERROR_CODE_INVALID_Z_DECOMPRESS_HEADER",
            ErrorCode::TooManyLlCodes => "ERROR_CODE_TOO_MANY_LL_CODES",
            ErrorCode::TooManyDCodes => "ERROR_CODE_TOO_MANY_D_CODES",
            ErrorCode::AdministrativeTimeout => "ERROR_CODE_ADMINISTRATIVE_TIMEOUT",
            ErrorCode::Unknown => "ERROR_CODE_UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error categories, used by callers to decide between retrying,
/// chunking and giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing device or invalid construction argument.
    Configuration,
    /// Data exceeds a device or format limit; the caller must chunk.
    SizeLimit,
    /// The accelerator reported a non-recoverable status.
    Hardware,
    /// A broken internal invariant.
    Internal,
    /// Rejected GZIP header metadata.
    Format,
    /// Failure of the underlying reader or writer.
    Io,
}

/// Main error type for iaa-deflate
#[derive(Error, Debug)]
pub enum AccelError {
    /// No usable accelerator behind the submitter
    #[error("no hardware device detected")]
    NoHardwareDeviceDetected,

    #[error("buffer size too small: {size} bytes (minimum {min})")]
    BufferSizeTooSmall { size: usize, min: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A single transfer is larger than the device's max_transfer_size
    #[error("data size {size} is larger than device's max_transfer_size {max}")]
    DataSizeTooLarge { size: usize, max: usize },

    /// A compress block is larger than the DEFLATE block size
    #[error("block size {size} exceeds the maximum block size {max}", max = crate::deflate::MAX_BLOCK_SIZE)]
    BlockTooLarge { size: usize },

    /// Fatal accelerator status
    #[error("{}", hardware_message(*.status, *.error_code))]
    Hardware {
        status: StatusCode,
        error_code: ErrorCode,
    },

    #[error("block header needs {bits} bits, more than the {max} bit accumulator", max = crate::deflate::MAX_HEADER_BITS)]
    HeaderOverflow { bits: usize },

    #[error("completion record reports {bits} output bits, expected fewer than 8")]
    OutputBitsOutOfRange { bits: u8 },

    /// GZIP name/comment must be Latin-1 encoded
    #[error("gzip: non-Latin-1 header string")]
    NonLatin1Header,

    /// GZIP name/comment are zero terminated
    #[error("gzip: header string contains zero byte")]
    ZeroByteInHeader,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn hardware_message(status: StatusCode, error_code: ErrorCode) -> String {
    if error_code == ErrorCode::None {
        format!("status: {status}")
    } else {
        format!("status: {status} error code: {error_code}")
    }
}

impl AccelError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AccelError::NoHardwareDeviceDetected => ErrorClass::Configuration,
            AccelError::BufferSizeTooSmall { .. } => ErrorClass::Configuration,
            AccelError::InvalidArgument(_) => ErrorClass::Configuration,
            AccelError::DataSizeTooLarge { .. } => ErrorClass::SizeLimit,
            AccelError::BlockTooLarge { .. } => ErrorClass::SizeLimit,
            AccelError::Hardware { .. } => ErrorClass::Hardware,
            AccelError::HeaderOverflow { .. } => ErrorClass::Internal,
            AccelError::OutputBitsOutOfRange { .. } => ErrorClass::Internal,
            AccelError::NonLatin1Header => ErrorClass::Format,
            AccelError::ZeroByteInHeader => ErrorClass::Format,
            AccelError::Io(_) => ErrorClass::Io,
        }
    }

    /// Create a hardware error from a raw status/error code pair
    pub fn hardware(status: StatusCode, error_code: ErrorCode) -> Self {
        AccelError::Hardware { status, error_code }
    }

    /// Create a transfer size error
    pub fn data_size_too_large(size: usize, max: u32) -> Self {
        AccelError::DataSizeTooLarge {
            size,
            max: max as usize,
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        AccelError::InvalidArgument(msg.into())
    }
}

impl From<AccelError> for io::Error {
    fn from(err: AccelError) -> Self {
        let kind = match err.class() {
            ErrorClass::Io => {
                if let AccelError::Io(inner) = err {
                    return inner;
                }
                io::ErrorKind::Other
            }
            ErrorClass::Configuration | ErrorClass::Format => io::ErrorKind::InvalidInput,
            ErrorClass::SizeLimit => io::ErrorKind::InvalidInput,
            ErrorClass::Hardware => io::ErrorKind::InvalidData,
            ErrorClass::Internal => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Result type for iaa-deflate operations
pub type Result<T> = std::result::Result<T, AccelError>;
