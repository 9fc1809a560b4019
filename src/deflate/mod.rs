//! DEFLATE 编解码
//!
//! 压缩与解压都交给加速器执行；本模块负责 Huffman 码表、块头、
//! 块间位/CRC 衔接与存储块回退，以及解压的跨调用状态。

pub mod bitstream;
pub mod compress;
pub mod header;
pub mod huffman;
pub mod inflate;

pub use compress::Deflate;
pub use inflate::Inflate;

/// 单个 DEFLATE 块的最大字节数
pub const MAX_BLOCK_SIZE: usize = 32 * 1024;

/// 输出累加器可容纳的块头位数
pub const MAX_HEADER_BITS: usize = 2048;

/// DEFLATE 最长匹配
pub const MAX_MATCH: usize = 258;

/// 存储块头与 LEN/NLEN 的字节数，携带位可能再多占一字节
pub(crate) const STORED_HEADER_MAX: usize = 5;
