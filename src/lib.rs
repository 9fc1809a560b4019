//! iaa-deflate - 硬件加速的流式 DEFLATE/GZIP 编解码
//!
//! 压缩与解压作业交给无状态的压缩加速器执行 (例如 Intel IAA)，
//! 本库负责跨作业的所有状态：Huffman 码表与块头生成、块间的
//! 位与 CRC 衔接、存储块回退、解压的输入/输出余量与 AECS 切换。
//!
//! ## 功能
//!
//! - 原始 DEFLATE 流压缩 ([`Deflate`])
//! - GZIP 封装 ([`Gzip`])
//! - 流式解压 ([`Inflate`])
//! - 任意写入切分为 32KB 块 ([`BufWriter`])
//!
//! 作业提交通过 [`Submitter`] 抽象，设备驱动由调用方提供。
//!
//! ## 示例
//!
//! ```no_run
//! use std::io::Write;
//! use std::sync::Arc;
//! use iaa_deflate::{new_gzip_writer, Accelerator, Submitter};
//!
//! fn compress(dev: Arc<dyn Submitter>, data: &[u8]) -> iaa_deflate::Result<Vec<u8>> {
//!     let accel = Accelerator::new(dev)?;
//!     let mut w = new_gzip_writer(&accel, Vec::new());
//!     w.write_all(data)?;
//!     w.close()?;
//!     Ok(w.into_inner().into_inner())
//! }
//! ```

pub mod config;
pub mod deflate;
pub mod device;
pub mod error;
pub mod gzip;
pub mod mem;
pub mod writer;

// 重导出常用类型
pub use config::{DeflateOptions, InflateOptions, LevelHint, WaitMode};
pub use deflate::{Deflate, Inflate};
pub use device::{ready, Accelerator, Submitter};
pub use error::{AccelError, ErrorClass, ErrorCode, Result, StatusCode};
pub use gzip::{Gzip, GzipHeader};
pub use writer::{new_deflate_writer, new_gzip_writer, BlockWriter, BufWriter};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
