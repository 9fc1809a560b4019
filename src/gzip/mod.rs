//! GZIP 封装 (RFC 1952)
//!
//! 头部延迟到第一个块之前写出，构造后仍可设置元数据；
//! 最后一块之后写出 CRC 与长度尾部。

use std::fmt;
use std::io::{Read, Write};

use time::OffsetDateTime;

use crate::config::DeflateOptions;
use crate::deflate::Deflate;
use crate::device::Accelerator;
use crate::error::{AccelError, Result};
use crate::writer::BlockWriter;

const GZIP_ID: [u8; 3] = [0x1f, 0x8b, 8];

const FLAG_EXTRA: u8 = 1 << 2;
const FLAG_NAME: u8 = 1 << 3;
const FLAG_COMMENT: u8 = 1 << 4;

/// OS 字段：未知
pub const OS_UNKNOWN: u8 = 255;

/// GZIP 头部元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipHeader {
    /// 原始文件名 (FNAME)
    pub name: String,
    /// 注释 (FCOMMENT)
    pub comment: String,
    /// 扩展字段内容 (FEXTRA)
    pub extra: Vec<u8>,
    /// 修改时间；`None` 与 1970 年之前的时间写为 0
    pub mod_time: Option<OffsetDateTime>,
    pub os: u8,
    /// 文件名与注释按 UTF-8 写出，否则按 Latin-1
    pub utf8: bool,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self {
            name: String::new(),
            comment: String::new(),
            extra: Vec::new(),
            mod_time: None,
            os: OS_UNKNOWN,
            utf8: false,
        }
    }
}

impl GzipHeader {
    /// 序列化头部；字符串不合法时不产生任何输出
    pub fn to_bytes(&self, xfl: u8) -> Result<Vec<u8>> {
        let mut flag = 0u8;
        let mut cap = 10;
        if !self.extra.is_empty() {
            flag |= FLAG_EXTRA;
            cap += 2 + self.extra.len();
        }
        if !self.name.is_empty() {
            flag |= FLAG_NAME;
            cap += self.name.len() + 1;
        }
        if !self.comment.is_empty() {
            flag |= FLAG_COMMENT;
            cap += self.comment.len() + 1;
        }

        let mut buf = Vec::with_capacity(cap);
        buf.extend_from_slice(&GZIP_ID);
        buf.push(flag);
        let secs = self
            .mod_time
            .map_or(0, |t| t.unix_timestamp().clamp(0, u32::MAX as i64));
        buf.extend_from_slice(&(secs as u32).to_le_bytes());
        buf.push(xfl);
        buf.push(self.os);

        if !self.extra.is_empty() {
            let len = u16::try_from(self.extra.len())
                .map_err(|_| AccelError::invalid_argument("gzip extra field longer than 65535 bytes"))?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(&self.extra);
        }
        if !self.name.is_empty() {
            write_header_str(&mut buf, &self.name, self.utf8)?;
        }
        if !self.comment.is_empty() {
            write_header_str(&mut buf, &self.comment, self.utf8)?;
        }
        Ok(buf)
    }
}

/// 以 0 结尾的 Latin-1 (或 UTF-8) 字符串字段
fn write_header_str(buf: &mut Vec<u8>, s: &str, utf8: bool) -> Result<()> {
    if s.contains('\0') {
        return Err(AccelError::ZeroByteInHeader);
    }
    if utf8 {
        buf.extend_from_slice(s.as_bytes());
    } else {
        for c in s.chars() {
            let code = u32::from(c);
            if code > 0xff {
                return Err(AccelError::NonLatin1Header);
            }
            buf.push(code as u8);
        }
    }
    buf.push(0);
    Ok(())
}

/// GZIP 压缩器
pub struct Gzip<W: Write> {
    header: GzipHeader,
    wrote_header: bool,
    deflate: Deflate<W>,
    /// 已压缩的原始字节数，ISIZE 取其低 32 位
    size: u64,
}

impl<W: Write> Gzip<W> {
    pub fn new(accel: &Accelerator, sink: W) -> Self {
        Self::with_options(accel, sink, DeflateOptions::default())
    }

    pub fn with_options(accel: &Accelerator, sink: W, options: DeflateOptions) -> Self {
        Self {
            header: GzipHeader::default(),
            wrote_header: false,
            deflate: Deflate::with_options(accel, sink, options),
            size: 0,
        }
    }

    pub fn header(&self) -> &GzipHeader {
        &self.header
    }

    /// 头部元数据；第一个块之后的修改不会写出
    pub fn header_mut(&mut self) -> &mut GzipHeader {
        &mut self.header
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.header.name = name.into();
        self
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.header.comment = comment.into();
        self
    }

    pub fn set_extra(&mut self, extra: impl Into<Vec<u8>>) -> &mut Self {
        self.header.extra = extra.into();
        self
    }

    pub fn set_mod_time(&mut self, time: OffsetDateTime) -> &mut Self {
        self.header.mod_time = Some(time);
        self
    }

    pub fn set_os(&mut self, os: u8) -> &mut Self {
        self.header.os = os;
        self
    }

    pub fn set_utf8(&mut self, utf8: bool) -> &mut Self {
        self.header.utf8 = utf8;
        self
    }

    pub fn crc(&self) -> u32 {
        self.deflate.crc()
    }

    pub fn get_ref(&self) -> &W {
        self.deflate.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.deflate.get_mut()
    }

    pub fn into_inner(self) -> W {
        self.deflate.into_inner()
    }

    /// 换一个输出开始新成员，头部恢复默认
    pub fn reset(&mut self, sink: W) -> W {
        self.size = 0;
        self.wrote_header = false;
        self.header = GzipHeader::default();
        self.deflate.reset(sink)
    }

    pub fn close(&mut self) -> Result<()> {
        self.deflate.close()
    }

    /// 压缩一个块，最后一块之后写尾部
    pub fn write_block(&mut self, block: &[u8], last: bool) -> Result<usize> {
        self.ensure_header()?;
        let n = self.deflate.write_block(block, last)?;
        self.size += block.len() as u64;
        if last {
            self.write_trailer()?;
        }
        Ok(n)
    }

    /// 读完 `source` 压缩为一个成员
    pub fn read_all_from<R: Read>(&mut self, source: R) -> Result<u64> {
        self.ensure_header()?;
        let n = self.deflate.read_all_from(source)?;
        self.size += n;
        self.write_trailer()?;
        Ok(n)
    }

    fn ensure_header(&mut self) -> Result<()> {
        if self.wrote_header {
            return Ok(());
        }
        let bytes = self.header.to_bytes(self.deflate.options().level_hint.xfl())?;
        self.deflate.get_mut().write_all(&bytes)?;
        self.wrote_header = true;
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        let mut trailer = [0u8; 8];
        trailer[..4].copy_from_slice(&self.deflate.crc().to_le_bytes());
        trailer[4..].copy_from_slice(&(self.size as u32).to_le_bytes());
        self.deflate.get_mut().write_all(&trailer)?;
        Ok(())
    }
}

impl<W: Write> BlockWriter for Gzip<W> {
    type Sink = W;

    fn write_block(&mut self, block: &[u8], last: bool) -> Result<usize> {
        Gzip::write_block(self, block, last)
    }

    fn reset(&mut self, sink: W) -> W {
        Gzip::reset(self, sink)
    }

    fn close(&mut self) -> Result<()> {
        Gzip::close(self)
    }
}

impl<W: Write> fmt::Debug for Gzip<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gzip")
            .field("header", &self.header)
            .field("wrote_header", &self.wrote_header)
            .field("size", &self.size)
            .field("deflate", &self.deflate)
            .finish()
    }
}
