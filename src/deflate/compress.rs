//! DEFLATE 压缩流
//!
//! 每个块的流程：统计作业 -> 生成码长与码表 -> 生成块头 -> 编码作业。
//! 编码失败于输出溢出或压缩后变大时回退为存储块。

use std::fmt;
use std::io::{self, Read, Write};
use std::mem;

use log::{debug, warn};

use super::bitstream::HeaderWriter;
use super::header::DynamicHeader;
use super::huffman::{self, MAX_CODE_LEN};
use super::{MAX_BLOCK_SIZE, STORED_HEADER_MAX};
use crate::config::DeflateOptions;
use crate::device::aecs::{DIST_CODES, LIT_LEN_CODES};
use crate::device::{
    Accelerator, AecsPair, AecsRegion, CompletionRecord, CompressAecs, CompressionFlags,
    Descriptor, DescriptorFlags, Destination, Histogram, Opcode,
};
use crate::error::{AccelError, ErrorCode, Result, StatusCode};
use crate::mem::AlignedBuf;
use crate::writer::BlockWriter;

/// 非最终块末尾不足一字节的位，拼到下一个块头前
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CarriedBits {
    bits: u8,
    len: u8,
}

/// DEFLATE 压缩器
pub struct Deflate<W: Write> {
    accel: Accelerator,
    options: DeflateOptions,
    sink: W,
    aecs: AecsPair<CompressAecs>,
    histogram: Box<Histogram>,
    /// 块输出 (最大块 + 存储块头 + 携带位)
    output: AlignedBuf,
    record: CompletionRecord,
    header: DynamicHeader,
    read_cache: Option<[AlignedBuf; 2]>,
    crc: u32,
    carry: CarriedBits,
}

impl<W: Write> Deflate<W> {
    /// 创建压缩器，输出写入 `sink`
    pub fn new(accel: &Accelerator, sink: W) -> Self {
        Self::with_options(accel, sink, DeflateOptions::default())
    }

    pub fn with_options(accel: &Accelerator, sink: W, options: DeflateOptions) -> Self {
        Self {
            accel: accel.clone(),
            options,
            sink,
            aecs: AecsPair::new(),
            histogram: Box::new(Histogram::new()),
            output: AlignedBuf::new(MAX_BLOCK_SIZE + STORED_HEADER_MAX + 1),
            record: CompletionRecord::new(),
            header: DynamicHeader::new(),
            read_cache: None,
            crc: 0,
            carry: CarriedBits::default(),
        }
    }

    pub fn options(&self) -> &DeflateOptions {
        &self.options
    }

    /// 已压缩数据的 CRC-32
    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// 换一个输出重新开始，返回旧输出；缓冲区保留复用
    pub fn reset(&mut self, sink: W) -> W {
        self.crc = 0;
        self.carry = CarriedBits::default();
        self.aecs.reset_toggle();
        mem::replace(&mut self.sink, sink)
    }

    /// 刷新底层输出
    pub fn close(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// 压缩一个块 (最多 32KB)，`last` 表示流的最后一块
    ///
    /// 返回经加速器压缩的输入字节数；空块直接写成存储块并返回 0
    pub fn write_block(&mut self, block: &[u8], last: bool) -> Result<usize> {
        if block.len() > MAX_BLOCK_SIZE {
            return Err(AccelError::BlockTooLarge { size: block.len() });
        }
        let max = self.accel.max_transfer_size();
        if block.len() > max as usize {
            return Err(AccelError::data_size_too_large(block.len(), max));
        }
        if block.is_empty() {
            self.write_stored_block(block, last)?;
            return Ok(0);
        }

        self.aecs.current_mut().reset();
        self.histogram.reset();

        self.collect_statistics(block)?;
        let header_bits = self.generate_header(last)?;
        self.encode_block(block, last, header_bits)?;

        self.aecs.flip();
        Ok(block.len())
    }

    /// 读完 `source` 并压缩，返回读取的字节数
    ///
    /// 双缓冲读取以便知道哪一块是最后一块；空输入写出一个空的最终存储块
    pub fn read_all_from<R: Read>(&mut self, mut source: R) -> Result<u64> {
        let mut cache = match self.read_cache.take() {
            Some(cache) => cache,
            None => [
                AlignedBuf::new(MAX_BLOCK_SIZE),
                AlignedBuf::new(MAX_BLOCK_SIZE),
            ],
        };
        let result = self.pump(&mut source, &mut cache);
        self.read_cache = Some(cache);
        result
    }

    fn pump<R: Read>(&mut self, source: &mut R, cache: &mut [AlignedBuf; 2]) -> Result<u64> {
        let mut total = 0u64;
        let mut cur = 0usize;
        // cache[cur ^ 1] 中待写出的块长度
        let mut pending: Option<usize> = None;
        loop {
            let n = read_full(source, &mut cache[cur])?;
            total += n as u64;

            if n < MAX_BLOCK_SIZE {
                if let Some(len) = pending {
                    if n == 0 {
                        self.write_block(&cache[cur ^ 1][..len], true)?;
                        return Ok(total);
                    }
                    self.write_block(&cache[cur ^ 1][..len], false)?;
                }
                self.write_block(&cache[cur][..n], true)?;
                return Ok(total);
            }

            if let Some(len) = pending {
                self.write_block(&cache[cur ^ 1][..len], false)?;
            }
            pending = Some(n);
            cur ^= 1;
        }
    }

    fn collect_statistics(&mut self, block: &[u8]) -> Result<()> {
        let mut desc = stats_job(block, &mut self.histogram);
        let status = self
            .accel
            .submit(&mut desc, &mut self.record, self.options.wait_mode);
        if status != StatusCode::Success {
            warn!("statistics job failed: {}", self.record);
            return Err(AccelError::hardware(status, self.record.error_code()));
        }
        Ok(())
    }

    /// 生成码表与块头，返回块头位数 (含携带位)
    fn generate_header(&mut self, last: bool) -> Result<usize> {
        let mut lit_lengths = [0u8; LIT_LEN_CODES];
        let mut dist_lengths = [0u8; DIST_CODES];
        huffman::code_lengths(&self.histogram.lit_len, MAX_CODE_LEN, &mut lit_lengths);
        huffman::code_lengths(&self.histogram.dist, MAX_CODE_LEN, &mut dist_lengths);

        let aecs = self.aecs.current_mut();
        huffman::pack_codes(&lit_lengths, &mut aecs.codes.lit_len);
        huffman::pack_codes(&dist_lengths, &mut aecs.codes.dist);

        let mut w = HeaderWriter::new(&mut aecs.output_accumulator);
        if self.carry.len != 0 {
            w.write_bits(self.carry.bits as u16, self.carry.len);
        }
        self.header.write_to(&lit_lengths, &dist_lengths, last, &mut w);
        let bits = w.flush()?;

        aecs.num_acc_bits_valid = bits as u32;
        aecs.crc = self.crc;
        Ok(bits)
    }

    fn encode_block(&mut self, block: &[u8], last: bool, header_bits: usize) -> Result<()> {
        let max = self.accel.max_transfer_size() as usize;
        let out_len = self.output.len().min(max);
        let toggle = self.aecs.toggle();

        let mut desc = encode_job(
            block,
            &mut self.output[..out_len],
            self.aecs.slots_mut(),
            toggle,
        );
        let status = self
            .accel
            .submit(&mut desc, &mut self.record, self.options.wait_mode);

        match status {
            StatusCode::Success => {}
            StatusCode::OutputBufferOverflow => return self.store_after_overflow(block, last),
            StatusCode::AnalyticsError
                if self.record.error_code() == ErrorCode::UnrecoverableOutputOverflow =>
            {
                return self.store_after_overflow(block, last);
            }
            _ => {
                warn!("encode job failed: {}", self.record);
                return Err(AccelError::hardware(status, self.record.error_code()));
            }
        }

        self.crc = self.record.crc;
        let mut size = self.record.output_size as usize;
        if size == 0 {
            return Ok(());
        }
        if size > block.len() + STORED_HEADER_MAX {
            debug!(
                "block of {} bytes grew to {} bytes ({} header bits), storing",
                block.len(),
                size,
                header_bits
            );
            return self.write_stored_block(block, last);
        }

        let bits = self.record.output_bits;
        if bits != 0 && !last {
            if bits >= 8 {
                return Err(AccelError::OutputBitsOutOfRange { bits });
            }
            size -= 1;
            self.carry = CarriedBits {
                bits: self.output[size] & ((1u8 << bits) - 1),
                len: bits,
            };
        } else {
            self.carry = CarriedBits::default();
        }

        self.sink.write_all(&self.output[..size])?;
        Ok(())
    }

    /// 溢出时完成记录里的 CRC 不可信，由软件补算
    fn store_after_overflow(&mut self, block: &[u8], last: bool) -> Result<()> {
        debug!(
            "output overflow on {} byte block ({}), storing",
            block.len(),
            self.record.status()
        );
        let mut hasher = crc32fast::Hasher::new_with_initial(self.crc);
        hasher.update(block);
        self.crc = hasher.finalize();
        self.write_stored_block(block, last)
    }

    /// 写存储块：携带位 + 3 位块头合为 1 或 2 字节，随后 LEN/NLEN 与原始数据
    fn write_stored_block(&mut self, block: &[u8], last: bool) -> Result<()> {
        let hdr = self.carry.bits as u16 | ((last as u16) << self.carry.len);
        let mut offset = 1;
        self.output[0] = hdr as u8;
        if self.carry.len + 3 > 8 {
            self.output[1] = (hdr >> 8) as u8;
            offset = 2;
        }

        let len = block.len() as u16;
        self.output[offset..offset + 2].copy_from_slice(&len.to_le_bytes());
        self.output[offset + 2..offset + 4].copy_from_slice(&(!len).to_le_bytes());
        offset += 4;
        self.output[offset..offset + block.len()].copy_from_slice(block);

        self.carry = CarriedBits::default();
        self.sink.write_all(&self.output[..offset + block.len()])?;
        Ok(())
    }
}

impl<W: Write> BlockWriter for Deflate<W> {
    type Sink = W;

    fn write_block(&mut self, block: &[u8], last: bool) -> Result<usize> {
        Deflate::write_block(self, block, last)
    }

    fn reset(&mut self, sink: W) -> W {
        Deflate::reset(self, sink)
    }

    fn close(&mut self) -> Result<()> {
        Deflate::close(self)
    }
}

impl<W: Write> fmt::Debug for Deflate<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deflate")
            .field("options", &self.options)
            .field("crc", &self.crc)
            .field("carry", &self.carry)
            .field("aecs", &self.aecs)
            .finish_non_exhaustive()
    }
}

fn stats_job<'a>(block: &'a [u8], histogram: &'a mut Histogram) -> Descriptor<'a> {
    Descriptor::new(Opcode::Compress, block, Destination::Histogram(histogram))
        .with_flags(
            DescriptorFlags::BLOCK_ON_FAULT
                | DescriptorFlags::CACHE_CONTROL
                | DescriptorFlags::REQUEST_COMPLETION_RECORD
                | DescriptorFlags::COMPLETION_RECORD_VALID,
        )
        .with_compression_flags(CompressionFlags::STATS_MODE | CompressionFlags::END_APPEND_EOB)
}

fn encode_job<'a>(
    block: &'a [u8],
    output: &'a mut [u8],
    aecs: &'a mut [CompressAecs; 2],
    toggle: u8,
) -> Descriptor<'a> {
    Descriptor::new(Opcode::Compress, block, Destination::Bytes(output))
        .with_flags(
            DescriptorFlags::BLOCK_ON_FAULT
                | DescriptorFlags::CACHE_CONTROL
                | DescriptorFlags::COMPLETION_RECORD_VALID
                | DescriptorFlags::READ_SOURCE_2_AECS
                | DescriptorFlags::WRITE_SOURCE_2_COMPLETION_OF_OPERATION
                | DescriptorFlags::REQUEST_COMPLETION_RECORD,
        )
        .with_compression_flags(CompressionFlags::END_APPEND_EOB | CompressionFlags::FLUSH_OUTPUT)
        .with_aecs(AecsRegion::Compress(aecs), toggle)
}

/// 读满 `buf` 或直到输入结束
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
