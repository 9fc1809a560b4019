//! DEFLATE 解压流
//!
//! 解码全部由加速器完成，这里只维护跨调用的输入余量、输出余量、
//! AECS 切换与流状态 (首块/中间/最后)。

use std::fmt;
use std::io::{self, Read};
use std::mem;

use log::{trace, warn};

use super::MAX_MATCH;
use crate::config::InflateOptions;
use crate::device::{
    Accelerator, AecsPair, AecsRegion, CompletionRecord, DecompressAecs, DecompressionFlags,
    Descriptor, DescriptorFlags, Destination, Opcode,
};
use crate::error::{AccelError, ErrorCode, Result, StatusCode};
use crate::mem::AlignedBuf;

/// 解压流状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// 还没有提交过作业，AECS 里没有可读的续接状态
    First,
    Middle,
    /// 输入已读完
    Last,
}

impl StreamState {
    fn aecs_flags(self) -> DescriptorFlags {
        match self {
            StreamState::First => DescriptorFlags::WRITE_SOURCE_2_COMPLETION_OF_OPERATION,
            StreamState::Middle => {
                DescriptorFlags::READ_SOURCE_2_AECS
                    | DescriptorFlags::WRITE_SOURCE_2_COMPLETION_OF_OPERATION
            }
            StreamState::Last => {
                DescriptorFlags::READ_SOURCE_2_AECS
                    | DescriptorFlags::WRITE_SOURCE_2_ONLY_IF_OUTPUT_OVERFLOW
            }
        }
    }
}

/// DEFLATE 解压器，实现 [`Read`]
pub struct Inflate<R: Read> {
    accel: Accelerator,
    options: InflateOptions,
    source: R,
    /// 输入缓冲区，前 `remnant` 字节尚未交给加速器消费
    buffer: AlignedBuf,
    remnant: usize,
    /// 溢出重试产生但调用方还没取走的输出
    output_remnant: Vec<u8>,
    scratch: AlignedBuf,
    aecs: AecsPair<DecompressAecs>,
    record: CompletionRecord,
    state: StreamState,
    finished: bool,
    /// 致命错误后拒绝继续读取，直到 reset
    poisoned: Option<(StatusCode, ErrorCode)>,
}

impl<R: Read> Inflate<R> {
    /// 创建解压器，输入缓冲区默认 4096 字节
    pub fn new(accel: &Accelerator, source: R) -> Result<Self> {
        Self::with_options(accel, source, InflateOptions::default())
    }

    pub fn with_options(accel: &Accelerator, source: R, options: InflateOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            accel: accel.clone(),
            buffer: AlignedBuf::new(options.buffer_size),
            options,
            source,
            remnant: 0,
            output_remnant: Vec::new(),
            scratch: AlignedBuf::new(MAX_MATCH),
            aecs: AecsPair::new(),
            record: CompletionRecord::new(),
            state: StreamState::First,
            finished: false,
            poisoned: None,
        })
    }

    pub fn options(&self) -> &InflateOptions {
        &self.options
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// 换一个输入重新开始，返回旧输入；缓冲区保留复用
    pub fn reset(&mut self, source: R) -> R {
        self.remnant = 0;
        self.output_remnant.clear();
        self.aecs.reset_toggle();
        self.record.reset();
        self.state = StreamState::First;
        self.finished = false;
        self.poisoned = None;
        mem::replace(&mut self.source, source)
    }

    /// 一次性解压 `compressed` 到 `dest`，返回解压后的字节数
    ///
    /// 调用方保证 `dest` 足够大。作业使用独立的 AECS 与完成记录，
    /// 进行中的流读取不受影响
    pub fn decompress_all(&self, compressed: &[u8], dest: &mut [u8]) -> Result<usize> {
        let max = self.accel.max_transfer_size();
        if compressed.len() > max as usize {
            return Err(AccelError::data_size_too_large(compressed.len(), max));
        }
        if dest.len() > max as usize {
            return Err(AccelError::data_size_too_large(dest.len(), max));
        }

        let mut aecs: AecsPair<DecompressAecs> = AecsPair::new();
        let mut record = CompletionRecord::new();
        let mut desc = decompress_job(compressed, dest, aecs.slots_mut(), 0, StreamState::First);
        let status = self
            .accel
            .submit(&mut desc, &mut record, self.options.wait_mode);
        if status != StatusCode::Success {
            warn!("decompress job failed: {}", record);
            return Err(AccelError::hardware(status, record.error_code()));
        }
        Ok(record.output_size as usize)
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        if let Some((status, code)) = self.poisoned {
            return Err(AccelError::hardware(status, code));
        }

        if !self.output_remnant.is_empty() && !buf.is_empty() {
            let n = buf.len().min(self.output_remnant.len());
            buf[..n].copy_from_slice(&self.output_remnant[..n]);
            self.output_remnant.drain(..n);
            return Ok(n);
        }

        if self.finished || buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.remnant == 0 && self.state != StreamState::Last {
                let n = read_retrying(&mut self.source, &mut self.buffer)?;
                if n == 0 {
                    self.state = StreamState::Last;
                } else {
                    self.remnant = n;
                }
            }

            let produced = self.decode_step(buf)?;
            if produced != 0 || self.finished {
                return Ok(produced);
            }
        }
    }

    /// 提交一次解压作业 (溢出且无输出时再重试一次)，返回写入 `buf` 的字节数
    fn decode_step(&mut self, buf: &mut [u8]) -> Result<usize> {
        let max = self.accel.max_transfer_size() as usize;
        let out_len = buf.len().min(max);

        let (status, offered) = self.submit_decode(Target::Caller(&mut buf[..out_len]), max);
        let mut produced = self.record.output_size as usize;

        match status {
            StatusCode::Success => self.consume_success(offered),
            StatusCode::OutputBufferOverflow => {
                self.consume_overflow();
                if produced == 0 {
                    trace!("output overflow without progress, retrying into scratch");
                    // 续接状态写在另一个槽里
                    self.aecs.flip();
                    if self.state == StreamState::First {
                        self.state = StreamState::Middle;
                    }

                    let (status, offered) = self.submit_decode(Target::Scratch, max);
                    match status {
                        StatusCode::Success => self.consume_success(offered),
                        StatusCode::OutputBufferOverflow => self.consume_overflow(),
                        _ => return Err(self.poison(status)),
                    }

                    let size = self.record.output_size as usize;
                    let n = size.min(out_len);
                    buf[..n].copy_from_slice(&self.scratch[..n]);
                    self.output_remnant.extend_from_slice(&self.scratch[n..size]);
                    produced = n;
                }
            }
            _ => return Err(self.poison(status)),
        }

        self.aecs.flip();
        if self.state == StreamState::First {
            self.state = StreamState::Middle;
        }
        Ok(produced)
    }

    /// 提交解压作业，返回状态与交给加速器的输入字节数
    fn submit_decode(&mut self, target: Target<'_>, max: usize) -> (StatusCode, usize) {
        let offered = self.remnant.min(max);
        // 只有交出全部剩余输入时才能按最后一块处理
        let job_state = match self.state {
            StreamState::Last if offered < self.remnant => StreamState::Middle,
            state => state,
        };
        let toggle = self.aecs.toggle();
        let dst = match target {
            Target::Caller(out) => out,
            Target::Scratch => &mut self.scratch[..],
        };
        let mut desc = decompress_job(
            &self.buffer[..offered],
            dst,
            self.aecs.slots_mut(),
            toggle,
            job_state,
        );
        let status = self
            .accel
            .submit(&mut desc, &mut self.record, self.options.wait_mode);
        (status, offered)
    }

    fn consume_success(&mut self, offered: usize) {
        self.shift_input(offered);
        if self.state == StreamState::Last && self.remnant == 0 {
            self.finished = true;
        }
    }

    fn consume_overflow(&mut self) {
        let consumed = (self.record.bytes_completed as usize).min(self.remnant);
        self.shift_input(consumed);
    }

    fn shift_input(&mut self, consumed: usize) {
        self.buffer.copy_within(consumed..self.remnant, 0);
        self.remnant -= consumed;
    }

    fn poison(&mut self, status: StatusCode) -> AccelError {
        let code = self.record.error_code();
        warn!("decompress job failed: {}", self.record);
        self.poisoned = Some((status, code));
        AccelError::hardware(status, code)
    }
}

impl<R: Read> Read for Inflate<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_inner(buf).map_err(io::Error::from)
    }
}

impl<R: Read> fmt::Debug for Inflate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inflate")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("remnant", &self.remnant)
            .field("output_remnant", &self.output_remnant.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

enum Target<'a> {
    Caller(&'a mut [u8]),
    Scratch,
}

fn decompress_job<'a>(
    input: &'a [u8],
    output: &'a mut [u8],
    aecs: &'a mut [DecompressAecs; 2],
    toggle: u8,
    state: StreamState,
) -> Descriptor<'a> {
    Descriptor::new(Opcode::Decompress, input, Destination::Bytes(output))
        .with_flags(
            DescriptorFlags::BLOCK_ON_FAULT
                | DescriptorFlags::CACHE_CONTROL
                | DescriptorFlags::COMPLETION_RECORD_VALID
                | DescriptorFlags::REQUEST_COMPLETION_RECORD
                | state.aecs_flags(),
        )
        .with_decompression_flags(
            DecompressionFlags::ENABLE_DECOMPRESSION
                | DecompressionFlags::STOP_ON_EOB
                | DecompressionFlags::FLUSH_OUTPUT
                | DecompressionFlags::SELECT_B_FINAL_EOB,
        )
        .with_aecs(AecsRegion::Decompress(aecs), toggle)
}

fn read_retrying<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
