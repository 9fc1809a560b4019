// 公共测试辅助函数
// 软件实现的加速器：压缩作业做确定性 LZ77 + 给定码表编码，
// 解压作业把解码状态完整存入 AECS，以检验 AECS 切换与余量处理

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use iaa_deflate::device::{
    AecsRegion, CompletionRecord, CompressAecs, CompressionFlags, DecompressAecs, Descriptor,
    DescriptorFlags, Destination, Opcode, Submitter,
};
use iaa_deflate::{Accelerator, ErrorCode, StatusCode};
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simplelog::{Config, TestLogger};

/// 初始化测试日志，可重复调用
pub fn init_logging() {
    let _ = TestLogger::init(LevelFilter::Trace, Config::default());
}

/// 固定种子的随机字节
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf[..]);
    buf
}

/// 固定种子的可压缩文本
pub fn random_text(len: usize, seed: u64) -> Vec<u8> {
    const WORDS: &[&str] = &[
        "stream", "block", "huffman", "window", "accelerator", "deflate", "gzip", "record",
        "literal", "length", "distance", "header", "crc", "toggle", "state", "the", "a", "of",
    ];
    let mut rng = StdRng::seed_from_u64(seed);
    let mut text = Vec::with_capacity(len + 16);
    while text.len() < len {
        text.extend_from_slice(WORDS[rng.gen_range(0..WORDS.len())].as_bytes());
        text.push(if rng.gen_ratio(1, 12) { b'\n' } else { b' ' });
    }
    text.truncate(len);
    text
}

/// 软件加速器
pub struct SoftDevice {
    max_transfer: u32,
    ready: bool,
    unrecoverable_overflow: bool,
    submissions: AtomicUsize,
    encode_faults: Mutex<VecDeque<(StatusCode, ErrorCode)>>,
    decode_faults: Mutex<VecDeque<(StatusCode, ErrorCode)>>,
}

impl Default for SoftDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftDevice {
    pub fn new() -> Self {
        Self {
            max_transfer: 1 << 21,
            ready: true,
            unrecoverable_overflow: false,
            submissions: AtomicUsize::new(0),
            encode_faults: Mutex::new(VecDeque::new()),
            decode_faults: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_max_transfer(mut self, max: u32) -> Self {
        self.max_transfer = max;
        self
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// 编码溢出时报告 AnalyticsError + UnrecoverableOutputOverflow
    pub fn unrecoverable_overflow(mut self) -> Self {
        self.unrecoverable_overflow = true;
        self
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// 下一个编码作业 (非统计) 直接返回该状态
    pub fn fail_next_encode(&self, status: StatusCode, code: ErrorCode) {
        self.encode_faults.lock().unwrap().push_back((status, code));
    }

    /// 下一个解压作业直接返回该状态
    pub fn fail_next_decode(&self, status: StatusCode, code: ErrorCode) {
        self.decode_faults.lock().unwrap().push_back((status, code));
    }

    fn statistics(&self, desc: &mut Descriptor<'_>) -> (StatusCode, ErrorCode) {
        let append_eob = desc
            .compression_flags()
            .contains(CompressionFlags::END_APPEND_EOB);
        let tokens = lz77(desc.src1);
        let Destination::Histogram(hist) = &mut desc.dst else {
            return (StatusCode::InvalidFlags, ErrorCode::None);
        };
        for token in tokens {
            match token {
                Token::Literal(b) => hist.lit_len[b as usize] += 1,
                Token::Match { len, dist } => {
                    hist.lit_len[257 + length_symbol(len)] += 1;
                    hist.dist[distance_symbol(dist)] += 1;
                }
            }
        }
        if append_eob {
            hist.lit_len[256] += 1;
        }
        (StatusCode::Success, ErrorCode::None)
    }

    fn encode(
        &self,
        desc: &mut Descriptor<'_>,
        record: &mut CompletionRecord,
    ) -> (StatusCode, ErrorCode) {
        if let Some(fault) = self.encode_faults.lock().unwrap().pop_front() {
            record.crc = 0xdead_beef;
            return fault;
        }

        let read = desc.read_slot();
        let write = desc.write_slot();
        let op = desc.compression_flags();
        let src = desc.src1;
        let state = match (&desc.aecs, desc.flags.contains(DescriptorFlags::READ_SOURCE_2_AECS)) {
            (Some(AecsRegion::Compress(slots)), true) => slots[read].clone(),
            (_, true) => return (StatusCode::InvalidFlags, ErrorCode::None),
            _ => CompressAecs::new(),
        };

        let mut out = BitWriter::default();
        for i in 0..state.num_acc_bits_valid as usize {
            out.put(u32::from(state.output_accumulator[i / 8] >> (i % 8)) & 1, 1);
        }
        let codes = &state.codes;
        for token in lz77(src) {
            let ok = match token {
                Token::Literal(b) => out.code(codes.lit_len[b as usize]),
                Token::Match { len, dist } => {
                    let sym = length_symbol(len);
                    let dsym = distance_symbol(dist);
                    let ok = out.code(codes.lit_len[257 + sym]);
                    out.put(u32::from(len - LEN_BASE[sym]), LEN_EXTRA[sym]);
                    let dok = out.code(codes.dist[dsym]);
                    out.put(u32::from(dist - DIST_BASE[dsym]), DIST_EXTRA[dsym]);
                    ok && dok
                }
            };
            if !ok {
                return (StatusCode::AnalyticsError, ErrorCode::InvalidHuffmanCode);
            }
        }
        if op.contains(CompressionFlags::END_APPEND_EOB) && !out.code(codes.lit_len[256]) {
            return (StatusCode::AnalyticsError, ErrorCode::InvalidHuffmanCode);
        }

        let bits = out.bits;
        let bytes = out.finish();
        let Destination::Bytes(dst) = &mut desc.dst else {
            return (StatusCode::InvalidFlags, ErrorCode::None);
        };
        if bytes.len() > dst.len() {
            record.output_size = dst.len() as u32;
            record.crc = 0xdead_beef;
            return if self.unrecoverable_overflow {
                (StatusCode::AnalyticsError, ErrorCode::UnrecoverableOutputOverflow)
            } else {
                (StatusCode::OutputBufferOverflow, ErrorCode::None)
            };
        }
        dst[..bytes.len()].copy_from_slice(&bytes);

        let mut hasher = crc32fast::Hasher::new_with_initial(state.crc);
        hasher.update(src);
        let crc = hasher.finalize();

        record.bytes_completed = src.len() as u32;
        record.output_size = bytes.len() as u32;
        record.output_bits = (bits % 8) as u8;
        record.crc = crc;

        if desc
            .flags
            .contains(DescriptorFlags::WRITE_SOURCE_2_COMPLETION_OF_OPERATION)
        {
            if let Some(AecsRegion::Compress(slots)) = &mut desc.aecs {
                let mut next = state;
                next.crc = crc;
                slots[write] = next;
            }
        }
        (StatusCode::Success, ErrorCode::None)
    }

    fn decode(
        &self,
        desc: &mut Descriptor<'_>,
        record: &mut CompletionRecord,
    ) -> (StatusCode, ErrorCode) {
        if let Some(fault) = self.decode_faults.lock().unwrap().pop_front() {
            return fault;
        }

        let flags = desc.flags;
        let read = desc.read_slot();
        let write = desc.write_slot();
        let last = flags.contains(DescriptorFlags::WRITE_SOURCE_2_ONLY_IF_OUTPUT_OVERFLOW);
        let src_len = desc.src1.len();

        let mut state = if flags.contains(DescriptorFlags::READ_SOURCE_2_AECS) {
            match &desc.aecs {
                Some(AecsRegion::Decompress(slots)) => match InflateState::load(&slots[read]) {
                    Ok(state) => state,
                    Err(code) => return (StatusCode::AnalyticsError, code),
                },
                _ => return (StatusCode::InvalidFlags, ErrorCode::None),
            }
        } else {
            InflateState::new()
        };

        let pend = state.stash.len();
        let mut combined = std::mem::take(&mut state.stash);
        combined.extend_from_slice(desc.src1);

        let Destination::Bytes(out) = &mut desc.dst else {
            return (StatusCode::InvalidFlags, ErrorCode::None);
        };
        let (stop, pos, produced) = match state.run(&combined, out) {
            Ok(v) => v,
            Err(code) => return (StatusCode::AnalyticsError, code),
        };
        record.output_size = produced as u32;

        let byte = pos / 8;
        state.skip = (pos % 8) as u8;
        let status = match stop {
            Stop::Overflow => {
                if byte >= pend {
                    record.bytes_completed = (byte - pend) as u32;
                } else {
                    state.stash = combined[byte..pend].to_vec();
                    record.bytes_completed = 0;
                }
                StatusCode::OutputBufferOverflow
            }
            Stop::NeedInput if last => {
                record.bytes_completed = src_len as u32;
                return (StatusCode::AnalyticsError, ErrorCode::BadEndOfFile);
            }
            Stop::NeedInput => {
                state.stash = combined[byte..].to_vec();
                record.bytes_completed = src_len as u32;
                StatusCode::Success
            }
            Stop::Finished => {
                state.skip = 0;
                record.bytes_completed = src_len as u32;
                StatusCode::Success
            }
        };

        let write_back = flags.contains(DescriptorFlags::WRITE_SOURCE_2_COMPLETION_OF_OPERATION)
            || (status == StatusCode::OutputBufferOverflow && last);
        if write_back {
            if let Some(AecsRegion::Decompress(slots)) = &mut desc.aecs {
                if let Err(code) = state.store(&mut slots[write]) {
                    return (StatusCode::AnalyticsError, code);
                }
            }
        }
        (status, ErrorCode::None)
    }
}

impl Submitter for SoftDevice {
    fn submit(&self, desc: &mut Descriptor<'_>, record: &mut CompletionRecord) -> StatusCode {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let (status, code) = match desc.opcode {
            Opcode::Compress if desc.compression_flags().contains(CompressionFlags::STATS_MODE) => {
                self.statistics(desc)
            }
            Opcode::Compress => self.encode(desc, record),
            Opcode::Decompress => self.decode(desc, record),
            Opcode::Noop => (StatusCode::Success, ErrorCode::None),
        };
        record.set_status(status);
        record.set_error_code(code);
        status
    }

    fn max_transfer_size(&self) -> u32 {
        self.max_transfer
    }

    fn ready(&self) -> bool {
        self.ready
    }
}

/// 默认软件加速器
pub fn accelerator() -> (Arc<SoftDevice>, Accelerator) {
    accelerator_with(SoftDevice::new())
}

pub fn accelerator_with(dev: SoftDevice) -> (Arc<SoftDevice>, Accelerator) {
    let dev = Arc::new(dev);
    let accel = Accelerator::new(dev.clone()).expect("soft device is ready");
    (dev, accel)
}

// ---------------------------------------------------------------------------
// LZ77 与编码

const WINDOW: usize = 4096;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 258;
const HASH_BITS: u32 = 12;
const MAX_CHAIN: usize = 32;

const LEN_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];
const LEN_EXTRA: [u32; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DIST_EXTRA: [u32; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

#[derive(Debug, Clone, Copy)]
enum Token {
    Literal(u8),
    Match { len: u16, dist: u16 },
}

fn length_symbol(len: u16) -> usize {
    (0..LEN_BASE.len()).rev().find(|&i| LEN_BASE[i] <= len).unwrap_or(0)
}

fn distance_symbol(dist: u16) -> usize {
    (0..DIST_BASE.len()).rev().find(|&i| DIST_BASE[i] <= dist).unwrap_or(0)
}

fn hash3(data: &[u8], pos: usize) -> usize {
    let v = (u32::from(data[pos]) << 16) | (u32::from(data[pos + 1]) << 8) | u32::from(data[pos + 2]);
    (v.wrapping_mul(0x9e37_79b1) >> (32 - HASH_BITS)) as usize
}

/// 块内贪心匹配，窗口 4KB
fn lz77(data: &[u8]) -> Vec<Token> {
    const NONE: usize = usize::MAX;
    let mut head = vec![NONE; 1 << HASH_BITS];
    let mut prev = vec![NONE; data.len()];
    let mut tokens = Vec::new();

    let insert = |pos: usize, head: &mut [usize], prev: &mut [usize]| {
        if pos + MIN_MATCH <= data.len() {
            let h = hash3(data, pos);
            prev[pos] = head[h];
            head[h] = pos;
        }
    };

    let mut i = 0;
    while i < data.len() {
        let mut best_len = 0;
        let mut best_dist = 0;
        if i + MIN_MATCH <= data.len() {
            let max = (data.len() - i).min(MAX_MATCH);
            let mut cand = head[hash3(data, i)];
            let mut steps = 0;
            while cand != NONE && i - cand <= WINDOW && steps < MAX_CHAIN {
                let len = data[cand..]
                    .iter()
                    .zip(&data[i..i + max])
                    .take_while(|(a, b)| a == b)
                    .count();
                if len > best_len {
                    best_len = len;
                    best_dist = i - cand;
                    if len == max {
                        break;
                    }
                }
                cand = prev[cand];
                steps += 1;
            }
        }

        if best_len >= MIN_MATCH {
            tokens.push(Token::Match {
                len: best_len as u16,
                dist: best_dist as u16,
            });
            for p in i..i + best_len {
                insert(p, &mut head, &mut prev);
            }
            i += best_len;
        } else {
            tokens.push(Token::Literal(data[i]));
            insert(i, &mut head, &mut prev);
            i += 1;
        }
    }
    tokens
}

#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    count: u32,
    bits: usize,
}

impl BitWriter {
    fn put(&mut self, value: u32, n: u32) {
        if n == 0 {
            return;
        }
        self.acc |= u64::from(value & ((1u32 << n) - 1)) << self.count;
        self.count += n;
        self.bits += n as usize;
        while self.count >= 8 {
            self.bytes.push(self.acc as u8);
            self.acc >>= 8;
            self.count -= 8;
        }
    }

    /// 写一个 `(len << 15) | code` 码表项，码从高位开始发送
    fn code(&mut self, packed: u32) -> bool {
        let len = packed >> 15;
        if len == 0 {
            return false;
        }
        let code = packed & 0x7fff;
        for i in (0..len).rev() {
            self.put((code >> i) & 1, 1);
        }
        true
    }

    fn finish(mut self) -> Vec<u8> {
        if self.count > 0 {
            self.bytes.push(self.acc as u8);
        }
        self.bytes
    }
}

// ---------------------------------------------------------------------------
// 可续接的解码器

const HISTORY: usize = 4096;

const OFF_HIST_LEN: usize = 0;
const OFF_HIST: usize = 2;
const OFF_MODE: usize = OFF_HIST + HISTORY;
const OFF_LAST: usize = OFF_MODE + 1;
const OFF_STORED: usize = OFF_LAST + 1;
const OFF_SKIP: usize = OFF_STORED + 2;
const OFF_STASH_LEN: usize = OFF_SKIP + 1;
const OFF_LENGTHS: usize = OFF_STASH_LEN + 2;
const LENGTHS: usize = 288 + 32;
const OFF_STASH_TAIL: usize = OFF_LENGTHS + LENGTHS;
const STASH_HEAD: usize = 256;
const STASH_CAP: usize = STASH_HEAD + iaa_deflate::device::aecs::DECOMPRESS_INTERNAL_STATE - OFF_STASH_TAIL;

const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Header,
    Stored,
    Codes,
    Done,
}

enum Stop {
    NeedInput,
    Overflow,
    Finished,
}

enum Unit {
    Progress,
    NeedInput,
    Overflow,
    Finished,
}

struct InflateState {
    history: Vec<u8>,
    mode: Mode,
    last: bool,
    stored_left: u16,
    /// 首字节中已消费的位数
    skip: u8,
    lengths: [u8; LENGTHS],
    /// 未完成单元的输入字节
    stash: Vec<u8>,
}

impl InflateState {
    fn new() -> Self {
        Self {
            history: Vec::new(),
            mode: Mode::Header,
            last: false,
            stored_left: 0,
            skip: 0,
            lengths: [0; LENGTHS],
            stash: Vec::new(),
        }
    }

    fn load(aecs: &DecompressAecs) -> Result<Self, ErrorCode> {
        let s = &aecs.internal_state;
        let u16_at = |off: usize| u16::from_le_bytes([s[off], s[off + 1]]) as usize;

        let hist_len = u16_at(OFF_HIST_LEN);
        let stash_len = u16_at(OFF_STASH_LEN);
        if hist_len > HISTORY || stash_len > STASH_CAP {
            return Err(ErrorCode::AecsError);
        }
        let mode = match s[OFF_MODE] {
            0 => Mode::Header,
            1 => Mode::Stored,
            2 => Mode::Codes,
            3 => Mode::Done,
            _ => return Err(ErrorCode::AecsError),
        };

        let mut lengths = [0u8; LENGTHS];
        lengths.copy_from_slice(&s[OFF_LENGTHS..OFF_LENGTHS + LENGTHS]);
        let mut stash = Vec::with_capacity(stash_len);
        let head = stash_len.min(STASH_HEAD);
        stash.extend_from_slice(&aecs.input_accumulator[..head]);
        stash.extend_from_slice(&s[OFF_STASH_TAIL..OFF_STASH_TAIL + (stash_len - head)]);

        Ok(Self {
            history: s[OFF_HIST..OFF_HIST + hist_len].to_vec(),
            mode,
            last: s[OFF_LAST] != 0,
            stored_left: u16_at(OFF_STORED) as u16,
            skip: s[OFF_SKIP] & 7,
            lengths,
            stash,
        })
    }

    fn store(&self, aecs: &mut DecompressAecs) -> Result<(), ErrorCode> {
        if self.stash.len() > STASH_CAP || self.history.len() > HISTORY {
            return Err(ErrorCode::AecsError);
        }
        aecs.reset();
        let s = &mut aecs.internal_state;
        s[OFF_HIST_LEN..OFF_HIST_LEN + 2].copy_from_slice(&(self.history.len() as u16).to_le_bytes());
        s[OFF_HIST..OFF_HIST + self.history.len()].copy_from_slice(&self.history);
        s[OFF_MODE] = match self.mode {
            Mode::Header => 0,
            Mode::Stored => 1,
            Mode::Codes => 2,
            Mode::Done => 3,
        };
        s[OFF_LAST] = self.last as u8;
        s[OFF_STORED..OFF_STORED + 2].copy_from_slice(&self.stored_left.to_le_bytes());
        s[OFF_SKIP] = self.skip;
        s[OFF_STASH_LEN..OFF_STASH_LEN + 2].copy_from_slice(&(self.stash.len() as u16).to_le_bytes());
        s[OFF_LENGTHS..OFF_LENGTHS + LENGTHS].copy_from_slice(&self.lengths);

        let head = self.stash.len().min(STASH_HEAD);
        let tail = self.stash.len() - head;
        s[OFF_STASH_TAIL..OFF_STASH_TAIL + tail].copy_from_slice(&self.stash[head..]);
        aecs.input_accumulator[..head].copy_from_slice(&self.stash[..head]);
        Ok(())
    }

    /// 解码到输入用完、输出放不下或最终块结束，返回停止原因、停止位置 (位) 与输出字节数
    fn run(&mut self, input: &[u8], out: &mut [u8]) -> Result<(Stop, usize, usize), ErrorCode> {
        let mut reader = BitReader {
            data: input,
            pos: self.skip as usize,
        };
        let mut sink = OutSink {
            out,
            produced: 0,
            window: std::mem::take(&mut self.history),
        };
        let mut tables = match self.mode {
            Mode::Codes => Some(Tables::new(&self.lengths)?),
            _ => None,
        };

        let stop = loop {
            let start = reader.pos;
            match self.step(&mut tables, &mut reader, &mut sink)? {
                Unit::Progress => {}
                Unit::NeedInput => {
                    reader.pos = start;
                    break Stop::NeedInput;
                }
                Unit::Overflow => {
                    reader.pos = start;
                    break Stop::Overflow;
                }
                Unit::Finished => break Stop::Finished,
            }
        };

        let keep = sink.window.len().saturating_sub(HISTORY);
        self.history = sink.window.split_off(keep);
        Ok((stop, reader.pos, sink.produced))
    }

    /// 处理一个原子单元；只有单元完整时才修改状态
    fn step(
        &mut self,
        tables: &mut Option<Tables>,
        r: &mut BitReader<'_>,
        sink: &mut OutSink<'_>,
    ) -> Result<Unit, ErrorCode> {
        match self.mode {
            Mode::Done => Ok(Unit::Finished),
            Mode::Header => {
                let (Some(last), Some(kind)) = (r.bits(1), r.bits(2)) else {
                    return Ok(Unit::NeedInput);
                };
                match kind {
                    0 => {
                        r.align();
                        let (Some(len), Some(nlen)) = (r.bits(16), r.bits(16)) else {
                            return Ok(Unit::NeedInput);
                        };
                        if len != !nlen & 0xffff {
                            return Err(ErrorCode::InvalidStoredLength);
                        }
                        self.mode = Mode::Stored;
                        self.stored_left = len as u16;
                    }
                    1 => {
                        self.lengths = fixed_lengths();
                        *tables = Some(Tables::new(&self.lengths)?);
                        self.mode = Mode::Codes;
                    }
                    2 => {
                        let Some(lengths) = dynamic_lengths(r)? else {
                            return Ok(Unit::NeedInput);
                        };
                        *tables = Some(Tables::new(&lengths)?);
                        self.lengths = lengths;
                        self.mode = Mode::Codes;
                    }
                    _ => return Err(ErrorCode::InvalidBlockType),
                }
                self.last = last == 1;
                Ok(Unit::Progress)
            }
            Mode::Stored => {
                if self.stored_left == 0 {
                    self.end_block();
                    return Ok(Unit::Progress);
                }
                let avail = r.remaining_bytes();
                if avail == 0 {
                    return Ok(Unit::NeedInput);
                }
                if sink.room() == 0 {
                    return Ok(Unit::Overflow);
                }
                let n = avail.min(sink.room()).min(self.stored_left as usize);
                for &b in r.take_bytes(n) {
                    sink.push(b);
                }
                self.stored_left -= n as u16;
                Ok(Unit::Progress)
            }
            Mode::Codes => {
                let Some(t) = tables.as_ref() else {
                    return Err(ErrorCode::AecsError);
                };
                let Some(sym) = decode(r, &t.lit, ErrorCode::BadLlCodes)? else {
                    return Ok(Unit::NeedInput);
                };
                let sym = sym as usize;
                if sym < 256 {
                    if sink.room() == 0 {
                        return Ok(Unit::Overflow);
                    }
                    sink.push(sym as u8);
                    return Ok(Unit::Progress);
                }
                if sym == 256 {
                    self.end_block();
                    return Ok(Unit::Progress);
                }

                let idx = sym - 257;
                if idx >= LEN_BASE.len() {
                    return Err(ErrorCode::BadLengthDecode);
                }
                let Some(extra) = r.bits(LEN_EXTRA[idx]) else {
                    return Ok(Unit::NeedInput);
                };
                let len = LEN_BASE[idx] as usize + extra as usize;
                let Some(dsym) = decode(r, &t.dist, ErrorCode::BadDCode)? else {
                    return Ok(Unit::NeedInput);
                };
                let dsym = dsym as usize;
                if dsym >= DIST_BASE.len() {
                    return Err(ErrorCode::BadDistanceDecode);
                }
                let Some(dextra) = r.bits(DIST_EXTRA[dsym]) else {
                    return Ok(Unit::NeedInput);
                };
                let dist = DIST_BASE[dsym] as usize + dextra as usize;
                if dist > sink.window.len() || dist > HISTORY {
                    return Err(ErrorCode::DistanceBeforeStartOfFile);
                }
                if sink.room() < len {
                    return Ok(Unit::Overflow);
                }
                for _ in 0..len {
                    let b = sink.window[sink.window.len() - dist];
                    sink.push(b);
                }
                Ok(Unit::Progress)
            }
        }
    }

    fn end_block(&mut self) {
        self.mode = if self.last { Mode::Done } else { Mode::Header };
    }
}

struct OutSink<'a> {
    out: &'a mut [u8],
    produced: usize,
    window: Vec<u8>,
}

impl OutSink<'_> {
    fn room(&self) -> usize {
        self.out.len() - self.produced
    }

    fn push(&mut self, b: u8) {
        self.out[self.produced] = b;
        self.produced += 1;
        self.window.push(b);
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn bits(&mut self, n: u32) -> Option<u32> {
        if self.pos + n as usize > self.data.len() * 8 {
            return None;
        }
        let mut v = 0u32;
        for i in 0..n as usize {
            let p = self.pos + i;
            v |= u32::from((self.data[p / 8] >> (p % 8)) & 1) << i;
        }
        self.pos += n as usize;
        Some(v)
    }

    fn align(&mut self) {
        self.pos = (self.pos + 7) & !7;
    }

    fn remaining_bytes(&self) -> usize {
        self.data.len().saturating_sub(self.pos / 8)
    }

    fn take_bytes(&mut self, n: usize) -> &'a [u8] {
        let start = self.pos / 8;
        self.pos += n * 8;
        &self.data[start..start + n]
    }
}

struct Huffman {
    count: [u16; 16],
    symbol: Vec<u16>,
}

impl Huffman {
    /// 过度订阅的码长被拒绝，不完整的码长允许
    fn new(lengths: &[u8]) -> Option<Self> {
        let mut count = [0u16; 16];
        for &len in lengths {
            count[len as usize] += 1;
        }
        let mut left: i32 = 1;
        for &c in &count[1..] {
            left <<= 1;
            left -= i32::from(c);
            if left < 0 {
                return None;
            }
        }

        let mut offs = [0u16; 16];
        for len in 1..15 {
            offs[len + 1] = offs[len] + count[len];
        }
        let mut symbol = vec![0u16; lengths.len()];
        for (sym, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbol[offs[len as usize] as usize] = sym as u16;
                offs[len as usize] += 1;
            }
        }
        Some(Self { count, symbol })
    }
}

struct Tables {
    lit: Huffman,
    dist: Huffman,
}

impl Tables {
    fn new(lengths: &[u8; LENGTHS]) -> Result<Self, ErrorCode> {
        Ok(Self {
            lit: Huffman::new(&lengths[..288]).ok_or(ErrorCode::BadLlCodeLengths)?,
            dist: Huffman::new(&lengths[288..]).ok_or(ErrorCode::BadDistCodeLengths)?,
        })
    }
}

fn decode(r: &mut BitReader<'_>, h: &Huffman, err: ErrorCode) -> Result<Option<u16>, ErrorCode> {
    let (mut code, mut first, mut index) = (0i32, 0i32, 0i32);
    for len in 1..16 {
        let Some(bit) = r.bits(1) else {
            return Ok(None);
        };
        code |= bit as i32;
        let count = i32::from(h.count[len]);
        if code - count < first {
            return Ok(Some(h.symbol[(index + code - first) as usize]));
        }
        index += count;
        first += count;
        first <<= 1;
        code <<= 1;
    }
    Err(err)
}

fn fixed_lengths() -> [u8; LENGTHS] {
    let mut lengths = [0u8; LENGTHS];
    lengths[..144].fill(8);
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths[280..288].fill(8);
    lengths[288..318].fill(5);
    lengths
}

fn dynamic_lengths(r: &mut BitReader<'_>) -> Result<Option<[u8; LENGTHS]>, ErrorCode> {
    let (Some(nlen), Some(ndist), Some(ncode)) = (r.bits(5), r.bits(5), r.bits(4)) else {
        return Ok(None);
    };
    let nlen = nlen as usize + 257;
    let ndist = ndist as usize + 1;
    let ncode = ncode as usize + 4;
    if nlen > 286 {
        return Err(ErrorCode::TooManyLlCodes);
    }
    if ndist > 30 {
        return Err(ErrorCode::TooManyDCodes);
    }

    let mut cl = [0u8; 19];
    for &slot in &CODE_LENGTH_ORDER[..ncode] {
        let Some(len) = r.bits(3) else {
            return Ok(None);
        };
        cl[slot] = len as u8;
    }
    let cl_huff = Huffman::new(&cl).ok_or(ErrorCode::BadClCodeLengths)?;

    let total = nlen + ndist;
    let mut all = vec![0u8; total];
    let mut index = 0;
    while index < total {
        let Some(sym) = decode(r, &cl_huff, ErrorCode::UndefinedClCode)? else {
            return Ok(None);
        };
        if sym < 16 {
            all[index] = sym as u8;
            index += 1;
            continue;
        }
        let (len, extra_bits, base) = match sym {
            16 => {
                if index == 0 {
                    return Err(ErrorCode::FirstCodeInLlTreeIs16);
                }
                (all[index - 1], 2, 3)
            }
            17 => (0, 3, 3),
            _ => (0, 7, 11),
        };
        let Some(extra) = r.bits(extra_bits) else {
            return Ok(None);
        };
        let repeat = base + extra as usize;
        if index + repeat > total {
            return Err(ErrorCode::BadClCodeLengths);
        }
        all[index..index + repeat].fill(len);
        index += repeat;
    }
    if all[256] == 0 {
        return Err(ErrorCode::NoValidLlCode);
    }

    let mut lengths = [0u8; LENGTHS];
    lengths[..nlen].copy_from_slice(&all[..nlen]);
    lengths[288..288 + ndist].copy_from_slice(&all[nlen..]);
    Ok(Some(lengths))
}
