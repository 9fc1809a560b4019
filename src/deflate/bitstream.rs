//! 块头位写入器
//!
//! 把 DEFLATE 块头按 LSB 优先写入 AECS 的 256 字节输出累加器

use crate::error::{AccelError, Result};

use super::MAX_HEADER_BITS;

/// 攒满 48 位即写出 6 字节
const FLUSH_BITS: u32 = 48;

/// 块头位写入器
#[derive(Debug)]
pub struct HeaderWriter<'a> {
    /// 输出累加器
    buffer: &'a mut [u8; 256],
    /// 已写出的字节数
    written: usize,
    /// 位缓冲区
    bits: u64,
    /// 缓冲区中的位数
    bit_num: u32,
    /// 请求写入的总位数
    acc: usize,
}

impl<'a> HeaderWriter<'a> {
    /// 在累加器上创建写入器
    pub fn new(buffer: &'a mut [u8; 256]) -> Self {
        Self {
            buffer,
            written: 0,
            bits: 0,
            bit_num: 0,
            acc: 0,
        }
    }

    /// 写入 n 位 (n <= 16)
    ///
    /// 超过上限后只计数不写入，由 `flush` 报错
    #[inline]
    pub fn write_bits(&mut self, data: u16, n: u8) {
        debug_assert!(n <= 16);
        if n == 0 {
            return;
        }
        self.acc += n as usize;
        if self.acc > MAX_HEADER_BITS {
            return;
        }

        let mask = (1u64 << n) - 1;
        self.bits |= (data as u64 & mask) << self.bit_num;
        self.bit_num += n as u32;

        if self.bit_num > FLUSH_BITS {
            let bytes = self.bits.to_le_bytes();
            self.buffer[self.written..self.written + 6].copy_from_slice(&bytes[..6]);
            self.written += 6;
            self.bit_num -= FLUSH_BITS;
            self.bits >>= FLUSH_BITS;
        }
    }

    /// 写出剩余位，返回总位数并复位
    pub fn flush(&mut self) -> Result<usize> {
        let acc = self.acc;
        if acc > MAX_HEADER_BITS {
            self.clear();
            return Err(AccelError::HeaderOverflow { bits: acc });
        }

        let available = self.bit_num.div_ceil(8) as usize;
        let bytes = self.bits.to_le_bytes();
        self.buffer[self.written..self.written + available].copy_from_slice(&bytes[..available]);

        self.clear();
        Ok(acc)
    }

    fn clear(&mut self) {
        self.acc = 0;
        self.written = 0;
        self.bits = 0;
        self.bit_num = 0;
    }
}
