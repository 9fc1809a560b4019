//! 动态 Huffman 块头
//!
//! 码长序列的游程编码与 HLIT/HDIST/HCLEN 字段

use super::bitstream::HeaderWriter;
use super::huffman::{self, CODE_LENGTH_ORDER, MAX_CODE_LEN_CODE_LEN};
use crate::device::aecs::{DIST_CODES, LIT_LEN_CODES};

/// 重复前一个码长 3-6 次
const REP_PREV: u8 = 16;
/// 重复 0 3-10 次
const REP_ZERO_SHORT: u8 = 17;
/// 重复 0 11-138 次
const REP_ZERO_LONG: u8 = 18;

/// 游程编码后的一个码长符号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token {
    sym: u8,
    extra: u8,
}

impl Token {
    fn extra_bits(self) -> u8 {
        match self.sym {
            REP_PREV => 2,
            REP_ZERO_SHORT => 3,
            REP_ZERO_LONG => 7,
            _ => 0,
        }
    }
}

/// 动态块头生成器，缓冲区在块间复用
#[derive(Debug)]
pub struct DynamicHeader {
    lengths: Vec<u8>,
    tokens: Vec<Token>,
    clen_freq: [u32; 19],
    clen_lengths: [u8; 19],
}

impl DynamicHeader {
    pub fn new() -> Self {
        Self {
            lengths: Vec::with_capacity(LIT_LEN_CODES + DIST_CODES),
            tokens: Vec::with_capacity(LIT_LEN_CODES + DIST_CODES),
            clen_freq: [0; 19],
            clen_lengths: [0; 19],
        }
    }

    /// 写出块头：BFINAL、BTYPE=2、HLIT/HDIST/HCLEN、码长码长度与码长序列
    ///
    /// 块中没有距离码时补一个码长为 1 的距离码，HDIST 至少为 1
    pub fn write_to(
        &mut self,
        lit_lengths: &[u8],
        dist_lengths: &[u8],
        last: bool,
        w: &mut HeaderWriter<'_>,
    ) {
        let lit_num = lit_lengths
            .iter()
            .rposition(|&l| l != 0)
            .map_or(0, |i| i + 1)
            .max(257);
        let used_dist = dist_lengths.iter().rposition(|&l| l != 0).map(|i| i + 1);

        self.lengths.clear();
        self.lengths.extend_from_slice(&lit_lengths[..lit_num]);
        let dist_num = match used_dist {
            Some(n) => {
                self.lengths.extend_from_slice(&dist_lengths[..n]);
                n
            }
            None => {
                self.lengths.push(1);
                1
            }
        };

        self.run_length_encode();

        self.clen_freq = [0; 19];
        for t in &self.tokens {
            self.clen_freq[t.sym as usize] += 1;
        }
        huffman::code_lengths(&self.clen_freq, MAX_CODE_LEN_CODE_LEN, &mut self.clen_lengths);
        let clen_codes = huffman::reversed_codes(&self.clen_lengths);

        let hclen = CODE_LENGTH_ORDER
            .iter()
            .rposition(|&s| self.clen_lengths[s] != 0)
            .map_or(0, |i| i + 1)
            .max(4);

        w.write_bits(last as u16, 1);
        w.write_bits(0b10, 2);
        w.write_bits((lit_num - 257) as u16, 5);
        w.write_bits((dist_num - 1) as u16, 5);
        w.write_bits((hclen - 4) as u16, 4);

        for &sym in &CODE_LENGTH_ORDER[..hclen] {
            w.write_bits(self.clen_lengths[sym] as u16, 3);
        }

        for t in &self.tokens {
            let sym = t.sym as usize;
            w.write_bits(clen_codes[sym], self.clen_lengths[sym]);
            let extra = t.extra_bits();
            if extra != 0 {
                w.write_bits(t.extra as u16, extra);
            }
        }
    }

    fn run_length_encode(&mut self) {
        self.tokens.clear();
        let seq = &self.lengths;
        let mut i = 0;
        while i < seq.len() {
            let len = seq[i];
            let mut run = 1;
            while i + run < seq.len() && seq[i + run] == len {
                run += 1;
            }
            i += run;

            if len == 0 {
                let mut left = run;
                while left >= 11 {
                    let n = left.min(138);
                    self.tokens.push(Token { sym: REP_ZERO_LONG, extra: (n - 11) as u8 });
                    left -= n;
                }
                if left >= 3 {
                    self.tokens.push(Token { sym: REP_ZERO_SHORT, extra: (left - 3) as u8 });
                    left = 0;
                }
                for _ in 0..left {
                    self.tokens.push(Token { sym: 0, extra: 0 });
                }
            } else {
                self.tokens.push(Token { sym: len, extra: 0 });
                let mut left = run - 1;
                while left >= 3 {
                    let n = left.min(6);
                    self.tokens.push(Token { sym: REP_PREV, extra: (n - 3) as u8 });
                    left -= n;
                }
                for _ in 0..left {
                    self.tokens.push(Token { sym: len, extra: 0 });
                }
            }
        }
    }
}

impl Default for DynamicHeader {
    fn default() -> Self {
        Self::new()
    }
}
