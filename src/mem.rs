//! 加速器作业使用的 64 字节对齐缓冲区

use std::fmt;
use std::ops::{Deref, DerefMut};

/// 加速器作业缓冲区的对齐要求
pub const ALIGNMENT: usize = 64;

/// 定长、清零、64 字节对齐的堆缓冲区
///
/// 多分配 `ALIGNMENT - 1` 字节，从第一个对齐位置开始使用；
/// 分配后长度不变，地址也不会移动
pub struct AlignedBuf {
    storage: Box<[u8]>,
    offset: usize,
    len: usize,
}

impl AlignedBuf {
    pub fn new(len: usize) -> Self {
        let storage = vec![0u8; len + ALIGNMENT - 1].into_boxed_slice();
        let offset = storage.as_ptr().align_offset(ALIGNMENT);
        Self {
            storage,
            offset,
            len,
        }
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.len]
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.offset..self.offset + self.len]
    }
}

impl fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf").field("len", &self.len).finish()
    }
}
