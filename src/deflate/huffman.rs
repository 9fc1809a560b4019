//! Huffman 编码表生成
//!
//! RFC 1951 DEFLATE 长度受限的规范 Huffman 码

/// 字面/长度码与距离码的最大码长
pub const MAX_CODE_LEN: u8 = 15;

/// 码长码 (code length alphabet) 的最大码长
pub const MAX_CODE_LEN_CODE_LEN: u8 = 7;

/// 码长码的传输顺序 (HCLEN)
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

const MAX_SUPPORTED_LEN: usize = 32;

#[derive(Clone, Copy)]
struct SymFreq {
    /// 频率之和可能超出 u32
    key: u64,
    sym: u16,
}

/// 由频率表生成长度受限的 Huffman 码长
///
/// `lengths` 与 `freqs` 等长；频率为 0 的符号码长为 0。
/// 只有一个符号被使用时，再配一个相邻的未用符号，两者码长均为 1。
pub fn code_lengths(freqs: &[u32], max_len: u8, lengths: &mut [u8]) {
    debug_assert_eq!(freqs.len(), lengths.len());
    lengths.fill(0);

    let mut syms: Vec<SymFreq> = freqs
        .iter()
        .enumerate()
        .filter(|(_, &f)| f != 0)
        .map(|(i, &f)| SymFreq { key: u64::from(f), sym: i as u16 })
        .collect();

    match syms.len() {
        0 => return,
        1 => {
            let used = syms[0].sym as usize;
            let partner = if used == 0 { 1 } else { 0 };
            lengths[used] = 1;
            if partner < lengths.len() {
                lengths[partner] = 1;
            }
            return;
        }
        _ => {}
    }

    // 按频率升序 (频率相同按符号序)
    syms.sort_by_key(|s| (s.key, s.sym));

    calculate_minimum_redundancy(&mut syms);

    let mut num_codes = [0u32; MAX_SUPPORTED_LEN + 1];
    for s in &syms {
        num_codes[(s.key as usize).min(MAX_SUPPORTED_LEN)] += 1;
    }
    enforce_max_code_len(&mut num_codes, syms.len(), max_len as usize);

    // 最短的码给频率最高的符号
    let mut j = syms.len();
    for len in 1..=max_len as usize {
        for _ in 0..num_codes[len] {
            j -= 1;
            lengths[syms[j].sym as usize] = len as u8;
        }
    }
}

/// 原地 Moffat-Katajainen 算法
///
/// 输入按 key (频率) 升序，输出 key 为各符号的码长
fn calculate_minimum_redundancy(a: &mut [SymFreq]) {
    let n = a.len();
    if n == 0 {
        return;
    }
    if n == 1 {
        a[0].key = 1;
        return;
    }

    // 第一遍：构造内部节点权重，父节点下标写回 key
    a[0].key += a[1].key;
    let mut root = 0usize;
    let mut leaf = 2usize;
    for next in 1..n - 1 {
        if leaf >= n || a[root].key < a[leaf].key {
            a[next].key = a[root].key;
            a[root].key = next as u64;
            root += 1;
        } else {
            a[next].key = a[leaf].key;
            leaf += 1;
        }

        if leaf >= n || (root < next && a[root].key < a[leaf].key) {
            a[next].key += a[root].key;
            a[root].key = next as u64;
            root += 1;
        } else {
            a[next].key += a[leaf].key;
            leaf += 1;
        }
    }

    // 第二遍：内部节点深度
    a[n - 2].key = 0;
    for next in (0..n.saturating_sub(2)).rev() {
        a[next].key = a[a[next].key as usize].key + 1;
    }

    // 第三遍：叶子深度
    let mut avbl = 1usize;
    let mut used = 0usize;
    let mut depth = 0u64;
    let mut root = n as isize - 2;
    let mut next = n as isize - 1;
    while avbl > 0 {
        while root >= 0 && a[root as usize].key == depth {
            used += 1;
            root -= 1;
        }
        while avbl > used {
            a[next as usize].key = depth;
            next -= 1;
            avbl -= 1;
        }
        avbl = 2 * used;
        depth += 1;
        used = 0;
    }
}

/// 把超过 `max_len` 的码长压回上限，并保持 Kraft 和恰为 1
fn enforce_max_code_len(num_codes: &mut [u32; MAX_SUPPORTED_LEN + 1], used: usize, max_len: usize) {
    if used <= 1 {
        return;
    }
    for i in max_len + 1..=MAX_SUPPORTED_LEN {
        num_codes[max_len] += num_codes[i];
        num_codes[i] = 0;
    }

    let mut total: u64 = 0;
    for i in 1..=max_len {
        total += (num_codes[i] as u64) << (max_len - i);
    }

    while total != 1u64 << max_len {
        num_codes[max_len] -= 1;
        for i in (1..max_len).rev() {
            if num_codes[i] != 0 {
                num_codes[i] -= 1;
                num_codes[i + 1] += 2;
                break;
            }
        }
        total -= 1;
    }
}

/// 每个码长的首个规范码 (RFC 1951 3.2.2)
fn next_codes(lengths: &[u8]) -> [u32; MAX_CODE_LEN as usize + 2] {
    let mut bl_count = [0u32; MAX_CODE_LEN as usize + 2];
    for &len in lengths {
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut next = [0u32; MAX_CODE_LEN as usize + 2];
    let mut code = 0u32;
    for bits in 1..=MAX_CODE_LEN as usize {
        code = (code + bl_count[bits - 1]) << 1;
        next[bits] = code;
    }
    next
}

/// 规范码，位反转后供软件按 LSB 优先直接写出
pub fn reversed_codes(lengths: &[u8]) -> Vec<u16> {
    let mut next = next_codes(lengths);
    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return 0;
            }
            let code = next[len as usize];
            next[len as usize] += 1;
            (code as u16).reverse_bits() >> (16 - len as u32)
        })
        .collect()
}

/// 规范码，不反转，打包为 `(len << 15) | code` 写入加速器码表
pub fn pack_codes(lengths: &[u8], out: &mut [u32]) {
    let mut next = next_codes(lengths);
    for (slot, &len) in out.iter_mut().zip(lengths) {
        if len == 0 {
            *slot = 0;
            continue;
        }
        let code = next[len as usize];
        next[len as usize] += 1;
        *slot = ((len as u32) << 15) | code;
    }
}
