//! # CRC32 校验和
//!
//! 标准的反射 CRC-32 (多项式 0xEDB88320)，查表实现。
//! 这只是完整性校验，不是密码学意义上的认证。

const POLYNOMIAL: u32 = 0xEDB8_8320;

/// 编译期生成的 256 项查找表。
static CRC32_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut crc = n as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[n] = crc;
        n += 1;
    }
    table
}

/// 计算 `data` 的 CRC32。
///
/// 寄存器初值为 `0xFFFFFFFF`，结果再与 `0xFFFFFFFF` 异或。
pub fn crc32(data: &[u8]) -> u32 {
    !data.iter().fold(!0u32, |crc, &byte| {
        (crc >> 8) ^ CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
    })
}
