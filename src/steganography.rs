//! # LSB 隐写核心
//!
//! 每个像素字节的最低位承载 1 bit。帧布局 (按像素字节下标)：
//!
//! ```text
//! [0, 32)              载荷长度 (u32，低位在前)
//! [32, 32 + 8*len)     载荷字节，每字节低位在前
//! [32 + 8*len, N - 32) 随机填充位
//! [N - 32, N)          像素缓冲区 [0, N - 32) 的 CRC32，低位在前
//! ```

use crate::checksum::crc32;
use crate::constants::{BYTES_PER_CHAR, CHECKSUM_HIDING_BYTES, LENGTH_HIDING_BYTES, RESERVED_BYTES};
use crate::error::{IntegrityError, Result, StegoError};
use rand::Rng;

/// 长度为 `pixel_len` 的像素缓冲区最多能隐藏的载荷字节数。
pub fn capacity(pixel_len: usize) -> usize {
    pixel_len.saturating_sub(RESERVED_BYTES) / BYTES_PER_CHAR
}

/// 把 `value` 的低 `size` 位依次写入 `pix[dix..dix + size]` 的最低位。
pub fn write_bits(mut value: u64, pix: &mut [u8], dix: usize, size: usize) -> Result<()> {
    if size > 64 || dix.checked_add(size).is_none_or(|end| end > pix.len()) {
        return Err(StegoError::Capacity {
            requested: dix.saturating_add(size),
            capacity: pix.len(),
        });
    }

    for byte in pix[dix..dix + size].iter_mut() {
        *byte = ((value & 1) as u8) | (*byte & 0xFE);
        value >>= 1;
    }

    Ok(())
}

/// 从 `pix[dix..dix + size]` 的最低位读出一个最多 64 位的值，低位在前。
pub fn read_bits(pix: &[u8], dix: usize, size: usize) -> Result<u64> {
    if size > 64 || dix.checked_add(size).is_none_or(|end| end > pix.len()) {
        return Err(IntegrityError::LengthOutOfBounds {
            declared: dix.saturating_add(size),
            capacity: pix.len(),
        }
        .into());
    }

    Ok(pix[dix..dix + size]
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &byte)| acc | (((byte & 1) as u64) << i)))
}

/// 把载荷嵌入像素缓冲区，填充位取自线程随机数生成器。
///
/// # Errors
///
/// 载荷超出 [`capacity`] 时返回 [`StegoError::Capacity`]，此时像素缓冲区保持不变。
pub fn embed(pixels: &mut [u8], payload: &[u8]) -> Result<()> {
    embed_with_rng(pixels, payload, &mut rand::rng())
}

/// 与 [`embed`] 相同，但由调用方提供填充位的随机源。
pub fn embed_with_rng(pixels: &mut [u8], payload: &[u8], rng: &mut impl Rng) -> Result<()> {
    let total = pixels.len();
    let available = capacity(total);
    let too_large = total < RESERVED_BYTES
        || payload.len() > available
        || u32::try_from(payload.len()).is_err();
    if too_large {
        return Err(StegoError::Capacity {
            requested: payload.len(),
            capacity: available,
        });
    }

    log::debug!(
        "embedding {} payload bytes into {} pixel bytes (capacity {})",
        payload.len(),
        total,
        available
    );

    write_bits(payload.len() as u64, pixels, 0, LENGTH_HIDING_BYTES)?;

    payload.iter().enumerate().try_for_each(|(i, &byte)| {
        let offset = LENGTH_HIDING_BYTES + BYTES_PER_CHAR * i;
        write_bits(byte as u64, pixels, offset, BYTES_PER_CHAR)
    })?;

    let checksum_start = total - CHECKSUM_HIDING_BYTES;
    let filler_start = LENGTH_HIDING_BYTES + BYTES_PER_CHAR * payload.len();
    pixels[filler_start..checksum_start]
        .iter_mut()
        .for_each(|byte| *byte = (*byte & 0xFE) | rng.random::<bool>() as u8);

    let checksum = crc32(&pixels[..checksum_start]);
    write_bits(checksum as u64, pixels, checksum_start, CHECKSUM_HIDING_BYTES)?;
    log::debug!("frame checksum 0x{checksum:08X}");

    Ok(())
}

/// 从像素缓冲区中提取并校验载荷。
///
/// 校验和在解码载荷之前比对，失败时不会返回任何部分数据。
///
/// # Errors
///
/// * 缓冲区放不下一个帧、校验和不一致，或声明的长度越界时返回 [`StegoError::Integrity`]。
pub fn extract(pixels: &[u8]) -> Result<Vec<u8>> {
    let total = pixels.len();
    if total < RESERVED_BYTES {
        return Err(IntegrityError::FrameTooSmall(total).into());
    }

    let declared = read_bits(pixels, 0, LENGTH_HIDING_BYTES)? as usize;

    let checksum_start = total - CHECKSUM_HIDING_BYTES;
    let computed = crc32(&pixels[..checksum_start]);
    let stored = read_bits(pixels, checksum_start, CHECKSUM_HIDING_BYTES)? as u32;
    if stored != computed {
        return Err(IntegrityError::ChecksumMismatch { stored, computed }.into());
    }

    let available = capacity(total);
    if declared > available {
        return Err(IntegrityError::LengthOutOfBounds {
            declared,
            capacity: available,
        }
        .into());
    }

    log::debug!("extracting {declared} payload bytes");

    (0..declared)
        .map(|i| {
            let offset = LENGTH_HIDING_BYTES + BYTES_PER_CHAR * i;
            read_bits(pixels, offset, BYTES_PER_CHAR).map(|value| value as u8)
        })
        .collect()
}
