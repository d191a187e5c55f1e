//! # BMP 容器模块
//!
//! 读取、校验并写回未压缩的 24/32 位 BMP 文件。
//! 对外暴露一个去除了行填充的连续像素缓冲区，隐写算法只接触这块内存。

use crate::constants::{BMP_HEADER_SIZE, BMP_MAGIC, FILE_HEADER_SIZE};
use crate::error::{FormatError, Result, StegoError};
use crate::steganography;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// 14 字节的 BITMAPFILEHEADER。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapFileHeader {
    pub magic: u16,
    pub file_size: u32,
    pub reserved1: u16,
    pub reserved2: u16,
    pub offset: u32,
}

/// 40 字节的 BITMAPINFOHEADER。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapInfoHeader {
    pub size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bits_per_pixel: u16,
    pub compression: u32,
    pub image_size: u32,
    pub x_pixels_per_meter: i32,
    pub y_pixels_per_meter: i32,
    pub colors_used: u32,
    pub colors_important: u32,
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn i32_at(bytes: &[u8], at: usize) -> i32 {
    u32_at(bytes, at) as i32
}

impl BitmapFileHeader {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            magic: u16_at(bytes, 0),
            file_size: u32_at(bytes, 2),
            reserved1: u16_at(bytes, 6),
            reserved2: u16_at(bytes, 8),
            offset: u32_at(bytes, 10),
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.magic.to_le_bytes());
        out.extend_from_slice(&self.file_size.to_le_bytes());
        out.extend_from_slice(&self.reserved1.to_le_bytes());
        out.extend_from_slice(&self.reserved2.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
    }
}

impl BitmapInfoHeader {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            size: u32_at(bytes, 0),
            width: i32_at(bytes, 4),
            height: i32_at(bytes, 8),
            planes: u16_at(bytes, 12),
            bits_per_pixel: u16_at(bytes, 14),
            compression: u32_at(bytes, 16),
            image_size: u32_at(bytes, 20),
            x_pixels_per_meter: i32_at(bytes, 24),
            y_pixels_per_meter: i32_at(bytes, 28),
            colors_used: u32_at(bytes, 32),
            colors_important: u32_at(bytes, 36),
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.planes.to_le_bytes());
        out.extend_from_slice(&self.bits_per_pixel.to_le_bytes());
        out.extend_from_slice(&self.compression.to_le_bytes());
        out.extend_from_slice(&self.image_size.to_le_bytes());
        out.extend_from_slice(&self.x_pixels_per_meter.to_le_bytes());
        out.extend_from_slice(&self.y_pixels_per_meter.to_le_bytes());
        out.extend_from_slice(&self.colors_used.to_le_bytes());
        out.extend_from_slice(&self.colors_important.to_le_bytes());
    }
}

/// 写回时使用的像素位深。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputDepth {
    /// 与读入时相同的位深。
    #[default]
    Loaded,
    /// 固定输出 24 位像素。32 位图像的每个像素会丢弃第 4 个字节，
    /// 落在这些字节里的隐写数据随之丢失。
    Bgr24,
}

/// 每行的填充字节数，使行长度成为 4 的倍数。
pub fn row_padding(row_len: usize) -> usize {
    (4 - row_len % 4) % 4
}

/// 一张已校验的 BMP 图像，像素数据不含行填充。
#[derive(Debug, Clone)]
pub struct BitmapImage {
    file_header: BitmapFileHeader,
    info_header: BitmapInfoHeader,
    pixels: Vec<u8>,
    output_depth: OutputDepth,
}

impl BitmapImage {
    /// 从磁盘读取并校验 BMP 文件。
    ///
    /// # Errors
    ///
    /// * 文件无法读取时返回 [`StegoError::Io`]。
    /// * 头部校验失败时返回 [`StegoError::Format`]。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| StegoError::io(path, e))?;
        let image = Self::from_bytes(&data)?;
        log::debug!(
            "loaded {}: {}x{} at {} bpp, {} pixel bytes",
            path.display(),
            image.width(),
            image.height(),
            image.bits_per_pixel(),
            image.pixels.len()
        );
        Ok(image)
    }

    /// 从内存中的 BMP 文件内容解析图像。
    ///
    /// 校验顺序：魔数、位深、调色板、方向、像素偏移、压缩方式。
    /// 头部校验全部通过后才会读取像素行。
    /// 只要有两个字节就先检查魔数，不足 54 字节的非 BMP 文件也报告魔数错误。
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() >= 2 && u16_at(data, 0) != BMP_MAGIC {
            return Err(FormatError::BadMagic(u16_at(data, 0)).into());
        }
        if data.len() < BMP_HEADER_SIZE {
            return Err(FormatError::Truncated {
                expected: BMP_HEADER_SIZE,
                actual: data.len(),
            }
            .into());
        }
        let file_header = BitmapFileHeader::parse(&data[..FILE_HEADER_SIZE]);
        let info_header = BitmapInfoHeader::parse(&data[FILE_HEADER_SIZE..BMP_HEADER_SIZE]);

        validate(&file_header, &info_header)?;

        let bytes_per_pixel = info_header.bits_per_pixel as usize / 8;
        let width = info_header.width as usize;
        let height = info_header.height as usize;
        let row_len = width
            .checked_mul(bytes_per_pixel)
            .ok_or(FormatError::Truncated {
                expected: usize::MAX,
                actual: data.len(),
            })?;
        let stride = row_len + row_padding(row_len);

        // 最后一行的填充可以缺省
        let expected = stride
            .checked_mul(height.saturating_sub(1))
            .and_then(|n| n.checked_add(if height > 0 { row_len } else { 0 }))
            .and_then(|n| n.checked_add(BMP_HEADER_SIZE))
            .ok_or(FormatError::Truncated {
                expected: usize::MAX,
                actual: data.len(),
            })?;
        if data.len() < expected {
            return Err(FormatError::Truncated {
                expected,
                actual: data.len(),
            }
            .into());
        }

        let mut pixels = Vec::with_capacity(row_len * height);
        if row_len > 0 {
            let body = &data[BMP_HEADER_SIZE..];
            (0..height).for_each(|row| {
                let start = row * stride;
                pixels.extend_from_slice(&body[start..start + row_len]);
            });
        }

        Ok(Self {
            file_header,
            info_header,
            pixels,
            output_depth: OutputDepth::default(),
        })
    }

    /// 将图像写回磁盘。
    ///
    /// 先写入目标目录中的临时文件，成功后再重命名到 `path`，
    /// 失败时不会留下不完整的输出文件。
    pub fn store(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| StegoError::io(dir, e))?;
        if let Err(e) = temp.write_all(&bytes).and_then(|()| temp.flush()) {
            return Err(StegoError::io(temp.path(), e));
        }
        temp.persist(path).map_err(|e| StegoError::io(path, e.error))?;

        log::debug!("stored {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// 按当前的 [`OutputDepth`] 序列化为 BMP 文件内容。
    ///
    /// 每一行后面重新写入全零的填充字节。
    pub fn to_bytes(&self) -> Vec<u8> {
        let in_bpp = self.bytes_per_pixel();
        let out_bpp = match self.output_depth {
            OutputDepth::Loaded => in_bpp,
            OutputDepth::Bgr24 => 3,
        };

        let mut file_header = self.file_header;
        let mut info_header = self.info_header;
        let width = self.info_header.width as usize;
        let out_row_len = width * out_bpp;
        let padding = vec![0u8; row_padding(out_row_len)];

        if out_bpp != in_bpp {
            log::warn!(
                "narrowing {}-bit pixels to 24-bit on write; data in the fourth byte of each pixel is dropped",
                self.info_header.bits_per_pixel
            );
            let image_size = (out_row_len + padding.len()) * self.info_header.height as usize;
            info_header.bits_per_pixel = 24;
            info_header.image_size = image_size as u32;
            file_header.file_size = (BMP_HEADER_SIZE + image_size) as u32;
        }

        let mut out = Vec::with_capacity(
            BMP_HEADER_SIZE + (out_row_len + padding.len()) * self.info_header.height as usize,
        );
        file_header.write_to(&mut out);
        info_header.write_to(&mut out);

        let row_len = width * in_bpp;
        if row_len > 0 {
            for row in self.pixels.chunks_exact(row_len) {
                if out_bpp == in_bpp {
                    out.extend_from_slice(row);
                } else {
                    row.chunks_exact(in_bpp)
                        .for_each(|pixel| out.extend_from_slice(&pixel[..out_bpp]));
                }
                out.extend_from_slice(&padding);
            }
        }

        out
    }

    /// 去除行填充后的像素缓冲区。
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// 可变的像素缓冲区，隐写时原地修改。
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn width(&self) -> u32 {
        self.info_header.width as u32
    }

    pub fn height(&self) -> u32 {
        self.info_header.height as u32
    }

    pub fn bits_per_pixel(&self) -> u16 {
        self.info_header.bits_per_pixel
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.info_header.bits_per_pixel as usize / 8
    }

    /// 每行在文件中的填充字节数 (按读入位深计算)。
    pub fn padding(&self) -> usize {
        row_padding(self.width() as usize * self.bytes_per_pixel())
    }

    /// 这张图像能隐藏的最大载荷字节数。
    pub fn capacity(&self) -> usize {
        steganography::capacity(self.pixels.len())
    }

    pub fn file_header(&self) -> &BitmapFileHeader {
        &self.file_header
    }

    pub fn info_header(&self) -> &BitmapInfoHeader {
        &self.info_header
    }

    pub fn output_depth(&self) -> OutputDepth {
        self.output_depth
    }

    pub fn set_output_depth(&mut self, depth: OutputDepth) {
        self.output_depth = depth;
    }

    pub fn with_output_depth(mut self, depth: OutputDepth) -> Self {
        self.output_depth = depth;
        self
    }
}

fn validate(file: &BitmapFileHeader, info: &BitmapInfoHeader) -> Result<()> {
    if file.magic != BMP_MAGIC {
        return Err(FormatError::BadMagic(file.magic).into());
    }
    if info.bits_per_pixel != 24 && info.bits_per_pixel != 32 {
        return Err(FormatError::UnsupportedBitDepth(info.bits_per_pixel).into());
    }
    if info.colors_used != 0 {
        return Err(FormatError::ColorTable(info.colors_used).into());
    }
    if info.width < 0 || info.height < 0 {
        return Err(FormatError::TopDown {
            width: info.width,
            height: info.height,
        }
        .into());
    }
    if file.offset as usize != BMP_HEADER_SIZE {
        return Err(FormatError::HeaderOffset(file.offset).into());
    }
    // BI_RGB = 0, BI_BITFIELDS = 3
    if info.compression != 0 && info.compression != 3 {
        return Err(FormatError::Compressed(info.compression).into());
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::constants::INFO_HEADER_SIZE;
    use tempfile::tempdir;

    /// 构造一个合法的 BMP 文件，像素字节按位置递增，填充字节为 0xEE。
    pub(crate) fn synth_bmp(width: i32, height: i32, bits_per_pixel: u16) -> Vec<u8> {
        let row_len = width.unsigned_abs() as usize * (bits_per_pixel as usize / 8);
        let stride = row_len + row_padding(row_len);
        let image_size = stride * height.unsigned_abs() as usize;

        let mut out = Vec::new();
        BitmapFileHeader {
            magic: BMP_MAGIC,
            file_size: (BMP_HEADER_SIZE + image_size) as u32,
            reserved1: 0,
            reserved2: 0,
            offset: BMP_HEADER_SIZE as u32,
        }
        .write_to(&mut out);
        BitmapInfoHeader {
            size: INFO_HEADER_SIZE as u32,
            width,
            height,
            planes: 1,
            bits_per_pixel,
            compression: 0,
            image_size: image_size as u32,
            x_pixels_per_meter: 2835,
            y_pixels_per_meter: 2835,
            colors_used: 0,
            colors_important: 0,
        }
        .write_to(&mut out);

        let mut counter = 0u8;
        for _ in 0..height.unsigned_abs() {
            for _ in 0..row_len {
                out.push(counter);
                counter = counter.wrapping_add(1);
            }
            out.extend(std::iter::repeat_n(0xEE, stride - row_len));
        }
        out
    }

    fn patch_u16(data: &mut [u8], at: usize, value: u16) {
        data[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn patch_u32(data: &mut [u8], at: usize, value: u32) {
        data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn format_error(data: &[u8]) -> FormatError {
        match BitmapImage::from_bytes(data) {
            Err(StegoError::Format(e)) => e,
            other => panic!("expected a format error, got {other:?}"),
        }
    }

    #[test]
    fn padding_rounds_rows_to_four_bytes() {
        assert_eq!(row_padding(0), 0);
        assert_eq!(row_padding(3), 1);
        assert_eq!(row_padding(15), 1);
        assert_eq!(row_padding(6), 2);
        assert_eq!(row_padding(9), 3);
        assert_eq!(row_padding(12), 0);
    }

    #[test]
    fn load_strips_row_padding() {
        let data = synth_bmp(5, 3, 24);
        let image = BitmapImage::from_bytes(&data).unwrap();

        assert_eq!(image.width(), 5);
        assert_eq!(image.height(), 3);
        assert_eq!(image.padding(), 1);
        assert_eq!(image.pixels().len(), 5 * 3 * 3);
        let expected: Vec<u8> = (0..45).collect();
        assert_eq!(image.pixels(), expected.as_slice());
    }

    #[test]
    fn store_restores_zero_padding() {
        let data = synth_bmp(5, 3, 24);
        let image = BitmapImage::from_bytes(&data).unwrap();
        let written = image.to_bytes();

        assert_eq!(written.len(), data.len());
        assert_eq!(&written[..BMP_HEADER_SIZE], &data[..BMP_HEADER_SIZE]);
        let stride = 16;
        for row in 0..3 {
            let start = BMP_HEADER_SIZE + row * stride;
            assert_eq!(&written[start..start + 15], &data[start..start + 15]);
            assert_eq!(written[start + 15], 0);
        }
    }

    #[test]
    fn thirty_two_bit_images_keep_their_depth() {
        let data = synth_bmp(3, 2, 32);
        let image = BitmapImage::from_bytes(&data).unwrap();
        assert_eq!(image.bytes_per_pixel(), 4);
        assert_eq!(image.padding(), 0);
        assert_eq!(image.to_bytes(), data);
    }

    #[test]
    fn bgr24_output_narrows_thirty_two_bit_pixels() {
        let data = synth_bmp(3, 2, 32);
        let image = BitmapImage::from_bytes(&data)
            .unwrap()
            .with_output_depth(OutputDepth::Bgr24);
        let written = image.to_bytes();

        let reread = BitmapImage::from_bytes(&written).unwrap();
        assert_eq!(reread.bits_per_pixel(), 24);
        assert_eq!(reread.file_header().file_size as usize, written.len());
        assert_eq!(reread.pixels().len(), 3 * 2 * 3);
        assert_eq!(&reread.pixels()[..6], &[0, 1, 2, 4, 5, 6]);
    }

    #[test]
    fn rejects_eight_bit_images_before_reading_pixels() {
        let mut data = synth_bmp(4, 4, 24);
        patch_u16(&mut data, 28, 8);
        data.truncate(BMP_HEADER_SIZE);
        assert_eq!(format_error(&data), FormatError::UnsupportedBitDepth(8));
    }

    #[test]
    fn rejects_bad_magic_first() {
        let mut data = synth_bmp(4, 4, 24);
        patch_u16(&mut data, 0, 0x4D43);
        patch_u16(&mut data, 28, 8);
        assert_eq!(format_error(&data), FormatError::BadMagic(0x4D43));
    }

    #[test]
    fn rejects_color_tables() {
        let mut data = synth_bmp(4, 4, 24);
        patch_u32(&mut data, 46, 16);
        assert_eq!(format_error(&data), FormatError::ColorTable(16));
    }

    #[test]
    fn rejects_top_down_images() {
        let data = synth_bmp(4, -4, 24);
        assert_eq!(
            format_error(&data),
            FormatError::TopDown {
                width: 4,
                height: -4
            }
        );
    }

    #[test]
    fn rejects_other_header_offsets() {
        let mut data = synth_bmp(4, 4, 24);
        patch_u32(&mut data, 10, 138);
        assert_eq!(format_error(&data), FormatError::HeaderOffset(138));
    }

    #[test]
    fn rejects_compressed_images() {
        let mut data = synth_bmp(4, 4, 24);
        patch_u32(&mut data, 30, 1);
        assert_eq!(format_error(&data), FormatError::Compressed(1));
    }

    #[test]
    fn rejects_truncated_files() {
        assert!(matches!(
            format_error(&[0x42, 0x4D, 0, 0]),
            FormatError::Truncated { actual: 4, .. }
        ));

        let mut data = synth_bmp(4, 4, 24);
        data.truncate(data.len() - 5);
        assert!(matches!(format_error(&data), FormatError::Truncated { .. }));
    }

    #[test]
    fn short_files_report_bad_magic_before_truncation() {
        let mut data = vec![0u8; 20];
        data[..2].copy_from_slice(b"XY");
        assert_eq!(format_error(&data), FormatError::BadMagic(0x5958));

        data[..2].copy_from_slice(b"BM");
        assert!(matches!(
            format_error(&data),
            FormatError::Truncated { actual: 20, .. }
        ));

        assert!(matches!(
            format_error(&[0x42]),
            FormatError::Truncated { actual: 1, .. }
        ));
    }

    #[test]
    fn tolerates_missing_final_row_padding() {
        let mut data = synth_bmp(5, 2, 24);
        data.pop();
        let image = BitmapImage::from_bytes(&data).unwrap();
        assert_eq!(image.pixels().len(), 30);
    }

    #[test]
    fn store_and_load_through_the_filesystem() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cover.bmp");

        let mut image = BitmapImage::from_bytes(&synth_bmp(7, 5, 24))?;
        image.pixels_mut()[0] ^= 1;
        image.store(&path)?;

        let reloaded = BitmapImage::load(&path)?;
        assert_eq!(reloaded.pixels(), image.pixels());
        Ok(())
    }

    #[test]
    fn load_reports_missing_files() {
        let err = BitmapImage::load("/nonexistent/cover.bmp").unwrap_err();
        assert!(matches!(err, StegoError::Io { .. }));
    }
}
