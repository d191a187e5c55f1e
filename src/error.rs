//! # 错误类型模块
//!
//! 核心库 (位图、校验和、密钥、密码、隐写) 的所有失败都归入 [`StegoError`]。
//! 命令行层再用 `anyhow` 为其附加上下文。

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 核心操作的统一结果类型。
pub type Result<T> = std::result::Result<T, StegoError>;

/// 隐写与加解密流程中可能出现的错误。
#[derive(Debug, Error)]
pub enum StegoError {
    /// 输入文件不是受支持的 BMP 格式。
    #[error(transparent)]
    Format(#[from] FormatError),

    /// 载荷超出了图像的隐写容量。
    #[error("payload of {requested} bytes exceeds the image capacity of {capacity} bytes")]
    Capacity { requested: usize, capacity: usize },

    /// 提取时校验失败。
    #[error("the data in the image is corrupted: {0}")]
    Integrity(#[from] IntegrityError),

    /// 密钥缺失、长度错误或与密码类型不匹配。
    #[error(transparent)]
    Key(#[from] KeyError),

    /// 底层密码原语报告的失败。
    #[error("cipher failure: {0}")]
    Cipher(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StegoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// BMP 头部校验失败的具体原因，按校验顺序排列。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("file is truncated: expected at least {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("not a BMP file: magic 0x{0:04X} does not match 0x4D42")]
    BadMagic(u16),

    #[error("only 24 or 32 bits per pixel BMP files are supported, found {0}")]
    UnsupportedBitDepth(u16),

    #[error("only BMP files without a color table are supported ({0} colors declared)")]
    ColorTable(u32),

    #[error("only bottom-up BMP files with the origin in the lower left corner are supported ({width}x{height})")]
    TopDown { width: i32, height: i32 },

    #[error("only BMP files with a 54 byte header are supported, pixel data starts at {0}")]
    HeaderOffset(u32),

    #[error("compressed BMP files are not supported (compression {0})")]
    Compressed(u32),
}

/// 隐写帧完整性校验失败的具体原因。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("pixel buffer of {0} bytes is too small to hold a frame")]
    FrameTooSmall(usize),

    #[error("checksum mismatch (stored 0x{stored:08X}, computed 0x{computed:08X})")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("declared length of {declared} bytes exceeds the capacity of {capacity} bytes")]
    LengthOutOfBounds { declared: usize, capacity: usize },
}

/// 密钥相关的失败。
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key length must be {expected} bytes, found {actual}")]
    Length { expected: &'static str, actual: usize },

    #[error("key file '{}' not found", .0.display())]
    Missing(PathBuf),

    #[error("the {cipher} cipher cannot use {key}")]
    Mismatch {
        cipher: &'static str,
        key: &'static str,
    },
}
