//! # bmp_hide 库
//!
//! 本库包含 BMP 图像 LSB 隐写工具的核心逻辑：
//! BMP 容器读写、CRC32 校验、载荷加密以及隐写帧的嵌入与提取。

// 声明库包含的所有模块。

pub mod bitmap;
pub mod checksum;
pub mod cipher;
pub mod cli;
pub mod constants;
pub mod error;
pub mod handler;
pub mod key;
pub mod steganography;

pub use bitmap::{BitmapImage, OutputDepth};
pub use cipher::Cipher;
pub use error::{FormatError, IntegrityError, KeyError, StegoError};
pub use key::{AesKey, Key, KeyKind, StreamKey};
