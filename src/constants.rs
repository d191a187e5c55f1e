/// BMP 文件头 (BITMAPFILEHEADER) 的固定大小 (字节)。
pub const FILE_HEADER_SIZE: usize = 14;

/// 信息头 (BITMAPINFOHEADER) 的固定大小 (字节)。
pub const INFO_HEADER_SIZE: usize = 40;

/// 像素数据的起始偏移。只支持没有调色板的最小头部组合。
pub const BMP_HEADER_SIZE: usize = FILE_HEADER_SIZE + INFO_HEADER_SIZE;

/// BMP 魔数 "BM" 的小端表示。
pub const BMP_MAGIC: u16 = 0x4D42;

/// 用于隐写载荷长度的像素字节数。
/// 长度是 `u32`，每个像素字节的最低位存储 1 bit，因此需要 32 个像素字节。
pub const LENGTH_HIDING_BYTES: usize = 32;

/// 用于隐写 CRC32 校验和的像素字节数，位于像素缓冲区的末尾。
pub const CHECKSUM_HIDING_BYTES: usize = 32;

/// 隐写载荷中单个字节所需的像素字节数 (每个像素字节 1 bit)。
pub const BYTES_PER_CHAR: usize = 8;

/// 帧中固定保留的像素字节数：长度字段 + 校验和字段。
pub const RESERVED_BYTES: usize = LENGTH_HIDING_BYTES + CHECKSUM_HIDING_BYTES;

/// 流密码密钥的字节数。
pub const STREAM_KEY_SIZE: usize = 8;

/// 新生成的 AES 密钥的字节数 (AES-256)。
pub const AES_KEY_SIZE: usize = 32;

/// AES 分组大小 (字节)。
pub const AES_BLOCK_SIZE: usize = 16;

/// 流密码密钥的默认旁路文件名。
pub const STREAM_KEY_FILE: &str = "key";

/// AES 密钥的默认旁路文件名。
pub const AES_KEY_FILE: &str = "aes_key";
