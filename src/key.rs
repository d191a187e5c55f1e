//! # 密钥材料
//!
//! 流密码使用 64 位滚动密钥，分组密码使用 16/24/32 字节的 AES 密钥。
//! 密钥以原始字节的形式保存在旁路文件中，没有版本号或其他元数据。

use crate::constants::{AES_KEY_SIZE, STREAM_KEY_SIZE};
use crate::error::{KeyError, Result, StegoError};
use rand::rngs::{OsRng, SmallRng};
use rand::{RngCore, SeedableRng, TryRngCore};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

/// 流密码的 64 位密钥。
///
/// 由以挂钟时间为种子的非密码学随机数生成器产生，安全性很弱。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StreamKey(pub u64);

impl StreamKey {
    pub fn generate() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos() as u64);
        let key = SmallRng::seed_from_u64(seed).next_u64();
        log::debug!("generated a new stream key");
        Self(key)
    }

    /// 按最高字节在前的顺序序列化。
    pub fn to_bytes(self) -> [u8; STREAM_KEY_SIZE] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; STREAM_KEY_SIZE] = bytes.try_into().map_err(|_| KeyError::Length {
            expected: "8",
            actual: bytes.len(),
        })?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }
}

/// AES 密钥，释放时清零。
#[derive(Clone, PartialEq, Eq)]
pub struct AesKey(Zeroizing<Vec<u8>>);

impl AesKey {
    /// 从操作系统的安全随机源生成 256 位密钥。
    pub fn generate() -> Result<Self> {
        let mut key = Zeroizing::new(vec![0u8; AES_KEY_SIZE]);
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| StegoError::Cipher(format!("secure random generation failed: {e}")))?;
        log::debug!("generated a new {}-bit AES key", AES_KEY_SIZE * 8);
        Ok(Self(key))
    }

    /// 接受 16、24 或 32 字节的密钥。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            16 | 24 | 32 => Ok(Self(Zeroizing::new(bytes.to_vec()))),
            actual => Err(KeyError::Length {
                expected: "16, 24, or 32",
                actual,
            }
            .into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// 区分两种密钥的形状。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Stream,
    Block,
}

/// 带形状标签的密钥。
#[derive(Clone, PartialEq, Eq)]
pub enum Key {
    Stream(StreamKey),
    Block(AesKey),
}

impl Key {
    pub fn kind(&self) -> KeyKind {
        match self {
            Key::Stream(_) => KeyKind::Stream,
            Key::Block(_) => KeyKind::Block,
        }
    }

    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        match self {
            Key::Stream(key) => Zeroizing::new(key.to_bytes().to_vec()),
            Key::Block(key) => Zeroizing::new(key.as_bytes().to_vec()),
        }
    }

    pub fn from_bytes(kind: KeyKind, bytes: &[u8]) -> Result<Self> {
        match kind {
            KeyKind::Stream => StreamKey::from_bytes(bytes).map(Key::Stream),
            KeyKind::Block => AesKey::from_bytes(bytes).map(Key::Block),
        }
    }

    /// 把密钥写入 `path` 所在目录中的临时文件，但还不放到 `path` 上。
    ///
    /// 调用者确认其他输出都已写好后再 `persist`；临时文件被丢弃时自动删除，
    /// `path` 上已有的旧密钥保持不变。
    pub fn stage(&self, path: impl AsRef<Path>) -> Result<NamedTempFile> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| StegoError::io(dir, e))?;
        if let Err(e) = temp
            .write_all(self.to_bytes().as_slice())
            .and_then(|()| temp.flush())
        {
            return Err(StegoError::io(temp.path(), e));
        }
        Ok(temp)
    }

    /// 把密钥原样写入旁路文件。
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.stage(path)?
            .persist(path)
            .map_err(|e| StegoError::io(path, e.error))?;
        log::debug!("wrote {:?} key to {}", self.kind(), path.display());
        Ok(())
    }

    /// 从旁路文件读取指定形状的密钥。
    ///
    /// # Errors
    ///
    /// * 文件不存在时返回 [`KeyError::Missing`]。
    /// * 文件长度与密钥形状不符时返回 [`KeyError::Length`]。
    pub fn load(kind: KeyKind, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = Zeroizing::new(fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => KeyError::Missing(path.to_path_buf()).into(),
            _ => StegoError::io(path, e),
        })?);
        Self::from_bytes(kind, &bytes)
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Stream(_) => f.write_str("Key::Stream(..)"),
            Key::Block(key) => write!(f, "Key::Block({} bytes)", key.as_bytes().len()),
        }
    }
}
