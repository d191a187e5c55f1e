//! # 载荷加密
//!
//! 嵌入前可以选择三种变换之一：不加密、64 位滚动密钥的异或流密码、AES-ECB。
//! 异或流密码只是混淆，不能当作安全的加密使用。

use crate::constants::{AES_BLOCK_SIZE, AES_KEY_FILE, STREAM_KEY_FILE};
use crate::error::{KeyError, Result, StegoError};
use crate::key::{AesKey, Key, KeyKind, StreamKey};
use aes::{Aes128, Aes192, Aes256};
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};

/// 载荷变换方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cipher {
    None,
    StreamXor,
    #[default]
    BlockAes,
}

impl Cipher {
    pub fn name(self) -> &'static str {
        match self {
            Cipher::None => "none",
            Cipher::StreamXor => "stream XOR",
            Cipher::BlockAes => "AES-ECB",
        }
    }

    /// 该变换需要的密钥形状，`None` 不需要密钥。
    pub fn key_kind(self) -> Option<KeyKind> {
        match self {
            Cipher::None => None,
            Cipher::StreamXor => Some(KeyKind::Stream),
            Cipher::BlockAes => Some(KeyKind::Block),
        }
    }

    /// 默认的密钥旁路文件名。
    pub fn side_file(self) -> Option<&'static str> {
        match self {
            Cipher::None => None,
            Cipher::StreamXor => Some(STREAM_KEY_FILE),
            Cipher::BlockAes => Some(AES_KEY_FILE),
        }
    }

    /// 生成一把新密钥。
    pub fn generate_key(self) -> Result<Option<Key>> {
        Ok(match self {
            Cipher::None => None,
            Cipher::StreamXor => Some(Key::Stream(StreamKey::generate())),
            Cipher::BlockAes => Some(Key::Block(AesKey::generate()?)),
        })
    }

    /// 用新生成的密钥加密，返回密文和密钥。
    pub fn encrypt(self, plaintext: &[u8]) -> Result<(Vec<u8>, Option<Key>)> {
        let key = self.generate_key()?;
        let ciphertext = self.encrypt_with(plaintext, key.as_ref())?;
        Ok((ciphertext, key))
    }

    /// 用给定的密钥加密。
    pub fn encrypt_with(self, plaintext: &[u8], key: Option<&Key>) -> Result<Vec<u8>> {
        match (self, self.check_key(key)?) {
            (Cipher::None, _) => Ok(plaintext.to_vec()),
            (Cipher::StreamXor, Some(Key::Stream(key))) => Ok(xor_stream(plaintext, *key)),
            (Cipher::BlockAes, Some(Key::Block(key))) => aes_ecb_encrypt(key, plaintext),
            _ => Err(self.mismatch(key)),
        }
    }

    /// 用给定的密钥解密。
    ///
    /// # Errors
    ///
    /// * 密钥缺失或形状不符时返回 [`StegoError::Key`]。
    /// * AES 密文长度不是分组的整数倍，或去除填充失败 (通常是密钥不对) 时返回 [`StegoError::Cipher`]。
    pub fn decrypt(self, ciphertext: &[u8], key: Option<&Key>) -> Result<Vec<u8>> {
        match (self, self.check_key(key)?) {
            (Cipher::None, _) => Ok(ciphertext.to_vec()),
            (Cipher::StreamXor, Some(Key::Stream(key))) => Ok(xor_stream(ciphertext, *key)),
            (Cipher::BlockAes, Some(Key::Block(key))) => aes_ecb_decrypt(key, ciphertext),
            _ => Err(self.mismatch(key)),
        }
    }

    fn check_key(self, key: Option<&Key>) -> Result<Option<&Key>> {
        match (self.key_kind(), key) {
            (None, _) => Ok(key),
            (Some(kind), Some(k)) if k.kind() == kind => Ok(key),
            _ => Err(self.mismatch(key)),
        }
    }

    fn mismatch(self, key: Option<&Key>) -> StegoError {
        KeyError::Mismatch {
            cipher: self.name(),
            key: match key.map(Key::kind) {
                None => "no key",
                Some(KeyKind::Stream) => "a 64-bit stream key",
                Some(KeyKind::Block) => "an AES key",
            },
        }
        .into()
    }
}

/// 滚动密钥异或。每处理一个字节，寄存器循环右移 8 位，
/// 密钥的 8 个字节从最低字节开始依次循环使用。加密和解密是同一个过程。
pub fn xor_stream(data: &[u8], key: StreamKey) -> Vec<u8> {
    let mut register = key.0;
    data.iter()
        .map(|&byte| {
            let out = byte ^ (register & 0xFF) as u8;
            register = register.rotate_right(8);
            out
        })
        .collect()
}

fn invalid_key_length(key: &AesKey) -> StegoError {
    KeyError::Length {
        expected: "16, 24, or 32",
        actual: key.as_bytes().len(),
    }
    .into()
}

/// AES-ECB 加密，PKCS#7 填充。密钥长度决定 AES-128/192/256。
pub fn aes_ecb_encrypt(key: &AesKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let key_bytes = key.as_bytes();
    let ciphertext = match key_bytes.len() {
        16 => ecb::Encryptor::<Aes128>::new_from_slice(key_bytes)
            .map_err(|_| invalid_key_length(key))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        24 => ecb::Encryptor::<Aes192>::new_from_slice(key_bytes)
            .map_err(|_| invalid_key_length(key))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        32 => ecb::Encryptor::<Aes256>::new_from_slice(key_bytes)
            .map_err(|_| invalid_key_length(key))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        _ => return Err(invalid_key_length(key)),
    };
    log::debug!(
        "AES-{} encrypted {} bytes into {} bytes",
        key_bytes.len() * 8,
        plaintext.len(),
        ciphertext.len()
    );
    Ok(ciphertext)
}

/// AES-ECB 解密并去除 PKCS#7 填充。
pub fn aes_ecb_decrypt(key: &AesKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(StegoError::Cipher(format!(
            "ciphertext length {} is not a positive multiple of the {AES_BLOCK_SIZE} byte block size",
            ciphertext.len()
        )));
    }

    let key_bytes = key.as_bytes();
    let plaintext = match key_bytes.len() {
        16 => ecb::Decryptor::<Aes128>::new_from_slice(key_bytes)
            .map_err(|_| invalid_key_length(key))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        24 => ecb::Decryptor::<Aes192>::new_from_slice(key_bytes)
            .map_err(|_| invalid_key_length(key))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        32 => ecb::Decryptor::<Aes256>::new_from_slice(key_bytes)
            .map_err(|_| invalid_key_length(key))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        _ => return Err(invalid_key_length(key)),
    };

    plaintext.map_err(|_| {
        StegoError::Cipher("invalid padding after decryption; the key is wrong or stale".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Vec<u8>> {
        vec![
            Vec::new(),
            vec![0x41],
            (0..=255u8).cycle().take(1000).collect(),
        ]
    }

    #[test]
    fn none_is_identity() {
        for plaintext in samples() {
            let (ciphertext, key) = Cipher::None.encrypt(&plaintext).unwrap();
            assert!(key.is_none());
            assert_eq!(ciphertext, plaintext);
            assert_eq!(Cipher::None.decrypt(&ciphertext, None).unwrap(), plaintext);
        }
    }

    #[test]
    fn xor_cycles_key_bytes_low_byte_first() {
        let key = StreamKey(0x8877_6655_4433_2211);
        let out = xor_stream(&[0u8; 10], key);
        assert_eq!(out, vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x11, 0x22]);
    }

    #[test]
    fn xor_is_its_own_inverse() {
        let key = StreamKey(0x0123_4567_89AB_CDEF);
        let data = b"the register restarts from the original key";
        assert_eq!(xor_stream(&xor_stream(data, key), key), data.to_vec());
    }

    #[test]
    fn stream_round_trip() {
        for plaintext in samples() {
            let (ciphertext, key) = Cipher::StreamXor.encrypt(&plaintext).unwrap();
            assert_eq!(ciphertext.len(), plaintext.len());
            let decrypted = Cipher::StreamXor.decrypt(&ciphertext, key.as_ref()).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn aes_round_trip() {
        for plaintext in samples() {
            let (ciphertext, key) = Cipher::BlockAes.encrypt(&plaintext).unwrap();
            assert_eq!(ciphertext.len(), (plaintext.len() / 16 + 1) * 16);
            let decrypted = Cipher::BlockAes.decrypt(&ciphertext, key.as_ref()).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn aes_round_trip_with_shorter_keys() {
        for len in [16, 24] {
            let key = Key::Block(AesKey::from_bytes(&vec![7u8; len]).unwrap());
            let ciphertext = Cipher::BlockAes.encrypt_with(b"block", Some(&key)).unwrap();
            assert_eq!(
                Cipher::BlockAes.decrypt(&ciphertext, Some(&key)).unwrap(),
                b"block".to_vec()
            );
        }
    }

    #[test]
    fn aes_matches_fips_197_vector() {
        // FIPS-197 附录 C.3，外加一个完整的 PKCS#7 填充块
        let key: Vec<u8> = (0..32).collect();
        let key = AesKey::from_bytes(&key).unwrap();
        let plaintext: Vec<u8> = (0..16).map(|i| i * 0x11).collect();
        let ciphertext = aes_ecb_encrypt(&key, &plaintext).unwrap();
        assert_eq!(
            &ciphertext[..16],
            &[
                0x8e, 0xa2, 0xb7, 0xca, 0x51, 0x67, 0x45, 0xbf, 0xea, 0xfc, 0x49, 0x90, 0x4b,
                0x49, 0x60, 0x89
            ]
        );
        assert_eq!(ciphertext.len(), 32);
    }

    #[test]
    fn ten_byte_keys_are_rejected() {
        assert!(matches!(
            AesKey::from_bytes(&[0u8; 10]),
            Err(StegoError::Key(KeyError::Length { actual: 10, .. }))
        ));
    }

    #[test]
    fn keys_of_the_other_shape_are_rejected() {
        let stream = Key::Stream(StreamKey(1));
        assert!(matches!(
            Cipher::BlockAes.encrypt_with(b"x", Some(&stream)),
            Err(StegoError::Key(KeyError::Mismatch { .. }))
        ));
        assert!(matches!(
            Cipher::BlockAes.decrypt(&[0u8; 16], Some(&stream)),
            Err(StegoError::Key(KeyError::Mismatch { .. }))
        ));

        let block = Key::Block(AesKey::from_bytes(&[0u8; 32]).unwrap());
        assert!(matches!(
            Cipher::StreamXor.decrypt(b"x", Some(&block)),
            Err(StegoError::Key(KeyError::Mismatch { .. }))
        ));
        assert!(matches!(
            Cipher::StreamXor.decrypt(b"x", None),
            Err(StegoError::Key(KeyError::Mismatch { .. }))
        ));
    }

    #[test]
    fn truncated_ciphertext_is_a_cipher_error() {
        let key = Key::Block(AesKey::from_bytes(&[3u8; 32]).unwrap());
        assert!(matches!(
            Cipher::BlockAes.decrypt(&[0u8; 15], Some(&key)),
            Err(StegoError::Cipher(_))
        ));
        assert!(matches!(
            Cipher::BlockAes.decrypt(&[], Some(&key)),
            Err(StegoError::Cipher(_))
        ));
    }
}
