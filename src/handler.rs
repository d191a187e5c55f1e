//! # 命令处理逻辑模块
//!
//! 包含处理 `hide`、`recover` 和 `inspect` 子命令的高级业务逻辑。
//! 本模块负责协调文件 I/O、调用加密与隐写核心以及向用户报告结果。

use crate::bitmap::BitmapImage;
use crate::cipher::Cipher;
use crate::cli::{HideArgs, InspectArgs, RecoverArgs};
use crate::key::Key;
use crate::steganography::{embed, extract};
use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// 拒绝覆盖已存在的文件，除非用户指定了 `--force`。
fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    anyhow::ensure!(
        force || !path.exists(),
        "Output file already exists: {}. \nUse --force to overwrite it.",
        path.to_string_lossy().red().bold()
    );
    Ok(())
}

/// 在输入文件旁边生成带前缀的默认输出路径。
fn sibling_path(input: &Path, file_name: String) -> PathBuf {
    input.with_file_name(file_name)
}

fn default_hidden_path(image: &Path) -> PathBuf {
    let name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.bmp".to_string());
    sibling_path(image, format!("encrypted_{name}"))
}

fn default_recovered_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    sibling_path(image, format!("decrypted_{stem}.bin"))
}

/// 密钥文件路径，不需要密钥的变换返回 `None`。
fn key_path(cipher: Cipher, explicit: Option<PathBuf>) -> Option<PathBuf> {
    let default = cipher.side_file()?;
    Some(explicit.unwrap_or_else(|| PathBuf::from(default)))
}

/// 处理 'Hide' 命令的执行逻辑。
///
/// 读取图像和载荷文件，按选定方式加密载荷，把密文隐写进像素数据，
/// 写出结果图像后再保存新密钥。任一步失败时不会留下新的图像或密钥文件，
/// 已有的密钥文件也保持原样。
///
/// # Arguments
///
/// * `args` - 包含输入/输出路径与加密方式的 `HideArgs` 结构体。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 无法读取输入的图像或载荷文件，或图像不是受支持的 BMP。
/// * 输出图像或密钥文件已存在且未指定 `--force`。
/// * 图像没有足够的空间来隐藏加密后的载荷。
/// * 无法写入密钥文件或目标图像文件。
pub fn handle_hide(args: HideArgs) -> Result<()> {
    let cipher = Cipher::from(args.cipher);
    let dest = args.dest.unwrap_or_else(|| default_hidden_path(&args.image));
    let key_file = key_path(cipher, args.key);

    ensure_writable(&dest, args.force)?;
    if let Some(key_file) = &key_file {
        ensure_writable(key_file, args.force)?;
    }

    let mut picture = BitmapImage::load(&args.image).with_context(|| {
        format!(
            "Unable to read image file: {}",
            args.image.to_string_lossy().red().bold()
        )
    })?;
    picture.set_output_depth(args.output_depth.into());

    let payload = fs::read(&args.payload).with_context(|| {
        format!(
            "Unable to read payload file: {}",
            args.payload.to_string_lossy().red().bold()
        )
    })?;

    let (ciphertext, key) = cipher
        .encrypt(&payload)
        .with_context(|| format!("Failed to encrypt the payload with {}.", cipher.name()))?;

    let required_space = ciphertext.len();
    let available_space = picture.capacity();
    anyhow::ensure!(
        available_space >= required_space,
        "Not enough space in the image to hide the payload. \nRequired: {}, Available: {}",
        required_space.to_string().red().bold(),
        available_space.to_string().green().bold()
    );

    embed(picture.pixels_mut(), &ciphertext)
        .context("Failed to hide the payload in the image.")?;

    // 新密钥先写入临时文件，图像写好后才替换旧的密钥文件。
    let staged_key = match (&key, &key_file) {
        (Some(key), Some(key_file)) => Some(key.stage(key_file).with_context(|| {
            format!(
                "Unable to write key file: {}",
                key_file.to_string_lossy().red().bold()
            )
        })?),
        _ => None,
    };

    picture.store(&dest).with_context(|| {
        format!(
            "Unable to write to target image file: {}",
            dest.to_string_lossy().red().bold()
        )
    })?;

    if let (Some(staged_key), Some(key_file)) = (staged_key, &key_file) {
        if let Err(e) = staged_key.persist(key_file) {
            let _ = fs::remove_file(&dest);
            return Err(anyhow::Error::new(e.error).context(format!(
                "Unable to write key file: {}",
                key_file.to_string_lossy().red().bold()
            )));
        }
        log::debug!("wrote key to {}", key_file.display());
    }

    log::info!(
        "hid {} payload bytes ({} after {}) in {}",
        payload.len(),
        ciphertext.len(),
        cipher.name(),
        dest.display()
    );

    println!(
        "The payload has been successfully hidden and saved: {}",
        dest.to_string_lossy().green().bold()
    );
    if let Some(key_file) = key_file.filter(|_| key.is_some()) {
        println!(
            "Keep the key file to recover it later: {}",
            key_file.to_string_lossy().yellow().bold()
        );
    }

    Ok(())
}

/// 处理 'Recover' 命令的执行逻辑。
///
/// 读取经过隐写的图像，校验并提取密文，读取密钥文件解密后写出载荷。
///
/// # Arguments
///
/// * `args` - 包含输入/输出路径与加密方式的 `RecoverArgs` 结构体。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 无法读取输入的图像文件，或图像不是受支持的 BMP。
/// * 图像中的数据校验失败。
/// * 密钥文件缺失、长度错误或与数据不匹配。
/// * 输出文件已存在且未指定 `--force`，或无法写入。
pub fn handle_recover(args: RecoverArgs) -> Result<()> {
    let cipher = Cipher::from(args.cipher);
    let output = args
        .output
        .unwrap_or_else(|| default_recovered_path(&args.image));
    ensure_writable(&output, args.force)?;

    let picture = BitmapImage::load(&args.image).with_context(|| {
        format!(
            "Unable to read image file: {}",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    let ciphertext = extract(picture.pixels()).with_context(|| {
        format!(
            "Failed to recover data from '{}'. \nThe image may not contain hidden data or is corrupted.",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    let key = match (cipher.key_kind(), key_path(cipher, args.key)) {
        (Some(kind), Some(key_file)) => Some(Key::load(kind, &key_file).with_context(|| {
            format!(
                "Unable to load key file: {}",
                key_file.to_string_lossy().red().bold()
            )
        })?),
        _ => None,
    };

    let payload = cipher.decrypt(&ciphertext, key.as_ref()).with_context(|| {
        format!(
            "Failed to decrypt the recovered data with {}. \nCheck that the key file belongs to this image.",
            cipher.name()
        )
    })?;

    fs::write(&output, &payload).with_context(|| {
        format!(
            "Unable to write to target file: {}",
            output.to_string_lossy().red().bold()
        )
    })?;

    log::info!(
        "recovered {} payload bytes from {}",
        payload.len(),
        args.image.display()
    );

    println!(
        "The payload has been successfully recovered and saved: {}",
        output.to_string_lossy().green().bold()
    );
    Ok(())
}

/// 生成 inspect 报告：尺寸、位深、行填充、像素字节数和隐写容量。
pub fn describe(picture: &BitmapImage) -> String {
    format!(
        "  dimensions:    {}x{}\n  bits/pixel:    {}\n  row padding:   {} bytes\n  pixel bytes:   {}\n  capacity:      {} bytes",
        picture.width(),
        picture.height(),
        picture.bits_per_pixel(),
        picture.padding(),
        picture.pixels().len(),
        picture.capacity()
    )
}

/// 处理 'Inspect' 命令的执行逻辑，打印图像的基本信息和隐写容量。
pub fn handle_inspect(args: InspectArgs) -> Result<()> {
    let picture = BitmapImage::load(&args.image).with_context(|| {
        format!(
            "Unable to read image file: {}",
            args.image.to_string_lossy().red().bold()
        )
    })?;

    println!("{}", args.image.to_string_lossy().bold());
    println!("{}", describe(&picture));
    Ok(())
}
