//! # 命令行接口模块
//!
//! 使用 `clap` 定义了程序的命令行结构，包括子命令和参数。
//! 所有用户通过命令行与程序交互的入口点都在此模块中定义。

use crate::bitmap::OutputDepth;
use crate::cipher::Cipher;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// 一款基于 LSB (最低有效位) 隐写术的命令行工具，把任意文件加密后藏进未压缩的 BMP 图像。
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "一款基于 LSB (最低有效位) 隐写术的命令行工具，把任意文件 (可选异或或 AES 加密) 藏进 24/32 位未压缩 BMP 图像，并带 CRC32 完整性校验。"
)]
pub struct Cli {
    /// 提高日志级别 (-v 为 info，-vv 为 debug)。`RUST_LOG` 优先。
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令：hide (隐藏)、recover (恢复) 和 inspect (查看)。
#[derive(Parser, Debug)]
pub enum Commands {
    /// 加密文件内容并隐藏到 BMP 图像中。
    Hide(HideArgs),

    /// 从经过隐写的 BMP 图像中恢复并解密隐藏的文件。
    Recover(RecoverArgs),

    /// 显示 BMP 图像的尺寸、位深和隐写容量。
    Inspect(InspectArgs),
}

/// 载荷加密方式。
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CipherChoice {
    /// 不加密。
    None,
    /// 64 位滚动密钥异或 (仅混淆)。
    Xor,
    /// AES-256-ECB。
    #[default]
    Aes,
}

impl From<CipherChoice> for Cipher {
    fn from(choice: CipherChoice) -> Self {
        match choice {
            CipherChoice::None => Cipher::None,
            CipherChoice::Xor => Cipher::StreamXor,
            CipherChoice::Aes => Cipher::BlockAes,
        }
    }
}

/// 输出图像的位深。
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DepthChoice {
    /// 保持读入时的位深。
    #[default]
    Loaded,
    /// 固定写出 24 位像素。
    #[value(name = "24")]
    Bgr24,
}

impl From<DepthChoice> for OutputDepth {
    fn from(choice: DepthChoice) -> Self {
        match choice {
            DepthChoice::Loaded => OutputDepth::Loaded,
            DepthChoice::Bgr24 => OutputDepth::Bgr24,
        }
    }
}

/// 'hide' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct HideArgs {
    /// 用于隐写的输入 BMP 图像路径。
    #[arg(short, long)]
    pub image: PathBuf,

    /// 要隐藏的文件路径。
    #[arg(short, long)]
    pub payload: PathBuf,

    /// 结果图像的输出路径。默认为输入图像旁边的 `encrypted_<文件名>`。
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// 载荷加密方式。
    #[arg(short, long, value_enum, default_value_t = CipherChoice::default())]
    pub cipher: CipherChoice,

    /// 密钥旁路文件的保存路径。默认为当前目录下的 `key` 或 `aes_key`。
    #[arg(short, long)]
    pub key: Option<PathBuf>,

    /// 输出图像的位深。
    #[arg(long, value_enum, default_value_t = DepthChoice::default())]
    pub output_depth: DepthChoice,

    /// 覆盖已存在的输出文件。
    #[arg(short, long)]
    pub force: bool,
}

/// 'recover' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct RecoverArgs {
    /// 已隐藏数据的 BMP 图像路径。
    #[arg(short, long)]
    pub image: PathBuf,

    /// 恢复出的文件的保存路径。默认为输入图像旁边的 `decrypted_<文件名>.bin`。
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 隐藏时使用的加密方式。
    #[arg(short, long, value_enum, default_value_t = CipherChoice::default())]
    pub cipher: CipherChoice,

    /// 密钥旁路文件的路径。默认为当前目录下的 `key` 或 `aes_key`。
    #[arg(short, long)]
    pub key: Option<PathBuf>,

    /// 覆盖已存在的输出文件。
    #[arg(short, long)]
    pub force: bool,
}

/// 'inspect' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// 要查看的 BMP 图像路径。
    #[arg(short, long)]
    pub image: PathBuf,
}
