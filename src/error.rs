// error.rs — 错误类型

use std::path::PathBuf;

/// 查找表生成失败。表在进程内只生成一次，失败结果会被缓存并克隆给每个调用者。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("{table} slot {slot} was never filled")]
    Unfilled { table: &'static str, slot: usize },
    #[error("{table} slot {slot} holds out-of-range value {value}")]
    OutOfRange {
        table: &'static str,
        slot: usize,
        value: f32,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("map pack {0} does not exist")]
    NoSuchPack(usize),
    #[error("map {index} does not exist in pack {pack}")]
    NoSuchMap { pack: usize, index: usize },
    #[error("failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("crop {w}x{h}+{x}+{y} is empty or starts outside the {width}x{height} image")]
    Crop {
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        width: u32,
        height: u32,
    },
    #[error("lookup tables for {projection} are unavailable: {source}")]
    Tables {
        projection: &'static str,
        #[source]
        source: TableError,
    },
    #[error("failed to build {name}:\n{log}")]
    Shader { name: String, log: String },
    #[error("gpu: {0}")]
    Gpu(String),
}
