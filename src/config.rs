// config.rs — 启动配置（mapper.json）
//
// 查找顺序：
// - CLI: --config <path>
// - Env: MAPPER_CONFIG
// - 默认: ./mapper.json
// 文件不存在时静默使用默认值；读不了或解析失败时打警告再用默认值。

use crate::projection::Projection;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub image_dir: PathBuf,
    /// 启动时的输出投影
    pub projection: Projection,
    pub vsync: bool,
    /// `zoom *= exp(scroll / zoom_sensitivity)`
    pub zoom_sensitivity: f64,
    pub show_status: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            image_dir: PathBuf::from("res/images"),
            projection: Projection::Azimuthal,
            vsync: true,
            zoom_sensitivity: 5.0,
            show_status: true,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            title: "Map projection demo".to_string(),
        }
    }
}

/// 从参数列表和环境变量里挑出配置文件路径
pub fn resolve_path(args: impl IntoIterator<Item = String>, env: Option<String>) -> PathBuf {
    let mut it = args.into_iter();
    while let Some(a) = it.next() {
        if a == "--config" {
            if let Some(v) = it.next() {
                return PathBuf::from(v);
            }
        }
    }

    if let Some(v) = env {
        if !v.trim().is_empty() {
            return PathBuf::from(v);
        }
    }

    PathBuf::from("mapper.json")
}

pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        log::debug!("{} not found, using default config", path.display());
        return Config::default();
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(cfg) => {
                log::info!("loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                log::warn!("failed to parse {}: {e}; using defaults", path.display());
                Config::default()
            }
        },
        Err(e) => {
            log::warn!("failed to read {}: {e}; using defaults", path.display());
            Config::default()
        }
    }
}

pub fn load() -> Config {
    let path = resolve_path(std::env::args().skip(1), std::env::var("MAPPER_CONFIG").ok());
    load_from(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.window.width, 1920);
        assert_eq!(cfg.window.height, 1080);
        assert_eq!(cfg.window.title, "Map projection demo");
        assert_eq!(cfg.image_dir, PathBuf::from("res/images"));
        assert_eq!(cfg.projection, Projection::Azimuthal);
        assert!(cfg.vsync);
        assert_eq!(cfg.zoom_sensitivity, 5.0);
        assert!(cfg.show_status);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "window": { "width": 800 }, "projection": "robinson" }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.window.height, 1080);
        assert_eq!(cfg.projection, Projection::Robinson);
        assert_eq!(cfg.zoom_sensitivity, 5.0);
    }

    #[test]
    fn unknown_projection_is_a_parse_error() {
        assert!(serde_json::from_str::<Config>(r#"{ "projection": "mercator" }"#).is_err());
    }

    #[test]
    fn cli_wins_over_env() {
        let path = resolve_path(args(&["--config", "a.json"]), Some("b.json".into()));
        assert_eq!(path, PathBuf::from("a.json"));
        let path = resolve_path(args(&["--verbose"]), Some("b.json".into()));
        assert_eq!(path, PathBuf::from("b.json"));
        let path = resolve_path(args(&["--config"]), Some("  ".into()));
        assert_eq!(path, PathBuf::from("mapper.json"));
    }

    #[test]
    fn bad_or_missing_files_fall_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("sphere_mapper_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        assert_eq!(load_from(&dir.join("missing.json")).window.width, 1920);

        let bad = dir.join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert_eq!(load_from(&bad).projection, Projection::Azimuthal);

        let good = dir.join("good.json");
        std::fs::write(&good, r#"{ "vsync": false, "image_dir": "maps" }"#).unwrap();
        let cfg = load_from(&good);
        assert!(!cfg.vsync);
        assert_eq!(cfg.image_dir, PathBuf::from("maps"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
