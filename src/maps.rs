// maps.rs — 内置星球贴图目录

use crate::projection::Projection;

/// 加载时的裁剪矩形（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// 目录条目：文件名、拍摄时用的投影、可选裁剪
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapEntry {
    pub file: &'static str,
    pub source: Projection,
    pub crop: Option<Crop>,
}

/// 上传后的纹理，`sx`/`sy` 是有效区域在 2 的幂纹理中的比例
#[derive(Debug)]
pub struct LoadedTexture<T> {
    pub handle: T,
    pub sx: f32,
    pub sy: f32,
}

#[derive(Debug)]
pub struct SphereMap<T> {
    pub entry: MapEntry,
    /// 首次选中时加载，之后不再重载
    pub texture: Option<LoadedTexture<T>>,
}

#[derive(Debug)]
pub struct MapPack<T> {
    pub name: &'static str,
    pub maps: Vec<SphereMap<T>>,
    pub current: usize,
}

impl<T> MapPack<T> {
    pub fn current_map(&self) -> &SphereMap<T> {
        &self.maps[self.current]
    }
}

const fn map(file: &'static str, source: Projection) -> MapEntry {
    MapEntry {
        file,
        source,
        crop: None,
    }
}

const EARTH: &[MapEntry] = &[
    map("earth1.jpg", Projection::Equirectangular),
    map("earth2.jpg", Projection::Equirectangular),
    map("earth3.jpg", Projection::Equirectangular),
    map("earth4.jpg", Projection::Equirectangular),
    map("earth5.jpg", Projection::Azimuthal),
    map("earth6_pow2.jpg", Projection::Mollweide),
    MapEntry {
        file: "earth7.jpg",
        source: Projection::Mollweide,
        crop: Some(Crop {
            x: 16,
            y: 18,
            w: 1579,
            h: 787,
        }),
    },
    map("earth8.jpg", Projection::Robinson),
];
const MOON: &[MapEntry] = &[map("moon1.jpg", Projection::Equirectangular)];
const MARS: &[MapEntry] = &[
    map("mars1.jpg", Projection::Equirectangular),
    map("mars2.jpg", Projection::Equirectangular),
];
const JUPITER: &[MapEntry] = &[map("jupiter1.jpg", Projection::Equirectangular)];
const SATURN: &[MapEntry] = &[map("saturn1.jpg", Projection::Equirectangular)];
const UNIVERSE: &[MapEntry] = &[map("universe1.jpg", Projection::Mollweide)];

const CATALOG: [(&str, &[MapEntry]); 6] = [
    ("Earth", EARTH),
    ("Moon", MOON),
    ("Mars", MARS),
    ("Jupiter", JUPITER),
    ("Saturn", SATURN),
    ("Universe", UNIVERSE),
];

/// 构建一份全新的（全部未加载的）目录
pub fn catalog<T>() -> Vec<MapPack<T>> {
    CATALOG
        .iter()
        .map(|&(name, entries)| MapPack {
            name,
            maps: entries
                .iter()
                .map(|&entry| SphereMap {
                    entry,
                    texture: None,
                })
                .collect(),
            current: 0,
        })
        .collect()
}
