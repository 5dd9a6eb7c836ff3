// projection/mod.rs — 投影注册表
//
// 约定：
// - (x, y) 为投影空间归一化坐标，显示区域为 [-1, 1]²，y 向上
// - (u, v) 为经度 [-π, π] 与纬度 [-π/2, π/2]
// - 落在投影轮廓之外（或算出 NaN）一律返回 None，这是正常分支而不是错误

pub mod mollweide;
pub mod robinson;
pub mod table;

use crate::error::{TableError, ViewerError};
use serde::Deserialize;
use std::f64::consts::{FRAC_PI_2, PI, SQRT_2};
use std::fmt;
use table::LookupTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    Equirectangular, // 1. 等距圆柱，2:1
    Hammer,          // 2. Hammer 等积，椭圆轮廓
    Azimuthal,       // 3. 以北极为中心的方位等距，圆形轮廓
    Mollweide,       // 4. Mollweide 等积，正算需要查表
    Robinson,        // 5. Robinson，经验表 + 样条
}

/// 查找表用于哪一侧：源图采样（uv → xy）还是屏幕反算（xy → uv）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableRole {
    Input,
    Output,
}

impl Projection {
    pub const ALL: [Projection; 5] = [
        Projection::Equirectangular,
        Projection::Hammer,
        Projection::Azimuthal,
        Projection::Mollweide,
        Projection::Robinson,
    ];

    /// 投影空间的宽高（单位无关，只用比例）
    pub fn width(self) -> f64 {
        match self {
            Projection::Azimuthal => 1.0,
            Projection::Robinson => 10000.0,
            _ => 2.0,
        }
    }

    pub fn height(self) -> f64 {
        match self {
            Projection::Robinson => 2536.0 * 2.0,
            _ => 1.0,
        }
    }

    pub fn aspect(self) -> f64 {
        self.width() / self.height()
    }

    /// shader 片段名
    pub fn shader(self) -> &'static str {
        match self {
            Projection::Equirectangular => "equirect",
            Projection::Hammer => "hammer",
            Projection::Azimuthal => "azimuthal",
            Projection::Mollweide => "mollweide",
            Projection::Robinson => "robinson",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Projection::Equirectangular => "Equirectangular",
            Projection::Hammer => "Hammer",
            Projection::Azimuthal => "Azimuthal",
            Projection::Mollweide => "Mollweide",
            Projection::Robinson => "Robinson",
        }
    }

    /// 屏幕坐标 → 经纬度。
    pub fn xy_to_uv(self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (u, v) = match self {
            Projection::Equirectangular => equirectangular_xy_to_uv(x, y)?,
            Projection::Hammer => hammer_xy_to_uv(x, y)?,
            Projection::Azimuthal => azimuthal_xy_to_uv(x, y)?,
            Projection::Mollweide => mollweide_xy_to_uv(x, y)?,
            Projection::Robinson => robinson::tables().ok()?.xy_to_uv(x, y)?,
        };
        if u.is_nan() || v.is_nan() {
            return None;
        }
        Some((u, v))
    }

    /// 经纬度 → 屏幕坐标，源图采样走的就是这个方向。
    pub fn uv_to_xy(self, u: f64, v: f64) -> Option<(f64, f64)> {
        let (x, y) = match self {
            Projection::Equirectangular => (u / PI, v / FRAC_PI_2),
            Projection::Hammer => {
                let d = (1.0 + v.cos() * (u / 2.0).cos()).sqrt();
                (v.cos() * (u / 2.0).sin() / d, v.sin() / d)
            }
            Projection::Azimuthal => {
                let r = (FRAC_PI_2 - v) / PI;
                if r >= 1.0 {
                    return None;
                }
                (r * u.sin(), -r * u.cos())
            }
            Projection::Mollweide => mollweide::table().ok()?.uv_to_xy(u, v),
            Projection::Robinson => robinson::tables().ok()?.uv_to_xy(u, v),
        };
        if x.is_nan() || y.is_nan() {
            return None;
        }
        Some((x, y))
    }

    /// 组合 shader 时调用的准备钩子：返回需要上传的查找表。
    /// 表生成失败会让这个投影不可用。
    pub fn lookup_tables(self, role: TableRole) -> Result<Vec<LookupTable>, ViewerError> {
        let wrap = |source: TableError| ViewerError::Tables {
            projection: self.label(),
            source,
        };
        match (self, role) {
            (Projection::Mollweide, TableRole::Input) => {
                Ok(mollweide::table().map_err(wrap)?.lookup_tables())
            }
            (Projection::Robinson, TableRole::Input) => {
                Ok(robinson::tables().map_err(wrap)?.input_tables())
            }
            (Projection::Robinson, TableRole::Output) => {
                Ok(robinson::tables().map_err(wrap)?.output_tables())
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn equirectangular_xy_to_uv(x: f64, y: f64) -> Option<(f64, f64)> {
    Some((x * PI, y * FRAC_PI_2))
}

fn hammer_xy_to_uv(x: f64, y: f64) -> Option<(f64, f64)> {
    let nx = x / SQRT_2;
    let ny = y / SQRT_2;
    let z_p1 = nx * nx + ny * ny;
    if z_p1 > 0.5 {
        return None;
    }
    let z = (1.0 - z_p1).sqrt();
    let u = 2.0 * (z * nx * 2.0 / (2.0 * z * z - 1.0)).atan();
    let v = (z * ny * 2.0).asin();
    Some((u, v))
}

fn azimuthal_xy_to_uv(x: f64, y: f64) -> Option<(f64, f64)> {
    let r2 = x * x + y * y;
    if r2 >= 1.0 {
        return None;
    }
    Some((x.atan2(-y), FRAC_PI_2 - r2.sqrt() * PI))
}

fn mollweide_xy_to_uv(x: f64, y: f64) -> Option<(f64, f64)> {
    let theta = y.asin();
    let u = x * PI / theta.cos();
    if !(-PI..=PI).contains(&u) {
        return None;
    }
    let v = (mollweide::kepler(theta) / PI).asin();
    Some((u, v))
}
