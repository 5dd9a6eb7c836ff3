// projection/mollweide.rs — Mollweide 正算所需的 2θ + sin(2θ) 反函数表
//
// 由纬度求 Mollweide 的 y 需要解 2θ + sin(2θ) = π·sin(φ)，没有闭式解。
// 这里预先把反函数采样成表，shader 和 CPU 都查表。
//
// 函数在 0 附近斜率大、在 π/2 附近斜率趋于 0，所以表分成三段，
// 越靠近极点采样越密：
//   [0, 3.0]     512 个样本
//   [3.0, 3.14]  4096 个样本
//   [3.14, π]    8192 个样本
// 相邻两段共享边界上的那个样本。

use super::table::{sample_linear, LookupTable};
use crate::error::TableError;
use once_cell::sync::OnceCell;
use std::f64::consts::{FRAC_PI_2, PI};

pub const COUNT_000: usize = 512;
pub const COUNT_300: usize = 4096;
pub const COUNT_314: usize = 8192;
pub const COUNT: usize = COUNT_000 - 1 + COUNT_300 - 1 + COUNT_314;

const OFFSET_300: usize = COUNT_000 - 1;
const OFFSET_314: usize = COUNT_000 - 1 + COUNT_300 - 1;

const TABLE_NAME: &str = "mollweide";

/// y = 2θ + sin(2θ)
pub fn kepler(theta: f64) -> f64 {
    2.0 * theta + (2.0 * theta).sin()
}

/// 把函数值映射到表中的（小数）位置，三段各自线性。
pub fn val_to_position(v: f64) -> f64 {
    if v <= 3.0 {
        return (v / 3.0) * (COUNT_000 - 1) as f64;
    }
    if v <= 3.14 {
        return OFFSET_300 as f64 + (v - 3.0) / 0.14 * (COUNT_300 - 1) as f64;
    }
    OFFSET_314 as f64 + (v - 3.14) / (PI - 3.14) * (COUNT_314 - 1) as f64
}

pub fn val_to_index(v: f64) -> usize {
    (val_to_position(v).max(0.0) as usize).min(COUNT - 1)
}

#[derive(Debug)]
pub struct MollweideTable {
    values: Vec<f32>,
}

impl MollweideTable {
    /// 从 (y=0 → θ=0) 和 (y=π → θ=π/2) 出发，递归二分 θ，
    /// 把每个中点的结果写进它落入的槽，直到相邻槽都被填满。
    pub fn generate() -> Result<Self, TableError> {
        let mut values = vec![f32::NAN; COUNT];
        fill_between(&mut values, 0, COUNT - 1, 0.0, FRAC_PI_2);
        values[0] = 0.0;
        values[COUNT - 1] = FRAC_PI_2 as f32;

        let table = Self { values };
        table.verify()?;
        Ok(table)
    }

    /// 每个槽都必须被写过。
    fn verify(&self) -> Result<(), TableError> {
        match self.values.iter().position(|v| !v.is_finite()) {
            Some(slot) => Err(TableError::Unfilled {
                table: TABLE_NAME,
                slot,
            }),
            None => Ok(()),
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// 三段各自的样本，对应三张 1D 纹理。
    pub fn regions(&self) -> [&[f32]; 3] {
        [
            &self.values[..COUNT_000],
            &self.values[OFFSET_300..OFFSET_300 + COUNT_300],
            &self.values[OFFSET_314..],
        ]
    }

    /// 对 `target ∈ [0, π]` 求 θ，使 2θ + sin(2θ) ≈ target。
    pub fn theta(&self, target: f64) -> f64 {
        sample_linear(&self.values, val_to_position(target.clamp(0.0, PI)))
    }

    /// 经纬度 → Mollweide 平面坐标
    pub fn uv_to_xy(&self, u: f64, v: f64) -> (f64, f64) {
        let target = PI * v.sin();
        let theta = target.signum() * self.theta(target.abs());
        (u / PI * theta.cos(), theta.sin())
    }

    pub fn lookup_tables(&'static self) -> Vec<LookupTable> {
        let [a, b, c] = self.regions();
        vec![
            LookupTable {
                name: "mollweide_000_300",
                data: a,
            },
            LookupTable {
                name: "mollweide_300_314",
                data: b,
            },
            LookupTable {
                name: "mollweide_314_pi",
                data: c,
            },
        ]
    }
}

fn fill_between(values: &mut [f32], li: usize, ri: usize, l: f64, r: f64) {
    let mid = (l + r) / 2.0;
    // 区间已缩到浮点精度以下
    if mid <= l || mid >= r {
        return;
    }
    let m = val_to_index(kepler(mid));
    values[m] = mid as f32;

    if m > li + 1 {
        fill_between(values, li, m, l, mid);
    }
    if m + 1 < ri {
        fill_between(values, m, ri, mid, r);
    }
}

static TABLE: OnceCell<Result<MollweideTable, TableError>> = OnceCell::new();

/// 进程内只生成一次。
pub fn table() -> Result<&'static MollweideTable, TableError> {
    TABLE
        .get_or_init(|| {
            let table = MollweideTable::generate();
            match &table {
                Ok(_) => log::debug!("generated Mollweide inverse table ({COUNT} samples)"),
                Err(e) => log::error!("Mollweide table generation failed: {e}"),
            }
            table
        })
        .as_ref()
        .map_err(Clone::clone)
}
