// projection/robinson.rs — Robinson 投影的样条插值表
//
// Robinson 投影没有解析式，只有每 5° 纬度一行的经验表。
// 用三次 Hermite 样条在表之间插值，切线用相邻差分估计。
// 生成三张等长的表：
//   l_to_x: 纬度比例 (|φ| / 90°) → x 缩放
//   l_to_y: 纬度比例 → y
//   y_to_l: y → 纬度比例（由 l_to_y 反推）

use super::table::{sample_linear, LookupTable};
use crate::error::TableError;
use once_cell::sync::OnceCell;
use std::f64::consts::{FRAC_PI_2, PI};

const X: [f64; 19] = [
    1.0000, 0.9986, 0.9954, 0.9900, 0.9822, 0.9730, 0.9600, 0.9427, 0.9216, 0.8962, 0.8679,
    0.8350, 0.7986, 0.7597, 0.7186, 0.6732, 0.6213, 0.5722, 0.5322,
];
const Y: [f64; 19] = [
    0.0000, 0.0620, 0.1240, 0.1860, 0.2480, 0.3100, 0.3720, 0.4340, 0.4958, 0.5571, 0.6176,
    0.6769, 0.7346, 0.7903, 0.8435, 0.8936, 0.9394, 0.9761, 1.0000,
];
const ROWS: usize = X.len();

pub const COUNT: usize = 2048;

/// 反推 y_to_l 空槽时二分的最多次数
const MAX_REFINE: usize = 20;

#[inline]
fn sqr(t: f64) -> f64 {
    t * t
}

fn h00(t: f64) -> f64 {
    (1.0 + 2.0 * t) * sqr(1.0 - t)
}
fn h10(t: f64) -> f64 {
    t * sqr(1.0 - t)
}
fn h01(t: f64) -> f64 {
    sqr(t) * (3.0 - 2.0 * t)
}
fn h11(t: f64) -> f64 {
    sqr(t) * (t - 1.0)
}

fn hermite(t: f64, p0: f64, m0: f64, p1: f64, m1: f64) -> f64 {
    h00(t) * p0 + h10(t) * m0 + h01(t) * p1 + h11(t) * m1
}

/// 控制点上的切线取两侧差分的平均。`mirror` 是第 -1 行的值：
/// x 关于赤道偶对称，y 奇对称。
fn tangents(values: &[f64; ROWS], mirror: f64) -> [f64; ROWS] {
    let mut out = [0.0; ROWS];
    out[ROWS - 1] = values[ROWS - 1] - values[ROWS - 2];
    let mut last = mirror;
    for i in 0..ROWS - 1 {
        out[i] = ((values[i] - last) + (values[i + 1] - values[i])) / 2.0;
        last = values[i];
    }
    out
}

struct Spline {
    values: &'static [f64; ROWS],
    tangents: [f64; ROWS],
}

impl Spline {
    fn eval(&self, l: f64) -> f64 {
        let pos = l.clamp(0.0, 1.0) * (ROWS - 1) as f64;
        let ind = (pos as usize).min(ROWS - 2);
        let t = pos - ind as f64;
        hermite(
            t,
            self.values[ind],
            self.tangents[ind],
            self.values[ind + 1],
            self.tangents[ind + 1],
        )
    }
}

fn slot_of(value: f64) -> usize {
    ((value.max(0.0) * (COUNT - 1) as f64) as usize).min(COUNT - 1)
}

fn fraction(i: usize) -> f64 {
    i as f64 / (COUNT - 1) as f64
}

#[derive(Debug)]
pub struct RobinsonTables {
    y_to_l: Vec<f32>,
    l_to_y: Vec<f32>,
    l_to_x: Vec<f32>,
}

impl RobinsonTables {
    pub fn generate() -> Result<Self, TableError> {
        let x_spline = Spline {
            values: &X,
            tangents: tangents(&X, X[1]),
        };
        let y_spline = Spline {
            values: &Y,
            tangents: tangents(&Y, -Y[1]),
        };

        let mut l_to_x = Vec::with_capacity(COUNT);
        let mut l_to_y = Vec::with_capacity(COUNT);
        let mut y_to_l = vec![f32::NAN; COUNT];

        // 正向采样，同时把结果散射进反表
        for i in 0..COUNT {
            let l = fraction(i);
            let y = y_spline.eval(l);
            l_to_x.push(x_spline.eval(l) as f32);
            l_to_y.push(y as f32);
            y_to_l[slot_of(y)] = l as f32;
        }
        y_to_l[0] = 0.0;
        y_to_l[COUNT - 1] = 1.0;

        // 没有正向样本落进的槽：在两侧已填的邻居之间二分
        for i in 1..COUNT - 1 {
            if y_to_l[i].is_finite() {
                continue;
            }
            let Some(r) = (i + 1..COUNT).find(|&r| y_to_l[r].is_finite()) else {
                break;
            };
            let mut lo = y_to_l[i - 1] as f64;
            let mut hi = y_to_l[r] as f64;
            let target = fraction(i);
            let mut found = None;
            for _ in 0..MAX_REFINE {
                let mid = (lo + hi) / 2.0;
                let s = slot_of(y_spline.eval(mid));
                if s == i {
                    found = Some(mid);
                    break;
                }
                if y_spline.eval(mid) < target {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            y_to_l[i] = found.unwrap_or(hi) as f32;
        }

        let tables = Self {
            y_to_l,
            l_to_y,
            l_to_x,
        };
        tables.verify()?;
        Ok(tables)
    }

    /// 生成后要求每个槽都是 [0, 1] 内的有限值。
    fn verify(&self) -> Result<(), TableError> {
        for (table, data) in [
            ("robinson_y_to_l", &self.y_to_l),
            ("robinson_l_to_y", &self.l_to_y),
        ] {
            for (slot, &value) in data.iter().enumerate() {
                if value.is_nan() {
                    return Err(TableError::Unfilled { table, slot });
                }
                if !(0.0..=1.0).contains(&value) {
                    return Err(TableError::OutOfRange { table, slot, value });
                }
            }
        }
        for (slot, &value) in self.l_to_x.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(TableError::OutOfRange {
                    table: "robinson_l_to_x",
                    slot,
                    value,
                });
            }
        }
        Ok(())
    }

    pub fn y_to_l(&self) -> &[f32] {
        &self.y_to_l
    }

    pub fn l_to_y(&self) -> &[f32] {
        &self.l_to_y
    }

    pub fn l_to_x(&self) -> &[f32] {
        &self.l_to_x
    }

    pub fn xy_to_uv(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !(-1.0..=1.0).contains(&y) {
            return None;
        }
        let sign = if y < 0.0 { -1.0 } else { 1.0 };
        let n = (COUNT - 1) as f64;
        let l = sample_linear(&self.y_to_l, sign * y * n);
        let u = x / sample_linear(&self.l_to_x, l * n);
        if !(-1.0..=1.0).contains(&u) {
            return None;
        }
        Some((u * PI, sign * l * FRAC_PI_2))
    }

    pub fn uv_to_xy(&self, u: f64, v: f64) -> (f64, f64) {
        let sign = if v < 0.0 { -1.0 } else { 1.0 };
        let n = (COUNT - 1) as f64;
        let l = (v.abs() / FRAC_PI_2).min(1.0);
        let x = sample_linear(&self.l_to_x, l * n) * u / PI;
        let y = sign * sample_linear(&self.l_to_y, l * n);
        (x, y)
    }

    /// 作为源投影时 shader 需要 l→y 与 l→x。
    pub fn input_tables(&'static self) -> Vec<LookupTable> {
        vec![
            LookupTable {
                name: "robinson_l_to_y",
                data: &self.l_to_y,
            },
            LookupTable {
                name: "robinson_l_to_x",
                data: &self.l_to_x,
            },
        ]
    }

    /// 作为输出投影时 shader 需要 y→l 与 l→x。
    pub fn output_tables(&'static self) -> Vec<LookupTable> {
        vec![
            LookupTable {
                name: "robinson_y_to_l",
                data: &self.y_to_l,
            },
            LookupTable {
                name: "robinson_l_to_x",
                data: &self.l_to_x,
            },
        ]
    }
}

static TABLES: OnceCell<Result<RobinsonTables, TableError>> = OnceCell::new();

pub fn tables() -> Result<&'static RobinsonTables, TableError> {
    TABLES
        .get_or_init(|| {
            let tables = RobinsonTables::generate();
            match &tables {
                Ok(_) => log::debug!("generated Robinson spline tables ({COUNT} samples)"),
                Err(e) => log::error!("Robinson table generation failed: {e}"),
            }
            tables
        })
        .as_ref()
        .map_err(Clone::clone)
}
