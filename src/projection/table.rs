// projection/table.rs — 一维查找表的描述与 CPU 采样

/// 一张需要上传为 1D 纹理的预计算表。
#[derive(Debug, Clone, Copy)]
pub struct LookupTable {
    pub name: &'static str,
    pub data: &'static [f32],
}

/// 最近邻采样，`position` 为表下标（可为小数），超界时夹到两端。
pub fn sample_nearest(table: &[f32], position: f64) -> f64 {
    let last = table.len() - 1;
    let i = position.clamp(0.0, last as f64) as usize;
    table[i] as f64
}

/// 线性采样，与 shader 里的 `table_lookup` 行为一致。
pub fn sample_linear(table: &[f32], position: f64) -> f64 {
    let last = table.len() - 1;
    let p = position.clamp(0.0, last as f64);
    let i = p.floor() as usize;
    let j = (i + 1).min(last);
    let a = table[i] as f64;
    let b = table[j] as f64;
    a + (b - a) * (p - i as f64)
}
