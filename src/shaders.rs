// shaders.rs — 按 (源投影, 输出投影) 拼接 WGSL
//
// 组合 = common + 源投影的 source_uv_to_xy + 输出投影的 output_xy_to_uv + main

use crate::projection::Projection;

/// 每一侧最多绑定的查找表数
pub const MAX_TABLES: usize = 3;

const COMMON: &str = include_str!("shaders/common.wgsl");
const MAIN: &str = include_str!("shaders/main.wgsl");

fn input_snippet(p: Projection) -> &'static str {
    match p {
        Projection::Equirectangular => include_str!("shaders/input/equirect.wgsl"),
        Projection::Hammer => include_str!("shaders/input/hammer.wgsl"),
        Projection::Azimuthal => include_str!("shaders/input/azimuthal.wgsl"),
        Projection::Mollweide => include_str!("shaders/input/mollweide.wgsl"),
        Projection::Robinson => include_str!("shaders/input/robinson.wgsl"),
    }
}

fn output_snippet(p: Projection) -> &'static str {
    match p {
        Projection::Equirectangular => include_str!("shaders/output/equirect.wgsl"),
        Projection::Hammer => include_str!("shaders/output/hammer.wgsl"),
        Projection::Azimuthal => include_str!("shaders/output/azimuthal.wgsl"),
        Projection::Mollweide => include_str!("shaders/output/mollweide.wgsl"),
        Projection::Robinson => include_str!("shaders/output/robinson.wgsl"),
    }
}

pub fn composition_name(source: Projection, output: Projection) -> String {
    format!("{}_to_{}", source.shader(), output.shader())
}

pub fn composition_source(source: Projection, output: Projection) -> String {
    [COMMON, input_snippet(source), output_snippet(output), MAIN].join("\n")
}
