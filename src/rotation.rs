// rotation.rs — 球体旋转矩阵与北向锁定
//
// R 把世界方向映射到视线方向：d_view = R · d_world。
// 渲染时 shader 用 Rᵀ 把屏幕上的方向转回世界坐标再去源图采样。
// R 必须始终是纯旋转，所有更新都以左乘另一个旋转矩阵的方式进行。

use glam::{DMat3, DVec3};
use std::f64::consts::FRAC_PI_2;

/// 按行构造，方便对照公式
fn from_rows(r: [[f64; 3]; 3]) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(r[0][0], r[1][0], r[2][0]),
        DVec3::new(r[0][1], r[1][1], r[2][1]),
        DVec3::new(r[0][2], r[1][2], r[2][2]),
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix(DMat3);

impl Default for RotationMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl RotationMatrix {
    pub fn identity() -> Self {
        Self(DMat3::IDENTITY)
    }

    pub fn matrix(&self) -> DMat3 {
        self.0
    }

    /// 第 `row` 行第 `col` 列
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.0.col(col)[row]
    }

    /// 绕视线轴旋转（画面内的滚转）。
    pub fn rotate_roll(&mut self, roll: f64) {
        let (sz, cz) = roll.sin_cos();
        let rotz = from_rows([[cz, sz, 0.0], [-sz, cz, 0.0], [0.0, 0.0, 1.0]]);
        self.0 = rotz * self.0;
    }

    /// 先俯仰 `rx`（绕 x 轴）再偏航 `ry`（绕 y 轴），即左乘 Ry(ry)·Rx(rx)。
    pub fn rotate_by(&mut self, rx: f64, ry: f64) {
        let (sx, cx) = rx.sin_cos();
        let (sy, cy) = ry.sin_cos();
        let rotxy = from_rows([
            [cy, -sx * sy, cx * sy],
            [0.0, cx, sx],
            [-sy, -sx * cy, cx * cy],
        ]);
        self.0 = rotxy * self.0;
    }

    /// 北方向（世界 y 轴）在画面里偏离正上方的角度。
    pub fn roll(&self) -> f64 {
        (-self.at(0, 1)).atan2(self.at(1, 1))
    }

    pub fn determinant(&self) -> f64 {
        self.0.determinant()
    }

    /// Rᵀ·R 与单位阵的最大偏差
    pub fn orthonormal_error(&self) -> f64 {
        let m = self.0.transpose() * self.0 - DMat3::IDENTITY;
        m.to_cols_array()
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()))
    }

    /// 上传给 GPU 的列（WGSL mat3x3 每列按 vec4 对齐）
    pub fn to_gpu_columns(&self) -> [[f32; 4]; 3] {
        let c = |i: usize| {
            let v = self.0.col(i);
            [v.x as f32, v.y as f32, v.z as f32, 0.0]
        };
        [c(0), c(1), c(2)]
    }
}

/// 旋转状态机：当前 R 以及北向锁定模式。
#[derive(Debug, Clone, Default)]
pub struct Orientation {
    matrix: RotationMatrix,
    north_locked: bool,
    // 锁定模式下单独累计的经纬度
    longitude: f64,
    latitude: f64,
}

impl Orientation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(&self) -> &RotationMatrix {
        &self.matrix
    }

    pub fn is_north_locked(&self) -> bool {
        self.north_locked
    }

    pub fn roll(&self) -> f64 {
        self.matrix.roll()
    }

    pub fn rotate_roll(&mut self, roll: f64) {
        self.matrix.rotate_roll(roll);
    }

    /// 拖拽：把起点 (经, 纬) 转到终点 (经, 纬)。
    pub fn drag(&mut self, start: (f64, f64), end: (f64, f64)) {
        let (su, sv) = start;
        let (eu, ev) = end;
        if self.north_locked {
            self.longitude += eu - su;
            self.latitude = (self.latitude + ev - sv).clamp(-FRAC_PI_2, FRAC_PI_2);
            self.rebuild();
        } else {
            // 先按起点经度转回子午线，再做俯仰/偏航，最后转回去，
            // 避免远离赤道时偏航和俯仰互相耦合
            self.matrix.rotate_by(0.0, -su);
            self.matrix.rotate_by(ev - sv, eu - su);
            self.matrix.rotate_by(0.0, su);
        }
    }

    /// 锁定模式下每次都从单位阵重建，保证没有滚转
    fn rebuild(&mut self) {
        self.matrix = RotationMatrix::identity();
        self.matrix.rotate_by(0.0, self.longitude);
        self.matrix.rotate_by(self.latitude, 0.0);
    }

    /// 从当前矩阵推出经纬度累计量并进入锁定模式。
    /// 调用前滚转应当已经归零。
    pub fn lock_north(&mut self) {
        // 世界 z 轴 (0, 0, 1) 被转到了哪里
        self.latitude = -self.matrix.at(2, 1).clamp(-1.0, 1.0).asin();
        self.longitude = -self.matrix.at(2, 0).atan2(self.matrix.at(2, 2));
        self.north_locked = true;
        self.rebuild();
    }

    pub fn unlock(&mut self) {
        self.north_locked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn assert_rotation(m: &RotationMatrix) {
        assert!(m.orthonormal_error() < 1e-4, "RᵀR drift {}", m.orthonormal_error());
        assert!((m.determinant() - 1.0).abs() < 1e-4, "det {}", m.determinant());
    }

    #[test]
    fn rotate_by_matches_yaw_then_pitch_composition() {
        let mut m = RotationMatrix::identity();
        m.rotate_by(0.3, -1.1);
        let expected = DMat3::from_rotation_y(-1.1) * DMat3::from_rotation_x(-0.3);
        // glam 的 from_rotation_x 与这里的俯仰方向相反
        assert!(m.matrix().abs_diff_eq(expected, 1e-12));
    }

    #[test]
    fn yaw_shifts_longitude() {
        let mut m = RotationMatrix::identity();
        m.rotate_by(0.0, 0.5);
        // 世界经度 0 的赤道点被转到视线经度 0.5
        let d = m.matrix() * DVec3::new(0.0, 0.0, 1.0);
        assert!(approx_eq!(f64, d.x.atan2(d.z), 0.5, epsilon = 1e-12));
    }

    #[test]
    fn roll_reports_angle_of_north() {
        let mut m = RotationMatrix::identity();
        assert_eq!(m.roll(), 0.0);
        m.rotate_roll(0.25);
        assert!(approx_eq!(f64, m.roll(), -0.25, epsilon = 1e-12));
        m.rotate_roll(-0.25);
        assert!(approx_eq!(f64, m.roll(), 0.0, epsilon = 1e-12));
    }

    #[test]
    fn drag_moves_start_point_onto_end_point() {
        let mut o = Orientation::new();
        o.rotate_roll(0.4);
        o.drag((0.1, 0.2), (-0.3, 0.5));

        let start = (0.3, -0.2);
        let end = (0.9, 0.35);
        let before = o.matrix().matrix();
        o.drag(start, end);
        let after = o.matrix().matrix();

        let dir = |(u, v): (f64, f64)| DVec3::new(v.cos() * u.sin(), v.sin(), v.cos() * u.cos());
        let world = before.transpose() * dir(start);
        let seen = after * world;
        assert!(seen.abs_diff_eq(dir(end), 1e-9));
    }

    #[test]
    fn locked_drag_keeps_zero_roll() {
        let mut o = Orientation::new();
        o.lock_north();
        for i in 0..50 {
            let t = i as f64 * 0.37;
            o.drag((t.sin(), 0.1 * t.cos()), (t.cos(), 0.3 * t.sin()));
            assert!(o.roll().abs() < 1e-9);
        }
        assert!(o.is_north_locked());
    }

    #[test]
    fn locked_latitude_is_clamped() {
        let mut o = Orientation::new();
        o.lock_north();
        o.drag((0.0, 0.0), (0.0, 3.0));
        assert!(approx_eq!(f64, o.latitude, FRAC_PI_2, epsilon = 1e-12));
        assert_rotation(o.matrix());
    }

    #[test]
    fn lock_north_preserves_unrolled_view() {
        let mut o = Orientation::new();
        o.matrix.rotate_by(0.0, 0.8);
        o.matrix.rotate_by(-0.4, 0.0);
        let before = *o.matrix();
        o.lock_north();
        assert!(approx_eq!(f64, o.longitude, 0.8, epsilon = 1e-9));
        assert!(approx_eq!(f64, o.latitude, -0.4, epsilon = 1e-9));
        assert!(o.matrix().matrix().abs_diff_eq(before.matrix(), 1e-9));
    }

    #[test]
    fn gpu_columns_follow_matrix_columns() {
        let mut m = RotationMatrix::identity();
        m.rotate_roll(0.5);
        let cols = m.to_gpu_columns();
        assert!(approx_eq!(f32, cols[0][1], -(0.5f64.sin() as f32), epsilon = 1e-6));
        assert!(approx_eq!(f32, cols[1][0], 0.5f64.sin() as f32, epsilon = 1e-6));
        assert_eq!(cols[2], [0.0, 0.0, 1.0, 0.0]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Roll(f64),
        By(f64, f64),
        Drag((f64, f64), (f64, f64)),
    }

    fn op() -> impl Strategy<Value = Op> {
        let angle = -4.0f64..4.0;
        let lon = -3.14f64..3.14;
        let lat = -1.57f64..1.57;
        prop_oneof![
            angle.clone().prop_map(Op::Roll),
            (angle.clone(), angle).prop_map(|(a, b)| Op::By(a, b)),
            ((lon.clone(), lat.clone()), (lon, lat)).prop_map(|(s, e)| Op::Drag(s, e)),
        ]
    }

    proptest! {
        #[test]
        fn stays_orthonormal_under_composition(ops in proptest::collection::vec(op(), 1..200)) {
            let mut o = Orientation::new();
            for op in ops {
                match op {
                    Op::Roll(a) => o.rotate_roll(a),
                    Op::By(a, b) => o.matrix.rotate_by(a, b),
                    Op::Drag(s, e) => o.drag(s, e),
                }
            }
            assert_rotation(o.matrix());
        }

        #[test]
        fn north_lock_never_rolls(
            drags in proptest::collection::vec(((-3.0f64..3.0, -1.5f64..1.5), (-3.0f64..3.0, -1.5f64..1.5)), 1..100)
        ) {
            let mut o = Orientation::new();
            o.lock_north();
            for (s, e) in drags {
                o.drag(s, e);
                prop_assert!(o.roll().abs() < 1e-9);
            }
        }
    }
}
