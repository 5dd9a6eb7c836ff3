// viewer.rs — 视图状态：旋转、缩放、拖拽手势

use crate::animation::RollAnimator;
use crate::projection::Projection;
use crate::rotation::Orientation;

/// 窗口内的一个像素位置，连同窗口尺寸
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPoint {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 绘制区域（像素），按投影宽高比居中留黑边
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn fit_viewport(width: u32, height: u32, projection: Projection) -> Viewport {
    let (w, h) = (width as f64, height as f64);
    let (pw, ph) = (projection.width(), projection.height());
    if h * pw > w * ph {
        // 宽度受限，上下留边
        let nh = w * ph / pw;
        Viewport {
            x: 0.0,
            y: ((h - nh) / 2.0) as f32,
            width: w as f32,
            height: nh as f32,
        }
    } else {
        let nw = h * pw / ph;
        Viewport {
            x: ((w - nw) / 2.0) as f32,
            y: 0.0,
            width: nw as f32,
            height: h as f32,
        }
    }
}

/// 窗口坐标 → 投影空间坐标：投影显示矩形映射到 [-1, 1]²，y 向上。
pub fn remap_to_map_xy(point: WindowPoint, projection: Projection) -> (f64, f64) {
    let mut x = 2.0 * point.x / point.width - 1.0;
    let mut y = 1.0 - 2.0 * point.y / point.height;
    let (w, h) = (point.width, point.height);
    let (pw, ph) = (projection.width(), projection.height());
    if h * pw > w * ph {
        y *= pw / ph * h / w;
    } else {
        x *= ph / pw * w / h;
    }
    (x, y)
}

pub struct MapViewer {
    pub orientation: Orientation,
    pub animator: RollAnimator,
    pub zoom: f64,
    pub zoom_sensitivity: f64,
    pub is_fullscreen: bool,
    // 拖拽起点的经纬度
    drag: Option<(f64, f64)>,
    // 滚转拖拽上一帧的极角
    roll_drag: Option<f64>,
}

impl MapViewer {
    pub fn new(zoom_sensitivity: f64) -> Self {
        Self {
            orientation: Orientation::new(),
            animator: RollAnimator::new(),
            zoom: 1.0,
            zoom_sensitivity,
            is_fullscreen: false,
            drag: None,
            roll_drag: None,
        }
    }

    /// 窗口点 → 经纬度；落在投影外返回 None
    fn pick(&self, point: WindowPoint, projection: Projection) -> Option<(f64, f64)> {
        let (x, y) = remap_to_map_xy(point, projection);
        if !(-1.0..=1.0).contains(&x) || !(-1.0..=1.0).contains(&y) {
            return None;
        }
        projection.xy_to_uv(x / self.zoom, y / self.zoom)
    }

    /// 左键按下。点在投影轮廓外时不开始拖拽。
    pub fn begin_drag(&mut self, point: WindowPoint, projection: Projection) -> bool {
        self.drag = self.pick(point, projection);
        self.drag.is_some()
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// 光标相对视口中心的极角。窗口最小化（尺寸为 0）时没有意义。
    fn roll_angle(point: WindowPoint, projection: Projection) -> Option<f64> {
        if point.width <= 0.0 || point.height <= 0.0 {
            return None;
        }
        let (x, y) = remap_to_map_xy(point, projection);
        Some(y.atan2(x)).filter(|a| a.is_finite())
    }

    pub fn begin_roll_drag(&mut self, point: WindowPoint, projection: Projection) {
        self.roll_drag = Self::roll_angle(point, projection);
    }

    pub fn end_roll_drag(&mut self) {
        self.roll_drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some() || self.roll_drag.is_some()
    }

    /// 指针移动。返回视图是否改变。
    pub fn pointer_moved(&mut self, point: WindowPoint, projection: Projection) -> bool {
        let mut changed = false;

        if let (Some(start_angle), Some(angle)) = (self.roll_drag, Self::roll_angle(point, projection)) {
            if !self.is_locked() {
                self.orientation.rotate_roll(-(angle - start_angle));
                changed = true;
            }
            self.roll_drag = Some(angle);
        }

        if let Some(start) = self.drag {
            let Some(end) = self.pick(point, projection) else {
                return changed;
            };
            // 等待锁定动画结束期间不接受拖拽
            if !self.animator.lock_pending() {
                self.orientation.drag(start, end);
                changed = true;
            }
            self.drag = Some(end);
        }
        changed
    }

    /// 滚轮缩放，最小 1 倍
    pub fn scroll(&mut self, amount: f64) {
        self.zoom = (self.zoom * (amount / self.zoom_sensitivity).exp()).max(1.0);
    }

    pub fn reset_roll(&mut self, now: f64) {
        self.animator.reset_roll(&self.orientation, now);
    }

    pub fn toggle_lock(&mut self, now: f64) {
        if self.orientation.is_north_locked() {
            self.orientation.unlock();
        } else {
            self.animator.reset_and_lock(&self.orientation, now);
        }
    }

    pub fn is_locked(&self) -> bool {
        self.orientation.is_north_locked() || self.animator.lock_pending()
    }

    /// 推进动画，返回是否还需要下一帧
    pub fn animate(&mut self, now: f64) -> bool {
        self.animator.tick(&mut self.orientation, now)
    }
}
