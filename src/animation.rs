// animation.rs — 滚转归零动画（把北方转回正上方）

use crate::rotation::Orientation;

/// 动画时长（秒）
pub const ROLL_ANIMATION_DURATION: f64 = 0.4;

/// 五次缓出
fn ease_out_quintic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(5)
}

#[derive(Debug, Clone)]
pub struct RollAnimator {
    amount: f64,
    start: f64,
    // 上一帧的进度；>= 1 表示空闲
    last: f64,
    lock_after: bool,
}

impl Default for RollAnimator {
    fn default() -> Self {
        Self {
            amount: 0.0,
            start: 0.0,
            last: 1.0,
            lock_after: false,
        }
    }
}

impl RollAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_animating(&self) -> bool {
        self.last < 1.0
    }

    /// 有一个“完成后锁定北向”的动画正在进行
    pub fn lock_pending(&self) -> bool {
        self.lock_after
    }

    /// 开始（或重新开始）滚转归零。动画中再次调用会按当前滚转重算目标。
    pub fn reset_roll(&mut self, orientation: &Orientation, now: f64) {
        self.amount = orientation.roll();
        self.start = now;
        self.last = 0.0;
    }

    /// 归零完成后进入北向锁定
    pub fn reset_and_lock(&mut self, orientation: &Orientation, now: f64) {
        self.lock_after = true;
        self.reset_roll(orientation, now);
    }

    /// 推进一帧。返回 `true` 表示这一帧有变化、需要继续刷新。
    pub fn tick(&mut self, orientation: &mut Orientation, now: f64) -> bool {
        if !self.is_animating() {
            return false;
        }
        let t = ((now - self.start) / ROLL_ANIMATION_DURATION).clamp(0.0, 1.0);
        let distance = ease_out_quintic(t) - ease_out_quintic(self.last);
        orientation.rotate_roll(self.amount * distance);
        self.last = t;

        if t >= 1.0 && self.lock_after {
            self.lock_after = false;
            orientation.lock_north();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rolled(angle: f64) -> Orientation {
        let mut o = Orientation::new();
        o.drag((0.2, 0.1), (-0.4, 0.6));
        o.rotate_roll(angle);
        o
    }

    fn run(anim: &mut RollAnimator, o: &mut Orientation, from: f64, frames: usize) {
        for i in 1..=frames {
            anim.tick(o, from + i as f64 * 0.016);
        }
    }

    #[test]
    fn idle_until_reset() {
        let mut anim = RollAnimator::new();
        let mut o = rolled(0.7);
        assert!(!anim.is_animating());
        assert!(!anim.tick(&mut o, 10.0));
    }

    #[test]
    fn converges_to_north_up_from_any_roll() {
        for &angle in &[0.3, -1.2, 2.9, -3.0, 0.0] {
            let mut anim = RollAnimator::new();
            let mut o = rolled(angle);
            anim.reset_roll(&o, 5.0);
            assert!(anim.is_animating());
            run(&mut anim, &mut o, 5.0, 40);
            assert!(!anim.is_animating());
            assert!(o.roll().abs() < 1e-3, "roll {} left from {angle}", o.roll());
        }
    }

    #[test]
    fn eases_out() {
        let mut anim = RollAnimator::new();
        let mut o = rolled(1.0);
        let initial = o.roll();
        anim.reset_roll(&o, 0.0);
        anim.tick(&mut o, ROLL_ANIMATION_DURATION / 2.0);
        // 半程时已经转过了大部分
        let done = 1.0 - o.roll() / initial;
        assert!((done - ease_out_quintic(0.5)).abs() < 1e-9);
        assert!(done > 0.9);
    }

    #[test]
    fn restart_recomputes_target() {
        let mut anim = RollAnimator::new();
        let mut o = rolled(1.0);
        anim.reset_roll(&o, 0.0);
        anim.tick(&mut o, 0.1);
        o.rotate_roll(-0.5);
        anim.reset_roll(&o, 0.1);
        run(&mut anim, &mut o, 0.1, 40);
        assert!(o.roll().abs() < 1e-3);
    }

    #[test]
    fn locks_north_after_completion() {
        let mut anim = RollAnimator::new();
        let mut o = rolled(-0.8);
        anim.reset_and_lock(&o, 0.0);
        assert!(anim.lock_pending());
        anim.tick(&mut o, 0.2);
        assert!(!o.is_north_locked());
        anim.tick(&mut o, 1.0);
        assert!(o.is_north_locked());
        assert!(!anim.lock_pending());
        assert!(o.roll().abs() < 1e-9);
    }
}
