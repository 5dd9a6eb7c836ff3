// input.rs — 键盘快捷键 → 命令

use crate::projection::Projection;
use winit::event::VirtualKeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectMap(usize),
    /// 菜单里直接点选某个星球的某张图
    SelectEntry { pack: usize, map: usize },
    SelectPack(usize),
    SetProjection(Projection),
    ResetRoll,
    ToggleLock,
    ToggleFullscreen,
    Exit,
}

/// 1–9 选图，Q W E R T Y 选星球，A S D F G 选输出投影
pub fn command_for_key(key: VirtualKeyCode) -> Option<Command> {
    use VirtualKeyCode::*;
    let command = match key {
        Key1 => Command::SelectMap(0),
        Key2 => Command::SelectMap(1),
        Key3 => Command::SelectMap(2),
        Key4 => Command::SelectMap(3),
        Key5 => Command::SelectMap(4),
        Key6 => Command::SelectMap(5),
        Key7 => Command::SelectMap(6),
        Key8 => Command::SelectMap(7),
        Key9 => Command::SelectMap(8),

        Q => Command::SelectPack(0),
        W => Command::SelectPack(1),
        E => Command::SelectPack(2),
        R => Command::SelectPack(3),
        T => Command::SelectPack(4),
        Y => Command::SelectPack(5),

        A => Command::SetProjection(Projection::Equirectangular),
        S => Command::SetProjection(Projection::Hammer),
        D => Command::SetProjection(Projection::Azimuthal),
        F => Command::SetProjection(Projection::Mollweide),
        G => Command::SetProjection(Projection::Robinson),

        Space => Command::ResetRoll,
        X => Command::ToggleLock,
        F11 => Command::ToggleFullscreen,
        Escape => Command::Exit,
        _ => return None,
    };
    Some(command)
}
