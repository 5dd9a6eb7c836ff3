//! Interactive celestial-sphere map viewer.
//!
//! 地图以某种投影保存，屏幕上以另一种投影显示；拖动旋转球体，
//! 滚轮缩放，空格把北方转回正上方。

pub mod animation;
pub mod config;
pub mod error;
pub mod images;
pub mod input;
pub mod maps;
pub mod projection;
pub mod renderer;
pub mod rotation;
pub mod session;
pub mod shaders;
pub mod viewer;
