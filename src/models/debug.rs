use serde::Serialize;

use crate::models::common::Vector3;

/// デバッグ線分の色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DebugColor {
    Blue,
    Green,
    Black,
}

/// デバッグ線分の用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DebugLineKind {
    Forward,
    Right,
    Velocity,
    Target,
}

/// 外部レンダラーへ渡す線分描画要求
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DebugLine {
    pub kind: DebugLineKind,
    pub color: DebugColor,
    pub start: Vector3,
    pub end: Vector3,
}

impl DebugLine {
    pub fn new(kind: DebugLineKind, start: Vector3, end: Vector3) -> Self {
        let color = match kind {
            DebugLineKind::Forward => DebugColor::Blue,
            DebugLineKind::Right | DebugLineKind::Velocity => DebugColor::Green,
            DebugLineKind::Target => DebugColor::Black,
        };
        Self { kind, color, start, end }
    }
}
