// 基本的なデータ型と数学ユーティリティ
pub mod common;

// エージェントの基本インターフェース（trait）定義
pub mod traits;

// シーンレジストリとデバッグ描画要求
pub mod scene;
pub mod debug;

// 操舵力と目標選定
pub mod movement;
pub mod targeting;

// 各エージェントモデルの実装
pub mod soldier;
pub mod director;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use scene::{EntityHandle, Obstacle, SafeZone, Scene, SceneManager, Transform};
pub use debug::DebugLine;
pub use soldier::{Soldier, SoldierBehavior};
pub use director::ScriptedMover;
