use crate::models::common::Vector3;
use crate::models::debug::DebugLine;
use crate::models::scene::{EntityHandle, Scene, Transform};
use crate::simulation::SimulationError;

/// エージェントの1ティックの結果としてシーンへ反映する変更
///
/// ティック中はシーンを読み取り専用で参照し、全エージェントの処理後に
/// エンジンがまとめて適用します。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneCommand {
    /// Transformの書き戻し
    SetTransform(EntityHandle, Transform),
    /// エンティティの消滅
    Despawn(EntityHandle),
}

/// 全てのシミュレーションエージェントが実装する基本インターフェース
pub trait IAgent {
    /// エージェントの初期化（起動時検証を含む）
    fn initialize(&mut self, scene: &Scene) -> Result<(), SimulationError>;

    /// 1ティックの処理実行
    ///
    /// `scene` は前フレーム終了時点のスナップショットです。
    fn tick(&mut self, dt: f64, scene: &Scene) -> Option<SceneCommand>;

    /// エージェントIDの取得
    fn get_id(&self) -> String;

    /// エージェントがアクティブかどうか
    fn is_active(&self) -> bool;
}

/// 移動可能なエージェントのインターフェース
pub trait IMovable {
    /// 現在位置の取得
    fn get_position(&self) -> Vector3;

    /// 現在速度の取得
    fn get_velocity(&self) -> Vector3;

    /// 向いている方向の取得（停止中はゼロベクトル）
    fn get_direction(&self) -> Vector3;
}

/// デバッグ描画用の線分を提供するインターフェース
pub trait IDebugDraw {
    /// 全ティック完了後に呼び出され、描画要求を返す
    fn collect_debug_primitives(&self, scene: &Scene) -> Vec<DebugLine>;
}
