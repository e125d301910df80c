use serde::Serialize;
use tracing::warn;

use crate::models::common::Vector3;

/// シーン内エンティティへの非所有ハンドル
///
/// ハンドルはエンティティの寿命を延ばしません。消滅したエンティティを
/// 指すハンドルは `Scene::transform` で `None` に解決されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntityHandle(pub usize);

/// エンティティの空間姿勢（位置と正面方向）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub position: Vector3,
    /// 正面方向の単位ベクトル
    pub forward: Vector3,
}

impl Transform {
    pub fn new(position: Vector3, forward: Vector3) -> Self {
        let forward = if forward.is_zero() {
            Vector3::FORWARD
        } else {
            forward.normalize()
        };
        Self { position, forward }
    }

    /// 右方向ベクトル（Y軸上向き基準）
    pub fn right(&self) -> Vector3 {
        Vector3::UP.cross(&self.forward).normalize()
    }
}

/// 球形の障害物
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Obstacle {
    pub center: Vector3,
    pub radius: f64,
}

/// 帰還エリア
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafeZone {
    pub center: Vector3,
    pub radius: f64,
}

/// シーンマネージャー
///
/// シーンに1つだけ存在する管理オブジェクトです。兵士は初期化時に
/// これを参照し、存在しなければ起動できません。
#[derive(Debug, Clone, PartialEq)]
pub struct SceneManager {
    pub name: String,
    /// デバッグ線分の出力を有効にするか
    pub debug: bool,
}

/// シーンレジストリ
///
/// 全エンティティのTransformを所有し、ハンドル経由の読み書きを提供します。
/// 障害物・帰還エリア・シーンマネージャーもここで保持します。
#[derive(Debug, Clone, Default)]
pub struct Scene {
    entities: Vec<Option<SceneEntity>>,
    pub obstacles: Vec<Obstacle>,
    pub safe_zone: Option<SafeZone>,
    manager: Option<SceneManager>,
}

#[derive(Debug, Clone)]
struct SceneEntity {
    name: String,
    transform: Transform,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// エンティティを生成してハンドルを返す
    pub fn spawn(&mut self, name: impl Into<String>, transform: Transform) -> EntityHandle {
        let name = name.into();
        if self.find(&name).is_some() {
            warn!(entity = %name, "DUPLICATE_ENTITY_NAME: 同名のエンティティが既に存在します");
        }
        self.entities.push(Some(SceneEntity { name, transform }));
        EntityHandle(self.entities.len() - 1)
    }

    /// エンティティを消滅させる
    ///
    /// スロットは再利用しないため、古いハンドルが別エンティティを指すことはありません。
    pub fn despawn(&mut self, handle: EntityHandle) -> bool {
        match self.entities.get_mut(handle.0) {
            Some(slot @ Some(_)) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        matches!(self.entities.get(handle.0), Some(Some(_)))
    }

    pub fn transform(&self, handle: EntityHandle) -> Option<Transform> {
        self.entities
            .get(handle.0)
            .and_then(|slot| slot.as_ref())
            .map(|entity| entity.transform)
    }

    pub fn position(&self, handle: EntityHandle) -> Option<Vector3> {
        self.transform(handle).map(|t| t.position)
    }

    pub fn name(&self, handle: EntityHandle) -> Option<&str> {
        self.entities
            .get(handle.0)
            .and_then(|slot| slot.as_ref())
            .map(|entity| entity.name.as_str())
    }

    /// Transformを書き戻す。消滅済みのエンティティには何もしない。
    pub fn set_transform(&mut self, handle: EntityHandle, transform: Transform) -> bool {
        match self.entities.get_mut(handle.0) {
            Some(Some(entity)) => {
                entity.transform = transform;
                true
            }
            _ => false,
        }
    }

    /// 名前でエンティティを検索（先頭一致のもの）
    pub fn find(&self, name: &str) -> Option<EntityHandle> {
        self.entities.iter().position(|slot| {
            slot.as_ref().map_or(false, |entity| entity.name == name)
        }).map(EntityHandle)
    }

    pub fn set_manager(&mut self, manager: SceneManager) {
        self.manager = Some(manager);
    }

    pub fn manager(&self) -> Option<&SceneManager> {
        self.manager.as_ref()
    }

    /// 生存中のエンティティ数
    pub fn live_count(&self) -> usize {
        self.entities.iter().filter(|slot| slot.is_some()).count()
    }
}
