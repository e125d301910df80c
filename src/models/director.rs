use tracing::{debug, info};

use crate::models::common::{AgentStatus, Vector3};
use crate::models::scene::{EntityHandle, Scene, Transform};
use crate::models::traits::{IAgent, IMovable, SceneCommand};
use crate::simulation::SimulationError;

/// 台本どおりに等速直線運動するエンティティ
///
/// 隊長（リーダー）や敵兵など、操舵ではなくシナリオで動きが決まる
/// エンティティを動かします。`despawn_time_s` に達するとシーンから消滅します。
#[derive(Debug, Clone)]
pub struct ScriptedMover {
    pub id: String,
    pub handle: EntityHandle,
    pub velocity: Vector3,
    /// 消滅時刻（秒）。`None` なら消滅しない
    pub despawn_time_s: Option<f64>,
    pub elapsed: f64,
    pub status: AgentStatus,
    position: Vector3,
}

impl ScriptedMover {
    pub fn new(id: String, handle: EntityHandle, velocity: Vector3, despawn_time_s: Option<f64>) -> Self {
        Self {
            id,
            handle,
            velocity,
            despawn_time_s,
            elapsed: 0.0,
            status: AgentStatus::Active,
            position: Vector3::ZERO,
        }
    }
}

impl IAgent for ScriptedMover {
    fn initialize(&mut self, scene: &Scene) -> Result<(), SimulationError> {
        let transform = scene.transform(self.handle).ok_or_else(|| SimulationError::UnknownEntity {
            agent_id: self.id.clone(),
            entity: self.handle,
        })?;
        self.position = transform.position;
        self.elapsed = 0.0;
        self.status = AgentStatus::Active;
        Ok(())
    }

    fn tick(&mut self, dt: f64, scene: &Scene) -> Option<SceneCommand> {
        if self.status != AgentStatus::Active {
            return None;
        }

        let transform = match scene.transform(self.handle) {
            Some(transform) => transform,
            None => {
                self.status = AgentStatus::Inactive;
                return None;
            }
        };

        self.elapsed += dt;
        if let Some(despawn_time) = self.despawn_time_s {
            if self.elapsed >= despawn_time {
                self.status = AgentStatus::Inactive;
                info!(
                    entity_id = %self.id,
                    position_x = transform.position.x,
                    position_y = transform.position.y,
                    position_z = transform.position.z,
                    elapsed = self.elapsed,
                    "ENTITY_DESPAWNED: エンティティがシーンから消滅しました"
                );
                return Some(SceneCommand::Despawn(self.handle));
            }
        }

        self.position = transform.position + self.velocity * dt;
        let forward = if self.velocity.is_zero() { transform.forward } else { self.velocity };

        debug!(entity_id = %self.id, x = self.position.x, y = self.position.y, z = self.position.z,
               "ENTITY_MOVED");

        Some(SceneCommand::SetTransform(self.handle, Transform::new(self.position, forward)))
    }

    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

impl IMovable for ScriptedMover {
    fn get_position(&self) -> Vector3 {
        self.position
    }

    fn get_velocity(&self) -> Vector3 {
        if self.is_active() { self.velocity } else { Vector3::ZERO }
    }

    fn get_direction(&self) -> Vector3 {
        self.get_velocity().normalize()
    }
}
