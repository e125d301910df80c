use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::common::{AgentStatus, Vector3};
use crate::models::debug::{DebugLine, DebugLineKind};
use crate::models::movement::{MovementForces, PhysicalLimits};
use crate::models::scene::{EntityHandle, Scene, Transform};
use crate::models::targeting;
use crate::models::traits::{IAgent, IDebugDraw, IMovable, SceneCommand};
use crate::simulation::SimulationError;

/// 隊長の後方に付く距離
pub const FOLLOW_DISTANCE: f64 = 3.0;
/// デバッグ線分（正面・右方向）の長さ
const DEBUG_AXIS_LENGTH: f64 = 3.0;

/// そのフレームで兵士が取った行動
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SoldierBehavior {
    /// 目標なし：隊長に追従
    FollowLeader,
    /// 目標あり：目標を追跡
    Pursue,
    /// 目標も隊長もない：障害物回避のみ
    Hold,
}

/// 目標の速度推定
///
/// 連続するフレームで観測した目標位置の差分から速度を推定します。
/// 目標が切り替わった直後の推定値はゼロです。
#[derive(Debug, Clone, Default)]
pub struct PursuitTracker {
    last_observation: Option<(EntityHandle, Vector3)>,
}

impl PursuitTracker {
    pub fn observe(&mut self, handle: EntityHandle, position: Vector3, dt: f64) -> Vector3 {
        let estimate = match self.last_observation {
            Some((last_handle, last_position)) if last_handle == handle && dt > 0.0 => {
                (position - last_position) / dt
            }
            _ => Vector3::ZERO,
        };
        self.last_observation = Some((handle, position));
        if estimate.is_finite() { estimate } else { Vector3::ZERO }
    }

    pub fn reset(&mut self) {
        self.last_observation = None;
    }
}

/// 兵士エージェント
///
/// 目標がいなければ隊長に追従し、交戦距離内に目標がいれば追跡します。
/// どちらの場合も障害物を回避します。位置の正はシーンのTransformで、
/// 各フレームの開始時にそこから読み込み、積分結果を書き戻します。
#[derive(Debug, Clone)]
pub struct Soldier {
    pub id: String,
    /// 自身のTransformを指すハンドル
    pub handle: EntityHandle,
    pub movement: MovementForces,
    pub status: AgentStatus,
    /// 直近のフレームで取った行動
    pub behavior: SoldierBehavior,
    /// デバッグ線分を出力するか（シーンマネージャーの設定に従う）
    pub debugging: bool,
    leader: Option<EntityHandle>,
    target: Option<EntityHandle>,
    target_list: Vec<EntityHandle>,
    tracker: PursuitTracker,
}

impl Soldier {
    pub fn new(id: String, handle: EntityHandle, limits: PhysicalLimits) -> Self {
        Self {
            id,
            handle,
            movement: MovementForces::new(Vector3::ZERO, limits),
            status: AgentStatus::Inactive, // initializeでActiveになる
            behavior: SoldierBehavior::Hold,
            debugging: false,
            leader: None,
            target: None,
            target_list: Vec::new(),
            tracker: PursuitTracker::default(),
        }
    }

    /// 追従する隊長を設定
    pub fn set_leader(&mut self, leader: EntityHandle) {
        self.leader = Some(leader);
    }

    pub fn leader(&self) -> Option<EntityHandle> {
        self.leader
    }

    /// 目標候補リストを設定（外部から供給される）
    pub fn set_target_list(&mut self, target_list: Vec<EntityHandle>) {
        self.target_list = target_list;
    }

    pub fn target(&self) -> Option<EntityHandle> {
        self.target
    }

    /// 目標の再選定
    ///
    /// 目標候補リストから交戦距離内で最も近いものを目標にします。
    /// 該当がなければ目標をクリアします。
    pub fn set_target(&mut self, scene: &Scene) -> Option<EntityHandle> {
        let position = scene.position(self.handle).unwrap_or_else(|| self.movement.position());
        let selected = targeting::select_from_scene(position, &self.target_list, scene);

        if selected != self.target {
            match (self.target, selected) {
                (None, Some(new_target)) => info!(
                    soldier_id = %self.id,
                    target = ?scene.name(new_target),
                    distance = ?scene.position(new_target).map(|p| p.distance(&position)),
                    "TARGET_ACQUIRED: 目標を捕捉しました"
                ),
                (Some(old_target), None) => info!(
                    soldier_id = %self.id,
                    previous_target = ?scene.name(old_target),
                    "TARGET_LOST: 交戦距離内に目標がいなくなりました"
                ),
                (Some(old_target), Some(new_target)) => debug!(
                    soldier_id = %self.id,
                    previous_target = ?scene.name(old_target),
                    target = ?scene.name(new_target),
                    "TARGET_SWITCHED: より近い目標に切り替えました"
                ),
                (None, None) => {}
            }
            self.tracker.reset();
        }

        self.target = selected;
        selected
    }

    /// 目標なし時の行動：隊長の後方地点へSeekし、隊長位置へArrive
    fn follow_leader(&mut self, leader: Transform) {
        let follow_point = leader.position - leader.forward * FOLLOW_DISTANCE;
        let follow_force = self.movement.seek(follow_point);
        self.movement.apply_force(follow_force);
        self.movement.arrive(leader.position);
    }

    /// 目標あり時の行動：目標の未来位置を予測して追跡
    fn pursue_target(&mut self, target: EntityHandle, target_position: Vector3, dt: f64) {
        let target_velocity = self.tracker.observe(target, target_position, dt);
        let pursuing_force = self.movement.pursue(target_position, target_velocity);
        self.movement.apply_force(pursuing_force);
    }
}

impl IAgent for Soldier {
    fn initialize(&mut self, scene: &Scene) -> Result<(), SimulationError> {
        let manager = scene.manager().ok_or_else(|| SimulationError::MissingSceneManager {
            agent_id: self.id.clone(),
        })?;

        let transform = scene.transform(self.handle).ok_or_else(|| SimulationError::UnknownEntity {
            agent_id: self.id.clone(),
            entity: self.handle,
        })?;

        self.movement
            .limits
            .validate()
            .map_err(|reason| SimulationError::InvalidLimits {
                agent_id: self.id.clone(),
                reason,
            })?;

        self.movement.kinematics.position = transform.position;
        self.debugging = manager.debug;
        self.status = AgentStatus::Active;

        info!(
            soldier_id = %self.id,
            manager = %manager.name,
            position_x = transform.position.x,
            position_y = transform.position.y,
            position_z = transform.position.z,
            mass = self.movement.limits.mass,
            max_speed = self.movement.limits.max_speed,
            max_force = self.movement.limits.max_force,
            candidates = self.target_list.len(),
            has_leader = self.leader.is_some(),
            "SOLDIER_INITIALIZED: 兵士を初期化しました"
        );

        Ok(())
    }

    fn tick(&mut self, dt: f64, scene: &Scene) -> Option<SceneCommand> {
        if self.status != AgentStatus::Active {
            return None;
        }

        // シーンのTransformを正として位置を同期
        let transform = match scene.transform(self.handle) {
            Some(transform) => transform,
            None => {
                warn!(soldier_id = %self.id, "SOLDIER_REMOVED: 兵士のTransformがシーンから消えました");
                self.status = AgentStatus::Inactive;
                return None;
            }
        };
        self.movement.kinematics.position = transform.position;

        if let Some(target) = self.target {
            if !scene.contains(target) {
                info!(soldier_id = %self.id, "TARGET_LOST: 目標がシーンから消滅しました");
                self.target = None;
                self.tracker.reset();
            }
        }

        let target = self.target.and_then(|t| scene.position(t).map(|p| (t, p)));
        match target {
            Some((target, target_position)) => {
                self.behavior = SoldierBehavior::Pursue;
                self.pursue_target(target, target_position, dt);
            }
            None => match self.leader.and_then(|leader| scene.transform(leader)) {
                Some(leader) => {
                    self.behavior = SoldierBehavior::FollowLeader;
                    self.follow_leader(leader);
                }
                None => self.behavior = SoldierBehavior::Hold,
            },
        }

        self.movement.avoid_obstacle(&scene.obstacles);
        if let Some(zone) = scene.safe_zone {
            self.movement.return_center(&zone);
        }

        self.movement.integrate(dt);

        let forward = if self.movement.direction().is_zero() {
            transform.forward
        } else {
            self.movement.direction()
        };

        Some(SceneCommand::SetTransform(
            self.handle,
            Transform::new(self.movement.position(), forward),
        ))
    }

    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

impl IMovable for Soldier {
    fn get_position(&self) -> Vector3 {
        self.movement.position()
    }

    fn get_velocity(&self) -> Vector3 {
        self.movement.velocity()
    }

    fn get_direction(&self) -> Vector3 {
        self.movement.direction()
    }
}

impl IDebugDraw for Soldier {
    fn collect_debug_primitives(&self, scene: &Scene) -> Vec<DebugLine> {
        if !self.debugging || !self.is_active() {
            return Vec::new();
        }
        let transform = match scene.transform(self.handle) {
            Some(transform) => transform,
            None => return Vec::new(),
        };

        let position = self.movement.position();
        let mut lines = vec![
            DebugLine::new(DebugLineKind::Forward, position, position + transform.forward * DEBUG_AXIS_LENGTH),
            DebugLine::new(DebugLineKind::Right, position, position + transform.right() * DEBUG_AXIS_LENGTH),
            DebugLine::new(DebugLineKind::Velocity, position, position + self.movement.velocity()),
        ];

        if let Some(target) = self.target.filter(|t| self.target_list.contains(t)) {
            if let Some(target_position) = scene.position(target) {
                lines.push(DebugLine::new(DebugLineKind::Target, position, target_position));
            }
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::debug::DebugColor;
    use crate::models::scene::SceneManager;

    const DT: f64 = 1.0 / 60.0;

    fn scene_with_manager(debug: bool) -> Scene {
        let mut scene = Scene::new();
        scene.set_manager(SceneManager { name: "SceneManager".to_string(), debug });
        scene
    }

    fn spawn_soldier(scene: &mut Scene, position: Vector3) -> Soldier {
        let handle = scene.spawn("soldier", Transform::new(position, Vector3::FORWARD));
        Soldier::new("S1".to_string(), handle, PhysicalLimits::default())
    }

    fn apply(scene: &mut Scene, command: Option<SceneCommand>) {
        match command {
            Some(SceneCommand::SetTransform(handle, transform)) => {
                scene.set_transform(handle, transform);
            }
            Some(SceneCommand::Despawn(handle)) => {
                scene.despawn(handle);
            }
            None => {}
        }
    }

    #[test]
    fn test_initialize_requires_scene_manager() {
        let mut scene = Scene::new();
        let mut soldier = spawn_soldier(&mut scene, Vector3::ZERO);
        let err = soldier.initialize(&scene).unwrap_err();
        assert!(matches!(err, SimulationError::MissingSceneManager { .. }));
        assert!(!soldier.is_active());
    }

    #[test]
    fn test_initialize_rejects_invalid_limits() {
        let mut scene = scene_with_manager(false);
        let handle = scene.spawn("soldier", Transform::new(Vector3::ZERO, Vector3::FORWARD));
        let mut soldier = Soldier::new(
            "S1".to_string(),
            handle,
            PhysicalLimits { mass: 0.0, ..PhysicalLimits::default() },
        );
        assert!(matches!(soldier.initialize(&scene), Err(SimulationError::InvalidLimits { .. })));
    }

    #[test]
    fn test_set_target_within_engagement_range() {
        let mut scene = scene_with_manager(false);
        let mut soldier = spawn_soldier(&mut scene, Vector3::ZERO);
        let far = scene.spawn("far", Transform::new(Vector3::new(0.0, 0.0, 30.0), Vector3::FORWARD));
        let near = scene.spawn("near", Transform::new(Vector3::new(10.0, 0.0, 0.0), Vector3::FORWARD));
        soldier.set_target_list(vec![far, near]);
        soldier.initialize(&scene).unwrap();

        assert_eq!(soldier.set_target(&scene), Some(near));
        scene.set_transform(near, Transform::new(Vector3::new(40.0, 0.0, 0.0), Vector3::FORWARD));
        assert_eq!(soldier.set_target(&scene), None);
        assert_eq!(soldier.target(), None);
    }

    #[test]
    fn test_tick_without_target_follows_leader() {
        let mut scene = scene_with_manager(false);
        let leader = scene.spawn("leader", Transform::new(Vector3::ZERO, Vector3::FORWARD));
        let mut soldier = spawn_soldier(&mut scene, Vector3::new(0.0, 0.0, -50.0));
        soldier.set_leader(leader);
        soldier.initialize(&scene).unwrap();

        let command = soldier.tick(DT, &scene);
        assert_eq!(soldier.behavior, SoldierBehavior::FollowLeader);
        assert!(soldier.get_velocity().z > 0.0);
        assert_eq!(soldier.movement.kinematics.acceleration, Vector3::ZERO);
        apply(&mut scene, command);
        assert_eq!(scene.position(soldier.handle), Some(soldier.get_position()));
    }

    #[test]
    fn test_tick_reads_position_from_transform() {
        let mut scene = scene_with_manager(false);
        let mut soldier = spawn_soldier(&mut scene, Vector3::ZERO);
        soldier.initialize(&scene).unwrap();

        let moved = Vector3::new(7.0, 0.0, 7.0);
        scene.set_transform(soldier.handle, Transform::new(moved, Vector3::FORWARD));
        soldier.tick(DT, &scene);
        assert_eq!(soldier.behavior, SoldierBehavior::Hold);
        assert_eq!(soldier.get_position(), moved);
    }

    #[test]
    fn test_tick_with_target_pursues() {
        let mut scene = scene_with_manager(false);
        let leader = scene.spawn("leader", Transform::new(Vector3::new(0.0, 0.0, -40.0), Vector3::FORWARD));
        let mut soldier = spawn_soldier(&mut scene, Vector3::ZERO);
        let enemy = scene.spawn("enemy", Transform::new(Vector3::new(10.0, 0.0, 0.0), Vector3::FORWARD));
        soldier.set_leader(leader);
        soldier.set_target_list(vec![enemy]);
        soldier.initialize(&scene).unwrap();
        soldier.set_target(&scene);

        soldier.tick(DT, &scene);
        assert_eq!(soldier.behavior, SoldierBehavior::Pursue);
        assert!(soldier.get_velocity().x > 0.0);
    }

    #[test]
    fn test_despawned_target_falls_back_to_leader() {
        let mut scene = scene_with_manager(false);
        let leader = scene.spawn("leader", Transform::new(Vector3::new(0.0, 0.0, 40.0), Vector3::FORWARD));
        let mut soldier = spawn_soldier(&mut scene, Vector3::ZERO);
        let enemy = scene.spawn("enemy", Transform::new(Vector3::new(5.0, 0.0, 0.0), Vector3::FORWARD));
        soldier.set_leader(leader);
        soldier.set_target_list(vec![enemy]);
        soldier.initialize(&scene).unwrap();
        soldier.set_target(&scene);

        scene.despawn(enemy);
        soldier.tick(DT, &scene);
        assert_eq!(soldier.target(), None);
        assert_eq!(soldier.behavior, SoldierBehavior::FollowLeader);
    }

    #[test]
    fn test_pursuit_tracker_estimates_velocity() {
        let mut tracker = PursuitTracker::default();
        let enemy = EntityHandle(4);
        assert_eq!(tracker.observe(enemy, Vector3::ZERO, 0.5), Vector3::ZERO);
        assert_eq!(tracker.observe(enemy, Vector3::new(1.0, 0.0, 0.0), 0.5), Vector3::new(2.0, 0.0, 0.0));
        assert_eq!(tracker.observe(EntityHandle(5), Vector3::new(9.0, 0.0, 0.0), 0.5), Vector3::ZERO);
    }

    #[test]
    fn test_debug_primitives() {
        let mut scene = scene_with_manager(true);
        let mut soldier = spawn_soldier(&mut scene, Vector3::ZERO);
        let enemy = scene.spawn("enemy", Transform::new(Vector3::new(0.0, 0.0, 10.0), Vector3::FORWARD));
        soldier.set_target_list(vec![enemy]);
        soldier.initialize(&scene).unwrap();
        soldier.set_target(&scene);

        let lines = soldier.collect_debug_primitives(&scene);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].end, Vector3::new(0.0, 0.0, 3.0));
        assert_eq!(lines[0].color, DebugColor::Blue);
        assert_eq!(lines[1].end, Vector3::new(3.0, 0.0, 0.0));
        assert_eq!(lines[3].kind, DebugLineKind::Target);
        assert_eq!(lines[3].color, DebugColor::Black);
        assert_eq!(lines[3].end, Vector3::new(0.0, 0.0, 10.0));

        soldier.debugging = false;
        assert!(soldier.collect_debug_primitives(&scene).is_empty());
    }
}
