//! # Movement モジュール
//!
//! 操舵力（steering force）の計算と運動積分を提供します。
//!
//! 各フレームで適用された力は加速度アキュムレータに加算され、
//! `integrate` で速度・位置に積分された後にリセットされます。
//! 積分は陽的オイラー法です。
//!
//! ## 操舵行動
//!
//! - **Seek**: 目標点へ最大速度で向かう
//! - **Arrive**: 目標点の手前で減速する
//! - **Pursue**: 目標の未来位置を予測して迎撃する
//! - **AvoidObstacle**: 近傍の障害物から離れる
//! - **ReturnCenter**: 帰還エリアの外に出たら中心へ戻る

use tracing::trace;

use crate::models::common::{math_utils, Vector3};
use crate::models::scene::{Obstacle, SafeZone};

/// 兵士の質量の既定値
pub const DEFAULT_MASS: f64 = 1.0;
/// 兵士の最大速度の既定値
pub const DEFAULT_MAX_SPEED: f64 = 15.0;
/// 兵士の最大操舵力の既定値
pub const DEFAULT_MAX_FORCE: f64 = 25.0;
/// Arriveで減速を始める距離
pub const ARRIVE_SLOWING_RADIUS: f64 = 100.0;
/// Pursueの予測時間の上限（秒）
pub const MAX_PREDICTION_TIME_S: f64 = 2.0;
/// 障害物回避の検知距離（障害物表面からの距離）の既定値
pub const DEFAULT_AVOID_RADIUS: f64 = 10.0;

/// 運動状態
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicState {
    pub position: Vector3,
    pub velocity: Vector3,
    /// フレーム内で適用された力の累積（積分後に0へリセット）
    pub acceleration: Vector3,
    /// 速度の単位ベクトル（停止中はゼロベクトル）
    pub direction: Vector3,
}

impl KinematicState {
    pub fn at(position: Vector3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// 物理的な制限値
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalLimits {
    pub mass: f64,
    pub max_speed: f64,
    pub max_force: f64,
}

impl Default for PhysicalLimits {
    fn default() -> Self {
        Self {
            mass: DEFAULT_MASS,
            max_speed: DEFAULT_MAX_SPEED,
            max_force: DEFAULT_MAX_FORCE,
        }
    }
}

impl PhysicalLimits {
    /// 制限値の検証
    pub fn validate(&self) -> Result<(), String> {
        if !(self.mass > 0.0) || !self.mass.is_finite() {
            return Err(format!("mass must be positive (got {})", self.mass));
        }
        if !(self.max_speed >= 0.0) || !self.max_speed.is_finite() {
            return Err(format!("max_speed must be non-negative (got {})", self.max_speed));
        }
        if !(self.max_force >= 0.0) || !self.max_force.is_finite() {
            return Err(format!("max_force must be non-negative (got {})", self.max_force));
        }
        Ok(())
    }
}

/// 操舵力の計算と運動積分を行うコア
#[derive(Debug, Clone, PartialEq)]
pub struct MovementForces {
    pub kinematics: KinematicState,
    pub limits: PhysicalLimits,
    /// 障害物表面からこの距離以内で回避力が発生する
    pub avoid_radius: f64,
}

impl MovementForces {
    pub fn new(position: Vector3, limits: PhysicalLimits) -> Self {
        Self {
            kinematics: KinematicState::at(position),
            limits,
            avoid_radius: DEFAULT_AVOID_RADIUS,
        }
    }

    pub fn position(&self) -> Vector3 {
        self.kinematics.position
    }

    pub fn velocity(&self) -> Vector3 {
        self.kinematics.velocity
    }

    pub fn direction(&self) -> Vector3 {
        self.kinematics.direction
    }

    /// 力を加速度アキュムレータへ加算（F = ma）
    ///
    /// 質量が正でない場合、または力が有限でない場合は無視します。
    pub fn apply_force(&mut self, force: Vector3) {
        let mass = self.limits.mass;
        if !(mass > 0.0) || !mass.is_finite() || !force.is_finite() {
            trace!(mass, force_x = force.x, force_y = force.y, force_z = force.z,
                   "FORCE_IGNORED: 無効な質量または力のため適用をスキップしました");
            return;
        }
        self.kinematics.acceleration += force / mass;
    }

    /// 目標点へ向かう操舵力
    ///
    /// 希望速度（目標方向 × 最大速度）と現在速度の差を最大操舵力で制限して返します。
    /// 目標点が現在位置と一致する場合、希望速度は0となり制動力になります。
    pub fn seek(&self, target_position: Vector3) -> Vector3 {
        let desired = (target_position - self.kinematics.position).normalize() * self.limits.max_speed;
        self.steer_towards(desired)
    }

    /// 移動目標を迎撃する操舵力
    ///
    /// 予測時間 `T = 距離 / 最大速度`（上限 `MAX_PREDICTION_TIME_S`）だけ先の
    /// 目標位置に対してSeekします。
    ///
    /// # 引数
    ///
    /// * `target_position` - 目標の現在位置
    /// * `target_velocity` - 目標の推定速度
    pub fn pursue(&self, target_position: Vector3, target_velocity: Vector3) -> Vector3 {
        let distance = self.kinematics.position.distance(&target_position);
        let prediction_time = if self.limits.max_speed > 0.0 {
            (distance / self.limits.max_speed).min(MAX_PREDICTION_TIME_S)
        } else {
            0.0
        };
        let target_velocity = if target_velocity.is_finite() { target_velocity } else { Vector3::ZERO };
        self.seek(target_position + target_velocity * prediction_time)
    }

    /// 目標点の手前で減速する操舵力
    ///
    /// 距離が `ARRIVE_SLOWING_RADIUS` 未満では希望速度を距離に比例させます
    /// （距離0で0、距離100で最大速度）。
    pub fn arrive_force(&self, target_position: Vector3) -> Vector3 {
        let offset = target_position - self.kinematics.position;
        let distance = offset.magnitude();

        let desired_speed = if distance < ARRIVE_SLOWING_RADIUS {
            math_utils::map(distance, 0.0, ARRIVE_SLOWING_RADIUS, 0.0, self.limits.max_speed)
        } else {
            self.limits.max_speed
        };

        self.steer_towards(offset.normalize() * desired_speed)
    }

    /// Arriveの操舵力をアキュムレータへ適用
    pub fn arrive(&mut self, target_position: Vector3) {
        let force = self.arrive_force(target_position);
        self.apply_force(force);
    }

    /// 障害物から離れる反発力
    ///
    /// 表面までの距離が `avoid_radius` 以内の障害物ごとに、障害物中心から
    /// 離れる方向の力を表面で1、検知距離で0となる重みで加算します。
    /// 合計は最大操舵力で制限されます。
    pub fn obstacle_avoidance_force(&self, obstacles: &[Obstacle]) -> Vector3 {
        let position = self.kinematics.position;
        let mut total = Vector3::ZERO;

        for obstacle in obstacles {
            let away = position - obstacle.center;
            let surface_distance = (away.magnitude() - obstacle.radius).max(0.0);
            if surface_distance > self.avoid_radius {
                continue;
            }

            let weight = if self.avoid_radius > 0.0 {
                math_utils::map(surface_distance, 0.0, self.avoid_radius, 1.0, 0.0).clamp(0.0, 1.0)
            } else {
                1.0
            };
            total += away.normalize() * (weight * self.limits.max_force);
        }

        total.clamp_magnitude(self.limits.max_force)
    }

    /// 障害物回避の力をアキュムレータへ適用
    pub fn avoid_obstacle(&mut self, obstacles: &[Obstacle]) {
        let force = self.obstacle_avoidance_force(obstacles);
        self.apply_force(force);
    }

    /// 帰還エリアへ戻る操舵力
    ///
    /// エリア内では0。エリア外ではエリア中心へのSeekを、はみ出し量に応じた
    /// 重み（半径分はみ出したところで1）で弱めて返します。
    pub fn return_center_force(&self, zone: &SafeZone) -> Vector3 {
        let distance = self.kinematics.position.distance(&zone.center);
        if distance <= zone.radius {
            return Vector3::ZERO;
        }

        let excess = distance - zone.radius;
        let weight = if zone.radius > 0.0 {
            math_utils::map(excess, 0.0, zone.radius, 0.0, 1.0).clamp(0.0, 1.0)
        } else {
            1.0
        };
        (self.seek(zone.center) * weight).clamp_magnitude(self.limits.max_force)
    }

    /// 帰還エリアへ戻る力をアキュムレータへ適用
    pub fn return_center(&mut self, zone: &SafeZone) {
        let force = self.return_center_force(zone);
        self.apply_force(force);
    }

    /// 運動積分（陽的オイラー法）
    ///
    /// 1. 速度 += 加速度 × dt
    /// 2. 位置 += 速度 × dt
    /// 3. 加速度をリセット
    /// 4. 向きを速度から再計算
    ///
    /// 負または有限でない `dt` は0として扱います。
    pub fn integrate(&mut self, dt: f64) {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let state = &mut self.kinematics;

        state.velocity += state.acceleration * dt;
        state.position += state.velocity * dt;
        state.acceleration = Vector3::ZERO;
        state.direction = state.velocity.normalize();
    }

    fn steer_towards(&self, desired_velocity: Vector3) -> Vector3 {
        (desired_velocity - self.kinematics.velocity).clamp_magnitude(self.limits.max_force)
    }
}
