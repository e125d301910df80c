//! # Simulation モジュール
//!
//! 分隊シミュレーションの中核となる固定時間刻みのシミュレーションエンジンを提供します。
//!
//! エンジンはシーン（全エンティティのTransform）を所有し、各フレームで
//! 兵士と台本エンティティを1回ずつ更新します。全エージェントは前フレーム
//! 終了時点のシーンのスナップショットを読み、結果の書き戻しはすべての
//! 更新が終わってからまとめて行います。
//!
//! ## フレーム処理順序
//!
//! 1. **目標再選定**: ポリシーが周期的なら、期限到来時に全兵士の目標を再選定
//! 2. **兵士処理**: 追従/追跡/障害物回避の操舵力を適用して運動積分
//! 3. **台本エンティティ処理**: 隊長・敵兵の等速移動と消滅
//! 4. **書き戻し**: 収集した変更をシーンへ適用
//! 5. **デバッグ収集**: 全更新後に線分描画要求を収集
//!
//! ## 使用例
//!
//! ```rust
//! use squadsim::simulation::SimulationEngine;
//! use squadsim::scenario::ScenarioConfig;
//!
//! let config = ScenarioConfig::from_file("scenarios/squad_demo.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! engine.run()?;
//! ```

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::models::*;
use crate::scenario::{ScenarioConfig, ScenarioError, TargetingConfig};

/// 目標再選定のポリシー
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetingPolicy {
    /// `SimulationEngine::retarget` の外部呼び出しでのみ再選定
    External,
    /// `interval_s` 毎に再選定（0ならフレーム毎）
    Periodic { interval_s: f64 },
}

impl From<TargetingConfig> for TargetingPolicy {
    fn from(config: TargetingConfig) -> Self {
        match config {
            TargetingConfig::External => TargetingPolicy::External,
            TargetingConfig::Periodic { interval_s } => TargetingPolicy::Periodic { interval_s },
        }
    }
}

/// 兵士ごとの実行統計
#[derive(Debug, Clone, Default, Serialize)]
pub struct SoldierStats {
    pub frames_following: u64,
    pub frames_pursuing: u64,
    pub frames_holding: u64,
    pub target_acquisitions: u32,
    pub max_speed_observed: f64,
}

/// 兵士の最終状態
#[derive(Debug, Clone, Serialize)]
pub struct SoldierReport {
    pub id: String,
    pub final_position: Vector3,
    pub final_velocity: Vector3,
    pub final_heading: Vector3,
    pub behavior: SoldierBehavior,
    pub leader: Option<String>,
    pub target: Option<String>,
    pub stats: SoldierStats,
}

/// シミュレーション実行結果
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub simulated_time_s: f64,
    pub steps: u64,
    pub live_entities: usize,
    pub soldiers: Vec<SoldierReport>,
    /// 最終フレームのデバッグ線分（デバッグ表示が有効な場合のみ）
    pub debug_lines: Vec<DebugLine>,
}

pub struct SimulationEngine {
    pub current_time: f64,
    pub dt: f64,
    pub max_time: f64,
    pub step_count: u64,

    pub scene: Scene,
    pub soldiers: Vec<Soldier>,
    pub movers: Vec<ScriptedMover>,
    pub targeting: TargetingPolicy,
    pub stats: Vec<SoldierStats>,

    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,

    time_since_retarget: f64,
    debug_lines: Vec<DebugLine>,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        Self {
            current_time: 0.0,
            dt: scenario.sim.dt_s,
            max_time: scenario.sim.t_max_s,
            step_count: 0,
            scene: Scene::new(),
            soldiers: Vec::new(),
            movers: Vec::new(),
            targeting: scenario.squad.targeting.into(),
            stats: Vec::new(),
            scenario_config: scenario,
            verbose_level,
            time_since_retarget: 0.0,
            debug_lines: Vec::new(),
        }
    }

    /// シーンの構築と全エージェントの初期化
    ///
    /// シーンマネージャーが無い場合は `SimulationError::MissingSceneManager` で失敗します。
    pub fn initialize(&mut self) -> Result<(), SimulationError> {
        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        self.initialize_world();
        let leader = self.initialize_leader()?;
        let enemies = self.initialize_enemies()?;
        self.initialize_squad(leader, &enemies)?;

        if self.verbose_level > 0 {
            info!("初期化完了:");
            info!("  兵士: {}名", self.soldiers.len());
            info!("  台本エンティティ: {}体", self.movers.len());
            info!("  障害物: {}個", self.scene.obstacles.len());
        }

        Ok(())
    }

    fn initialize_world(&mut self) {
        let config = &self.scenario_config;

        if let Some(manager) = &config.scene_manager {
            self.scene.set_manager(SceneManager {
                name: manager.name.clone(),
                debug: manager.debug,
            });
        }

        self.scene.obstacles = config
            .world
            .obstacles
            .iter()
            .map(|o| Obstacle { center: o.center.to_vector(), radius: o.radius_m })
            .collect();

        self.scene.safe_zone = config
            .world
            .safe_zone
            .as_ref()
            .map(|z| SafeZone { center: z.center.to_vector(), radius: z.radius_m });
    }

    fn initialize_leader(&mut self) -> Result<Option<EntityHandle>, SimulationError> {
        let Some(leader_config) = &self.scenario_config.leader else {
            return Ok(None);
        };

        let handle = self.scene.spawn(
            leader_config.id.clone(),
            Transform::new(leader_config.position.to_vector(), leader_config.facing.to_vector()),
        );
        let mut mover = ScriptedMover::new(
            leader_config.id.clone(),
            handle,
            leader_config.velocity.to_vector(),
            leader_config.despawn_time_s,
        );
        mover.initialize(&self.scene)?;

        if self.verbose_level > 1 {
            debug!("隊長初期化: {}", leader_config.id);
        }

        self.movers.push(mover);
        Ok(Some(handle))
    }

    fn initialize_enemies(&mut self) -> Result<Vec<EntityHandle>, SimulationError> {
        let mut handles = Vec::new();

        for enemy_config in &self.scenario_config.enemies {
            let handle = self.scene.spawn(
                enemy_config.id.clone(),
                Transform::new(enemy_config.position.to_vector(), enemy_config.facing.to_vector()),
            );
            let mut mover = ScriptedMover::new(
                enemy_config.id.clone(),
                handle,
                enemy_config.velocity.to_vector(),
                enemy_config.despawn_time_s,
            );
            mover.initialize(&self.scene)?;

            if self.verbose_level > 1 {
                debug!("敵兵初期化: {}", enemy_config.id);
            }

            self.movers.push(mover);
            handles.push(handle);
        }

        Ok(handles)
    }

    fn initialize_squad(&mut self, leader: Option<EntityHandle>, enemies: &[EntityHandle]) -> Result<(), SimulationError> {
        let squad = &self.scenario_config.squad;

        for soldier_config in &squad.soldiers {
            let handle = self.scene.spawn(
                soldier_config.id.clone(),
                Transform::new(soldier_config.position.to_vector(), soldier_config.facing.to_vector()),
            );
            let limits = soldier_config.limits.unwrap_or(squad.limits).to_limits();

            let mut soldier = Soldier::new(soldier_config.id.clone(), handle, limits);
            soldier.movement.avoid_radius = squad.avoid_radius_m;
            if let Some(leader) = leader {
                soldier.set_leader(leader);
            }
            soldier.set_target_list(enemies.to_vec());
            soldier.initialize(&self.scene)?;

            self.soldiers.push(soldier);
            self.stats.push(SoldierStats::default());
        }

        Ok(())
    }

    /// 最大時間まで実行
    pub fn run(&mut self) -> Result<(), SimulationError> {
        info!("=== シミュレーション実行開始 ===");

        let max_steps = (self.max_time / self.dt - 1e-9).ceil().max(0.0) as u64;
        while self.step_count < max_steps {
            self.step();

            if self.verbose_level > 2 {
                trace!("時刻: {:.2}秒 (ステップ: {})", self.current_time, self.step_count);
            }

            if self.step_count % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.current_time / self.max_time) * 100.0;
                info!("進行状況: {:.1}% ({:.1}/{:.1}秒)", progress, self.current_time, self.max_time);
            }
        }

        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.1}秒", self.current_time);
        info!("総ステップ数: {}", self.step_count);

        Ok(())
    }

    /// 1フレーム進める
    pub fn step(&mut self) {
        let dt = self.dt;

        if self.retarget_due(dt) {
            self.retarget();
        }

        // 全エージェントが同じ前フレームの状態を参照する
        let snapshot = self.scene.clone();
        let mut commands = Vec::with_capacity(self.soldiers.len() + self.movers.len());

        for soldier in &mut self.soldiers {
            if let Some(command) = soldier.tick(dt, &snapshot) {
                commands.push(command);
            }
        }
        for mover in &mut self.movers {
            if let Some(command) = mover.tick(dt, &snapshot) {
                commands.push(command);
            }
        }

        self.apply_commands(commands);
        self.record_stats();

        self.debug_lines = self.collect_debug_primitives();
        if !self.debug_lines.is_empty() {
            trace!(lines = self.debug_lines.len(), "DEBUG_PRIMITIVES_COLLECTED");
        }

        self.current_time += dt;
        self.step_count += 1;
    }

    fn retarget_due(&mut self, dt: f64) -> bool {
        match self.targeting {
            TargetingPolicy::External => false,
            TargetingPolicy::Periodic { interval_s } => {
                if self.step_count == 0 || self.time_since_retarget + 1e-9 >= interval_s {
                    self.time_since_retarget = dt;
                    true
                } else {
                    self.time_since_retarget += dt;
                    false
                }
            }
        }
    }

    /// 全兵士の目標を現在のシーンで再選定
    pub fn retarget(&mut self) {
        for (soldier, stats) in self.soldiers.iter_mut().zip(self.stats.iter_mut()) {
            if !soldier.is_active() {
                continue;
            }
            let previous = soldier.target();
            let selected = soldier.set_target(&self.scene);
            if selected.is_some() && selected != previous {
                stats.target_acquisitions += 1;
            }
        }
    }

    fn apply_commands(&mut self, commands: Vec<SceneCommand>) {
        for command in commands {
            match command {
                SceneCommand::SetTransform(handle, transform) => {
                    self.scene.set_transform(handle, transform);
                }
                SceneCommand::Despawn(handle) => {
                    self.scene.despawn(handle);
                }
            }
        }
    }

    fn record_stats(&mut self) {
        for (soldier, stats) in self.soldiers.iter().zip(self.stats.iter_mut()) {
            if !soldier.is_active() {
                continue;
            }
            match soldier.behavior {
                SoldierBehavior::FollowLeader => stats.frames_following += 1,
                SoldierBehavior::Pursue => stats.frames_pursuing += 1,
                SoldierBehavior::Hold => stats.frames_holding += 1,
            }
            stats.max_speed_observed = stats.max_speed_observed.max(soldier.get_velocity().magnitude());
        }
    }

    /// デバッグ線分の収集（全更新後に呼び出す）
    pub fn collect_debug_primitives(&self) -> Vec<DebugLine> {
        self.soldiers
            .iter()
            .flat_map(|soldier| soldier.collect_debug_primitives(&self.scene))
            .collect()
    }

    /// 直近のフレームで収集したデバッグ線分
    pub fn debug_lines(&self) -> &[DebugLine] {
        &self.debug_lines
    }

    /// 実行結果のまとめ
    pub fn report(&self) -> SimulationReport {
        let soldiers = self
            .soldiers
            .iter()
            .zip(self.stats.iter())
            .map(|(soldier, stats)| SoldierReport {
                id: soldier.get_id(),
                final_position: soldier.get_position(),
                final_velocity: soldier.get_velocity(),
                final_heading: soldier.get_direction(),
                behavior: soldier.behavior,
                leader: soldier
                    .leader()
                    .and_then(|l| self.scene.name(l))
                    .map(str::to_string),
                target: soldier
                    .target()
                    .and_then(|t| self.scene.name(t))
                    .map(str::to_string),
                stats: stats.clone(),
            })
            .collect();

        SimulationReport {
            scenario: self.scenario_config.meta.name.clone(),
            simulated_time_s: self.current_time,
            steps: self.step_count,
            live_entities: self.scene.live_count(),
            soldiers,
            debug_lines: self.debug_lines().to_vec(),
        }
    }
}

/// シミュレーション起動時のエラー
#[derive(Debug)]
pub enum SimulationError {
    /// シーンマネージャーがシーンに存在しない
    MissingSceneManager { agent_id: String },
    /// エージェントのTransformがシーンに存在しない
    UnknownEntity { agent_id: String, entity: EntityHandle },
    /// 物理制限値が不正
    InvalidLimits { agent_id: String, reason: String },
    Scenario(ScenarioError),
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::MissingSceneManager { agent_id } => {
                write!(f, "{} の初期化エラー: シーンにSceneManagerが必要です", agent_id)
            }
            SimulationError::UnknownEntity { agent_id, entity } => {
                write!(f, "{} の初期化エラー: エンティティ {:?} がシーンに存在しません", agent_id, entity)
            }
            SimulationError::InvalidLimits { agent_id, reason } => {
                write!(f, "{} の初期化エラー: 物理制限値が不正です ({})", agent_id, reason)
            }
            SimulationError::Scenario(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Scenario(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ScenarioError> for SimulationError {
    fn from(err: ScenarioError) -> Self {
        SimulationError::Scenario(err)
    }
}
