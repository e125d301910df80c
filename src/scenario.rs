use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::common::Vector3;
use crate::models::movement::{PhysicalLimits, DEFAULT_AVOID_RADIUS, DEFAULT_MASS, DEFAULT_MAX_FORCE, DEFAULT_MAX_SPEED};

/// 組み込みのデモシナリオ
const DEMO_SCENARIO: &str = include_str!("../scenarios/squad_demo.yaml");

/// シナリオメタデータ
#[derive(Debug, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
}

/// シーンマネージャー設定
#[derive(Debug, Deserialize, Serialize)]
pub struct SceneManagerConfig {
    pub name: String,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Position3D {
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
}

impl Position3D {
    pub fn to_vector(&self) -> Vector3 {
        Vector3::new(self.x_m, self.y_m, self.z_m)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct Velocity3D {
    pub x_mps: f64,
    pub y_mps: f64,
    pub z_mps: f64,
}

impl Velocity3D {
    pub fn to_vector(&self) -> Vector3 {
        Vector3::new(self.x_mps, self.y_mps, self.z_mps)
    }
}

/// 向き（大きさは問わない。ゼロなら+Z）
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Direction3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Direction3D {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, z: 1.0 }
    }
}

impl Direction3D {
    pub fn to_vector(&self) -> Vector3 {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// 世界設定
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
    #[serde(default)]
    pub safe_zone: Option<SafeZoneConfig>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ObstacleConfig {
    pub center: Position3D,
    pub radius_m: f64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SafeZoneConfig {
    pub center: Position3D,
    pub radius_m: f64,
}

/// 台本で動くエンティティ（隊長・敵兵）の設定
#[derive(Debug, Deserialize, Serialize)]
pub struct ScriptedEntityConfig {
    pub id: String,
    pub position: Position3D,
    #[serde(default)]
    pub facing: Direction3D,
    #[serde(default)]
    pub velocity: Velocity3D,
    #[serde(default)]
    pub despawn_time_s: Option<f64>,
}

/// 兵士の物理制限設定
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_mass")]
    pub mass: f64,
    #[serde(default = "default_max_speed")]
    pub max_speed_mps: f64,
    #[serde(default = "default_max_force")]
    pub max_force: f64,
}

fn default_mass() -> f64 {
    DEFAULT_MASS
}

fn default_max_speed() -> f64 {
    DEFAULT_MAX_SPEED
}

fn default_max_force() -> f64 {
    DEFAULT_MAX_FORCE
}

fn default_avoid_radius() -> f64 {
    DEFAULT_AVOID_RADIUS
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            mass: DEFAULT_MASS,
            max_speed_mps: DEFAULT_MAX_SPEED,
            max_force: DEFAULT_MAX_FORCE,
        }
    }
}

impl LimitsConfig {
    pub fn to_limits(&self) -> PhysicalLimits {
        PhysicalLimits {
            mass: self.mass,
            max_speed: self.max_speed_mps,
            max_force: self.max_force,
        }
    }
}

/// 目標再選定のポリシー
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TargetingConfig {
    /// 外部からの呼び出しでのみ再選定
    #[default]
    External,
    /// 一定間隔で再選定（0ならフレーム毎）
    Periodic { interval_s: f64 },
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SoldierConfig {
    pub id: String,
    pub position: Position3D,
    #[serde(default)]
    pub facing: Direction3D,
    /// 個別の物理制限（省略時は分隊共通の値）
    #[serde(default)]
    pub limits: Option<LimitsConfig>,
}

/// 分隊設定
#[derive(Debug, Deserialize, Serialize)]
pub struct SquadConfig {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub targeting: TargetingConfig,
    #[serde(default = "default_avoid_radius")]
    pub avoid_radius_m: f64,
    pub soldiers: Vec<SoldierConfig>,
}

/// 完全なシナリオ設定
#[derive(Debug, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    /// 省略された場合、兵士の初期化が失敗する
    #[serde(default)]
    pub scene_manager: Option<SceneManagerConfig>,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub leader: Option<ScriptedEntityConfig>,
    pub squad: SquadConfig,
    #[serde(default)]
    pub enemies: Vec<ScriptedEntityConfig>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        Self::parse(&contents, path)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        Self::parse(contents, Path::new("<inline>"))
    }

    /// 組み込みデモシナリオ
    pub fn demo() -> Result<Self, ScenarioError> {
        Self::parse(DEMO_SCENARIO, Path::new("<demo>"))
    }

    fn parse(contents: &str, origin: &Path) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ScenarioError::ParseError(origin.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// 設定の検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(self.sim.dt_s > 0.0) {
            return Err(ScenarioError::ValidationError("dt_s must be positive".to_string()));
        }
        if !(self.sim.t_max_s > 0.0) {
            return Err(ScenarioError::ValidationError("t_max_s must be positive".to_string()));
        }

        if self.squad.soldiers.is_empty() {
            return Err(ScenarioError::ValidationError("squad must contain at least one soldier".to_string()));
        }
        if !(self.squad.avoid_radius_m >= 0.0) {
            return Err(ScenarioError::ValidationError("avoid_radius_m must be non-negative".to_string()));
        }
        if let TargetingConfig::Periodic { interval_s } = self.squad.targeting {
            if !(interval_s >= 0.0) {
                return Err(ScenarioError::ValidationError("targeting interval_s must be non-negative".to_string()));
            }
        }

        self.squad
            .limits
            .to_limits()
            .validate()
            .map_err(|e| ScenarioError::ValidationError(format!("squad limits: {}", e)))?;

        // ID重複チェック（兵士・隊長・敵兵で共通の名前空間）
        let mut ids = HashSet::new();
        let entity_ids = self
            .squad
            .soldiers
            .iter()
            .map(|s| &s.id)
            .chain(self.leader.iter().map(|l| &l.id))
            .chain(self.enemies.iter().map(|e| &e.id));
        for id in entity_ids {
            if !ids.insert(id.as_str()) {
                return Err(ScenarioError::ValidationError(format!("duplicate entity id: {}", id)));
            }
        }

        for soldier in &self.squad.soldiers {
            if let Some(limits) = &soldier.limits {
                limits
                    .to_limits()
                    .validate()
                    .map_err(|e| ScenarioError::ValidationError(format!("soldier {} limits: {}", soldier.id, e)))?;
            }
        }

        for obstacle in &self.world.obstacles {
            if !(obstacle.radius_m >= 0.0) {
                return Err(ScenarioError::ValidationError("obstacle radius_m must be non-negative".to_string()));
            }
        }

        if let Some(zone) = &self.world.safe_zone {
            if !(zone.radius_m >= 0.0) {
                return Err(ScenarioError::ValidationError("safe_zone radius_m must be non-negative".to_string()));
            }
        }

        for enemy in &self.enemies {
            if let Some(despawn) = enemy.despawn_time_s {
                if !(despawn >= 0.0) {
                    return Err(ScenarioError::ValidationError(
                        format!("enemy {} despawn_time_s must be non-negative", enemy.id)
                    ));
                }
            }
        }

        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒", self.sim.t_max_s);
        match self.squad.targeting {
            TargetingConfig::External => println!("目標再選定: 外部呼び出しのみ"),
            TargetingConfig::Periodic { interval_s } => println!("目標再選定: {:.2}秒毎", interval_s),
        }
        match &self.scene_manager {
            Some(manager) => println!("シーンマネージャー: {} (デバッグ: {})", manager.name, manager.debug),
            None => println!("シーンマネージャー: なし"),
        }
        println!();

        println!("=== 分隊 ===");
        println!("兵士: {}名", self.squad.soldiers.len());
        if let Some(leader) = &self.leader {
            println!("隊長: {}", leader.id);
        }
        println!("障害物: {}個", self.world.obstacles.len());
        println!();

        println!("=== 敵 ===");
        println!("敵兵: {}名", self.enemies.len());
        for enemy in &self.enemies {
            println!("  {}: ({:.1}, {:.1}, {:.1})", enemy.id, enemy.position.x_m, enemy.position.y_m, enemy.position.z_m);
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug)]
pub enum ScenarioError {
    FileNotFound(PathBuf),
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    ValidationError(String),
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioError::FileNotFound(path) => {
                write!(f, "シナリオファイルが見つかりません: {}", path.display())
            }
            ScenarioError::IoError(path, err) => {
                write!(f, "ファイル読み込みエラー {}: {}", path.display(), err)
            }
            ScenarioError::ParseError(path, err) => {
                write!(f, "YAML解析エラー {}: {}", path.display(), err)
            }
            ScenarioError::ValidationError(msg) => {
                write!(f, "設定検証エラー: {}", msg)
            }
        }
    }
}

impl std::error::Error for ScenarioError {}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
meta:
  version: "1"
  name: minimal
  description: one soldier
sim:
  dt_s: 0.02
  t_max_s: 5.0
scene_manager:
  name: SceneManager
squad:
  soldiers:
    - id: S1
      position: { x_m: 0.0, y_m: 0.0, z_m: -10.0 }
"#;

    #[test]
    fn test_parse_minimal_uses_defaults() {
        let config = ScenarioConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.squad.targeting, TargetingConfig::External);
        assert_eq!(config.squad.limits.to_limits(), PhysicalLimits::default());
        assert_eq!(config.squad.avoid_radius_m, DEFAULT_AVOID_RADIUS);
        assert_eq!(config.squad.soldiers[0].facing.to_vector(), Vector3::FORWARD);
        assert!(config.leader.is_none());
        assert!(config.world.safe_zone.is_none());
    }

    #[test]
    fn test_demo_scenario_is_valid() {
        let config = ScenarioConfig::demo().unwrap();
        assert!(config.scene_manager.is_some());
        assert!(config.leader.is_some());
        assert!(!config.enemies.is_empty());
        assert!(matches!(config.squad.targeting, TargetingConfig::Periodic { .. }));
    }

    #[test]
    fn test_parse_periodic_targeting() {
        let yaml = MINIMAL.replace("squad:\n", "squad:\n  targeting: { mode: periodic, interval_s: 0.25 }\n");
        let config = ScenarioConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.squad.targeting, TargetingConfig::Periodic { interval_s: 0.25 });
    }

    #[test]
    fn test_invalid_dt_rejected() {
        let yaml = MINIMAL.replace("dt_s: 0.02", "dt_s: 0.0");
        assert!(matches!(ScenarioConfig::from_yaml_str(&yaml), Err(ScenarioError::ValidationError(_))));
    }

    #[test]
    fn test_zero_mass_rejected() {
        let yaml = MINIMAL.replace("squad:\n", "squad:\n  limits: { mass: 0.0 }\n");
        assert!(matches!(ScenarioConfig::from_yaml_str(&yaml), Err(ScenarioError::ValidationError(_))));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = format!("{}enemies:\n  - id: S1\n    position: {{ x_m: 1.0, y_m: 0.0, z_m: 1.0 }}\n", MINIMAL);
        assert!(matches!(ScenarioConfig::from_yaml_str(&yaml), Err(ScenarioError::ValidationError(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ScenarioConfig::from_file("does/not/exist.yaml");
        assert!(matches!(result, Err(ScenarioError::FileNotFound(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(ScenarioConfig::from_yaml_str("meta: ["), Err(ScenarioError::ParseError(..))));
    }
}
