use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// ゼロベクトル判定に使う大きさの閾値
pub const ZERO_EPSILON: f64 = 1e-9;

/// 3次元ベクトル
///
/// 位置・速度・加速度・力のすべてをこの型で表します。
/// シーン座標系はY軸が上方向です。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const UP: Vector3 = Vector3 { x: 0.0, y: 1.0, z: 0.0 };
    pub const FORWARD: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 1.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// ベクトルの大きさ
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    /// 2点間の距離
    pub fn distance(&self, other: &Vector3) -> f64 {
        (*self - *other).magnitude()
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// ゼロベクトル（またはNaNを含むベクトル）かどうか
    pub fn is_zero(&self) -> bool {
        !(self.magnitude() > ZERO_EPSILON)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// 単位ベクトル化
    ///
    /// 大きさがほぼ0、または有限でない場合はゼロベクトルを返します。
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > ZERO_EPSILON && mag.is_finite() {
            Self::new(self.x / mag, self.y / mag, self.z / mag)
        } else {
            Self::ZERO
        }
    }

    /// 大きさを `max_magnitude` 以下に制限
    pub fn clamp_magnitude(&self, max_magnitude: f64) -> Self {
        let max_magnitude = max_magnitude.max(0.0);
        let mag = self.magnitude();
        if mag > max_magnitude {
            self.normalize() * max_magnitude
        } else {
            *self
        }
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl SubAssign for Vector3 {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Div<f64> for Vector3 {
    type Output = Self;

    fn div(self, scalar: f64) -> Self::Output {
        Self::new(self.x / scalar, self.y / scalar, self.z / scalar)
    }
}

impl Neg for Vector3 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// エージェントの状態を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AgentStatus {
    Active,
    Inactive,
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// 値を旧範囲から新範囲へ線形に写像
    ///
    /// 旧範囲の幅が0の場合は `new_min` を返します。
    pub fn map(value: f64, old_min: f64, old_max: f64, new_min: f64, new_max: f64) -> f64 {
        let old_range = old_max - old_min;
        if old_range == 0.0 || !old_range.is_finite() {
            return new_min;
        }
        new_min + (new_max - new_min) * ((value - old_min) / old_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_normalize_zero_vector_is_zero() {
        assert_eq!(Vector3::ZERO.normalize(), Vector3::ZERO);
        assert_eq!(Vector3::new(f64::NAN, 0.0, 0.0).normalize(), Vector3::ZERO);
    }

    #[test]
    fn test_normalize_unit_length() {
        let v = Vector3::new(3.0, 0.0, 4.0).normalize();
        assert!((v.magnitude() - 1.0).abs() < EPS);
        assert!((v.x - 0.6).abs() < EPS);
        assert!((v.z - 0.8).abs() < EPS);
    }

    #[test]
    fn test_clamp_magnitude() {
        let v = Vector3::new(30.0, 0.0, 40.0);
        let clamped = v.clamp_magnitude(25.0);
        assert!((clamped.magnitude() - 25.0).abs() < EPS);

        let short = Vector3::new(1.0, 2.0, 2.0);
        assert_eq!(short.clamp_magnitude(25.0), short);
        assert_eq!(v.clamp_magnitude(0.0), Vector3::ZERO);
    }

    #[test]
    fn test_cross_up_forward_is_right() {
        let right = Vector3::UP.cross(&Vector3::FORWARD);
        assert_eq!(right, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_map_linear() {
        assert_eq!(math_utils::map(0.0, 0.0, 100.0, 0.0, 15.0), 0.0);
        assert_eq!(math_utils::map(100.0, 0.0, 100.0, 0.0, 15.0), 15.0);
        assert!((math_utils::map(50.0, 0.0, 100.0, 0.0, 15.0) - 7.5).abs() < EPS);
    }

    #[test]
    fn test_map_zero_width_range_returns_new_min() {
        assert_eq!(math_utils::map(42.0, 10.0, 10.0, 3.0, 9.0), 3.0);
    }

    #[test]
    fn test_map_round_trip() {
        let max_speed = 15.0;
        for i in 0..=100 {
            let x = i as f64;
            let speed = math_utils::map(x, 0.0, 100.0, 0.0, max_speed);
            let back = math_utils::map(speed, 0.0, max_speed, 0.0, 100.0);
            assert!((back - x).abs() < 1e-9, "x={} back={}", x, back);
        }
    }
}
