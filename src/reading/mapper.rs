// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/reading/mapper.rs - 指针角度到读数的映射
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Yibiao Authors

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::Point;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
  #[error("标定角度范围为零: min_angle = max_angle = {0}")]
  EmptyAngleRange(f64),
  #[error("标定参数必须是有限值")]
  NonFinite,
}

/// 单一型号仪表的标定参数
///
/// 角度以度为单位，0° 指向图像右侧，逆时针增大。`min_angle`/`max_angle`
/// 是指针扫过范围的两个端点，`min_value`/`max_value` 是端点处的刻度值。
/// 计算读数时角度若大于 `max_angle` 会先减去 360°，因此跨越 0° 的量程把
/// `min_angle` 写成负数即可；刻度顺时针增大的表盘交换两端的刻度值。
/// `max_angle` 大于 360° 时不会发生回绕，调用方需要自行展开多圈角度，
/// 默认标定 (45°, 515°) 就是这种情况。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
  pub min_angle: f64,
  pub max_angle: f64,
  pub min_value: f64,
  pub max_value: f64,
}

impl Default for Calibration {
  fn default() -> Self {
    Self {
      min_angle: 45.0,
      max_angle: 515.0,
      min_value: 0.0,
      max_value: 100.0,
    }
  }
}

impl Calibration {
  pub fn new(min_angle: f64, max_angle: f64, min_value: f64, max_value: f64) -> Self {
    Self {
      min_angle,
      max_angle,
      min_value,
      max_value,
    }
  }

  pub fn validate(&self) -> Result<(), CalibrationError> {
    let values = [self.min_angle, self.max_angle, self.min_value, self.max_value];
    if values.iter().any(|v| !v.is_finite()) {
      return Err(CalibrationError::NonFinite);
    }
    if self.min_angle == self.max_angle {
      return Err(CalibrationError::EmptyAngleRange(self.min_angle));
    }
    Ok(())
  }

  pub fn value_of(&self, angle: f64) -> f64 {
    value_of(
      angle,
      self.min_angle,
      self.max_angle,
      self.min_value,
      self.max_value,
    )
  }
}

/// 中心指向针尖的方向角，取值 [0, 360)
///
/// 图像的行坐标向下增长，所以 y 分量取反。
pub fn angle_of(center: Point, needle_tip: Point) -> f64 {
  let dx = (needle_tip.x - center.x) as f64;
  let dy = (center.y - needle_tip.y) as f64;
  let angle = dy.atan2(dx).to_degrees();
  let angle = (angle + 360.0) % 360.0;
  // -1e-14 + 360 会舍入成 360
  if angle >= 360.0 { 0.0 } else { angle }
}

/// 线性插值得到读数，保留一位小数
pub fn value_of(
  angle: f64,
  min_angle: f64,
  max_angle: f64,
  min_value: f64,
  max_value: f64,
) -> f64 {
  let angle = if angle > max_angle { angle - 360.0 } else { angle };
  let value = (angle - min_angle) / (max_angle - min_angle) * (max_value - min_value) + min_value;
  round_one_decimal(value)
}

/// 0.05 这类中点向正无穷方向舍入
fn round_one_decimal(value: f64) -> f64 {
  (value * 10.0 + 0.5).floor() / 10.0
}
