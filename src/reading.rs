// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/reading.rs - 仪表读数
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

use std::fmt;

use serde::{Deserialize, Serialize};

mod geometry;
mod mapper;

pub use self::geometry::{
  BoundingBox, CONFIDENCE_THRESHOLD, Geometry, GeometryReducer, Point, ReduceStats, TieBreak,
  reduce,
};
pub use self::mapper::{Calibration, CalibrationError, angle_of, value_of};

/// 一次成功读表的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeReading {
  pub value: f64,
  /// [0, 360)
  pub angle_degrees: f64,
  pub center: Point,
  pub needle_tip: Point,
  pub gauge_box: Option<BoundingBox>,
}

impl GaugeReading {
  /// 中心点或针尖缺失时返回 `None`
  pub fn from_geometry(geometry: &Geometry, calibration: &Calibration) -> Option<Self> {
    let (center, needle_tip) = (geometry.center?, geometry.needle_tip?);
    let angle_degrees = angle_of(center, needle_tip);
    Some(GaugeReading {
      value: calibration.value_of(angle_degrees),
      angle_degrees,
      center,
      needle_tip,
      gauge_box: geometry.gauge_box,
    })
  }
}

impl fmt::Display for GaugeReading {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Gauge Reading: {:.1}", self.value)?;
    writeln!(f, "Angle: {:.1}°", self.angle_degrees)?;
    writeln!(f, "Center: ({}, {})", self.center.x, self.center.y)?;
    write!(f, "Needle Tip: ({}, {})", self.needle_tip.x, self.needle_tip.y)
  }
}
