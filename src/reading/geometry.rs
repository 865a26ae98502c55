// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/reading/geometry.rs - 检测结果到几何量的归约
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
use tracing::{debug, warn};

use crate::model::{GaugeClass, RawDetections, WithLabel};

/// 默认置信度阈值
pub const CONFIDENCE_THRESHOLD: f32 = 0.4;

/// 像素坐标点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
  pub x: i32,
  pub y: i32,
}

impl Point {
  pub fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }
}

/// 像素矩形 (左上角, 宽, 高)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

/// 同一类别有多个检测超过阈值时保留哪一个
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
  /// 按槽位顺序，后出现的覆盖先出现的
  ///
  /// 这是现有模型应用的行为，没有考虑分数高低，多个候选时结果取决于模型输出顺序。
  #[default]
  LastWins,
  /// 保留分数最高的；分数相同时取后出现的
  HighestScore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReduceStats {
  /// 超过阈值的检测数
  pub qualified: usize,
  /// 超过阈值但类别编号未知、被丢弃的检测数
  pub unknown_class: usize,
  /// 坐标不在 [0, 1] 内或不是有限值、被丢弃的检测数
  pub out_of_range: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Geometry {
  pub center: Option<Point>,
  pub needle_tip: Option<Point>,
  pub gauge_box: Option<BoundingBox>,
  pub stats: ReduceStats,
}

impl Geometry {
  /// 同时具备中心点与针尖才能计算读数
  pub fn is_readable(&self) -> bool {
    self.center.is_some() && self.needle_tip.is_some()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct GeometryReducer {
  threshold: f32,
  tie_break: TieBreak,
}

impl Default for GeometryReducer {
  fn default() -> Self {
    Self {
      threshold: CONFIDENCE_THRESHOLD,
      tie_break: TieBreak::default(),
    }
  }
}

impl GeometryReducer {
  pub fn new(threshold: f32, tie_break: TieBreak) -> Self {
    Self {
      threshold,
      tie_break,
    }
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn tie_break(&self) -> TieBreak {
    self.tie_break
  }

  pub fn reduce(&self, detections: &RawDetections, width: u32, height: u32) -> Geometry {
    let (w, h) = (width as f32, height as f32);
    let mut geometry = Geometry::default();
    let mut best = [f32::NEG_INFINITY; 3];

    for (slot, item) in detections.iter().enumerate() {
      if item.score.is_nan() || item.score <= self.threshold {
        continue;
      }
      geometry.stats.qualified += 1;

      let class = match GaugeClass::try_from(item.kind) {
        Ok(class) => class,
        Err(e) => {
          warn!("槽位 {}: {}, 分数 {:.2}, 已丢弃", slot, e, item.score);
          geometry.stats.unknown_class += 1;
          continue;
        }
      };

      if !item.bbox.iter().all(|v| (0.0..=1.0).contains(v)) {
        warn!(
          "槽位 {}: {} 坐标越界 {:?}, 已丢弃",
          slot,
          class.to_label_str(),
          item.bbox
        );
        geometry.stats.out_of_range += 1;
        continue;
      }

      let best_score = &mut best[class as usize];
      if self.tie_break == TieBreak::HighestScore && item.score < *best_score {
        continue;
      }
      *best_score = item.score;

      // 与 f32 乘法后截断取整保持一致
      let x1 = (item.bbox[0] * w) as i32;
      let y1 = (item.bbox[1] * h) as i32;
      let x2 = (item.bbox[2] * w) as i32;
      let y2 = (item.bbox[3] * h) as i32;
      let mid = Point::new(midpoint(x1, x2), midpoint(y1, y2));

      debug!(
        "槽位 {}: {} 分数 {:.2} 框 ({}, {}, {}, {})",
        slot,
        class.to_label_str(),
        item.score,
        x1,
        y1,
        x2,
        y2
      );

      match class {
        GaugeClass::Center => geometry.center = Some(mid),
        GaugeClass::Gauge => {
          geometry.gauge_box = Some(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
          })
        }
        GaugeClass::Needle => geometry.needle_tip = Some(mid),
      }
    }

    if !geometry.is_readable() {
      geometry.center = None;
      geometry.needle_tip = None;
    }

    debug!(
      "几何归约: 有效检测 {}, 未知类别 {}, 坐标越界 {}, 可读: {}",
      geometry.stats.qualified,
      geometry.stats.unknown_class,
      geometry.stats.out_of_range,
      geometry.is_readable()
    );
    geometry
  }
}

fn midpoint(a: i32, b: i32) -> i32 {
  ((a as i64 + b as i64) / 2) as i32
}

/// 以默认的后者覆盖策略归约检测结果
pub fn reduce(detections: &RawDetections, width: u32, height: u32, threshold: f32) -> Geometry {
  GeometryReducer::new(threshold, TieBreak::LastWins).reduce(detections, width, height)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn slots(entries: &[(usize, [f32; 4], f32, f32)]) -> RawDetections {
    let mut boxes = vec![[0.0; 4]; 100];
    let mut scores = vec![0.0; 100];
    let mut classes = vec![0.0; 100];
    for &(i, bbox, score, class) in entries {
      boxes[i] = bbox;
      scores[i] = score;
      classes[i] = class;
    }
    RawDetections::new(boxes, scores, classes).unwrap()
  }

  #[test]
  fn scales_normalized_boxes_to_pixels() {
    let raw = slots(&[
      (0, [0.40, 0.38, 0.60, 0.42], 0.9, 2.0),
      (1, [0.48, 0.48, 0.52, 0.52], 0.95, 0.0),
      (2, [0.1, 0.1, 0.9, 0.9], 0.8, 1.0),
    ]);
    let g = reduce(&raw, 1000, 800, CONFIDENCE_THRESHOLD);
    assert_eq!(g.needle_tip, Some(Point::new(500, 320)));
    assert_eq!(g.center, Some(Point::new(500, 400)));
    assert_eq!(
      g.gauge_box,
      Some(BoundingBox {
        x: 100,
        y: 80,
        width: 800,
        height: 640
      })
    );
    assert_eq!(g.stats.qualified, 3);
  }

  #[test]
  fn last_qualifying_detection_wins() {
    let raw = slots(&[
      (3, [0.1, 0.1, 0.2, 0.2], 0.99, 0.0),
      (5, [0.5, 0.5, 0.6, 0.6], 0.7, 2.0),
      (7, [0.3, 0.3, 0.4, 0.4], 0.5, 0.0),
    ]);
    let g = reduce(&raw, 100, 100, CONFIDENCE_THRESHOLD);
    assert_eq!(g.center, Some(Point::new(35, 35)));
  }

  #[test]
  fn highest_score_policy_keeps_best_detection() {
    let raw = slots(&[
      (3, [0.1, 0.1, 0.2, 0.2], 0.99, 0.0),
      (5, [0.5, 0.5, 0.6, 0.6], 0.7, 2.0),
      (7, [0.3, 0.3, 0.4, 0.4], 0.5, 0.0),
    ]);
    let g = GeometryReducer::new(CONFIDENCE_THRESHOLD, TieBreak::HighestScore).reduce(&raw, 100, 100);
    assert_eq!(g.center, Some(Point::new(15, 15)));
  }

  #[test]
  fn threshold_is_strict() {
    let raw = slots(&[
      (0, [0.1, 0.1, 0.2, 0.2], 0.4, 0.0),
      (1, [0.5, 0.5, 0.6, 0.6], 0.9, 2.0),
    ]);
    let g = reduce(&raw, 100, 100, 0.4);
    assert!(!g.is_readable());
    assert_eq!(g.stats.qualified, 1);
  }

  #[test]
  fn nothing_above_threshold_yields_no_points() {
    let raw = slots(&[(0, [0.1, 0.1, 0.2, 0.2], 0.3, 0.0)]);
    let g = reduce(&raw, 640, 480, CONFIDENCE_THRESHOLD);
    assert_eq!(g.center, None);
    assert_eq!(g.needle_tip, None);
    assert_eq!(g.gauge_box, None);
  }

  #[test]
  fn missing_needle_clears_center() {
    let raw = slots(&[
      (0, [0.4, 0.4, 0.6, 0.6], 0.9, 0.0),
      (1, [0.0, 0.0, 1.0, 1.0], 0.9, 1.0),
    ]);
    let g = reduce(&raw, 100, 100, CONFIDENCE_THRESHOLD);
    assert_eq!(g.center, None);
    assert_eq!(g.needle_tip, None);
    assert!(g.gauge_box.is_some());
  }

  #[test]
  fn unknown_classes_are_rejected() {
    let raw = slots(&[
      (0, [0.4, 0.4, 0.6, 0.6], 0.9, 0.0),
      (1, [0.1, 0.1, 0.2, 0.2], 0.9, 2.0),
      (2, [0.7, 0.7, 0.8, 0.8], 0.9, 5.0),
    ]);
    let g = reduce(&raw, 100, 100, CONFIDENCE_THRESHOLD);
    assert_eq!(g.stats.unknown_class, 1);
    assert_eq!(g.needle_tip, Some(Point::new(15, 15)));
  }

  #[test]
  fn huge_coordinates_are_dropped_without_overflow() {
    let raw = slots(&[
      (0, [3e9, 3e9, 3e9, 3e9], 0.9, 0.0),
      (1, [0.5, 0.5, 3e9, 3e9], 0.9, 1.0),
      (2, [0.4, 0.4, 0.6, 0.6], 0.9, 2.0),
    ]);
    let g = reduce(&raw, 1000, 800, CONFIDENCE_THRESHOLD);
    assert_eq!(g.center, None);
    assert_eq!(g.gauge_box, None);
    assert_eq!(g.needle_tip, None);
    assert_eq!(g.stats.qualified, 3);
    assert_eq!(g.stats.out_of_range, 2);
  }

  #[test]
  fn non_finite_coordinates_are_dropped() {
    let raw = slots(&[
      (0, [0.4, 0.4, 0.6, 0.6], 0.9, 0.0),
      (1, [f32::NAN, 0.4, 0.6, 0.6], 0.9, 0.0),
      (2, [0.1, f32::INFINITY, 0.2, 0.2], 0.9, 2.0),
    ]);
    let g = reduce(&raw, 100, 100, CONFIDENCE_THRESHOLD);
    assert_eq!(g.center, Some(Point::new(50, 50)));
    assert_eq!(g.needle_tip, None);
    assert_eq!(g.stats.out_of_range, 2);
  }

  #[test]
  fn midpoint_of_large_image_does_not_overflow() {
    let raw = slots(&[
      (0, [0.9, 0.9, 1.0, 1.0], 0.9, 0.0),
      (1, [0.9, 0.9, 1.0, 1.0], 0.9, 2.0),
    ]);
    let g = reduce(&raw, 2_000_000_000, 2_000_000_000, CONFIDENCE_THRESHOLD);
    let center = g.center.unwrap();
    assert!(center.x > 1_700_000_000);
    assert_eq!(Some(center), g.needle_tip);
  }
}
