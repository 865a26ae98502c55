// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/model.rs - 模型
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

impl<T: Model + ?Sized> Model for &T {
  type Input = T::Input;
  type Output = T::Output;
  type Error = T::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
}

/// 仪表检测模型识别的三个类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeClass {
  /// 指针转轴中心
  Center,
  /// 表盘区域
  Gauge,
  /// 指针尖端
  Needle,
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("未知的类别编号: {0}")]
pub struct UnknownClassError(pub f32);

impl TryFrom<u32> for GaugeClass {
  type Error = UnknownClassError;

  fn try_from(id: u32) -> Result<Self, Self::Error> {
    match id {
      0 => Ok(GaugeClass::Center),
      1 => Ok(GaugeClass::Gauge),
      2 => Ok(GaugeClass::Needle),
      _ => Err(UnknownClassError(id as f32)),
    }
  }
}

/// 模型以浮点数输出类别编号，按截断取整解释
impl TryFrom<f32> for GaugeClass {
  type Error = UnknownClassError;

  fn try_from(id: f32) -> Result<Self, Self::Error> {
    if !id.is_finite() || id < 0.0 {
      return Err(UnknownClassError(id));
    }
    GaugeClass::try_from(id as u32).map_err(|_| UnknownClassError(id))
  }
}

impl WithLabel for GaugeClass {
  fn to_label_str(&self) -> String {
    match self {
      GaugeClass::Center => "center",
      GaugeClass::Gauge => "gauge",
      GaugeClass::Needle => "needle",
    }
    .to_string()
  }

  fn to_label_id(&self) -> u32 {
    match self {
      GaugeClass::Center => 0,
      GaugeClass::Gauge => 1,
      GaugeClass::Needle => 2,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，归一化坐标
}

#[derive(Error, Debug)]
pub enum DetectionShapeError {
  #[error("检测框数据长度 {0} 不是 4 的倍数")]
  RaggedBoxes(usize),
  #[error("检测槽位数量不一致: 框 {boxes}, 分数 {scores}, 类别 {classes}")]
  LengthMismatch {
    boxes: usize,
    scores: usize,
    classes: usize,
  },
}

/// 检测模型的原始输出，每个槽位一组 (框, 分数, 类别)
///
/// 槽位顺序即模型输出顺序，几何归约依赖这个顺序。
#[derive(Debug, Clone, Default)]
pub struct RawDetections {
  boxes: Box<[[f32; 4]]>,
  scores: Box<[f32]>,
  classes: Box<[f32]>,
}

impl RawDetections {
  pub fn new(
    boxes: Vec<[f32; 4]>,
    scores: Vec<f32>,
    classes: Vec<f32>,
  ) -> Result<Self, DetectionShapeError> {
    if boxes.len() != scores.len() || scores.len() != classes.len() {
      return Err(DetectionShapeError::LengthMismatch {
        boxes: boxes.len(),
        scores: scores.len(),
        classes: classes.len(),
      });
    }
    Ok(Self {
      boxes: boxes.into_boxed_slice(),
      scores: scores.into_boxed_slice(),
      classes: classes.into_boxed_slice(),
    })
  }

  /// 由 `[N*4]`、`[N]`、`[N]` 的扁平输出构造
  pub fn from_flat(
    boxes: &[f32],
    scores: &[f32],
    classes: &[f32],
  ) -> Result<Self, DetectionShapeError> {
    if boxes.len() % 4 != 0 {
      return Err(DetectionShapeError::RaggedBoxes(boxes.len()));
    }
    let boxes = boxes
      .chunks_exact(4)
      .map(|b| [b[0], b[1], b[2], b[3]])
      .collect();
    Self::new(boxes, scores.to_vec(), classes.to_vec())
  }

  pub fn len(&self) -> usize {
    self.scores.len()
  }

  pub fn is_empty(&self) -> bool {
    self.scores.is_empty()
  }

  /// 按槽位顺序遍历，类别保留模型输出的原始浮点值
  pub fn iter(&self) -> impl Iterator<Item = DetectItem<f32>> + '_ {
    self
      .boxes
      .iter()
      .zip(self.scores.iter())
      .zip(self.classes.iter())
      .map(|((bbox, &score), &kind)| DetectItem {
        kind,
        score,
        bbox: *bbox,
      })
  }
}

#[cfg(feature = "model_onnx")]
mod gauge_detector;
#[cfg(feature = "model_onnx")]
pub use self::gauge_detector::{
  Delegate, GaugeDetector, GaugeDetectorBuilder, GaugeDetectorError,
};
