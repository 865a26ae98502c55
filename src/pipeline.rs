// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/pipeline.rs - 读表流水线
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

//! 图像 → 张量 → 检测 → 几何 → 读数。
//!
//! 预处理与推理的失败都在这里转换为 [`PipelineError`]；检测不到仪表不是错误，
//! 以 [`ReadOutcome::NoDetection`] 返回。任何阶段都不重试。

use std::fmt;

use image::DynamicImage;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  config::GaugeConfig,
  frame::{GaugeTensor, SourceFrame},
  model::{Model, RawDetections},
  preprocess::{INPUT_SIZE, PreprocessError, Preprocessor},
  reading::{Calibration, GaugeReading, Geometry, GeometryReducer},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum PipelineError {
  /// 模型或后端加载失败，流水线不可用，需要重新构建
  #[error("配置错误: {0}")]
  Configuration(#[source] BoxError),
  #[error("没有输入图像")]
  NoImage,
  #[error("预处理失败: {0}")]
  Preprocess(#[from] PreprocessError),
  /// 单次推理失败，流水线仍可继续使用
  #[error("推理失败: {0}")]
  Inference(#[source] BoxError),
}

impl PipelineError {
  pub fn configuration(e: impl Into<BoxError>) -> Self {
    PipelineError::Configuration(e.into())
  }

  pub fn is_fatal(&self) -> bool {
    matches!(self, PipelineError::Configuration(_))
  }
}

/// 一次读表的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
  Reading(GaugeReading),
  /// 没有足够置信度的中心点或针尖
  NoDetection(Geometry),
}

impl ReadOutcome {
  pub fn reading(&self) -> Option<&GaugeReading> {
    match self {
      ReadOutcome::Reading(reading) => Some(reading),
      ReadOutcome::NoDetection(_) => None,
    }
  }

  pub fn is_detected(&self) -> bool {
    matches!(self, ReadOutcome::Reading(_))
  }
}

impl fmt::Display for ReadOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReadOutcome::Reading(reading) => write!(f, "{}", reading),
      ReadOutcome::NoDetection(_) => write!(f, "Could not detect gauge reading"),
    }
  }
}

pub type InputTensor = GaugeTensor<INPUT_SIZE, INPUT_SIZE>;

pub struct GaugePipeline<M> {
  preprocessor: Preprocessor<INPUT_SIZE, INPUT_SIZE>,
  model: M,
  reducer: GeometryReducer,
  calibration: Calibration,
}

#[derive(Debug, Clone, Default)]
pub struct GaugePipelineBuilder {
  config: GaugeConfig,
}

impl GaugePipelineBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn config(mut self, config: GaugeConfig) -> Self {
    self.config = config;
    self
  }

  pub fn build<M>(self, model: M) -> Result<GaugePipeline<M>, PipelineError> {
    self.config.validate().map_err(PipelineError::configuration)?;
    let preprocessor = Preprocessor::new(self.config.preprocess.clone())
      .map_err(PipelineError::configuration)?;
    info!(
      "读表流水线: 阈值 {}, 同类取舍 {:?}, 标定 {:?}",
      self.config.confidence_threshold, self.config.tie_break, self.config.calibration
    );

    Ok(GaugePipeline {
      preprocessor,
      model,
      reducer: GeometryReducer::new(self.config.confidence_threshold, self.config.tie_break),
      calibration: self.config.calibration,
    })
  }

  /// 从 `gauge:` URL 加载 ONNX 模型并构建流水线
  #[cfg(feature = "model_onnx")]
  pub fn build_from_url(
    self,
    url: &url::Url,
  ) -> Result<GaugePipeline<crate::model::GaugeDetector<INPUT_SIZE, INPUT_SIZE>>, PipelineError> {
    use crate::{FromUrl, model::GaugeDetectorBuilder};

    let model = GaugeDetectorBuilder::from_url(url)
      .and_then(|builder| builder.build())
      .map_err(|e| {
        error!("模型加载失败: {}", e);
        PipelineError::configuration(e)
      })?;
    self.build(model)
  }
}

impl<M> GaugePipeline<M>
where
  M: Model<Input = InputTensor, Output = RawDetections>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  /// `image` 为 `None` 时不做任何处理，直接返回 [`PipelineError::NoImage`]
  pub fn read(&self, image: Option<&DynamicImage>) -> Result<ReadOutcome, PipelineError> {
    let image = image.ok_or(PipelineError::NoImage)?;
    self.read_image(image)
  }

  pub fn read_image(&self, image: &DynamicImage) -> Result<ReadOutcome, PipelineError> {
    let tensor = self.preprocessor.preprocess(image)?;

    let detections = self.model.infer(&tensor).map_err(|e| {
      error!("推理失败: {}", e);
      PipelineError::Inference(Box::new(e))
    })?;
    debug!("模型输出 {} 个检测槽位", detections.len());

    let geometry = self
      .reducer
      .reduce(&detections, image.width(), image.height());

    match GaugeReading::from_geometry(&geometry, &self.calibration) {
      Some(reading) => {
        info!("读数 {:.1}, 角度 {:.1}°", reading.value, reading.angle_degrees);
        Ok(ReadOutcome::Reading(reading))
      }
      None => {
        info!("未检测到仪表读数");
        Ok(ReadOutcome::NoDetection(geometry))
      }
    }
  }
}

impl<M> GaugePipeline<M> {
  pub fn model(&self) -> &M {
    &self.model
  }

  pub fn calibration(&self) -> &Calibration {
    &self.calibration
  }

  /// 取回模型以便显式释放
  pub fn into_model(self) -> M {
    self.model
  }
}

impl<M> Model for GaugePipeline<M>
where
  M: Model<Input = InputTensor, Output = RawDetections>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  type Input = SourceFrame;
  type Output = ReadOutcome;
  type Error = PipelineError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("读取第 {} 帧: {}", input.index, input.origin);
    self.read_image(&input.image)
  }
}
