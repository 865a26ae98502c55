// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/preprocess.rs - 图像预处理
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

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::frame::{ChannelLayout, GaugeTensor};

#[cfg(feature = "preprocess_opencv")]
mod enhance;

/// 检测模型的输入边长
pub const INPUT_SIZE: u32 = 640;

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("图像为空: {width}x{height}")]
  EmptyImage { width: u32, height: u32 },
  #[error("预处理配置无效: {0}")]
  InvalidConfig(String),
  #[cfg(feature = "preprocess_opencv")]
  #[error("OpenCV 错误: {0}")]
  OpenCvError(#[from] opencv::Error),
  #[error("未启用图像增强后端 (preprocess_opencv)")]
  BackendUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
  /// 亮度/对比度线性变换的增益
  pub gain: f32,
  /// 亮度/对比度线性变换的偏置
  pub bias: f32,
  pub clip_limit: f32,
  /// CLAHE 网格 (列, 行)
  pub tile_grid: (u32, u32),
  pub layout: ChannelLayout,
}

impl Default for PreprocessConfig {
  fn default() -> Self {
    Self {
      gain: 1.2,
      bias: 10.0,
      clip_limit: 2.0,
      tile_grid: (8, 8),
      layout: ChannelLayout::Replicated,
    }
  }
}

impl PreprocessConfig {
  pub fn validate(&self) -> Result<(), PreprocessError> {
    if self.tile_grid.0 == 0 || self.tile_grid.1 == 0 {
      return Err(PreprocessError::InvalidConfig(format!(
        "CLAHE 网格必须大于 0, 实际为 {:?}",
        self.tile_grid
      )));
    }
    if !self.gain.is_finite() || !self.bias.is_finite() || !self.clip_limit.is_finite() {
      return Err(PreprocessError::InvalidConfig(
        "增益、偏置和裁剪上限必须是有限值".to_string(),
      ));
    }
    Ok(())
  }
}

/// 将任意尺寸的彩色图像转换为 W×H 的模型输入张量
///
/// 亮度/对比度、灰度、CLAHE 与缩放由 OpenCV 完成。
#[derive(Debug, Clone)]
pub struct Preprocessor<const W: u32, const H: u32> {
  config: PreprocessConfig,
}

impl<const W: u32, const H: u32> Preprocessor<W, H> {
  /// 未启用 `preprocess_opencv` 时返回 [`PreprocessError::BackendUnavailable`]
  pub fn new(config: PreprocessConfig) -> Result<Self, PreprocessError> {
    config.validate()?;
    if cfg!(not(feature = "preprocess_opencv")) {
      error!("图像增强后端不可用");
      return Err(PreprocessError::BackendUnavailable);
    }
    Ok(Self { config })
  }

  pub fn config(&self) -> &PreprocessConfig {
    &self.config
  }

  pub fn preprocess(&self, image: &DynamicImage) -> Result<GaugeTensor<W, H>, PreprocessError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
      return Err(PreprocessError::EmptyImage { width, height });
    }
    debug!("预处理图像: {}x{} -> {}x{}", width, height, W, H);

    let gray = self.enhance(image)?;

    let mut tensor = GaugeTensor::<W, H>::with_layout(self.config.layout);
    let channels = tensor.channels();
    let slice = tensor.as_mut();
    for (i, &pixel) in gray.iter().enumerate() {
      let value = pixel as f32 / 255.0;
      slice[i * channels..(i + 1) * channels].fill(value);
    }

    Ok(tensor)
  }

  #[cfg(feature = "preprocess_opencv")]
  fn enhance(&self, image: &DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let gray = self::enhance::enhance(&image.to_rgb8(), &self.config, W, H)?;
    let expected = (W * H) as usize;
    if gray.len() != expected {
      return Err(PreprocessError::InvalidConfig(format!(
        "增强结果大小 {} 与模型输入 {} 不一致",
        gray.len(),
        expected
      )));
    }
    Ok(gray)
  }

  #[cfg(not(feature = "preprocess_opencv"))]
  fn enhance(&self, _image: &DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    Err(PreprocessError::BackendUnavailable)
  }
}
