// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/config.rs - 读表配置
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

//! 每种仪表一份 JSON 配置，缺省字段取默认值：
//!
//! ```json
//! {
//!   "calibration": { "min_angle": 45, "max_angle": 515, "min_value": 0, "max_value": 100 },
//!   "confidence_threshold": 0.4,
//!   "tie_break": "last_wins",
//!   "preprocess": { "layout": "replicated" }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
  preprocess::{PreprocessConfig, PreprocessError},
  reading::{CONFIDENCE_THRESHOLD, Calibration, CalibrationError, TieBreak},
};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("标定参数无效: {0}")]
  Calibration(#[from] CalibrationError),
  #[error("预处理参数无效: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("置信度阈值必须在 [0, 1] 内, 实际为 {0}")]
  InvalidThreshold(f32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
  pub calibration: Calibration,
  pub confidence_threshold: f32,
  pub tie_break: TieBreak,
  pub preprocess: PreprocessConfig,
}

impl Default for GaugeConfig {
  fn default() -> Self {
    Self {
      calibration: Calibration::default(),
      confidence_threshold: CONFIDENCE_THRESHOLD,
      tie_break: TieBreak::default(),
      preprocess: PreprocessConfig::default(),
    }
  }
}

impl GaugeConfig {
  pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
    let config: GaugeConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("读取配置文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  /// 未指定路径时使用默认配置
  pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
    match path {
      Some(path) => Self::from_json_file(path),
      None => Ok(Self::default()),
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    self.calibration.validate()?;
    self.preprocess.validate()?;
    if !(0.0..=1.0).contains(&self.confidence_threshold) {
      return Err(ConfigError::InvalidThreshold(self.confidence_threshold));
    }
    Ok(())
  }

  pub fn with_confidence_threshold(mut self, threshold: Option<f32>) -> Self {
    if let Some(threshold) = threshold {
      self.confidence_threshold = threshold;
    }
    self
  }

  pub fn with_tie_break(mut self, tie_break: Option<TieBreak>) -> Self {
    if let Some(tie_break) = tie_break {
      self.tie_break = tie_break;
    }
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::ChannelLayout;

  #[test]
  fn empty_object_uses_defaults() {
    let config = GaugeConfig::from_json_str("{}").unwrap();
    assert_eq!(config.calibration, Calibration::default());
    assert_eq!(config.confidence_threshold, 0.4);
    assert_eq!(config.tie_break, TieBreak::LastWins);
    assert_eq!(config.preprocess.tile_grid, (8, 8));
  }

  #[test]
  fn partial_config_overrides_fields() {
    let config = GaugeConfig::from_json_str(
      r#"{
        "calibration": { "min_angle": -45, "max_angle": 225, "min_value": 10, "max_value": 0 },
        "tie_break": "highest_score",
        "preprocess": { "layout": "gray" }
      }"#,
    )
    .unwrap();
    assert_eq!(config.calibration.max_angle, 225.0);
    assert_eq!(config.tie_break, TieBreak::HighestScore);
    assert_eq!(config.preprocess.layout, ChannelLayout::Gray);
    assert_eq!(config.preprocess.gain, 1.2);
  }

  #[test]
  fn invalid_values_are_rejected() {
    assert!(matches!(
      GaugeConfig::from_json_str(r#"{ "confidence_threshold": 1.5 }"#),
      Err(ConfigError::InvalidThreshold(_))
    ));
    assert!(matches!(
      GaugeConfig::from_json_str(
        r#"{ "calibration": { "min_angle": 0, "max_angle": 0, "min_value": 0, "max_value": 1 } }"#
      ),
      Err(ConfigError::Calibration(_))
    ));
    assert!(matches!(
      GaugeConfig::from_json_str("not json"),
      Err(ConfigError::JsonError(_))
    ));
  }

  #[test]
  fn overrides_apply_only_when_present() {
    let config = GaugeConfig::default()
      .with_confidence_threshold(None)
      .with_tie_break(Some(TieBreak::HighestScore));
    assert_eq!(config.confidence_threshold, 0.4);
    assert_eq!(config.tie_break, TieBreak::HighestScore);
  }
}
