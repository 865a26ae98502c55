// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/model/gauge_detector.rs - 仪表检测模型（ONNX Runtime）
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

use std::{fmt, str::FromStr, sync::Mutex};

use ort::{
  execution_providers::CPUExecutionProvider,
  session::{Session, builder::SessionBuilder},
  value::{DynValue, Tensor},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{AsNhwcTensor, GaugeTensor},
  model::{DetectionShapeError, Model, RawDetections},
  url_local_path,
};

const GAUGE_NUM_INPUTS: usize = 1;
const GAUGE_NUM_OUTPUTS: usize = 3;
const GAUGE_MAX_DETECTIONS: usize = 100;
const GAUGE_CPU_THREADS: usize = 4;

/// 推理后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delegate {
  /// 设备支持时使用 GPU，否则回退到 CPU 线程池
  #[default]
  Auto,
  Gpu,
  Cpu,
}

impl fmt::Display for Delegate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Delegate::Auto => write!(f, "auto"),
      Delegate::Gpu => write!(f, "gpu"),
      Delegate::Cpu => write!(f, "cpu"),
    }
  }
}

impl FromStr for Delegate {
  type Err = GaugeDetectorError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "auto" => Ok(Delegate::Auto),
      "gpu" | "cuda" => Ok(Delegate::Gpu),
      "cpu" => Ok(Delegate::Cpu),
      other => Err(GaugeDetectorError::UnknownDelegate(other.to_string())),
    }
  }
}

#[derive(Error, Debug)]
pub enum GaugeDetectorError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("未知的推理后端: {0}")]
  UnknownDelegate(String),
  #[error("当前设备不支持推理后端: {0}")]
  DelegateUnavailable(Delegate),
  #[error("输出 {name} 大小不匹配: 期望 {expected}, 实际 {actual}")]
  OutputShape {
    name: String,
    expected: usize,
    actual: usize,
  },
  #[error("检测结果格式错误: {0}")]
  Detections(#[from] DetectionShapeError),
  #[error("推理会话不可用")]
  SessionPoisoned,
}

impl GaugeDetectorError {
  pub fn invalid(msg: &str) -> Self {
    GaugeDetectorError::ModelInvalid(msg.to_string())
  }
}

/// 三个输出张量在会话中的名称
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputNames {
  boxes: String,
  scores: String,
  classes: String,
}

impl OutputNames {
  /// 优先按名称匹配，否则按输出顺序 (框, 分数, 类别)
  fn resolve(names: &[String]) -> Result<Self, GaugeDetectorError> {
    if names.len() != GAUGE_NUM_OUTPUTS {
      return Err(GaugeDetectorError::ModelInvalid(format!(
        "预期模型输出数量为 {}, 实际为 {}",
        GAUGE_NUM_OUTPUTS,
        names.len()
      )));
    }

    let find = |key: &str| {
      names
        .iter()
        .find(|name| name.to_ascii_lowercase().contains(key))
        .cloned()
    };

    match (find("box"), find("score"), find("class")) {
      (Some(boxes), Some(scores), Some(classes))
        if boxes != scores && scores != classes && boxes != classes =>
      {
        debug!("按名称匹配输出: {}, {}, {}", boxes, scores, classes);
        Ok(OutputNames {
          boxes,
          scores,
          classes,
        })
      }
      _ => {
        debug!("按顺序匹配输出: {:?}", names);
        Ok(OutputNames {
          boxes: names[0].clone(),
          scores: names[1].clone(),
          classes: names[2].clone(),
        })
      }
    }
  }
}

/// 仪表检测器，持有已绑定后端的推理会话
///
/// 会话同一时刻只服务一次推理，并发调用会在锁上排队。
/// 调用 [`GaugeDetector::close`] 或离开作用域时释放会话及其后端。
pub struct GaugeDetector<const W: u32, const H: u32> {
  session: Mutex<Session>,
  input_name: String,
  outputs: OutputNames,
  delegate: Delegate,
}

pub struct GaugeDetectorBuilder {
  model_path: String,
  delegate: Delegate,
  threads: usize,
}

impl FromUrlWithScheme for GaugeDetectorBuilder {
  const SCHEME: &'static str = "gauge";
}

impl FromUrl for GaugeDetectorBuilder {
  type Error = GaugeDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GaugeDetectorError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = GaugeDetectorBuilder::new(url_local_path(url));
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "delegate" => builder = builder.delegate(value.parse()?),
        "threads" => {
          let threads = value.parse::<usize>().map_err(|_| {
            GaugeDetectorError::ModelPathError(format!("线程数无效: {}", value))
          })?;
          builder = builder.threads(threads);
        }
        other => warn!("忽略未知的模型参数: {}", other),
      }
    }
    Ok(builder)
  }
}

impl GaugeDetectorBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    GaugeDetectorBuilder {
      model_path: model_path.into(),
      delegate: Delegate::default(),
      threads: GAUGE_CPU_THREADS,
    }
  }

  pub fn delegate(mut self, delegate: Delegate) -> Self {
    self.delegate = delegate;
    self
  }

  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = threads.max(1);
    self
  }

  pub fn build<const W: u32, const H: u32>(self) -> Result<GaugeDetector<W, H>, GaugeDetectorError> {
    info!("加载模型文件: {}", self.model_path);
    let metadata = std::fs::metadata(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建推理会话, 请求后端: {}", self.delegate);
    let (builder, delegate) = self.bind_delegate(Session::builder()?)?;
    let session = builder.commit_from_file(&self.model_path)?;
    info!("模型加载完成, 推理后端: {}", delegate);

    let num_inputs = session.inputs.len();
    if num_inputs != GAUGE_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        GAUGE_NUM_INPUTS, num_inputs
      );
      return Err(GaugeDetectorError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        GAUGE_NUM_INPUTS, num_inputs
      )));
    }

    let input_name = session.inputs[0].name.clone();
    let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
    debug!("模型输入: {}", input_name);
    debug!("模型输出: {:?}", output_names);
    let outputs = OutputNames::resolve(&output_names)?;

    Ok(GaugeDetector {
      session: Mutex::new(session),
      input_name,
      outputs,
      delegate,
    })
  }

  fn bind_delegate(
    &self,
    builder: SessionBuilder,
  ) -> Result<(SessionBuilder, Delegate), GaugeDetectorError> {
    match self.delegate {
      Delegate::Cpu => Ok((bind_cpu(builder, self.threads)?, Delegate::Cpu)),
      Delegate::Gpu => {
        if !gpu_available() {
          error!("当前设备不支持 GPU 推理");
          return Err(GaugeDetectorError::DelegateUnavailable(Delegate::Gpu));
        }
        Ok((bind_gpu(builder)?, Delegate::Gpu))
      }
      Delegate::Auto => {
        if gpu_available() {
          Ok((bind_gpu(builder)?, Delegate::Gpu))
        } else {
          info!("GPU 不可用, 使用 {} 线程 CPU 推理", self.threads);
          Ok((bind_cpu(builder, self.threads)?, Delegate::Cpu))
        }
      }
    }
  }
}

fn bind_cpu(builder: SessionBuilder, threads: usize) -> Result<SessionBuilder, GaugeDetectorError> {
  Ok(
    builder
      .with_execution_providers([CPUExecutionProvider::default().build()])?
      .with_intra_threads(threads)?,
  )
}

#[cfg(feature = "cuda")]
fn gpu_available() -> bool {
  use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
  CUDAExecutionProvider::default()
    .is_available()
    .unwrap_or(false)
}

#[cfg(not(feature = "cuda"))]
fn gpu_available() -> bool {
  false
}

#[cfg(feature = "cuda")]
fn bind_gpu(builder: SessionBuilder) -> Result<SessionBuilder, GaugeDetectorError> {
  use ort::execution_providers::CUDAExecutionProvider;
  Ok(builder.with_execution_providers([CUDAExecutionProvider::default()
    .build()
    .error_on_failure()])?)
}

#[cfg(not(feature = "cuda"))]
fn bind_gpu(_builder: SessionBuilder) -> Result<SessionBuilder, GaugeDetectorError> {
  Err(GaugeDetectorError::DelegateUnavailable(Delegate::Gpu))
}

impl<const W: u32, const H: u32> GaugeDetector<W, H> {
  pub fn delegate(&self) -> Delegate {
    self.delegate
  }

  /// 释放推理会话与后端
  pub fn close(self) {
    info!("关闭仪表检测器 (后端: {})", self.delegate);
  }

  fn extract(value: &DynValue, name: &str, expected: usize) -> Result<Vec<f32>, GaugeDetectorError> {
    let (shape, data) = value.try_extract_tensor::<f32>()?;
    debug!("输出 {} 形状: {:?}", name, shape);
    if data.len() != expected {
      error!(
        "输出 {} 大小不匹配 - 期望: {}, 实际: {}",
        name,
        expected,
        data.len()
      );
      return Err(GaugeDetectorError::OutputShape {
        name: name.to_string(),
        expected,
        actual: data.len(),
      });
    }
    Ok(data.to_vec())
  }
}

impl<const W: u32, const H: u32> Drop for GaugeDetector<W, H> {
  fn drop(&mut self) {
    debug!("推理会话已释放");
  }
}

impl<const W: u32, const H: u32> Model for GaugeDetector<W, H> {
  type Input = GaugeTensor<W, H>;
  type Output = RawDetections;
  type Error = GaugeDetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入: {:?}", input.shape());
    let tensor = Tensor::from_array((input.shape(), input.as_nhwc().to_vec()))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| GaugeDetectorError::SessionPoisoned)?;

    debug!("执行模型推理");
    let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

    debug!("获取模型输出");
    let boxes = Self::extract(
      &outputs[self.outputs.boxes.as_str()],
      &self.outputs.boxes,
      GAUGE_MAX_DETECTIONS * 4,
    )?;
    let scores = Self::extract(
      &outputs[self.outputs.scores.as_str()],
      &self.outputs.scores,
      GAUGE_MAX_DETECTIONS,
    )?;
    let classes = Self::extract(
      &outputs[self.outputs.classes.as_str()],
      &self.outputs.classes,
      GAUGE_MAX_DETECTIONS,
    )?;

    Ok(RawDetections::from_flat(&boxes, &scores, &classes)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn outputs_are_matched_by_name() {
    let resolved =
      OutputNames::resolve(&names(&["detection_scores", "detection_classes", "detection_boxes"]))
        .unwrap();
    assert_eq!(resolved.boxes, "detection_boxes");
    assert_eq!(resolved.scores, "detection_scores");
    assert_eq!(resolved.classes, "detection_classes");
  }

  #[test]
  fn outputs_fall_back_to_position() {
    let resolved = OutputNames::resolve(&names(&["out0", "out1", "out2"])).unwrap();
    assert_eq!(resolved.boxes, "out0");
    assert_eq!(resolved.scores, "out1");
    assert_eq!(resolved.classes, "out2");
  }

  #[test]
  fn wrong_output_count_is_invalid() {
    assert!(matches!(
      OutputNames::resolve(&names(&["a", "b"])),
      Err(GaugeDetectorError::ModelInvalid(_))
    ));
  }

  #[test]
  fn builder_reads_query_parameters() {
    let url = Url::parse("gauge:///models/gauge%20v2.onnx?delegate=cpu&threads=2").unwrap();
    let builder = GaugeDetectorBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/models/gauge v2.onnx");
    assert_eq!(builder.delegate, Delegate::Cpu);
    assert_eq!(builder.threads, 2);
  }

  #[test]
  fn builder_rejects_other_schemes() {
    let url = Url::parse("model:///models/gauge.onnx").unwrap();
    assert!(GaugeDetectorBuilder::from_url(&url).is_err());
  }

  #[test]
  fn delegate_names_are_parsed() {
    assert_eq!("AUTO".parse::<Delegate>().unwrap(), Delegate::Auto);
    assert_eq!("cuda".parse::<Delegate>().unwrap(), Delegate::Gpu);
    assert_eq!("cpu".parse::<Delegate>().unwrap(), Delegate::Cpu);
  }

  #[test]
  fn unknown_delegate_is_its_own_error() {
    let err = "npu".parse::<Delegate>().unwrap_err();
    assert!(matches!(err, GaugeDetectorError::UnknownDelegate(ref name) if name == "npu"));
  }

  #[test]
  fn unknown_delegate_in_url_is_rejected() {
    let url = Url::parse("gauge:///models/gauge.onnx?delegate=npu").unwrap();
    assert!(matches!(
      GaugeDetectorBuilder::from_url(&url),
      Err(GaugeDetectorError::UnknownDelegate(_))
    ));
  }

  #[test]
  fn missing_model_file_fails_to_load() {
    let result = GaugeDetectorBuilder::new("/nonexistent/gauge.onnx")
      .delegate(Delegate::Cpu)
      .build::<640, 640>();
    assert!(matches!(result, Err(GaugeDetectorError::ModelLoadError(_))));
  }

  #[cfg(not(feature = "cuda"))]
  #[test]
  fn gpu_is_unavailable_without_cuda_feature() {
    let builder = GaugeDetectorBuilder::new("unused.onnx").delegate(Delegate::Gpu);
    assert!(!gpu_available());
    assert_eq!(builder.delegate, Delegate::Gpu);
  }
}
