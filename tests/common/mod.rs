// 该文件是 Yibiao （仪表读数） 项目的一部分。
// tests/common/mod.rs - 集成测试公共工具
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

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use image::{DynamicImage, Rgb, RgbImage};
use thiserror::Error;
use yibiao::{
  frame::AsNhwcTensor,
  model::{Model, RawDetections},
  pipeline::InputTensor,
};

pub const SLOTS: usize = 100;

#[derive(Error, Debug)]
#[error("fake inference failure")]
pub struct FakeError;

/// 依次返回预设结果的模型，预设用完后返回全零槽位
#[derive(Default)]
pub struct FakeModel {
  responses: Mutex<VecDeque<Result<RawDetections, FakeError>>>,
  shapes: Mutex<Vec<[usize; 4]>>,
}

impl FakeModel {
  pub fn new(responses: Vec<Result<RawDetections, FakeError>>) -> Self {
    Self {
      responses: Mutex::new(responses.into()),
      shapes: Mutex::new(Vec::new()),
    }
  }

  pub fn calls(&self) -> usize {
    self.shapes.lock().unwrap().len()
  }

  pub fn shapes(&self) -> Vec<[usize; 4]> {
    self.shapes.lock().unwrap().clone()
  }
}

impl Model for FakeModel {
  type Input = InputTensor;
  type Output = RawDetections;
  type Error = FakeError;

  fn infer(&self, input: &InputTensor) -> Result<RawDetections, FakeError> {
    assert!(input.as_nhwc().iter().all(|v| (0.0..=1.0).contains(v)));
    self.shapes.lock().unwrap().push(input.shape());
    self
      .responses
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Ok(slots(&[])))
  }
}

/// `(槽位, 归一化框, 分数, 类别)`，其余槽位全零
pub fn slots(entries: &[(usize, [f32; 4], f32, f32)]) -> RawDetections {
  let mut boxes = vec![[0.0; 4]; SLOTS];
  let mut scores = vec![0.0; SLOTS];
  let mut classes = vec![0.0; SLOTS];
  for &(i, bbox, score, class) in entries {
    boxes[i] = bbox;
    scores[i] = score;
    classes[i] = class;
  }
  RawDetections::new(boxes, scores, classes).unwrap()
}

/// 1000x800 图像上中心 (500, 400)、针尖 (500, 320)、表盘 (100, 80, 800, 640)
pub fn upright_needle() -> RawDetections {
  slots(&[
    (0, [0.40, 0.38, 0.60, 0.42], 0.9, 2.0),
    (1, [0.48, 0.48, 0.52, 0.52], 0.95, 0.0),
    (2, [0.1, 0.1, 0.9, 0.9], 0.8, 1.0),
  ])
}

pub fn gauge_photo(width: u32, height: u32) -> DynamicImage {
  DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
    let v = ((x + y) % 256) as u8;
    Rgb([v, v / 2, 255 - v])
  }))
}
