// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/frame.rs - 源图像帧与模型输入张量定义
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

const GRAY_CHANNELS: usize = 1;
const RGB_CHANNELS: usize = 3;

pub trait AsNhwcTensor<const W: u32, const H: u32> {
  fn as_nhwc(&self) -> &[f32];
  /// [N, H, W, C]
  fn shape(&self) -> [usize; 4];
}

/// 灰度值写入张量时的通道布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
  /// 单通道灰度
  Gray,
  /// 灰度复制到三个通道
  #[default]
  Replicated,
}

impl ChannelLayout {
  pub fn channels(&self) -> usize {
    match self {
      ChannelLayout::Gray => GRAY_CHANNELS,
      ChannelLayout::Replicated => RGB_CHANNELS,
    }
  }
}

/// 模型输入张量，NHWC 行优先，取值范围 [0, 1]
///
/// 每次推理单独创建，不在并发推理之间共享。
#[derive(Debug, Clone)]
pub struct GaugeTensor<const W: u32, const H: u32> {
  data: Box<[f32]>,
  layout: ChannelLayout,
}

impl<const W: u32, const H: u32> GaugeTensor<W, H> {
  pub fn with_layout(layout: ChannelLayout) -> Self {
    let size = layout.channels() * (W as usize) * (H as usize);
    Self {
      data: vec![0f32; size].into_boxed_slice(),
      layout,
    }
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    self.layout.channels()
  }

  pub fn layout(&self) -> ChannelLayout {
    self.layout
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

impl<const W: u32, const H: u32> Default for GaugeTensor<W, H> {
  fn default() -> Self {
    Self::with_layout(ChannelLayout::default())
  }
}

impl<const W: u32, const H: u32> AsMut<[f32]> for GaugeTensor<W, H> {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

impl<const W: u32, const H: u32> AsNhwcTensor<W, H> for GaugeTensor<W, H> {
  fn as_nhwc(&self) -> &[f32] {
    &self.data
  }

  fn shape(&self) -> [usize; 4] {
    [1, H as usize, W as usize, self.channels()]
  }
}

/// 输入源给出的一帧图像
#[derive(Debug, Clone)]
pub struct SourceFrame {
  pub index: usize,
  /// 图像来源，通常是文件路径
  pub origin: String,
  pub image: DynamicImage,
}

impl SourceFrame {
  pub fn new(index: usize, origin: impl Into<String>, image: DynamicImage) -> Self {
    Self {
      index,
      origin: origin.into(),
      image,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}
