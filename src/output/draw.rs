// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/output/draw.rs - 读数结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut},
  rect::Rect,
};
use serde::Serialize;

use crate::{
  frame::SourceFrame,
  pipeline::ReadOutcome,
  reading::{BoundingBox, GaugeReading, Point},
};

const STROKE_WIDTH: u32 = 5;
const MARKER_RADIUS: i32 = 10;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const MARKER_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const LINE_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayStyle {
  pub stroke_width: u32,
  pub marker_radius: i32,
  pub box_color: [u8; 3],
  pub marker_color: [u8; 3],
  pub line_color: [u8; 3],
}

impl Default for OverlayStyle {
  fn default() -> Self {
    Self {
      stroke_width: STROKE_WIDTH,
      marker_radius: MARKER_RADIUS,
      box_color: BOX_COLOR,
      marker_color: MARKER_COLOR,
      line_color: LINE_COLOR,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Overlay {
  style: OverlayStyle,
}

impl Overlay {
  pub fn new(style: OverlayStyle) -> Self {
    Self { style }
  }

  pub fn style(&self) -> &OverlayStyle {
    &self.style
  }

  /// 在原图的副本上绘制读数，原图不变
  pub fn render(&self, image: &RgbImage, reading: &GaugeReading) -> RgbImage {
    let mut canvas = image.clone();
    self.draw_on_image(&mut canvas, reading);
    canvas
  }

  pub fn draw_on_image(&self, image: &mut RgbImage, reading: &GaugeReading) {
    if let Some(gauge_box) = reading.gauge_box {
      self.draw_box(image, &gauge_box);
    }
    draw_filled_circle_mut(
      image,
      (reading.center.x, reading.center.y),
      self.style.marker_radius,
      Rgb(self.style.marker_color),
    );
    self.draw_needle(image, reading.center, reading.needle_tip);
  }

  // 线宽通过多次内缩/外扩绘制实现，以原框为中线
  fn draw_box(&self, image: &mut RgbImage, bbox: &BoundingBox) {
    let half = (self.style.stroke_width / 2) as i32;
    for pass in 0..self.style.stroke_width.max(1) as i32 {
      let offset = pass - half;
      let width = bbox.width - 2 * offset;
      let height = bbox.height - 2 * offset;
      if width <= 0 || height <= 0 {
        continue;
      }
      let rect = Rect::at(bbox.x + offset, bbox.y + offset).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.style.box_color));
    }
  }

  // 沿法线方向平移线段实现线宽
  fn draw_needle(&self, image: &mut RgbImage, center: Point, tip: Point) {
    let (x0, y0) = (center.x as f32, center.y as f32);
    let (x1, y1) = (tip.x as f32, tip.y as f32);
    let (dx, dy) = (x1 - x0, y1 - y0);
    let length = (dx * dx + dy * dy).sqrt();
    let (nx, ny) = if length > 0.0 {
      (-dy / length, dx / length)
    } else {
      (0.0, 0.0)
    };

    let half = (self.style.stroke_width / 2) as f32;
    for pass in 0..self.style.stroke_width.max(1) {
      let offset = pass as f32 - half;
      draw_line_segment_mut(
        image,
        (x0 + nx * offset, y0 + ny * offset),
        (x1 + nx * offset, y1 + ny * offset),
        Rgb(self.style.line_color),
      );
    }
  }
}

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for SourceFrame {
  fn to_rgb_image(&self) -> RgbImage {
    self.image.to_rgb8()
  }
}

impl ToRgbImage for RgbImage {
  fn to_rgb_image(&self) -> RgbImage {
    self.clone()
  }
}

/// 每帧一条的 JSON 记录
#[derive(Debug, Clone, Serialize)]
pub struct Record<'a> {
  pub index: usize,
  pub origin: &'a str,
  pub detected: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reading: Option<&'a GaugeReading>,
}

impl<'a> Record<'a> {
  pub fn new(frame: &'a SourceFrame, outcome: &'a ReadOutcome) -> Self {
    Self {
      index: frame.index,
      origin: &frame.origin,
      detected: outcome.is_detected(),
      reading: outcome.reading(),
    }
  }

  pub fn write(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
    let text = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
    std::fs::write(path.with_extension("json"), text)
  }
}
