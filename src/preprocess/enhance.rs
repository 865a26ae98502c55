// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/preprocess/enhance.rs - OpenCV 图像增强
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

use image::RgbImage;
use opencv::{
  core::{AlgorithmHint, Mat, Size, Vec3b},
  imgproc,
  prelude::*,
};

use super::PreprocessConfig;

/// 亮度/对比度 → 灰度 → CLAHE → 缩放，返回 `width * height` 个灰度字节
///
/// 每次调用新建 CLAHE 对象，调用之间不共享 OpenCV 状态。
pub(super) fn enhance(
  image: &RgbImage,
  config: &PreprocessConfig,
  width: u32,
  height: u32,
) -> opencv::Result<Vec<u8>> {
  let pixels: Vec<Vec3b> = image.pixels().map(|p| Vec3b::from(p.0)).collect();
  let rgb = Mat::from_slice_rows_cols(
    &pixels,
    image.height() as usize,
    image.width() as usize,
  )?;

  let mut bright = Mat::default();
  rgb.convert_to(&mut bright, -1, config.gain as f64, config.bias as f64)?;

  let mut gray = Mat::default();
  imgproc::cvt_color(
    &bright,
    &mut gray,
    imgproc::COLOR_RGB2GRAY,
    0,
    AlgorithmHint::ALGO_HINT_DEFAULT,
  )?;

  let (tiles_x, tiles_y) = config.tile_grid;
  let mut clahe = imgproc::create_clahe(
    config.clip_limit as f64,
    Size::new(tiles_x as i32, tiles_y as i32),
  )?;
  let mut equalized = Mat::default();
  clahe.apply(&gray, &mut equalized)?;

  let mut resized = Mat::default();
  imgproc::resize(
    &equalized,
    &mut resized,
    Size::new(width as i32, height as i32),
    0.0,
    0.0,
    imgproc::INTER_LINEAR,
  )?;

  Ok(resized.data_bytes()?.to_vec())
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn output_has_requested_size() {
    let image = RgbImage::from_fn(37, 11, |x, y| Rgb([x as u8 * 6, y as u8 * 20, 90]));
    let out = enhance(&image, &PreprocessConfig::default(), 64, 48).unwrap();
    assert_eq!(out.len(), 64 * 48);
  }

  #[test]
  fn constant_image_stays_uniform() {
    let image = RgbImage::from_pixel(40, 40, Rgb([100, 100, 100]));
    let out = enhance(&image, &PreprocessConfig::default(), 16, 16).unwrap();
    assert!(out.iter().all(|&v| v == out[0]));
  }

  #[test]
  fn dark_side_stays_darker() {
    let image = RgbImage::from_fn(64, 64, |x, _| {
      if x < 32 { Rgb([20, 20, 20]) } else { Rgb([200, 200, 200]) }
    });
    let out = enhance(&image, &PreprocessConfig::default(), 64, 64).unwrap();
    let row = &out[32 * 64..33 * 64];
    assert!(row[0] < row[63]);
  }
}
