// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/input/read_directory.rs - 图像目录输入
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

use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::SourceFrame, url_local_path};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum ImageDirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("不是目录: {0}")]
  NotADirectory(String),
}

/// 按文件名顺序逐张读取目录中的图像，解码失败的文件跳过
pub struct ImageDirectoryInput {
  files: std::vec::IntoIter<PathBuf>,
  index: usize,
}

impl FromUrlWithScheme for ImageDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirectoryInput {
  type Error = ImageDirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageDirectoryInputError::SchemeMismatch);
    }
    Self::open(url_local_path(url))
  }
}

impl ImageDirectoryInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, ImageDirectoryInputError> {
    let directory = directory.as_ref();
    if !directory.is_dir() {
      return Err(ImageDirectoryInputError::NotADirectory(
        directory.display().to_string(),
      ));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_image_file(&path) {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中共有 {} 张图像", directory.display(), files.len());

    Ok(ImageDirectoryInput {
      files: files.into_iter(),
      index: 0,
    })
  }

  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    .unwrap_or(false)
}

impl Iterator for ImageDirectoryInput {
  type Item = SourceFrame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      let decoded = ImageReader::open(&path)
        .map_err(image::ImageError::from)
        .and_then(|reader| reader.with_guessed_format().map_err(image::ImageError::from))
        .and_then(|reader| reader.decode());
      match decoded {
        Ok(image) => {
          let frame = SourceFrame::new(self.index, path.display().to_string(), image);
          self.index += 1;
          return Some(frame);
        }
        Err(e) => warn!("跳过无法解码的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}
