// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/output/report.rs - 文本读数报告
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

use std::{
  fs::OpenOptions,
  io::Write,
  path::{Path, PathBuf},
};

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, frame::SourceFrame, output::Render, pipeline::ReadOutcome,
  url_local_path,
};

#[derive(Error, Debug)]
pub enum ReportOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// `report:` 打印到标准输出，`report:/path/to/log.txt` 追加到文件
#[derive(Debug, Default)]
pub struct ReportOutput {
  file: Option<PathBuf>,
}

impl FromUrlWithScheme for ReportOutput {
  const SCHEME: &'static str = "report";
}

impl FromUrl for ReportOutput {
  type Error = ReportOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(ReportOutputError::SchemeMismatch);
    }

    let path = url_local_path(uri);
    Ok(ReportOutput {
      file: (!path.is_empty()).then(|| PathBuf::from(path)),
    })
  }
}

impl ReportOutput {
  pub fn stdout() -> Self {
    Self { file: None }
  }

  pub fn to_file(path: impl Into<PathBuf>) -> Self {
    Self {
      file: Some(path.into()),
    }
  }

  pub fn file(&self) -> Option<&Path> {
    self.file.as_deref()
  }

  fn format(frame: &SourceFrame, result: &ReadOutcome) -> String {
    format!("[{}]\n{}\n", frame.origin, result)
  }
}

impl Render<SourceFrame, ReadOutcome> for ReportOutput {
  type Error = ReportOutputError;

  fn render_result(&self, frame: &SourceFrame, result: &ReadOutcome) -> Result<(), Self::Error> {
    let text = Self::format(frame, result);
    match &self.file {
      Some(path) => {
        if let Some(parent) = path.parent()
          && !parent.as_os_str().is_empty()
        {
          std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(text.as_bytes())?;
      }
      None => {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
      }
    }
    Ok(())
  }
}
