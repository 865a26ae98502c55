// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;
use yibiao::reading::TieBreak;

/// 读取单张仪表照片
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 gauge:///models/gauge.onnx?delegate=auto&threads=4
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// 支持格式:
  /// - 图片: image:///path/to/gauge.jpg
  /// - 目录: folder:///path/to/images （只读取第一张）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出方式
  /// 支持格式:
  /// - 文本: report: 或 report:///path/to/log.txt
  /// - 图片: image:///path/to/overlay.png
  /// - 目录: folder:///path/to/records?record&always
  #[arg(long, value_name = "OUTPUT", default_value = "report:")]
  pub output: Url,

  /// 仪表配置文件 (JSON)
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)，覆盖配置文件
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// 同类多检测的取舍方式，覆盖配置文件
  #[arg(long, value_enum, value_name = "RULE")]
  pub tie_break: Option<TieBreak>,
}
