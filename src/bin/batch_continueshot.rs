// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/bin/batch_continueshot.rs - 批量读表
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use yibiao::{
  FromUrl, GaugePipelineBuilder,
  config::GaugeConfig,
  input::InputWrapper,
  output::OutputWrapper,
  reading::TieBreak,
  task::{ContinuousTask, Task},
};

/// 逐张读取目录中的仪表照片
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出方式
  #[arg(long, value_name = "OUTPUT", default_value = "report:")]
  pub output: Url,
  /// 仪表配置文件 (JSON)
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,
  #[arg(long, value_enum, value_name = "RULE")]
  pub tie_break: Option<TieBreak>,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出方式: {}", args.output);

  let config = GaugeConfig::load_or_default(args.config.as_deref())?
    .with_confidence_threshold(args.confidence)
    .with_tie_break(args.tie_break);

  let input = InputWrapper::from_url(&args.input)?;
  let pipeline = GaugePipelineBuilder::new()
    .config(config)
    .build_from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_interrupt(true)
    .run_task(input, &pipeline, output)?;

  pipeline.into_model().close();

  Ok(())
}
