// 该文件是 Yibiao （仪表读数） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 读表耗时测试
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
use url::Url;

use yibiao::{
  FromUrl, GaugePipelineBuilder,
  config::GaugeConfig,
  input::InputWrapper,
  output::OutputWrapper,
  task::{RepeatShotTask, Task},
};
use tracing::info;

/// 对同一张照片重复读表并统计平均耗时
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出方式，默认写入 /dev/null 以免刷屏
  #[arg(long, value_name = "OUTPUT", default_value = "report:///dev/null")]
  pub output: Url,
  /// 仪表配置文件 (JSON)
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
  /// 重复次数（含两次预热）
  #[arg(long, default_value = "1000", value_name = "TIMES")]
  pub times: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("重复次数: {}", args.times);

  let config = GaugeConfig::load_or_default(args.config.as_deref())?;
  let input = InputWrapper::from_url(&args.input)?;
  let pipeline = GaugePipelineBuilder::new()
    .config(config)
    .build_from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;

  RepeatShotTask::default()
    .with_times(args.times)
    .run_task(input, pipeline, output)?;

  Ok(())
}
