// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use pingzhi::{
  FromUrl,
  frame::DewarpFrame,
  input::ImageFileInput,
  model::{DEWARPNET_INPUT_H, DEWARPNET_INPUT_W, DewarpNet, DewarpNetBuilder},
  output::OutputWrapper,
  task::{OneShotTask, RepeatShotTask, Task},
};

type Frame = DewarpFrame<DEWARPNET_INPUT_W, DEWARPNET_INPUT_H>;

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  // 先加载模型，模型缺失时不做任何预处理
  let model: DewarpNet<Frame> = DewarpNetBuilder::from_url(&args.model)
    .and_then(|builder| builder.build())
    .context("加载模型失败")?;
  let input = ImageFileInput::<DEWARPNET_INPUT_W, DEWARPNET_INPUT_H>::from_url(&args.input)
    .and_then(|input| input.into_nchw())
    .context("读取输入失败")?;
  let output = OutputWrapper::from_url(&args.output).context("创建输出失败")?;

  if args.benchmark {
    info!("基准测试模式: {} 次推理", args.repeat);
    RepeatShotTask::default()
      .with_repeat(args.repeat)
      .run_task(input, model, output)?;
  } else {
    OneShotTask.run_task(input, model, output)?;
  }

  info!("处理完成!");
  Ok(())
}
