// 该文件是 Pingzhi （平纸） 项目的一部分。
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
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use clap::Parser;
use url::Url;

/// Pingzhi 文档展平参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// DewarpNet ONNX 模型
  /// 格式: dewarpnet:<path>[?bm=<path>&threads=<n>]
  #[arg(long, value_name = "MODEL", default_value = "dewarpnet:dewarpnet.onnx")]
  pub model: Url,

  /// 输入图像
  /// 格式: image:<path>[?channels=bgr|rgb&filter=nearest|bilinear|bicubic|lanczos]
  #[arg(short, long, value_name = "SOURCE", default_value = "image:test.png")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - 图片: image:<path>[?compare]
  /// - 目录记录: folder:<dir>[?record&compare]
  #[arg(short = 's', long, value_name = "OUTPUT", default_value = "image:output.png")]
  pub output: Url,

  /// 基准测试模式，重复推理并统计耗时
  #[arg(short, long)]
  pub benchmark: bool,

  /// 基准测试的推理次数
  #[arg(long, default_value = "5", value_name = "COUNT")]
  pub repeat: usize,
}
