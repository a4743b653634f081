// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::DewarpFrame,
  input::SourceImage,
  model::DewarpResult,
  output::{Render, layout_from_url, write_image},
  path_from_url,
  postprocess::{Layout, PostprocessError, Postprocessor},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("后处理错误: {0}")]
  PostprocessError(#[from] PostprocessError),
}

/// 单次运行的记录，与结果图像同名的 `.json` 文件
#[derive(Debug, Serialize)]
struct Record<'a> {
  timestamp: String,
  image: String,
  source_width: u32,
  source_height: u32,
  input_width: u32,
  input_height: u32,
  channel_order: String,
  interpolation: String,
  output_kind: &'a str,
  output_shape: &'a [usize],
}

/// 按日期分目录保存结果：`folder:<dir>?record&compare`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  layout: Layout,
  record: bool,
  frame_counter: AtomicU16,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");

    Ok(
      DirectoryRecordOutput::new(path_from_url(uri))
        .with_layout(layout_from_url(uri))
        .with_record(record),
    )
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    DirectoryRecordOutput {
      directory: directory.into(),
      layout: Layout::default(),
      record: false,
      frame_counter: AtomicU16::new(0),
    }
  }

  pub fn with_layout(mut self, layout: Layout) -> Self {
    self.layout = layout;
    self
  }

  pub fn with_record(mut self, record: bool) -> Self {
    self.record = record;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  /// `<dir>/<YYYY>/<MM>/<DD>/<HH-MM-SS>-<NNNN>.png`
  fn frame_path(&self, now: &DateTime<Utc>) -> PathBuf {
    self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()))
      .join(format!("{}-{:04X}.png", now.format("%H-%M-%S"), self.frame_id()))
  }

  fn write_record<const W: u32, const H: u32>(
    &self,
    path: &Path,
    now: &DateTime<Utc>,
    frame: &DewarpFrame<W, H>,
    result: &DewarpResult,
  ) -> Result<(), DirectoryRecordOutputError> {
    let (source_width, source_height) = frame.source_dimensions();
    let record = Record {
      timestamp: now.to_rfc3339(),
      image: path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default(),
      source_width,
      source_height,
      input_width: W,
      input_height: H,
      channel_order: format!("{:?}", frame.preprocessor().channel_order()),
      interpolation: format!("{:?}", frame.preprocessor().interpolation()),
      output_kind: result.kind(),
      output_shape: result.tensor().shape(),
    };

    let json = serde_json::to_string_pretty(&record)?;
    let record_path = path.with_extension("json");
    if let Some(parent) = record_path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    if let Err(e) = std::fs::write(&record_path, json) {
      let _ = std::fs::remove_file(&record_path);
      return Err(e.into());
    }
    Ok(())
  }

  /// 先写记录再写图像，任一步失败都不留下本次的文件
  fn render_at<const W: u32, const H: u32>(
    &self,
    frame: &DewarpFrame<W, H>,
    result: &DewarpResult,
    now: &DateTime<Utc>,
  ) -> Result<PathBuf, DirectoryRecordOutputError> {
    let image = Postprocessor::inverse_of(frame.preprocessor())
      .with_layout(self.layout)
      .render(frame.source_image(), result)?;

    let path = self.frame_path(now);
    if self.record {
      self.write_record(&path, now, frame, result)?;
    }
    if let Err(e) = write_image(&image, &path) {
      if self.record {
        let _ = std::fs::remove_file(path.with_extension("json"));
      }
      return Err(e.into());
    }

    Ok(path)
  }
}

impl<const W: u32, const H: u32> Render<DewarpFrame<W, H>, DewarpResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &self,
    frame: &DewarpFrame<W, H>,
    result: &DewarpResult,
  ) -> Result<(), Self::Error> {
    let path = self.render_at(frame, result, &Utc::now())?;
    info!("记录结果到: {}", path.display());
    Ok(())
  }
}
