// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::DewarpFrame,
  input::SourceImage,
  model::DewarpResult,
  output::{Render, layout_from_url, write_image},
  path_from_url,
  postprocess::{Layout, PostprocessError, Postprocessor},
};

pub struct SaveImageFileOutput {
  path: PathBuf,
  layout: Layout,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("后处理错误: {0}")]
  PostprocessError(#[from] PostprocessError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput::new(path_from_url(uri)).with_layout(layout_from_url(uri)))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    SaveImageFileOutput {
      path: path.into(),
      layout: Layout::default(),
    }
  }

  pub fn with_layout(mut self, layout: Layout) -> Self {
    self.layout = layout;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&self, image: &image::RgbImage) -> Result<(), SaveImageFileError> {
    write_image(image, &self.path)?;
    info!(
      "保存图像到文件: {} ({}x{})",
      self.path.display(),
      image.width(),
      image.height()
    );
    Ok(())
  }
}

impl<const W: u32, const H: u32> Render<DewarpFrame<W, H>, DewarpResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(
    &self,
    frame: &DewarpFrame<W, H>,
    result: &DewarpResult,
  ) -> Result<(), Self::Error> {
    let image = Postprocessor::inverse_of(frame.preprocessor())
      .with_layout(self.layout)
      .render(frame.source_image(), result)?;
    self.save_image(&image)
  }
}
