// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/output.rs - 输出定义
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

use crate::FromUrl;
#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
use crate::FromUrlWithScheme;
#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
use crate::{frame::DewarpFrame, model::DewarpResult};
#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
use crate::postprocess::Layout;
use thiserror::Error;
use url::Url;

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
impl<const W: u32, const H: u32> Render<DewarpFrame<W, H>, DewarpResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(
    &self,
    frame: &DewarpFrame<W, H>,
    result: &DewarpResult,
  ) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

/// `compare` 查询参数打开左右对照排版
#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
fn layout_from_url(url: &Url) -> Layout {
  if url.query_pairs().any(|(k, _)| k == "compare") {
    Layout::SideBySide
  } else {
    Layout::Single
  }
}

/// 先写入同目录下的临时文件再改名，编码失败时不留下目标文件
#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
fn write_image(image: &image::RgbImage, path: &std::path::Path) -> Result<(), image::ImageError> {
  let format = image::ImageFormat::from_path(path)?;

  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }

  let file_name = path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();
  let partial = path.with_file_name(format!(".{}.part", file_name));

  if let Err(e) = image.save_with_format(&partial, format) {
    let _ = std::fs::remove_file(&partial);
    return Err(e);
  }
  if let Err(e) = std::fs::rename(&partial, path) {
    let _ = std::fs::remove_file(&partial);
    return Err(e.into());
  }

  Ok(())
}
