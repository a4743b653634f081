// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::DewarpFrame,
  path_from_url,
  preprocess::{PreprocessError, Preprocessor},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemaMismatch {
    expected: &'static str,
    found: String,
  },
  #[error("输入图像不存在: {0}")]
  NotFound(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("图像尺寸为零: {0}")]
  EmptyImage(PathBuf),
  #[error("预处理错误: {0}")]
  PreprocessError(#[from] PreprocessError),
}

/// 单张图像文件输入，`image:<path>?channels=bgr&filter=bilinear`
pub struct ImageFileInput<const W: u32, const H: u32> {
  image: RgbImage,
  preprocessor: Preprocessor,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for ImageFileInput<W, H> {
  const SCHEME: &'static str = "image";
}

impl<const W: u32, const H: u32> FromUrl for ImageFileInput<W, H> {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    let mut preprocessor = Preprocessor::default();
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "channels" => preprocessor = preprocessor.with_channel_order(v.parse()?),
        "filter" => preprocessor = preprocessor.with_interpolation(v.parse()?),
        _ => {}
      }
    }

    Self::open(path_from_url(url), preprocessor)
  }
}

impl<const W: u32, const H: u32> ImageFileInput<W, H> {
  pub fn open(
    path: impl AsRef<Path>,
    preprocessor: Preprocessor,
  ) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    if !path.is_file() {
      error!("输入图像不存在: {}", path.display());
      return Err(ImageFileInputError::NotFound(path.to_path_buf()));
    }

    let image = ImageReader::open(path)?
      .with_guessed_format()?
      .decode()?
      .to_rgb8();

    if image.width() == 0 || image.height() == 0 {
      return Err(ImageFileInputError::EmptyImage(path.to_path_buf()));
    }

    info!(
      "读取输入图像: {} ({}x{})",
      path.display(),
      image.width(),
      image.height()
    );

    Ok(ImageFileInput {
      image,
      preprocessor,
    })
  }

  pub fn preprocessor(&self) -> &Preprocessor {
    &self.preprocessor
  }

  /// 完成预处理，得到只产出一帧的迭代器
  pub fn into_nchw(self) -> Result<ImageFileInputNchw<W, H>, ImageFileInputError> {
    let frame = self.preprocessor.frame::<W, H>(self.image)?;
    Ok(ImageFileInputNchw { frame: Some(frame) })
  }
}

pub struct ImageFileInputNchw<const W: u32, const H: u32> {
  frame: Option<DewarpFrame<W, H>>,
}

impl<const W: u32, const H: u32> Iterator for ImageFileInputNchw<W, H> {
  type Item = DewarpFrame<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}
