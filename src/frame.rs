// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/frame.rs - NCHW 帧定义
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

use image::RgbImage;
use ndarray::{Array4, ArrayView4};
use thiserror::Error;

use crate::{
  input::{AsNchwTensor, SourceImage},
  preprocess::Preprocessor,
};

pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("张量形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: [usize; 4],
    actual: Vec<usize>,
  },
}

/// 模型输入帧
///
/// `tensor` 是 `[1, 3, H, W]` 的归一化张量，`source` 是解码后的原图。
/// 后处理需要原图尺寸（以及反向映射采样时的原图像素），因此一并保留。
#[derive(Debug, Clone)]
pub struct DewarpFrame<const W: u32, const H: u32> {
  source: RgbImage,
  tensor: Array4<f32>,
  preprocessor: Preprocessor,
}

impl<const W: u32, const H: u32> DewarpFrame<W, H> {
  pub fn new(
    source: RgbImage,
    tensor: Array4<f32>,
    preprocessor: Preprocessor,
  ) -> Result<Self, FrameError> {
    let expected = [1, RGB_CHANNELS, H as usize, W as usize];
    if tensor.shape() != expected {
      return Err(FrameError::ShapeMismatch {
        expected,
        actual: tensor.shape().to_vec(),
      });
    }

    Ok(Self {
      source,
      tensor,
      preprocessor,
    })
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 原图尺寸 (宽, 高)
  pub fn source_dimensions(&self) -> (u32, u32) {
    self.source.dimensions()
  }

  pub fn preprocessor(&self) -> &Preprocessor {
    &self.preprocessor
  }
}

impl<const W: u32, const H: u32> AsNchwTensor for DewarpFrame<W, H> {
  fn as_nchw(&self) -> ArrayView4<'_, f32> {
    self.tensor.view()
  }
}

impl<const W: u32, const H: u32> SourceImage for DewarpFrame<W, H> {
  fn source_image(&self) -> &RgbImage {
    &self.source
  }
}
