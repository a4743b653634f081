// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/postprocess.rs - 模型输出后处理
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

use image::{Rgb, RgbImage, imageops};
use ndarray::{Array4, s};
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::RGB_CHANNELS,
  model::DewarpResult,
  preprocess::Preprocessor,
  utils::{box_blur, grid_sample, resize_bilinear},
};

/// 反向映射平滑窗口
const BM_BLUR_KSIZE: usize = 3;

#[derive(Error, Debug)]
pub enum PostprocessError {
  #[error("输出形状无效: 期望 {expected}, 实际 {actual:?}")]
  InvalidShape {
    expected: &'static str,
    actual: Vec<usize>,
  },
}

/// 输出图像排版
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
  #[default]
  Single,
  /// 左侧原图，右侧结果
  SideBySide,
}

/// 把模型输出还原为原图尺寸的 RGB 图像
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Postprocessor {
  preprocessor: Preprocessor,
  blur_ksize: usize,
  layout: Layout,
}

impl Postprocessor {
  /// 以预处理参数构造逆变换
  pub fn inverse_of(preprocessor: &Preprocessor) -> Self {
    Postprocessor {
      preprocessor: *preprocessor,
      blur_ksize: BM_BLUR_KSIZE,
      layout: Layout::default(),
    }
  }

  pub fn with_layout(mut self, layout: Layout) -> Self {
    self.layout = layout;
    self
  }

  /// 反向映射的平滑窗口，1 表示不平滑
  pub fn with_blur(mut self, ksize: usize) -> Self {
    self.blur_ksize = ksize;
    self
  }

  pub fn render(
    &self,
    source: &RgbImage,
    result: &DewarpResult,
  ) -> Result<RgbImage, PostprocessError> {
    let restored = match result {
      DewarpResult::Image(tensor) => self.image_from_tensor(tensor, source.dimensions())?,
      DewarpResult::BackwardMap(bm) => self.unwarp(source, bm)?,
    };

    Ok(match self.layout {
      Layout::Single => restored,
      Layout::SideBySide => side_by_side(source, &restored),
    })
  }

  /// 图像张量：反归一化、恢复 RGB 通道顺序并缩放回原图尺寸
  pub fn image_from_tensor(
    &self,
    tensor: &Array4<f32>,
    (width, height): (u32, u32),
  ) -> Result<RgbImage, PostprocessError> {
    let (batch, channels, th, tw) = tensor.dim();
    if batch != 1 || channels != RGB_CHANNELS || th == 0 || tw == 0 {
      return Err(PostprocessError::InvalidShape {
        expected: "[1, 3, h, w]",
        actual: tensor.shape().to_vec(),
      });
    }

    let order = self.preprocessor.channel_order();
    let image = RgbImage::from_fn(tw as u32, th as u32, |x, y| {
      let mut pixel = [0u8; RGB_CHANNELS];
      for c in 0..RGB_CHANNELS {
        pixel[order.pixel_channel(c)] = self
          .preprocessor
          .denormalize(tensor[[0, c, y as usize, x as usize]]);
      }
      Rgb(pixel)
    });

    debug!("后处理: 图像 {}x{} -> {}x{}", tw, th, width, height);
    Ok(self.preprocessor.resize(&image, width, height))
  }

  /// 反向映射：平滑、双线性放大到原图尺寸后对原图采样
  pub fn unwarp(&self, source: &RgbImage, bm: &Array4<f32>) -> Result<RgbImage, PostprocessError> {
    let (batch, channels, bh, bw) = bm.dim();
    if batch != 1 || channels != 2 || bh == 0 || bw == 0 {
      return Err(PostprocessError::InvalidShape {
        expected: "[1, 2, h, w]",
        actual: bm.shape().to_vec(),
      });
    }

    let (width, height) = source.dimensions();
    debug!("后处理: 反向映射 {}x{} -> {}x{}", bw, bh, width, height);

    let grid_x = box_blur(bm.slice(s![0, 0, .., ..]), self.blur_ksize);
    let grid_y = box_blur(bm.slice(s![0, 1, .., ..]), self.blur_ksize);
    let grid_x = resize_bilinear(grid_x.view(), height as usize, width as usize);
    let grid_y = resize_bilinear(grid_y.view(), height as usize, width as usize);

    Ok(grid_sample(source, grid_x.view(), grid_y.view()))
  }
}

fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
  let width = left.width() + right.width();
  let height = left.height().max(right.height());
  let mut canvas = RgbImage::new(width, height);
  imageops::replace(&mut canvas, left, 0, 0);
  imageops::replace(&mut canvas, right, left.width() as i64, 0);
  canvas
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::preprocess::{ChannelOrder, Preprocessor};

  fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
      Rgb([(x * 13 % 256) as u8, (y * 29 % 256) as u8, ((x + y) * 7 % 256) as u8])
    })
  }

  fn identity_map(height: usize, width: usize) -> Array4<f32> {
    Array4::from_shape_fn((1, 2, height, width), |(_, c, y, x)| match c {
      0 => -1.0 + 2.0 * x as f32 / (width - 1) as f32,
      _ => -1.0 + 2.0 * y as f32 / (height - 1) as f32,
    })
  }

  #[test]
  fn image_output_is_restored_to_source_size() {
    let source = gradient(40, 30);
    let tensor = Array4::from_elem((1, 3, 8, 8), 0.5f32);
    let post = Postprocessor::inverse_of(&Preprocessor::default());
    let image = post.render(&source, &DewarpResult::Image(tensor)).unwrap();
    assert_eq!(image.dimensions(), (40, 30));
  }

  #[test]
  fn uniform_page_round_trips_through_identity_model() {
    let source = RgbImage::from_pixel(50, 20, Rgb([12, 200, 77]));
    let pre = Preprocessor::default();
    let tensor = pre.to_tensor(&source, 16, 16).unwrap();
    let image = Postprocessor::inverse_of(&pre)
      .render(&source, &DewarpResult::Image(tensor))
      .unwrap();
    assert_eq!(image, source);
  }

  #[test]
  fn channel_order_is_restored() {
    let source = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
    for order in [ChannelOrder::Rgb, ChannelOrder::Bgr] {
      let pre = Preprocessor::default().with_channel_order(order);
      let tensor = pre.to_tensor(&source, 4, 4).unwrap();
      let image = Postprocessor::inverse_of(&pre)
        .render(&source, &DewarpResult::Image(tensor))
        .unwrap();
      assert_eq!(image.get_pixel(1, 1), &Rgb([255, 0, 0]));
    }
  }

  #[test]
  fn non_finite_output_does_not_panic() {
    let source = gradient(6, 6);
    let tensor = Array4::from_elem((1, 3, 6, 6), f32::NAN);
    let image = Postprocessor::inverse_of(&Preprocessor::default())
      .render(&source, &DewarpResult::Image(tensor))
      .unwrap();
    assert!(image.pixels().all(|p| p == &Rgb([0, 0, 0])));
  }

  #[test]
  fn identity_backward_map_reproduces_source() {
    let source = gradient(12, 9);
    let post = Postprocessor::inverse_of(&Preprocessor::default()).with_blur(1);
    let image = post
      .render(&source, &DewarpResult::BackwardMap(identity_map(9, 12)))
      .unwrap();
    assert_eq!(image, source);
  }

  #[test]
  fn smoothed_identity_map_keeps_uniform_page() {
    let source = RgbImage::from_pixel(37, 23, Rgb([240, 240, 235]));
    let post = Postprocessor::inverse_of(&Preprocessor::default());
    let image = post
      .render(&source, &DewarpResult::BackwardMap(identity_map(8, 8)))
      .unwrap();
    assert_eq!(image, source);
  }

  #[test]
  fn rejects_malformed_outputs() {
    let source = gradient(4, 4);
    let post = Postprocessor::inverse_of(&Preprocessor::default());
    let bad = Array4::<f32>::zeros((1, 1, 4, 4));
    assert!(post.unwarp(&source, &bad).is_err());
    assert!(post.image_from_tensor(&bad, (4, 4)).is_err());
  }

  #[test]
  fn side_by_side_doubles_width() {
    let source = gradient(10, 5);
    let post = Postprocessor::inverse_of(&Preprocessor::default()).with_layout(Layout::SideBySide);
    let tensor = Array4::from_elem((1, 3, 5, 10), 1.0f32);
    let image = post.render(&source, &DewarpResult::Image(tensor)).unwrap();
    assert_eq!(image.dimensions(), (20, 5));
    assert_eq!(image.get_pixel(3, 2), source.get_pixel(3, 2));
    assert_eq!(image.get_pixel(13, 2), &Rgb([255, 255, 255]));
  }
}
