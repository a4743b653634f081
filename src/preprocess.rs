// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/preprocess.rs - 图像预处理
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

use std::str::FromStr;

use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;
use thiserror::Error;
use tracing::debug;

use crate::frame::{DewarpFrame, FrameError, RGB_CHANNELS};

/// 8 位像素到 `[0, 1]` 的缩放系数
pub const PIXEL_SCALE: f32 = 1.0 / 255.0;

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("未知的通道顺序: {0}")]
  UnknownChannelOrder(String),
  #[error("未知的插值方式: {0}")]
  UnknownInterpolation(String),
  #[error("图像尺寸为零")]
  EmptyImage,
  #[error("帧构造错误: {0}")]
  FrameError(#[from] FrameError),
}

/// 张量中的通道排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
  Rgb,
  /// DewarpNet 以 OpenCV 读入的 BGR 图像训练
  #[default]
  Bgr,
}

impl ChannelOrder {
  /// 张量通道 `c` 对应的 RGB 像素分量下标
  pub fn pixel_channel(self, c: usize) -> usize {
    match self {
      ChannelOrder::Rgb => c,
      ChannelOrder::Bgr => RGB_CHANNELS - 1 - c,
    }
  }
}

impl FromStr for ChannelOrder {
  type Err = PreprocessError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "rgb" => Ok(ChannelOrder::Rgb),
      "bgr" => Ok(ChannelOrder::Bgr),
      _ => Err(PreprocessError::UnknownChannelOrder(s.to_string())),
    }
  }
}

/// 缩放插值方式
///
/// 均映射到 `image::imageops` 的滤波器。缩小时滤波窗口随缩放比例扩大，
/// `Bilinear`（`Triangle`）因此是按面积加权的平均，与 OpenCV 的
/// `INTER_LINEAR` 只取四邻域不同；放大时二者一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
  Nearest,
  #[default]
  Bilinear,
  Bicubic,
  Lanczos,
}

impl Interpolation {
  pub fn filter(self) -> FilterType {
    match self {
      Interpolation::Nearest => FilterType::Nearest,
      Interpolation::Bilinear => FilterType::Triangle,
      Interpolation::Bicubic => FilterType::CatmullRom,
      Interpolation::Lanczos => FilterType::Lanczos3,
    }
  }
}

impl FromStr for Interpolation {
  type Err = PreprocessError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nearest" => Ok(Interpolation::Nearest),
      "bilinear" | "linear" => Ok(Interpolation::Bilinear),
      "bicubic" | "cubic" => Ok(Interpolation::Bicubic),
      "lanczos" | "lanczos3" => Ok(Interpolation::Lanczos),
      _ => Err(PreprocessError::UnknownInterpolation(s.to_string())),
    }
  }
}

/// 把任意尺寸的 RGB 图像变成模型输入张量 `[1, 3, H, W]`
///
/// 像素值只做线性缩放（默认除以 255），不依赖图像统计量，
/// 纯色图像同样可以得到确定的张量。后处理以同一组参数做逆变换。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessor {
  channel_order: ChannelOrder,
  interpolation: Interpolation,
  scale: f32,
}

impl Default for Preprocessor {
  fn default() -> Self {
    Self {
      channel_order: ChannelOrder::default(),
      interpolation: Interpolation::default(),
      scale: PIXEL_SCALE,
    }
  }
}

impl Preprocessor {
  pub fn with_channel_order(mut self, channel_order: ChannelOrder) -> Self {
    self.channel_order = channel_order;
    self
  }

  pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
    self.interpolation = interpolation;
    self
  }

  pub fn channel_order(&self) -> ChannelOrder {
    self.channel_order
  }

  pub fn interpolation(&self) -> Interpolation {
    self.interpolation
  }

  pub fn normalize(&self, value: u8) -> f32 {
    value as f32 * self.scale
  }

  /// `normalize` 的逆变换，超出范围的值截断，NaN 变为 0
  pub fn denormalize(&self, value: f32) -> u8 {
    (value / self.scale).round().clamp(0.0, 255.0) as u8
  }

  /// 按配置的插值方式缩放，尺寸一致时直接复制
  pub fn resize(&self, image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
      return image.clone();
    }
    image::imageops::resize(image, width, height, self.interpolation.filter())
  }

  pub fn to_tensor(
    &self,
    image: &RgbImage,
    width: u32,
    height: u32,
  ) -> Result<Array4<f32>, PreprocessError> {
    if image.width() == 0 || image.height() == 0 || width == 0 || height == 0 {
      return Err(PreprocessError::EmptyImage);
    }

    let resized = self.resize(image, width, height);
    debug!(
      "预处理: {}x{} -> {}x{}, 通道顺序 {:?}, 插值 {:?}",
      image.width(),
      image.height(),
      width,
      height,
      self.channel_order,
      self.interpolation
    );

    let tensor = Array4::from_shape_fn(
      (1, RGB_CHANNELS, height as usize, width as usize),
      |(_, c, y, x)| {
        let pixel = resized.get_pixel(x as u32, y as u32);
        self.normalize(pixel[self.channel_order.pixel_channel(c)])
      },
    );

    Ok(tensor)
  }

  /// 生成模型输入帧，帧内保留原图与本预处理参数
  pub fn frame<const W: u32, const H: u32>(
    &self,
    image: RgbImage,
  ) -> Result<DewarpFrame<W, H>, PreprocessError> {
    let tensor = self.to_tensor(&image, W, H)?;
    Ok(DewarpFrame::new(image, tensor, *self)?)
  }
}
