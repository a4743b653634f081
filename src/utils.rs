// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/utils.rs - 张量插值与采样工具
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

use image::{Rgb, RgbImage};
use ndarray::{Array2, Array4, ArrayView2, ArrayView4};

/// reflect-101 边界下标映射（`gfedcb|abcdefgh|gfedcba`）
pub fn reflect_101(index: isize, len: usize) -> usize {
  if len <= 1 {
    return 0;
  }
  let len = len as isize;
  let period = 2 * (len - 1);
  let mut i = index.rem_euclid(period);
  if i >= len {
    i = period - i;
  }
  i as usize
}

/// 方框均值滤波，`ksize` 为奇数窗口边长
pub fn box_blur(plane: ArrayView2<f32>, ksize: usize) -> Array2<f32> {
  let (height, width) = plane.dim();
  if ksize <= 1 || height == 0 || width == 0 {
    return plane.to_owned();
  }

  let radius = (ksize / 2) as isize;
  let area = (ksize * ksize) as f32;

  Array2::from_shape_fn((height, width), |(y, x)| {
    let mut sum = 0.0f32;
    for dy in -radius..=radius {
      let yy = reflect_101(y as isize + dy, height);
      for dx in -radius..=radius {
        let xx = reflect_101(x as isize + dx, width);
        sum += plane[[yy, xx]];
      }
    }
    sum / area
  })
}

// 半像素中心对齐的源坐标及其插值权重
fn source_coordinate(dst: usize, scale: f32, len: usize) -> (usize, usize, f32) {
  let f = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
  let i0 = (f.floor() as usize).min(len - 1);
  let i1 = (i0 + 1).min(len - 1);
  (i0, i1, f - i0 as f32)
}

/// 单通道双线性缩放，像素中心对齐
pub fn resize_bilinear(plane: ArrayView2<f32>, out_h: usize, out_w: usize) -> Array2<f32> {
  let (in_h, in_w) = plane.dim();
  if in_h == 0 || in_w == 0 {
    return Array2::zeros((out_h, out_w));
  }
  if (in_h, in_w) == (out_h, out_w) {
    return plane.to_owned();
  }

  let scale_y = in_h as f32 / out_h.max(1) as f32;
  let scale_x = in_w as f32 / out_w.max(1) as f32;

  let cols: Vec<(usize, usize, f32)> = (0..out_w)
    .map(|x| source_coordinate(x, scale_x, in_w))
    .collect();

  let mut out = Array2::zeros((out_h, out_w));
  for y in 0..out_h {
    let (y0, y1, ty) = source_coordinate(y, scale_y, in_h);
    for (x, &(x0, x1, tx)) in cols.iter().enumerate() {
      let top = plane[[y0, x0]] * (1.0 - tx) + plane[[y0, x1]] * tx;
      let bottom = plane[[y1, x0]] * (1.0 - tx) + plane[[y1, x1]] * tx;
      out[[y, x]] = top * (1.0 - ty) + bottom * ty;
    }
  }
  out
}

/// NCHW 张量的最近邻缩放，`src = floor(dst * in / out)`
pub fn resize_nchw_nearest(tensor: ArrayView4<f32>, out_h: usize, out_w: usize) -> Array4<f32> {
  let (n, c, in_h, in_w) = tensor.dim();
  if in_h == 0 || in_w == 0 {
    return Array4::zeros((n, c, out_h, out_w));
  }

  let scale_y = in_h as f32 / out_h.max(1) as f32;
  let scale_x = in_w as f32 / out_w.max(1) as f32;

  Array4::from_shape_fn((n, c, out_h, out_w), |(b, ch, y, x)| {
    let sy = ((y as f32 * scale_y).floor() as usize).min(in_h - 1);
    let sx = ((x as f32 * scale_x).floor() as usize).min(in_w - 1);
    tensor[[b, ch, sy, sx]]
  })
}

/// 按归一化坐标网格对图像做双线性采样
///
/// 网格取值 `[-1, 1]`，`-1` 与 `1` 分别对齐首尾像素中心；
/// 越界的邻域像素按 0 参与插值，非有限坐标输出黑色像素。
pub fn grid_sample(source: &RgbImage, grid_x: ArrayView2<f32>, grid_y: ArrayView2<f32>) -> RgbImage {
  let (out_h, out_w) = grid_x.dim();
  let (src_w, src_h) = source.dimensions();
  let max_x = src_w.saturating_sub(1) as f32;
  let max_y = src_h.saturating_sub(1) as f32;

  let fetch = |x: i64, y: i64| -> [f32; 3] {
    if x < 0 || y < 0 || x >= src_w as i64 || y >= src_h as i64 {
      return [0.0; 3];
    }
    let Rgb(p) = *source.get_pixel(x as u32, y as u32);
    [p[0] as f32, p[1] as f32, p[2] as f32]
  };

  RgbImage::from_fn(out_w as u32, out_h as u32, |x, y| {
    let gx = grid_x[[y as usize, x as usize]];
    let gy = grid_y[[y as usize, x as usize]];
    if !gx.is_finite() || !gy.is_finite() {
      return Rgb([0, 0, 0]);
    }

    let sx = (gx + 1.0) * 0.5 * max_x;
    let sy = (gy + 1.0) * 0.5 * max_y;
    let x0 = sx.floor();
    let y0 = sy.floor();
    let tx = sx - x0;
    let ty = sy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut pixel = [0u8; 3];
    for c in 0..3 {
      let top = p00[c] * (1.0 - tx) + p10[c] * tx;
      let bottom = p01[c] * (1.0 - tx) + p11[c] * tx;
      pixel[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(pixel)
  })
}
