// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/model.rs - 模型
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

use std::path::PathBuf;

use ndarray::Array4;
use thiserror::Error;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(PathBuf),
  #[error("模型加载错误: {path}: {source}")]
  ModelLoadError {
    path: PathBuf,
    #[source]
    source: ort::Error,
  },
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("输入形状不匹配: 模型声明 {expected}, 实际 {actual}")]
  ShapeMismatch { expected: String, actual: String },
  #[error("不支持的模型输出: {0}")]
  UnsupportedOutput(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("张量错误: {0}")]
  TensorError(#[from] ndarray::ShapeError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("推理会话锁已失效")]
  SessionPoisoned,
}

/// 模型输出，按通道数区分
#[derive(Debug, Clone, PartialEq)]
pub enum DewarpResult {
  /// `[1, 3, h, w]`，与输入同样归一化和通道顺序的图像
  Image(Array4<f32>),
  /// `[1, 2, h, w]`，通道 0/1 为原图中归一化到 `[-1, 1]` 的 x/y 坐标
  BackwardMap(Array4<f32>),
}

impl DewarpResult {
  pub fn tensor(&self) -> &Array4<f32> {
    match self {
      DewarpResult::Image(t) | DewarpResult::BackwardMap(t) => t,
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      DewarpResult::Image(_) => "image",
      DewarpResult::BackwardMap(_) => "backward-map",
    }
  }
}

impl TryFrom<Array4<f32>> for DewarpResult {
  type Error = ModelError;

  fn try_from(tensor: Array4<f32>) -> Result<Self, Self::Error> {
    let (batch, channels, _, _) = tensor.dim();
    if batch != 1 {
      return Err(ModelError::UnsupportedOutput(format!(
        "批大小必须为 1, 实际形状 {:?}",
        tensor.shape()
      )));
    }
    match channels {
      3 => Ok(DewarpResult::Image(tensor)),
      2 => Ok(DewarpResult::BackwardMap(tensor)),
      _ => Err(ModelError::UnsupportedOutput(format!(
        "期望 3 通道图像或 2 通道反向映射, 实际形状 {:?}",
        tensor.shape()
      ))),
    }
  }
}

mod dewarpnet;
mod session;

pub use self::dewarpnet::{DEWARPNET_INPUT_H, DEWARPNET_INPUT_W, DewarpNet, DewarpNetBuilder};
pub use self::session::OnnxSession;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_output_by_channels() {
    let image = DewarpResult::try_from(Array4::<f32>::zeros((1, 3, 8, 8))).unwrap();
    assert_eq!(image.kind(), "image");
    let bm = DewarpResult::try_from(Array4::<f32>::zeros((1, 2, 4, 4))).unwrap();
    assert_eq!(bm.kind(), "backward-map");
    assert_eq!(bm.tensor().shape(), &[1, 2, 4, 4]);
  }

  #[test]
  fn rejects_other_outputs() {
    assert!(matches!(
      DewarpResult::try_from(Array4::<f32>::zeros((1, 1, 4, 4))),
      Err(ModelError::UnsupportedOutput(_))
    ));
    assert!(matches!(
      DewarpResult::try_from(Array4::<f32>::zeros((2, 3, 4, 4))),
      Err(ModelError::UnsupportedOutput(_))
    ));
  }
}
