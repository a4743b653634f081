// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/model/session.rs - ONNX Runtime 推理会话
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

use std::{
  path::{Path, PathBuf},
  sync::Mutex,
};

use ndarray::{Array4, ArrayView4};
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::{TensorRef, ValueType},
};
use tracing::{debug, error, info};

use crate::model::ModelError;

/// 单输入单输出的 ONNX 模型会话
///
/// 记录模型声明的输入形状，推理前先校验，形状不符时不调用运行时。
pub struct OnnxSession {
  // Session::run 需要 &mut
  session: Mutex<Session>,
  path: PathBuf,
  input_name: String,
  input_shape: Vec<Option<usize>>,
  output_name: String,
}

fn build_session(path: &Path, intra_threads: Option<usize>) -> ort::Result<Session> {
  let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
  if let Some(threads) = intra_threads {
    builder = builder.with_intra_threads(threads)?;
  }
  builder.commit_from_file(path)
}

impl OnnxSession {
  pub fn load(path: &Path, intra_threads: Option<usize>) -> Result<Self, ModelError> {
    if !path.is_file() {
      error!("模型文件不存在: {}", path.display());
      return Err(ModelError::ModelNotFound(path.to_path_buf()));
    }

    info!("加载模型文件: {}", path.display());
    let size = std::fs::metadata(path)?.len();
    debug!("模型文件大小: {:.2} MB", size as f64 / (1024.0 * 1024.0));

    info!("创建 ONNX Runtime 推理会话");
    let session =
      build_session(path, intra_threads).map_err(|source| ModelError::ModelLoadError {
        path: path.to_path_buf(),
        source,
      })?;

    if session.inputs.len() != 1 {
      return Err(ModelError::ModelInvalid(format!(
        "预期模型输入数量为 1, 实际为 {}",
        session.inputs.len()
      )));
    }
    let output_name = match session.outputs.first() {
      Some(output) => output.name.clone(),
      None => return Err(ModelError::ModelInvalid("模型没有输出".to_string())),
    };

    let input = &session.inputs[0];
    let input_name = input.name.clone();
    let input_shape: Vec<Option<usize>> = match &input.input_type {
      ValueType::Tensor { shape, .. } => shape
        .iter()
        .map(|&d| usize::try_from(d).ok().filter(|&d| d > 0))
        .collect(),
      other => {
        return Err(ModelError::ModelInvalid(format!(
          "模型输入 '{}' 不是张量: {:?}",
          input_name, other
        )));
      }
    };

    debug!(
      "模型输入: '{}' {}",
      input_name,
      format_dims(&input_shape)
    );
    for (i, output) in session.outputs.iter().enumerate() {
      debug!("模型输出[{}]: '{}'", i, output.name);
    }
    info!("模型加载完成");

    Ok(OnnxSession {
      session: Mutex::new(session),
      path: path.to_path_buf(),
      input_name,
      input_shape,
      output_name,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn input_shape(&self) -> &[Option<usize>] {
    &self.input_shape
  }

  /// 声明的输入空间尺寸 (高, 宽)，动态维度时为 None
  pub fn input_hw(&self) -> Option<(usize, usize)> {
    match self.input_shape.as_slice() {
      [_, _, Some(h), Some(w)] => Some((*h, *w)),
      _ => None,
    }
  }

  pub fn run(&self, input: ArrayView4<f32>) -> Result<Array4<f32>, ModelError> {
    check_shape(&self.input_shape, input.shape())?;

    let tensor = TensorRef::from_array_view(input)?;
    let mut session = self.session.lock().map_err(|_| ModelError::SessionPoisoned)?;

    debug!("执行模型推理: {}", self.path.display());
    let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;
    let (shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;

    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    let array = match dims.as_slice() {
      &[n, c, h, w] => ArrayView4::from_shape((n, c, h, w), data)?.to_owned(),
      _ => {
        return Err(ModelError::UnsupportedOutput(format!(
          "期望 4 维输出, 实际形状 {:?}",
          dims
        )));
      }
    };
    debug!("模型输出形状: {:?}", array.shape());

    Ok(array)
  }
}

/// 按模型声明的形状校验实际张量，动态维度匹配任意长度
pub fn check_shape(declared: &[Option<usize>], actual: &[usize]) -> Result<(), ModelError> {
  let matches = declared.len() == actual.len()
    && declared
      .iter()
      .zip(actual)
      .all(|(d, a)| d.is_none_or(|d| d == *a));

  if matches {
    Ok(())
  } else {
    error!(
      "输入形状不匹配: 模型声明 {}, 实际 {:?}",
      format_dims(declared),
      actual
    );
    Err(ModelError::ShapeMismatch {
      expected: format_dims(declared),
      actual: format!("{:?}", actual),
    })
  }
}

/// `[1, 3, ?, ?]` 形式的形状描述
pub fn format_dims(dims: &[Option<usize>]) -> String {
  let parts: Vec<String> = dims
    .iter()
    .map(|d| d.map_or_else(|| "?".to_string(), |d| d.to_string()))
    .collect();
  format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_matching_and_dynamic_dims() {
    let declared = [Some(1), Some(3), Some(256), Some(256)];
    assert!(check_shape(&declared, &[1, 3, 256, 256]).is_ok());
    let dynamic = [None, Some(3), None, None];
    assert!(check_shape(&dynamic, &[1, 3, 17, 99]).is_ok());
  }

  #[test]
  fn rejects_mismatched_shape() {
    let declared = [Some(1), Some(3), Some(256), Some(256)];
    let err = check_shape(&declared, &[1, 3, 128, 128]).unwrap_err();
    match err {
      ModelError::ShapeMismatch { expected, actual } => {
        assert_eq!(expected, "[1, 3, 256, 256]");
        assert_eq!(actual, "[1, 3, 128, 128]");
      }
      other => panic!("unexpected error: {other}"),
    }
    assert!(check_shape(&declared, &[3, 256, 256]).is_err());
  }

  #[test]
  fn formats_dynamic_dims() {
    assert_eq!(format_dims(&[None, Some(2), None]), "[?, 2, ?]");
  }

  #[test]
  fn missing_model_fails_before_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.onnx");
    assert!(matches!(
      OnnxSession::load(&path, None),
      Err(ModelError::ModelNotFound(p)) if p == path
    ));
  }
}
