// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/model/dewarpnet.rs - DewarpNet 模型定义
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

use ndarray::{Array4, ArrayView4};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::AsNchwTensor,
  model::{DewarpResult, Model, ModelError, OnnxSession},
  path_from_url,
  utils::resize_nchw_nearest,
};

pub const DEWARPNET_INPUT_W: u32 = 256;
pub const DEWARPNET_INPUT_H: u32 = 256;
/// 第二阶段（反向映射）模型的默认输入尺寸 (高, 宽)
const DEWARPNET_BM_SIZE: (usize, usize) = (128, 128);

/// DewarpNet 推理
///
/// 单模型时直接以模型输出作为结果；配置了 `bm` 模型时按两阶段执行：
/// 世界坐标回归输出截断到 `[0, 1]`，最近邻缩放到 `bm` 模型输入尺寸后
/// 再求反向映射。
pub struct DewarpNet<Frame> {
  wc: OnnxSession,
  bm: Option<OnnxSession>,
  _phantom: std::marker::PhantomData<Frame>,
}

pub struct DewarpNetBuilder {
  model_path: PathBuf,
  bm_model_path: Option<PathBuf>,
  intra_threads: Option<usize>,
}

impl FromUrlWithScheme for DewarpNetBuilder {
  const SCHEME: &'static str = "dewarpnet";
}

impl FromUrl for DewarpNetBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = DewarpNetBuilder::new(path_from_url(url));
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "bm" => builder = builder.bm_model(v.into_owned()),
        "threads" => {
          let threads = v
            .parse::<usize>()
            .map_err(|e| ModelError::ModelPathError(format!("线程数无效 '{}': {}", v, e)))?;
          builder = builder.intra_threads(threads);
        }
        _ => {}
      }
    }

    Ok(builder)
  }
}

impl DewarpNetBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    DewarpNetBuilder {
      model_path: model_path.into(),
      bm_model_path: None,
      intra_threads: None,
    }
  }

  pub fn bm_model(mut self, path: impl Into<PathBuf>) -> Self {
    self.bm_model_path = Some(path.into());
    self
  }

  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = Some(threads);
    self
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn bm_model_path(&self) -> Option<&Path> {
    self.bm_model_path.as_deref()
  }

  pub fn build<Frame>(self) -> Result<DewarpNet<Frame>, ModelError> {
    // 所有模型文件都存在后才创建会话
    for path in std::iter::once(&self.model_path).chain(self.bm_model_path.iter()) {
      if !path.is_file() {
        error!("模型文件不存在: {}", path.display());
        return Err(ModelError::ModelNotFound(path.clone()));
      }
    }

    let wc = OnnxSession::load(&self.model_path, self.intra_threads)?;
    let bm = match &self.bm_model_path {
      Some(path) => Some(OnnxSession::load(path, self.intra_threads)?),
      None => None,
    };

    match wc.input_hw() {
      Some((h, w)) => debug!("模型输入尺寸: {}x{}", w, h),
      None => debug!("模型输入尺寸为动态"),
    }
    if bm.is_some() {
      info!("使用两阶段 DewarpNet (wc + bm)");
    }

    let _phantom = std::marker::PhantomData::<Frame>;
    Ok(DewarpNet { wc, bm, _phantom })
  }
}

impl<Frame> DewarpNet<Frame> {
  /// 模型声明的输入尺寸 (高, 宽)
  pub fn input_size(&self) -> Option<(usize, usize)> {
    self.wc.input_hw()
  }

  pub fn is_two_stage(&self) -> bool {
    self.bm.is_some()
  }
}

/// 第一阶段输出到第二阶段输入
fn bm_input(wc_output: &Array4<f32>, size: (usize, usize)) -> Array4<f32> {
  let clamped = wc_output.mapv(|v| v.clamp(0.0, 1.0));
  resize_nchw_nearest(clamped.view(), size.0, size.1)
}

/// 第二阶段：`declared` 为 `bm` 模型声明的输入尺寸，动态时使用默认尺寸
fn second_stage(
  wc_output: &Array4<f32>,
  declared: Option<(usize, usize)>,
  run_bm: impl FnOnce(ArrayView4<f32>) -> Result<Array4<f32>, ModelError>,
) -> Result<DewarpResult, ModelError> {
  let size = declared.unwrap_or(DEWARPNET_BM_SIZE);
  debug!("第二阶段输入尺寸: {}x{}", size.1, size.0);
  let output = run_bm(bm_input(wc_output, size).view())?;

  match DewarpResult::try_from(output)? {
    result @ DewarpResult::BackwardMap(_) => Ok(result),
    DewarpResult::Image(t) => Err(ModelError::UnsupportedOutput(format!(
      "第二阶段模型应输出反向映射, 实际形状 {:?}",
      t.shape()
    ))),
  }
}

impl<Frame: AsNchwTensor> Model for DewarpNet<Frame> {
  type Input = Frame;
  type Output = DewarpResult;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入");
    let output = self.wc.run(input.as_nchw())?;

    match &self.bm {
      Some(bm) => second_stage(&output, bm.input_hw(), |x| bm.run(x)),
      None => DewarpResult::try_from(output),
    }
  }
}
