// 该文件是 Pingzhi （平纸） 项目的一部分。
// tests/pipeline.rs - 端到端流程测试
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

use std::cell::Cell;
use std::path::Path;

use image::{Rgb, RgbImage};
use ndarray::Array4;
use pingzhi::{
  frame::DewarpFrame,
  input::{AsNchwTensor, ImageFileInput, SourceImage},
  model::{DewarpNetBuilder, DewarpResult, Model, ModelError},
  output::{Render, SaveImageFileOutput},
  preprocess::Preprocessor,
  task::{OneShotTask, RepeatShotTask, Task},
};

type Frame = DewarpFrame<32, 32>;

#[derive(Debug, thiserror::Error)]
#[error("mock failure")]
struct MockError;

/// 把输入张量原样作为图像输出
#[derive(Default)]
struct IdentityModel {
  calls: Cell<usize>,
}

impl Model for IdentityModel {
  type Input = Frame;
  type Output = DewarpResult;
  type Error = MockError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.calls.set(self.calls.get() + 1);
    Ok(DewarpResult::Image(input.as_nchw().to_owned()))
  }
}

impl Model for &IdentityModel {
  type Input = Frame;
  type Output = DewarpResult;
  type Error = MockError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

/// 输出恒等反向映射
struct IdentityMapModel;

impl Model for IdentityMapModel {
  type Input = Frame;
  type Output = DewarpResult;
  type Error = MockError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let bm = Array4::from_shape_fn((1, 2, 16, 16), |(_, c, y, x)| {
      let v = if c == 0 { x } else { y };
      -1.0 + 2.0 * v as f32 / 15.0
    });
    Ok(DewarpResult::BackwardMap(bm))
  }
}

struct FailingModel;

impl Model for FailingModel {
  type Input = Frame;
  type Output = DewarpResult;
  type Error = MockError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Err(MockError)
  }
}

/// 统计写出次数的输出
#[derive(Default)]
struct CountingOutput {
  renders: Cell<usize>,
}

impl Render<Frame, DewarpResult> for &CountingOutput {
  type Error = MockError;

  fn render_result(&self, _frame: &Frame, _result: &DewarpResult) -> Result<(), Self::Error> {
    self.renders.set(self.renders.get() + 1);
    Ok(())
  }
}

fn page(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    if (x / 8 + y / 8) % 2 == 0 {
      Rgb([250, 248, 240])
    } else {
      Rgb([20, 20, 30])
    }
  })
}

fn write_input(dir: &Path, image: &RgbImage) -> std::path::PathBuf {
  let path = dir.join("input.png");
  image.save(&path).unwrap();
  path
}

fn frames(path: &Path) -> impl Iterator<Item = Frame> {
  ImageFileInput::<32, 32>::open(path, Preprocessor::default())
    .unwrap()
    .into_nchw()
    .unwrap()
}

#[test]
fn output_dimensions_match_input() {
  let dir = tempfile::tempdir().unwrap();
  let input = write_input(dir.path(), &page(123, 77));
  let output_path = dir.path().join("output.png");

  OneShotTask
    .run_task(
      frames(&input),
      IdentityModel::default(),
      SaveImageFileOutput::new(&output_path),
    )
    .unwrap();

  let saved = image::open(&output_path).unwrap();
  assert_eq!((saved.width(), saved.height()), (123, 77));
}

#[test]
fn repeated_runs_write_identical_bytes() {
  let dir = tempfile::tempdir().unwrap();
  let input = write_input(dir.path(), &page(64, 40));
  let first = dir.path().join("first.png");
  let second = dir.path().join("second.png");

  for path in [&first, &second] {
    OneShotTask
      .run_task(
        frames(&input),
        IdentityModel::default(),
        SaveImageFileOutput::new(path),
      )
      .unwrap();
  }

  assert_eq!(
    std::fs::read(&first).unwrap(),
    std::fs::read(&second).unwrap()
  );
}

#[test]
fn uniform_page_is_preserved() {
  let dir = tempfile::tempdir().unwrap();
  let blank = RgbImage::from_pixel(50, 90, Rgb([255, 255, 255]));
  let input = write_input(dir.path(), &blank);
  let output_path = dir.path().join("blank.png");

  OneShotTask
    .run_task(
      frames(&input),
      IdentityModel::default(),
      SaveImageFileOutput::new(&output_path),
    )
    .unwrap();

  assert_eq!(image::open(&output_path).unwrap().to_rgb8(), blank);
}

#[test]
fn backward_map_output_keeps_source_size() {
  let dir = tempfile::tempdir().unwrap();
  let input = write_input(dir.path(), &page(45, 60));
  let output_path = dir.path().join("unwarped.png");

  OneShotTask
    .run_task(
      frames(&input),
      IdentityMapModel,
      SaveImageFileOutput::new(&output_path),
    )
    .unwrap();

  let saved = image::open(&output_path).unwrap();
  assert_eq!((saved.width(), saved.height()), (45, 60));
}

#[test]
fn malformed_input_fails_before_inference() {
  let dir = tempfile::tempdir().unwrap();
  let input = dir.path().join("input.jpg");
  std::fs::write(&input, [0xFF, 0xD8, 0xFF, 0xE0, 0x00]).unwrap();

  assert!(ImageFileInput::<32, 32>::open(&input, Preprocessor::default()).is_err());
  assert!(!dir.path().join("output.png").exists());
}

#[test]
fn missing_input_fails() {
  let dir = tempfile::tempdir().unwrap();
  assert!(ImageFileInput::<32, 32>::open(dir.path().join("test.png"), Preprocessor::default()).is_err());
}

#[test]
fn missing_model_fails_at_load() {
  let dir = tempfile::tempdir().unwrap();
  let result = DewarpNetBuilder::new(dir.path().join("dewarpnet.onnx")).build::<Frame>();
  assert!(matches!(result, Err(ModelError::ModelNotFound(_))));
}

#[test]
fn failed_inference_writes_no_output() {
  let dir = tempfile::tempdir().unwrap();
  let input = write_input(dir.path(), &page(20, 20));
  let output_path = dir.path().join("output.png");

  let result = OneShotTask.run_task(
    frames(&input),
    FailingModel,
    SaveImageFileOutput::new(&output_path),
  );

  assert!(result.is_err());
  assert!(!output_path.exists());
}

#[test]
fn benchmark_infers_repeatedly_and_renders_once() {
  let dir = tempfile::tempdir().unwrap();
  let input = write_input(dir.path(), &page(16, 16));
  let model = IdentityModel::default();
  let output = CountingOutput::default();

  RepeatShotTask::default()
    .with_repeat(4)
    .run_task(frames(&input), &model, &output)
    .unwrap();

  assert_eq!(model.calls.get(), 4);
  assert_eq!(output.renders.get(), 1);
}

#[test]
fn empty_input_is_an_error() {
  let output = CountingOutput::default();
  let result = OneShotTask.run_task(std::iter::empty::<Frame>(), IdentityModel::default(), &output);
  assert!(result.is_err());
  assert_eq!(output.renders.get(), 0);
}

#[test]
fn frame_keeps_decoded_source() {
  let dir = tempfile::tempdir().unwrap();
  let image = page(30, 10);
  let input = write_input(dir.path(), &image);
  let frame = frames(&input).next().unwrap();
  assert_eq!(frame.source_image(), &image);
}
