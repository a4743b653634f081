// 该文件是 Pingzhi （平纸） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod frame;
pub mod input;
pub mod model;
pub mod output;
pub mod postprocess;
pub mod preprocess;
pub mod task;
pub mod utils;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 从 URL 中取出文件路径并做百分号解码
///
/// `image:test.png` 得到相对路径 `test.png`，`image:///tmp/a.png` 得到绝对路径。
/// `image://out/a.png` 的主机部分视为首级目录，得到相对路径 `out/a.png`。
pub fn path_from_url(url: &url::Url) -> PathBuf {
  let path = decode_component(url.path());
  match url.host_str().filter(|host| !host.is_empty()) {
    Some(host) => PathBuf::from(decode_component(host)).join(path.trim_start_matches('/')),
    None => PathBuf::from(path),
  }
}

fn decode_component(raw: &str) -> String {
  match urlencoding::decode(raw) {
    Ok(decoded) => decoded.into_owned(),
    Err(_) => raw.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  #[test]
  fn relative_path_from_opaque_url() {
    let url = Url::parse("image:test.png").unwrap();
    assert_eq!(path_from_url(&url), PathBuf::from("test.png"));
  }

  #[test]
  fn absolute_path_is_percent_decoded() {
    let url = Url::parse("image:///tmp/my%20scan.png").unwrap();
    assert_eq!(path_from_url(&url), PathBuf::from("/tmp/my scan.png"));
  }

  #[test]
  fn query_is_not_part_of_path() {
    let url = Url::parse("dewarpnet:wc.onnx?bm=bm.onnx").unwrap();
    assert_eq!(path_from_url(&url), PathBuf::from("wc.onnx"));
  }

  #[test]
  fn host_is_leading_directory() {
    let url = Url::parse("image://out/result.png").unwrap();
    assert_eq!(path_from_url(&url), PathBuf::from("out/result.png"));
    let url = Url::parse("folder://records?record").unwrap();
    assert_eq!(path_from_url(&url), PathBuf::from("records"));
  }
}
