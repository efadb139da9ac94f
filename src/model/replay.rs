// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/replay.rs - 回放推理引擎
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Tensor,
  model::InferenceEngine,
  url_file_path,
};

pub const OUTPUT_TENSOR_NAME: &str = "output0";

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("没有可回放的输出")]
  Empty,
  #[error("输入张量形状无效: {0:?}")]
  InvalidInput(Vec<usize>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Recording {
  Single(Vec<f32>),
  Sequence(Vec<Vec<f32>>),
}

/// 依次回放预先录制的模型输出，忽略输入内容
///
/// 录制文件为 JSON：一个扁平数组，或多个扁平数组组成的数组（逐次循环）。
#[derive(Debug)]
pub struct ReplayEngine {
  outputs: Vec<Vec<f32>>,
  cursor: Cell<usize>,
}

impl FromUrlWithScheme for ReplayEngine {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayEngine {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    let path = url_file_path(url);
    info!("加载回放文件: {}", path.display());
    let content = std::fs::read_to_string(&path)?;
    Self::from_json(&content)
  }
}

impl ReplayEngine {
  pub fn new(output: Vec<f32>) -> Self {
    Self::sequence(vec![output])
  }

  pub fn sequence(outputs: Vec<Vec<f32>>) -> Self {
    Self {
      outputs,
      cursor: Cell::new(0),
    }
  }

  pub fn from_json(content: &str) -> Result<Self, ReplayError> {
    let outputs = match serde_json::from_str::<Recording>(content)? {
      Recording::Single(output) => vec![output],
      Recording::Sequence(outputs) => outputs,
    };
    if outputs.is_empty() {
      return Err(ReplayError::Empty);
    }
    debug!("回放输出数量: {}", outputs.len());
    Ok(Self::sequence(outputs))
  }
}

impl InferenceEngine for ReplayEngine {
  type Error = ReplayError;

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    if input.shape().len() != 4 || input.shape()[1] != 3 {
      return Err(ReplayError::InvalidInput(input.shape().to_vec()));
    }
    if self.outputs.is_empty() {
      return Err(ReplayError::Empty);
    }

    let idx = self.cursor.get();
    self.cursor.set((idx + 1) % self.outputs.len());
    Ok(Tensor::from_flat(OUTPUT_TENSOR_NAME, self.outputs[idx].clone()))
  }
}
