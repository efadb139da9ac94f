// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/rknn.rs - RKNN NPU 推理引擎
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

use rknpu::{Context, InitFlags, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Tensor,
  model::{InferenceEngine, replay::OUTPUT_TENSOR_NAME},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum RknnEngineError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(String),
  #[error("输入张量形状无效: {0:?}")]
  InvalidInput(Vec<usize>),
}

fn rknn_error(e: rknpu::Error) -> RknnEngineError {
  RknnEngineError::RknnError(e.to_string())
}

/// 在 RKNN NPU 上运行的单输入单输出检测模型
///
/// 模型需要把后处理固化在图中，输出为扁平的 `[x0, y0, x1, y1, score, class]` 记录。
pub struct RknnEngine {
  context: Context,
}

impl FromUrlWithScheme for RknnEngine {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnEngine {
  type Error = RknnEngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(RknnEngineError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    let path = url_file_path(url);
    info!("加载模型文件: {}", path.display());
    let model_data = std::fs::read(&path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, InitFlags::default()).map_err(rknn_error)?;
    info!("模型加载完成");

    Ok(RknnEngine { context })
  }
}

/// 将归一化的平面浮点张量还原为 NCHW u8
fn to_nchw_u8(input: &Tensor) -> Vec<u8> {
  input
    .data()
    .iter()
    .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
    .collect()
}

impl InferenceEngine for RknnEngine {
  type Error = RknnEngineError;

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    if input.shape().len() != 4 || input.shape()[1] != 3 {
      return Err(RknnEngineError::InvalidInput(input.shape().to_vec()));
    }

    debug!("设置模型输入");
    let bytes = to_nchw_u8(input);
    self
      .context
      .set_input(0, &bytes, rknpu::TensorFormat::NCHW, TensorType::UInt8)
      .map_err(rknn_error)?;

    debug!("执行模型推理");
    self.context.run().map_err(rknn_error)?;

    debug!("获取模型输出");
    let outputs = self.context.get_outputs().map_err(rknn_error)?;
    let data = outputs
      .get_f32(0)
      .map_err(|e| RknnEngineError::RknnError(e.to_string()))?
      .to_vec();
    debug!("模型输出长度: {}", data.len());

    Ok(Tensor::from_flat(OUTPUT_TENSOR_NAME, data))
  }
}
