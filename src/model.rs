// 该文件是 Kanjian （看见） 项目的一部分。
// src/model.rs - 模型与检测后处理
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

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Tensor};

/// 外部推理引擎：张量进，张量出
///
/// 调用在返回前阻塞，周期内不会与下一帧的采集重叠。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error>;
}

/// 轴对齐边界框 `[x0, y0, x1, y1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
  pub x0: f32,
  pub y0: f32,
  pub x1: f32,
  pub y1: f32,
}

impl BBox {
  pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
    Self { x0, y0, x1, y1 }
  }

  pub fn width(&self) -> f32 {
    (self.x1 - self.x0).max(0.0)
  }

  pub fn height(&self) -> f32 {
    (self.y1 - self.y0).max(0.0)
  }

  /// 反向或退化的框面积为 0
  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  pub fn center(&self) -> (f32, f32) {
    ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
  }
}

impl From<[f32; 4]> for BBox {
  fn from([x0, y0, x1, y1]: [f32; 4]) -> Self {
    Self { x0, y0, x1, y1 }
  }
}

/// 显示坐标下的一个检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub bbox: BBox,
  pub class_id: i64,
  pub score: f32,
}

impl Detection {
  /// 百分比形式的置信度，保留一位小数
  pub fn confidence_percent(&self) -> f32 {
    percent_one_decimal(self.score)
  }
}

pub(crate) fn percent_one_decimal(score: f32) -> f32 {
  (score * 1000.0).round() / 10.0
}

mod decode;
mod labels;
mod mapper;
mod nms;
mod preprocess;
mod replay;
#[cfg(feature = "rknn_engine")]
mod rknn;

pub use self::decode::{Candidate, Decoded, MalformedOutputError, RECORD_LEN, decode};
pub use self::labels::{ClassColorMap, FALLBACK_COLOR, FALLBACK_LABEL, LabelError, LabelTable, capitalize};
pub use self::mapper::CoordinateMapper;
pub use self::nms::{iou, non_max_suppression};
pub use self::preprocess::{INPUT_TENSOR_NAME, Preprocessor};
pub use self::replay::{ReplayEngine, ReplayError};
#[cfg(feature = "rknn_engine")]
pub use self::rknn::{RknnEngine, RknnEngineError};

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("回放引擎错误: {0}")]
  ReplayError(#[from] ReplayError),
  #[cfg(feature = "rknn_engine")]
  #[error("RKNN 引擎错误: {0}")]
  RknnEngineError(#[from] RknnEngineError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案选择的推理引擎
pub enum EngineWrapper {
  Replay(ReplayEngine),
  #[cfg(feature = "rknn_engine")]
  Rknn(RknnEngine),
}

impl FromUrl for EngineWrapper {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() == ReplayEngine::SCHEME {
      return Ok(EngineWrapper::Replay(ReplayEngine::from_url(url)?));
    }
    #[cfg(feature = "rknn_engine")]
    {
      if url.scheme() == RknnEngine::SCHEME {
        return Ok(EngineWrapper::Rknn(RknnEngine::from_url(url)?));
      }
    }
    Err(EngineError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl InferenceEngine for EngineWrapper {
  type Error = EngineError;

  fn infer(&self, input: &Tensor) -> Result<Tensor, Self::Error> {
    match self {
      EngineWrapper::Replay(engine) => engine.infer(input).map_err(EngineError::from),
      #[cfg(feature = "rknn_engine")]
      EngineWrapper::Rknn(engine) => engine.infer(input).map_err(EngineError::from),
    }
  }
}
