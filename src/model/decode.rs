// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/decode.rs - 输出张量解码
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

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  frame::Tensor,
  model::{BBox, percent_one_decimal},
};

/// 每条记录: x0, y0, x1, y1, score, class_id
pub const RECORD_LEN: usize = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("输出张量末尾存在不完整记录: 总长度 {len}, 丢弃 {trailing} 个值")]
pub struct MalformedOutputError {
  pub len: usize,
  pub trailing: usize,
}

/// 模型坐标下、尚未经过 NMS 的候选
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub bbox: BBox,
  pub score: f32,
  pub class_id: i64,
}

impl Candidate {
  pub fn confidence_percent(&self) -> f32 {
    percent_one_decimal(self.score)
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
  pub candidates: Vec<Candidate>,
  /// 末尾不完整的记录，已被丢弃
  pub malformed: Option<MalformedOutputError>,
}

// 非有限值或负数映射为 -1，交给标签表的回退处理
fn class_id_from(value: f32) -> i64 {
  if value.is_finite() && value >= 0.0 {
    value.round() as i64
  } else {
    -1
  }
}

/// 将扁平输出按 6 个一组解码为候选，低于阈值的直接丢弃
pub fn decode(output: &Tensor, confidence_threshold: f32) -> Decoded {
  let data = output.data();
  let records = data.chunks_exact(RECORD_LEN);
  let trailing = records.remainder().len();

  let malformed = if trailing > 0 {
    let err = MalformedOutputError {
      len: data.len(),
      trailing,
    };
    warn!("{}", err);
    Some(err)
  } else {
    None
  };

  let candidates: Vec<Candidate> = records
    .filter_map(|record| {
      let score = record[4];
      // NaN 同样被丢弃
      if !(score >= confidence_threshold) {
        return None;
      }
      Some(Candidate {
        bbox: BBox::new(record[0], record[1], record[2], record[3]),
        score,
        class_id: class_id_from(record[5]),
      })
    })
    .collect();

  debug!(
    "解码 {} 条记录, {} 个候选超过阈值 {}",
    data.len() / RECORD_LEN,
    candidates.len(),
    confidence_threshold
  );

  Decoded {
    candidates,
    malformed,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(score: f32, class_id: f32) -> [f32; 6] {
    [10.0, 20.0, 30.0, 40.0, score, class_id]
  }

  fn tensor_of(records: &[[f32; 6]], tail: &[f32]) -> Tensor {
    let mut data: Vec<f32> = records.iter().flatten().copied().collect();
    data.extend_from_slice(tail);
    Tensor::from_flat("output0", data)
  }

  #[test]
  fn keeps_records_at_or_above_threshold() {
    let output = tensor_of(
      &[record(0.9, 0.0), record(0.3, 1.0), record(0.6, 2.0), record(0.5, 3.0)],
      &[],
    );
    let decoded = decode(&output, 0.5);
    assert_eq!(decoded.candidates.len(), 3);
    assert!(decoded.malformed.is_none());
    let classes: Vec<i64> = decoded.candidates.iter().map(|c| c.class_id).collect();
    assert_eq!(classes, vec![0, 2, 3]);
  }

  #[test]
  fn drops_score_just_below_threshold() {
    let decoded = decode(&tensor_of(&[record(0.49, 0.0)], &[]), 0.5);
    assert!(decoded.candidates.is_empty());
  }

  #[test]
  fn trailing_partial_record_is_ignored() {
    let output = tensor_of(&[record(0.9, 0.0), record(0.8, 1.0)], &[1.0, 2.0, 3.0]);
    let decoded = decode(&output, 0.5);
    assert_eq!(decoded.candidates.len(), 2);
    assert_eq!(
      decoded.malformed,
      Some(MalformedOutputError {
        len: 15,
        trailing: 3
      })
    );
  }

  #[test]
  fn raw_score_precision_is_retained() {
    let decoded = decode(&tensor_of(&[record(0.87654, 4.0)], &[]), 0.5);
    let candidate = &decoded.candidates[0];
    assert_eq!(candidate.score, 0.87654);
    assert_eq!(candidate.confidence_percent(), 87.7);
    assert_eq!(candidate.bbox, BBox::new(10.0, 20.0, 30.0, 40.0));
  }

  #[test]
  fn odd_class_values_do_not_panic() {
    let output = tensor_of(
      &[record(0.9, f32::NAN), record(0.9, -3.0), record(0.9, 2.4), record(f32::NAN, 1.0)],
      &[],
    );
    let decoded = decode(&output, 0.5);
    let classes: Vec<i64> = decoded.candidates.iter().map(|c| c.class_id).collect();
    assert_eq!(classes, vec![-1, -1, 2]);
  }

  #[test]
  fn empty_output_has_no_candidates() {
    let decoded = decode(&Tensor::from_flat("output0", vec![]), 0.5);
    assert_eq!(decoded, Decoded::default());
  }
}
