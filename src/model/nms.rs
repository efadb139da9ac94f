// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use tracing::{debug, warn};

use crate::model::BBox;

/// 计算两个边界框的 IoU，分母为 0 时返回 0
pub fn iou(a: &BBox, b: &BBox) -> f32 {
  let x0 = a.x0.max(b.x0);
  let y0 = a.y0.max(b.y0);
  let x1 = a.x1.min(b.x1);
  let y1 = a.y1.min(b.y1);

  let intersection = (x1 - x0).max(0.0) * (y1 - y0).max(0.0);
  let union = a.area() + b.area() - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 贪心 NMS，返回保留下来的原始下标
///
/// 按分数降序处理，分数相同时下标小者优先。返回顺序即排序后的顺序。
/// `boxes` 与 `scores` 按下标一一对应，调用方应通过下标取回类别与分数。
pub fn non_max_suppression(boxes: &[BBox], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
  if boxes.len() != scores.len() {
    warn!(
      "边界框数量 {} 与分数数量 {} 不一致, 仅处理前 {} 个",
      boxes.len(),
      scores.len(),
      boxes.len().min(scores.len())
    );
  }
  let n = boxes.len().min(scores.len());

  let mut order: Vec<usize> = (0..n).collect();
  // sort_by 是稳定排序
  order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  let mut suppressed = vec![false; n];
  for (pos, &i) in order.iter().enumerate() {
    if suppressed[i] {
      continue;
    }
    for &j in &order[pos + 1..] {
      if !suppressed[j] && iou(&boxes[i], &boxes[j]) > iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  let keep: Vec<usize> = order.into_iter().filter(|&i| !suppressed[i]).collect();
  debug!("NMS: {} 个候选, 保留 {} 个", n, keep.len());
  keep
}
