// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/mapper.rs - 坐标映射
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

use crate::{config::ModelResolution, model::BBox};

/// 模型坐标到显示像素坐标的映射，X/Y 独立缩放后取整
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
  dx: f32,
  dy: f32,
}

impl CoordinateMapper {
  pub fn new(model: ModelResolution, display_width: u32, display_height: u32) -> Self {
    Self {
      dx: display_width as f32 / model.width() as f32,
      dy: display_height as f32 / model.height() as f32,
    }
  }

  pub fn scale(&self) -> (f32, f32) {
    (self.dx, self.dy)
  }

  pub fn map(&self, bbox: &BBox) -> BBox {
    BBox {
      x0: (bbox.x0 * self.dx).round(),
      y0: (bbox.y0 * self.dy).round(),
      x1: (bbox.x1 * self.dx).round(),
      y1: (bbox.y1 * self.dy).round(),
    }
  }
}
