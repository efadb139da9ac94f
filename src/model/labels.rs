// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/labels.rs - 类别标签与颜色表
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

use std::path::Path;

use image::Rgba;
use thiserror::Error;
use tracing::info;

pub const FALLBACK_LABEL: &str = "Unknown";
pub const FALLBACK_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// COCO 数据集类别名称
const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

// 参考界面使用的十色调色板
const REFERENCE_PALETTE: [[u8; 3]; 10] = [
  [128, 0, 128],   // 紫
  [0, 0, 255],     // 蓝
  [255, 255, 0],   // 黄
  [255, 0, 0],     // 红
  [0, 255, 0],     // 青柠
  [255, 192, 203], // 粉
  [0, 128, 0],     // 绿，与 7 号的青色区分
  [0, 255, 255],   // 青
  [255, 0, 255],   // 品红
  [0, 0, 0],       // 黑
];

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("标签文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件为空: {0}")]
  Empty(String),
}

/// 首字母大写，其余保持不变
pub fn capitalize(name: &str) -> String {
  let mut chars = name.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// 按 class_id 索引的固定类别表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  names: Vec<String>,
}

impl LabelTable {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  pub fn coco() -> Self {
    Self::new(COCO_CLASSES)
  }

  /// 每行一个类别名称，忽略空行
  pub fn from_file(path: &Path) -> Result<Self, LabelError> {
    let content = std::fs::read_to_string(path)?;
    let table = Self::new(
      content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty()),
    );
    if table.is_empty() {
      return Err(LabelError::Empty(path.display().to_string()));
    }
    info!("从 {} 加载 {} 个类别", path.display(), table.len());
    Ok(table)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  /// 原始类别名称，越界时为 `None`
  pub fn name(&self, class_id: i64) -> Option<&str> {
    usize::try_from(class_id)
      .ok()
      .and_then(|idx| self.names.get(idx))
      .map(String::as_str)
  }

  /// 显示用标签，永远非空
  pub fn label(&self, class_id: i64) -> String {
    match self.name(class_id).map(capitalize) {
      Some(label) if !label.is_empty() => label,
      _ => FALLBACK_LABEL.to_string(),
    }
  }
}

impl Default for LabelTable {
  fn default() -> Self {
    Self::coco()
  }
}

/// class_id 到显示颜色的全函数映射
#[derive(Debug, Clone, PartialEq)]
pub struct ClassColorMap {
  colors: Vec<Rgba<u8>>,
  fallback: Rgba<u8>,
}

impl ClassColorMap {
  pub fn new(colors: Vec<Rgba<u8>>, fallback: Rgba<u8>) -> Self {
    Self { colors, fallback }
  }

  /// 在色相环上均匀取 n 种颜色
  pub fn hue_wheel(n: usize) -> Self {
    let colors = (0..n)
      .map(|i| {
        let hue = (i as f32 / n as f32) * 360.0;
        hsv_to_rgba(hue, 0.8, 0.9)
      })
      .collect();
    Self::new(colors, FALLBACK_COLOR)
  }

  pub fn color(&self, class_id: i64) -> Rgba<u8> {
    usize::try_from(class_id)
      .ok()
      .and_then(|idx| self.colors.get(idx))
      .copied()
      .unwrap_or(self.fallback)
  }
}

impl Default for ClassColorMap {
  fn default() -> Self {
    let colors = REFERENCE_PALETTE
      .iter()
      .map(|&[r, g, b]| Rgba([r, g, b, 255]))
      .collect();
    Self::new(colors, FALLBACK_COLOR)
  }
}

fn hsv_to_rgba(h: f32, s: f32, v: f32) -> Rgba<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgba([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
    255,
  ])
}
