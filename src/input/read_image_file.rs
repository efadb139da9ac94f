// 该文件是 Kanjian （看见） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, url_file_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("无效的 repeat 参数: {0}")]
  InvalidRepeat(String),
}

/// 同一张图像被重复产出的次数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
  Times(u64),
  Forever,
}

/// 把一张静态图像当作帧源
pub struct ImageFileInput {
  image: RgbImage,
  remaining: Repeat,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    let mut repeat = Repeat::Times(1);
    for (key, value) in url.query_pairs() {
      if key == "repeat" {
        repeat = if value.is_empty() {
          Repeat::Forever
        } else {
          value
            .parse()
            .map(Repeat::Times)
            .map_err(|_| ImageFileInputError::InvalidRepeat(value.to_string()))?
        };
      }
    }

    Ok(Self::open(&url_file_path(url))?.with_repeat(repeat))
  }
}

impl ImageFileInput {
  pub fn open(path: &Path) -> Result<Self, ImageFileInputError> {
    info!("读取图像文件: {}", path.display());
    let image = ImageReader::open(path)?.decode()?;
    let image = image.to_rgb8();
    debug!("图像尺寸: {}x{}", image.width(), image.height());
    Ok(Self::from_image(image))
  }

  pub fn from_image(image: RgbImage) -> Self {
    Self {
      image,
      remaining: Repeat::Times(1),
    }
  }

  pub fn with_repeat(mut self, repeat: Repeat) -> Self {
    self.remaining = repeat;
    self
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self.remaining {
      Repeat::Forever => {}
      Repeat::Times(0) => return None,
      Repeat::Times(n) => self.remaining = Repeat::Times(n - 1),
    }
    Some(Frame::from(self.image.clone()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn write_image(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("input image.png");
    RgbImage::from_pixel(8, 6, Rgb([10, 20, 30])).save(&path).unwrap();
    path
  }

  fn image_url(path: &Path, query: &str) -> Url {
    let file = Url::from_file_path(path).unwrap();
    Url::parse(&format!("image://{}{}", file.path(), query)).unwrap()
  }

  #[test]
  fn yields_single_frame_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path());
    let frames: Vec<Frame> = ImageFileInput::from_url(&image_url(&path, "")).unwrap().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(&frames[0].as_bytes()[..3], &[10, 20, 30]);
  }

  #[test]
  fn repeat_count_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path());
    let input = ImageFileInput::from_url(&image_url(&path, "?repeat=3")).unwrap();
    assert_eq!(input.count(), 3);
  }

  #[test]
  fn bare_repeat_never_ends() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path());
    let input = ImageFileInput::from_url(&image_url(&path, "?repeat")).unwrap();
    assert_eq!(input.take(50).count(), 50);
  }

  #[test]
  fn invalid_repeat_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path());
    assert!(matches!(
      ImageFileInput::from_url(&image_url(&path, "?repeat=many")),
      Err(ImageFileInputError::InvalidRepeat(_))
    ));
  }

  #[test]
  fn missing_file_is_an_io_error() {
    let url = Url::parse("image:///definitely/not/here.png").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::IoError(_))
    ));
  }
}
