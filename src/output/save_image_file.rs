// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::ImageCanvas,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("背景帧无效: {0}x{1}")]
  InvalidBackdrop(u32, u32),
}

pub struct SaveImageFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(Self::new(url_file_path(uri)))
  }
}

// JPEG 不支持 alpha 通道
fn is_jpeg(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
    .unwrap_or(false)
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&self, image: RgbaImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let image = DynamicImage::ImageRgba8(image);
    if is_jpeg(&self.path) {
      image.to_rgb8().save(&self.path)?;
    } else {
      image.save(&self.path)?;
    }

    warn!("保存图像到文件: {}", self.path.display());

    Ok(())
  }

  /// 只保存透明叠加层
  pub fn save(&self, canvas: &ImageCanvas) -> Result<(), SaveImageFileError> {
    self.save_image(canvas.image().clone())
  }

  /// 保存叠加层与背景帧的合成图
  pub fn save_composite(&self, canvas: &ImageCanvas, backdrop: &Frame) -> Result<(), SaveImageFileError> {
    let image = canvas
      .composite_over(backdrop)
      .ok_or(SaveImageFileError::InvalidBackdrop(backdrop.width(), backdrop.height()))?;
    self.save_image(image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::PixelLayout,
    output::{Surface, TextAlign},
  };
  use image::Rgba;

  #[test]
  fn saves_overlay_with_alpha() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/overlay.png");
    let mut canvas = ImageCanvas::new(8, 8);
    canvas.fill_circle(4.0, 4.0, 2.0, Rgba([255, 0, 0, 255]));
    canvas.fill_text("x", 0.0, 0.0, 10.0, TextAlign::Left, Rgba([255, 255, 255, 255]));

    SaveImageFileOutput::new(&path).save(&canvas).unwrap();
    let saved = image::open(&path).unwrap().to_rgba8();
    assert_eq!(saved.get_pixel(4, 4)[0], 255);
    assert_eq!(saved.get_pixel(0, 7)[3], 0);
  }

  #[test]
  fn saves_composite_as_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("composite.jpg");
    let canvas = ImageCanvas::new(4, 4);
    let backdrop = Frame::new(4, 4, PixelLayout::Rgb, vec![128; 48]).unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    output.save_composite(&canvas, &backdrop).unwrap();
    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (4, 4));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("rtsp://localhost/out").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
