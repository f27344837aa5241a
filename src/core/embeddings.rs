use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::core::similarity::l2_normalize;
use crate::error::{AppError, Result};

/// Input resolution expected by the ResNet family
pub const INPUT_SIZE: u32 = 224;

/// ImageNet per-channel mean (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Turns images into fixed-length feature vectors.
///
/// Implementors provide the raw features; [`Embedder::embed`] normalizes them
/// so catalog and query vectors live in the same unit-norm space.
pub trait Embedder: Send + Sync {
    /// Raw feature vector for `img`, before normalization.
    fn extract(&self, img: &DynamicImage) -> Result<Array1<f32>>;

    /// Length of the vectors this embedder produces.
    fn dimension(&self) -> usize;

    /// L2-normalized embedding for `img`.
    fn embed(&self, img: &DynamicImage) -> Result<Array1<f32>> {
        let features = self.extract(img)?;
        if features.len() != self.dimension() {
            return Err(AppError::Model(format!(
                "extractor produced {} features, expected {}",
                features.len(),
                self.dimension()
            )));
        }
        Ok(l2_normalize(features.view()))
    }
}

/// Supported feature extractor backbones
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// ResNet-18, 512 features
    #[default]
    Resnet18,
    /// ResNet-34, 512 features
    Resnet34,
    /// ResNet-50, 2048 features
    Resnet50,
}

impl Architecture {
    /// Length of the pooled feature vector
    pub fn feature_dim(self) -> usize {
        match self {
            Self::Resnet18 | Self::Resnet34 => 512,
            Self::Resnet50 => 2048,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resnet18 => "resnet18",
            Self::Resnet34 => "resnet34",
            Self::Resnet50 => "resnet50",
        };
        f.write_str(name)
    }
}

impl FromStr for Architecture {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resnet18" => Ok(Self::Resnet18),
            "resnet34" => Ok(Self::Resnet34),
            "resnet50" => Ok(Self::Resnet50),
            other => Err(AppError::Config(format!("unknown architecture '{}'", other))),
        }
    }
}

/// Resize and normalize an image into a CHW float buffer.
///
/// The image is resized to `size`x`size`, scaled to `[0, 1]` and normalized
/// per channel with the ImageNet statistics.
pub fn preprocess_image(img: &DynamicImage, size: u32) -> Vec<f32> {
    let resized = img.resize_exact(size, size, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();
    let plane = (size * size) as usize;

    let mut data = vec![0.0f32; 3 * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            data[c * plane + i] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    data
}

#[cfg(feature = "embeddings")]
pub use self::resnet::ResNetEmbedder;

#[cfg(feature = "embeddings")]
mod resnet {
    use std::path::Path;
    use std::sync::Mutex;

    use image::DynamicImage;
    use ndarray::Array1;
    use tch::nn::{self, FuncT, ModuleT};
    use tch::{vision, Device, Kind, Tensor};

    use super::{preprocess_image, Architecture, Embedder, INPUT_SIZE};
    use crate::error::{AppError, Result};

    /// Pretrained ResNet with its classification head removed
    pub struct ResNetEmbedder {
        model: Mutex<FuncT<'static>>,
        _vs: nn::VarStore,
        device: Device,
        arch: Architecture,
    }

    impl std::fmt::Debug for ResNetEmbedder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ResNetEmbedder")
                .field("arch", &self.arch)
                .field("device", &self.device)
                .finish()
        }
    }

    impl ResNetEmbedder {
        /// Build the network and load pretrained weights from a `.ot` file
        pub fn load<P: AsRef<Path>>(arch: Architecture, weights: P) -> Result<Self> {
            let weights = weights.as_ref();
            if !weights.exists() {
                return Err(AppError::Model(format!(
                    "weights file not found: {}",
                    weights.display()
                )));
            }

            let device = Device::cuda_if_available();
            let mut vs = nn::VarStore::new(device);
            let root = vs.root();
            let model = match arch {
                Architecture::Resnet18 => vision::resnet::resnet18_no_final_layer(&root),
                Architecture::Resnet34 => vision::resnet::resnet34_no_final_layer(&root),
                Architecture::Resnet50 => vision::resnet::resnet50_no_final_layer(&root),
            };
            vs.load(weights)?;

            log::info!(
                "Loaded {} feature extractor from {} on {:?}",
                arch,
                weights.display(),
                device
            );

            Ok(Self {
                model: Mutex::new(model),
                _vs: vs,
                device,
                arch,
            })
        }

        /// Backbone in use
        pub fn architecture(&self) -> Architecture {
            self.arch
        }
    }

    impl Embedder for ResNetEmbedder {
        fn extract(&self, img: &DynamicImage) -> Result<Array1<f32>> {
            let size = INPUT_SIZE as i64;
            let data = preprocess_image(img, INPUT_SIZE);
            let input = Tensor::of_slice(&data)
                .view([1, 3, size, size])
                .to_kind(Kind::Float)
                .to_device(self.device);

            let model = self
                .model
                .lock()
                .map_err(|_| AppError::Internal("feature extractor lock poisoned".to_string()))?;
            let output = tch::no_grad(|| model.forward_t(&input, false));
            drop(model);

            let flat = output.to_device(Device::Cpu).to_kind(Kind::Float).view([-1]);
            let features = Vec::<f32>::try_from(&flat)?;
            Ok(Array1::from(features))
        }

        fn dimension(&self) -> usize {
            self.arch.feature_dim()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    struct FixedEmbedder(Vec<f32>);

    impl Embedder for FixedEmbedder {
        fn extract(&self, _img: &DynamicImage) -> Result<Array1<f32>> {
            Ok(Array1::from(self.0.clone()))
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }
    }

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let mut imgbuf = RgbImage::new(width, height);
        for (x, y, pixel) in imgbuf.enumerate_pixels_mut() {
            *pixel = image::Rgb([
                (x as f32 * 255.0 / width as f32) as u8,
                (y as f32 * 255.0 / height as f32) as u8,
                128,
            ]);
        }
        DynamicImage::ImageRgb8(imgbuf)
    }

    #[test]
    fn test_preprocess_shape() {
        let data = preprocess_image(&gradient_image(2, 2), INPUT_SIZE);
        assert_eq!(data.len(), 3 * (INPUT_SIZE * INPUT_SIZE) as usize);
    }

    #[test]
    fn test_preprocess_channel_normalization() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255])));
        let data = preprocess_image(&white, 8);
        let plane = 64;
        for c in 0..3 {
            let expected = (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            assert!((data[c * plane] - expected).abs() < 1e-5);
            assert!((data[c * plane + plane - 1] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_embed_has_unit_norm() {
        let embedder = FixedEmbedder(vec![3.0, -4.0, 12.0]);
        let v = embedder.embed(&gradient_image(3, 3)).unwrap();
        assert!((v.dot(&v).sqrt() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embed_degenerate_output() {
        let embedder = FixedEmbedder(vec![0.0; 8]);
        let v = embedder.embed(&gradient_image(3, 3)).unwrap();
        assert!(v.iter().all(|x| x.is_finite() && *x == 0.0));
    }

    #[test]
    fn test_architecture_parsing() {
        assert_eq!("ResNet50".parse::<Architecture>().unwrap(), Architecture::Resnet50);
        assert_eq!(Architecture::Resnet34.to_string(), "resnet34");
        assert_eq!(Architecture::default().feature_dim(), 512);
        assert!("vgg16".parse::<Architecture>().is_err());
    }

    #[cfg(feature = "embeddings")]
    #[test]
    fn test_resnet_missing_weights() {
        let err = ResNetEmbedder::load(Architecture::Resnet18, "/nonexistent/resnet18.ot").unwrap_err();
        assert!(matches!(err, AppError::Model(_)));
    }
}
