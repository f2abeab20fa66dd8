use crate::foundation::{
    color::Color,
    error::{BrushworkError, BrushworkResult},
};

/// Declarative description of one effect step.
///
/// Source kinds (`Backdrop`, `SolidColor`, `Image`, `Tile`) start a pipeline; every other kind
/// transforms the running graph. See [`crate::PipelineBuilder::from_effects`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectDescriptor {
    /// Sample whatever is rendered behind the consumer.
    Backdrop {
        /// Which backdrop to sample.
        #[serde(default)]
        source: BackdropSource,
    },
    /// Flat color fill.
    SolidColor {
        /// Fill color.
        color: Color,
    },
    /// Image stretched over the consumer.
    Image {
        /// Image location.
        uri: String,
        /// DPI scaling applied to the decoded surface.
        #[serde(default)]
        dpi_mode: DpiMode,
        /// Decode caching policy.
        #[serde(default)]
        cache_mode: CacheMode,
    },
    /// Image repeated to fill the consumer.
    Tile {
        /// Image location.
        uri: String,
        /// DPI scaling applied to the decoded surface.
        #[serde(default)]
        dpi_mode: DpiMode,
        /// Decode caching policy.
        #[serde(default)]
        cache_mode: CacheMode,
    },
    /// Color overlay mixed over the running graph.
    Tint {
        /// Overlay color.
        color: Color,
        /// Overlay strength in `[0, 1]`.
        opacity: f32,
    },
    /// Gaussian blur.
    Blur {
        /// Blur amount in `[0, 250]`.
        amount: f32,
    },
    /// Saturation adjustment.
    Saturation {
        /// Saturation in `[0, 1]`; `0` is fully desaturated.
        amount: f32,
    },
    /// Map luminance to alpha.
    LuminanceToAlpha {},
    /// Blend the running graph with an independent pipeline built from `inputs`.
    Blend {
        /// Steps of the other pipeline; the first must be a source kind.
        inputs: Vec<EffectDescriptor>,
        /// Pixel-combination rule.
        mode: BlendMode,
        /// Where the running graph is placed relative to `inputs`.
        #[serde(default)]
        placement: Placement,
    },
}

impl EffectDescriptor {
    /// Stable snake_case name of this descriptor kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Backdrop { .. } => "backdrop",
            Self::SolidColor { .. } => "solid_color",
            Self::Image { .. } => "image",
            Self::Tile { .. } => "tile",
            Self::Tint { .. } => "tint",
            Self::Blur { .. } => "blur",
            Self::Saturation { .. } => "saturation",
            Self::LuminanceToAlpha {} => "luminance_to_alpha",
            Self::Blend { .. } => "blend",
        }
    }

    /// Whether this descriptor starts a pipeline.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            Self::Backdrop { .. } | Self::SolidColor { .. } | Self::Image { .. } | Self::Tile { .. }
        )
    }
}

/// Backdrop sampled by a backdrop source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BackdropSource {
    /// Content of the application window behind the consumer.
    #[default]
    App,
    /// Content of the host desktop behind the window.
    Host,
}

/// How decoded image pixels map to logical units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DpiMode {
    /// Honor the DPI recorded in the image.
    UseSourceDpi,
    /// Treat the image as 96 DPI (one pixel per logical unit).
    #[default]
    Default96Dpi,
    /// Scale to the display DPI.
    DisplayDpi,
    /// Scale to the display DPI, never below 96.
    DisplayDpiWith96AsLowerBound,
}

/// Decode caching policy for image and tile sources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CacheMode {
    /// Decode once and keep the surface in the shared cache.
    #[default]
    OnLoad,
    /// Decode on every request, bypassing the cache.
    OnDemand,
}

/// Pixel-combination rule of a blend node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[allow(missing_docs)]
pub enum BlendMode {
    Multiply,
    Screen,
    Darken,
    Lighten,
    Dissolve,
    ColorBurn,
    LinearBurn,
    DarkerColor,
    LighterColor,
    ColorDodge,
    LinearDodge,
    Overlay,
    SoftLight,
    HardLight,
    VividLight,
    LinearLight,
    PinLight,
    HardMix,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
    Subtract,
    Division,
}

/// Where the receiving pipeline goes in a blend.
///
/// `Foreground` makes the receiving pipeline the foreground operand and the other pipeline the
/// background; `Background` swaps them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Placement {
    /// Receiving pipeline is the foreground operand.
    #[default]
    Foreground,
    /// Receiving pipeline is the background operand.
    Background,
}

/// Parse a JSON array of effect descriptors.
pub fn parse_effects(json: &str) -> BrushworkResult<Vec<EffectDescriptor>> {
    let effects: Vec<EffectDescriptor> = serde_json::from_str(json)?;
    Ok(effects)
}

pub(crate) fn unit_interval(name: &str, value: f32) -> BrushworkResult<f32> {
    finite(name, value).map(|v| v.clamp(0.0, 1.0))
}

pub(crate) fn finite(name: &str, value: f32) -> BrushworkResult<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BrushworkError::validation(format!("{name} must be finite")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/descriptor.rs"]
mod tests;
