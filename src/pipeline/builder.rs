use crate::{
    effects::descriptor::{
        BackdropSource, BlendMode, EffectDescriptor, Placement, finite, unit_interval,
    },
    foundation::{
        color::Color,
        error::{BrushworkError, BrushworkResult},
    },
    sink::ImageRequest,
};

const MAX_BLUR_AMOUNT: f32 = 250.0;

/// Where a pipeline starts.
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    /// Flat color.
    Color(Color),
    /// Backdrop sample.
    Backdrop(BackdropSource),
    /// Stretched image.
    Image(ImageRequest),
    /// Tiled image.
    Tile(ImageRequest),
    /// The graph of another, independently built pipeline.
    Pipeline(Box<PipelineBuilder>),
}

impl Source {
    /// Name of the builder operation that adds this source.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Color(_) => "from_color",
            Self::Backdrop(_) => "from_backdrop",
            Self::Image(_) => "from_image",
            Self::Tile(_) => "from_tile",
            Self::Pipeline(_) => "from_pipeline",
        }
    }
}

/// Operation applied to the running graph.
#[derive(Clone, Debug, PartialEq)]
pub enum Transform {
    /// Color overlay.
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
        /// Saturation in `[0, 1]`.
        amount: f32,
    },
    /// Luminance-to-alpha mapping.
    LuminanceToAlpha,
    /// Blend with another pipeline.
    Blend {
        /// The other pipeline; resolved in full before the blend node is created.
        other: Box<PipelineBuilder>,
        /// Pixel-combination rule.
        mode: BlendMode,
        /// Where the running graph goes relative to `other`.
        placement: Placement,
    },
}

impl Transform {
    /// Name of the builder operation that adds this transform.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tint { .. } => "tint",
            Self::Blur { .. } => "blur",
            Self::Saturation { .. } => "saturation",
            Self::LuminanceToAlpha => "luminance_to_alpha",
            Self::Blend { .. } => "blend",
        }
    }

    fn normalized(self) -> BrushworkResult<Self> {
        Ok(match self {
            Self::Tint { color, opacity } => Self::Tint {
                color,
                opacity: unit_interval("tint opacity", opacity)?,
            },
            Self::Blur { amount } => Self::Blur {
                amount: finite("blur amount", amount)?.clamp(0.0, MAX_BLUR_AMOUNT),
            },
            Self::Saturation { amount } => Self::Saturation {
                amount: unit_interval("saturation amount", amount)?,
            },
            other @ (Self::LuminanceToAlpha | Self::Blend { .. }) => other,
        })
    }
}

/// One accumulated step, as seen by [`PipelineBuilder::steps`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step<'a> {
    /// The starting source (always step 0).
    Source(&'a Source),
    /// A transform of the previous step's result.
    Transform(&'a Transform),
}

/// Parameters of the acrylic material preset.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AcrylicParams {
    /// Backdrop sampled behind the consumer.
    #[serde(default)]
    pub source: BackdropSource,
    /// Tint color.
    pub tint: Color,
    /// Tint strength in `[0, 1]`.
    pub tint_mix: f32,
    /// Blur amount applied to the backdrop.
    pub blur_amount: f32,
    /// Optional noise texture overlaid on top.
    #[serde(default)]
    pub noise: Option<ImageRequest>,
}

/// Chainable, immutable description of an effect graph.
///
/// A builder starts from exactly one source and then accumulates transforms in append order.
/// Chaining consumes the receiver and returns the extended builder; clone a builder to branch
/// from it. Nothing touches the compositor until [`PipelineBuilder::resolve`].
///
/// ```
/// use brushwork::{Color, PipelineBuilder};
///
/// let pipeline = PipelineBuilder::from_color(Color::RED)
///     .tint(Color::BLUE, 0.5)?
///     .blur(8.0)?;
/// assert_eq!(pipeline.len(), 3);
/// # Ok::<(), brushwork::BrushworkError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineBuilder {
    source: Option<Source>,
    transforms: Vec<Transform>,
}

impl PipelineBuilder {
    /// Builder with no steps. Its first operation must be a source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a flat color.
    pub fn from_color(color: Color) -> Self {
        Self::starting_at(Source::Color(color))
    }

    /// Start from a backdrop sample.
    pub fn from_backdrop(source: BackdropSource) -> Self {
        Self::starting_at(Source::Backdrop(source))
    }

    /// Start from a stretched image.
    pub fn from_image(request: ImageRequest) -> Self {
        Self::starting_at(Source::Image(request))
    }

    /// Start from a tiled image.
    pub fn from_tile(request: ImageRequest) -> Self {
        Self::starting_at(Source::Tile(request))
    }

    /// Start from the graph of another pipeline.
    pub fn from_pipeline(other: PipelineBuilder) -> Self {
        Self::starting_at(Source::Pipeline(Box::new(other)))
    }

    fn starting_at(source: Source) -> Self {
        Self {
            source: Some(source),
            transforms: Vec::new(),
        }
    }

    /// Compile a descriptor sequence: a source kind followed by transform kinds.
    ///
    /// Blend descriptors compile their `inputs` into an independent nested pipeline.
    pub fn from_effects(effects: &[EffectDescriptor]) -> BrushworkResult<Self> {
        let Some((first, rest)) = effects.split_first() else {
            return Err(BrushworkError::EmptyPipeline);
        };
        let mut builder = Self::new().with_source(source_of(first)?)?;
        for effect in rest {
            builder = builder.apply(transform_of(effect)?)?;
        }
        Ok(builder)
    }

    /// Translucent acrylic material: backdrop, blur, tint, and an optional noise overlay.
    pub fn acrylic(params: &AcrylicParams) -> BrushworkResult<Self> {
        let base = Self::from_backdrop(params.source)
            .blur(params.blur_amount)?
            .tint(params.tint, params.tint_mix)?;
        match &params.noise {
            Some(noise) => base.blend(
                Self::from_tile(noise.clone()),
                BlendMode::Overlay,
                Placement::Background,
            ),
            None => Ok(base),
        }
    }

    /// Add the starting source. Fails if the builder already has one.
    pub fn with_source(mut self, source: Source) -> BrushworkResult<Self> {
        if self.source.is_some() {
            return Err(BrushworkError::malformed(
                source.name(),
                "cannot follow an existing source",
            ));
        }
        self.source = Some(source);
        Ok(self)
    }

    /// Append a transform. Fails if the builder has no source yet.
    pub fn apply(mut self, transform: Transform) -> BrushworkResult<Self> {
        if self.source.is_none() {
            return Err(BrushworkError::malformed(
                transform.name(),
                "requires a source first",
            ));
        }
        self.transforms.push(transform.normalized()?);
        Ok(self)
    }

    /// Mix `color` over the running graph; `opacity` is clamped to `[0, 1]`.
    pub fn tint(self, color: Color, opacity: f32) -> BrushworkResult<Self> {
        self.apply(Transform::Tint { color, opacity })
    }

    /// Blur the running graph; `amount` is clamped to `[0, 250]`.
    pub fn blur(self, amount: f32) -> BrushworkResult<Self> {
        self.apply(Transform::Blur { amount })
    }

    /// Adjust saturation; `amount` is clamped to `[0, 1]`.
    pub fn saturation(self, amount: f32) -> BrushworkResult<Self> {
        self.apply(Transform::Saturation { amount })
    }

    /// Map luminance to alpha.
    pub fn luminance_to_alpha(self) -> BrushworkResult<Self> {
        self.apply(Transform::LuminanceToAlpha)
    }

    /// Blend the running graph with `other`.
    ///
    /// With [`Placement::Foreground`] this pipeline is the foreground operand and `other` the
    /// background; [`Placement::Background`] swaps them.
    pub fn blend(
        self,
        other: PipelineBuilder,
        mode: BlendMode,
        placement: Placement,
    ) -> BrushworkResult<Self> {
        self.apply(Transform::Blend {
            other: Box::new(other),
            mode,
            placement,
        })
    }

    /// The starting source, if any.
    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Transforms in append order.
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// All steps in order: the source, then each transform.
    pub fn steps(&self) -> impl Iterator<Item = Step<'_>> {
        self.source
            .iter()
            .map(Step::Source)
            .chain(self.transforms.iter().map(Step::Transform))
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        usize::from(self.source.is_some()) + self.transforms.len()
    }

    /// Whether the builder has no steps.
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
    }
}

fn source_of(effect: &EffectDescriptor) -> BrushworkResult<Source> {
    Ok(match effect {
        EffectDescriptor::Backdrop { source } => Source::Backdrop(*source),
        EffectDescriptor::SolidColor { color } => Source::Color(*color),
        EffectDescriptor::Image {
            uri,
            dpi_mode,
            cache_mode,
        } => Source::Image(
            ImageRequest::new(uri.clone())
                .dpi_mode(*dpi_mode)
                .cache_mode(*cache_mode),
        ),
        EffectDescriptor::Tile {
            uri,
            dpi_mode,
            cache_mode,
        } => Source::Tile(
            ImageRequest::new(uri.clone())
                .dpi_mode(*dpi_mode)
                .cache_mode(*cache_mode),
        ),
        EffectDescriptor::Tint { .. }
        | EffectDescriptor::Blur { .. }
        | EffectDescriptor::Saturation { .. }
        | EffectDescriptor::LuminanceToAlpha {}
        | EffectDescriptor::Blend { .. } => {
            return Err(BrushworkError::malformed(
                effect.kind(),
                "requires a source first",
            ));
        }
    })
}

fn transform_of(effect: &EffectDescriptor) -> BrushworkResult<Transform> {
    Ok(match effect {
        EffectDescriptor::Tint { color, opacity } => Transform::Tint {
            color: *color,
            opacity: *opacity,
        },
        EffectDescriptor::Blur { amount } => Transform::Blur { amount: *amount },
        EffectDescriptor::Saturation { amount } => Transform::Saturation { amount: *amount },
        EffectDescriptor::LuminanceToAlpha {} => Transform::LuminanceToAlpha,
        EffectDescriptor::Blend {
            inputs,
            mode,
            placement,
        } => {
            if inputs.is_empty() {
                return Err(BrushworkError::EmptyBlendInputs);
            }
            Transform::Blend {
                other: Box::new(PipelineBuilder::from_effects(inputs)?),
                mode: *mode,
                placement: *placement,
            }
        }
        EffectDescriptor::Backdrop { .. }
        | EffectDescriptor::SolidColor { .. }
        | EffectDescriptor::Image { .. }
        | EffectDescriptor::Tile { .. } => {
            return Err(BrushworkError::malformed(
                effect.kind(),
                "cannot follow an existing source",
            ));
        }
    })
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/builder.rs"]
mod tests;
