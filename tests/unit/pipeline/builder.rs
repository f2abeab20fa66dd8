use super::*;
use crate::effects::descriptor::{CacheMode, DpiMode, parse_effects};

#[test]
fn first_step_is_always_the_source() {
    let pipeline = PipelineBuilder::from_backdrop(BackdropSource::Host)
        .blur(4.0)
        .unwrap()
        .saturation(0.5)
        .unwrap();

    let steps: Vec<_> = pipeline.steps().collect();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0], Step::Source(&Source::Backdrop(BackdropSource::Host)));
    assert!(
        steps[1..]
            .iter()
            .all(|step| matches!(step, Step::Transform(_)))
    );
}

#[test]
fn transform_on_empty_builder_is_malformed() {
    let err = PipelineBuilder::new().tint(Color::RED, 0.5).unwrap_err();
    match err {
        BrushworkError::MalformedPipeline { operation, .. } => assert_eq!(operation, "tint"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(
        PipelineBuilder::new().luminance_to_alpha(),
        Err(BrushworkError::MalformedPipeline {
            operation: "luminance_to_alpha",
            ..
        })
    ));
}

#[test]
fn second_source_is_malformed() {
    let err = PipelineBuilder::from_color(Color::RED)
        .with_source(Source::Tile(ImageRequest::new("noise.png")))
        .unwrap_err();
    assert!(err.to_string().contains("`from_tile`"));
}

#[test]
fn transforms_keep_append_order() {
    let a = PipelineBuilder::from_color(Color::RED)
        .tint(Color::BLUE, 0.5)
        .unwrap()
        .blur(8.0)
        .unwrap();
    let b = PipelineBuilder::from_color(Color::RED)
        .blur(8.0)
        .unwrap()
        .tint(Color::BLUE, 0.5)
        .unwrap();

    let names = |p: &PipelineBuilder| p.transforms().iter().map(Transform::name).collect::<Vec<_>>();
    assert_eq!(names(&a), ["tint", "blur"]);
    assert_eq!(names(&b), ["blur", "tint"]);
    assert_ne!(a, b);
}

#[test]
fn chaining_leaves_clones_untouched() {
    let base = PipelineBuilder::from_color(Color::WHITE);
    let blurred = base.clone().blur(2.0).unwrap();
    assert_eq!(base.len(), 1);
    assert_eq!(blurred.len(), 2);
    assert!(PipelineBuilder::new().is_empty());
}

#[test]
fn parameters_are_clamped_and_checked() {
    let p = PipelineBuilder::from_color(Color::BLACK)
        .tint(Color::RED, 3.0)
        .unwrap()
        .blur(1000.0)
        .unwrap()
        .saturation(-1.0)
        .unwrap();
    assert_eq!(
        p.transforms(),
        &[
            Transform::Tint {
                color: Color::RED,
                opacity: 1.0
            },
            Transform::Blur { amount: 250.0 },
            Transform::Saturation { amount: 0.0 },
        ]
    );

    assert!(matches!(
        PipelineBuilder::from_color(Color::BLACK).blur(f32::NAN),
        Err(BrushworkError::Validation(_))
    ));
}

#[test]
fn from_effects_compiles_nested_blends() {
    let effects = parse_effects(
        r##"[
            { "kind": "backdrop", "source": "Host" },
            { "kind": "blur", "amount": 12 },
            {
                "kind": "blend",
                "mode": "Multiply",
                "placement": "Background",
                "inputs": [
                    { "kind": "image", "uri": "a.png", "cache_mode": "OnDemand" },
                    { "kind": "luminance_to_alpha" }
                ]
            }
        ]"##,
    )
    .unwrap();

    let compiled = PipelineBuilder::from_effects(&effects).unwrap();
    let expected = PipelineBuilder::from_backdrop(BackdropSource::Host)
        .blur(12.0)
        .unwrap()
        .blend(
            PipelineBuilder::from_image(
                ImageRequest::new("a.png")
                    .dpi_mode(DpiMode::Default96Dpi)
                    .cache_mode(CacheMode::OnDemand),
            )
            .luminance_to_alpha()
            .unwrap(),
            BlendMode::Multiply,
            Placement::Background,
        )
        .unwrap();
    assert_eq!(compiled, expected);
}

#[test]
fn from_effects_rejects_bad_shapes() {
    assert!(matches!(
        PipelineBuilder::from_effects(&[]),
        Err(BrushworkError::EmptyPipeline)
    ));
    assert!(matches!(
        PipelineBuilder::from_effects(&[EffectDescriptor::Blur { amount: 1.0 }]),
        Err(BrushworkError::MalformedPipeline {
            operation: "blur",
            ..
        })
    ));
    assert!(matches!(
        PipelineBuilder::from_effects(&[
            EffectDescriptor::SolidColor { color: Color::RED },
            EffectDescriptor::SolidColor { color: Color::BLUE },
        ]),
        Err(BrushworkError::MalformedPipeline {
            operation: "solid_color",
            ..
        })
    ));
    assert!(matches!(
        PipelineBuilder::from_effects(&[
            EffectDescriptor::SolidColor { color: Color::RED },
            EffectDescriptor::Blend {
                inputs: vec![],
                mode: BlendMode::Screen,
                placement: Placement::Foreground,
            },
        ]),
        Err(BrushworkError::EmptyBlendInputs)
    ));
}

#[test]
fn acrylic_preset_layers_noise_in_front() {
    let params = AcrylicParams {
        source: BackdropSource::App,
        tint: Color::WHITE,
        tint_mix: 0.6,
        blur_amount: 16.0,
        noise: Some(ImageRequest::new("noise.png")),
    };
    let pipeline = PipelineBuilder::acrylic(&params).unwrap();

    let names: Vec<_> = pipeline.transforms().iter().map(Transform::name).collect();
    assert_eq!(names, ["blur", "tint", "blend"]);
    let Transform::Blend {
        other,
        mode,
        placement,
    } = &pipeline.transforms()[2]
    else {
        panic!("last step should blend the noise texture");
    };
    assert_eq!(**other, PipelineBuilder::from_tile(ImageRequest::new("noise.png")));
    assert_eq!(*mode, BlendMode::Overlay);
    assert_eq!(*placement, Placement::Background);

    let plain = PipelineBuilder::acrylic(&AcrylicParams {
        noise: None,
        ..params
    })
    .unwrap();
    assert_eq!(plain.len(), 3);
}
