use std::cell::Cell;

use futures_util::{FutureExt, poll};

use super::*;
use crate::{
    effects::descriptor::{BackdropSource, BlendMode, Placement},
    foundation::color::Color,
    sink::{
        ImageRequest,
        recording::{NodeId, RecordedBrush, RecordingSink, SinkCall, SinkOp},
    },
};

/// [`RecordingSink`] whose image loads wait until [`GatedSink::open`] is called.
#[derive(Default)]
struct GatedSink {
    inner: RecordingSink,
    open: Cell<bool>,
    gate: tokio::sync::Notify,
}

impl GatedSink {
    fn open(&self) {
        self.open.set(true);
        self.gate.notify_one();
    }
}

impl GraphSink for GatedSink {
    type Node = NodeId;
    type Brush = RecordedBrush;

    fn create_from_color(&self, color: Color) -> anyhow::Result<NodeId> {
        self.inner.create_from_color(color)
    }

    fn create_from_backdrop(&self, source: BackdropSource) -> anyhow::Result<NodeId> {
        self.inner.create_from_backdrop(source)
    }

    async fn create_from_image(&self, request: &ImageRequest) -> anyhow::Result<NodeId> {
        while !self.open.get() {
            self.gate.notified().await;
        }
        self.inner.create_from_image(request).await
    }

    async fn create_from_tile(&self, request: &ImageRequest) -> anyhow::Result<NodeId> {
        self.inner.create_from_tile(request).await
    }

    fn apply_tint(&self, input: &NodeId, color: Color, opacity: f32) -> anyhow::Result<NodeId> {
        self.inner.apply_tint(input, color, opacity)
    }

    fn apply_blur(&self, input: &NodeId, amount: f32) -> anyhow::Result<NodeId> {
        self.inner.apply_blur(input, amount)
    }

    fn apply_saturation(&self, input: &NodeId, amount: f32) -> anyhow::Result<NodeId> {
        self.inner.apply_saturation(input, amount)
    }

    fn apply_luminance_to_alpha(&self, input: &NodeId) -> anyhow::Result<NodeId> {
        self.inner.apply_luminance_to_alpha(input)
    }

    fn apply_blend(
        &self,
        foreground: &NodeId,
        background: &NodeId,
        mode: BlendMode,
    ) -> anyhow::Result<NodeId> {
        self.inner.apply_blend(foreground, background, mode)
    }

    async fn realize(&self, root: &NodeId) -> anyhow::Result<RecordedBrush> {
        self.inner.realize(root).await
    }

    fn dispose_node(&self, node: NodeId) {
        self.inner.dispose_node(node)
    }

    fn dispose_brush(&self, brush: RecordedBrush) {
        self.inner.dispose_brush(brush)
    }
}

/// Consumer that logs every callback.
#[derive(Default)]
struct Journal(parking_lot::Mutex<Vec<String>>);

impl Journal {
    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

impl BrushConsumer<RecordedBrush> for Journal {
    fn publish(&self, brush: &RecordedBrush) {
        self.0.lock().push(format!("publish {}", brush.id.0));
    }

    fn clear(&self) {
        self.0.lock().push("clear".to_owned());
    }
}

fn slow_pipeline() -> PipelineBuilder {
    PipelineBuilder::from_color(Color::RED)
        .blend(
            PipelineBuilder::from_image(ImageRequest::new("slow.png")),
            BlendMode::Multiply,
            Placement::Foreground,
        )
        .unwrap()
}

fn quick_pipeline() -> PipelineBuilder {
    PipelineBuilder::from_color(Color::RED)
        .tint(Color::BLUE, 0.5)
        .unwrap()
        .blur(8.0)
        .unwrap()
}

#[tokio::test]
async fn attach_then_detach_leaves_nothing_live() {
    let sink = Arc::new(RecordingSink::new());
    let guard = BrushGuard::with_consumer(sink.clone(), quick_pipeline(), Journal::default());
    assert_eq!(guard.state(), BrushState::Unattached);

    guard.attach().await.unwrap();
    assert_eq!(guard.state(), BrushState::Attached);
    let brush = guard.current_brush().unwrap();
    assert_eq!(brush.root, NodeId(2));
    assert_eq!(sink.live_nodes(), 3);
    assert_eq!(sink.live_brushes(), 1);

    guard.detach().await;
    assert_eq!(guard.state(), BrushState::Unattached);
    assert!(guard.current_brush().is_none());
    assert!(sink.is_clean());
    assert_eq!(guard.consumer().entries(), ["publish 0", "clear"]);
}

#[tokio::test]
async fn detach_without_attach_is_a_no_op() {
    let sink = Arc::new(RecordingSink::new());
    let guard = BrushGuard::with_consumer(sink.clone(), quick_pipeline(), Journal::default());

    guard.detach().await;
    guard.detach().await;
    assert_eq!(guard.state(), BrushState::Unattached);
    assert!(sink.calls().is_empty());
    assert!(guard.consumer().entries().is_empty());

    guard.attach().await.unwrap();
    guard.detach().await;
    guard.detach().await;
    assert!(sink.is_clean());
    assert_eq!(sink.double_disposals(), 0);
}

#[tokio::test]
async fn second_attach_is_a_no_op() {
    let sink = Arc::new(RecordingSink::new());
    let guard = BrushGuard::new(sink.clone(), quick_pipeline());

    guard.attach().await.unwrap();
    guard.attach().await.unwrap();
    assert_eq!(sink.realize_count(), 1);
    assert_eq!(sink.live_brushes(), 1);
}

#[tokio::test]
async fn concurrent_attaches_resolve_once() {
    let sink = Arc::new(GatedSink::default());
    let guard = BrushGuard::new(sink.clone(), slow_pipeline());

    let mut first = std::pin::pin!(guard.attach());
    let mut second = std::pin::pin!(guard.attach());
    assert!(poll!(first.as_mut()).is_pending());
    assert_eq!(guard.state(), BrushState::Building);
    assert!(poll!(second.as_mut()).is_pending());

    sink.open();
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(sink.inner.realize_count(), 1);
    assert_eq!(guard.state(), BrushState::Attached);
}

#[tokio::test]
async fn detach_during_attach_waits_and_releases_the_new_brush() {
    let sink = Arc::new(GatedSink::default());
    let guard = BrushGuard::with_consumer(sink.clone(), slow_pipeline(), Journal::default());

    let mut attach = std::pin::pin!(guard.attach());
    let mut detach = std::pin::pin!(guard.detach());
    assert!(poll!(attach.as_mut()).is_pending());
    assert!(poll!(detach.as_mut()).is_pending());
    assert_eq!(guard.state(), BrushState::Building);

    sink.open();
    attach.await.unwrap();
    detach.await;

    assert_eq!(guard.state(), BrushState::Unattached);
    assert!(sink.inner.is_clean());
    let calls = sink.inner.calls();
    let realized = calls
        .iter()
        .position(|c| matches!(c, SinkCall::Realize { .. }))
        .unwrap();
    let released = calls
        .iter()
        .position(|c| matches!(c, SinkCall::DisposeBrush(_)))
        .unwrap();
    assert!(realized < released);
    assert_eq!(guard.consumer().entries(), ["publish 0", "clear"]);
}

#[tokio::test]
async fn failed_attach_publishes_nothing_and_can_be_retried() {
    let sink = Arc::new(RecordingSink::new());
    sink.fail_on(SinkOp::Realize);
    let guard = BrushGuard::with_consumer(sink.clone(), quick_pipeline(), Journal::default());

    let err = guard.attach().await.unwrap_err();
    assert!(matches!(err, BrushworkError::NativeRealizeFailed { .. }));
    assert_eq!(guard.state(), BrushState::Unattached);
    assert!(guard.current_brush().is_none());
    assert!(guard.consumer().entries().is_empty());
    assert!(sink.is_clean());
    let message = guard.last_error().unwrap();
    assert!(message.starts_with("native realize failed"), "{message}");
    assert!(message.contains("injected failure"), "{message}");

    sink.clear_failures();
    guard.attach().await.unwrap();
    assert_eq!(guard.state(), BrushState::Attached);
    assert!(guard.last_error().is_none());
}

#[tokio::test]
async fn dropped_attach_releases_the_cycle() {
    let sink = Arc::new(GatedSink::default());
    let guard = BrushGuard::new(sink.clone(), slow_pipeline());

    assert!(guard.attach().now_or_never().is_none());
    assert_eq!(guard.state(), BrushState::Unattached);
    assert!(sink.inner.is_clean());

    sink.open();
    guard.attach().await.unwrap();
    assert!(guard.is_attached());
}

#[test]
fn dropping_the_guard_disposes_its_brush() {
    let sink = Arc::new(RecordingSink::new());
    let guard = BrushGuard::with_consumer(sink.clone(), quick_pipeline(), Journal::default());

    guard.attach().now_or_never().unwrap().unwrap();
    assert_eq!(sink.live_brushes(), 1);

    drop(guard);
    assert!(sink.is_clean());
}
