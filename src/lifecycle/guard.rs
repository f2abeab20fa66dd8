use std::{fmt, sync::Arc};

use crate::{
    foundation::error::{BrushworkError, BrushworkResult},
    pipeline::{builder::PipelineBuilder, resolve::RealizedGraph},
    sink::GraphSink,
};

/// Lifecycle state of one brush consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BrushState {
    /// No brush is published.
    Unattached,
    /// A resolution is in flight.
    Building,
    /// A brush is published.
    Attached,
    /// The published brush is being released.
    Detaching,
}

/// Host element that displays the brush a [`BrushGuard`] publishes.
pub trait BrushConsumer<B> {
    /// Show `brush`. Called once per successful attach.
    fn publish(&self, brush: &B);

    /// Stop showing the published brush. Called before it is disposed.
    fn clear(&self);
}

impl<B> BrushConsumer<B> for () {
    fn publish(&self, _brush: &B) {}

    fn clear(&self) {}
}

struct Slot<S: GraphSink> {
    state: BrushState,
    graph: Option<RealizedGraph<S>>,
    last_error: Option<String>,
}

/// Owns the brush of one consumer across attach/detach cycles.
///
/// Every cycle holds a per-guard async lock from start to finish, so cycles never
/// interleave and run in request order. An attach that finds a brush already published does
/// nothing; a detach that finds none does nothing. A detach issued while an attach is in
/// flight waits for it and then releases whatever it published.
pub struct BrushGuard<S: GraphSink, C: BrushConsumer<S::Brush> = ()> {
    sink: Arc<S>,
    pipeline: PipelineBuilder,
    consumer: C,
    cycle: tokio::sync::Mutex<()>,
    slot: parking_lot::Mutex<Slot<S>>,
}

impl<S: GraphSink> BrushGuard<S> {
    /// Guard for `pipeline` with no consumer callbacks.
    pub fn new(sink: Arc<S>, pipeline: PipelineBuilder) -> Self {
        Self::with_consumer(sink, pipeline, ())
    }
}

impl<S: GraphSink, C: BrushConsumer<S::Brush>> BrushGuard<S, C> {
    /// Guard for `pipeline` that publishes brushes to `consumer`.
    pub fn with_consumer(sink: Arc<S>, pipeline: PipelineBuilder, consumer: C) -> Self {
        Self {
            sink,
            pipeline,
            consumer,
            cycle: tokio::sync::Mutex::new(()),
            slot: parking_lot::Mutex::new(Slot {
                state: BrushState::Unattached,
                graph: None,
                last_error: None,
            }),
        }
    }

    /// Sink used for resolution and disposal.
    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    /// Pipeline resolved on attach.
    pub fn pipeline(&self) -> &PipelineBuilder {
        &self.pipeline
    }

    /// Consumer the brush is published to.
    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BrushState {
        self.slot.lock().state
    }

    /// Whether a brush is published.
    pub fn is_attached(&self) -> bool {
        self.slot.lock().graph.is_some()
    }

    /// Copy of the published brush, if any.
    pub fn current_brush(&self) -> Option<S::Brush>
    where
        S::Brush: Clone,
    {
        self.slot
            .lock()
            .graph
            .as_ref()
            .map(|graph| graph.brush().clone())
    }

    /// Message of the most recent failed attach, cleared by a successful one.
    pub fn last_error(&self) -> Option<String> {
        self.slot.lock().last_error.clone()
    }

    /// Resolve the pipeline and publish the resulting brush.
    ///
    /// On failure nothing is published, the guard returns to [`BrushState::Unattached`] and
    /// the error is returned. Dropping the returned future mid-flight disposes any partial
    /// graph and also leaves the guard unattached.
    #[tracing::instrument(skip_all, fields(steps = self.pipeline.len()))]
    pub async fn attach(&self) -> BrushworkResult<()> {
        let _cycle = self.cycle.lock().await;
        if self.slot.lock().graph.is_some() {
            tracing::debug!("brush already attached");
            return Ok(());
        }

        let _building = BuildingMark::enter(&self.slot);
        match self.pipeline.resolve(self.sink.as_ref()).await {
            Ok(graph) => {
                self.consumer.publish(graph.brush());
                let mut slot = self.slot.lock();
                slot.graph = Some(graph);
                slot.state = BrushState::Attached;
                slot.last_error = None;
                tracing::debug!("brush attached");
                Ok(())
            }
            Err(err) => {
                let message = describe(&err);
                tracing::warn!(error = %message, "attach failed");
                self.slot.lock().last_error = Some(message);
                Err(err)
            }
        }
    }

    /// Release the published brush and every node behind it.
    #[tracing::instrument(skip_all)]
    pub async fn detach(&self) {
        let _cycle = self.cycle.lock().await;
        let graph = {
            let mut slot = self.slot.lock();
            let graph = slot.graph.take();
            if graph.is_some() {
                slot.state = BrushState::Detaching;
            }
            graph
        };
        let Some(graph) = graph else {
            tracing::debug!("nothing attached");
            return;
        };

        self.consumer.clear();
        graph.dispose(self.sink.as_ref());
        self.slot.lock().state = BrushState::Unattached;
        tracing::debug!("brush detached");
    }
}

impl<S: GraphSink, C: BrushConsumer<S::Brush>> Drop for BrushGuard<S, C> {
    fn drop(&mut self) {
        let slot = self.slot.get_mut();
        if let Some(graph) = slot.graph.take() {
            self.consumer.clear();
            graph.dispose(self.sink.as_ref());
            slot.state = BrushState::Unattached;
        }
    }
}

impl<S: GraphSink, C: BrushConsumer<S::Brush>> fmt::Debug for BrushGuard<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrushGuard")
            .field("state", &self.state())
            .field("steps", &self.pipeline.len())
            .finish_non_exhaustive()
    }
}

/// `Building` for as long as it lives; falls back to `Unattached` unless a brush was stored.
struct BuildingMark<'a, S: GraphSink> {
    slot: &'a parking_lot::Mutex<Slot<S>>,
}

impl<'a, S: GraphSink> BuildingMark<'a, S> {
    fn enter(slot: &'a parking_lot::Mutex<Slot<S>>) -> Self {
        slot.lock().state = BrushState::Building;
        Self { slot }
    }
}

impl<S: GraphSink> Drop for BuildingMark<'_, S> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.state == BrushState::Building {
            slot.state = BrushState::Unattached;
        }
    }
}

fn describe(err: &BrushworkError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
#[path = "../../tests/unit/lifecycle/guard.rs"]
mod tests;
