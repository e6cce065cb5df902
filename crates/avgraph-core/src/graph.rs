//! Graph Lifecycle Manager.
//!
//! Owns the engine graph and moves it through three states:
//!
//! ```text
//! Absent ──alloc──► Allocated ──configure──► Configured
//!    ▲                  │                        │
//!    └──── teardown ────┴──────── teardown ──────┘
//! ```
//!
//! Named pads build and configure in one step, so outside this module a
//! named graph is either absent or configured. The single-input variant
//! stops at `Allocated` until the first frame finalises the source.
//! A failed build never leaves a graph behind.

use std::collections::BTreeMap;
use std::sync::Arc;

use avgraph_engine::{
    Engine, FilterGraph, FilterId, FrameProps, HwDevice, InOut, MediaType, NativeFrame,
    StreamParams,
};
use avgraph_media::MediaKind;

use crate::descriptor::MediaDescriptor;
use crate::error::StageError;
use crate::pad::{PadDirection, PadSet};

/// Extra surfaces requested from hardware frame pools.
pub const EXTRA_HW_FRAMES: u32 = 8;

/// Lifecycle state of the engine graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphState {
    /// No graph.
    Absent,
    /// Allocated and parsed, waiting for its first frame.
    Allocated,
    /// Runnable.
    Configured,
}

/// Source and sink of a single-input graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ImplicitEnds {
    pub(crate) source: FilterId,
    pub(crate) sink: FilterId,
}

struct GraphInstance {
    graph: Box<dyn FilterGraph>,
    configured: bool,
    implicit: Option<ImplicitEnds>,
}

fn source_filter(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Picture => "buffer",
        MediaKind::Sound => "abuffer",
    }
}

fn sink_filter(kind: Option<MediaType>) -> Option<&'static str> {
    match kind? {
        MediaType::Video => Some("buffersink"),
        MediaType::Audio => Some("abuffersink"),
    }
}

/// Builds, configures and tears down the engine graph.
pub(crate) struct GraphManager {
    engine: Arc<dyn Engine>,
    description: Option<String>,
    options: BTreeMap<String, String>,
    hw_device: Option<HwDevice>,
    instance: Option<GraphInstance>,
    generation: u64,
}

impl GraphManager {
    pub(crate) fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            description: None,
            options: BTreeMap::new(),
            hw_device: None,
            instance: None,
            generation: 0,
        }
    }

    pub(crate) fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub(crate) fn state(&self) -> GraphState {
        match &self.instance {
            None => GraphState::Absent,
            Some(i) if i.configured => GraphState::Configured,
            Some(_) => GraphState::Allocated,
        }
    }

    /// Number of graphs configured so far.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) fn set_description(&mut self, description: &str) {
        self.description = Some(description.to_string());
    }

    pub(crate) fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Stores an option, applying it to a live graph first.
    pub(crate) fn set_option(&mut self, key: &str, value: Option<&str>) -> Result<(), StageError> {
        if let Some(instance) = self.instance.as_mut() {
            instance
                .graph
                .set_option(key, value)
                .map_err(|e| StageError::external(format!("cannot set option '{key}'"), e))?;
        }
        match value {
            Some(value) => {
                self.options.insert(key.to_string(), value.to_string());
            }
            None => {
                self.options.remove(key);
            }
        }
        Ok(())
    }

    pub(crate) fn hw_device(&self) -> Option<&HwDevice> {
        self.hw_device.as_ref()
    }

    pub(crate) fn set_hw_device(&mut self, device: HwDevice) {
        self.hw_device = Some(device);
    }

    /// The configured graph.
    pub(crate) fn configured_graph(&mut self) -> Option<&mut (dyn FilterGraph + 'static)> {
        self.instance
            .as_mut()
            .filter(|i| i.configured)
            .map(|i| i.graph.as_mut())
    }

    pub(crate) fn implicit_ends(&self) -> Option<ImplicitEnds> {
        self.instance.as_ref().and_then(|i| i.implicit)
    }

    /// Frees the graph; returns `true` when it was configured.
    pub(crate) fn teardown(&mut self) -> bool {
        match self.instance.take() {
            Some(instance) => {
                tracing::debug!(configured = instance.configured, "graph_teardown");
                instance.configured
            }
            None => false,
        }
    }

    fn alloc_graph(&self, auto_convert: bool) -> Result<Box<dyn FilterGraph>, StageError> {
        let mut graph = self
            .engine
            .alloc_graph()
            .map_err(|e| StageError::external("cannot allocate filter graph", e))?;
        graph.set_auto_convert(auto_convert);
        for (key, value) in &self.options {
            graph.set_option(key, Some(value)).map_err(|e| {
                StageError::external(format!("cannot set option {key}={value}"), e)
            })?;
        }
        tracing::debug!(
            engine = self.engine.name(),
            options = self.options.len(),
            "graph_alloc"
        );
        Ok(graph)
    }

    // -----------------------------------------------------------------------
    // Named pads
    // -----------------------------------------------------------------------

    /// Builds and configures a graph for the current pad set.
    ///
    /// Returns [`GraphState::Absent`] without error while the description
    /// still waits for an input format or an output pad. On any outcome
    /// other than `Configured` every pad is detached.
    pub(crate) fn build_named(&mut self, pads: &mut PadSet) -> Result<GraphState, StageError> {
        if self.instance.is_some() {
            return Ok(self.state());
        }
        match self.try_build_named(pads) {
            Ok(Some(graph)) => {
                self.instance = Some(GraphInstance {
                    graph,
                    configured: true,
                    implicit: None,
                });
                self.generation += 1;
                tracing::debug!(generation = self.generation, "graph_build: configured");
                Ok(GraphState::Configured)
            }
            Ok(None) => {
                pads.detach_all();
                Ok(GraphState::Absent)
            }
            Err(err) => {
                tracing::error!(error = %err, "graph_build: failed");
                pads.detach_all();
                Err(err)
            }
        }
    }

    fn try_build_named(
        &self,
        pads: &mut PadSet,
    ) -> Result<Option<Box<dyn FilterGraph>>, StageError> {
        let Some(description) = self.description.as_deref() else {
            tracing::debug!("graph_build: no description yet");
            return Ok(None);
        };
        let mut graph = self.alloc_graph(true)?;

        let mut open = Vec::new();
        for (_, pad) in pads.iter_mut() {
            let Some(media) = pad.input().and_then(|i| i.media.as_ref()) else {
                continue;
            };
            if pad.native.is_some() {
                return Err(StageError::busy(format!(
                    "pad '{}' already has a source",
                    pad.name
                )));
            }
            let filter = source_filter(media.kind());
            let params = media.stream_params()?;
            let id = graph.alloc_filter(filter, &pad.name).map_err(|e| {
                StageError::external(format!("cannot create {filter} for '{}'", pad.name), e)
            })?;
            graph.set_source_params(id, &params).map_err(|e| {
                StageError::external(format!("cannot set parameters of '{}'", pad.name), e)
            })?;
            graph.init_filter(id, None).map_err(|e| {
                StageError::external(format!("cannot initialise '{}'", pad.name), e)
            })?;
            tracing::debug!(pad = %pad.name, filter, "graph_build: source created");
            pad.native = Some(id);
            open.push(InOut::named(&pad.name, id, 0));
        }

        let links = graph
            .parse(description, Vec::new(), open)
            .map_err(|e| StageError::external("cannot parse filter graph", e))?;
        if let Some(input) = links.inputs.first() {
            tracing::debug!(
                label = input.name.as_deref().unwrap_or(""),
                "graph_build: input is not ready"
            );
            return Ok(None);
        }

        let mut sinks = Vec::with_capacity(links.outputs.len());
        for output in &links.outputs {
            let Some(name) = output.name.as_deref() else {
                tracing::debug!("graph_build: unlabelled output");
                return Ok(None);
            };
            let declared = pads
                .find(name)
                .and_then(|id| pads.get(id))
                .is_some_and(|p| p.direction() == PadDirection::Output);
            if !declared {
                tracing::debug!(output = name, "graph_build: output pad is not created yet");
                return Ok(None);
            }
            let filter = sink_filter(graph.output_type(output.filter, output.pad))
                .ok_or_else(|| StageError::invalid(format!("unknown media type for '{name}'")))?;
            sinks.push(format!("[{name}]{filter}@{name}"));
        }
        if !sinks.is_empty() {
            graph
                .parse(&sinks.join(";"), Vec::new(), links.outputs)
                .map_err(|e| StageError::external("cannot create sinks", e))?;
        }

        let filters = graph.filters();
        for (_, pad) in pads.iter_mut() {
            if pad.direction() != PadDirection::Output {
                continue;
            }
            let video = format!("buffersink@{}", pad.name);
            let audio = format!("abuffersink@{}", pad.name);
            let sink = filters
                .iter()
                .find(|f| f.instance == video || f.instance == audio)
                .ok_or_else(|| {
                    StageError::invalid(format!(
                        "output pad '{}' matches no output of the description",
                        pad.name
                    ))
                })?;
            pad.native = Some(sink.id);
        }

        graph
            .configure()
            .map_err(|e| StageError::external("cannot configure filter graph", e))?;
        Ok(Some(graph))
    }

    // -----------------------------------------------------------------------
    // Single input
    // -----------------------------------------------------------------------

    /// Allocates and parses a single-input graph; configuration waits for
    /// the first frame.
    pub(crate) fn build_implicit(&mut self, media: &MediaDescriptor) -> Result<(), StageError> {
        let description = self
            .description
            .clone()
            .ok_or_else(|| StageError::invalid("no filter description"))?;
        if self.instance.is_some() {
            return Err(StageError::busy("filter graph already allocated"));
        }
        let mut graph = self.alloc_graph(false)?;

        let filter = source_filter(media.kind());
        let source = graph
            .alloc_filter(filter, "input")
            .map_err(|e| StageError::external(format!("cannot create {filter}"), e))?;
        graph
            .set_source_params(source, &media.stream_params()?)
            .map_err(|e| StageError::external("cannot set buffer parameters", e))?;
        graph
            .init_filter(source, None)
            .map_err(|e| StageError::external(format!("cannot initialise {filter}"), e))?;

        let links = graph
            .parse(&description, Vec::new(), vec![InOut::named("in", source, 0)])
            .map_err(|e| StageError::external("cannot parse filter graph", e))?;
        if let Some(input) = links.inputs.first() {
            return Err(StageError::invalid(format!(
                "description input '{}' is not connected",
                input.name.as_deref().unwrap_or("")
            )));
        }
        let mut outputs = links.outputs;
        if outputs.len() != 1 {
            return Err(StageError::invalid(format!(
                "description leaves {} free outputs, expected one",
                outputs.len()
            )));
        }
        outputs[0].name = Some("out".to_string());
        let sink = sink_filter(graph.output_type(outputs[0].filter, outputs[0].pad))
            .ok_or_else(|| StageError::invalid("unknown output media type"))?;
        graph
            .parse(&format!("[out]{sink}"), Vec::new(), outputs)
            .map_err(|e| StageError::external("cannot create sink", e))?;
        let sink = graph
            .filters()
            .last()
            .map(|f| f.id)
            .ok_or_else(|| StageError::invalid("graph has no sink"))?;

        tracing::debug!(%source, %sink, "graph_build: single input allocated");
        self.instance = Some(GraphInstance {
            graph,
            configured: false,
            implicit: Some(ImplicitEnds { source, sink }),
        });
        Ok(())
    }

    /// Finalises the source from the first frame and configures the graph.
    pub(crate) fn configure_implicit(
        &mut self,
        media: &MediaDescriptor,
        frame: &NativeFrame,
    ) -> Result<(), StageError> {
        let device = self
            .hw_device
            .clone()
            .or_else(|| frame.hw_frames.as_ref().map(|f| f.device().clone()));
        let instance = self
            .instance
            .as_mut()
            .ok_or_else(|| StageError::invalid("no filter graph"))?;
        let ends = instance
            .implicit
            .ok_or_else(|| StageError::invalid("graph has no single input"))?;

        let mut params = media.stream_params()?;
        match (&mut params, &frame.props) {
            (StreamParams::Video(p), FrameProps::Video(v)) => {
                p.format = v.format;
                p.width = v.width;
                p.height = v.height;
                p.hw_frames = frame.hw_frames.clone();
            }
            (StreamParams::Audio(p), FrameProps::Audio(a)) => {
                p.format = a.format;
                p.sample_rate = a.sample_rate;
                p.layout = a.layout;
            }
            _ => {
                return Err(StageError::invalid(
                    "first frame does not match the input format",
                ));
            }
        }
        let graph = instance.graph.as_mut();
        graph
            .set_source_params(ends.source, &params)
            .map_err(|e| StageError::external("cannot set buffer parameters", e))?;
        if let Some(device) = &device {
            for filter in graph.filters() {
                graph
                    .set_hw_device(filter.id, device, EXTRA_HW_FRAMES)
                    .map_err(|e| {
                        StageError::external(format!("cannot attach device to '{}'", filter.instance), e)
                    })?;
            }
        }
        graph
            .configure()
            .map_err(|e| StageError::external("cannot configure filter graph", e))?;
        instance.configured = true;
        self.generation += 1;
        tracing::debug!(
            generation = self.generation,
            hw = device.is_some(),
            "graph_build: single input configured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avgraph_engine::routing::RoutingEngine;
    use avgraph_media::{FlowDef, Rational};

    use crate::formats::pixel_format_to_flow;

    fn manager(description: &str) -> GraphManager {
        let mut m = GraphManager::new(Arc::new(RoutingEngine::new()));
        m.set_description(description);
        m
    }

    fn video() -> MediaDescriptor {
        let mut flow = FlowDef::picture();
        pixel_format_to_flow(avgraph_engine::PixelFormat::Yuv420p, &mut flow).unwrap();
        flow.set_hsize(64);
        flow.set_vsize(32);
        flow.set_fps(Rational::new(25, 1));
        MediaDescriptor::from_flow_def(&flow).unwrap()
    }

    fn with_input(pads: &mut PadSet, name: &str) {
        let id = pads.add(name, PadDirection::Input).unwrap();
        if let Some(input) = pads.get_mut(id).and_then(|p| p.input_mut()) {
            input.media = Some(video());
        }
    }

    #[test]
    fn waits_for_description_inputs_and_outputs() {
        let mut m = GraphManager::new(Arc::new(RoutingEngine::new()));
        let mut pads = PadSet::default();
        assert_eq!(m.build_named(&mut pads).unwrap(), GraphState::Absent);

        m.set_description("null");
        assert_eq!(m.build_named(&mut pads).unwrap(), GraphState::Absent);

        with_input(&mut pads, "in");
        assert_eq!(m.build_named(&mut pads).unwrap(), GraphState::Absent);
        assert!(pads.iter().all(|(_, p)| p.native.is_none()));

        let out = pads.add("out", PadDirection::Output).unwrap();
        assert_eq!(m.build_named(&mut pads).unwrap(), GraphState::Configured);
        assert!(pads.get(out).unwrap().native.is_some());
        assert_eq!(m.generation(), 1);
    }

    #[test]
    fn undeclared_output_pad_fails_and_detaches() {
        let mut m = manager("null");
        let mut pads = PadSet::default();
        with_input(&mut pads, "in");
        pads.add("out", PadDirection::Output).unwrap();
        pads.add("extra", PadDirection::Output).unwrap();

        let err = m.build_named(&mut pads).unwrap_err();
        assert!(matches!(err, StageError::Invalid(_)));
        assert_eq!(m.state(), GraphState::Absent);
        assert!(pads.iter().all(|(_, p)| p.native.is_none()));
    }

    #[test]
    fn options_reach_the_graph() {
        let mut m = manager("null");
        m.set_option("threads", Some("2")).unwrap();
        m.set_option("bogus", Some("1")).unwrap();
        let mut pads = PadSet::default();
        with_input(&mut pads, "in");
        pads.add("out", PadDirection::Output).unwrap();
        let err = m.build_named(&mut pads).unwrap_err();
        assert!(matches!(err, StageError::External { .. }));

        m.set_option("bogus", None).unwrap();
        assert_eq!(m.build_named(&mut pads).unwrap(), GraphState::Configured);
        assert!(m.set_option("bogus", Some("1")).is_err());
        assert_eq!(m.options().len(), 1);
    }

    #[test]
    fn single_input_waits_for_first_frame() {
        let mut m = manager("split[a][b];[b]nullsink");
        assert!(m.build_implicit(&video()).is_err());
        assert_eq!(m.state(), GraphState::Absent);

        let mut m = manager("null");
        m.build_implicit(&video()).unwrap();
        assert_eq!(m.state(), GraphState::Allocated);
        assert!(matches!(m.build_implicit(&video()), Err(StageError::Busy(_))));

        let frame = NativeFrame::alloc_video(avgraph_engine::VideoProps::new(
            avgraph_engine::PixelFormat::Gray,
            16,
            16,
        ));
        m.configure_implicit(&video(), &frame).unwrap();
        assert_eq!(m.state(), GraphState::Configured);
        let ends = m.implicit_ends().unwrap();
        let graph = m.configured_graph().unwrap();
        let StreamParams::Video(p) = graph.sink_params(ends.sink).unwrap() else {
            panic!("expected video");
        };
        assert_eq!((p.format, p.width), (avgraph_engine::PixelFormat::Gray, 16));
    }

    #[test]
    fn single_input_requires_description() {
        let mut m = GraphManager::new(Arc::new(RoutingEngine::new()));
        assert!(matches!(m.build_implicit(&video()), Err(StageError::Invalid(_))));
    }
}
