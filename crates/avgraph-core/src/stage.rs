//! The filter stage: control surface over graph, pads and outputs.
//!
//! A [`FilterStage`] is driven from one task. Control operations (description,
//! options, pads, formats) rebuild the graph as needed; data operations
//! (`push_input`, `push`, `poll`) live in the coordinator.
//!
//! Two input modes exist and never mix:
//!
//! - **Named pads**: `add_input_pad` / `add_output_pad` declare the graph's
//!   labelled ends; the graph is configured once every input has a format and
//!   every free output of the description has a pad.
//! - **Single input**: `set_input_format` feeds the description's `[in]`
//!   label and its `[out]` label drains into the main output; the graph is
//!   finalised from the first frame.
//!
//! ```rust
//! use std::sync::Arc;
//! use avgraph_core::{FilterStage, GraphState, PadDirection};
//! use avgraph_engine::routing::RoutingEngine;
//!
//! let mut stage = FilterStage::new(Arc::new(RoutingEngine::new()));
//! stage.set_description("null").unwrap();
//! let _input = stage.add_input_pad("in").unwrap();
//! let _output = stage.add_output_pad("out").unwrap();
//! // The input has no format yet.
//! assert_eq!(stage.graph_state(), GraphState::Absent);
//! assert_eq!(stage.pad_direction(_output), Some(PadDirection::Output));
//! ```

use std::sync::Arc;

use avgraph_engine::{Engine, FilterGraph, HwDevice, HwDeviceType};
use avgraph_media::{BufferAllocator, BufferAttrs, Clock, FlowDef};

use crate::descriptor::MediaDescriptor;
use crate::error::StageError;
use crate::events::StageEvent;
use crate::graph::{GraphManager, GraphState};
use crate::output::{OutputPort, OutputSink};
use crate::pad::{PadDirection, PadId, PadSet, Wakeup};

/// State of the implicit input and its main output.
#[derive(Default)]
pub(crate) struct MainIo {
    pub(crate) flow_def: Option<FlowDef>,
    pub(crate) media: Option<MediaDescriptor>,
    pub(crate) last_attrs: Option<BufferAttrs>,
    pub(crate) port: OutputPort,
    pub(crate) warned_dropped: bool,
}

/// A filter-graph stage with named or implicit inputs and outputs.
pub struct FilterStage {
    pub(crate) graph: GraphManager,
    pub(crate) pads: PadSet,
    pub(crate) main: MainIo,
    pub(crate) clock: Option<Arc<dyn Clock>>,
    pub(crate) allocator: Option<BufferAllocator>,
    pub(crate) events: Vec<StageEvent>,
}

impl FilterStage {
    /// A stage without description, pads or clock.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            graph: GraphManager::new(engine),
            pads: PadSet::default(),
            main: MainIo::default(),
            clock: None,
            allocator: None,
            events: Vec::new(),
        }
    }

    /// Uses `clock` for system timestamps and wake-ups.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// The engine graphs are allocated from.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        self.graph.engine()
    }

    pub(crate) fn now(&self) -> Option<u64> {
        self.clock.as_ref().map(|c| c.now())
    }

    fn implicit(&self) -> bool {
        self.main.flow_def.is_some()
    }

    // -----------------------------------------------------------------------
    // Graph lifecycle
    // -----------------------------------------------------------------------

    /// Lifecycle state of the graph.
    pub fn graph_state(&self) -> GraphState {
        self.graph.state()
    }

    /// Number of graphs configured so far; unchanged by no-op updates.
    pub fn graph_generation(&self) -> u64 {
        self.graph.generation()
    }

    /// Current description.
    pub fn description(&self) -> Option<&str> {
        self.graph.description()
    }

    /// Replaces the description and rebuilds the graph.
    ///
    /// In single-input mode a rebuild failure is returned; with named pads it
    /// is reported as [`StageEvent::GraphFailed`].
    pub fn set_description(&mut self, description: &str) -> Result<(), StageError> {
        tracing::debug!(description, "stage: description");
        self.graph.set_description(description);
        self.rebuild()
    }

    /// Sets (`Some`) or clears (`None`) an engine option.
    ///
    /// Applies to the live graph, if any, and to every graph built later.
    pub fn set_option(&mut self, key: &str, value: Option<&str>) -> Result<(), StageError> {
        self.graph.set_option(key, value)
    }

    /// Engine options applied to new graphs.
    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.graph
            .options()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Opens a hardware device by type name (`"vaapi"`, `"cuda"`, ...).
    ///
    /// Used by graphs built afterwards.
    pub fn set_hw_device(&mut self, type_name: &str, device: Option<&str>) -> Result<(), StageError> {
        let kind = HwDeviceType::from_name(type_name)
            .ok_or_else(|| StageError::invalid(format!("unknown hardware type '{type_name}'")))?;
        let device = self
            .graph
            .engine()
            .create_hw_device(kind, device)
            .map_err(|e| StageError::external("cannot create hardware device", e))?;
        tracing::debug!(kind = %kind, device = device.device().unwrap_or("default"), "stage: hw device");
        self.graph.set_hw_device(device);
        Ok(())
    }

    /// The configured hardware device.
    pub fn hw_device(&self) -> Option<&HwDevice> {
        self.graph.hw_device()
    }

    /// Tears the graph down and builds it again from the current state.
    pub fn reset(&mut self) -> Result<GraphState, StageError> {
        self.rebuild()?;
        Ok(self.graph.state())
    }

    /// Sends a runtime command to `"all"` filters or to those named `target`.
    pub fn send_command(
        &mut self,
        target: &str,
        command: &str,
        arg: &str,
    ) -> Result<String, StageError> {
        let graph = self
            .graph
            .configured_graph()
            .ok_or_else(|| StageError::invalid("filter graph is not configured"))?;
        graph
            .send_command(target, command, arg)
            .map_err(|e| StageError::external(format!("command '{command}' to '{target}'"), e))
    }

    /// Drains the recorded events.
    pub fn take_events(&mut self) -> Vec<StageEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn teardown(&mut self) {
        let was_configured = self.graph.teardown();
        self.pads.detach_all();
        self.main.port.clear_flow_def();
        if was_configured {
            tracing::info!(description = self.graph.description().unwrap_or("(none)"), "filter graph is not configured");
            self.events.push(StageEvent::SyncLost);
        }
    }

    fn rebuild(&mut self) -> Result<(), StageError> {
        self.teardown();
        if let Some(media) = self.main.media.clone() {
            if let Err(err) = self.graph.build_implicit(&media) {
                tracing::error!(error = %err, "graph_build: single input failed");
                self.teardown();
                return Err(err);
            }
            return Ok(());
        }
        match self.graph.build_named(&mut self.pads) {
            Ok(GraphState::Configured) => self.on_configured(),
            Ok(_) => {}
            Err(err) => self.events.push(StageEvent::graph_failed(&err)),
        }
        Ok(())
    }

    pub(crate) fn on_configured(&mut self) {
        tracing::info!(description = self.graph.description().unwrap_or("(none)"), "filter graph is configured");
        self.events.push(StageEvent::SyncAcquired);
        for (_, pad) in self.pads.iter_mut() {
            if let Some(output) = pad.output_mut() {
                output.wakeup = Some(Wakeup::Now);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pads
    // -----------------------------------------------------------------------

    /// Declares a named input pad and rebuilds the graph.
    pub fn add_input_pad(&mut self, name: &str) -> Result<PadId, StageError> {
        if self.implicit() {
            return Err(StageError::invalid("stage uses its single input"));
        }
        let id = self.pads.add(name, PadDirection::Input)?;
        tracing::debug!(pad = name, %id, "stage: input pad added");
        self.rebuild()?;
        Ok(id)
    }

    /// Declares a named output pad and rebuilds the graph.
    pub fn add_output_pad(&mut self, name: &str) -> Result<PadId, StageError> {
        let id = self.pads.add(name, PadDirection::Output)?;
        if let (Some(alloc), Some(output)) = (
            self.allocator.clone(),
            self.pads.get_mut(id).and_then(|p| p.output_mut()),
        ) {
            output.port.set_allocator(alloc);
        }
        tracing::debug!(pad = name, %id, "stage: output pad added");
        if !self.implicit() {
            self.rebuild()?;
        }
        Ok(id)
    }

    /// Removes a pad, dropping its retained buffers and pending wake-up,
    /// and rebuilds the graph.
    pub fn release_pad(&mut self, id: PadId) -> Result<(), StageError> {
        let pad = self
            .pads
            .remove(id)
            .ok_or_else(|| StageError::invalid(format!("no pad {id}")))?;
        tracing::debug!(pad = %pad.name, %id, "stage: pad released");
        if !self.implicit() {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Looks a pad up by name.
    pub fn pad_id(&self, name: &str) -> Option<PadId> {
        self.pads.find(name)
    }

    /// Name of a pad.
    pub fn pad_name(&self, id: PadId) -> Option<&str> {
        self.pads.get(id).map(|p| p.name.as_str())
    }

    /// Direction of a pad.
    pub fn pad_direction(&self, id: PadId) -> Option<PadDirection> {
        self.pads.get(id).map(|p| p.direction())
    }

    /// Every pad in creation order.
    pub fn pads(&self) -> impl Iterator<Item = (PadId, &str, PadDirection)> {
        self.pads
            .iter()
            .map(|(id, p)| (id, p.name.as_str(), p.direction()))
    }

    /// `true` while the pad is bound to a filter of a configured graph.
    pub fn pad_is_bound(&self, id: PadId) -> bool {
        self.pads.get(id).is_some_and(|p| p.native.is_some())
    }

    /// Flow definition of an input pad, or published by an output pad.
    pub fn pad_flow_def(&self, id: PadId) -> Option<&FlowDef> {
        let pad = self.pads.get(id)?;
        match (pad.input(), pad.output()) {
            (Some(input), _) => input.flow_def.as_ref(),
            (_, Some(output)) => output.port.flow_def(),
            _ => None,
        }
    }

    /// Latency advertised by an output pad.
    pub fn pad_latency(&self, id: PadId) -> Option<u64> {
        self.pads
            .get(id)
            .and_then(|p| p.output())
            .map(|o| o.tracker.latency())
    }

    /// Buffers an output pad holds back until they are due.
    pub fn retained(&self, id: PadId) -> usize {
        self.pads
            .get(id)
            .and_then(|p| p.output())
            .map_or(0, |o| o.retained.len())
    }

    /// Sets the format of a named input pad.
    ///
    /// A format equal to the current one changes nothing; any other format
    /// rebuilds the graph.
    pub fn set_pad_format(&mut self, id: PadId, flow_def: &FlowDef) -> Result<(), StageError> {
        let media = MediaDescriptor::from_flow_def(flow_def)?;
        let pad = self
            .pads
            .get_mut(id)
            .ok_or_else(|| StageError::invalid(format!("no pad {id}")))?;
        let name = pad.name.clone();
        let input = pad
            .input_mut()
            .ok_or_else(|| StageError::invalid(format!("pad '{name}' is not an input")))?;
        let unchanged = input.media.as_ref().is_some_and(|m| m.same_format(&media));
        input.flow_def = Some(flow_def.clone());
        if unchanged {
            tracing::debug!(pad = %name, "stage: same input format");
            input.media = Some(media);
            return Ok(());
        }
        tracing::debug!(pad = %name, kind = ?media.kind(), "stage: new input format");
        input.media = Some(media);
        self.rebuild()
    }

    /// Sets the format of the single input.
    ///
    /// Needs a description and no named input pad. An equal format is a
    /// no-op; another one rebuilds the graph, which then waits for its first
    /// frame.
    pub fn set_input_format(&mut self, flow_def: &FlowDef) -> Result<(), StageError> {
        if self.pads.has(PadDirection::Input) {
            return Err(StageError::invalid("stage has named input pads"));
        }
        if self.graph.description().is_none() {
            return Err(StageError::invalid("no filter description"));
        }
        let media = MediaDescriptor::from_flow_def(flow_def)?;
        let unchanged = self.graph.state() != GraphState::Absent
            && self.main.media.as_ref().is_some_and(|m| m.same_format(&media));
        self.main.flow_def = Some(flow_def.clone());
        self.main.media = Some(media);
        if unchanged {
            tracing::debug!("stage: same input format");
            return Ok(());
        }
        self.rebuild()
    }

    /// Flow definition of the single input.
    pub fn input_format(&self) -> Option<&FlowDef> {
        self.main.flow_def.as_ref()
    }

    // -----------------------------------------------------------------------
    // Outputs
    // -----------------------------------------------------------------------

    /// Attaches the consumer of an output pad.
    pub fn attach_output(&mut self, id: PadId, sink: Box<dyn OutputSink>) -> Result<(), StageError> {
        let output = self.output_mut(id)?;
        output.port.attach(sink);
        output.wakeup = Some(Wakeup::Now);
        Ok(())
    }

    /// Attaches the consumer of the main output.
    pub fn attach_main_output(&mut self, sink: Box<dyn OutputSink>) {
        self.main.port.attach(sink);
    }

    /// Flow definition published on the main output.
    pub fn output_format(&self) -> Option<&FlowDef> {
        self.main.port.flow_def()
    }

    /// Buffer allocator for every output that has none, and for later ones.
    pub fn set_allocator(&mut self, allocator: BufferAllocator) {
        for (_, pad) in self.pads.iter_mut() {
            if let Some(output) = pad.output_mut()
                && !output.port.has_allocator()
            {
                output.port.set_allocator(allocator.clone());
                output.wakeup = Some(Wakeup::Now);
            }
        }
        if !self.main.port.has_allocator() {
            self.main.port.set_allocator(allocator.clone());
        }
        self.allocator = Some(allocator);
    }

    /// Buffer allocator of one output pad.
    pub fn set_pad_allocator(&mut self, id: PadId, allocator: BufferAllocator) -> Result<(), StageError> {
        let output = self.output_mut(id)?;
        output.port.set_allocator(allocator);
        output.wakeup = Some(Wakeup::Now);
        Ok(())
    }

    fn output_mut(&mut self, id: PadId) -> Result<&mut crate::pad::OutputPad, StageError> {
        let pad = self
            .pads
            .get_mut(id)
            .ok_or_else(|| StageError::invalid(format!("no pad {id}")))?;
        let name = pad.name.clone();
        pad.output_mut()
            .ok_or_else(|| StageError::invalid(format!("pad '{name}' is not an output")))
    }

    pub(crate) fn configured_graph(&mut self) -> Option<&mut (dyn FilterGraph + 'static)> {
        self.graph.configured_graph()
    }
}
