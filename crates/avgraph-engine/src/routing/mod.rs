//! Reference engine that routes frames without processing them.
//!
//! [`RoutingEngine`] implements [`Engine`] with the filters listed in
//! [`filter::FILTERS`]. Graphs are stored as a node arena plus a link list;
//! configuration checks every pad is linked, orders the nodes with Kahn's
//! algorithm and propagates stream parameters from sources to sinks. Pushed
//! frames travel through the graph immediately and wait in sink queues.
//!
//! ```rust
//! use avgraph_engine::routing::RoutingEngine;
//! use avgraph_engine::{Engine, InOut, PixelFormat, Ratio, StreamParams, VideoParams};
//!
//! let engine = RoutingEngine::new();
//! let mut graph = engine.alloc_graph().unwrap();
//! let src = graph.alloc_filter("buffer", "in").unwrap();
//! graph
//!     .set_source_params(src, &StreamParams::Video(VideoParams::new(
//!         Ratio::new(1, 25),
//!         PixelFormat::Yuv420p,
//!         64,
//!         32,
//!     )))
//!     .unwrap();
//! graph.init_filter(src, None).unwrap();
//!
//! let open = graph.parse("null", vec![], vec![InOut::named("in", src, 0)]).unwrap();
//! assert!(open.inputs.is_empty());
//! assert_eq!(open.outputs[0].name.as_deref(), Some("out"));
//! ```

pub mod desc;
pub mod filter;

use std::collections::VecDeque;

use crate::error::{EngineError, PullError};
use crate::format::MediaType;
use crate::frame::NativeFrame;
use crate::graph::{Engine, FilterGraph, FilterId, FilterInfo, InOut, ParsedLinks, StreamParams};
use crate::hw::{HwDevice, HwDeviceType};

use self::filter::{FILTERS, FilterKind};

/// Graph options the routing engine accepts.
pub const GRAPH_OPTIONS: &[&str] = &["threads", "thread_type", "scale_sws_opts", "aresample_swr_opts"];

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Engine handing out [`RoutingGraph`]s.
#[derive(Debug, Clone, Default)]
pub struct RoutingEngine {
    hw_devices: Vec<HwDeviceType>,
}

impl RoutingEngine {
    /// An engine with no hardware devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine that can open devices of the given types.
    pub fn with_hw_devices(types: &[HwDeviceType]) -> Self {
        Self {
            hw_devices: types.to_vec(),
        }
    }
}

impl Engine for RoutingEngine {
    fn name(&self) -> &str {
        "routing"
    }

    fn alloc_graph(&self) -> Result<Box<dyn FilterGraph>, EngineError> {
        Ok(Box::new(RoutingGraph::new()))
    }

    fn filter_names(&self) -> Vec<&'static str> {
        FILTERS.iter().map(|(name, _)| *name).collect()
    }

    fn create_hw_device(
        &self,
        kind: HwDeviceType,
        device: Option<&str>,
    ) -> Result<HwDevice, EngineError> {
        if self.hw_devices.contains(&kind) {
            Ok(HwDevice::new(kind, device))
        } else {
            Err(EngineError::Device {
                kind: kind.name().to_string(),
                reason: "no such device".to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Graph storage
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Node {
    instance: String,
    kind: FilterKind,
    initialized: bool,
    enabled: bool,
    inputs: Vec<Option<usize>>,
    outputs: Vec<Option<usize>>,
    hw_device: Option<(HwDevice, u32)>,
    source: Option<StreamParams>,
    closed: bool,
    queue: VecDeque<NativeFrame>,
    eof: bool,
}

impl Node {
    fn new(instance: &str, kind: FilterKind) -> Self {
        Self {
            instance: instance.to_string(),
            inputs: vec![None; kind.inputs()],
            outputs: vec![None; kind.outputs()],
            kind,
            initialized: false,
            enabled: true,
            hw_device: None,
            source: None,
            closed: false,
            queue: VecDeque::new(),
            eof: false,
        }
    }
}

#[derive(Debug)]
struct Link {
    from: FilterId,
    from_pad: usize,
    to: FilterId,
    to_pad: usize,
    params: Option<StreamParams>,
}

enum Message {
    Frame(NativeFrame),
    Eof,
}

/// An input waiting for a producer while a description is linked.
enum Pending {
    Output(InOut),
    Label(String),
}

fn take_named(list: &mut Vec<InOut>, name: &str) -> Option<InOut> {
    let i = list.iter().position(|io| io.name.as_deref() == Some(name))?;
    Some(list.remove(i))
}

/// A graph of routing filters.
#[derive(Debug)]
pub struct RoutingGraph {
    nodes: Vec<Option<Node>>,
    links: Vec<Option<Link>>,
    options: Vec<(String, String)>,
    auto_convert: bool,
    configured: bool,
}

impl Default for RoutingGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            options: Vec::new(),
            auto_convert: true,
            configured: false,
        }
    }

    /// Current value of a graph option.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether automatic conversion is enabled.
    pub fn auto_convert(&self) -> bool {
        self.auto_convert
    }

    /// Hardware device attached to a filter.
    pub fn hw_device(&self, id: FilterId) -> Option<&HwDevice> {
        self.node(id).ok()?.hw_device.as_ref().map(|(d, _)| d)
    }

    fn node(&self, id: FilterId) -> Result<&Node, EngineError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(EngineError::FilterNotFound(id))
    }

    fn node_mut(&mut self, id: FilterId) -> Result<&mut Node, EngineError> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(EngineError::FilterNotFound(id))
    }

    fn live(&self) -> impl Iterator<Item = (FilterId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (FilterId(i as u32), n)))
    }

    fn link(
        &mut self,
        from: FilterId,
        from_pad: usize,
        to: FilterId,
        to_pad: usize,
    ) -> Result<(), EngineError> {
        let src = self.node(from)?;
        let dst = self.node(to)?;
        let label = |n: &Node, pad: usize| format!("{}:{pad}", n.instance);
        match src.outputs.get(from_pad) {
            Some(None) => {}
            Some(Some(_)) => {
                return Err(EngineError::Link(format!(
                    "output {} is already linked",
                    label(src, from_pad)
                )));
            }
            None => {
                return Err(EngineError::Link(format!("no output {}", label(src, from_pad))));
            }
        }
        match dst.inputs.get(to_pad) {
            Some(None) => {}
            Some(Some(_)) => {
                return Err(EngineError::Link(format!(
                    "input {} is already linked",
                    label(dst, to_pad)
                )));
            }
            None => return Err(EngineError::Link(format!("no input {}", label(dst, to_pad)))),
        }
        if src.kind.media() != dst.kind.media() {
            return Err(EngineError::Link(format!(
                "media type mismatch between {} ({}) and {} ({})",
                label(src, from_pad),
                src.kind.media(),
                label(dst, to_pad),
                dst.kind.media()
            )));
        }

        let idx = self.links.len();
        self.links.push(Some(Link {
            from,
            from_pad,
            to,
            to_pad,
            params: None,
        }));
        self.node_mut(from)?.outputs[from_pad] = Some(idx);
        self.node_mut(to)?.inputs[to_pad] = Some(idx);
        Ok(())
    }

    fn instantiate(&mut self, spec: &desc::FilterSpec, index: usize) -> Result<FilterId, EngineError> {
        let instance = match &spec.instance {
            Some(inst) => format!("{}@{inst}", spec.filter),
            None => format!("Parsed_{}_{index}", spec.filter),
        };
        let id = self.alloc_filter(&spec.filter, &instance)?;
        self.init_filter(id, spec.args.as_deref())?;
        Ok(id)
    }

    /// Kahn ordering of live nodes, sources first.
    fn kahn_sort(&self) -> Result<Vec<FilterId>, EngineError> {
        let n = self.nodes.len();
        let mut in_degree = vec![0u32; n];
        let mut active = 0usize;
        for (id, node) in self.live() {
            active += 1;
            in_degree[id.0 as usize] = node.inputs.iter().flatten().count() as u32;
        }

        let mut queue: Vec<FilterId> = self
            .live()
            .filter(|(id, _)| in_degree[id.0 as usize] == 0)
            .map(|(id, _)| id)
            .collect();
        queue.reverse();

        let mut sorted = Vec::with_capacity(active);
        while let Some(id) = queue.pop() {
            sorted.push(id);
            let node = self.node(id)?;
            for link in node.outputs.iter().flatten() {
                if let Some(link) = &self.links[*link] {
                    let to = link.to.0 as usize;
                    in_degree[to] -= 1;
                    if in_degree[to] == 0 {
                        queue.push(link.to);
                    }
                }
            }
        }

        if sorted.len() != active {
            return Err(EngineError::Config("graph contains a cycle".to_string()));
        }
        Ok(sorted)
    }

    fn check_frame(params: &StreamParams, frame: &NativeFrame) -> Result<(), EngineError> {
        match (params, &frame.props) {
            (StreamParams::Video(p), crate::frame::FrameProps::Video(v)) => {
                if p.format != v.format || p.width != v.width || p.height != v.height {
                    return Err(EngineError::InvalidData(format!(
                        "frame {}x{} {} does not match source {}x{} {}",
                        v.width, v.height, v.format, p.width, p.height, p.format
                    )));
                }
                Ok(())
            }
            (StreamParams::Audio(p), crate::frame::FrameProps::Audio(a)) => {
                if p.format != a.format || p.sample_rate != a.sample_rate || p.layout != a.layout {
                    return Err(EngineError::InvalidData(format!(
                        "frame {} {} Hz {} does not match source {} {} Hz {}",
                        a.format, a.sample_rate, a.layout, p.format, p.sample_rate, p.layout
                    )));
                }
                Ok(())
            }
            _ => Err(EngineError::InvalidData(format!(
                "{} frame pushed to {} source",
                frame.media_type(),
                params.media_type()
            ))),
        }
    }

    /// Moves a message from `source` through the graph into sink queues.
    fn route(&mut self, source: FilterId, message: Message) -> Result<(), EngineError> {
        let mut work: VecDeque<(FilterId, Message)> = VecDeque::new();
        work.push_back((source, message));

        while let Some((id, message)) = work.pop_front() {
            let node = self.node_mut(id)?;
            if node.kind.is_sink() {
                match message {
                    Message::Frame(frame) => node.queue.push_back(frame),
                    Message::Eof => node.eof = true,
                }
                continue;
            }

            let message = match message {
                Message::Frame(frame) if node.kind == FilterKind::Copy && node.enabled => {
                    Message::Frame(frame.deep_copy())
                }
                m => m,
            };
            let outputs: Vec<usize> = node.outputs.iter().flatten().copied().collect();
            let targets: Vec<FilterId> = outputs
                .iter()
                .filter_map(|l| self.links[*l].as_ref().map(|l| l.to))
                .collect();

            let last = targets.len().saturating_sub(1);
            let mut message = Some(message);
            for (i, to) in targets.into_iter().enumerate() {
                let m = if i == last {
                    message.take()
                } else {
                    message.as_ref().map(|m| match m {
                        Message::Frame(f) => Message::Frame(f.clone()),
                        Message::Eof => Message::Eof,
                    })
                };
                if let Some(m) = m {
                    work.push_back((to, m));
                }
            }
        }
        Ok(())
    }
}

impl FilterGraph for RoutingGraph {
    fn set_option(&mut self, key: &str, value: Option<&str>) -> Result<(), EngineError> {
        if !GRAPH_OPTIONS.contains(&key) {
            return Err(EngineError::UnknownOption(key.to_string()));
        }
        let Some(value) = value else {
            self.options.retain(|(k, _)| k != key);
            return Ok(());
        };
        if key == "threads" && value != "auto" && value.parse::<u32>().is_err() {
            return Err(EngineError::InvalidArgument(format!(
                "threads: '{value}' is not a number"
            )));
        }
        match self.options.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.options.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn set_auto_convert(&mut self, enabled: bool) {
        self.auto_convert = enabled;
    }

    fn alloc_filter(&mut self, filter: &str, instance: &str) -> Result<FilterId, EngineError> {
        if self.configured {
            return Err(EngineError::AlreadyConfigured);
        }
        let kind =
            FilterKind::from_name(filter).ok_or_else(|| EngineError::UnknownFilter(filter.to_string()))?;
        let id = FilterId(self.nodes.len() as u32);
        self.nodes.push(Some(Node::new(instance, kind)));
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_add: {filter} as '{instance}' {id}");
        Ok(id)
    }

    fn init_filter(&mut self, id: FilterId, args: Option<&str>) -> Result<(), EngineError> {
        let node = self.node_mut(id)?;
        if node.initialized {
            return Err(EngineError::InvalidArgument(format!(
                "filter '{}' is already initialised",
                node.instance
            )));
        }
        if let Some(args) = args {
            node.kind.apply_args(args)?;
            node.outputs = vec![None; node.kind.outputs()];
        }
        node.initialized = true;
        Ok(())
    }

    fn free_filter(&mut self, id: FilterId) {
        let Some(node) = self.nodes.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        for idx in node.inputs.iter().chain(node.outputs.iter()).flatten() {
            if let Some(link) = self.links[*idx].take() {
                if let Some(Some(n)) = self.nodes.get_mut(link.from.0 as usize) {
                    n.outputs[link.from_pad] = None;
                }
                if let Some(Some(n)) = self.nodes.get_mut(link.to.0 as usize) {
                    n.inputs[link.to_pad] = None;
                }
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_remove: '{}' {id}", node.instance);
    }

    fn set_source_params(&mut self, id: FilterId, params: &StreamParams) -> Result<(), EngineError> {
        if self.configured {
            return Err(EngineError::AlreadyConfigured);
        }
        let node = self.node_mut(id)?;
        if !node.kind.is_source() {
            return Err(EngineError::InvalidArgument(format!(
                "filter '{}' is not a source",
                node.instance
            )));
        }
        if node.kind.media() != params.media_type() {
            return Err(EngineError::InvalidArgument(format!(
                "{} parameters for {} source '{}'",
                params.media_type(),
                node.kind.media(),
                node.instance
            )));
        }
        node.source = Some(params.clone());
        Ok(())
    }

    fn parse(
        &mut self,
        description: &str,
        inputs: Vec<InOut>,
        outputs: Vec<InOut>,
    ) -> Result<ParsedLinks, EngineError> {
        if self.configured {
            return Err(EngineError::AlreadyConfigured);
        }
        let chains = desc::parse(description)?;
        let mut open_inputs = inputs;
        let mut open_outputs = outputs;
        let mut index = 0usize;

        for (ci, chain) in chains.iter().enumerate() {
            let mut carried: Vec<InOut> = Vec::new();
            for spec in chain {
                let id = self.instantiate(spec, index)?;
                let kind = self.node(id)?.kind.clone();

                let mut pending: Vec<Pending> = spec
                    .inputs
                    .iter()
                    .map(|label| match take_named(&mut open_outputs, label) {
                        Some(out) => Pending::Output(out),
                        None => Pending::Label(label.clone()),
                    })
                    .collect();
                pending.extend(carried.drain(..).map(Pending::Output));
                if pending.is_empty() && index == 0 && kind.inputs() == 1 {
                    pending.push(match take_named(&mut open_outputs, "in") {
                        Some(out) => Pending::Output(out),
                        None => Pending::Label("in".to_string()),
                    });
                }

                let mut pending = pending.into_iter();
                for pad in 0..kind.inputs() {
                    match pending.next() {
                        Some(Pending::Output(out)) => self.link(out.filter, out.pad, id, pad)?,
                        Some(Pending::Label(name)) => open_inputs.push(InOut {
                            name: Some(name),
                            filter: id,
                            pad,
                        }),
                        None => open_inputs.push(InOut {
                            name: None,
                            filter: id,
                            pad,
                        }),
                    }
                }
                if pending.next().is_some() {
                    return Err(EngineError::Link(format!(
                        "too many inputs specified for the '{}' filter",
                        kind.name()
                    )));
                }

                let mut outs: VecDeque<InOut> = (0..kind.outputs())
                    .map(|pad| InOut {
                        name: None,
                        filter: id,
                        pad,
                    })
                    .collect();
                for label in &spec.outputs {
                    let Some(mut out) = outs.pop_front() else {
                        return Err(EngineError::Link(format!(
                            "no output pad can be associated to link label '{label}'"
                        )));
                    };
                    match take_named(&mut open_inputs, label) {
                        Some(input) => self.link(out.filter, out.pad, input.filter, input.pad)?,
                        None => {
                            out.name = Some(label.clone());
                            open_outputs.push(out);
                        }
                    }
                }
                carried.extend(outs);
                index += 1;
            }

            if ci + 1 == chains.len() && !carried.is_empty() {
                let mut out = carried.remove(0);
                match take_named(&mut open_inputs, "out") {
                    Some(input) => self.link(out.filter, out.pad, input.filter, input.pad)?,
                    None => {
                        out.name = Some("out".to_string());
                        open_outputs.push(out);
                    }
                }
            }
            open_outputs.append(&mut carried);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "graph_parse: {index} filters, {} open inputs, {} open outputs",
            open_inputs.len(),
            open_outputs.len()
        );
        Ok(ParsedLinks {
            inputs: open_inputs,
            outputs: open_outputs,
        })
    }

    fn output_type(&self, id: FilterId, pad: usize) -> Option<MediaType> {
        let node = self.node(id).ok()?;
        (pad < node.outputs.len()).then(|| node.kind.media())
    }

    fn input_type(&self, id: FilterId, pad: usize) -> Option<MediaType> {
        let node = self.node(id).ok()?;
        (pad < node.inputs.len()).then(|| node.kind.media())
    }

    fn filters(&self) -> Vec<FilterInfo> {
        self.live()
            .map(|(id, node)| FilterInfo {
                id,
                instance: node.instance.clone(),
                filter: node.kind.name().to_string(),
            })
            .collect()
    }

    fn set_hw_device(
        &mut self,
        id: FilterId,
        device: &HwDevice,
        extra_frames: u32,
    ) -> Result<(), EngineError> {
        self.node_mut(id)?.hw_device = Some((device.clone(), extra_frames));
        Ok(())
    }

    fn configure(&mut self) -> Result<(), EngineError> {
        if self.configured {
            return Err(EngineError::AlreadyConfigured);
        }
        for (_, node) in self.live() {
            if !node.initialized {
                return Err(EngineError::Config(format!(
                    "filter '{}' is not initialised",
                    node.instance
                )));
            }
            if let Some(pad) = node.inputs.iter().position(Option::is_none) {
                return Err(EngineError::Config(format!(
                    "input pad {pad} of filter '{}' is not connected",
                    node.instance
                )));
            }
            if let Some(pad) = node.outputs.iter().position(Option::is_none) {
                return Err(EngineError::Config(format!(
                    "output pad {pad} of filter '{}' is not connected",
                    node.instance
                )));
            }
            if node.kind.is_source() && node.source.is_none() {
                return Err(EngineError::Config(format!(
                    "source '{}' has no stream parameters",
                    node.instance
                )));
            }
        }

        let order = self.kahn_sort()?;
        for id in &order {
            let node = self.node(*id)?;
            if node.kind.is_sink() {
                continue;
            }
            let params = if node.kind.is_source() {
                node.source.clone()
            } else {
                node.inputs[0].and_then(|l| self.links[l].as_ref().and_then(|l| l.params.clone()))
            };
            let Some(params) = params else {
                return Err(EngineError::Config(format!(
                    "no stream parameters reach '{}'",
                    node.instance
                )));
            };
            if let (FilterKind::Copy, StreamParams::Video(v)) = (&node.kind, &params)
                && v.format.is_hw()
            {
                return Err(EngineError::Config(format!(
                    "'{}' cannot copy {} hardware frames",
                    node.instance, v.format
                )));
            }
            let outputs: Vec<usize> = node.outputs.iter().flatten().copied().collect();
            for l in outputs {
                if let Some(link) = self.links[l].as_mut() {
                    link.params = Some(params.clone());
                }
            }
        }

        self.configured = true;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_config: {} filters configured", order.len());
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn push_frame(&mut self, source: FilterId, frame: NativeFrame) -> Result<(), EngineError> {
        if !self.configured {
            return Err(EngineError::NotConfigured);
        }
        let node = self.node(source)?;
        if !node.kind.is_source() {
            return Err(EngineError::InvalidArgument(format!(
                "filter '{}' is not a source",
                node.instance
            )));
        }
        if node.closed {
            return Err(EngineError::SourceClosed(source));
        }
        if let Some(params) = &node.source {
            Self::check_frame(params, &frame)?;
        }
        self.route(source, Message::Frame(frame))
    }

    fn close_source(&mut self, source: FilterId) -> Result<(), EngineError> {
        if !self.configured {
            return Err(EngineError::NotConfigured);
        }
        let node = self.node_mut(source)?;
        if !node.kind.is_source() {
            return Err(EngineError::InvalidArgument(format!(
                "filter '{}' is not a source",
                node.instance
            )));
        }
        if node.closed {
            return Ok(());
        }
        node.closed = true;
        self.route(source, Message::Eof)
    }

    fn pull_frame(&mut self, sink: FilterId) -> Result<NativeFrame, PullError> {
        if !self.configured {
            return Err(EngineError::NotConfigured.into());
        }
        let node = self.node_mut(sink)?;
        if !node.kind.is_sink() {
            return Err(EngineError::InvalidArgument(format!(
                "filter '{}' is not a sink",
                node.instance
            ))
            .into());
        }
        match node.queue.pop_front() {
            Some(frame) => Ok(frame),
            None if node.eof => Err(PullError::EndOfStream),
            None => Err(PullError::WouldBlock),
        }
    }

    fn sink_params(&self, sink: FilterId) -> Result<StreamParams, EngineError> {
        let node = self.node(sink)?;
        if !node.kind.is_sink() {
            return Err(EngineError::InvalidArgument(format!(
                "filter '{}' is not a sink",
                node.instance
            )));
        }
        node.inputs[0]
            .and_then(|l| self.links[l].as_ref())
            .and_then(|l| l.params.clone())
            .ok_or(EngineError::NotConfigured)
    }

    fn send_command(
        &mut self,
        target: &str,
        command: &str,
        arg: &str,
    ) -> Result<String, EngineError> {
        let mut handled = false;
        for node in self.nodes.iter_mut().flatten() {
            let matches =
                target == "all" || node.instance == target || node.kind.name() == target;
            if !matches || command != "enable" || !node.kind.has_timeline() {
                continue;
            }
            node.enabled = match arg.trim() {
                "1" | "true" => true,
                "0" | "false" => false,
                other => {
                    return Err(EngineError::InvalidArgument(format!(
                        "enable: '{other}' is not a boolean"
                    )));
                }
            };
            handled = true;
        }
        if handled {
            Ok(String::new())
        } else {
            Err(EngineError::NotSupported(format!(
                "command '{command}' for target '{target}'"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ChannelLayout, PixelFormat, Ratio, SampleFormat};
    use crate::frame::{AudioProps, VideoProps};
    use crate::graph::{AudioParams, VideoParams};

    fn video_params() -> StreamParams {
        StreamParams::Video(VideoParams::new(Ratio::new(1, 25), PixelFormat::Gray, 4, 2))
    }

    fn audio_params() -> StreamParams {
        StreamParams::Audio(AudioParams {
            time_base: Ratio::new(1, 48000),
            format: SampleFormat::S16,
            sample_rate: 48000,
            layout: ChannelLayout::STEREO,
        })
    }

    fn source(graph: &mut RoutingGraph, filter: &str, name: &str, params: StreamParams) -> FilterId {
        let id = graph.alloc_filter(filter, name).unwrap();
        graph.set_source_params(id, &params).unwrap();
        graph.init_filter(id, None).unwrap();
        id
    }

    fn frame(pts: i64) -> NativeFrame {
        let mut f = NativeFrame::alloc_video(VideoProps::new(PixelFormat::Gray, 4, 2));
        f.pts = Some(pts);
        f
    }

    fn sink_named(graph: &RoutingGraph, name: &str) -> FilterId {
        graph
            .filters()
            .into_iter()
            .find(|f| f.instance == name)
            .unwrap()
            .id
    }

    #[test]
    fn default_labels_apply_to_first_and_last_filter() {
        let mut g = RoutingGraph::new();
        let src = source(&mut g, "buffer", "in", video_params());
        let open = g.parse("null,fifo", vec![], vec![InOut::named("in", src, 0)]).unwrap();
        assert!(open.inputs.is_empty());
        assert_eq!(open.outputs.len(), 1);
        assert_eq!(open.outputs[0].name.as_deref(), Some("out"));
        let names: Vec<_> = g.filters().into_iter().map(|f| f.instance).collect();
        assert_eq!(names, ["in", "Parsed_null_0", "Parsed_fifo_1"]);
    }

    #[test]
    fn unknown_labels_stay_open() {
        let mut g = RoutingGraph::new();
        let open = g.parse("[a]null[b];[c]anull", vec![], vec![]).unwrap();
        let inputs: Vec<_> = open.inputs.iter().map(|i| i.name.clone()).collect();
        assert_eq!(inputs, [Some("a".to_string()), Some("c".to_string())]);
        let outputs: Vec<_> = open.outputs.iter().map(|o| o.name.clone()).collect();
        assert_eq!(outputs, [Some("b".to_string()), Some("out".to_string())]);
    }

    #[test]
    fn labels_link_across_chains_in_either_order() {
        let mut g = RoutingGraph::new();
        let src = source(&mut g, "buffer", "in", video_params());
        let open = g
            .parse(
                "[x]null[o1];[in]split[x][y];[y]null[o2]",
                vec![],
                vec![InOut::named("in", src, 0)],
            )
            .unwrap();
        assert!(open.inputs.is_empty());
        let mut names: Vec<_> = open.outputs.iter().filter_map(|o| o.name.clone()).collect();
        names.sort();
        assert_eq!(names, ["o1", "o2"]);
    }

    #[test]
    fn mismatched_media_cannot_link() {
        let mut g = RoutingGraph::new();
        let src = source(&mut g, "abuffer", "in", audio_params());
        let err = g.parse("null", vec![], vec![InOut::named("in", src, 0)]).unwrap_err();
        assert!(matches!(err, EngineError::Link(_)));
    }

    #[test]
    fn too_many_labels_are_rejected() {
        let mut g = RoutingGraph::new();
        assert!(matches!(g.parse("null[a][b]", vec![], vec![]), Err(EngineError::Link(_))));
        let mut g = RoutingGraph::new();
        assert!(matches!(g.parse("[a][b]null", vec![], vec![]), Err(EngineError::Link(_))));
    }

    #[test]
    fn configure_requires_connected_pads() {
        let mut g = RoutingGraph::new();
        let src = source(&mut g, "buffer", "in", video_params());
        g.parse("null", vec![], vec![InOut::named("in", src, 0)]).unwrap();
        let err = g.configure().unwrap_err();
        assert!(matches!(err, EngineError::Config(msg) if msg.contains("not connected")));
        assert!(!g.is_configured());
    }

    #[test]
    fn configure_requires_source_params() {
        let mut g = RoutingGraph::new();
        let src = g.alloc_filter("buffer", "in").unwrap();
        g.init_filter(src, None).unwrap();
        let open = g.parse("null", vec![], vec![InOut::named("in", src, 0)]).unwrap();
        g.parse("[out]buffersink", vec![], open.outputs).unwrap();
        assert!(matches!(g.configure(), Err(EngineError::Config(_))));
    }

    fn configured_split() -> (RoutingGraph, FilterId, FilterId, FilterId) {
        let mut g = RoutingGraph::new();
        let src = source(&mut g, "buffer", "in", video_params());
        let open = g
            .parse("split[a][b]", vec![], vec![InOut::named("in", src, 0)])
            .unwrap();
        g.parse("[a]buffersink@a;[b]copy,buffersink@b", vec![], open.outputs)
            .unwrap();
        g.configure().unwrap();
        let a = sink_named(&g, "buffersink@a");
        let b = sink_named(&g, "buffersink@b");
        (g, src, a, b)
    }

    #[test]
    fn frames_fan_out_to_every_sink() {
        let (mut g, src, a, b) = configured_split();
        let f = frame(3);
        let plane = f.planes[0].data.clone();
        g.push_frame(src, f).unwrap();

        let fa = g.pull_frame(a).unwrap();
        let fb = g.pull_frame(b).unwrap();
        assert_eq!(fa.pts, Some(3));
        assert_eq!(fb.pts, Some(3));
        assert!(std::sync::Arc::ptr_eq(&fa.planes[0].data, &plane));
        assert!(!std::sync::Arc::ptr_eq(&fb.planes[0].data, &plane));
        assert_eq!(g.pull_frame(a).unwrap_err(), PullError::WouldBlock);
    }

    #[test]
    fn close_source_ends_every_sink() {
        let (mut g, src, a, b) = configured_split();
        g.push_frame(src, frame(0)).unwrap();
        g.close_source(src).unwrap();
        assert!(g.pull_frame(a).is_ok());
        assert_eq!(g.pull_frame(a).unwrap_err(), PullError::EndOfStream);
        assert!(g.pull_frame(b).is_ok());
        assert_eq!(g.pull_frame(b).unwrap_err(), PullError::EndOfStream);
        assert_eq!(g.push_frame(src, frame(1)).unwrap_err(), EngineError::SourceClosed(src));
    }

    #[test]
    fn sink_params_follow_the_source() {
        let (g, _, a, _) = configured_split();
        assert_eq!(g.sink_params(a).unwrap(), video_params());
    }

    #[test]
    fn push_rejects_mismatched_frames() {
        let (mut g, src, _, _) = configured_split();
        let bad = NativeFrame::alloc_video(VideoProps::new(PixelFormat::Gray, 8, 8));
        assert!(matches!(g.push_frame(src, bad), Err(EngineError::InvalidData(_))));
        let audio = NativeFrame::alloc_audio(AudioProps {
            format: SampleFormat::S16,
            layout: ChannelLayout::STEREO,
            sample_rate: 48000,
            nb_samples: 4,
        });
        assert!(matches!(g.push_frame(src, audio), Err(EngineError::InvalidData(_))));
    }

    #[test]
    fn unconfigured_graph_refuses_data() {
        let mut g = RoutingGraph::new();
        let src = source(&mut g, "buffer", "in", video_params());
        assert_eq!(g.push_frame(src, frame(0)).unwrap_err(), EngineError::NotConfigured);
        assert_eq!(
            g.pull_frame(src).unwrap_err(),
            PullError::Engine(EngineError::NotConfigured)
        );
    }

    #[test]
    fn cycles_are_rejected_at_configure() {
        let mut g = RoutingGraph::new();
        g.parse("[a]null[b];[b]null[a]", vec![], vec![]).unwrap();
        assert!(matches!(g.configure(), Err(EngineError::Config(m)) if m.contains("cycle")));
    }

    #[test]
    fn freed_filter_unlinks_neighbours() {
        let mut g = RoutingGraph::new();
        let src = source(&mut g, "buffer", "in", video_params());
        g.parse("null", vec![], vec![InOut::named("in", src, 0)]).unwrap();
        let null = sink_named(&g, "Parsed_null_0");
        g.free_filter(null);
        let open = g.parse("null", vec![], vec![InOut::named("in", src, 0)]).unwrap();
        assert!(open.inputs.is_empty());
        assert!(g.filters().iter().all(|f| f.id != null));
    }

    #[test]
    fn options_are_validated() {
        let mut g = RoutingGraph::new();
        g.set_option("threads", Some("4")).unwrap();
        assert_eq!(g.option("threads"), Some("4"));
        assert!(matches!(
            g.set_option("threads", Some("lots")),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            g.set_option("nope", Some("1")),
            Err(EngineError::UnknownOption(_))
        ));
        g.set_option("threads", None).unwrap();
        assert_eq!(g.option("threads"), None);
    }

    #[test]
    fn enable_command_targets_by_instance_or_type() {
        let (mut g, _, _, _) = configured_split();
        assert_eq!(g.send_command("copy", "enable", "0").unwrap(), "");
        assert_eq!(g.send_command("all", "enable", "1").unwrap(), "");
        assert!(matches!(
            g.send_command("split", "enable", "0"),
            Err(EngineError::NotSupported(_))
        ));
        assert!(matches!(
            g.send_command("all", "enable", "maybe"),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn disabled_copy_passes_planes_through() {
        let (mut g, src, _, b) = configured_split();
        g.send_command("Parsed_copy_1", "enable", "0").unwrap();
        let f = frame(1);
        let plane = f.planes[0].data.clone();
        g.push_frame(src, f).unwrap();
        let out = g.pull_frame(b).unwrap();
        assert!(std::sync::Arc::ptr_eq(&out.planes[0].data, &plane));
    }

    #[test]
    fn hw_devices_only_when_available() {
        let engine = RoutingEngine::with_hw_devices(&[HwDeviceType::Vaapi]);
        let dev = engine
            .create_hw_device(HwDeviceType::Vaapi, Some("/dev/dri/renderD128"))
            .unwrap();
        assert_eq!(dev.device(), Some("/dev/dri/renderD128"));
        assert!(matches!(
            engine.create_hw_device(HwDeviceType::Cuda, None),
            Err(EngineError::Device { .. })
        ));
    }
}
