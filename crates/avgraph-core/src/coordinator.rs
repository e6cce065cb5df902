//! Pad Coordinator: the data path between pads and the graph.
//!
//! Input buffers are bridged into native frames and pushed into the source
//! bound to their pad. Every push asks each output pad to drain. Draining is
//! non-blocking: frames are pulled from the pad's sink until the engine has
//! nothing more, stamped by the pad's [`ClockTracker`](crate::ClockTracker),
//! and either handed downstream or retained until their system time is due.
//! A retained buffer at the head of a pad's queue holds back everything
//! behind it.

use avgraph_engine::{
    ColorRange, FilterGraph, FilterId, FrameProps, NativeFrame, PullError, Ratio, StreamParams,
};
use avgraph_media::{BufferAttrs, FlowDef, MediaBuffer, PICTURE_DEF};

use crate::bridge;
use crate::descriptor::MediaDescriptor;
use crate::error::StageError;
use crate::events::StageEvent;
use crate::formats::{
    PIPELINE_TIME_BASE, pixel_format_to_flow, rational_from_ratio, rescale_from_clock,
    rescale_to_clock, sample_format_to_flow, samples_to_clock, surface_type,
};
use crate::graph::GraphState;
use crate::pad::{OutputPad, PadDirection, PadId, Wakeup};
use crate::stage::{FilterStage, MainIo};

/// Timing and flags of a pulled frame, in pipeline units.
struct FrameTiming {
    pts: Option<u64>,
    duration: u64,
    progressive: bool,
    tff: bool,
    key: bool,
}

impl FrameTiming {
    fn of(frame: &NativeFrame, time_base: Ratio) -> Self {
        let pts = frame.pts.map(|p| rescale_to_clock(p, time_base));
        match &frame.props {
            FrameProps::Video(v) => Self {
                pts,
                duration: frame.duration.map_or(0, |d| rescale_to_clock(d, time_base)),
                progressive: !v.interlaced,
                tff: v.interlaced && v.top_field_first,
                key: v.key_frame,
            },
            FrameProps::Audio(a) => Self {
                pts,
                duration: samples_to_clock(u64::from(a.nb_samples), a.sample_rate),
                progressive: false,
                tff: false,
                key: false,
            },
        }
    }

    fn apply(&self, attrs: &mut BufferAttrs) {
        attrs.duration = Some(self.duration);
        attrs.progressive = self.progressive;
        attrs.tff = self.tff;
        attrs.key = self.key;
    }
}

/// Copies pipeline timing onto a frame entering a source.
fn stamp_input(frame: &mut NativeFrame, attrs: &BufferAttrs) {
    frame.pts = attrs
        .pts_prog
        .map(|p| rescale_from_clock(p, PIPELINE_TIME_BASE));
    frame.duration = attrs
        .duration
        .map(|d| rescale_from_clock(d, PIPELINE_TIME_BASE));
}

/// Flow definition of a sink's stream, laid over `flow`.
///
/// With `colour`, the frame's range and colour code points are copied too.
fn sink_flow_def(
    mut flow: FlowDef,
    params: &StreamParams,
    frame: &NativeFrame,
    colour: bool,
) -> Result<FlowDef, StageError> {
    match params {
        StreamParams::Video(p) => {
            if p.width == 0 || p.height == 0 {
                return Err(StageError::invalid(format!(
                    "sink reports {}x{} pictures",
                    p.width, p.height
                )));
            }
            flow.set_def(PICTURE_DEF);
            flow.clear_sound_planes();
            let format = match &p.hw_frames {
                Some(hw) => {
                    flow.set_surface_type(&surface_type(p.format));
                    hw.sw_format()
                }
                None => {
                    flow.clear_surface_type();
                    p.format
                }
            };
            pixel_format_to_flow(format, &mut flow)?;
            flow.set_hsize(u64::from(p.width));
            flow.set_vsize(u64::from(p.height));
            let fps = p
                .frame_rate
                .filter(|r| !r.is_zero())
                .unwrap_or_else(|| p.time_base.inverse());
            flow.set_fps(rational_from_ratio(fps));
            if let Some(sar) = p.sar {
                flow.set_sar(rational_from_ratio(sar));
            }
            let video = frame.video();
            flow.set_progressive(!video.is_some_and(|v| v.interlaced));
            if colour && let Some(v) = video {
                flow.set_full_range(v.color_range == ColorRange::Full);
                flow.set_colour_primaries(i64::from(v.color_primaries.0));
                flow.set_transfer_characteristics(i64::from(v.color_trc.0));
                flow.set_matrix_coefficients(i64::from(v.colorspace.0));
            }
        }
        StreamParams::Audio(p) => {
            flow.clear_pic_planes();
            flow.clear_surface_type();
            sample_format_to_flow(p.format, p.layout, &mut flow);
            flow.set_rate(u64::from(p.sample_rate));
        }
    }
    Ok(flow)
}

/// Turns a frame pulled from `sink` into a stamped buffer for `output`.
///
/// Returns the buffer and the pad's new latency when this frame raised it.
fn stamp_output(
    output: &mut OutputPad,
    graph: &dyn FilterGraph,
    sink: FilterId,
    frame: NativeFrame,
    now: Option<u64>,
) -> Result<(MediaBuffer, Option<u64>), StageError> {
    let params = graph
        .sink_params(sink)
        .map_err(|e| StageError::external("cannot read sink parameters", e))?;
    let desc = MediaDescriptor::from_stream(&params);
    let interlaced = frame.video().is_some_and(|v| v.interlaced);
    let known = output
        .format
        .as_ref()
        .is_some_and(|(d, i)| d.same_format(&desc) && *i == interlaced);
    if !known {
        let mut flow = sink_flow_def(FlowDef::picture(), &params, &frame, false)?;
        flow.set_latency(output.tracker.latency());
        tracing::debug!(kind = ?desc.kind(), "coordinator: new output format");
        output.port.store_flow_def(flow);
        output.format = Some((desc, interlaced));
    }

    let allocator = output
        .port
        .allocator()
        .ok_or_else(|| StageError::Alloc("no buffer allocator".to_string()))?;
    let timing = FrameTiming::of(&frame, params.time_base());
    let mut buffer = bridge::from_native(frame, allocator)?;

    let stamp = output.tracker.stamp(timing.pts, now);
    if stamp.discontinuity {
        tracing::warn!(pts_prog = stamp.pts_prog, "pts in the past, resetting");
    }
    output.tracker.set_last_duration(timing.duration);
    if let Some(latency) = stamp.latency_raised
        && let Some(flow) = output.port.flow_def_mut()
    {
        flow.set_latency(latency);
    }

    buffer.attrs.pts_orig = Some(stamp.pts_orig);
    buffer.attrs.pts_prog = Some(stamp.pts_prog);
    buffer.attrs.pts_sys = stamp.pts_sys;
    timing.apply(&mut buffer.attrs);
    Ok((buffer, stamp.latency_raised))
}

impl FilterStage {
    /// Records a dropped input buffer; warns once until the input recovers.
    fn record_error(&mut self, pad: Option<PadId>, err: StageError) -> StageError {
        let latch = match pad {
            Some(id) => self
                .pads
                .get_mut(id)
                .and_then(|p| p.input_mut())
                .map(|input| &mut input.warned_dropped),
            None => Some(&mut self.main.warned_dropped),
        };
        match latch {
            Some(warned) if *warned => {
                tracing::debug!(pad = ?pad, error = %err, "coordinator: buffer dropped");
            }
            Some(warned) => {
                tracing::warn!(pad = ?pad, error = %err, "coordinator: buffer dropped");
                *warned = true;
            }
            None => tracing::warn!(pad = ?pad, error = %err, "coordinator: buffer dropped"),
        }
        self.events.push(StageEvent::error(pad, &err));
        err
    }

    // -----------------------------------------------------------------------
    // Named pads
    // -----------------------------------------------------------------------

    /// Pushes a buffer into a named input pad.
    ///
    /// Before the graph is configured the buffer is dropped with a warning
    /// and `Ok` is returned. Conversion and engine failures drop the buffer,
    /// record a [`StageEvent::Error`] and are returned.
    pub fn push_input(&mut self, id: PadId, buffer: MediaBuffer) -> Result<(), StageError> {
        let pad = self
            .pads
            .get_mut(id)
            .ok_or_else(|| StageError::invalid(format!("no pad {id}")))?;
        if pad.direction() == PadDirection::Output {
            let err = StageError::invalid(format!("buffer on output pad '{}'", pad.name));
            return Err(self.record_error(Some(id), err));
        }
        let source = pad.native;
        let Some(input) = pad.input_mut() else {
            return Ok(());
        };
        let (Some(source), Some(media)) = (source, input.media.clone()) else {
            if !input.warned_not_configured {
                tracing::warn!(pad = %id, "filter graph is not configured");
                input.warned_not_configured = true;
            }
            return Ok(());
        };
        input.warned_not_configured = false;

        let attrs = buffer.attrs;
        let mut frame = match bridge::to_native(buffer, &media) {
            Ok(frame) => frame,
            Err(err) => return Err(self.record_error(Some(id), err)),
        };
        stamp_input(&mut frame, &attrs);

        let pushed = match self.graph.configured_graph() {
            Some(graph) => graph
                .push_frame(source, frame)
                .map_err(|e| StageError::external("cannot write frame to filter graph", e)),
            None => Err(StageError::invalid("filter graph is not configured")),
        };
        if let Err(err) = pushed {
            return Err(self.record_error(Some(id), err));
        }
        if let Some(input) = self.pads.get_mut(id).and_then(|p| p.input_mut()) {
            input.warned_dropped = false;
        }

        self.notify_outputs();
        self.poll();
        Ok(())
    }

    /// Schedules an immediate drain on every output pad.
    fn notify_outputs(&mut self) {
        for (_, pad) in self.pads.iter_mut() {
            if let Some(output) = pad.output_mut() {
                output.wakeup = Some(Wakeup::Now);
            }
        }
    }

    /// Runs every due wake-up; returns the number of buffers handed downstream.
    pub fn poll(&mut self) -> usize {
        let now = self.now();
        let due: Vec<PadId> = self
            .pads
            .iter()
            .filter(|(_, p)| {
                p.output()
                    .and_then(|o| o.wakeup)
                    .is_some_and(|w| w.is_due(now))
            })
            .map(|(id, _)| id)
            .collect();
        due.into_iter().map(|id| self.drain(id, now)).sum()
    }

    /// Earliest pending wake-up over all output pads.
    pub fn next_deadline(&self) -> Option<Wakeup> {
        self.pads
            .iter()
            .filter_map(|(_, p)| p.output().and_then(|o| o.wakeup))
            .min()
    }

    /// Flushes the retained queue, then pulls until the engine has nothing.
    fn drain(&mut self, id: PadId, now: Option<u64>) -> usize {
        let Some(pad) = self.pads.get_mut(id) else {
            return 0;
        };
        let sink = pad.native;
        let Some(output) = pad.output_mut() else {
            return 0;
        };
        output.wakeup = None;
        if !output.port.ready() {
            if !output.port.warned_not_ready {
                tracing::warn!(pad = %id, "no consumer or buffer allocator for now");
                output.port.warned_not_ready = true;
            }
            return 0;
        }
        output.port.warned_not_ready = false;

        let mut emitted = 0;
        while let Some(head) = output.retained.front() {
            if let (Some(due), Some(now)) = (head.attrs.pts_sys, now)
                && due > now
            {
                output.wakeup = Some(Wakeup::At(due));
                return emitted;
            }
            if let Some(buffer) = output.retained.pop_front() {
                output.port.emit(buffer);
                emitted += 1;
            }
        }

        let Some(sink) = sink else {
            return emitted;
        };
        let Some(graph) = self.graph.configured_graph() else {
            return emitted;
        };
        loop {
            let frame = match graph.pull_frame(sink) {
                Ok(frame) => frame,
                Err(PullError::WouldBlock | PullError::EndOfStream) => break,
                Err(PullError::Engine(e)) => {
                    let err = StageError::external("cannot get frame from filter graph", e);
                    tracing::error!(pad = %id, error = %err, "coordinator: pull failed");
                    self.events.push(StageEvent::error(Some(id), &err));
                    break;
                }
            };
            match stamp_output(output, graph, sink, frame, now) {
                Ok((buffer, raised)) => {
                    if let Some(latency) = raised {
                        tracing::debug!(pad = %id, latency, "coordinator: latency raised");
                        self.events.push(StageEvent::LatencyRaised {
                            pad: Some(id),
                            latency,
                        });
                    }
                    match (buffer.attrs.pts_sys, now) {
                        (Some(due), Some(now)) if due > now => {
                            output.retained.push_back(buffer);
                            output.wakeup = Some(Wakeup::At(due));
                            return emitted;
                        }
                        _ => {
                            output.port.emit(buffer);
                            emitted += 1;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(pad = %id, error = %err, "coordinator: frame dropped");
                    self.events.push(StageEvent::error(Some(id), &err));
                }
            }
        }
        emitted
    }

    // -----------------------------------------------------------------------
    // Single input
    // -----------------------------------------------------------------------

    /// Pushes a buffer into the single input and drains the main output.
    ///
    /// The first buffer finalises and configures the graph.
    pub fn push(&mut self, buffer: MediaBuffer) -> Result<(), StageError> {
        let media = self
            .main
            .media
            .clone()
            .ok_or_else(|| StageError::invalid("no input format"))?;
        if self.graph.state() == GraphState::Absent {
            return Err(self.record_error(None, StageError::invalid("no filter graph")));
        }

        self.main.last_attrs = Some(buffer.attrs);
        let attrs = buffer.attrs;
        let mut frame = match bridge::to_native(buffer, &media) {
            Ok(frame) => frame,
            Err(err) => return Err(self.record_error(None, err)),
        };
        stamp_input(&mut frame, &attrs);

        if self.graph.state() == GraphState::Allocated {
            if let Err(err) = self.graph.configure_implicit(&media, &frame) {
                tracing::error!(error = %err, "graph_build: first frame rejected");
                self.events.push(StageEvent::graph_failed(&err));
                return Err(err);
            }
            self.on_configured();
        }

        let Some(ends) = self.graph.implicit_ends() else {
            return Err(self.record_error(None, StageError::invalid("graph has no single input")));
        };
        let pushed = match self.graph.configured_graph() {
            Some(graph) => graph
                .push_frame(ends.source, frame)
                .map_err(|e| StageError::external("cannot write frame to filter graph", e)),
            None => Err(StageError::invalid("filter graph is not configured")),
        };
        if let Err(err) = pushed {
            return Err(self.record_error(None, err));
        }
        self.main.warned_dropped = false;

        self.drain_main(ends.sink);
        Ok(())
    }

    fn drain_main(&mut self, sink: FilterId) {
        let Some(graph) = self.graph.configured_graph() else {
            return;
        };
        loop {
            let frame = match graph.pull_frame(sink) {
                Ok(frame) => frame,
                Err(PullError::WouldBlock | PullError::EndOfStream) => return,
                Err(PullError::Engine(e)) => {
                    let err = StageError::external("cannot get frame from filter graph", e);
                    tracing::error!(error = %err, "coordinator: pull failed");
                    self.events.push(StageEvent::error(None, &err));
                    return;
                }
            };
            let result = Self::main_buffer(&mut self.main, graph, sink, frame);
            match result {
                Ok(Some(buffer)) => self.main.port.emit(buffer),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "coordinator: frame dropped");
                    self.events.push(StageEvent::error(None, &err));
                }
            }
        }
    }

    /// Converts a frame for the main output; `None` while no allocator is set.
    fn main_buffer(
        main: &mut MainIo,
        graph: &dyn FilterGraph,
        sink: FilterId,
        frame: NativeFrame,
    ) -> Result<Option<MediaBuffer>, StageError> {
        let params = graph
            .sink_params(sink)
            .map_err(|e| StageError::external("cannot read sink parameters", e))?;
        if main.port.flow_def().is_none() {
            let base = main.flow_def.clone().unwrap_or_else(FlowDef::picture);
            let flow = sink_flow_def(base, &params, &frame, true)?;
            main.port.store_flow_def(flow);
        }
        let Some(allocator) = main.port.allocator().cloned() else {
            if !main.port.warned_not_ready {
                tracing::warn!("no buffer allocator for now");
                main.port.warned_not_ready = true;
            }
            return Ok(None);
        };
        main.port.warned_not_ready = false;

        let timing = FrameTiming::of(&frame, params.time_base());
        let mut buffer = bridge::from_native(frame, &allocator)?;
        let mut attrs = main.last_attrs.unwrap_or_default();
        if let Some(pts) = timing.pts {
            if let (Some(prog), Some(sys)) = (attrs.pts_prog, attrs.pts_sys) {
                let shifted = i128::from(pts) + i128::from(sys) - i128::from(prog);
                attrs.pts_sys = Some(u64::try_from(shifted.max(0)).unwrap_or(u64::MAX));
            }
            attrs.pts_prog = Some(pts);
        }
        timing.apply(&mut attrs);
        buffer.attrs = attrs;
        Ok(Some(buffer))
    }
}
