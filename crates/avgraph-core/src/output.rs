//! Downstream consumers of output pads.

use std::sync::mpsc::Sender;

use avgraph_media::{BufferAllocator, FlowDef, MediaBuffer};

/// What an output pad hands downstream.
#[derive(Debug, Clone)]
pub enum OutputEvent {
    /// A new or updated flow definition; it precedes the buffers it describes.
    FlowDef(FlowDef),
    /// A stamped buffer.
    Buffer(MediaBuffer),
}

/// Receives the flow definitions and buffers of one output pad.
pub trait OutputSink: Send {
    /// Called before the first buffer and whenever the format or latency changes.
    fn set_flow_def(&mut self, flow_def: &FlowDef);

    /// Called for each buffer, in presentation order.
    fn deliver(&mut self, buffer: MediaBuffer);
}

/// Channel consumer; a disconnected receiver silently drops events.
impl OutputSink for Sender<OutputEvent> {
    fn set_flow_def(&mut self, flow_def: &FlowDef) {
        let _ = self.send(OutputEvent::FlowDef(flow_def.clone()));
    }

    fn deliver(&mut self, buffer: MediaBuffer) {
        let _ = self.send(OutputEvent::Buffer(buffer));
    }
}

/// Consumer side of an output: sink, allocator and the published flow definition.
#[derive(Default)]
pub(crate) struct OutputPort {
    sink: Option<Box<dyn OutputSink>>,
    allocator: Option<BufferAllocator>,
    flow_def: Option<FlowDef>,
    flow_def_pending: bool,
    pub(crate) warned_not_ready: bool,
}

impl OutputPort {
    pub(crate) fn attach(&mut self, sink: Box<dyn OutputSink>) {
        self.sink = Some(sink);
        self.flow_def_pending = self.flow_def.is_some();
    }

    pub(crate) fn set_allocator(&mut self, allocator: BufferAllocator) {
        self.allocator = Some(allocator);
    }

    pub(crate) fn has_allocator(&self) -> bool {
        self.allocator.is_some()
    }

    pub(crate) fn allocator(&self) -> Option<&BufferAllocator> {
        self.allocator.as_ref()
    }

    /// Ready to drain: a consumer and an allocator are both known.
    pub(crate) fn ready(&self) -> bool {
        self.sink.is_some() && self.allocator.is_some()
    }

    pub(crate) fn flow_def(&self) -> Option<&FlowDef> {
        self.flow_def.as_ref()
    }

    pub(crate) fn flow_def_mut(&mut self) -> Option<&mut FlowDef> {
        self.flow_def_pending |= self.flow_def.is_some();
        self.flow_def.as_mut()
    }

    /// Replaces the flow definition; it is sent before the next buffer.
    pub(crate) fn store_flow_def(&mut self, flow_def: FlowDef) {
        self.flow_def = Some(flow_def);
        self.flow_def_pending = true;
    }

    pub(crate) fn clear_flow_def(&mut self) {
        self.flow_def = None;
        self.flow_def_pending = false;
    }

    /// Sends a buffer, preceded by the flow definition when it changed.
    pub(crate) fn emit(&mut self, buffer: MediaBuffer) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if self.flow_def_pending
            && let Some(flow_def) = &self.flow_def
        {
            sink.set_flow_def(flow_def);
            self.flow_def_pending = false;
        }
        sink.deliver(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn flow_def_is_sent_once_before_buffers() {
        let (tx, rx) = mpsc::channel();
        let mut port = OutputPort::default();
        port.attach(Box::new(tx));
        port.set_allocator(BufferAllocator::new());
        assert!(port.ready());

        port.store_flow_def(FlowDef::picture());
        port.emit(MediaBuffer::default());
        port.emit(MediaBuffer::default());
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], OutputEvent::FlowDef(_)));
        assert!(matches!(events[2], OutputEvent::Buffer(_)));
    }

    #[test]
    fn new_sink_gets_the_current_flow_def() {
        let mut port = OutputPort::default();
        port.store_flow_def(FlowDef::sound("s16"));
        let (tx, rx) = mpsc::channel();
        port.attach(Box::new(tx));
        port.emit(MediaBuffer::default());
        assert!(matches!(rx.try_recv(), Ok(OutputEvent::FlowDef(f)) if f.def() == Some("sound.s16.")));
    }
}
