//! Named pads and their arena.

use core::fmt;
use std::collections::VecDeque;

use avgraph_engine::FilterId;
use avgraph_media::{FlowDef, MediaBuffer};

use crate::clock::ClockTracker;
use crate::descriptor::MediaDescriptor;
use crate::error::StageError;
use crate::output::OutputPort;

/// Stable handle on a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PadId(u32);

impl PadId {
    /// Raw index.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pad#{}", self.0)
    }
}

/// Direction of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    /// Feeds a graph source.
    Input,
    /// Drains a graph sink.
    Output,
}

impl fmt::Display for PadDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PadDirection::Input => "input",
            PadDirection::Output => "output",
        })
    }
}

/// When an output pad wants to drain again.
///
/// Orders [`Wakeup::Now`] before any deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Wakeup {
    /// As soon as possible.
    Now,
    /// At this system time, in clock ticks.
    At(u64),
}

impl Wakeup {
    /// `true` when the wake-up is due at `now` (always without a clock).
    pub fn is_due(self, now: Option<u64>) -> bool {
        match (self, now) {
            (Wakeup::Now, _) | (Wakeup::At(_), None) => true,
            (Wakeup::At(t), Some(now)) => t <= now,
        }
    }
}

pub(crate) struct InputPad {
    pub(crate) flow_def: Option<FlowDef>,
    pub(crate) media: Option<MediaDescriptor>,
    pub(crate) warned_not_configured: bool,
    pub(crate) warned_dropped: bool,
}

pub(crate) struct OutputPad {
    pub(crate) port: OutputPort,
    pub(crate) tracker: ClockTracker,
    pub(crate) retained: VecDeque<MediaBuffer>,
    pub(crate) wakeup: Option<Wakeup>,
    pub(crate) format: Option<(MediaDescriptor, bool)>,
}

pub(crate) enum PadRole {
    Input(InputPad),
    Output(OutputPad),
}

pub(crate) struct Pad {
    pub(crate) name: String,
    pub(crate) native: Option<FilterId>,
    pub(crate) role: PadRole,
}

impl Pad {
    pub(crate) fn direction(&self) -> PadDirection {
        match self.role {
            PadRole::Input(_) => PadDirection::Input,
            PadRole::Output(_) => PadDirection::Output,
        }
    }

    pub(crate) fn input(&self) -> Option<&InputPad> {
        match &self.role {
            PadRole::Input(i) => Some(i),
            PadRole::Output(_) => None,
        }
    }

    pub(crate) fn input_mut(&mut self) -> Option<&mut InputPad> {
        match &mut self.role {
            PadRole::Input(i) => Some(i),
            PadRole::Output(_) => None,
        }
    }

    pub(crate) fn output(&self) -> Option<&OutputPad> {
        match &self.role {
            PadRole::Output(o) => Some(o),
            PadRole::Input(_) => None,
        }
    }

    pub(crate) fn output_mut(&mut self) -> Option<&mut OutputPad> {
        match &mut self.role {
            PadRole::Output(o) => Some(o),
            PadRole::Input(_) => None,
        }
    }
}

/// Arena of pads indexed by [`PadId`]; iteration follows creation order.
#[derive(Default)]
pub(crate) struct PadSet {
    pads: Vec<Option<Pad>>,
}

impl PadSet {
    /// Adds a pad; names are unique across both directions.
    pub(crate) fn add(&mut self, name: &str, direction: PadDirection) -> Result<PadId, StageError> {
        if name.is_empty() {
            return Err(StageError::invalid("pad name is empty"));
        }
        if self.find(name).is_some() {
            return Err(StageError::invalid(format!("pad '{name}' already exists")));
        }
        let role = match direction {
            PadDirection::Input => PadRole::Input(InputPad {
                flow_def: None,
                media: None,
                warned_not_configured: false,
                warned_dropped: false,
            }),
            PadDirection::Output => PadRole::Output(OutputPad {
                port: OutputPort::default(),
                tracker: ClockTracker::new(),
                retained: VecDeque::new(),
                wakeup: None,
                format: None,
            }),
        };
        let id = PadId(self.pads.len() as u32);
        self.pads.push(Some(Pad {
            name: name.to_string(),
            native: None,
            role,
        }));
        Ok(id)
    }

    pub(crate) fn remove(&mut self, id: PadId) -> Option<Pad> {
        self.pads.get_mut(id.0 as usize)?.take()
    }

    pub(crate) fn get(&self, id: PadId) -> Option<&Pad> {
        self.pads.get(id.0 as usize)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: PadId) -> Option<&mut Pad> {
        self.pads.get_mut(id.0 as usize)?.as_mut()
    }

    pub(crate) fn find(&self, name: &str) -> Option<PadId> {
        self.iter().find(|(_, p)| p.name == name).map(|(id, _)| id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (PadId, &Pad)> {
        self.pads
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (PadId(i as u32), p)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (PadId, &mut Pad)> {
        self.pads
            .iter_mut()
            .enumerate()
            .filter_map(|(i, p)| p.as_mut().map(|p| (PadId(i as u32), p)))
    }

    pub(crate) fn has(&self, direction: PadDirection) -> bool {
        self.iter().any(|(_, p)| p.direction() == direction)
    }

    /// Drops every native handle.
    pub(crate) fn detach_all(&mut self) {
        for (_, pad) in self.iter_mut() {
            pad.native = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_across_directions() {
        let mut pads = PadSet::default();
        let a = pads.add("main", PadDirection::Input).unwrap();
        assert!(matches!(
            pads.add("main", PadDirection::Output),
            Err(StageError::Invalid(_))
        ));
        assert!(pads.add("", PadDirection::Output).is_err());
        assert_eq!(pads.find("main"), Some(a));
    }

    #[test]
    fn ids_stay_stable_after_removal() {
        let mut pads = PadSet::default();
        let a = pads.add("a", PadDirection::Input).unwrap();
        let b = pads.add("b", PadDirection::Output).unwrap();
        let c = pads.add("c", PadDirection::Output).unwrap();
        assert!(pads.remove(b).is_some());
        assert!(pads.get(b).is_none());
        assert_eq!(pads.get(c).map(|p| p.name.as_str()), Some("c"));
        let ids: Vec<_> = pads.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, c]);

        let d = pads.add("b", PadDirection::Output).unwrap();
        assert_ne!(d, b);
    }

    #[test]
    fn wakeups_order_now_first() {
        assert!(Wakeup::Now < Wakeup::At(0));
        assert!(Wakeup::At(5).is_due(Some(5)));
        assert!(!Wakeup::At(6).is_due(Some(5)));
        assert!(Wakeup::At(6).is_due(None));
    }
}
