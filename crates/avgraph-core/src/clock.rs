//! Clock Continuity Tracker.
//!
//! Each output pad turns the timestamps of the frames it pulls into
//! pipeline timestamps in two domains:
//!
//! - **program time** (`pts_prog`): the frame's own time plus a running
//!   offset. The offset grows whenever a frame would not be strictly later
//!   than the previous one, so program time never goes backwards.
//! - **system time** (`pts_sys`): program time anchored to the wall clock at
//!   the first frame after each discontinuity.
//!
//! A frame that is already late when it is stamped raises the pad latency.

/// Result of stamping one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// Frame time before continuity repair.
    pub pts_orig: u64,
    /// Strictly increasing program time.
    pub pts_prog: u64,
    /// Wall-clock due time, `None` without a clock.
    pub pts_sys: Option<u64>,
    /// The offset was bumped for this frame.
    pub discontinuity: bool,
    /// New pad latency when this frame raised it.
    pub latency_raised: Option<u64>,
}

/// Per-pad timestamp state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockTracker {
    pts_sys_offset: Option<u64>,
    pts_prog_offset: u64,
    first_pts_prog: u64,
    last_pts_prog: Option<u64>,
    last_duration: u64,
    latency: u64,
}

impl ClockTracker {
    /// A tracker that has seen no frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps a frame whose time is `pts_orig` ticks, at wall-clock `now`.
    ///
    /// A frame without a time continues from the last program time plus the
    /// last duration.
    pub fn stamp(&mut self, pts_orig: Option<u64>, now: Option<u64>) -> Stamp {
        let pts_orig = pts_orig.unwrap_or_else(|| match self.last_pts_prog {
            Some(last) => last
                .saturating_add(self.last_duration)
                .saturating_sub(self.pts_prog_offset),
            None => 0,
        });
        let mut pts_prog = pts_orig.saturating_add(self.pts_prog_offset);

        let mut discontinuity = false;
        if let Some(last) = self.last_pts_prog
            && pts_prog <= last
        {
            let delta = last - pts_prog + 1;
            self.pts_sys_offset = None;
            self.pts_prog_offset = self.pts_prog_offset.saturating_add(delta);
            pts_prog = pts_prog.saturating_add(delta);
            discontinuity = true;
        }
        self.last_pts_prog = Some(pts_prog);

        if self.pts_sys_offset.is_none()
            && let Some(now) = now
        {
            self.pts_sys_offset = Some(now);
            self.first_pts_prog = pts_prog;
        }
        let pts_sys = self
            .pts_sys_offset
            .map(|offset| offset.saturating_add(pts_prog.saturating_sub(self.first_pts_prog)));

        let mut latency_raised = None;
        if let (Some(sys), Some(now)) = (pts_sys, now)
            && sys < now
            && now - sys > self.latency
        {
            self.latency = now - sys;
            latency_raised = Some(self.latency);
        }

        Stamp {
            pts_orig,
            pts_prog,
            pts_sys,
            discontinuity,
            latency_raised,
        }
    }

    /// Records the duration of the last stamped frame.
    pub fn set_last_duration(&mut self, duration: u64) {
        self.last_duration = duration;
    }

    /// Current latency in ticks.
    pub fn latency(&self) -> u64 {
        self.latency
    }

    /// Last program time handed out.
    pub fn last_pts_prog(&self) -> Option<u64> {
        self.last_pts_prog
    }

    /// Current program-time offset.
    pub fn prog_offset(&self) -> u64 {
        self.pts_prog_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_anchors_system_time() {
        let mut t = ClockTracker::new();
        let s = t.stamp(Some(1000), Some(5000));
        assert_eq!(s.pts_prog, 1000);
        assert_eq!(s.pts_sys, Some(5000));
        assert_eq!(s.latency_raised, None);
        assert!(!s.discontinuity);

        let s = t.stamp(Some(1400), Some(5100));
        assert_eq!(s.pts_sys, Some(5400));
    }

    #[test]
    fn regression_bumps_offset_and_reanchors() {
        let mut t = ClockTracker::new();
        t.stamp(Some(1000), Some(0));
        let s = t.stamp(Some(999), Some(700));
        assert!(s.discontinuity);
        assert_eq!(s.pts_orig, 999);
        assert_eq!(s.pts_prog, 1001);
        assert_eq!(s.pts_sys, Some(700));
        assert_eq!(t.prog_offset(), 2);

        let s = t.stamp(Some(1000), Some(700));
        assert_eq!(s.pts_prog, 1002);
        assert!(!s.discontinuity);
    }

    #[test]
    fn equal_timestamps_still_increase() {
        let mut t = ClockTracker::new();
        let a = t.stamp(Some(50), None);
        let b = t.stamp(Some(50), None);
        assert!(b.pts_prog > a.pts_prog);
        assert_eq!(b.pts_sys, None);
    }

    #[test]
    fn late_frames_raise_latency_once() {
        let mut t = ClockTracker::new();
        t.stamp(Some(0), Some(100));
        let s = t.stamp(Some(10), Some(300));
        assert_eq!(s.pts_sys, Some(110));
        assert_eq!(s.latency_raised, Some(190));
        assert_eq!(t.latency(), 190);

        let s = t.stamp(Some(20), Some(250));
        assert_eq!(s.latency_raised, None);
        assert_eq!(t.latency(), 190);
    }

    #[test]
    fn missing_timestamp_continues_from_duration() {
        let mut t = ClockTracker::new();
        t.stamp(Some(100), None);
        t.set_last_duration(40);
        let s = t.stamp(None, None);
        assert_eq!(s.pts_prog, 140);
        assert!(!s.discontinuity);

        t.set_last_duration(0);
        let s = t.stamp(None, None);
        assert_eq!(s.pts_prog, 141);
        assert!(s.discontinuity);
    }

    #[test]
    fn saturated_timestamps_do_not_overflow() {
        let mut t = ClockTracker::new();
        t.stamp(Some(u64::MAX), Some(0));
        let s = t.stamp(Some(10), Some(0));
        assert!(s.discontinuity);
        assert_eq!(s.pts_prog, u64::MAX);
        assert_eq!(s.pts_sys, Some(0));

        let mut t = ClockTracker::new();
        t.stamp(Some(0), Some(u64::MAX));
        let s = t.stamp(Some(10), Some(u64::MAX));
        assert_eq!(s.pts_sys, Some(u64::MAX));
        assert_eq!(s.latency_raised, None);
    }
}
