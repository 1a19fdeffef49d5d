use std::collections::BTreeMap;

use xrspace_common::NodeId;

/// Slack for float accumulation in the scene clock.
const DUE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// What a timer does when it comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Dispose the node and its subtree.
    DisposeNode(NodeId),
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    due: f64,
    action: TimerAction,
}

/// Scene-owned one-shot timers keyed on scene time.
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    timers: BTreeMap<TimerId, Timer>,
    next_id: u64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to run once the scene clock reaches `due`.
    pub fn schedule(&mut self, due: f64, action: TimerAction) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.insert(id, Timer { due, action });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Due time of a pending timer.
    pub fn due(&self, id: TimerId) -> Option<f64> {
        self.timers.get(&id).map(|t| t.due)
    }

    /// Remove and return every timer due at `now`, earliest first.
    pub fn take_due(&mut self, now: f64) -> Vec<(TimerId, TimerAction)> {
        let mut due: Vec<(TimerId, Timer)> = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now + DUE_EPSILON)
            .map(|(id, t)| (*id, *t))
            .collect();
        due.sort_by(|(a_id, a), (b_id, b)| a.due.total_cmp(&b.due).then(a_id.cmp(b_id)));
        for (id, _) in &due {
            self.timers.remove(id);
        }
        due.into_iter().map(|(id, t)| (id, t.action)).collect()
    }

    /// Drop every pending timer.
    pub fn clear(&mut self) {
        self.timers.clear();
    }
}
