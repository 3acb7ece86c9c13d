use crate::pose::Pose;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub timestep: u64,
}

/// Append-only record of pose estimates, one entry per cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    /// Appends `pose` with the next timestep.
    pub fn record(&mut self, pose: &Pose) {
        let timestep = self.entries.len() as u64;
        self.entries.push(HistoryEntry {
            x: pose.x,
            y: pose.y,
            theta: pose.theta,
            timestep,
        });
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timesteps_increase() {
        let mut history = History::new();
        history.record(&Pose::new(0.0, 0.0, 0.0));
        history.record(&Pose::new(1.0, 2.0, 0.5));
        history.record(&Pose::new(2.0, 4.0, 1.0));
        let steps: Vec<u64> = history.iter().map(|e| e.timestep).collect();
        assert_eq!(steps, vec![0, 1, 2]);
        assert_eq!(history.last().map(|e| e.y), Some(4.0));
    }
}
