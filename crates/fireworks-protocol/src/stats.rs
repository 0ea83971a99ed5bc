//! Run statistics collected at node 0.

use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::token::{EventNotice, Firing};

/// Summary record emitted once per run.
///
/// Durations are in seconds. `timestamp` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub ring_size: usize,
    pub rounds_completed: u64,
    pub events_fired: u64,
    pub min_round_duration: f64,
    pub mean_round_duration: f64,
    pub max_round_duration: f64,
    pub inconsistency_count: u64,
    pub timestamp: u64,
}

/// Min, mean and max of a set of round durations, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DurationStats {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl DurationStats {
    /// Compute over `durations`; all zero when empty.
    pub fn from_durations(durations: &[Duration]) -> Self {
        if durations.is_empty() {
            return Self::default();
        }
        let secs = durations.iter().map(Duration::as_secs_f64);
        let min = secs.clone().fold(f64::INFINITY, f64::min);
        let max = secs.clone().fold(0.0, f64::max);
        let mean = secs.sum::<f64>() / durations.len() as f64;
        // Guard the mean against float rounding at the edges.
        Self {
            min,
            mean: mean.clamp(min, max),
            max,
        }
    }
}

/// Aggregates round durations and event counts at node 0.
#[derive(Debug, Clone, Default)]
pub struct StatsCollector {
    durations: Vec<Duration>,
    /// Distinct firings seen, keyed by (origin, round).
    events: HashSet<EventNotice>,
    /// Authoritative ring-wide tally, when one is available.
    tally: Option<u64>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the duration of one completed round.
    pub fn record_round(&mut self, duration: Duration) {
        self.durations.push(duration);
    }

    /// Count a firing of the node this collector is attached to.
    pub fn record_firing(&mut self, firing: &Firing) {
        self.events.insert(firing.notice());
    }

    /// Count a firing announced on the fan-out channel. Duplicates are ignored.
    pub fn observe_notice(&mut self, notice: EventNotice) {
        self.events.insert(notice);
    }

    /// Override the event count with an authoritative ring-wide tally.
    pub fn set_events_fired(&mut self, count: u64) {
        self.tally = Some(count);
    }

    pub fn rounds_completed(&self) -> u64 {
        self.durations.len() as u64
    }

    pub fn events_fired(&self) -> u64 {
        self.tally.unwrap_or(self.events.len() as u64)
    }

    pub fn durations(&self) -> &[Duration] {
        &self.durations
    }

    /// Package the run summary.
    pub fn summarize(&self, ring_size: usize, inconsistency_count: u64) -> RunSummary {
        let stats = DurationStats::from_durations(&self.durations);
        RunSummary {
            ring_size,
            rounds_completed: self.rounds_completed(),
            events_fired: self.events_fired(),
            min_round_duration: stats.min,
            mean_round_duration: stats.mean,
            max_round_duration: stats.max,
            inconsistency_count,
            timestamp: unix_millis(),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::NodeId;

    #[test]
    fn test_empty_collector() {
        let s = StatsCollector::new().summarize(4, 0);
        assert_eq!(s.rounds_completed, 0);
        assert_eq!(s.events_fired, 0);
        assert_eq!(s.min_round_duration, 0.0);
        assert_eq!(s.mean_round_duration, 0.0);
        assert_eq!(s.max_round_duration, 0.0);
        assert!(s.timestamp > 0);
    }

    #[test]
    fn test_mean_is_sum_over_count() {
        let mut c = StatsCollector::new();
        let ms = [3u64, 9, 4, 12, 2];
        for d in ms {
            c.record_round(Duration::from_millis(d));
        }
        let s = c.summarize(8, 1);
        assert_eq!(s.rounds_completed, 5);
        assert_eq!(s.inconsistency_count, 1);

        let expected = ms.iter().sum::<u64>() as f64 / 1000.0 / ms.len() as f64;
        assert!((s.mean_round_duration - expected).abs() < 1e-12);
        assert!((s.min_round_duration - 0.002).abs() < 1e-12);
        assert!((s.max_round_duration - 0.012).abs() < 1e-12);
        assert!(s.min_round_duration <= s.mean_round_duration);
        assert!(s.mean_round_duration <= s.max_round_duration);
    }

    #[test]
    fn test_single_round_collapses() {
        let stats = DurationStats::from_durations(&[Duration::from_micros(250)]);
        assert_eq!(stats.min, stats.max);
        assert_eq!(stats.mean, stats.min);
    }

    #[test]
    fn test_events_are_deduplicated() {
        let mut c = StatsCollector::new();
        let firing = Firing {
            node: NodeId::new(0),
            round_id: 3,
            probability_after: 0.5,
        };
        c.record_firing(&firing);
        // Our own notice looped back over the fan-out.
        c.observe_notice(firing.notice());
        c.observe_notice(EventNotice {
            origin: NodeId::new(2),
            round_id: 1,
        });
        assert_eq!(c.events_fired(), 2);

        c.set_events_fired(7);
        assert_eq!(c.events_fired(), 7);
    }
}
