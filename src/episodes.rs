//! Inactivity episode detection
//!
//! Scans one user's 0/1 activity row and extracts the maximal runs of inactive
//! days. Runs before the first active day are skipped: without a baseline of
//! activity there is nothing to measure recency against.

use crate::types::InactivityEpisode;

/// Episode detector for a single activity row
pub struct EpisodeDetector;

impl EpisodeDetector {
    /// Detect inactivity episodes in time order.
    ///
    /// The window length is the row length. A run still open on the last day is
    /// emitted as an ongoing episode with recency 0.
    pub fn detect(row: &[u8]) -> Vec<InactivityEpisode> {
        let window_days = row.len();
        let mut episodes = Vec::new();
        let mut seen_active = false;
        let mut run_start: Option<usize> = None;

        for (day, &value) in row.iter().enumerate() {
            if value != 0 {
                if let Some(start) = run_start.take() {
                    episodes.push(InactivityEpisode::new(start, day - 1, window_days));
                }
                seen_active = true;
            } else if seen_active && run_start.is_none() {
                run_start = Some(day);
            }
        }

        if let Some(start) = run_start {
            episodes.push(InactivityEpisode::new(start, window_days - 1, window_days));
        }

        episodes
    }

    /// Durations of closed (non-ongoing) episodes, in time order
    pub fn closed_durations(episodes: &[InactivityEpisode]) -> Vec<usize> {
        episodes
            .iter()
            .filter(|e| !e.is_ongoing())
            .map(|e| e.duration)
            .collect()
    }

    /// Length of the inactivity streak running through window end (0 if active)
    pub fn current_streak(episodes: &[InactivityEpisode]) -> usize {
        episodes
            .last()
            .filter(|e| e.is_ongoing())
            .map_or(0, |e| e.duration)
    }
}
