//! Burst command - simulate a fast pan and show which tiles win.
//!
//! Requests `count` tiles back to back along the rows of a level, then
//! reports the order they came back in. Tiles reported after a newer
//! request are counted as superseded: the viewer had already moved on by
//! the time they rendered.

use std::collections::HashMap;
use std::time::Instant;

use clap::Args;
use mandeltiles::coord::{side_tiles_count, PlaneMapper, MAX_SUPPORTED_LEVEL};
use mandeltiles::{TileIndex, TileScheduler};

use super::common::{channel_sink, resolve_config, SettingsArgs};
use crate::error::CliError;

/// Arguments for the burst command.
#[derive(Debug, Args)]
pub struct BurstArgs {
    /// Zoom level
    #[arg(long)]
    pub level: u8,

    /// Number of requests in the burst
    #[arg(long, default_value_t = 64)]
    pub count: usize,
}

/// Outcome of a burst, in report order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BurstSummary {
    pub rendered: usize,
    pub failed: usize,
    /// Tiles reported after a tile requested later than them
    pub superseded: usize,
    /// 1-based report position of the newest request
    pub newest_position: Option<usize>,
}

/// Summarize reports given as request sequence numbers in report order.
pub fn summarize(report_order: &[(usize, bool)]) -> BurstSummary {
    let newest = report_order.iter().map(|&(seq, _)| seq).max();
    let mut summary = BurstSummary::default();
    let mut max_seen = None;

    for (position, &(seq, ok)) in report_order.iter().enumerate() {
        if ok {
            summary.rendered += 1;
        } else {
            summary.failed += 1;
        }
        if max_seen.is_some_and(|max| seq < max) {
            summary.superseded += 1;
        }
        max_seen = max_seen.max(Some(seq));
        if Some(seq) == newest {
            summary.newest_position = Some(position + 1);
        }
    }
    summary
}

/// Run the burst command.
pub fn run(settings: &SettingsArgs, args: BurstArgs) -> Result<(), CliError> {
    if args.level > MAX_SUPPORTED_LEVEL {
        return Err(CliError::Config(format!(
            "level {} exceeds {}",
            args.level, MAX_SUPPORTED_LEVEL
        )));
    }
    let side = side_tiles_count(args.level) as u128;
    if args.count == 0 || args.count as u128 > side * side {
        return Err(CliError::Config(format!(
            "count must be between 1 and {} at level {}",
            side * side,
            args.level
        )));
    }

    let config = resolve_config(settings)?;
    let (sink, reports) = channel_sink();
    let scheduler = TileScheduler::new(config, sink)?;

    let tiles: Vec<TileIndex> = PlaneMapper::tiles_covering_root(args.level)
        .take(args.count)
        .collect();
    let sequence: HashMap<TileIndex, usize> =
        tiles.iter().enumerate().map(|(seq, &index)| (index, seq)).collect();

    let started = Instant::now();
    for &index in &tiles {
        scheduler.request_tile(index);
    }
    let requested_in = started.elapsed();

    let mut order = Vec::with_capacity(tiles.len());
    for _ in 0..tiles.len() {
        let Ok((index, result)) = reports.recv() else {
            break;
        };
        if let Some(&seq) = sequence.get(&index) {
            order.push((seq, result.is_ok()));
        }
    }

    let summary = summarize(&order);
    let stats = scheduler.stats();
    println!("Burst of {} requests at level {}", tiles.len(), args.level);
    println!("  Requested in: {:.2?}", requested_in);
    println!("  Completed in: {:.2?}", started.elapsed());
    println!("  Direct:       {}", stats.direct);
    println!("  Backlogged:   {}", stats.backlogged);
    println!("  Rendered:     {}", summary.rendered);
    println!("  Failed:       {}", summary.failed);
    println!("  Superseded:   {}", summary.superseded);
    if let Some(position) = summary.newest_position {
        println!("  Newest tile reported {} of {}", position, order.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_burst_has_nothing_superseded() {
        let summary = summarize(&[(0, true), (1, true), (2, true)]);
        assert_eq!(summary.rendered, 3);
        assert_eq!(summary.superseded, 0);
        assert_eq!(summary.newest_position, Some(3));
    }

    #[test]
    fn test_lifo_drain_supersedes_older_tiles() {
        // Direct request, then newest first
        let summary = summarize(&[(0, true), (4, true), (3, true), (2, false), (1, true)]);
        assert_eq!(summary.rendered, 4);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.superseded, 3);
        assert_eq!(summary.newest_position, Some(2));
    }

    #[test]
    fn test_empty_burst() {
        assert_eq!(summarize(&[]), BurstSummary::default());
    }
}
