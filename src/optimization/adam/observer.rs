//! Terminal progress logging for Adam (feature `obs_slog`).
//!
//! The drain stack is terminal decorator → full format → async with
//! [`slog_async::OverflowStrategy::Drop`], so a slow terminal never blocks
//! an update. Records are only emitted when `AdamOptions::verbose` is set.
use slog::{Drain, Logger, o};

/// Non-blocking terminal logger tagged with `component = "adam"`.
pub fn term_noblock() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain)
        .overflow_strategy(slog_async::OverflowStrategy::Drop)
        .build()
        .fuse();
    Logger::root(drain, o!("component" => "adam"))
}

/// L2 norm over every tensor of a map, for log records.
pub fn map_l2_norm(map: &crate::optimization::adam::types::ParamMap) -> f64 {
    map.values().flat_map(|t| t.iter()).map(|x| x * x).sum::<f64>().sqrt()
}
