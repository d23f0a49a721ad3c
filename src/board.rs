//! Display cells for the three layer 2 stats and the fetch cycles that fill them.
//!
//! Every refresh starts a new cycle with a higher generation. Cells remember the
//! generation that last reset them, and a cycle may only write into a cell whose
//! generation still matches its own, so a superseded cycle can never clobber the
//! values of a newer one even if it finishes last.

use crate::error::{Insufficiency, StatsError, describe_error};
use crate::formatting::{Locale, format_compact_currency, format_percent_change};
use crate::sources::StatsSource;
use crate::stats::{LOOKBACK_PERIODS, average_fee, tvl_with_change};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const LOADING_TEXT: &str = "Loading…";
pub const ERROR_TEXT: &str = "Unable to load data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum DisplayStat {
    Loading,
    Ready(String),
    Failed,
}

impl DisplayStat {
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub const fn state(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready(_) => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DisplayStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => f.write_str(LOADING_TEXT),
            Self::Ready(text) => f.write_str(text),
            Self::Failed => f.write_str(ERROR_TEXT),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Tvl,
    PercentChange,
    AverageFee,
}

impl StatKind {
    pub const ALL: [Self; 3] = [Self::Tvl, Self::PercentChange, Self::AverageFee];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Tvl => "Total value locked",
            Self::PercentChange => "TVL change (30d)",
            Self::AverageFee => "Average transfer fee",
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Tvl => "tvl",
            Self::PercentChange => "percent_change",
            Self::AverageFee => "average_fee",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCell {
    pub generation: u64,
    pub locale: Locale,
    pub value: DisplayStat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub generation: u64,
    pub locale: Locale,
    pub tvl: DisplayStat,
    pub percent_change: DisplayStat,
    pub average_fee: DisplayStat,
}

impl StatsSnapshot {
    fn from_cells(tvl: &StatCell, percent_change: &StatCell, average_fee: &StatCell) -> Self {
        Self {
            generation: tvl.generation,
            locale: tvl.locale,
            tvl: tvl.value.clone(),
            percent_change: percent_change.value.clone(),
            average_fee: average_fee.value.clone(),
        }
    }

    /// Only cells reset by the same cycle make up a snapshot.
    fn from_matching_cells(
        tvl: &StatCell,
        percent_change: &StatCell,
        average_fee: &StatCell,
    ) -> Option<Self> {
        let generation = tvl.generation;
        (percent_change.generation == generation && average_fee.generation == generation)
            .then(|| Self::from_cells(tvl, percent_change, average_fee))
    }

    pub const fn get(&self, kind: StatKind) -> &DisplayStat {
        match kind {
            StatKind::Tvl => &self.tvl,
            StatKind::PercentChange => &self.percent_change,
            StatKind::AverageFee => &self.average_fee,
        }
    }

    pub fn is_settled(&self) -> bool {
        StatKind::ALL
            .iter()
            .all(|&kind| !self.get(kind).is_loading())
    }
}

#[derive(Debug, Clone, Copy)]
struct Cycle {
    generation: u64,
    locale: Locale,
}

#[derive(Debug, Clone)]
struct Cells {
    tvl: Arc<watch::Sender<StatCell>>,
    percent_change: Arc<watch::Sender<StatCell>>,
    average_fee: Arc<watch::Sender<StatCell>>,
}

impl Cells {
    fn new(locale: Locale) -> Self {
        let cell = || {
            let (sender, _) = watch::channel(StatCell {
                generation: 0,
                locale,
                value: DisplayStat::Loading,
            });
            Arc::new(sender)
        };
        Self {
            tvl: cell(),
            percent_change: cell(),
            average_fee: cell(),
        }
    }

    const fn get(&self, kind: StatKind) -> &Arc<watch::Sender<StatCell>> {
        match kind {
            StatKind::Tvl => &self.tvl,
            StatKind::PercentChange => &self.percent_change,
            StatKind::AverageFee => &self.average_fee,
        }
    }

    fn reset(&self, cycle: Cycle) {
        for kind in StatKind::ALL {
            self.get(kind).send_modify(|cell| {
                cell.generation = cycle.generation;
                cell.locale = cycle.locale;
                cell.value = DisplayStat::Loading;
            });
        }
    }

    /// Writes `value` only if no newer cycle has claimed the cell.
    fn publish(&self, kind: StatKind, generation: u64, value: DisplayStat) -> bool {
        let written = self.get(kind).send_if_modified(|cell| {
            if cell.generation != generation {
                return false;
            }
            cell.value = value;
            true
        });
        if !written {
            debug!(
                stat = kind.key(),
                generation, "discarding result of superseded fetch cycle"
            );
        }
        written
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::from_cells(
            &self.tvl.borrow(),
            &self.percent_change.borrow(),
            &self.average_fee.borrow(),
        )
    }

    fn subscribe(&self) -> StatsView {
        StatsView {
            tvl: self.tvl.subscribe(),
            percent_change: self.percent_change.subscribe(),
            average_fee: self.average_fee.subscribe(),
        }
    }
}

pub struct StatsBoard<S> {
    source: Arc<S>,
    excluded_fee_id: Arc<str>,
    cells: Cells,
    generation: u64,
    in_flight: JoinSet<()>,
}

impl<S: StatsSource> StatsBoard<S> {
    pub fn new(source: S, excluded_fee_id: &str, locale: Locale) -> Self {
        Self {
            source: Arc::new(source),
            excluded_fee_id: Arc::from(excluded_fee_id),
            cells: Cells::new(locale),
            generation: 0,
            in_flight: JoinSet::new(),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.cells.snapshot()
    }

    pub fn subscribe(&self) -> StatsView {
        self.cells.subscribe()
    }

    /// Starts a fetch cycle for `locale`, superseding any cycle still in flight.
    /// Must be called from within a Tokio runtime.
    pub fn refresh(&mut self, locale: Locale) -> u64 {
        self.generation += 1;
        let cycle = Cycle {
            generation: self.generation,
            locale,
        };

        let superseded = std::mem::take(&mut self.in_flight);
        if !superseded.is_empty() {
            debug!(tasks = superseded.len(), "aborting superseded fetch tasks");
        }
        // Dropping the set aborts its tasks.
        drop(superseded);

        self.cells.reset(cycle);
        info!(generation = cycle.generation, %locale, "starting fetch cycle");

        self.in_flight.spawn(run_tvl_cycle(
            Arc::clone(&self.source),
            self.cells.clone(),
            cycle,
        ));
        self.in_flight.spawn(run_fee_cycle(
            Arc::clone(&self.source),
            self.cells.clone(),
            Arc::clone(&self.excluded_fee_id),
            cycle,
        ));

        cycle.generation
    }

    /// Waits until the current cycle has written all of its cells.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(err) = joined
                && err.is_panic()
            {
                warn!(error = %err, "fetch task panicked");
            }
        }
    }
}

pub struct StatsView {
    tvl: watch::Receiver<StatCell>,
    percent_change: watch::Receiver<StatCell>,
    average_fee: watch::Receiver<StatCell>,
}

impl StatsView {
    /// Resolves once any cell changed since the last snapshot; errors once the board is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        tokio::select! {
            changed = self.tvl.changed() => changed,
            changed = self.percent_change.changed() => changed,
            changed = self.average_fee.changed() => changed,
        }
    }

    /// Reads every cell and marks it seen. Returns `None` while a refresh has reset
    /// only some of the cells; the remaining resets will wake `changed` again.
    pub fn snapshot(&mut self) -> Option<StatsSnapshot> {
        let tvl = self.tvl.borrow_and_update().clone();
        let percent_change = self.percent_change.borrow_and_update().clone();
        let average_fee = self.average_fee.borrow_and_update().clone();
        StatsSnapshot::from_matching_cells(&tvl, &percent_change, &average_fee)
    }
}

async fn run_tvl_cycle<S: StatsSource>(source: Arc<S>, cells: Cells, cycle: Cycle) {
    let outcome = source.fetch_tvl_series().await.and_then(|series| {
        tvl_with_change(&series, LOOKBACK_PERIODS).map_err(StatsError::from)
    });
    let (tvl, change) = match outcome {
        Ok((latest, change)) => (
            DisplayStat::Ready(format_compact_currency(latest, cycle.locale)),
            DisplayStat::Ready(format_percent_change(change)),
        ),
        Err(err) => {
            log_failure(StatKind::Tvl, cycle, &err);
            (DisplayStat::Failed, DisplayStat::Failed)
        }
    };

    cells.publish(StatKind::Tvl, cycle.generation, tvl);
    cells.publish(StatKind::PercentChange, cycle.generation, change);
}

async fn run_fee_cycle<S: StatsSource>(
    source: Arc<S>,
    cells: Cells,
    excluded_fee_id: Arc<str>,
    cycle: Cycle,
) {
    let fee = match source.fetch_fee_entries().await {
        Ok(entries) => {
            let average = average_fee(&entries, &excluded_fee_id)
                .map(|value| format_compact_currency(value, cycle.locale));
            derived(StatKind::AverageFee, cycle, average)
        }
        Err(err) => {
            log_failure(StatKind::AverageFee, cycle, &err);
            DisplayStat::Failed
        }
    };

    cells.publish(StatKind::AverageFee, cycle.generation, fee);
}

fn derived(kind: StatKind, cycle: Cycle, result: Result<String, Insufficiency>) -> DisplayStat {
    match result {
        Ok(text) => DisplayStat::Ready(text),
        Err(reason) => {
            log_failure(kind, cycle, &StatsError::from(reason));
            DisplayStat::Failed
        }
    }
}

fn log_failure(kind: StatKind, cycle: Cycle, err: &StatsError) {
    warn!(
        stat = kind.key(),
        generation = cycle.generation,
        error = %describe_error(err),
        "failed to derive stat"
    );
}
