use crate::config::RunConfig;
use crate::engine::aggregator::ResultSet;
use crate::engine::extractor::AttributeExtractor;
use crate::engine::harvester::PageHarvester;
use crate::error::{LoadError, PageFailure, Phase, ProviderError};
use crate::scrapers::traits::PageSnapshotProvider;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Why a run ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// `max_pages` pages were harvested
    PageBudgetExhausted,
    /// The last harvested page had no enabled next-page control
    NoNextPage,
}

#[derive(Debug)]
pub enum RunOutcome {
    Done(DoneReason),
    Failed(PageFailure),
}

/// Terminal result of a pagination run.
///
/// A failed run still carries every record harvested before the failure.
#[derive(Debug)]
pub struct RunReport {
    pub records: ResultSet,
    pub pages_visited: u32,
    pub rejected: usize,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, RunOutcome::Done(_))
    }

    pub fn failure(&self) -> Option<&PageFailure> {
        match &self.outcome {
            RunOutcome::Failed(failure) => Some(failure),
            RunOutcome::Done(_) => None,
        }
    }
}

/// Public name of each controller state, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    Init,
    Loading,
    Harvesting,
    Advancing,
    Done,
    Failed,
}

impl fmt::Display for PaginationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How the snapshot of the current page is obtained
enum Entry<S> {
    Url,
    NextFrom(S),
}

enum State<S> {
    Init,
    Loading(Entry<S>),
    Harvesting(S),
    Advancing(S),
    Done(DoneReason),
    Failed(PageFailure),
}

impl<S> State<S> {
    fn name(&self) -> PaginationState {
        match self {
            State::Init => PaginationState::Init,
            State::Loading(_) => PaginationState::Loading,
            State::Harvesting(_) => PaginationState::Harvesting,
            State::Advancing(_) => PaginationState::Advancing,
            State::Done(_) => PaginationState::Done,
            State::Failed(_) => PaginationState::Failed,
        }
    }
}

/// Drives one provider through load → harvest → advance, one page at a time
pub struct PaginationController<'a, P: PageSnapshotProvider> {
    provider: &'a mut P,
    harvester: PageHarvester<'a>,
    config: &'a RunConfig,
}

impl<'a, P: PageSnapshotProvider> PaginationController<'a, P> {
    pub fn new(
        provider: &'a mut P,
        extractor: &'a AttributeExtractor,
        config: &'a RunConfig,
    ) -> Self {
        Self {
            provider,
            harvester: PageHarvester::new(extractor),
            config,
        }
    }

    pub async fn run(mut self, start_url: &Url) -> RunReport {
        let started_at = Utc::now();
        let max_pages = self.config.max_pages();

        let mut records = ResultSet::new();
        let mut rejected = 0;
        let mut page = 0u32;
        let mut pages_visited = 0u32;
        let mut state = State::Init;

        loop {
            debug!(page, state = %state.name(), "Pagination step");

            state = match state {
                State::Init => {
                    // RunConfig guarantees max_pages >= 1
                    page = 1;
                    State::Loading(Entry::Url)
                }

                State::Loading(entry) => match self.load(entry, start_url, page).await {
                    Ok(snapshot) => State::Harvesting(snapshot),
                    Err(failure) => State::Failed(failure),
                },

                State::Harvesting(snapshot) => {
                    match self.harvester.harvest(&*self.provider, &snapshot) {
                        Ok(outcome) => {
                            let analyzed = outcome.analyzed();
                            let accepted = outcome.accepted.len();
                            rejected += outcome.rejected;
                            let added = records.merge(outcome.accepted);
                            pages_visited = page;
                            info!(
                                page,
                                analyzed,
                                accepted,
                                rejected = outcome.rejected,
                                new = added,
                                total = records.len(),
                                "✓ Page harvested"
                            );
                            State::Advancing(snapshot)
                        }
                        Err(e) => State::Failed(PageFailure::PageLoad {
                            page,
                            source: e.into(),
                        }),
                    }
                }

                State::Advancing(snapshot) => {
                    if page >= max_pages {
                        State::Done(DoneReason::PageBudgetExhausted)
                    } else if !self.provider.has_next_page(&snapshot) {
                        info!(page, "⚠️ Next button not found or last page reached");
                        State::Done(DoneReason::NoNextPage)
                    } else {
                        page += 1;
                        State::Loading(Entry::NextFrom(snapshot))
                    }
                }

                State::Done(reason) => {
                    info!(
                        pages = pages_visited,
                        total = records.len(),
                        ?reason,
                        "✅ Scraping completed"
                    );
                    return RunReport {
                        records,
                        pages_visited,
                        rejected,
                        outcome: RunOutcome::Done(reason),
                        started_at,
                        finished_at: Utc::now(),
                    };
                }

                State::Failed(failure) => {
                    warn!(
                        pages = pages_visited,
                        total = records.len(),
                        "Pagination stopped early: {failure}"
                    );
                    return RunReport {
                        records,
                        pages_visited,
                        rejected,
                        outcome: RunOutcome::Failed(failure),
                        started_at,
                        finished_at: Utc::now(),
                    };
                }
            };
        }
    }

    /// Obtain page `page`'s snapshot within one per-page timeout
    async fn load(
        &mut self,
        entry: Entry<P::Snapshot>,
        start_url: &Url,
        page: u32,
    ) -> Result<P::Snapshot, PageFailure> {
        let budget = self.config.per_page_timeout();
        let deadline = Instant::now() + budget;

        match entry {
            Entry::Url => {
                match timeout_at(deadline, self.provider.load(start_url, deadline)).await {
                    Ok(Ok(snapshot)) => Ok(snapshot),
                    Ok(Err(e)) => Err(load_failure(page, e)),
                    Err(_) => Err(load_failure(
                        page,
                        ProviderError::Timeout {
                            phase: Phase::Render,
                            after: budget,
                        },
                    )),
                }
            }
            Entry::NextFrom(previous) => {
                let advanced =
                    timeout_at(deadline, self.provider.go_to_next_page(&previous, deadline)).await;
                match advanced {
                    Ok(Ok(snapshot)) => Ok(snapshot),
                    Ok(Err(e)) => Err(match e.phase() {
                        Phase::Advance => PageFailure::Navigation {
                            from_page: page - 1,
                            source: e,
                        },
                        Phase::Render => load_failure(page, e),
                    }),
                    Err(_) => Err(PageFailure::Navigation {
                        from_page: page - 1,
                        source: ProviderError::Timeout {
                            phase: Phase::Advance,
                            after: budget,
                        },
                    }),
                }
            }
        }
    }
}

fn load_failure(page: u32, error: ProviderError) -> PageFailure {
    PageFailure::PageLoad {
        page,
        source: LoadError::Provider(error),
    }
}
