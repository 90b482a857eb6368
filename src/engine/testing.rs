//! In-memory provider and card nodes for engine tests.

use crate::error::{NodeError, ProviderError};
use crate::scrapers::traits::{CardNode, PageSnapshotProvider, PageView};
use crate::scrapers::types::SelectorRole;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct FakeCard {
    texts: HashMap<SelectorRole, String>,
    href: Option<String>,
    broken: bool,
}

impl FakeCard {
    pub fn listing(href: &str) -> Self {
        Self {
            href: Some(href.to_string()),
            ..Self::default()
        }
    }

    pub fn without_link() -> Self {
        Self::default()
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn project(href: &str) -> Self {
        Self::listing(href).with(SelectorRole::Badge, "PROYECTO")
    }

    pub fn with(mut self, role: SelectorRole, text: &str) -> Self {
        self.texts.insert(role, text.to_string());
        self
    }

    fn check(&self) -> Result<(), NodeError> {
        if self.broken {
            Err(NodeError("node detached from document".to_string()))
        } else {
            Ok(())
        }
    }
}

impl CardNode for FakeCard {
    fn text(&self, role: SelectorRole) -> Result<Option<String>, NodeError> {
        self.check()?;
        Ok(self.texts.get(&role).cloned())
    }

    fn attribute(&self, role: SelectorRole, name: &str) -> Result<Option<String>, NodeError> {
        self.check()?;
        match (role, name) {
            (SelectorRole::PrimaryLink, "href") => Ok(self.href.clone()),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeSnapshot {
    pub url: String,
    pub cards: Vec<FakeCard>,
    pub has_next: bool,
    pub empty_result: bool,
}

impl PageView for FakeSnapshot {
    fn url(&self) -> &str {
        &self.url
    }

    fn is_empty_result(&self) -> bool {
        self.empty_result
    }
}

/// What the fake returns for the next page request, in order
pub enum Step {
    Page(FakeSnapshot),
    Fail(ProviderError),
    /// Never answers; only the caller's deadline ends the wait
    Hang,
}

pub fn page(n: u32, cards: Vec<FakeCard>, has_next: bool) -> Step {
    Step::Page(FakeSnapshot {
        url: format!("https://www.portalinmobiliario.com/venta/departamento/test/_Desde_{n}"),
        cards,
        has_next,
        empty_result: false,
    })
}

/// Plain listing cards for the given URLs
pub fn cards(urls: &[&str]) -> Vec<FakeCard> {
    urls.iter().map(|u| FakeCard::listing(u)).collect()
}

pub struct FakeProvider {
    steps: VecDeque<Step>,
    pub loads: u32,
    pub advances: u32,
}

impl FakeProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            loads: 0,
            advances: 0,
        }
    }

    async fn next(&mut self) -> Result<FakeSnapshot, ProviderError> {
        match self.steps.pop_front() {
            Some(Step::Page(snapshot)) => Ok(snapshot),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Err(ProviderError::render("hang step outlived its caller"))
            }
            None => Err(ProviderError::render("no more scripted pages")),
        }
    }
}

#[async_trait(?Send)]
impl PageSnapshotProvider for FakeProvider {
    type Snapshot = FakeSnapshot;

    fn name(&self) -> &'static str {
        "fake"
    }

    async fn load(
        &mut self,
        _url: &Url,
        _deadline: Instant,
    ) -> Result<FakeSnapshot, ProviderError> {
        self.loads += 1;
        self.next().await
    }

    fn list_card_nodes<'s>(&'s self, snapshot: &'s FakeSnapshot) -> Vec<Box<dyn CardNode + 's>> {
        snapshot
            .cards
            .iter()
            .map(|card| Box::new(card.clone()) as Box<dyn CardNode + 's>)
            .collect()
    }

    fn has_next_page(&self, snapshot: &FakeSnapshot) -> bool {
        snapshot.has_next
    }

    async fn go_to_next_page(
        &mut self,
        _snapshot: &FakeSnapshot,
        _deadline: Instant,
    ) -> Result<FakeSnapshot, ProviderError> {
        self.advances += 1;
        self.next().await
    }
}
