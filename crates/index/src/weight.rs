use crate::graph::{EntityId, RankProvider};
use log::warn;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Ranks above this threshold switch to rank-based weights.
pub const RANK_THRESHOLD: f64 = 0.01;

type Locator = Box<dyn Fn() -> Option<Arc<dyn RankProvider>> + Send + Sync>;

/// Computes suggestion weights.
///
/// Ranked entities land in `9_000..=10_000` and always beat unranked ones, which get
/// `1_000 - chars(text)` so shorter texts come first.
pub struct Weighting {
    locate: Locator,
    provider: OnceCell<Option<Arc<dyn RankProvider>>>,
}

impl Weighting {
    /// The locator runs once, on the first weight request.
    pub fn new(
        locate: impl Fn() -> Option<Arc<dyn RankProvider>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            locate: Box::new(locate),
            provider: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_provider(provider: Option<Arc<dyn RankProvider>>) -> Self {
        Self::new(move || provider.clone())
    }

    #[must_use]
    pub fn unranked() -> Self {
        Self::with_provider(None)
    }

    fn provider(&self) -> Option<&Arc<dyn RankProvider>> {
        self.provider
            .get_or_init(|| {
                let provider = (self.locate)();
                if provider.is_none() {
                    warn!("No rank provider found; weights fall back to text length");
                }
                provider
            })
            .as_ref()
    }

    #[must_use]
    pub fn weight(&self, id: EntityId, text: &str) -> i64 {
        let rank = self
            .provider()
            .map_or(0.0, |provider| provider.normalized_rank(id));
        weight_for(rank, text)
    }
}

/// Weight for a given normalized rank.
#[must_use]
pub fn weight_for(rank: f64, text: &str) -> i64 {
    if rank > RANK_THRESHOLD {
        let inverse = 1.0 - rank;
        (10_000.0 - inverse.powi(4) * 1_000.0).round() as i64
    } else {
        1_000 - text.chars().count() as i64
    }
}
