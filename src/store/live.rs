use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use crate::types::{ChangeEvent, Collection};

use super::LocalStore;

/// A read whose result is re-delivered whenever a write lands in the
/// collection it watches.
///
/// The first `next()` returns the current result immediately; every later
/// call waits for a relevant commit and returns the refreshed result. The
/// query closure runs against the store's mirrors, so the delivered result is
/// always at-or-after the write that triggered it. A lagged receiver simply
/// re-runs the query — overflow drops notifications, never data.
pub struct LiveQuery<T> {
    store: Arc<LocalStore>,
    collection: Collection,
    query: Box<dyn Fn(&LocalStore) -> Vec<T> + Send + Sync>,
    changes: Receiver<ChangeEvent>,
    primed: bool,
}

impl<T> LiveQuery<T> {
    pub fn new(
        store: Arc<LocalStore>,
        collection: Collection,
        query: impl Fn(&LocalStore) -> Vec<T> + Send + Sync + 'static,
    ) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            collection,
            query: Box::new(query),
            changes,
            primed: false,
        }
    }

    /// The current result on first call, then one refreshed result per
    /// relevant write. `None` once the store's change feed has shut down.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        if !self.primed {
            self.primed = true;
            return Some((self.query)(&self.store));
        }
        loop {
            match self.changes.recv().await {
                Ok(event) if event.collection == self.collection => {
                    return Some((self.query)(&self.store));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => return Some((self.query)(&self.store)),
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::{listing, maize, test_store};
    use crate::types::MarketPrice;

    #[tokio::test]
    async fn first_next_returns_current_result() {
        let store = test_store().await;
        store.put_price(maize()).await.unwrap();

        let mut live: LiveQuery<MarketPrice> = LiveQuery::new(
            Arc::clone(&store),
            Collection::Prices,
            |s: &LocalStore| s.prices(),
        );
        let result = live.next().await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].commodity, "Maize");
    }

    #[tokio::test]
    async fn refreshed_result_arrives_after_write() {
        let store = test_store().await;
        store.put_price(maize()).await.unwrap();

        let mut live: LiveQuery<MarketPrice> = LiveQuery::new(
            Arc::clone(&store),
            Collection::Prices,
            |s: &LocalStore| s.query_prices(|p| p.price > 460.0),
        );
        assert!(live.next().await.unwrap().is_empty());

        let mut bumped = maize();
        bumped.price = 470.0;
        store.put_price(bumped).await.unwrap();

        let refreshed = live.next().await.unwrap();
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].price, 470.0);
    }

    #[tokio::test]
    async fn writes_to_other_collections_are_ignored() {
        let store = test_store().await;

        let mut live: LiveQuery<MarketPrice> = LiveQuery::new(
            Arc::clone(&store),
            Collection::Prices,
            |s: &LocalStore| s.prices(),
        );
        live.next().await.unwrap();

        // a listing write must not wake the price query; a price write must
        store.put_listing(listing("l1", "u1")).await.unwrap();
        store.put_price(maize()).await.unwrap();

        let refreshed = live.next().await.unwrap();
        assert_eq!(refreshed.len(), 1);
    }
}
