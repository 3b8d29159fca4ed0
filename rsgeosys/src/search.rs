//! Background coverage search.
//!
//! One search runs on its own thread and reports through a channel. A
//! shared lock keeps a second search from interleaving its results with a
//! running one. Thumbnails are fetched only after the full result list is
//! known and are emitted in result order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::collect::bridge::BridgeCollect;
use crate::collect::http::HttpClient;
use crate::products::catalog;
use crate::products::thumbnail::resolve_thumbnail_url;
use crate::products::types::{CoverageQuery, CoverageResult};

/// Lock shared by all searches of one application.
pub type SearchLock = Arc<Mutex<()>>;

/// What to search for.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: CoverageQuery,
    pub product_key: String,
    /// Planned nitrogen embedded in nitrogen product previews
    pub n_planned: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Started,
    Result {
        coverage: CoverageResult,
        thumbnail_url: Option<String>,
        /// Empty when no preview exists or its fetch failed
        thumbnail: Vec<u8>,
    },
    Finished {
        emitted: usize,
        stopped: bool,
    },
    Error(String),
}

/// Handle on a running search.
pub struct CoverageSearch {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CoverageSearch {
    pub fn spawn<C: HttpClient + 'static>(
        bridge: Arc<BridgeCollect<C>>,
        lock: SearchLock,
        request: SearchRequest,
    ) -> (Self, Receiver<SearchEvent>) {
        let (sender, receiver) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            // A panicked search must not block the following ones
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            run_search(&bridge, &request, &worker_stop, &sender);
        });

        (
            Self {
                stop,
                handle: Some(handle),
            },
            receiver,
        )
    }

    /// Asks the search to stop before the next result. An in-flight
    /// request completes first.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Waits for the worker thread to finish.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Coverage search thread panicked");
            }
        }
    }
}

fn run_search<C: HttpClient>(
    bridge: &BridgeCollect<C>,
    request: &SearchRequest,
    stop: &AtomicBool,
    sender: &Sender<SearchEvent>,
) {
    // Send errors mean the receiver is gone; the search just ends.
    let _ = sender.send(SearchEvent::Started);

    let definition = match catalog::lookup(&request.product_key) {
        Ok(definition) => definition,
        Err(e) => {
            let _ = sender.send(SearchEvent::Error(e.to_string()));
            return;
        }
    };

    let mut query = request.query.clone();
    query.map_product = Some(definition.key.to_string());
    let results = match bridge.search_for_product(&query) {
        Ok(results) => results,
        Err(e) => {
            warn!(error = %e, "Coverage search failed");
            let _ = sender.send(SearchEvent::Error(e.to_string()));
            return;
        }
    };
    info!(count = results.len(), product = definition.key, "Coverage results received");

    let mut emitted = 0;
    let mut stopped = false;
    for coverage in results {
        if stop.load(Ordering::SeqCst) {
            debug!("Coverage search stopped");
            stopped = true;
            break;
        }
        let thumbnail_url =
            resolve_thumbnail_url(&coverage, definition, bridge.session(), request.n_planned);
        let thumbnail = match thumbnail_url.as_deref() {
            Some(url) => bridge.fetch_thumbnail(url).unwrap_or_else(|e| {
                warn!(url, error = %e, "Thumbnail fetch failed");
                Vec::new()
            }),
            None => Vec::new(),
        };
        if sender
            .send(SearchEvent::Result {
                coverage,
                thumbnail_url,
                thumbnail,
            })
            .is_err()
        {
            return;
        }
        emitted += 1;
    }

    let _ = sender.send(SearchEvent::Finished { emitted, stopped });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::http::tests::MockHttpClient;
    use crate::collect::session::SessionContext;
    use chrono::NaiveDate;
    use serde_json::json;

    const COVERAGE_URL: &str = "https://bridge.test/field-level-maps/v4/season-fields/coverage";

    fn request(product: &str) -> SearchRequest {
        SearchRequest {
            query: CoverageQuery {
                geometry: "POLYGON((0 0,1 0,1 1,0 0))".to_string(),
                crop: "CORN".to_string(),
                sowing_date: NaiveDate::from_ymd_opt(2021, 4, 1).unwrap(),
                map_product: None,
                sensor: None,
                date_range: None,
            },
            product_key: product.to_string(),
            n_planned: 1.0,
        }
    }

    fn bridge(mock: MockHttpClient) -> Arc<BridgeCollect<MockHttpClient>> {
        Arc::new(BridgeCollect::new(
            mock,
            SessionContext::new("token", "https://bridge.test"),
        ))
    }

    fn coverage_list() -> serde_json::Value {
        json!([
            {"seasonField": {"id": "sf1"}, "image": {"date": "2021-06-01"},
             "maps": [{"type": "INSEASON_NDVI", "_links": {"thumbnail": "https://t/1.png"}}]},
            {"seasonField": {"id": "sf1"}, "image": {"date": "2021-06-11"},
             "maps": [{"type": "INSEASON_EVI", "_links": {"thumbnail": "https://t/x.png"}}]},
            {"seasonField": {"id": "sf1"}, "image": {"date": "2021-06-21"},
             "maps": [{"type": "INSEASON_NDVI", "_links": {"thumbnail": "https://t/3.png"}}]}
        ])
    }

    #[test]
    fn test_results_in_order_with_thumbnails() {
        let mock = MockHttpClient::new()
            .with_json(COVERAGE_URL, coverage_list())
            .with("https://t/1.png", 200, vec![1])
            .with("https://t/3.png", 200, vec![3]);
        let (search, events) =
            CoverageSearch::spawn(bridge(mock), SearchLock::default(), request("INSEASON_NDVI"));
        let events: Vec<SearchEvent> = events.iter().collect();
        search.join();

        assert_eq!(events.first(), Some(&SearchEvent::Started));
        let thumbnails: Vec<(String, Vec<u8>)> = events
            .iter()
            .filter_map(|event| match event {
                SearchEvent::Result {
                    coverage,
                    thumbnail,
                    ..
                } => Some((coverage.image.date.to_string(), thumbnail.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            thumbnails,
            vec![
                ("2021-06-01".to_string(), vec![1]),
                ("2021-06-11".to_string(), vec![]),
                ("2021-06-21".to_string(), vec![3]),
            ]
        );
        assert_eq!(
            events.last(),
            Some(&SearchEvent::Finished {
                emitted: 3,
                stopped: false
            })
        );
    }

    #[test]
    fn test_thumbnails_fetched_after_search() {
        let mock = MockHttpClient::new().with_json(COVERAGE_URL, coverage_list());
        let bridge = bridge(mock);
        let (search, events) = CoverageSearch::spawn(
            Arc::clone(&bridge),
            SearchLock::default(),
            request("INSEASON_NDVI"),
        );
        let _: Vec<_> = events.iter().collect();
        search.join();

        let urls: Vec<String> = bridge.client().recorded().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec![COVERAGE_URL, "https://t/1.png", "https://t/3.png"]);
    }

    #[test]
    fn test_stop_before_results() {
        let mock = MockHttpClient::new().with_json(COVERAGE_URL, coverage_list());
        let lock = SearchLock::default();
        let held = lock.lock().unwrap();
        let (search, events) =
            CoverageSearch::spawn(bridge(mock), Arc::clone(&lock), request("INSEASON_NDVI"));
        search.stop();
        assert!(search.is_stopped());
        drop(held);

        let events: Vec<SearchEvent> = events.iter().collect();
        search.join();
        assert_eq!(
            events,
            vec![
                SearchEvent::Started,
                SearchEvent::Finished {
                    emitted: 0,
                    stopped: true
                }
            ]
        );
    }

    #[test]
    fn test_search_error_is_reported() {
        let mock = MockHttpClient::new().with_json(COVERAGE_URL, json!({"message": "Expired token"}));
        let (search, events) =
            CoverageSearch::spawn(bridge(mock), SearchLock::default(), request("INSEASON_NDVI"));
        let events: Vec<SearchEvent> = events.iter().collect();
        search.join();
        assert_eq!(
            events,
            vec![
                SearchEvent::Started,
                SearchEvent::Error("Expired token".to_string())
            ]
        );
    }

    #[test]
    fn test_unknown_product_is_reported() {
        let (search, events) = CoverageSearch::spawn(
            bridge(MockHttpClient::new()),
            SearchLock::default(),
            request("NOPE"),
        );
        let events: Vec<SearchEvent> = events.iter().collect();
        search.join();
        assert_eq!(events[1], SearchEvent::Error("unknown map product: NOPE".to_string()));
    }
}
