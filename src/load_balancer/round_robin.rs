// src/load_balancer/round_robin.rs
use crate::errors::Error;
use crate::load_balancer::{Endpoint, LoadBalancer};
use crate::request::ProxyRequest;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Rotates through the pool in insertion order.
///
/// The endpoint list and the cursor sit behind one lock so a selection
/// never observes an endpoint that has already been removed.
#[derive(Debug, Default)]
pub struct RoundRobin {
    state: Mutex<RotationState>,
}

#[derive(Debug, Default)]
struct RotationState {
    endpoints: Vec<Arc<Endpoint>>,
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(endpoints: impl IntoIterator<Item = Endpoint>) -> Result<Self, Error> {
        let rr = Self::new();
        for endpoint in endpoints {
            rr.add_endpoint(endpoint)?;
        }
        Ok(rr)
    }

    fn lock(&self) -> MutexGuard<'_, RotationState> {
        // The state is consistent after every statement, so a panicking holder cannot corrupt it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LoadBalancer for RoundRobin {
    fn next_endpoint(&self, _req: &ProxyRequest) -> Result<Arc<Endpoint>, Error> {
        let mut state = self.lock();
        let len = state.endpoints.len();
        if len == 0 {
            return Err(Error::NoAvailableEndpoints);
        }

        let index = state.cursor % len;
        state.cursor = (index + 1) % len;
        Ok(state.endpoints[index].clone())
    }

    fn add_endpoint(&self, endpoint: Endpoint) -> Result<(), Error> {
        let mut state = self.lock();
        if state.endpoints.iter().any(|e| e.id() == endpoint.id()) {
            return Err(Error::EndpointExists(endpoint.id().to_string()));
        }

        tracing::info!(endpoint = %endpoint, "Added endpoint");
        state.endpoints.push(Arc::new(endpoint));
        Ok(())
    }

    fn remove_endpoint(&self, id: &str) -> Result<(), Error> {
        let mut state = self.lock();
        let index = state
            .endpoints
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| Error::EndpointNotFound(id.to_string()))?;

        state.endpoints.remove(index);
        if index < state.cursor {
            state.cursor -= 1;
        }
        if state.cursor >= state.endpoints.len() {
            state.cursor = 0;
        }

        tracing::info!(endpoint = %id, "Removed endpoint");
        Ok(())
    }

    fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.lock().endpoints.clone()
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn request() -> ProxyRequest {
        let (parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        ProxyRequest::new(1, parts, None)
    }

    fn pool(n: usize) -> RoundRobin {
        RoundRobin::with_endpoints(
            (0..n).map(|i| Endpoint::parse(&format!("http://127.0.0.1:{}", 8000 + i)).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_round_robin() {
        let lb = pool(2);
        let req = request();

        assert_eq!(lb.next_endpoint(&req).unwrap().id(), "http://127.0.0.1:8000");
        assert_eq!(lb.next_endpoint(&req).unwrap().id(), "http://127.0.0.1:8001");
        assert_eq!(lb.next_endpoint(&req).unwrap().id(), "http://127.0.0.1:8000");
    }

    #[test]
    fn empty_pool_has_no_endpoints() {
        let lb = RoundRobin::new();
        assert!(matches!(
            lb.next_endpoint(&request()),
            Err(Error::NoAvailableEndpoints)
        ));
    }

    #[test]
    fn rejects_duplicates_and_unknown_removals() {
        let lb = pool(1);
        assert!(matches!(
            lb.add_endpoint(Endpoint::parse("http://127.0.0.1:8000/other").unwrap()),
            Err(Error::EndpointExists(_))
        ));
        assert!(matches!(
            lb.remove_endpoint("http://127.0.0.1:9999"),
            Err(Error::EndpointNotFound(_))
        ));
    }

    #[test]
    fn removed_endpoint_is_never_selected() {
        let lb = pool(3);
        let req = request();
        lb.next_endpoint(&req).unwrap();
        lb.next_endpoint(&req).unwrap();

        lb.remove_endpoint("http://127.0.0.1:8001").unwrap();
        for _ in 0..10 {
            assert_ne!(lb.next_endpoint(&req).unwrap().id(), "http://127.0.0.1:8001");
        }

        lb.remove_endpoint("http://127.0.0.1:8000").unwrap();
        lb.remove_endpoint("http://127.0.0.1:8002").unwrap();
        assert!(lb.next_endpoint(&req).is_err());
        assert!(lb.endpoints().is_empty());
    }

    #[test]
    fn concurrent_selection_is_even() {
        let lb = Arc::new(pool(4));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lb = lb.clone();
                std::thread::spawn(move || {
                    let req = request();
                    (0..1000)
                        .map(|_| lb.next_endpoint(&req).unwrap().id().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                *counts.entry(id).or_default() += 1;
            }
        }
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&c| c == 2000));
    }

    proptest! {
        #[test]
        fn selections_stay_within_one_of_even_share(n in 1usize..8, m in 1usize..400) {
            let lb = pool(n);
            let req = request();
            let mut counts = vec![0usize; n];
            for _ in 0..m {
                let e = lb.next_endpoint(&req).unwrap();
                let port: usize = e.url().port().unwrap().into();
                counts[port - 8000] += 1;
            }
            let max = *counts.iter().max().unwrap();
            let min = *counts.iter().min().unwrap();
            prop_assert!(max - min <= 1);
            prop_assert!(max <= (m + n - 1) / n);
        }
    }
}
