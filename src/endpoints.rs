//! Rotating endpoint pool for one logical chain.

use url::Url;

/// An ordered list of RPC endpoints with a cursor.
///
/// Advancing always moves to the next index modulo the pool length. The wrap
/// signal tells callers that every endpoint has now been tried once since the
/// last successful call, which is when backoff should lengthen.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Url>,
    index: usize,
}

impl EndpointPool {
    /// Creates a pool over the given endpoints.
    ///
    /// The pool must be non-empty; emptiness is rejected at configuration
    /// validation, before a pool is ever built.
    pub fn new(endpoints: Vec<Url>) -> Self {
        debug_assert!(!endpoints.is_empty(), "endpoint pool must be non-empty");
        Self { endpoints, index: 0 }
    }

    /// The endpoint the cursor currently points at.
    pub fn current(&self) -> &Url {
        &self.endpoints[self.index]
    }

    /// Advances the cursor to the next endpoint, wrapping around.
    ///
    /// Returns the new current endpoint and `true` exactly when the cursor
    /// wrapped from the last index back to 0.
    pub fn advance(&mut self) -> (&Url, bool) {
        let wrapped = self.index + 1 == self.endpoints.len();
        self.index = (self.index + 1) % self.endpoints.len();
        (&self.endpoints[self.index], wrapped)
    }

    /// Number of endpoints in the pool.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the pool is empty. Never true for a constructed pool.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> EndpointPool {
        EndpointPool::new(
            (0..n).map(|i| format!("http://node{i}.example:8545").parse().unwrap()).collect(),
        )
    }

    #[test]
    fn advance_wraps_on_last_index() {
        let mut pool = pool(3);
        let first = pool.current().clone();

        let (_, wrapped) = pool.advance();
        assert!(!wrapped);
        let (_, wrapped) = pool.advance();
        assert!(!wrapped);
        let (url, wrapped) = pool.advance();
        assert!(wrapped);
        assert_eq!(*url, first);
    }

    #[test]
    fn single_endpoint_always_wraps() {
        let mut pool = pool(1);
        let (url, wrapped) = pool.advance();
        assert!(wrapped);
        assert_eq!(url.as_str(), "http://node0.example:8545/");
    }
}
