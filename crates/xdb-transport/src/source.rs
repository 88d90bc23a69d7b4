//! Data sources: where physical sessions come from.

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::error::TransportError;
use crate::session::PhysicalSession;

/// Highest endpoint priority.
pub const MAX_PRIORITY: u8 = 100;

/// Something that can open new physical sessions.
pub trait DataSource: Send + Sync {
    /// Open and authenticate a new physical session.
    fn connect(&self) -> Result<Box<dyn PhysicalSession>, TransportError>;

    /// Short description for logs.
    fn describe(&self) -> String {
        "data source".to_string()
    }
}

/// Shared, type-erased data source.
pub type DynDataSource = Arc<dyn DataSource>;

/// A network endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens a physical session to one endpoint.
pub trait SessionConnector: Send + Sync {
    /// Connect to `endpoint`.
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn PhysicalSession>, TransportError>;
}

/// A data source with several endpoints, tried in priority order.
///
/// Endpoints added without an explicit priority get decreasing priorities
/// starting at [`MAX_PRIORITY`]. Higher priority is tried first; endpoints of
/// equal priority are tried in random order, so clients spread over them.
pub struct MultiSource {
    endpoints: Vec<(Endpoint, u8)>,
    next_implicit: u8,
    connector: Arc<dyn SessionConnector>,
}

impl MultiSource {
    /// Create an empty source using `connector` for every endpoint.
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            endpoints: Vec::new(),
            next_implicit: MAX_PRIORITY,
            connector,
        }
    }

    /// Add an endpoint with the next implicit priority.
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        let prio = self.next_implicit;
        self.next_implicit = self.next_implicit.saturating_sub(1);
        self.endpoints.push((endpoint, prio));
        self
    }

    /// Add an endpoint with an explicit priority (0..=100).
    pub fn endpoint_with_priority(
        mut self,
        endpoint: Endpoint,
        priority: u8,
    ) -> Result<Self, TransportError> {
        if priority > MAX_PRIORITY {
            return Err(TransportError::Protocol(format!(
                "priority {priority} for {endpoint} out of range 0..={MAX_PRIORITY}"
            )));
        }
        self.endpoints.push((endpoint, priority));
        Ok(self)
    }

    /// Endpoints in the order they will be tried.
    ///
    /// Each call shuffles endpoints that share a priority.
    #[must_use]
    pub fn ordered(&self) -> Vec<&Endpoint> {
        let mut rng = rand::thread_rng();
        let mut list = self.by_priority();
        for group in list.chunk_by_mut(|a, b| a.1 == b.1) {
            group.shuffle(&mut rng);
        }
        list.into_iter().map(|(e, _)| e).collect()
    }

    /// Endpoints by decreasing priority, insertion order within a priority.
    fn by_priority(&self) -> Vec<&(Endpoint, u8)> {
        let mut list: Vec<_> = self.endpoints.iter().collect();
        list.sort_by(|a, b| b.1.cmp(&a.1));
        list
    }

    /// Number of endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether no endpoint was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl DataSource for MultiSource {
    fn connect(&self) -> Result<Box<dyn PhysicalSession>, TransportError> {
        let mut last_err = None;
        let ordered = self.ordered();

        for endpoint in &ordered {
            match self.connector.connect(endpoint) {
                Ok(session) => {
                    tracing::debug!(endpoint = %endpoint, "connected");
                    return Ok(session);
                }
                Err(e) => {
                    tracing::debug!(endpoint = %endpoint, error = %e, "endpoint failed, trying next");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if ordered.len() == 1 => Err(e),
            _ => Err(TransportError::NoEndpoint {
                attempted: ordered.len(),
            }),
        }
    }

    fn describe(&self) -> String {
        let hosts: Vec<String> = self.by_priority().iter().map(|(e, _)| e.to_string()).collect();
        hosts.join(",")
    }
}

impl fmt::Debug for MultiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiSource")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refusing;

    impl SessionConnector for Refusing {
        fn connect(&self, _: &Endpoint) -> Result<Box<dyn PhysicalSession>, TransportError> {
            Err(TransportError::ConnectionClosed)
        }
    }

    #[test]
    fn test_implicit_priorities_decrease() {
        let src = MultiSource::new(Arc::new(Refusing))
            .endpoint(Endpoint::new("a", 1))
            .endpoint(Endpoint::new("b", 2));

        let hosts: Vec<_> = src.ordered().iter().map(|e| e.host.clone()).collect();
        assert_eq!(hosts, vec!["a", "b"]);
    }

    #[test]
    fn test_explicit_priority_order() {
        let src = MultiSource::new(Arc::new(Refusing))
            .endpoint_with_priority(Endpoint::new("low", 1), 10)
            .unwrap()
            .endpoint_with_priority(Endpoint::new("high", 2), 90)
            .unwrap()
            .endpoint_with_priority(Endpoint::new("high2", 3), 90)
            .unwrap();

        let hosts: Vec<_> = src.ordered().iter().map(|e| e.host.clone()).collect();
        assert_eq!(hosts.len(), 3);
        assert_eq!(hosts[2], "low");
        assert_eq!(src.describe(), "high:2,high2:3,low:1");
    }

    #[test]
    fn test_equal_priorities_are_shuffled() {
        let src = MultiSource::new(Arc::new(Refusing))
            .endpoint_with_priority(Endpoint::new("a", 1), 50)
            .unwrap()
            .endpoint_with_priority(Endpoint::new("b", 2), 50)
            .unwrap()
            .endpoint_with_priority(Endpoint::new("last", 3), 5)
            .unwrap();

        let mut firsts = std::collections::HashSet::new();
        for _ in 0..64 {
            let ordered = src.ordered();
            assert_eq!(ordered[2].host, "last");
            firsts.insert(ordered[0].host.clone());
        }
        assert_eq!(firsts.len(), 2);
    }

    #[test]
    fn test_priority_out_of_range() {
        let result =
            MultiSource::new(Arc::new(Refusing)).endpoint_with_priority(Endpoint::new("x", 1), 101);
        assert!(result.is_err());
    }

    #[test]
    fn test_all_endpoints_refuse() {
        let src = MultiSource::new(Arc::new(Refusing))
            .endpoint(Endpoint::new("a", 1))
            .endpoint(Endpoint::new("b", 2));

        match src.connect() {
            Err(TransportError::NoEndpoint { attempted }) => assert_eq!(attempted, 2),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_single_endpoint_keeps_original_error() {
        let src = MultiSource::new(Arc::new(Refusing)).endpoint(Endpoint::new("a", 1));
        assert!(matches!(
            src.connect(),
            Err(TransportError::ConnectionClosed)
        ));
    }
}
