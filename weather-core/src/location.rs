//! Location providers and the one-shot location fix.

use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::Coordinates;

pub const DEFAULT_IP_LOOKUP_URL: &str = "http://ip-api.com/json";
pub const DEFAULT_FIX_TIMEOUT: Duration = Duration::from_secs(30);

pub type SubscriptionId = u64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("No location provider is enabled")]
    ProviderDisabled,
    #[error("Location request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Location request was cancelled")]
    Cancelled,
    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Accuracy hint for a location request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    HighAccuracy,
    Balanced,
}

/// Which providers are currently switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderStatus {
    pub gps: bool,
    pub network: bool,
}

pub trait LocationService: Send + Sync {
    fn providers(&self) -> ProviderStatus;

    /// Start delivering fixes into `sink` until [`LocationService::remove_updates`] is called.
    fn request_updates(
        &self,
        priority: Priority,
        sink: mpsc::UnboundedSender<Coordinates>,
    ) -> Result<SubscriptionId, LocationError>;

    /// Stop a subscription. Unknown ids are ignored.
    fn remove_updates(&self, id: SubscriptionId);
}

/// True if either the GPS-grade or the network provider is enabled.
pub fn is_location_enabled(service: &dyn LocationService) -> bool {
    let status = service.providers();
    status.gps || status.network
}

/// A registered update subscription.
///
/// Unsubscribes exactly once: on [`Subscription::release`] or on drop.
pub struct Subscription<'a> {
    service: &'a dyn LocationService,
    id: SubscriptionId,
    updates: mpsc::UnboundedReceiver<Coordinates>,
    released: bool,
}

impl<'a> Subscription<'a> {
    pub fn open(service: &'a dyn LocationService, priority: Priority) -> Result<Self, LocationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = service.request_updates(priority, tx)?;
        debug!(id, ?priority, "location subscription opened");
        Ok(Self { service, id, updates: rx, released: false })
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next fix. `None` once the provider has given up.
    pub async fn next_fix(&mut self) -> Option<Coordinates> {
        self.updates.recv().await
    }

    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.updates.close();
            self.service.remove_updates(self.id);
            debug!(id = self.id, "location subscription released");
        }
    }
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Requests a single fix and tears the subscription down afterwards.
pub struct LocationFix<'a> {
    service: &'a dyn LocationService,
    priority: Priority,
    timeout: Duration,
}

impl<'a> LocationFix<'a> {
    pub fn new(service: &'a dyn LocationService) -> Self {
        Self { service, priority: Priority::HighAccuracy, timeout: DEFAULT_FIX_TIMEOUT }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Coordinates, LocationError> {
        let mut subscription = Subscription::open(self.service, self.priority)?;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(LocationError::Cancelled),
            res = tokio::time::timeout(self.timeout, subscription.next_fix()) => match res {
                Ok(Some(coordinates)) => Ok(coordinates),
                Ok(None) => Err(LocationError::Unavailable("provider stopped without a fix".into())),
                Err(_) => Err(LocationError::Timeout(self.timeout)),
            },
        };

        subscription.release();

        match &outcome {
            Ok(c) => info!(latitude = c.latitude, longitude = c.longitude, "location fix acquired"),
            Err(e) => warn!(error = %e, "location fix failed"),
        }
        outcome
    }
}

/// Looks up approximate coordinates for the public IP address.
#[derive(Debug, Clone)]
pub struct IpLocator {
    http: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

impl IpLocator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into() })
    }

    pub async fn locate(&self) -> Result<Coordinates, LocationError> {
        let unavailable = |e: reqwest::Error| LocationError::Unavailable(e.to_string());

        let parsed: IpApiResponse = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        if parsed.status != "success" {
            return Err(LocationError::Unavailable(
                parsed.message.unwrap_or_else(|| format!("lookup status '{}'", parsed.status)),
            ));
        }

        match (parsed.lat, parsed.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => Err(LocationError::Unavailable("lookup response had no coordinates".into())),
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Fixed(Coordinates),
    Network(IpLocator),
}

impl Source {
    async fn locate(&self) -> Result<Coordinates, LocationError> {
        match self {
            Source::Fixed(c) => Ok(*c),
            Source::Network(locator) => locator.locate().await,
        }
    }
}

/// Combines fixed coordinates (GPS-grade) and IP geolocation (network).
///
/// High accuracy tries fixed coordinates first; balanced tries the network
/// provider first. Each subscription runs on its own task.
#[derive(Debug, Default)]
pub struct FusedLocationService {
    gps: Option<Coordinates>,
    network: Option<IpLocator>,
    next_id: AtomicU64,
    active: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl FusedLocationService {
    pub fn new(gps: Option<Coordinates>, network: Option<IpLocator>) -> Self {
        Self { gps, network, ..Self::default() }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.active.lock().len()
    }

    fn sources(&self, priority: Priority) -> Vec<Source> {
        let gps = self.gps.map(Source::Fixed);
        let network = self.network.clone().map(Source::Network);

        let ordered = match priority {
            Priority::HighAccuracy => [gps, network],
            Priority::Balanced => [network, gps],
        };
        ordered.into_iter().flatten().collect()
    }
}

impl LocationService for FusedLocationService {
    fn providers(&self) -> ProviderStatus {
        ProviderStatus { gps: self.gps.is_some(), network: self.network.is_some() }
    }

    fn request_updates(
        &self,
        priority: Priority,
        sink: mpsc::UnboundedSender<Coordinates>,
    ) -> Result<SubscriptionId, LocationError> {
        let sources = self.sources(priority);
        if sources.is_empty() {
            return Err(LocationError::ProviderDisabled);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = runtime.spawn(async move {
            for source in sources {
                match source.locate().await {
                    Ok(coordinates) => {
                        let _ = sink.send(coordinates);
                        return;
                    }
                    Err(e) => warn!(error = %e, "location source failed, trying next"),
                }
            }
        });

        self.active.lock().insert(id, handle);
        Ok(id)
    }

    fn remove_updates(&self, id: SubscriptionId) {
        if let Some(handle) = self.active.lock().remove(&id) {
            handle.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Accepts subscriptions but never delivers anything.
    #[derive(Default)]
    pub(crate) struct SilentService {
        pub removed: AtomicUsize,
        sinks: Mutex<Vec<mpsc::UnboundedSender<Coordinates>>>,
    }

    impl LocationService for SilentService {
        fn providers(&self) -> ProviderStatus {
            ProviderStatus { gps: true, network: false }
        }

        fn request_updates(
            &self,
            _priority: Priority,
            sink: mpsc::UnboundedSender<Coordinates>,
        ) -> Result<SubscriptionId, LocationError> {
            self.sinks.lock().push(sink);
            Ok(7)
        }

        fn remove_updates(&self, _id: SubscriptionId) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn availability_follows_providers() {
        assert!(!is_location_enabled(&FusedLocationService::default()));

        let gps_only = FusedLocationService::new(Some(Coordinates::new(1.0, 2.0)), None);
        assert!(is_location_enabled(&gps_only));
    }

    #[tokio::test]
    async fn fixed_coordinates_are_delivered_and_released() {
        let service = FusedLocationService::new(Some(Coordinates::new(52.52, 13.41)), None);

        let fix = LocationFix::new(&service).acquire(&CancellationToken::new()).await;

        assert_eq!(fix, Ok(Coordinates::new(52.52, 13.41)));
        assert_eq!(service.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn no_enabled_provider_refuses_subscription() {
        let service = FusedLocationService::default();
        let err = LocationFix::new(&service).acquire(&CancellationToken::new()).await;
        assert_eq!(err, Err(LocationError::ProviderDisabled));
    }

    #[tokio::test]
    async fn silent_provider_times_out_and_unsubscribes_once() {
        let service = SilentService::default();

        let err = LocationFix::new(&service)
            .timeout(Duration::from_millis(20))
            .acquire(&CancellationToken::new())
            .await;

        assert_eq!(err, Err(LocationError::Timeout(Duration::from_millis(20))));
        assert_eq!(service.removed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_wait() {
        let service = SilentService::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = LocationFix::new(&service).acquire(&cancel).await;

        assert_eq!(err, Err(LocationError::Cancelled));
        assert_eq!(service.removed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_a_subscription_unsubscribes() {
        let service = SilentService::default();
        {
            let subscription = Subscription::open(&service, Priority::HighAccuracy).expect("opens");
            assert_eq!(subscription.id(), 7);
        }
        assert_eq!(service.removed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ip_lookup_provides_network_fix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success", "lat": 40.71, "lon": -74.0, "city": "New York"
            })))
            .mount(&server)
            .await;

        let locator = IpLocator::new(server.uri(), Duration::from_secs(2)).expect("client");
        let service = FusedLocationService::new(None, Some(locator));

        let fix = LocationFix::new(&service).acquire(&CancellationToken::new()).await;
        assert_eq!(fix, Ok(Coordinates::new(40.71, -74.0)));
    }

    #[tokio::test]
    async fn failed_ip_lookup_reports_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "fail", "message": "reserved range"
            })))
            .mount(&server)
            .await;

        let locator = IpLocator::new(server.uri(), Duration::from_secs(2)).expect("client");
        assert_eq!(
            locator.locate().await,
            Err(LocationError::Unavailable("reserved range".into()))
        );

        let service = FusedLocationService::new(None, Some(locator));
        let err = LocationFix::new(&service).acquire(&CancellationToken::new()).await;
        assert!(matches!(err, Err(LocationError::Unavailable(_))));
    }

    #[test]
    fn priority_orders_sources() {
        let locator = IpLocator::new("http://localhost", Duration::from_secs(1)).expect("client");
        let service = FusedLocationService::new(Some(Coordinates::new(0.0, 0.0)), Some(locator));

        assert!(matches!(service.sources(Priority::HighAccuracy)[0], Source::Fixed(_)));
        assert!(matches!(service.sources(Priority::Balanced)[0], Source::Network(_)));
    }
}
