//! Reverse geocoding: convert coordinates to human-readable place names.
//! The default backend is Nominatim (OpenStreetMap), free and keyless.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::types::{Coordinate, GeocodeError};

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("Nimbus/", env!("CARGO_PKG_VERSION"));

/// Postal address fields a geocoder may return
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// City, town or village
    pub locality: Option<String>,
    /// County or district
    pub sub_admin_area: Option<String>,
    /// State or region
    pub admin_area: Option<String>,
    pub country_name: Option<String>,
}

impl Address {
    /// First non-empty of locality, sub-admin area, admin area.
    pub fn place_name(&self) -> Option<&str> {
        [&self.locality, &self.sub_admin_area, &self.admin_area]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|name| !name.is_empty())
    }
}

/// Reverse geocoding backend
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Addresses near `coordinate`, best match first, at most `max_results`.
    async fn reverse(
        &self,
        coordinate: Coordinate,
        max_results: usize,
    ) -> Result<Vec<Address>, GeocodeError>;
}

/// Best-effort coordinate to place name lookup
#[derive(Clone)]
pub struct GeocodeResolver {
    geocoder: Arc<dyn Geocoder>,
}

impl GeocodeResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    /// Place name for `coordinate`, or `None` on any failure or empty result.
    pub async fn resolve(&self, coordinate: Coordinate) -> Option<String> {
        let addresses = match self.geocoder.reverse(coordinate, 1).await {
            Ok(addresses) => addresses,
            Err(e) => {
                tracing::debug!("Reverse geocode failed for {}: {}", coordinate, e);
                return None;
            }
        };

        let name = addresses.first()?.place_name()?.to_string();
        tracing::info!("Reverse geocoded {} to: {}", coordinate, name);
        Some(name)
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
    /// Set instead of `address` when nothing is found
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl From<NominatimAddress> for Address {
    fn from(addr: NominatimAddress) -> Self {
        Self {
            locality: addr.city.or(addr.town).or(addr.village).or(addr.municipality),
            sub_admin_area: addr.county.or(addr.state_district),
            admin_area: addr.state,
            country_name: addr.country,
        }
    }
}

/// [`Geocoder`] backed by the Nominatim reverse endpoint
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: Option<&str>) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .build()
            .map_err(|e| GeocodeError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(
        &self,
        coordinate: Coordinate,
        max_results: usize,
    ) -> Result<Vec<Address>, GeocodeError> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .await
            .map_err(|e| GeocodeError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeocodeError::Lookup(format!(
                "status {}",
                response.status()
            )));
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| GeocodeError::Lookup(e.to_string()))?;

        if let Some(error) = body.error {
            tracing::debug!("Nominatim found nothing at {}: {}", coordinate, error);
        }

        // Nominatim's reverse endpoint answers with at most one place
        Ok(body.address.map(Address::from).into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticGeocoder(Result<Vec<Address>, GeocodeError>);

    #[async_trait]
    impl Geocoder for StaticGeocoder {
        async fn reverse(&self, _: Coordinate, _: usize) -> Result<Vec<Address>, GeocodeError> {
            self.0.clone()
        }
    }

    fn resolver(result: Result<Vec<Address>, GeocodeError>) -> GeocodeResolver {
        GeocodeResolver::new(Arc::new(StaticGeocoder(result)))
    }

    fn seattle() -> Coordinate {
        Coordinate::new(47.6062, -122.3321)
    }

    fn address(locality: Option<&str>, sub_admin: Option<&str>, admin: Option<&str>) -> Address {
        Address {
            locality: locality.map(str::to_string),
            sub_admin_area: sub_admin.map(str::to_string),
            admin_area: admin.map(str::to_string),
            country_name: None,
        }
    }

    #[test]
    fn test_place_name_prefers_locality() {
        let addr = address(Some("Seattle"), Some("King County"), Some("Washington"));
        assert_eq!(addr.place_name(), Some("Seattle"));
    }

    #[test]
    fn test_place_name_falls_back_in_order() {
        let addr = address(None, Some("King County"), Some("Washington"));
        assert_eq!(addr.place_name(), Some("King County"));

        let addr = address(Some("  "), Some(""), Some("Washington"));
        assert_eq!(addr.place_name(), Some("Washington"));

        assert_eq!(address(None, None, None).place_name(), None);
    }

    #[tokio::test]
    async fn test_resolve_takes_first_address() {
        let resolver = resolver(Ok(vec![
            address(Some("Seattle"), None, None),
            address(Some("Bellevue"), None, None),
        ]));
        assert_eq!(resolver.resolve(seattle()).await.as_deref(), Some("Seattle"));
    }

    #[tokio::test]
    async fn test_resolve_swallows_errors_and_empty_results() {
        let failing = resolver(Err(GeocodeError::Unavailable("offline".into())));
        assert_eq!(failing.resolve(seattle()).await, None);

        let empty = resolver(Ok(Vec::new()));
        assert_eq!(empty.resolve(seattle()).await, None);

        let nameless = resolver(Ok(vec![address(None, None, None)]));
        assert_eq!(nameless.resolve(seattle()).await, None);
    }

    #[tokio::test]
    async fn test_nominatim_maps_address_fields() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "Seattle, King County, Washington, United States",
                "address": {
                    "city": "Seattle",
                    "county": "King County",
                    "state": "Washington",
                    "country": "United States"
                }
            })))
            .mount(&mock_server)
            .await;

        let geocoder = NominatimGeocoder::new(&mock_server.uri(), None).unwrap();
        let addresses = geocoder.reverse(seattle(), 1).await.unwrap();

        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].locality.as_deref(), Some("Seattle"));
        assert_eq!(addresses[0].sub_admin_area.as_deref(), Some("King County"));
        assert_eq!(addresses[0].admin_area.as_deref(), Some("Washington"));
    }

    #[tokio::test]
    async fn test_nominatim_village_counts_as_locality() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": { "village": "Hallstatt", "state": "Upper Austria" }
            })))
            .mount(&mock_server)
            .await;

        let geocoder = Arc::new(NominatimGeocoder::new(&mock_server.uri(), None).unwrap());
        let resolver = GeocodeResolver::new(geocoder);

        assert_eq!(
            resolver.resolve(Coordinate::new(47.56, 13.65)).await.as_deref(),
            Some("Hallstatt")
        );
    }

    #[tokio::test]
    async fn test_nominatim_unable_to_geocode_is_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "Unable to geocode"
            })))
            .mount(&mock_server)
            .await;

        let geocoder = NominatimGeocoder::new(&mock_server.uri(), None).unwrap();
        let addresses = geocoder.reverse(Coordinate::new(0.0, -30.0), 1).await.unwrap();
        assert!(addresses.is_empty());
    }

    #[tokio::test]
    async fn test_nominatim_server_error_resolves_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let geocoder = Arc::new(NominatimGeocoder::new(&mock_server.uri(), None).unwrap());
        assert!(geocoder.reverse(seattle(), 1).await.is_err());
        assert_eq!(GeocodeResolver::new(geocoder).resolve(seattle()).await, None);
    }
}
