use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::config::{Config, LatLong};
use crate::error::Error;

const HTTP_TIMEOUT_SECS: u64 = 10;

/// Whether a query should account for live traffic conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traffic {
    Live,
    FreeFlow,
}

/// Result of a single route query.
#[derive(Debug, Clone)]
pub struct TravelEstimate {
    pub minutes: f64,
    pub distance_km: f64,
    pub waypoints: Vec<LatLong>,
}

/// A traffic-aware routing service.
///
/// The implementation is picked once from the configuration; there is no
/// per-request dispatch.
#[async_trait]
pub trait RouteProvider: Send + Sync + std::fmt::Debug {
    /// Travel estimate between two points, optionally pinned to `via`
    /// waypoints.
    async fn route(
        &self,
        start: LatLong,
        end: LatLong,
        via: &[LatLong],
        traffic: Traffic,
    ) -> Result<TravelEstimate, Error>;

    /// Best route ignoring traffic, with full waypoint geometry where the
    /// provider exposes it.
    async fn optimal_route(&self, start: LatLong, end: LatLong) -> Result<TravelEstimate, Error> {
        self.route(start, end, &[], Traffic::FreeFlow).await
    }
}

/// Builds the provider selected by the configuration.
///
/// A missing `provider` key falls back to the mock provider with a warning,
/// so the tool stays usable without credentials.
pub fn from_config(config: &Config) -> Result<Box<dyn RouteProvider>, Error> {
    let provider = config.provider.as_deref().unwrap_or_default();
    if provider.is_empty() {
        warn!("No API provider configured, using mock data");
        warn!("Add 'provider = \"mapbox\"' or 'provider = \"google\"' to your config file");
        return Ok(Box::new(MockProvider::default()));
    }

    match provider.to_lowercase().as_str() {
        "mapbox" => {
            let api_key = config.resolve_api_key("MAPBOX_API_KEY").ok_or(
                Error::MissingApiKey {
                    provider: "Mapbox",
                    env_var: "MAPBOX_API_KEY",
                },
            )?;
            Ok(Box::new(MapboxProvider::new(api_key)?))
        }
        "google" => {
            let api_key = config.resolve_api_key("GOOGLE_MAPS_API_KEY").ok_or(
                Error::MissingApiKey {
                    provider: "Google Maps",
                    env_var: "GOOGLE_MAPS_API_KEY",
                },
            )?;
            Ok(Box::new(GoogleProvider::new(api_key)?))
        }
        "mock" => Ok(Box::new(MockProvider::default())),
        other => Err(Error::Config(format!("unsupported API provider: {other}"))),
    }
}

/// True when the configuration selects (or falls back to) the mock provider.
pub fn is_mock(config: &Config) -> bool {
    config
        .provider
        .as_deref()
        .is_none_or(|p| p.is_empty() || p.eq_ignore_ascii_case("mock"))
}

fn http_client() -> Result<Client, Error> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}

// --- Mapbox ---

#[derive(Debug)]
pub struct MapboxProvider {
    client: Client,
    api_key: String,
}

impl MapboxProvider {
    pub fn new(api_key: String) -> Result<Self, Error> {
        Ok(Self {
            client: http_client()?,
            api_key,
        })
    }

    fn request_url(
        &self,
        start: LatLong,
        end: LatLong,
        via: &[LatLong],
        traffic: Traffic,
    ) -> Result<Url, Error> {
        let profile = match traffic {
            Traffic::Live => "driving-traffic",
            Traffic::FreeFlow => "driving",
        };

        // Mapbox wants lng,lat pairs joined by ';'
        let mut coords = Vec::with_capacity(via.len() + 2);
        coords.push(format_lnglat(start));
        coords.extend(via.iter().copied().map(format_lnglat));
        coords.push(format_lnglat(end));

        let url = format!(
            "https://api.mapbox.com/directions/v5/mapbox/{profile}/{}",
            coords.join(";")
        );
        Ok(Url::parse_with_params(
            &url,
            [
                ("access_token", self.api_key.as_str()),
                ("geometries", "geojson"),
                ("overview", "full"),
                ("steps", "false"),
            ],
        )?)
    }
}

fn format_lnglat((lat, lng): LatLong) -> String {
    format!("{lng},{lat}")
}

#[derive(Deserialize)]
struct MapboxResponse {
    #[serde(default)]
    routes: Vec<MapboxRoute>,
}

#[derive(Deserialize)]
struct MapboxRoute {
    /// Seconds.
    duration: f64,
    /// Meters.
    distance: f64,
    geometry: MapboxGeometry,
}

#[derive(Deserialize)]
struct MapboxGeometry {
    /// GeoJSON `[lng, lat]` pairs.
    coordinates: Vec<(f64, f64)>,
}

#[async_trait]
impl RouteProvider for MapboxProvider {
    async fn route(
        &self,
        start: LatLong,
        end: LatLong,
        via: &[LatLong],
        traffic: Traffic,
    ) -> Result<TravelEstimate, Error> {
        let url = self.request_url(start, end, via, traffic)?;
        let response: MapboxResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("no routes found".to_string()))?;

        let waypoints = route
            .geometry
            .coordinates
            .into_iter()
            .map(|(lng, lat)| (lat, lng))
            .collect();

        Ok(TravelEstimate {
            minutes: route.duration / 60.0,
            distance_km: route.distance / 1000.0,
            waypoints,
        })
    }
}

// --- Google Maps ---

#[derive(Debug)]
pub struct GoogleProvider {
    client: Client,
    api_key: String,
}

impl GoogleProvider {
    pub fn new(api_key: String) -> Result<Self, Error> {
        Ok(Self {
            client: http_client()?,
            api_key,
        })
    }

    fn request_url(
        &self,
        start: LatLong,
        end: LatLong,
        via: &[LatLong],
        traffic: Traffic,
    ) -> Result<Url, Error> {
        let mut params = vec![
            ("origin".to_string(), format_latlng(start)),
            ("destination".to_string(), format_latlng(end)),
            ("key".to_string(), self.api_key.clone()),
            ("units".to_string(), "metric".to_string()),
        ];
        if !via.is_empty() {
            let waypoints = via
                .iter()
                .copied()
                .map(format_latlng)
                .collect::<Vec<_>>()
                .join("|");
            params.push(("waypoints".to_string(), waypoints));
        }
        if traffic == Traffic::Live {
            params.push(("departure_time".to_string(), "now".to_string()));
        }

        Ok(Url::parse_with_params(
            "https://maps.googleapis.com/maps/api/directions/json",
            params,
        )?)
    }
}

fn format_latlng((lat, lng): LatLong) -> String {
    format!("{lat},{lng}")
}

#[derive(Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    routes: Vec<GoogleRoute>,
}

#[derive(Deserialize)]
struct GoogleRoute {
    legs: Vec<GoogleLeg>,
}

#[derive(Deserialize)]
struct GoogleLeg {
    duration: GoogleValue,
    #[serde(default)]
    duration_in_traffic: Option<GoogleValue>,
    distance: GoogleValue,
}

#[derive(Deserialize)]
struct GoogleValue {
    /// Seconds for durations, meters for distances.
    value: f64,
}

#[async_trait]
impl RouteProvider for GoogleProvider {
    async fn route(
        &self,
        start: LatLong,
        end: LatLong,
        via: &[LatLong],
        traffic: Traffic,
    ) -> Result<TravelEstimate, Error> {
        let url = self.request_url(start, end, via, traffic)?;
        let response: GoogleResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status != "OK" || response.routes.is_empty() {
            return Err(Error::Provider(format!(
                "Google Maps API error: {}",
                response.status
            )));
        }

        let route = &response.routes[0];
        let leg = route
            .legs
            .first()
            .ok_or_else(|| Error::Provider("route has no legs".to_string()))?;

        // duration_in_traffic is only present for departure_time=now requests
        let duration_secs = match (traffic, &leg.duration_in_traffic) {
            (Traffic::Live, Some(in_traffic)) => in_traffic.value,
            _ => leg.duration.value,
        };

        // The overview polyline is not decoded, only the endpoints are kept.
        Ok(TravelEstimate {
            minutes: duration_secs / 60.0,
            distance_km: leg.distance.value / 1000.0,
            waypoints: vec![start, end],
        })
    }
}

// --- Mock ---

/// Offline provider producing distance-derived estimates, for testing and
/// for running without API credentials.
#[derive(Debug)]
pub struct MockProvider {
    base_minutes: f64,
    traffic_multiplier: f64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            base_minutes: 30.0,
            traffic_multiplier: 1.5,
        }
    }
}

#[async_trait]
impl RouteProvider for MockProvider {
    async fn route(
        &self,
        start: LatLong,
        end: LatLong,
        via: &[LatLong],
        traffic: Traffic,
    ) -> Result<TravelEstimate, Error> {
        let lat_diff = end.0 - start.0;
        let lng_diff = end.1 - start.1;
        // one degree is roughly 111 km
        let distance_km = lat_diff.hypot(lng_diff) * 111.0;

        let base_time = self.base_minutes.max(distance_km * 2.0);
        let minutes = match traffic {
            Traffic::Live => base_time * self.traffic_multiplier,
            Traffic::FreeFlow => base_time,
        };

        let mut waypoints = vec![start];
        if via.is_empty() {
            if traffic == Traffic::FreeFlow && distance_km > 1.0 {
                waypoints.extend(synthetic_waypoints(start, end, distance_km));
            }
        } else {
            waypoints.extend_from_slice(via);
        }
        waypoints.push(end);

        Ok(TravelEstimate {
            minutes,
            distance_km,
            waypoints,
        })
    }
}

/// Evenly spaced intermediate points with a small alternating offset so the
/// fake route does not sit exactly on the straight line. Deterministic, so
/// repeated populate runs produce identical baselines.
fn synthetic_waypoints(start: LatLong, end: LatLong, distance_km: f64) -> Vec<LatLong> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = ((distance_km / 2.0) as usize).clamp(1, 3);

    (1..=count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let ratio = i as f64 / (count + 1) as f64;
            let nudge = if i % 2 == 0 { 0.0005 } else { -0.0005 };
            (
                start.0 + ratio * (end.0 - start.0) + nudge,
                start.1 + ratio * (end.1 - start.1) + nudge,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: LatLong = (37.7749, -122.4194);
    const END: LatLong = (37.7831, -122.4031);

    #[test]
    fn test_mapbox_url_with_traffic_and_waypoints() {
        let provider = MapboxProvider::new("pk.test".to_string()).unwrap();
        let url = provider
            .request_url(START, END, &[(37.78, -122.41)], Traffic::Live)
            .unwrap();

        assert!(url.as_str().starts_with(
            "https://api.mapbox.com/directions/v5/mapbox/driving-traffic/\
             -122.4194,37.7749;-122.41,37.78;-122.4031,37.7831?"
        ));
        assert!(url.query_pairs().any(|(k, v)| k == "access_token" && v == "pk.test"));
        assert!(url.query_pairs().any(|(k, v)| k == "geometries" && v == "geojson"));
    }

    #[test]
    fn test_mapbox_url_free_flow_profile() {
        let provider = MapboxProvider::new("pk.test".to_string()).unwrap();
        let url = provider
            .request_url(START, END, &[], Traffic::FreeFlow)
            .unwrap();
        assert!(url.path().starts_with("/directions/v5/mapbox/driving/"));
        assert!(!url.path().contains("driving-traffic"));
    }

    #[test]
    fn test_google_url_params() {
        let provider = GoogleProvider::new("g.test".to_string()).unwrap();
        let url = provider
            .request_url(START, END, &[(37.78, -122.41)], Traffic::Live)
            .unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("origin".into(), "37.7749,-122.4194".into())));
        assert!(pairs.contains(&("destination".into(), "37.7831,-122.4031".into())));
        assert!(pairs.contains(&("waypoints".into(), "37.78,-122.41".into())));
        assert!(pairs.contains(&("departure_time".into(), "now".into())));
    }

    #[test]
    fn test_google_url_free_flow_omits_departure_time() {
        let provider = GoogleProvider::new("g.test".to_string()).unwrap();
        let url = provider.request_url(START, END, &[], Traffic::FreeFlow).unwrap();
        assert!(!url.query_pairs().any(|(k, _)| k == "departure_time"));
        assert!(!url.query_pairs().any(|(k, _)| k == "waypoints"));
    }

    #[tokio::test]
    async fn test_mock_traffic_multiplier() {
        let provider = MockProvider::default();
        let free = provider.route(START, END, &[], Traffic::FreeFlow).await.unwrap();
        let live = provider.route(START, END, &[], Traffic::Live).await.unwrap();
        assert!((live.minutes - free.minutes * 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_mock_optimal_route_has_intermediate_waypoints() {
        let provider = MockProvider::default();
        // ~15 km apart, well over the 1 km cutoff
        let estimate = provider.optimal_route((37.7749, -122.4194), (37.9, -122.4)).await.unwrap();
        assert!(estimate.waypoints.len() > 2);
        assert!(estimate.waypoints.len() <= 5);
        assert_eq!(estimate.waypoints.first(), Some(&(37.7749, -122.4194)));
        assert_eq!(estimate.waypoints.last(), Some(&(37.9, -122.4)));
    }

    #[tokio::test]
    async fn test_mock_optimal_route_is_deterministic() {
        let provider = MockProvider::default();
        let a = provider.optimal_route(START, (37.9, -122.4)).await.unwrap();
        let b = provider.optimal_route(START, (37.9, -122.4)).await.unwrap();
        assert_eq!(a.waypoints, b.waypoints);
    }

    #[tokio::test]
    async fn test_mock_short_route_has_no_intermediates() {
        let provider = MockProvider::default();
        let estimate = provider
            .optimal_route((37.7749, -122.4194), (37.7750, -122.4195))
            .await
            .unwrap();
        assert_eq!(estimate.waypoints.len(), 2);
    }

    #[test]
    fn test_from_config_unsupported_provider() {
        let config = Config {
            provider: Some("osrm".to_string()),
            ..toml::from_str("").unwrap()
        };
        let err = from_config(&config).unwrap_err();
        assert!(err.to_string().contains("unsupported API provider"));
    }

    #[test]
    fn test_from_config_defaults_to_mock() {
        let config: Config = toml::from_str("").unwrap();
        assert!(is_mock(&config));
        assert!(from_config(&config).is_ok());
    }

    #[test]
    fn test_is_mock() {
        let explicit: Config = toml::from_str(r#"provider = "Mock""#).unwrap();
        assert!(is_mock(&explicit));
        let real: Config = toml::from_str(r#"provider = "mapbox""#).unwrap();
        assert!(!is_mock(&real));
    }
}
