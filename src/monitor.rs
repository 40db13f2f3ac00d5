use log::debug;

use crate::config::{Config, LatLong, RouteConfig};
use crate::error::Error;
use crate::provider::{self, RouteProvider, Traffic};

/// Outcome of a single congestion check for one route.
#[derive(Debug, Clone)]
pub struct CongestionReport {
    pub route_name: String,
    pub current_minutes: f64,
    pub free_flow_minutes: f64,
    pub ratio: f64,
    pub is_congested: bool,
    /// Fastest alternative the provider offered, if one was queried.
    pub alternative_minutes: Option<f64>,
    /// Fraction of the current travel time saved by the alternative.
    pub improvement: Option<f64>,
}

impl CongestionReport {
    /// A notification is warranted only for a congested route with an
    /// alternative that beats the current time by more than
    /// `min_improvement`.
    pub fn should_notify(&self, min_improvement: f64) -> bool {
        self.is_congested && self.improvement.is_some_and(|i| i > min_improvement)
    }
}

/// Congestion is strict: a ratio exactly at the threshold does not count.
pub fn evaluate(current: f64, free_flow: f64, threshold: f64) -> (f64, bool) {
    let ratio = if free_flow > 0.0 {
        current / free_flow
    } else {
        1.0
    };
    (ratio, ratio > threshold)
}

pub fn improvement(current: f64, alternative: f64) -> f64 {
    (current - alternative) / current
}

pub struct RouteMonitor {
    provider: Box<dyn RouteProvider>,
    min_improvement: f64,
}

impl RouteMonitor {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Ok(Self {
            provider: provider::from_config(config)?,
            min_improvement: config.min_improvement.unwrap_or(0.0),
        })
    }

    pub fn with_provider(provider: Box<dyn RouteProvider>, min_improvement: f64) -> Self {
        Self {
            provider,
            min_improvement,
        }
    }

    pub fn min_improvement(&self) -> f64 {
        self.min_improvement
    }

    pub fn should_notify(&self, report: &CongestionReport) -> bool {
        report.should_notify(self.min_improvement)
    }

    /// Checks one route: current vs free-flow travel time along the
    /// populated baseline, then an unconstrained re-query for an
    /// alternative when the route turns out congested.
    pub async fn check_route(&self, route: &RouteConfig) -> Result<CongestionReport, Error> {
        if route.free_flow_route.is_empty() {
            return Err(Error::MissingFreeFlow(route.name.clone()));
        }

        let current = self
            .provider
            .route(
                route.start_latlong,
                route.end_latlong,
                &route.free_flow_route,
                Traffic::Live,
            )
            .await?;
        let free_flow = self
            .provider
            .route(
                route.start_latlong,
                route.end_latlong,
                &route.free_flow_route,
                Traffic::FreeFlow,
            )
            .await?;

        let (ratio, is_congested) = evaluate(
            current.minutes,
            free_flow.minutes,
            route.congestion_threshold,
        );

        let mut alternative_minutes = None;
        if is_congested {
            // No waypoints: let the provider pick its own best path. The
            // first returned route is the provider's preferred one, which
            // makes ties deterministic.
            match self
                .provider
                .route(route.start_latlong, route.end_latlong, &[], Traffic::Live)
                .await
            {
                Ok(alternative) => alternative_minutes = Some(alternative.minutes),
                Err(e) => {
                    debug!("alternative route lookup failed for {}: {e}", route.name);
                }
            }
        }

        Ok(CongestionReport {
            route_name: route.name.clone(),
            current_minutes: current.minutes,
            free_flow_minutes: free_flow.minutes,
            ratio,
            is_congested,
            alternative_minutes,
            improvement: alternative_minutes.map(|alt| improvement(current.minutes, alt)),
        })
    }

    /// Fetches the optimal route and returns its intermediate waypoints,
    /// endpoints stripped.
    pub async fn populate_free_flow(&self, route: &RouteConfig) -> Result<Vec<LatLong>, Error> {
        let estimate = self
            .provider
            .optimal_route(route.start_latlong, route.end_latlong)
            .await?;

        let mut waypoints = estimate.waypoints;
        if waypoints.len() > 2 {
            waypoints.remove(0);
            waypoints.pop();
            Ok(waypoints)
        } else {
            Ok(Vec::new())
        }
    }
}
