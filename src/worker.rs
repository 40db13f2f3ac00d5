use log::{error, info, warn};
use std::path::Path;
use std::time::Duration;
use tokio::{select, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Error;
use crate::monitor::{CongestionReport, RouteMonitor};
use crate::notify::Notifier;
use crate::provider;

/// Runs a single evaluation pass over the selected routes and prints the
/// results.
///
/// Per-route failures are reported and do not stop the remaining routes;
/// the pass as a whole fails if any route did.
pub async fn run_check(config: &Config, route: Option<&str>, verbose: bool) -> Result<(), Error> {
    if verbose && provider::is_mock(config) {
        warn!("Using mock API data");
        warn!("Configure 'provider = \"mapbox\"' or 'provider = \"google\"' for real traffic data");
    }

    let monitor = RouteMonitor::new(config)?;
    let notifier = config.notification.clone().map(Notifier::new);
    let names = selected_routes(config, route)?;

    let mut failed = 0;
    for name in &names {
        let route_config = config.get_route(name)?;
        if verbose {
            println!("Checking route: {}", route_config.name);
            println!("  from: {:?}", route_config.start_latlong);
            println!("  to:   {:?}", route_config.end_latlong);
        }

        match monitor.check_route(route_config).await {
            Ok(report) => {
                print_report(&report, verbose);
                if monitor.should_notify(&report) {
                    notify(notifier.as_ref(), &report).await;
                }
            }
            Err(e) => {
                error!("Error checking {name}: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(Error::ChecksFailed(failed));
    }
    Ok(())
}

/// Fetches the free-flow baseline for one route, updating the in-memory
/// config and optionally writing it back to `path`.
pub async fn run_populate(
    config: &mut Config,
    path: &Path,
    route_name: &str,
    save: bool,
) -> Result<(), Error> {
    if provider::is_mock(config) {
        warn!("Using mock API data, the generated waypoints are synthetic");
        warn!("Configure 'provider = \"mapbox\"' or 'provider = \"google\"' for real routes");
    }

    let monitor = RouteMonitor::new(config)?;
    let route = config.get_route(route_name)?.clone();

    println!("Fetching optimal route for: {}", route.name);
    println!("  from: {:?}", route.start_latlong);
    println!("  to:   {:?}", route.end_latlong);

    let waypoints = monitor.populate_free_flow(&route).await?;
    println!(
        "Found optimal route with {} intermediate waypoint(s)",
        waypoints.len()
    );

    config.get_route_mut(route_name)?.free_flow_route = waypoints.clone();

    if save {
        config.save(path)?;
        println!("Configuration saved to {}", path.display());
    } else {
        println!("Free-flow waypoints: {waypoints:?}");
        println!("Pass --save to write them back to the configuration file");
    }
    Ok(())
}

/// Checks the selected routes on an interval until the token is cancelled.
///
/// No state survives between iterations beyond the loaded config; provider
/// and notification failures are logged and the loop keeps going.
pub async fn run_watch(
    config: &Config,
    route: Option<&str>,
    interval_secs: u64,
    verbose: bool,
    token: CancellationToken,
) -> Result<(), Error> {
    let monitor = RouteMonitor::new(config)?;
    let notifier = config.notification.clone().map(Notifier::new);
    let names = selected_routes(config, route)?;

    info!("Starting route monitoring...");
    info!("Routes: {}", names.join(", "));
    info!("Check interval: {interval_secs} seconds");
    if notifier.is_some() {
        info!("Notification command is set, alerts will be sent");
    } else {
        warn!("No notification command configured, alerts will only be logged");
    }

    loop {
        if token.is_cancelled() {
            info!("Shutdown requested, stopping monitor");
            break;
        }

        for name in &names {
            let route_config = config.get_route(name)?;
            if verbose {
                info!("Checking {}...", route_config.name);
            }

            match monitor.check_route(route_config).await {
                Ok(report) => {
                    log_report(&monitor, &report);
                    if monitor.should_notify(&report) {
                        notify(notifier.as_ref(), &report).await;
                    }
                }
                Err(e) => error!("Error checking {name}: {e}"),
            }
        }

        // Interruptible sleep
        select! {
            () = sleep(Duration::from_secs(interval_secs)) => {},
            () = token.cancelled() => {
                info!("Shutdown requested during sleep");
                break;
            }
        }
    }

    info!("Route monitoring stopped");
    Ok(())
}

/// The routes a command operates on: the named one, or every configured
/// route.
fn selected_routes(config: &Config, route: Option<&str>) -> Result<Vec<String>, Error> {
    match route {
        Some(name) => {
            config.get_route(name)?;
            Ok(vec![name.to_string()])
        }
        None => {
            if config.route.is_empty() {
                return Err(Error::Config("no routes configured".to_string()));
            }
            Ok(config.route.keys().cloned().collect())
        }
    }
}

fn alert_message(report: &CongestionReport) -> String {
    let alternative = report.alternative_minutes.unwrap_or(report.current_minutes);
    format!(
        "Traffic alert: {} is congested! Current: {:.1} min, alternative: {:.1} min",
        report.route_name, report.current_minutes, alternative
    )
}

async fn notify(notifier: Option<&Notifier>, report: &CongestionReport) {
    let Some(notifier) = notifier else {
        return;
    };
    match notifier.send(&alert_message(report)).await {
        Ok(()) => info!("Notification sent"),
        // Notification failures never abort monitoring
        Err(e) => warn!("Failed to send notification: {e}"),
    }
}

fn print_report(report: &CongestionReport, verbose: bool) {
    if report.is_congested {
        println!("Route '{}' is congested", report.route_name);
        println!("  current travel time: {:.1} min", report.current_minutes);
        println!(
            "  free-flow travel time: {:.1} min",
            report.free_flow_minutes
        );
        println!("  congestion ratio: {:.2}", report.ratio);
        match (report.alternative_minutes, report.improvement) {
            (Some(alternative), Some(saved)) if saved > 0.0 => {
                println!(
                    "  faster alternative available: {alternative:.1} min ({:.0}% saved)",
                    saved * 100.0
                );
            }
            _ => println!("  no faster alternative found"),
        }
    } else {
        println!("Route '{}' is clear", report.route_name);
        if verbose {
            println!("  current travel time: {:.1} min", report.current_minutes);
            println!(
                "  free-flow travel time: {:.1} min",
                report.free_flow_minutes
            );
        }
    }
}

fn log_report(monitor: &RouteMonitor, report: &CongestionReport) {
    if monitor.should_notify(report) {
        warn!("{}", alert_message(report));
    } else if report.is_congested {
        warn!(
            "Route '{}' is congested (ratio {:.2}), no faster alternative",
            report.route_name, report.ratio
        );
    } else {
        info!(
            "Route '{}' is clear (ratio {:.2})",
            report.route_name, report.ratio
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_routes(names: &[&str]) -> Config {
        let mut toml = String::new();
        for name in names {
            toml.push_str(&format!(
                r#"
                [route.{name}]
                name = "{name}"
                start_latlong = [37.7749, -122.4194]
                end_latlong = [37.7831, -122.4031]
                "#
            ));
        }
        toml::from_str(&toml).unwrap()
    }

    #[test]
    fn test_selected_routes_defaults_to_all() {
        let config = config_with_routes(&["a", "b"]);
        let names = selected_routes(&config, None).unwrap();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_selected_routes_named() {
        let config = config_with_routes(&["a", "b"]);
        assert_eq!(selected_routes(&config, Some("b")).unwrap(), vec!["b"]);
    }

    #[test]
    fn test_selected_routes_unknown_name() {
        let config = config_with_routes(&["a"]);
        assert!(matches!(
            selected_routes(&config, Some("c")),
            Err(Error::RouteNotFound(_))
        ));
    }

    #[test]
    fn test_selected_routes_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(selected_routes(&config, None).is_err());
    }

    #[test]
    fn test_alert_message_format() {
        let report = CongestionReport {
            route_name: "Commute".to_string(),
            current_minutes: 46.0,
            free_flow_minutes: 30.0,
            ratio: 46.0 / 30.0,
            is_congested: true,
            alternative_minutes: Some(35.0),
            improvement: Some((46.0 - 35.0) / 46.0),
        };
        assert_eq!(
            alert_message(&report),
            "Traffic alert: Commute is congested! Current: 46.0 min, alternative: 35.0 min"
        );
    }
}
