use std::sync::Arc;

use route_engine::cache::{CacheConfig, CachedReliability};
use route_engine::domain::{AgencyId, BoundingBox, Clock, Coordinate, Preferences, SystemClock, Timestamp};
use route_engine::graph::{FileSnapshotLoader, SnapshotLoader, SnapshotStore};
use route_engine::planner::{
    CancelFlag, Engine, EngineConfig, NoReliability, PlanRequest, SnapshotFares,
};
use route_engine::realtime::{FeedConfig, HttpOverlayFeed, OverlayStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Parse `"lat,lon"`.
fn coordinate(var: &str) -> Result<Coordinate, BoxError> {
    let raw = std::env::var(var).map_err(|_| format!("{var} is not set"))?;
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("{var} must be \"lat,lon\""))?;
    Ok(Coordinate::new(lat.trim().parse()?, lon.trim().parse()?)?)
}

fn config_from_env() -> Result<EngineConfig, BoxError> {
    let mut config = EngineConfig::default();
    if let Ok(ms) = std::env::var("PLAN_TIMEOUT_MS") {
        config.timeout_ms = ms.parse()?;
    }
    if let Ok(m) = std::env::var("SNAP_RADIUS_M") {
        config.snap_radius_m = m.parse()?;
    }
    if let Ok(secs) = std::env::var("OVERLAY_FRESHNESS_SECS") {
        config.overlay_freshness_secs = secs.parse()?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let origin = coordinate("ORIGIN")?;
    let destination = coordinate("DESTINATION")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let departure = match std::env::var("DEPARTURE") {
        Ok(raw) => Timestamp::parse(&raw)?,
        Err(_) => clock.now(),
    };
    let preferences = match std::env::var("PREFERENCES") {
        Ok(json) => serde_json::from_str(&json)?,
        Err(_) => Preferences::default(),
    };
    let alternatives = match std::env::var("ALTERNATIVES") {
        Ok(n) => n.parse()?,
        Err(_) => 3,
    };

    // Load the tightest snapshot covering both endpoints
    let dir = std::env::var("SNAPSHOT_DIR").unwrap_or_else(|_| "snapshots".to_string());
    let bbox = BoundingBox::new(
        origin.lat().min(destination.lat()),
        origin.lon().min(destination.lon()),
        origin.lat().max(destination.lat()),
        origin.lon().max(destination.lon()),
    );
    let snapshots = SnapshotStore::new();
    let snapshot = FileSnapshotLoader::new(&dir).load_snapshot(bbox).await?;
    snapshots.install(snapshot).await?;

    // Realtime is optional; planning falls back to the timetable without it
    let overlays = OverlayStore::new();
    if let Ok(url) = std::env::var("OVERLAY_URL") {
        let mut feed_config = FeedConfig::new(url);
        if let Ok(key) = std::env::var("OVERLAY_API_KEY") {
            feed_config = feed_config.with_api_key(key);
        }
        let feed = HttpOverlayFeed::new(feed_config)?;
        let agencies = std::env::var("OVERLAY_AGENCIES").unwrap_or_default();
        for agency in agencies.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            match overlays.refresh(&feed, &AgencyId::new(agency)).await {
                Ok(trips) => info!(agency, trips, "loaded overlay"),
                Err(e) => warn!(agency, error = %e, "overlay unavailable"),
            }
        }
    }

    let reliability = CachedReliability::new(NoReliability, &CacheConfig::default());
    let engine = Engine::new(
        snapshots,
        overlays,
        SnapshotFares,
        reliability,
        clock,
        config_from_env()?,
    );

    let request = PlanRequest::new(origin, destination, departure)
        .with_preferences(preferences)
        .with_alternatives(alternatives);
    let outcome = engine.plan_routes(&request, &CancelFlag::new()).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
