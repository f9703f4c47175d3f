use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use skycast_core::{Config, PrefsStore};
use skycast_weather::{
    current_key, CacheStore, FetchOrchestrator, IpLocator, LocationResolver, RefreshHandle,
    RefreshScheduler, Subject, WeatherClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    skycast_core::init()?;

    let (config, validation) = Config::load_validated()?;
    for warning in &validation.warnings {
        tracing::warn!("config: {warning}");
    }

    let cache = Arc::new(CacheStore::with_ttl(Duration::from_secs(
        config.weather.cache_ttl_secs,
    )));
    let client = Arc::new(WeatherClient::new(&config.weather.api_key, cache));
    let orchestrator = Arc::new(FetchOrchestrator::new(client));
    let scheduler = RefreshScheduler::new();
    let store = PrefsStore::new(&config.config_dir);

    let unit = config.weather.temperature_unit;
    let interval = Duration::from_secs(config.weather.refresh_secs);

    // One subject per favorite plus the resolved location, each on its own
    // independent fetch/refresh cycle.
    let mut subjects: Vec<Subject> = store
        .load_favorites()
        .into_iter()
        .map(|city| Subject::City(city.name))
        .collect();

    let resolver = LocationResolver::without_device(IpLocator::new(), Arc::clone(&orchestrator));
    match resolver.resolve().await {
        Ok(coords) => subjects.push(Subject::from(coords)),
        Err(e) => tracing::warn!("location resolution failed: {}", e.user_message()),
    }

    let mut handles: Vec<RefreshHandle> = Vec::new();
    for subject in subjects {
        match orchestrator.fetch_current_if_stale(&subject).await {
            Ok(Some(snapshot)) => tracing::info!(
                "{}: {} ({})",
                snapshot.city,
                unit.format(snapshot.temperature),
                snapshot.condition_description
            ),
            Ok(None) => {}
            Err(e) => tracing::warn!("{subject}: {}", e.user_message()),
        }

        let key = current_key(&subject);
        let fetch_orch = Arc::clone(&orchestrator);
        let handle = scheduler.attach(
            &key,
            interval,
            Arc::new(move || {
                let orch = Arc::clone(&fetch_orch);
                let subject = subject.clone();
                Box::pin(async move {
                    if let Err(e) = orch.fetch_current(&subject).await {
                        tracing::warn!("refresh of {subject} failed: {}", e.user_message());
                    }
                })
            }),
        );
        handles.push(handle);
    }

    tracing::info!(timers = scheduler.active_timers(), "refresh cycles running, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    for handle in &handles {
        handle.detach();
    }
    tracing::info!("Skycast stopped");
    Ok(())
}
