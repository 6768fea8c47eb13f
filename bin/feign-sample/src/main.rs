use anyhow::{bail, Context, Result};
use feign_client::{Feign, FeignConfig};
use feign_core::StaticDiscovery;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::init as tracing_init;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut args = std::env::args().skip(1);
    let (Some(app), Some(path)) = (args.next(), args.next()) else {
        bail!("usage: feign-sample <APP> <PATH>");
    };

    let config = FeignConfig::from_env();
    debug!("Loaded configuration: {:?}", config);

    let raw = std::env::var("FEIGN_APP_URLS")
        .context("FEIGN_APP_URLS must list app urls as APP=url1,url2;APP2=url3")?;

    let discovery = Arc::new(StaticDiscovery::new());
    for (name, urls) in parse_app_urls(&raw) {
        info!("Registering {} urls for app {}", urls.len(), name);
        discovery.set_app(&name, urls).await;
    }

    let feign = Feign::builder()
        .config(config)
        .discovery_client(discovery)
        .build();

    let result = feign.app(app.as_str()).request().get(&path).await;
    feign.shutdown().await;

    let response = result.with_context(|| format!("GET {} on {}", path, app))?;
    info!(
        "{} {} -> {} ({} bytes)",
        app,
        path,
        response.status(),
        response.body().len()
    );

    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(response.body()) {
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if !response.body().is_empty() {
        println!("{}", response.text());
    }

    Ok(())
}

/// Parse `APP=url1,url2;APP2=url3`
fn parse_app_urls(raw: &str) -> Vec<(String, Vec<String>)> {
    raw.split(';')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((name, urls)) if !name.trim().is_empty() => Some((
                name.trim().to_string(),
                urls.split(',')
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            _ => {
                warn!("Ignoring malformed app entry: {:?}", entry);
                None
            }
        })
        .collect()
}
