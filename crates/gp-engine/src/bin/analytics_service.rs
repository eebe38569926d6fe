//! Standalone GridPulse analytics service with an in-memory demo fleet and
//! a minimal health endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gp_data::{
    InMemoryAlertSink, InMemoryAssetSource, InMemoryBaselineSource, InMemoryConfigStore,
    InMemoryDataSource, InMemoryValuationModel, InMemoryVppRegistry,
};
use gp_engine::{AnalyticsEngine, EngineCollaborators, EngineEvent};
use gp_types::{BaselineState, PortfolioAsset, PricePoint, RiskType, SignalPoint, VppId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut engine = AnalyticsEngine::with_stored_config(demo_collaborators()).await?;

    // Log everything the engine publishes.
    let events = engine.subscribe();
    tokio::task::spawn_blocking(move || {
        for event in events.iter() {
            match event {
                EngineEvent::RiskAlert(alert) => {
                    info!(vpp = %alert.vpp_id, priority = ?alert.priority, "{}", alert.message)
                }
                other => info!(?other, "engine event"),
            }
        }
    });

    engine.start().await;
    engine.evaluate_now().await;

    let addr = std::env::var("GRIDPULSE_ENGINE_ADDR").unwrap_or_else(|_| "0.0.0.0:8085".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!("GridPulse engine service listening on {addr}");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (mut socket, _) = accepted?;
                tokio::spawn(async move {
                    let mut buffer = [0u8; 1024];
                    let _ = socket.read(&mut buffer).await;

                    let body = r#"{"status":"ok","service":"gridpulse-engine"}"#;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                        body.len(),
                        body
                    );

                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
            _ = tokio::signal::ctrl_c() => {
                engine.stop("shutdown signal").await;
                break;
            }
        }
    }

    Ok(())
}

/// A small demo fleet: two VPPs with generated price history, category
/// signals, assets and baseline state.
fn demo_collaborators() -> EngineCollaborators {
    let data = Arc::new(InMemoryDataSource::new());
    let assets = Arc::new(InMemoryAssetSource::new());
    let baselines = Arc::new(InMemoryBaselineSource::new());
    let registry = Arc::new(InMemoryVppRegistry::new(vec![]));

    for (name, drift) in [("vpp-north", 0.015), ("vpp-south", 0.03)] {
        let vpp = VppId::from(name);
        registry.add(vpp.clone());

        data.set_price_series(vpp.clone(), demo_prices(60, drift));
        for (risk_type, value) in [
            (RiskType::Credit, 0.45),
            (RiskType::Operational, 0.2),
            (RiskType::Liquidity, 1.2),
            (RiskType::Regulatory, 0.9),
            (RiskType::Weather, 0.35),
            (RiskType::Technical, 0.15),
        ] {
            let series = (0..14)
                .map(|i| SignalPoint {
                    value,
                    timestamp: Utc::now() - Duration::days(i),
                })
                .collect();
            data.set_signal_series(vpp.clone(), risk_type, series);
        }

        assets.set_assets(
            vpp.clone(),
            vec![
                PortfolioAsset::new("solar-array", 0.08),
                PortfolioAsset::new("battery-bank", 0.05),
                PortfolioAsset::new("demand-response", 0.06),
            ],
        );
        baselines.set_baseline(
            vpp,
            BaselineState {
                revenue: Decimal::from(2_400_000),
                profit: Decimal::from(310_000),
                risk_score: 0.3,
                liquidity: Decimal::from(650_000),
            },
        );
    }

    let model = Arc::new(InMemoryValuationModel::new(|_, sample, metrics| {
        let mut out = HashMap::new();
        for metric in metrics {
            // Toy valuation: first parameter dominates, the rest add noise.
            let value = sample
                .iter()
                .enumerate()
                .map(|(i, v)| v / (i as f64 + 1.0))
                .sum::<f64>();
            out.insert(metric.clone(), value);
        }
        Ok(out)
    }));

    EngineCollaborators {
        data,
        assets,
        baselines,
        model,
        alerts: Arc::new(InMemoryAlertSink::new()),
        config_store: Arc::new(InMemoryConfigStore::new()),
        registry,
    }
}

/// Newest-first price series declining with the given average step.
fn demo_prices(len: usize, drift: f64) -> Vec<PricePoint> {
    let now = Utc::now();
    let mut price = 100.0;
    let mut oldest_first = vec![price];
    for i in 0..len - 1 {
        // Alternate mild and sharp moves around the drift.
        let step = drift * (1.0 + 0.8 * ((i % 5) as f64 - 2.0) / 2.0);
        price *= 1.0 - step;
        oldest_first.push(price);
    }
    oldest_first
        .into_iter()
        .enumerate()
        .map(|(i, p)| PricePoint {
            price: Decimal::from_f64_retain(p).unwrap_or_default(),
            timestamp: now - Duration::days((len - 1 - i) as i64),
        })
        .rev()
        .collect()
}
