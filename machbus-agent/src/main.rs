//! Demo agent: reports synthetic telemetry for one machine so a server
//! can be exercised without real hardware.

use std::time::Duration;

use anyhow::Result;
use machbus_entity::codec::ContentType;
use machbus_entity::schema::units;
use machbus_entity::{
    Machine, MachineData, MachineSchema, MachineValueSpec, MachineValueType, Visualization, VisualizationLevel,
};
use tokio::time::interval;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use machbus_agent::{config, DataBatch, RestClient};

fn demo_machine() -> Machine {
    Machine::new("machbus", "demo-press", "0001").with_uuid("a3f1-demo")
}

fn demo_schema() -> MachineSchema {
    let mut schema = MachineSchema::new(demo_machine(), "station-1", "site-1");
    schema.add_field(
        MachineValueSpec::new("temperature", MachineValueType::Double, units::CELSIUS)
            .with_visualization(Visualization::PercentBar, VisualizationLevel::Overview),
    );
    schema.add_field(
        MachineValueSpec::new("running", MachineValueType::Bool, units::NONE)
            .with_visualization(Visualization::OnOffLight, VisualizationLevel::Overview),
    );
    schema.add_field(MachineValueSpec::new("cycles", MachineValueType::Long, units::NONE));
    schema.add_field(MachineValueSpec::new("comment", MachineValueType::Text, units::NONE));
    schema
}

fn demo_snapshot(tick: i64) -> MachineData {
    let mut data = MachineData::new(demo_machine());
    // a slow triangle wave, so dashboards show movement
    let phase = (tick % 20 - 10).abs() as f64;
    data.put("temperature", 20.0 + 4.5 * phase);
    data.put("running", tick % 7 != 0);
    data.put("cycles", tick);
    data.put("comment", if tick % 7 == 0 { "tool change" } else { "production" });
    data
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = config::load_config().await;
    let content_type = ContentType::from_mime(&cfg.content_type).unwrap_or(ContentType::Json);
    let client = RestClient::new(&cfg.server_url)
        .with_content_type(content_type)
        .with_settle_delay(Duration::from_millis(cfg.settle_delay_ms));

    let heart_beat_interval = match client.server_info().await {
        Ok(info) => {
            info!(server = %info.name, "connected");
            info.heart_beat_interval
        }
        Err(e) => {
            warn!("server info unavailable ({e}), using configured heartbeat interval");
            cfg.heart_beat_interval_ms
        }
    };

    let machine = demo_machine();
    let schema = demo_schema();
    info!(%machine, url = %cfg.server_url, "reporting every {}ms", cfg.report_interval_ms);

    let mut report_ticker = interval(Duration::from_millis(cfg.report_interval_ms));
    let mut heartbeat_ticker = interval(Duration::from_millis(heart_beat_interval));
    let mut tick: i64 = 0;

    loop {
        tokio::select! {
            _ = report_ticker.tick() => {
                tick += 1;
                let mut batch = DataBatch::new();
                if let Err(violation) = batch.push(demo_snapshot(tick), schema.clone()) {
                    error!("snapshot does not match own schema: {violation}");
                    continue;
                }
                match client.send_data(&batch.data_message(), &batch.schema_message()).await {
                    Ok(()) => info!(tick, "data accepted"),
                    Err(e) => error!("report failed: {e}"),
                }
            }
            _ = heartbeat_ticker.tick() => {
                if let Err(e) = client.heartbeat(&machine).await {
                    warn!("heartbeat failed: {e}");
                }
            }
        }
    }
}
