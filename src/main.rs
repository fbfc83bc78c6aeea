use std::time::Duration;

use anyhow::{Context, anyhow};
use kafka_admin::{Client, ClientConfig, ElectLeadersRequest, RequestContext};
use log::info;

const USAGE: &str = "usage: elect-leaders <topic> <partition>...";

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let mut config = match std::env::var("KAFKA_CLIENT_CONFIG") {
        Ok(path) => ClientConfig::load(path)?,
        Err(_) => ClientConfig::default(),
    };
    if let Ok(broker) = std::env::var("KAFKA_BROKER") {
        config.broker = Some(broker);
    }
    if config.broker.is_none() {
        config.broker = Some("127.0.0.1:9092".to_string());
    }

    let mut args = std::env::args().skip(1);
    let topic = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let partitions = args
        .map(|p| p.parse::<i64>().with_context(|| format!("invalid partition {:?}", p)))
        .collect::<Result<Vec<_>, _>>()?;
    if partitions.is_empty() {
        return Err(anyhow!(USAGE));
    }

    let timeout = Duration::from_secs(30);
    let client = Client::new(config);
    let ctx = RequestContext::new().with_timeout(timeout + Duration::from_secs(5));
    let request = ElectLeadersRequest::new(topic.clone(), partitions).with_timeout(timeout);

    info!("Running leader elections for topic {}", topic);
    let response = client.elect_leaders(&ctx, &request).await?;

    println!("error_code={}", response.error_code);
    for result in &response.partition_results {
        if result.is_ok() {
            println!("{}/{}: ok", topic, result.partition);
        } else {
            println!(
                "{}/{}: error_code={} {}",
                topic, result.partition, result.error_code, result.error_message
            );
        }
    }

    if !response.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}
