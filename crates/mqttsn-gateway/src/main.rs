// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT-SN Gateway CLI
//!
//! Bridges MQTT-SN clients on UDP to an MQTT broker.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: UDP 0.0.0.0:1884, broker localhost:1883
//! mqttsn-gateway
//!
//! # Explicit broker and port
//! mqttsn-gateway --broker-host 192.168.1.10 --broker-port 1883 --udp-port 1884
//!
//! # Using configuration file
//! mqttsn-gateway --config gateway.toml
//!
//! # Generate / check a configuration file
//! mqttsn-gateway gen-config --output gateway.toml
//! mqttsn-gateway validate --config gateway.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mqttsn_gateway::{
    BrokerConfig, ConfigError, FanoutPolicy, Gateway, GatewayConfig, GatewayStatsSnapshot,
    MqttBridge,
};
use tracing_subscriber::EnvFilter;

/// MQTT-SN to MQTT gateway
#[derive(Parser, Debug)]
#[command(name = "mqttsn-gateway")]
#[command(about = "MQTT-SN Gateway - bridges UDP MQTT-SN clients to an MQTT broker")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "MQTTSN_CONFIG")]
    config: Option<PathBuf>,

    /// UDP listen port
    #[arg(short, long, env = "MQTTSN_UDP_PORT")]
    udp_port: Option<u16>,

    /// MQTT broker host
    #[arg(long, env = "MQTTSN_BROKER_HOST")]
    broker_host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "MQTTSN_BROKER_PORT")]
    broker_port: Option<u16>,

    /// Broker -> client delivery (all, subscribers)
    #[arg(long)]
    fanout: Option<String>,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "gateway.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Handle subcommands
    if let Some(cmd) = args.command {
        init_logging(args.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;
    init_logging(&config.log_level);

    println!("MQTT-SN Gateway v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!();
    println!("UDP:    {}", config.listen_addr());
    println!("Broker: {}:{}", config.broker.host, config.broker.port);
    println!("Filter: {}", config.broker.topic_filter);
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let (bridge, event_loop) = MqttBridge::new(&config.broker);
    let stats_interval = config.stats_interval_secs;
    let gateway = Arc::new(Gateway::new(config, Arc::new(bridge))?);
    let transport = gateway.bind()?;
    let handle = gateway.handle();

    let broker_task = gateway.spawn_broker(event_loop, Arc::clone(&transport));
    let server = Arc::clone(&gateway);
    let server_task = tokio::spawn(async move { server.serve(transport).await });

    // Stats reporting task
    if stats_interval > 0 {
        let stats = Arc::clone(gateway.stats());
        let stats_handle = handle.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                if !stats_handle.is_running() {
                    break;
                }
                print_stats(&stats.snapshot());
            }
        });
    }

    // Wait for Ctrl+C
    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    handle.stop();

    server_task.await??;
    let _ = broker_task.await;

    println!("\nFinal Statistics:");
    print_stats(&gateway.stats().snapshot());
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn parse_fanout(s: &str) -> Result<FanoutPolicy, ConfigError> {
    match s {
        "all" => Ok(FanoutPolicy::All),
        "subscribers" => Ok(FanoutPolicy::Subscribers),
        other => Err(ConfigError::Invalid(format!(
            "Unknown fanout policy: {} (expected all or subscribers)",
            other
        ))),
    }
}

/// File (if any) first, then command line / environment overrides.
fn build_config(args: &Args) -> Result<GatewayConfig, ConfigError> {
    let mut config = match args.config {
        Some(ref path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(port) = args.udp_port {
        config.udp_port = port;
    }
    if let Some(ref host) = args.broker_host {
        config.broker.host = host.clone();
    }
    if let Some(port) = args.broker_port {
        config.broker.port = port;
    }
    if let Some(ref fanout) = args.fanout {
        config.fanout = parse_fanout(fanout)?;
    }
    if let Some(interval) = args.stats_interval {
        config.stats_interval_secs = interval;
    }
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig {
        known_topics: vec![
            "pico/data".into(),
            "pico/chunks".into(),
            "pico/block".into(),
            "pico/test".into(),
        ],
        broker: BrokerConfig {
            topic_filter: "pico/#".into(),
            ..Default::default()
        },
        ..Default::default()
    };

    let toml_str = toml::to_string_pretty(&config)?;

    // Add comments
    let content = format!(
        r#"# MQTT-SN Gateway Configuration
# Generated by mqttsn-gateway gen-config
#
# fanout = "all" sends broker messages to every connected client;
# "subscribers" only to clients with a matching SUBSCRIBE.

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match GatewayConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("UDP:     {}", config.listen_addr());
            println!("Broker:  {}:{}", config.broker.host, config.broker.port);
            println!("Filter:  {}", config.broker.topic_filter);
            println!("Workers: {} (queue {})", config.workers, config.queue_depth);
            println!("Fan-out: {:?}", config.fanout);
            if !config.known_topics.is_empty() {
                println!("Known topics:");
                for topic in &config.known_topics {
                    println!("  - {}", topic);
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_stats(stats: &GatewayStatsSnapshot) {
    println!("--- Gateway Statistics ---");
    println!(
        "  UDP in: {} datagrams, {} malformed, {} queue drops",
        stats.datagrams_received, stats.malformed, stats.queue_drops
    );
    println!(
        "  To broker: {} publishes ({:.1}/s), {}, {} dropped, {} acks",
        stats.publishes_forwarded,
        stats.publishes_per_second(),
        format_bytes(stats.bytes_forwarded),
        stats.publishes_dropped,
        stats.acks_sent
    );
    println!(
        "  From broker: {} messages, {} sent, {} failed",
        stats.broker_messages, stats.fanout_sent, stats.fanout_failed
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
