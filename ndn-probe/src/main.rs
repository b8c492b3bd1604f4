//! Command-line front end. All protocol work lives in the library; this file
//! only parses arguments, sets up logging and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ndn_probe::{
    DiscoveryConfig, FaceConfig, Name, NdnProbe, NodeId, PollConfig, ResponseInterpreter,
};
use std::time::Duration;

/// Query sensor nodes and map the topology of a named-data sensor network.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Forwarder address (host[:port], default port 6363).
    #[arg(short, long, default_value = "127.0.0.1")]
    face: String,

    /// Service prefix shared by all sensor names.
    #[arg(short, long, default_value = "/esp")]
    service: String,

    /// Per-request timeout in milliseconds.
    #[arg(short, long, default_value_t = 3000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk the network, excluding visited nodes until it falls silent.
    Discover {
        /// Pause between attempts in milliseconds.
        #[arg(long, default_value_t = 25)]
        delay_ms: u64,
        /// Consecutive timeouts that end the run.
        #[arg(long, default_value_t = 3)]
        max_timeouts: u32,
        /// Name component marking the root coordinator's reply.
        #[arg(long, default_value = "root")]
        root_sentinel: String,
    },
    /// Read one sensor value.
    Read {
        #[arg(short, long)]
        node: u64,
        #[arg(short, long, default_value = "temperature")]
        quantity: String,
    },
    /// Fetch a node's link-quality table.
    LinkQuality {
        #[arg(short, long)]
        node: u64,
    },
    /// Read one sensor value back to back and report latency.
    Poll {
        #[arg(short, long)]
        node: u64,
        #[arg(short, long, default_value = "temperature")]
        quantity: String,
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let service: Name = cli
        .service
        .parse()
        .with_context(|| format!("invalid service prefix '{}'", cli.service))?;
    let face = FaceConfig::for_remote(&cli.face)?;
    let mut probe = NdnProbe::connect(&face, service.clone())
        .with_context(|| format!("cannot open face to {}", face.remote))?
        .with_request_timeout(Duration::from_millis(cli.timeout_ms));

    match cli.command {
        Command::Discover {
            delay_ms,
            max_timeouts,
            root_sentinel,
        } => {
            probe = probe.with_interpreter(ResponseInterpreter::new(root_sentinel));
            let config = DiscoveryConfig {
                inter_attempt_delay: Duration::from_millis(delay_ms),
                max_consecutive_timeouts: max_timeouts,
                ..probe.discovery_config()
            };
            let result = probe.discover(&config)?;
            println!("Visited nodes: {}", result.visited.len());
            for id in &result.visited {
                println!("  {}", id);
            }
            println!("Found the following paths:");
            for path in &result.found_paths {
                println!("  {}", path);
            }
            for rejected in &result.rejected {
                eprintln!("rejected reply: {}", rejected);
            }
        }
        Command::Read { node, quantity } => {
            let value = probe.read_sensor(NodeId(node), &quantity)?;
            println!("{}", value);
        }
        Command::LinkQuality { node } => {
            for entry in probe.link_quality(NodeId(node))? {
                println!("{} {:.3}", entry.neighbor, entry.quality);
            }
        }
        Command::Poll {
            node,
            quantity,
            seconds,
        } => {
            let name = ndn_probe::name::sensor_data_name(&service, NodeId(node), &quantity);
            let config = PollConfig {
                request_timeout: Duration::from_millis(cli.timeout_ms),
                ..PollConfig::for_duration(Duration::from_secs(seconds))
            };
            let report = probe.poll(&name, &config, |s| {
                eprint!(
                    "\r{} request(s), {} timeout(s), last {} in {:?}   ",
                    s.attempts, s.timeouts, s.last_value, s.last_latency
                );
            })?;
            eprintln!();
            println!(
                "{} request(s) in {:?}: avg latency {:?}, {:.1} req/s, last value {}",
                report.count,
                report.elapsed,
                report.avg_latency,
                report.throughput(),
                report.last_value
            );
        }
    }

    let m = probe.metrics();
    log::info!(
        "{} request(s), {} repl(ies), {} timeout(s), {} malformed",
        m.requests,
        m.replies,
        m.timeouts,
        m.malformed
    );
    Ok(())
}
