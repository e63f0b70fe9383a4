mod scene;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use possync::{
    Authority, LinkConditions, Node3, ObserverList, PeerId, Role, SimulatedLink, SyncConfig,
    SyncId, SyncScheduler, SyncState, Transform3Adapter,
};
use scene::ErrorStats;

type Scheduler = SyncScheduler<Transform3Adapter>;

const OWNED_ENTITY: u32 = 1000;

#[derive(Parser)]
#[command(name = "possync-demo")]
#[command(about = "Syncs moving entities from a server to clients over simulated links")]
struct Args {
    #[arg(short, long, help = "TOML file with [sync] and [link] tables")]
    config: Option<PathBuf>,

    #[arg(short, long, default_value_t = 10.0)]
    seconds: f64,

    #[arg(short = 'n', long, default_value_t = 2)]
    clients: u32,

    #[arg(short, long, default_value_t = 8)]
    entities: u32,

    #[arg(long, default_value_t = 60)]
    frame_rate: u32,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    #[arg(long, help = "Packet loss percentage (0-100)")]
    loss_percent: Option<f32>,

    #[arg(long, help = "Minimum latency in ms")]
    min_latency: Option<u32>,

    #[arg(long, help = "Maximum latency in ms")]
    max_latency: Option<u32>,

    #[arg(long, help = "Jitter in ms")]
    jitter: Option<u32>,

    #[arg(long, help = "Seconds between sync messages")]
    interval: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DemoFile {
    sync: SyncConfig,
    link: LinkConditions,
}

impl DemoFile {
    fn load(args: &Args) -> Result<Self> {
        let mut file = match &args.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
            }
            None => DemoFile::default(),
        };

        if let Some(loss_percent) = args.loss_percent {
            file.link.loss_percent = loss_percent;
        }
        if let Some(min_latency) = args.min_latency {
            file.link.min_latency_ms = min_latency;
        }
        if let Some(max_latency) = args.max_latency {
            file.link.max_latency_ms = max_latency;
        }
        if let Some(jitter) = args.jitter {
            file.link.jitter_ms = jitter;
        }
        if let Some(interval) = args.interval {
            file.sync.sync_interval_secs = interval;
        }
        file.link.max_latency_ms = file.link.max_latency_ms.max(file.link.min_latency_ms);

        file.sync.validate()?;
        Ok(file)
    }
}

struct Client {
    peer: PeerId,
    sync: Scheduler,
    error: ErrorStats,
    relay_error: ErrorStats,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let DemoFile { sync: config, link } = DemoFile::load(&args)?;
    anyhow::ensure!(args.frame_rate > 0, "frame rate must be positive");
    anyhow::ensure!(args.clients > 0, "need at least one client");

    let owner = PeerId(1);
    let owned = SyncId::new(OWNED_ENTITY);

    let mut server = Scheduler::new(Role::Server, config.clone(), Transform3Adapter::default())?;
    for index in 0..args.entities {
        server.register(
            SyncId::new(index + 1),
            Authority::ServerControlled,
            Node3::new(scene::orbit(index, 0.0)),
        )?;
    }
    server.register(owned, Authority::ClientRelayOnOtherPeers { owner }, Node3::default())?;

    let mut clients = Vec::new();
    for peer in (1..=args.clients).map(PeerId) {
        let mut sync = Scheduler::new(Role::Client, config.clone(), Transform3Adapter::default())?;
        for index in 0..args.entities {
            sync.register(SyncId::new(index + 1), Authority::ServerControlled, Node3::default())?;
        }
        let authority = if peer == owner {
            Authority::ClientOwnerControlled
        } else {
            Authority::ClientRelayOnOtherPeers { owner }
        };
        sync.register(owned, authority, Node3::new(scene::patrol(0.0)))?;
        clients.push(Client {
            peer,
            sync,
            error: ErrorStats::default(),
            relay_error: ErrorStats::default(),
        });
    }

    let mut downlink = SimulatedLink::new(link.clone(), args.seed);
    let mut uplink = SimulatedLink::new(link.clone(), args.seed.wrapping_add(1));
    let observers = ObserverList::new(clients.iter().map(|client| client.peer));
    for client in &clients {
        downlink.add_peer(client.peer);
    }

    log::info!(
        "Running {} entities to {} clients for {:.1}s, link {:?}",
        args.entities,
        args.clients,
        args.seconds,
        link
    );

    let frame = 1.0 / args.frame_rate as f64;
    let frames = (args.seconds * args.frame_rate as f64).round() as u64;
    let warm_up = config.interpolation_delay() + 1.0;

    for _ in 0..frames {
        let next = server.now() + frame;
        for index in 0..args.entities {
            if let Some(node) = server.target_mut(SyncId::new(index + 1)) {
                node.local = scene::orbit(index, next);
            }
        }
        server.tick(frame, &observers, &mut downlink)?;

        for client in &mut clients {
            if client.peer == owner {
                if let Some(node) = client.sync.target_mut(owned) {
                    node.local = scene::patrol(next);
                }
                client.sync.tick(frame, &ObserverList::default(), &mut uplink)?;
            }
        }

        downlink.advance(frame);
        uplink.advance(frame);
        for (_, bytes) in uplink.take_ready() {
            server.receive(owner, &bytes)?;
        }
        for (peer, bytes) in downlink.take_ready() {
            if let Some(client) = clients.iter_mut().find(|client| client.peer == peer) {
                client.sync.receive(PeerId::SERVER, &bytes)?;
            }
        }

        for client in &mut clients {
            client.sync.update(frame)?;
            if server.now() < warm_up {
                continue;
            }

            let view_time = client.sync.clock().time();
            for index in 0..args.entities {
                if let Some(node) = client.sync.target(SyncId::new(index + 1)) {
                    let expected = scene::orbit(index, view_time);
                    client.error.add(node.local.position_delta(&expected));
                }
            }
            if client.peer != owner {
                if let Some(node) = client.sync.target(owned) {
                    let expected = scene::patrol(view_time);
                    client.relay_error.add(node.local.position_delta(&expected));
                }
            }
        }
    }

    report(&args, &server, &downlink, &clients);
    Ok(())
}

fn report(args: &Args, server: &Scheduler, downlink: &SimulatedLink, clients: &[Client]) {
    let stats = server.stats();
    log::info!("Server: {stats}");
    log::info!(
        "Bandwidth: {:.0} B/s per client, {:.1} B per message",
        stats.bytes_sent as f64 / args.seconds,
        stats.average_message_size()
    );

    let link = downlink.stats();
    log::info!(
        "Downlink: {} sent, {} dropped, {} delivered, {} in flight",
        link.packets_sent,
        link.packets_dropped,
        link.packets_delivered,
        downlink.in_flight()
    );

    for client in clients {
        let clock = client.sync.clock();
        log::info!(
            "Client {}: position error mean {:.4} max {:.4}, relay error mean {:.4}, \
             time scale {:.3}, clock diff {:.1}ms, {}",
            client.peer,
            client.error.mean(),
            client.error.max(),
            client.relay_error.mean(),
            clock.time_scale(),
            clock.average_diff() * 1000.0,
            client.sync.stats()
        );
    }
}
