use glam::{Quat, Vec3};
use possync::{
    Authority, LinkConditions, Node3, ObserverList, PeerId, Pose3, Role, SimulatedLink,
    SyncConfig, SyncId, SyncScheduler, SyncState, Transform3Adapter,
};

const FRAME: f64 = 1.0 / 60.0;
const RADIUS: f32 = 3.0;
const ANGULAR_SPEED: f64 = 0.5;

type Scheduler = SyncScheduler<Transform3Adapter>;

fn scheduler(role: Role) -> Scheduler {
    SyncScheduler::new(role, SyncConfig::default(), Transform3Adapter::default()).unwrap()
}

/// Where entity `index` is at server time `time`: circling the origin, facing along the circle.
fn orbit(index: u32, time: f64) -> Pose3 {
    let angle = ANGULAR_SPEED * time + index as f64;
    let position = Vec3::new(
        RADIUS * angle.cos() as f32,
        index as f32,
        RADIUS * angle.sin() as f32,
    );
    Pose3::new(position, Quat::from_rotation_y(-angle as f32))
}

#[test]
fn test_clients_follow_server_over_lossy_link() {
    let _ = env_logger::builder().is_test(true).try_init();
    const ENTITIES: u32 = 4;
    let clients = [PeerId(1), PeerId(2)];

    let mut server = scheduler(Role::Server);
    let mut receivers: Vec<Scheduler> = clients.iter().map(|_| scheduler(Role::Client)).collect();
    for index in 0..ENTITIES {
        let id = SyncId::new(index + 1);
        server
            .register(id, Authority::ServerControlled, Node3::new(orbit(index, 0.0)))
            .unwrap();
        for client in &mut receivers {
            client
                .register(id, Authority::ServerControlled, Node3::default())
                .unwrap();
        }
    }

    let conditions = LinkConditions {
        loss_percent: 5.0,
        min_latency_ms: 50,
        max_latency_ms: 60,
        jitter_ms: 10,
    };
    let mut link = SimulatedLink::new(conditions, 42);
    for peer in clients {
        link.add_peer(peer);
    }
    let observers = ObserverList::new(clients);

    let mut position_errors = Vec::new();
    let mut rotation_errors = Vec::new();
    for frame in 0..1200 {
        let next = server.now() + FRAME;
        for index in 0..ENTITIES {
            server.target_mut(SyncId::new(index + 1)).unwrap().local = orbit(index, next);
        }
        server.tick(FRAME, &observers, &mut link).unwrap();

        link.advance(FRAME);
        for (peer, bytes) in link.take_ready() {
            let client = &mut receivers[peer.0 as usize - 1];
            client.receive(PeerId::SERVER, &bytes).unwrap();
        }

        for client in &mut receivers {
            client.update(FRAME).unwrap();
            if frame < 180 {
                continue;
            }
            let view_time = client.clock().time();
            for index in 0..ENTITIES {
                let expected = orbit(index, view_time);
                let actual = client.target(SyncId::new(index + 1)).unwrap().local;
                position_errors.push(actual.position.distance(expected.position));
                rotation_errors.push(actual.rotation_delta(&expected));
            }
        }
    }

    let mean = |errors: &[f32]| errors.iter().sum::<f32>() / errors.len() as f32;
    let max = |errors: &[f32]| errors.iter().copied().fold(0.0f32, f32::max);
    assert!(mean(&position_errors) < 0.02, "mean error {}", mean(&position_errors));
    assert!(max(&position_errors) < 0.2, "max error {}", max(&position_errors));
    assert!(mean(&rotation_errors) < 1.0, "mean rotation error {}", mean(&rotation_errors));

    let stats = server.stats();
    assert!((398..=401).contains(&stats.messages_sent), "{stats}");
    assert_eq!(stats.records_sent, stats.messages_sent * ENTITIES as u64);
    assert!(stats.average_message_size() < 100.0, "{stats}");
    assert!(link.stats().packets_dropped > 0);

    for client in &receivers {
        assert_eq!(client.stats().clock_resets, 1);
        assert!(client.stats().records_received > 0);
        for entity in client.entities() {
            assert!(entity.buffer().len() <= 10, "{}", entity.buffer());
        }
    }
}

#[test]
fn test_owner_motion_is_relayed_to_other_clients() {
    let owner = PeerId(1);
    let watcher = PeerId(2);
    let id = SyncId::new(7);

    let mut server = scheduler(Role::Server);
    server
        .register(id, Authority::ClientRelayOnOtherPeers { owner }, Node3::default())
        .unwrap();

    let mut owning_client = scheduler(Role::Client);
    owning_client
        .register(id, Authority::ClientOwnerControlled, Node3::default())
        .unwrap();

    let mut watching_client = scheduler(Role::Client);
    watching_client
        .register(id, Authority::ClientRelayOnOtherPeers { owner }, Node3::default())
        .unwrap();

    let conditions = LinkConditions {
        min_latency_ms: 30,
        max_latency_ms: 30,
        ..LinkConditions::default()
    };
    let mut downlink = SimulatedLink::new(conditions.clone(), 1);
    downlink.add_peer(owner);
    downlink.add_peer(watcher);
    let mut uplink = SimulatedLink::new(conditions, 2);
    let observers = ObserverList::new([owner, watcher]);
    let nobody = ObserverList::default();

    for _ in 0..300 {
        let next = owning_client.now() + FRAME;
        owning_client.target_mut(id).unwrap().local.position.x = next as f32;
        owning_client.tick(FRAME, &nobody, &mut uplink).unwrap();
        uplink.advance(FRAME);
        for (_, bytes) in uplink.take_ready() {
            server.receive(owner, &bytes).unwrap();
        }

        server.tick(FRAME, &observers, &mut downlink).unwrap();
        downlink.advance(FRAME);
        for (peer, bytes) in downlink.take_ready() {
            if peer == owner {
                owning_client.receive(PeerId::SERVER, &bytes).unwrap();
            } else {
                watching_client.receive(PeerId::SERVER, &bytes).unwrap();
            }
        }

        owning_client.update(FRAME).unwrap();
        watching_client.update(FRAME).unwrap();
    }

    let owner_x = owning_client.target(id).unwrap().local.position.x;
    let server_x = server.target(id).unwrap().local.position.x;
    let watcher_x = watching_client.target(id).unwrap().local.position.x;

    assert!((owner_x - 5.0).abs() < 1e-3, "owner at {owner_x}");
    assert!(server_x <= owner_x + 0.01 && server_x > owner_x - 0.2, "server at {server_x}");
    assert!(watcher_x <= server_x + 0.01 && watcher_x > owner_x - 0.6, "watcher at {watcher_x}");
    assert!(owning_client.stats().records_sent > 50);
    assert!(server.stats().records_received > 50);
}

#[test]
fn test_server_rejects_state_from_non_owner() {
    let mut server = scheduler(Role::Server);
    let id = SyncId::new(3);
    server
        .register(
            id,
            Authority::ClientRelayOnOtherPeers { owner: PeerId(1) },
            Node3::default(),
        )
        .unwrap();

    let mut intruder = scheduler(Role::Client);
    intruder
        .register(id, Authority::ClientOwnerControlled, Node3::default())
        .unwrap();
    intruder.target_mut(id).unwrap().local.position = Vec3::splat(9.0);

    let mut uplink = SimulatedLink::perfect();
    intruder.tick(FRAME, &ObserverList::default(), &mut uplink).unwrap();
    for (_, bytes) in uplink.take_ready() {
        server.receive(PeerId(2), &bytes).unwrap();
    }

    assert_eq!(server.target(id).unwrap().local.position, Vec3::ZERO);
    assert_eq!(server.stats().records_received, 0);
}
