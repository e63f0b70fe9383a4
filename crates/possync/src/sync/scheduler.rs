use super::batch::OutgoingBatch;
use super::{
    Authority, EntityRegistry, ObserverSet, PeerId, SyncError, SyncId, SyncStats, TrackedEntity,
    Transport,
};
use crate::codec::{BitReader, BitWriter, StateCodec};
use crate::config::{BatchingPolicy, ConfigError, OrderingPolicy, PrunePolicy, SyncConfig};
use crate::snapshot::{SyncFlags, TransformAdapter};
use crate::time::{ClockError, ClockSynchronizer, IntervalTimer, SampleOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// Ties the codec, clock and per-entity buffers together for one peer.
pub struct SyncScheduler<A: TransformAdapter> {
    role: Role,
    config: SyncConfig,
    codec: StateCodec,
    adapter: A,
    registry: EntityRegistry<A>,
    clock: ClockSynchronizer,
    timer: IntervalTimer,
    now: f64,
    min_record_bits: usize,
    stats: SyncStats,
}

impl<A: TransformAdapter> SyncScheduler<A> {
    pub fn new(role: Role, config: SyncConfig, adapter: A) -> Result<Self, SyncError> {
        config.validate()?;
        let codec = StateCodec::new(&config);

        let required_bits = codec.max_time_bits() + codec.max_record_bits::<A::State>();
        if config.max_packet_size * 8 < required_bits {
            return Err(ConfigError::PacketTooSmall {
                max_packet_size: config.max_packet_size,
                required: required_bits.div_ceil(8),
            }
            .into());
        }

        Ok(Self {
            role,
            min_record_bits: codec.min_record_bits::<A::State>(),
            clock: ClockSynchronizer::from_config(&config),
            timer: IntervalTimer::new(config.sync_interval_secs, config.interval_timing),
            codec,
            config,
            adapter,
            registry: EntityRegistry::new(),
            now: 0.0,
            stats: SyncStats::default(),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn codec(&self) -> &StateCodec {
        &self.codec
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn clock(&self) -> &ClockSynchronizer {
        &self.clock
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn min_record_bits(&self) -> usize {
        self.min_record_bits
    }

    pub fn default_flags(&self) -> SyncFlags {
        if self.config.sync_rotation {
            SyncFlags::all()
        } else {
            SyncFlags::POSITION
        }
    }

    pub fn register(
        &mut self,
        id: SyncId,
        authority: Authority,
        target: A::Target,
    ) -> Result<(), SyncError> {
        self.register_with_flags(id, authority, self.default_flags(), target)
    }

    pub fn register_with_flags(
        &mut self,
        id: SyncId,
        authority: Authority,
        flags: SyncFlags,
        target: A::Target,
    ) -> Result<(), SyncError> {
        self.check_authority(authority)?;
        if flags.is_empty() {
            return Err(SyncError::NothingToSync(id));
        }
        if id.component != 0 && !self.config.include_component_index {
            return Err(SyncError::ComponentIndexDisabled(id));
        }

        let entity = TrackedEntity::new(
            id,
            authority,
            flags,
            target,
            self.config.position_sensitivity,
            self.config.rotation_sensitivity,
        );
        self.registry
            .insert(entity)
            .map_err(|_| SyncError::AlreadyRegistered(id))?;

        log::debug!("Registered {id} as {authority:?}");
        Ok(())
    }

    pub fn unregister(&mut self, id: SyncId) -> Result<A::Target, SyncError> {
        let entity = self
            .registry
            .remove(id)
            .ok_or(SyncError::NotRegistered(id))?;
        log::debug!("Unregistered {id}");
        Ok(entity.target)
    }

    pub fn set_authority(&mut self, id: SyncId, authority: Authority) -> Result<(), SyncError> {
        self.check_authority(authority)?;
        let entity = self
            .registry
            .get_mut(id)
            .ok_or(SyncError::NotRegistered(id))?;

        log::debug!("{id} authority {:?} -> {authority:?}", entity.authority);
        entity.authority = authority;
        entity.buffer.clear();
        entity.pending_relay = None;
        entity.last_synced = None;
        entity.force_send = true;
        entity.next_sync_time = self.now;
        Ok(())
    }

    fn check_authority(&self, authority: Authority) -> Result<(), SyncError> {
        let valid = match (self.role, authority) {
            (Role::Server, Authority::ClientOwnerControlled) => false,
            (Role::Client, _) | (Role::Server, _) => true,
        };
        if valid {
            Ok(())
        } else {
            Err(SyncError::InvalidAuthority {
                authority,
                role: self.role,
            })
        }
    }

    pub fn entity(&self, id: SyncId) -> Option<&TrackedEntity<A>> {
        self.registry.get(id)
    }

    pub fn entity_mut(&mut self, id: SyncId) -> Option<&mut TrackedEntity<A>> {
        self.registry.get_mut(id)
    }

    pub fn target(&self, id: SyncId) -> Option<&A::Target> {
        self.registry.get(id).map(|entity| &entity.target)
    }

    pub fn target_mut(&mut self, id: SyncId) -> Option<&mut A::Target> {
        self.registry.get_mut(id).map(|entity| &mut entity.target)
    }

    pub fn entities(&self) -> impl Iterator<Item = &TrackedEntity<A>> {
        self.registry.iter()
    }

    /// Advances local time by `dt` and sends whatever is due. Returns the number of messages
    /// handed to the transport.
    pub fn tick<O, T>(
        &mut self,
        dt: f64,
        observers: &O,
        transport: &mut T,
    ) -> Result<usize, SyncError>
    where
        O: ObserverSet,
        T: Transport,
    {
        self.now += dt;
        match self.role {
            Role::Server => {
                self.timer.accumulate(dt);
                if !self.timer.consume_interval() {
                    return Ok(0);
                }
                let records = self.collect_server_records();
                Ok(self.dispatch(self.now, &records, observers, transport))
            }
            Role::Client => {
                let records = self.collect_owner_records();
                if records.is_empty() {
                    return Ok(0);
                }
                Ok(self.send_to_server(&records, transport))
            }
        }
    }

    fn encode(&self, entity: &TrackedEntity<A>, state: &A::State) -> BitWriter {
        let mut record = BitWriter::with_capacity(16);
        self.codec.pack_record(&mut record, entity.id, entity.flags, state);
        record
    }

    fn collect_server_records(&mut self) -> Vec<(SyncId, BitWriter)> {
        let mut records = Vec::new();
        let ids: Vec<SyncId> = self.registry.iter().map(TrackedEntity::id).collect();

        for id in ids {
            let Some(entity) = self.registry.get(id) else {
                continue;
            };
            let state = match entity.authority {
                Authority::ServerControlled => {
                    let state = self.adapter.capture(&entity.target);
                    if !entity.is_dirty(&state) {
                        continue;
                    }
                    state
                }
                Authority::ClientRelayOnOtherPeers { .. } => match &entity.pending_relay {
                    Some(state) => state.clone(),
                    None => continue,
                },
                Authority::ClientOwnerControlled => continue,
            };

            records.push((id, self.encode(entity, &state)));
            if let Some(entity) = self.registry.get_mut(id) {
                entity.pending_relay = None;
                entity.mark_synced(state);
            }
        }
        records
    }

    fn collect_owner_records(&mut self) -> Vec<(SyncId, BitWriter)> {
        let interval = self.timer.interval();
        let now = self.now;
        let mut records = Vec::new();
        let ids: Vec<SyncId> = self.registry.iter().map(TrackedEntity::id).collect();

        for id in ids {
            let Some(entity) = self.registry.get_mut(id) else {
                continue;
            };
            if entity.authority != Authority::ClientOwnerControlled || now < entity.next_sync_time {
                continue;
            }
            entity.next_sync_time = if now - entity.next_sync_time > interval {
                now + interval
            } else {
                entity.next_sync_time + interval
            };

            let state = self.adapter.capture(&entity.target);
            if !entity.is_dirty(&state) {
                continue;
            }
            let mut record = BitWriter::with_capacity(16);
            self.codec.pack_record(&mut record, entity.id, entity.flags, &state);
            entity.mark_synced(state);
            records.push((id, record));
        }
        records
    }

    fn max_packet_size<T: Transport>(&self, transport: &T) -> usize {
        transport.max_packet_size().min(self.config.max_packet_size)
    }

    fn dispatch<O, T>(
        &mut self,
        time: f64,
        records: &[(SyncId, BitWriter)],
        observers: &O,
        transport: &mut T,
    ) -> usize
    where
        O: ObserverSet,
        T: Transport,
    {
        let max_packet_size = self.max_packet_size(transport);
        let mut sent = 0;

        match self.config.batching {
            BatchingPolicy::Broadcast => {
                let mut batch = OutgoingBatch::new(&self.codec, time, max_packet_size);
                for (_, record) in records {
                    batch.push(&self.codec, record);
                }
                self.stats.records_sent += batch.records() as u64;
                for message in batch.finish() {
                    transport.broadcast(&message);
                    self.stats.record_sent(message.len());
                    sent += 1;
                }
            }
            BatchingPolicy::PerObserver => {
                let mut batches: Vec<(PeerId, OutgoingBatch)> = observers
                    .peers()
                    .into_iter()
                    .map(|peer| (peer, OutgoingBatch::new(&self.codec, time, max_packet_size)))
                    .collect();

                for (id, record) in records {
                    for (peer, batch) in &mut batches {
                        if observers.can_see(*peer, *id) {
                            batch.push(&self.codec, record);
                        }
                    }
                }

                for (peer, batch) in batches {
                    self.stats.records_sent += batch.records() as u64;
                    for message in batch.finish() {
                        transport.send(peer, &message);
                        self.stats.record_sent(message.len());
                        sent += 1;
                    }
                }
            }
        }

        log::trace!("Sent {} records in {sent} messages at {time:.3}", records.len());
        sent
    }

    fn send_to_server<T: Transport>(
        &mut self,
        records: &[(SyncId, BitWriter)],
        transport: &mut T,
    ) -> usize {
        let max_packet_size = self.max_packet_size(transport);
        let mut batch = OutgoingBatch::new(&self.codec, self.clock.local_time(), max_packet_size);
        for (_, record) in records {
            batch.push(&self.codec, record);
        }
        self.stats.records_sent += batch.records() as u64;

        let mut sent = 0;
        for message in batch.finish() {
            transport.send(PeerId::SERVER, &message);
            self.stats.record_sent(message.len());
            sent += 1;
        }
        sent
    }

    pub fn receive(&mut self, from: PeerId, bytes: &[u8]) -> Result<(), SyncError> {
        self.stats.record_received(bytes.len());
        match (self.role, from == PeerId::SERVER) {
            (Role::Client, true) => self.receive_from_server(bytes),
            (Role::Server, false) => self.receive_from_owner(from, bytes),
            (role, _) => Err(SyncError::UnexpectedSender { role, from }),
        }
    }

    fn receive_from_server(&mut self, bytes: &[u8]) -> Result<(), SyncError> {
        let mut reader = BitReader::new(bytes);
        let time = self.codec.unpack_time(&mut reader)?;

        if self.clock.is_out_of_order(time) {
            if self.config.clock.ordering == OrderingPolicy::Strict {
                return Err(ClockError::OutOfOrder {
                    latest: self.clock.latest_remote_time(),
                    received: time,
                }
                .into());
            }
            log::debug!(
                "Ignoring batch at {time:.4}, already have {:.4}",
                self.clock.latest_remote_time()
            );
            self.stats.batches_out_of_order += 1;
            return Ok(());
        }

        let seed_time = time - self.timer.interval();
        while reader.remaining_bits() >= self.min_record_bits {
            let header = self.codec.unpack_record_header(&mut reader)?;
            let Some(entity) = self.registry.get_mut(header.id) else {
                if self.skip_unknown(&mut reader, header.id, header.payload_bits)? {
                    continue;
                }
                break;
            };

            let state = self
                .codec
                .unpack_payload::<A::State>(&mut reader, &header, entity.flags)?;
            self.stats.records_received += 1;

            if entity.authority == Authority::ClientOwnerControlled {
                continue;
            }
            if entity.buffer.is_empty() {
                let current = self.adapter.capture(&entity.target);
                entity.buffer.add(current, seed_time)?;
            }
            entity.buffer.add(state, time)?;
        }

        if self.clock.on_remote_sample(time)? == SampleOutcome::HardReset {
            self.stats.clock_resets += 1;
        }
        Ok(())
    }

    fn receive_from_owner(&mut self, from: PeerId, bytes: &[u8]) -> Result<(), SyncError> {
        let mut reader = BitReader::new(bytes);
        let time = self.codec.unpack_time(&mut reader)?;

        while reader.remaining_bits() >= self.min_record_bits {
            let header = self.codec.unpack_record_header(&mut reader)?;
            let Some(entity) = self.registry.get_mut(header.id) else {
                if self.skip_unknown(&mut reader, header.id, header.payload_bits)? {
                    continue;
                }
                break;
            };

            let state = self
                .codec
                .unpack_payload::<A::State>(&mut reader, &header, entity.flags)?;

            match entity.authority {
                Authority::ClientRelayOnOtherPeers { owner } if owner == from => {
                    self.adapter.apply(&mut entity.target, &state, entity.flags);
                    entity.pending_relay = Some(state);
                    self.stats.records_received += 1;
                }
                authority => {
                    log::warn!(
                        "{from} sent state for {} at {time:.3} but it is {authority:?}",
                        header.id
                    );
                }
            }
        }
        Ok(())
    }

    fn skip_unknown(
        &mut self,
        reader: &mut BitReader<'_>,
        id: SyncId,
        payload_bits: Option<usize>,
    ) -> Result<bool, SyncError> {
        match payload_bits {
            Some(bits) => {
                log::debug!("Skipping {bits} bits for unknown entity {id}");
                reader.skip(bits)?;
                self.stats.records_skipped += 1;
                Ok(true)
            }
            None => {
                log::warn!("Unknown entity {id} without write size, dropping rest of batch");
                self.stats.batches_aborted += 1;
                Ok(false)
            }
        }
    }

    /// Render tick: advances the clock and moves every remotely driven target to its
    /// interpolated state.
    pub fn update(&mut self, dt: f64) -> Result<(), SyncError> {
        if self.role == Role::Server {
            return Ok(());
        }

        self.clock.advance(dt);
        if !self.clock.is_initialized() {
            return Ok(());
        }

        let view_time = self.clock.time();
        let remove_time = view_time - self.clock.interpolation_delay() * 1.5;
        for entity in self.registry.iter_mut() {
            if entity.authority == Authority::ClientOwnerControlled || entity.buffer.is_empty() {
                continue;
            }

            let state = entity.buffer.query(view_time)?;
            self.adapter.apply(&mut entity.target, &state, entity.flags);

            match self.config.prune {
                PrunePolicy::DropAll => entity.buffer.prune(remove_time),
                PrunePolicy::KeepBracketing => entity.buffer.prune_keep_bracketing(remove_time),
            }
        }
        Ok(())
    }

    /// Forgets all received and sent state, e.g. after a reconnect. Registrations stay.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.timer.reset();
        for entity in self.registry.iter_mut() {
            entity.buffer.clear();
            entity.pending_relay = None;
            entity.last_synced = None;
            entity.force_send = true;
            entity.next_sync_time = self.now;
        }
        log::debug!("Sync state reset");
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}
