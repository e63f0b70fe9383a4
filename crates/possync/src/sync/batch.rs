use crate::codec::{BitWriter, StateCodec};

#[derive(Debug)]
pub struct OutgoingBatch {
    time: f64,
    max_bits: usize,
    current: BitWriter,
    current_records: usize,
    finished: Vec<Vec<u8>>,
    records: usize,
}

impl OutgoingBatch {
    pub fn new(codec: &StateCodec, time: f64, max_packet_size: usize) -> Self {
        let mut batch = Self {
            time,
            max_bits: max_packet_size * 8,
            current: BitWriter::with_capacity(max_packet_size),
            current_records: 0,
            finished: Vec::new(),
            records: 0,
        };
        batch.start_message(codec);
        batch
    }

    fn start_message(&mut self, codec: &StateCodec) {
        self.current.clear();
        self.current_records = 0;
        codec.pack_time(&mut self.current, self.time);
    }

    pub fn push(&mut self, codec: &StateCodec, record: &BitWriter) {
        if self.current_records > 0 && self.current.bit_len() + record.bit_len() > self.max_bits {
            let full = std::mem::take(&mut self.current);
            self.finished.push(full.into_bytes());
            self.start_message(codec);
        }
        self.current.append(record);
        self.current_records += 1;
        self.records += 1;
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.finished.push(self.current.into_bytes());
        self.finished
    }
}
