use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub records_sent: u64,
    pub records_received: u64,
    pub records_skipped: u64,
    pub batches_aborted: u64,
    pub batches_out_of_order: u64,
    pub clock_resets: u64,
}

impl SyncStats {
    pub fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.messages_received += 1;
        self.bytes_received += bytes as u64;
    }

    pub fn average_message_size(&self) -> f64 {
        if self.messages_sent == 0 {
            0.0
        } else {
            self.bytes_sent as f64 / self.messages_sent as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent {} msgs / {} B / {} records, received {} msgs / {} B / {} records, \
             skipped {}, aborted {}, out of order {}, clock resets {}",
            self.messages_sent,
            self.bytes_sent,
            self.records_sent,
            self.messages_received,
            self.bytes_received,
            self.records_received,
            self.records_skipped,
            self.batches_aborted,
            self.batches_out_of_order,
            self.clock_resets,
        )
    }
}
