use std::fmt;

use super::Interpolate;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BufferError {
    #[error("snapshot at {new} is older than the last stored snapshot at {last}")]
    OutOfOrder { last: f64, new: f64 },
    #[error("no snapshots in buffer")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub time: f64,
    pub state: T,
}

#[derive(Debug, Clone)]
pub struct SnapshotBuffer<T> {
    snapshots: Vec<Snapshot<T>>,
}

impl<T> Default for SnapshotBuffer<T> {
    fn default() -> Self {
        Self {
            snapshots: Vec::new(),
        }
    }
}

impl<T: Interpolate + Clone> SnapshotBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, state: T, time: f64) -> Result<(), BufferError> {
        if let Some(last) = self.last_time() {
            if time < last {
                return Err(BufferError::OutOfOrder { last, new: time });
            }
        }
        self.snapshots.push(Snapshot { time, state });
        Ok(())
    }

    pub fn query(&self, now: f64) -> Result<T, BufferError> {
        let (first, last) = match (self.snapshots.first(), self.snapshots.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(BufferError::Empty),
        };

        if self.snapshots.len() == 1 || now <= first.time {
            return Ok(first.state.clone());
        }
        if now >= last.time {
            return Ok(last.state.clone());
        }

        for pair in self.snapshots.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            if from.time <= now && now <= to.time {
                let span = to.time - from.time;
                let alpha = if span > 0.0 {
                    ((now - from.time) / span).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                return Ok(from.state.interpolate(&to.state, alpha as f32));
            }
        }

        Ok(last.state.clone())
    }

    pub fn prune(&mut self, old_time: f64) {
        self.snapshots.retain(|snapshot| snapshot.time >= old_time);
    }

    pub fn prune_keep_bracketing(&mut self, old_time: f64) {
        let older = self
            .snapshots
            .iter()
            .take_while(|snapshot| snapshot.time < old_time)
            .count();
        if older > 1 {
            self.snapshots.drain(..older - 1);
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn first_time(&self) -> Option<f64> {
        self.snapshots.first().map(|snapshot| snapshot.time)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.snapshots.last().map(|snapshot| snapshot.time)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot<T>> {
        self.snapshots.iter()
    }
}

impl<T> fmt::Display for SnapshotBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, snapshot) in self.snapshots.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.4}", snapshot.time)?;
        }
        write!(f, "]")
    }
}
