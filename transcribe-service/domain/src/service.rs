use crate::{AttentionMode, Batch, Bucket, Timed};

pub fn classify(duration_seconds: f64, short_max_seconds: f64) -> Bucket {
    if duration_seconds <= short_max_seconds {
        Bucket::Short
    } else {
        Bucket::Long
    }
}

pub fn select_attention_mode(
    duration_seconds: f64,
    local_attention_after_seconds: f64,
) -> AttentionMode {
    if duration_seconds > local_attention_after_seconds {
        AttentionMode::Local
    } else {
        AttentionMode::Global
    }
}

/// Greedy, order-preserving grouping in a single forward pass. A new group starts
/// when the current one is full or the next item would push it past
/// `max_total_seconds`; an item longer than the bound on its own still gets a
/// singleton group.
pub fn pack_in_order<T: Timed>(
    items: Vec<T>,
    max_items: usize,
    max_total_seconds: f64,
) -> Vec<Vec<T>> {
    let mut groups = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut current_total = 0.0;

    for item in items {
        let duration = item.duration_seconds();
        let fits_count = current.len() < max_items;
        let fits_total = current_total + duration <= max_total_seconds;

        if fits_count && fits_total {
            current_total += duration;
            current.push(item);
        } else {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            current_total = duration;
            current.push(item);
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Thresholds that drive bucketing, packing and attention selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulingPolicy {
    pub short_max_seconds: f64,
    pub batch_max_items: usize,
    pub batch_max_total_seconds: f64,
    pub local_attention_after_seconds: f64,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            short_max_seconds: 600.0,
            batch_max_items: 16,
            batch_max_total_seconds: 1_200.0,
            local_attention_after_seconds: 1_440.0,
        }
    }
}

impl SchedulingPolicy {
    pub fn classify(&self, duration_seconds: f64) -> Bucket {
        classify(duration_seconds, self.short_max_seconds)
    }

    pub fn select_mode(&self, duration_seconds: f64) -> AttentionMode {
        select_attention_mode(duration_seconds, self.local_attention_after_seconds)
    }

    /// Splits items into (short, long) keeping arrival order inside each bucket.
    pub fn bucketize<T: Timed>(&self, items: Vec<T>) -> (Vec<T>, Vec<T>) {
        items
            .into_iter()
            .partition(|item| self.classify(item.duration_seconds()) == Bucket::Short)
    }

    pub fn pack_batches<T: Timed>(&self, shorts: Vec<T>) -> Vec<Batch<T>> {
        pack_in_order(shorts, self.batch_max_items, self.batch_max_total_seconds)
            .into_iter()
            .map(|members| self.batch(members))
            .collect()
    }

    pub fn batch<T: Timed>(&self, members: Vec<T>) -> Batch<T> {
        let total_duration_seconds = members.iter().map(Timed::duration_seconds).sum();
        let representative = members
            .iter()
            .map(Timed::duration_seconds)
            .fold(0.0, f64::max);
        Batch {
            members,
            total_duration_seconds,
            attention_mode: self.select_mode(representative),
        }
    }
}
