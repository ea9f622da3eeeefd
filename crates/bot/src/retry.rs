#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_seconds: u64,
    pub max_seconds: u64,
}

impl RetryPolicy {
    pub fn delay_seconds(&self, attempt: u32) -> u64 {
        retry_delay_seconds(self.base_seconds, self.max_seconds, attempt)
    }
}

pub fn retry_delay_seconds(base_seconds: u64, max_seconds: u64, attempt: u32) -> u64 {
    if attempt <= 1 {
        return base_seconds.min(max_seconds);
    }

    let capped_exponent = attempt.saturating_sub(1).min(20);
    let multiplier = 1_u64 << capped_exponent;

    base_seconds.saturating_mul(multiplier).min(max_seconds)
}
