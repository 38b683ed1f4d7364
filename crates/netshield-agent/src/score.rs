//! Experience score — maps signal strength and latency onto 0–100.

/// Latency is divided by this to get penalty points.
const LATENCY_PENALTY_DIVISOR: u32 = 5;
/// Upper bound on the latency penalty, so a strong link never scores below
/// `signal - 40`.
const MAX_LATENCY_PENALTY: u32 = 40;

/// Score a reading. A zero signal means no usable connection; an absent
/// latency leaves the signal unpenalized.
pub fn score(signal_percent: u8, latency_ms: Option<u32>) -> u8 {
    if signal_percent == 0 {
        return 0;
    }
    let signal = u32::from(signal_percent.min(100));
    let Some(latency) = latency_ms else {
        return signal as u8;
    };
    let penalty = (latency / LATENCY_PENALTY_DIVISOR).min(MAX_LATENCY_PENALTY);
    signal.saturating_sub(penalty).min(100) as u8
}
