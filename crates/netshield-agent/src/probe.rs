//! Latency prober — a fixed-count ping reduced to its mean round trip.

use async_trait::async_trait;
use thiserror::Error;

/// Echo requests sent per measurement.
pub const PROBE_COUNT: u32 = 3;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ping {host} failed: {reason}")]
    Failed { host: String, reason: String },
    #[error("could not find an average in ping output")]
    Unparseable,
    #[error("no answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Measures mean round-trip latency in whole milliseconds (always >= 1).
#[async_trait]
pub trait LatencyProbe: Send + Sync {
    async fn measure(&self) -> Result<u32, ProbeError>;
}

/// Shells out to the system `ping`.
pub struct PingProbe {
    host: String,
}

impl PingProbe {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[async_trait]
impl LatencyProbe for PingProbe {
    async fn measure(&self) -> Result<u32, ProbeError> {
        let count = PROBE_COUNT.to_string();
        let count_flag = if cfg!(windows) { "-n" } else { "-c" };
        let output = tokio::process::Command::new("ping")
            .args([count_flag, count.as_str(), self.host.as_str()])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProbeError::Failed {
                host: self.host.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                host: self.host.clone(),
                reason: format!(
                    "{} | stderr: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        parse_average_ms(&String::from_utf8_lossy(&output.stdout)).ok_or(ProbeError::Unparseable)
    }
}

/// Extract the mean RTT from Windows (`Average = 23ms`) or Unix
/// (`rtt min/avg/max/mdev = 9.1/12.4/15.0/2.3 ms`) ping output.
///
/// Sub-millisecond means round up to 1 so a measurement is never zero.
pub fn parse_average_ms(output: &str) -> Option<u32> {
    for line in output.lines().map(str::trim) {
        if let Some(idx) = line.find("Average") {
            let value = line[idx + "Average".len()..]
                .trim_start()
                .strip_prefix('=')?
                .trim()
                .trim_end_matches("ms");
            return value.trim().parse::<u32>().ok().map(|v| v.max(1));
        }
        if line.contains("min/avg/max") {
            let (_, values) = line.split_once('=')?;
            let avg = values.trim().split('/').nth(1)?.trim();
            let avg: f64 = avg.parse().ok()?;
            return Some((avg.ceil() as u32).max(1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_windows_summary() {
        let out = "\
Pinging 8.8.8.8 with 32 bytes of data:\r
Reply from 8.8.8.8: bytes=32 time=21ms TTL=117\r
\r
Ping statistics for 8.8.8.8:\r
    Packets: Sent = 3, Received = 3, Lost = 0 (0% loss),\r
Approximate round trip times in milli-seconds:\r
    Minimum = 19ms, Maximum = 25ms, Average = 22ms\r
";
        assert_eq!(parse_average_ms(out), Some(22));
    }

    #[test]
    fn parses_unix_summary_rounding_up() {
        let out = "\
3 packets transmitted, 3 received, 0% packet loss, time 2003ms
rtt min/avg/max/mdev = 11.201/12.410/14.020/1.170 ms
";
        assert_eq!(parse_average_ms(out), Some(13));

        let local = "round-trip min/avg/max/stddev = 0.041/0.052/0.060/0.008 ms";
        assert_eq!(parse_average_ms(local), Some(1));
    }

    #[test]
    fn zero_average_is_reported_as_one() {
        assert_eq!(parse_average_ms("    Minimum = 0ms, Maximum = 0ms, Average = 0ms"), Some(1));
    }

    #[test]
    fn unreachable_output_has_no_average() {
        let out = "Request timed out.\r\nRequest timed out.\r\n    Packets: Sent = 3, Received = 0, Lost = 3 (100% loss),\r\n";
        assert_eq!(parse_average_ms(out), None);
    }
}
