//! Back-to-back reads of one name for a fixed wall-clock window.

use crate::channel::{Outcome, RequestChannel};
use crate::discovery::DEFAULT_REQUEST_TIMEOUT;
use crate::error::ProbeError;
use crate::interpret::{ResponseInterpreter, ResponseKind, Scalar};
use crate::name::Name;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub duration: Duration,
    pub request_timeout: Duration,
    /// Bypass caches so each read reaches the sensor.
    pub must_be_fresh: bool,
    /// Pause between attempts; zero polls back to back.
    pub interval: Duration,
}

impl PollConfig {
    pub fn for_duration(duration: Duration) -> Self {
        Self {
            duration,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            must_be_fresh: true,
            interval: Duration::ZERO,
        }
    }
}

/// Running totals, handed to the observer after every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PollStatus {
    pub attempts: u64,
    pub replies: u64,
    pub timeouts: u64,
    pub malformed: u64,
    pub elapsed: Duration,
    pub last_latency: Duration,
    pub total_latency: Duration,
    pub last_value: Scalar,
    pub last_error: Option<ProbeError>,
}

impl PollStatus {
    fn new() -> Self {
        Self {
            attempts: 0,
            replies: 0,
            timeouts: 0,
            malformed: 0,
            elapsed: Duration::ZERO,
            last_latency: Duration::ZERO,
            total_latency: Duration::ZERO,
            last_value: Scalar::NoData,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub count: u64,
    pub replies: u64,
    pub timeouts: u64,
    pub malformed: u64,
    /// Mean over every attempt, timeouts included.
    pub avg_latency: Duration,
    pub elapsed: Duration,
    pub last_value: Scalar,
    pub last_error: Option<ProbeError>,
}

impl PollReport {
    /// Attempts per second over the whole window.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.count as f64 / secs
        } else {
            0.0
        }
    }
}

impl From<PollStatus> for PollReport {
    fn from(s: PollStatus) -> Self {
        let avg_latency = match u32::try_from(s.attempts) {
            Ok(0) => Duration::ZERO,
            Ok(n) => s.total_latency / n,
            Err(_) => Duration::from_secs_f64(s.total_latency.as_secs_f64() / s.attempts as f64),
        };
        Self {
            count: s.attempts,
            replies: s.replies,
            timeouts: s.timeouts,
            malformed: s.malformed,
            avg_latency,
            elapsed: s.elapsed,
            last_value: s.last_value,
            last_error: s.last_error,
        }
    }
}

/// Poll `name` until `config.duration` has elapsed.
///
/// Timeouts and undecodable replies are counted, not returned; only a
/// transport failure aborts the run. At least one attempt is always made.
pub fn poll<C, F>(
    channel: &mut C,
    interpreter: &ResponseInterpreter,
    name: &Name,
    config: &PollConfig,
    mut observer: F,
) -> Result<PollReport, ProbeError>
where
    C: RequestChannel + ?Sized,
    F: FnMut(&PollStatus),
{
    log::info!("[poll] {} for {:?}", name, config.duration);
    let start = Instant::now();
    let mut status = PollStatus::new();

    loop {
        let sent = Instant::now();
        let outcome = channel.request(name, config.must_be_fresh, config.request_timeout)?;
        let latency = sent.elapsed();

        status.attempts += 1;
        status.last_latency = latency;
        status.total_latency += latency;
        match outcome {
            Outcome::Timeout => status.timeouts += 1,
            Outcome::Reply(reply) => match interpreter
                .interpret(&reply, ResponseKind::Scalar)
                .and_then(|i| i.into_scalar())
            {
                Ok(value) => {
                    status.replies += 1;
                    status.last_value = value;
                }
                Err(e) => {
                    log::warn!("[poll] {}: {}", reply.name, e);
                    status.malformed += 1;
                    status.last_error = Some(e);
                }
            },
        }
        status.elapsed = start.elapsed();
        observer(&status);

        if status.elapsed >= config.duration {
            break;
        }
        if !config.interval.is_zero() {
            std::thread::sleep(config.interval);
        }
    }

    let report = PollReport::from(status);
    log::info!(
        "[poll] {} attempt(s), {} timeout(s), avg latency {:?}",
        report.count,
        report.timeouts,
        report.avg_latency
    );
    Ok(report)
}
