use crate::channel::{Outcome, Reply, RequestChannel};
use crate::discovery::{DiscoveryConfig, DiscoveryEngine, DiscoveryResult, DEFAULT_REQUEST_TIMEOUT};
use crate::error::ProbeError;
use crate::face::{FaceConfig, UdpFace};
use crate::interpret::{LinkQualityEntry, ResponseInterpreter, ResponseKind, Scalar};
use crate::name::{link_quality_name, sensor_data_name, Name, NodeId};
use crate::polling::{poll, PollConfig, PollReport, PollStatus};
use crate::tlv::Interest;
use std::time::Duration;

/// ------------------------------------------------------------
/// Metrics
/// ------------------------------------------------------------
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ProbeMetrics {
    pub requests: u64,  // Interests sent
    pub replies: u64,   // Data received
    pub timeouts: u64,  // no Data within the lifetime
    pub malformed: u64, // replies that failed to interpret, any operation
}

/// Counts traffic on the way through to the real channel.
struct Metered<'a, C: ?Sized> {
    inner: &'a mut C,
    metrics: &'a mut ProbeMetrics,
}

impl<C: RequestChannel + ?Sized> RequestChannel for Metered<'_, C> {
    fn send(&mut self, interest: &Interest) -> Result<Outcome, ProbeError> {
        self.metrics.requests += 1;
        let outcome = self.inner.send(interest)?;
        match &outcome {
            Outcome::Reply(_) => self.metrics.replies += 1,
            Outcome::Timeout => self.metrics.timeouts += 1,
        }
        Ok(outcome)
    }
}

/// ------------------------------------------------------------
/// Probe
/// ------------------------------------------------------------
pub struct NdnProbe<C> {
    channel: C,
    interpreter: ResponseInterpreter,
    service: Name,
    request_timeout: Duration,
    metrics: ProbeMetrics,
}

impl NdnProbe<UdpFace> {
    /// Probe talking to a real forwarder over UDP.
    pub fn connect(face: &FaceConfig, service: Name) -> Result<Self, ProbeError> {
        Ok(Self::with_channel(UdpFace::connect(face)?, service))
    }
}

impl<C: RequestChannel> NdnProbe<C> {
    /// Probe over any channel (scripted fakes in tests).
    pub fn with_channel(channel: C, service: Name) -> Self {
        Self {
            channel,
            interpreter: ResponseInterpreter::default(),
            service,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            metrics: ProbeMetrics::default(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: ResponseInterpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn service(&self) -> &Name {
        &self.service
    }

    pub fn metrics(&self) -> &ProbeMetrics {
        &self.metrics
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    fn metered(&mut self) -> Metered<'_, C> {
        Metered {
            inner: &mut self.channel,
            metrics: &mut self.metrics,
        }
    }

    /// Discovery config for this probe's service and timeout.
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            request_timeout: self.request_timeout,
            ..DiscoveryConfig::for_service(&self.service)
        }
    }

    pub fn discover(&mut self, config: &DiscoveryConfig) -> Result<DiscoveryResult, ProbeError> {
        let engine = DiscoveryEngine::new(config.clone(), self.interpreter.clone());
        let result = engine.run(&mut self.metered())?;
        self.metrics.malformed += result.rejected.len() as u64;
        Ok(result)
    }

    /// One fresh request; a timeout becomes `ProbeError::Timeout`.
    fn fetch(&mut self, name: &Name) -> Result<Reply, ProbeError> {
        let timeout = self.request_timeout;
        match self.metered().request(name, true, timeout)? {
            Outcome::Reply(reply) => Ok(reply),
            Outcome::Timeout => Err(ProbeError::Timeout(name.to_string())),
        }
    }

    fn count_malformed<T>(&mut self, result: Result<T, ProbeError>) -> Result<T, ProbeError> {
        if let Err(ProbeError::MalformedPayload(_)) = &result {
            self.metrics.malformed += 1;
        }
        result
    }

    /// `/<service>/<node>/data/<quantity>`
    pub fn read_sensor(&mut self, node: NodeId, quantity: &str) -> Result<Scalar, ProbeError> {
        let reply = self.fetch(&sensor_data_name(&self.service, node, quantity))?;
        let result = self
            .interpreter
            .interpret(&reply, ResponseKind::Scalar)
            .and_then(|i| i.into_scalar());
        self.count_malformed(result)
    }

    /// `/<service>/<node>/linkquality`
    pub fn link_quality(&mut self, node: NodeId) -> Result<Vec<LinkQualityEntry>, ProbeError> {
        let reply = self.fetch(&link_quality_name(&self.service, node))?;
        let result = self
            .interpreter
            .interpret(&reply, ResponseKind::LinkQualityTable)
            .and_then(|i| i.into_link_quality());
        self.count_malformed(result)
    }

    pub fn poll<F>(
        &mut self,
        name: &Name,
        config: &PollConfig,
        observer: F,
    ) -> Result<PollReport, ProbeError>
    where
        F: FnMut(&PollStatus),
    {
        let interpreter = self.interpreter.clone();
        let report = poll(&mut self.metered(), &interpreter, name, config, observer)?;
        self.metrics.malformed += report.malformed;
        Ok(report)
    }
}
