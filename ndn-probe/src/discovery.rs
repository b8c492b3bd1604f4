//! Iterative topology discovery.
//!
//! Every attempt asks the fixed discovery name, followed by the ids of all
//! nodes visited so far so that they stay quiet and an unvisited node
//! answers. The node population is unknown in advance, so there is no
//! "done" message: a run ends after [`MAX_CONSECUTIVE_TIMEOUTS`] attempts in
//! a row get no (new) answer.
//!
//! ```text
//!  ┌───────┐  base + visited ids  ┌─────────┐
//!  │ state │─────────────────────▶│ channel │
//!  └───────┘                      └────┬────┘
//!      ▲  new id:  visited += id, timeouts = 0
//!      ├───────────────────────────────┤
//!      │  timeout or stale reply: timeouts += 1
//!      └───────────────────────────────┘
//!         timeouts == limit  ──▶  Done(result)
//! ```
//!
//! The state is a plain value: [`DiscoveryState::advance`] consumes it with
//! the outcome of one attempt and yields the next state or the final result.

use crate::channel::{Outcome, RequestChannel};
use crate::error::ProbeError;
use crate::interpret::{DiscoveryReply, ResponseInterpreter};
use crate::name::{discovery_name, discovery_request_name, Name, NodeId};
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_INTER_ATTEMPT_DELAY: Duration = Duration::from_millis(25);
pub const MAX_CONSECUTIVE_TIMEOUTS: u32 = 3;
pub const MAX_CONSECUTIVE_MALFORMED: u32 = 3;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// `/<service>/discovery`
    pub base: Name,
    pub request_timeout: Duration,
    pub inter_attempt_delay: Duration,
    pub max_consecutive_timeouts: u32,
    /// Consecutive undecodable replies tolerated before giving up.
    pub max_consecutive_malformed: u32,
}

impl DiscoveryConfig {
    pub fn for_service(service: &Name) -> Self {
        Self {
            base: discovery_name(service),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            inter_attempt_delay: DEFAULT_INTER_ATTEMPT_DELAY,
            max_consecutive_timeouts: MAX_CONSECUTIVE_TIMEOUTS,
            max_consecutive_malformed: MAX_CONSECUTIVE_MALFORMED,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::for_service(&Name::new().append("esp"))
    }
}

/// What one attempt produced, after interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Reply(DiscoveryReply),
    Timeout,
    Malformed(ProbeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The consecutive-timeout budget ran out: the normal end of a run.
    Silence,
    /// Only malformed replies arrived for a whole budget.
    MalformedReplies,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryResult {
    /// Discovery order, no duplicates.
    pub visited: Vec<NodeId>,
    /// All reported paths; the same path may be reported by several nodes.
    pub found_paths: Vec<String>,
    pub attempts: u32,
    pub termination: Termination,
    /// Replies that could not be decoded, in arrival order.
    pub rejected: Vec<ProbeError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryState {
    pub visited: Vec<NodeId>,
    pub found_paths: Vec<String>,
    pub consecutive_timeouts: u32,
    pub consecutive_malformed: u32,
    pub attempts: u32,
    pub rejected: Vec<ProbeError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Continue(DiscoveryState),
    Done(DiscoveryResult),
}

impl DiscoveryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The name for the next attempt: base plus the exclusion list.
    pub fn request_name(&self, base: &Name) -> Name {
        discovery_request_name(base, &self.visited)
    }

    pub fn advance(mut self, attempt: Attempt, config: &DiscoveryConfig) -> Step {
        self.attempts += 1;
        match attempt {
            Attempt::Timeout => self.silent(config),
            Attempt::Reply(reply) => {
                self.consecutive_malformed = 0;
                let responder = reply.responder();
                if self.visited.contains(&responder) {
                    // The network ignored the exclusion list (cached reply);
                    // nothing new was learned.
                    log::warn!("[discovery] stale reply from already visited {}", responder);
                    return self.silent(config);
                }
                self.consecutive_timeouts = 0;
                self.visited.push(responder);
                match reply {
                    DiscoveryReply::Node { paths, .. } => {
                        log::debug!("[discovery] {} reported {} path(s)", responder, paths.len());
                        self.found_paths.extend(paths);
                    }
                    DiscoveryReply::Root { .. } => {
                        log::debug!("[discovery] {} is the root coordinator", responder);
                    }
                }
                Step::Continue(self)
            }
            Attempt::Malformed(err) => {
                log::warn!("[discovery] rejected reply: {}", err);
                self.rejected.push(err);
                self.consecutive_malformed += 1;
                if self.consecutive_malformed >= config.max_consecutive_malformed {
                    Step::Done(self.finish(Termination::MalformedReplies))
                } else {
                    Step::Continue(self)
                }
            }
        }
    }

    fn silent(mut self, config: &DiscoveryConfig) -> Step {
        self.consecutive_timeouts += 1;
        if self.consecutive_timeouts >= config.max_consecutive_timeouts {
            Step::Done(self.finish(Termination::Silence))
        } else {
            Step::Continue(self)
        }
    }

    fn finish(self, termination: Termination) -> DiscoveryResult {
        DiscoveryResult {
            visited: self.visited,
            found_paths: self.found_paths,
            attempts: self.attempts,
            termination,
            rejected: self.rejected,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    interpreter: ResponseInterpreter,
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig, interpreter: ResponseInterpreter) -> Self {
        Self {
            config,
            interpreter,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// One request with freshness required, interpreted as a discovery reply.
    pub fn attempt<C: RequestChannel + ?Sized>(
        &self,
        channel: &mut C,
        state: &DiscoveryState,
    ) -> Result<Attempt, ProbeError> {
        let name = state.request_name(&self.config.base);
        log::debug!("[discovery] attempt {} → {}", state.attempts + 1, name);
        Ok(
            match channel.request(&name, true, self.config.request_timeout)? {
                Outcome::Timeout => Attempt::Timeout,
                Outcome::Reply(reply) => match self.interpreter.discovery(&reply) {
                    Ok(d) => Attempt::Reply(d),
                    Err(e) => Attempt::Malformed(e),
                },
            },
        )
    }

    /// Run to termination. Only a transport failure makes this return `Err`;
    /// otherwise the (possibly partial) topology is returned.
    pub fn run<C: RequestChannel + ?Sized>(
        &self,
        channel: &mut C,
    ) -> Result<DiscoveryResult, ProbeError> {
        log::info!("[discovery] starting at {}", self.config.base);
        let mut state = DiscoveryState::new();
        loop {
            let attempt = self.attempt(channel, &state)?;
            state = match state.advance(attempt, &self.config) {
                Step::Continue(next) => next,
                Step::Done(result) => {
                    log::info!(
                        "[discovery] finished after {} attempt(s): {} node(s), {} path(s)",
                        result.attempts,
                        result.visited.len(),
                        result.found_paths.len()
                    );
                    return Ok(result);
                }
            };
            if !self.config.inter_attempt_delay.is_zero() {
                std::thread::sleep(self.config.inter_attempt_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, paths: &[&str]) -> Attempt {
        Attempt::Reply(DiscoveryReply::Node {
            responder: NodeId(id),
            paths: paths.iter().map(|p| p.to_string()).collect(),
        })
    }

    fn fold(attempts: Vec<Attempt>) -> Step {
        let config = DiscoveryConfig::default();
        let mut step = Step::Continue(DiscoveryState::new());
        for a in attempts {
            step = match step {
                Step::Continue(s) => s.advance(a, &config),
                done => return done,
            };
        }
        step
    }

    #[test]
    fn defaults_match_protocol() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.base.to_string(), "/esp/discovery");
        assert_eq!(config.request_timeout, Duration::from_millis(3000));
        assert_eq!(config.inter_attempt_delay, Duration::from_millis(25));
        assert_eq!(config.max_consecutive_timeouts, 3);
    }

    #[test]
    fn three_timeouts_end_the_run() {
        match fold(vec![Attempt::Timeout, Attempt::Timeout, Attempt::Timeout]) {
            Step::Done(r) => {
                assert_eq!(r.attempts, 3);
                assert!(r.visited.is_empty());
                assert!(r.found_paths.is_empty());
                assert_eq!(r.termination, Termination::Silence);
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[test]
    fn reply_resets_timeout_counter() {
        match fold(vec![Attempt::Timeout, Attempt::Timeout, node(1, &["/x"])]) {
            Step::Continue(s) => {
                assert_eq!(s.consecutive_timeouts, 0);
                assert_eq!(s.visited, vec![NodeId(1)]);
            }
            other => panic!("expected Continue, got {:?}", other),
        }
    }

    #[test]
    fn root_reply_is_visited_without_paths() {
        let root = Attempt::Reply(DiscoveryReply::Root { responder: NodeId(9) });
        match fold(vec![root]) {
            Step::Continue(s) => {
                assert_eq!(s.visited, vec![NodeId(9)]);
                assert!(s.found_paths.is_empty());
            }
            other => panic!("expected Continue, got {:?}", other),
        }
    }

    #[test]
    fn stale_reply_counts_as_silence() {
        match fold(vec![node(5, &["/a"]), node(5, &["/a"]), node(5, &["/a"]), node(5, &["/a"])]) {
            Step::Done(r) => {
                assert_eq!(r.visited, vec![NodeId(5)]);
                assert_eq!(r.found_paths, vec!["/a".to_string()]);
                assert_eq!(r.attempts, 4);
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[test]
    fn malformed_does_not_touch_timeout_budget() {
        let bad = || Attempt::Malformed(ProbeError::MalformedPayload("bad".into()));
        match fold(vec![Attempt::Timeout, Attempt::Timeout, bad(), bad()]) {
            Step::Continue(s) => {
                assert_eq!(s.consecutive_timeouts, 2);
                assert_eq!(s.consecutive_malformed, 2);
                assert!(s.visited.is_empty());
                assert_eq!(s.rejected.len(), 2);
            }
            other => panic!("expected Continue, got {:?}", other),
        }
    }

    #[test]
    fn malformed_budget_ends_the_run() {
        let bad = || Attempt::Malformed(ProbeError::MalformedPayload("bad".into()));
        match fold(vec![node(1, &[]), bad(), bad(), bad()]) {
            Step::Done(r) => {
                assert_eq!(r.termination, Termination::MalformedReplies);
                assert_eq!(r.visited, vec![NodeId(1)]);
                assert_eq!(r.rejected.len(), 3);
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[test]
    fn request_name_grows_with_visited() {
        let config = DiscoveryConfig::default();
        let mut state = DiscoveryState::new();
        assert_eq!(state.request_name(&config.base), config.base);
        state.visited = vec![NodeId(1), NodeId(2)];
        let name = state.request_name(&config.base);
        assert_eq!(name.len(), config.base.len() + 2);
        assert_eq!(name, state.request_name(&config.base));
    }
}
