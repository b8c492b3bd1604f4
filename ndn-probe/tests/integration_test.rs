use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use ndn_probe::codec::{decode_u64_le, join_null_delimited};
use ndn_probe::discovery::MAX_CONSECUTIVE_TIMEOUTS;
use ndn_probe::tlv::Interest;
use ndn_probe::{
    DiscoveryConfig, DiscoveryEngine, Name, NdnProbe, NodeId, Outcome, ProbeError, Reply,
    RequestChannel, ResponseInterpreter, Termination,
};

/// ------------------------------------------------------------
/// Scripted channel (NO NETWORK)
/// ------------------------------------------------------------
#[derive(Debug, Clone)]
enum Scripted {
    Node(u64, Vec<&'static str>),
    Root(u64),
    Garbage,
    Timeout,
}

/// Replays a fixed script, then times out forever. Records every Interest.
#[derive(Clone, Default)]
struct ScriptedChannel {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    seen: Arc<Mutex<Vec<Interest>>>,
}

impl ScriptedChannel {
    fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            seen: Arc::default(),
        }
    }

    fn seen(&self) -> Vec<Interest> {
        self.seen.lock().unwrap().clone()
    }
}

impl RequestChannel for ScriptedChannel {
    fn send(&mut self, interest: &Interest) -> Result<Outcome, ProbeError> {
        self.seen.lock().unwrap().push(interest.clone());
        let next = self.script.lock().unwrap().pop_front();
        Ok(match next.unwrap_or(Scripted::Timeout) {
            Scripted::Node(id, paths) => Outcome::Reply(Reply::new(
                interest.name.clone().append(id.to_string()),
                join_null_delimited(&paths),
            )),
            Scripted::Root(id) => Outcome::Reply(Reply::new(
                interest.name.clone().append("root").append(id.to_string()),
                Vec::new(),
            )),
            Scripted::Garbage => {
                Outcome::Reply(Reply::new(interest.name.clone(), b"hallo".to_vec()))
            }
            Scripted::Timeout => Outcome::Timeout,
        })
    }
}

/// Ids encoded after the discovery base in a request name.
fn excluded_ids(base: &Name, interest: &Interest) -> Vec<u64> {
    interest.name.components()[base.len()..]
        .iter()
        .map(|c| decode_u64_le(&c.value, 0).unwrap())
        .collect()
}

fn fast_config() -> DiscoveryConfig {
    DiscoveryConfig {
        inter_attempt_delay: Duration::ZERO,
        ..DiscoveryConfig::default()
    }
}

fn run(channel: &mut ScriptedChannel) -> ndn_probe::DiscoveryResult {
    DiscoveryEngine::new(fast_config(), ResponseInterpreter::default())
        .run(channel)
        .unwrap()
}

/// ------------------------------------------------------------
/// TESTS
/// ------------------------------------------------------------
#[test]
fn all_timeouts_end_after_three_attempts() {
    let mut channel = ScriptedChannel::new(vec![]);
    let result = run(&mut channel);
    assert_eq!(result.attempts, MAX_CONSECUTIVE_TIMEOUTS);
    assert_eq!(channel.seen().len(), 3);
    assert!(result.visited.is_empty());
    assert!(result.found_paths.is_empty());
    assert_eq!(result.termination, Termination::Silence);
}

#[test]
fn timeouts_do_not_advance_the_exclusion_list() {
    let mut channel = ScriptedChannel::new(vec![
        Scripted::Node(1, vec!["/x"]),
        Scripted::Timeout,
        Scripted::Timeout,
        Scripted::Node(2, vec!["/y"]),
        Scripted::Timeout,
        Scripted::Timeout,
        Scripted::Timeout,
    ]);
    let result = run(&mut channel);

    assert_eq!(result.visited, vec![NodeId(1), NodeId(2)]);
    assert_eq!(result.found_paths, vec!["/x".to_string(), "/y".to_string()]);
    assert_eq!(result.attempts, 7);

    let base = fast_config().base;
    let excluded: Vec<Vec<u64>> = channel
        .seen()
        .iter()
        .map(|i| excluded_ids(&base, i))
        .collect();
    assert_eq!(
        excluded,
        vec![
            vec![],
            vec![1],
            vec![1],
            vec![1],
            vec![1, 2],
            vec![1, 2],
            vec![1, 2],
        ]
    );
}

#[test]
fn every_request_requires_freshness() {
    let mut channel = ScriptedChannel::new(vec![Scripted::Node(3, vec!["/a"])]);
    run(&mut channel);
    for interest in channel.seen() {
        assert!(interest.must_be_fresh);
        assert_eq!(interest.lifetime, Duration::from_millis(3000));
        assert!(interest.name.to_string().starts_with("/esp/discovery"));
    }
}

/// A responder that ignores the exclusion list and always answers id 5.
#[test]
fn repeating_responder_is_never_revisited() {
    let mut seen = Vec::new();
    let mut channel = |interest: &Interest| {
        seen.push(interest.name.clone());
        Ok::<_, ProbeError>(Outcome::Reply(Reply::new(
            interest.name.clone().append("5"),
            join_null_delimited(&["/a", "/b"]),
        )))
    };
    let result = DiscoveryEngine::new(fast_config(), ResponseInterpreter::default())
        .run(&mut channel)
        .unwrap();

    assert_eq!(result.visited, vec![NodeId(5)]);
    assert_eq!(result.found_paths, vec!["/a".to_string(), "/b".to_string()]);
    assert_eq!(result.termination, Termination::Silence);
    assert_eq!(result.attempts, 1 + MAX_CONSECUTIVE_TIMEOUTS);
    // The exclusion list only grows.
    for pair in seen.windows(2) {
        assert!(pair[0].is_prefix_of(&pair[1]));
    }
}

#[test]
fn duplicate_paths_are_kept() {
    let mut channel = ScriptedChannel::new(vec![
        Scripted::Node(1, vec!["/esp/1", "/esp/1/2"]),
        Scripted::Node(2, vec!["/esp/1/2"]),
    ]);
    let result = run(&mut channel);
    assert_eq!(
        result.found_paths,
        vec![
            "/esp/1".to_string(),
            "/esp/1/2".to_string(),
            "/esp/1/2".to_string()
        ]
    );
}

#[test]
fn root_coordinator_is_excluded_afterwards() {
    let mut channel = ScriptedChannel::new(vec![
        Scripted::Root(100),
        Scripted::Node(7, vec!["/esp/100/7"]),
    ]);
    let result = run(&mut channel);
    assert_eq!(result.visited, vec![NodeId(100), NodeId(7)]);
    assert_eq!(result.found_paths, vec!["/esp/100/7".to_string()]);

    let base = fast_config().base;
    let seen = channel.seen();
    assert_eq!(excluded_ids(&base, &seen[1]), vec![100]);
    assert_eq!(excluded_ids(&base, &seen[2]), vec![100, 7]);
}

#[test]
fn malformed_reply_is_surfaced_and_retried() {
    let mut channel = ScriptedChannel::new(vec![
        Scripted::Timeout,
        Scripted::Timeout,
        Scripted::Garbage,
        Scripted::Node(4, vec![]),
    ]);
    let result = run(&mut channel);
    assert_eq!(result.visited, vec![NodeId(4)]);
    assert_eq!(result.rejected.len(), 1);
    assert!(matches!(result.rejected[0], ProbeError::MalformedPayload(_)));
    // 2 timeouts + garbage did not end the run; 3 more timeouts after node 4 did.
    assert_eq!(result.attempts, 7);
    // The retry after the garbage reply used the same exclusion list.
    let base = fast_config().base;
    let seen = channel.seen();
    assert_eq!(excluded_ids(&base, &seen[3]), Vec::<u64>::new());
}

#[test]
fn only_garbage_ends_on_malformed_budget() {
    let mut channel = ScriptedChannel::new(vec![Scripted::Garbage; 10]);
    let result = run(&mut channel);
    assert_eq!(result.termination, Termination::MalformedReplies);
    assert_eq!(result.attempts, 3);
}

#[test]
fn transport_failure_is_fatal() {
    let mut calls = 0;
    let mut channel = |_: &Interest| {
        calls += 1;
        if calls == 1 {
            Ok(Outcome::Timeout)
        } else {
            Err(ProbeError::TransportFailure("face closed".into()))
        }
    };
    let err = DiscoveryEngine::new(fast_config(), ResponseInterpreter::default())
        .run(&mut channel)
        .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn custom_sentinel_and_limits() {
    let mut channel = ScriptedChannel::new(vec![Scripted::Root(1)]);
    let config = DiscoveryConfig {
        max_consecutive_timeouts: 1,
        ..fast_config()
    };
    // With a different sentinel, "root" is just a component and the reply
    // is an ordinary node listing nothing.
    let result = DiscoveryEngine::new(config, ResponseInterpreter::new("coordinator"))
        .run(&mut channel)
        .unwrap();
    assert_eq!(result.visited, vec![NodeId(1)]);
    assert_eq!(result.attempts, 2);
}

#[test]
fn probe_discovery_updates_metrics() {
    let channel = ScriptedChannel::new(vec![
        Scripted::Node(1, vec!["/p"]),
        Scripted::Timeout,
        Scripted::Node(2, vec![]),
    ]);
    let mut probe = NdnProbe::with_channel(channel.clone(), "/esp".parse().unwrap());
    let config = DiscoveryConfig {
        inter_attempt_delay: Duration::ZERO,
        ..probe.discovery_config()
    };
    let result = probe.discover(&config).unwrap();
    assert_eq!(result.visited, vec![NodeId(1), NodeId(2)]);

    let m = probe.metrics();
    assert_eq!(m.requests, 6);
    assert_eq!(m.replies, 2);
    assert_eq!(m.timeouts, 4);
    assert_eq!(channel.seen().len(), 6);
}
