//! Drift policies and the decision function that applies them
//!
//! [`evaluate`] is pure: given what is recorded in the lock entry and what
//! was just observed, it decides what the orchestration loop should do and
//! which entry (if any) should replace the recorded one. It never performs
//! I/O, so every row of the policy table is testable in isolation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lock::LockEntry;

/// How a detected drift is handled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Policy {
    /// Report drift as a failure and leave the lock untouched
    #[default]
    Fail,
    /// Re-fetch the content and record the new fingerprint
    Update,
    /// Report drift without failing and leave the lock untouched
    Log,
    /// A policy name this version does not understand
    Unrecognized(String),
}

impl Policy {
    pub fn as_str(&self) -> &str {
        match self {
            Policy::Fail => "fail",
            Policy::Update => "update",
            Policy::Log => "log",
            Policy::Unrecognized(name) => name,
        }
    }
}

impl From<String> for Policy {
    fn from(name: String) -> Self {
        match name.as_str() {
            "fail" => Policy::Fail,
            "update" => Policy::Update,
            "log" => Policy::Log,
            _ => Policy::Unrecognized(name),
        }
    }
}

impl From<&str> for Policy {
    fn from(name: &str) -> Self {
        Policy::from(name.to_string())
    }
}

impl From<Policy> for String {
    fn from(policy: Policy) -> Self {
        policy.as_str().to_string()
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the orchestration loop must do for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Dataset is fresh
    NoOp,
    /// Fetch the content again and record the outcome
    Refresh,
    /// Report staleness without escalating
    RecordStale,
    /// Report staleness and escalate the run to failure
    RecordDriftFailure,
}

/// Why a dataset is not fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    NoLockEntry,
    FingerprintChanged { recorded: String, current: String },
    TargetMissing,
    LocalContentModified { recorded: String, current: String },
}

impl std::fmt::Display for Staleness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Staleness::NoLockEntry => write!(f, "no lock entry"),
            Staleness::FingerprintChanged { recorded, current } => {
                write!(f, "remote changed (lock={recorded:?} -> now={current:?})")
            }
            Staleness::TargetMissing => write!(f, "target file missing"),
            Staleness::LocalContentModified { recorded, current } => {
                write!(f, "local content modified (lock={recorded:?} -> now={current:?})")
            }
        }
    }
}

/// The current state of a dataset as seen by this run.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    /// Fingerprint just resolved from the winning source
    pub fingerprint: &'a str,
    /// Hash of the materialized target, `None` when the target is absent
    pub local_hash: Option<&'a str>,
}

impl Observation<'_> {
    pub fn target_exists(&self) -> bool {
        self.local_hash.is_some()
    }
}

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    /// Why the dataset is stale; `None` when it is fresh
    pub staleness: Option<Staleness>,
    /// Replacement for the recorded entry; `None` leaves it unmodified
    pub entry: Option<LockEntry>,
    /// The policy was not recognized and fail semantics were applied
    pub unrecognized_policy: bool,
}

/// Classify a dataset as fresh (`None`) or stale (with the first reason found).
pub fn staleness(entry: Option<&LockEntry>, observed: &Observation<'_>) -> Option<Staleness> {
    let Some(entry) = entry else {
        return Some(Staleness::NoLockEntry);
    };

    if entry.remote_fingerprint.as_deref() != Some(observed.fingerprint) {
        return Some(Staleness::FingerprintChanged {
            recorded: entry.remote_fingerprint.clone().unwrap_or_default(),
            current: observed.fingerprint.to_string(),
        });
    }

    let Some(current) = observed.local_hash else {
        return Some(Staleness::TargetMissing);
    };

    match entry.local_content_hash.as_deref() {
        Some(recorded) if recorded != current => Some(Staleness::LocalContentModified {
            recorded: recorded.to_string(),
            current: current.to_string(),
        }),
        _ => None,
    }
}

/// Decide what to do with a dataset under `policy`.
pub fn evaluate(
    policy: &Policy,
    entry: Option<&LockEntry>,
    observed: &Observation<'_>,
    now: DateTime<Utc>,
) -> Decision {
    let staleness = staleness(entry, observed);
    let unrecognized_policy = matches!(policy, Policy::Unrecognized(_));

    let (action, entry) = match (&staleness, policy) {
        (None, Policy::Unrecognized(_)) => (Action::NoOp, None),
        (None, _) => (Action::NoOp, entry.map(|e| e.touched(now))),
        (Some(_), Policy::Update) => (Action::Refresh, None),
        (Some(_), Policy::Log) => (Action::RecordStale, None),
        (Some(_), Policy::Fail | Policy::Unrecognized(_)) => (Action::RecordDriftFailure, None),
    };

    tracing::debug!(
        policy = %policy,
        action = ?action,
        staleness = ?staleness,
        "Evaluated policy"
    );

    Decision {
        action,
        staleness,
        entry,
        unrecognized_policy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn recorded(fp: &str, hash: &str) -> LockEntry {
        LockEntry::accepted(fp, hash, t(0))
    }

    fn seen<'a>(fp: &'a str, hash: Option<&'a str>) -> Observation<'a> {
        Observation {
            fingerprint: fp,
            local_hash: hash,
        }
    }

    #[rstest]
    #[case(Policy::Update, Action::Refresh)]
    #[case(Policy::Fail, Action::RecordDriftFailure)]
    #[case(Policy::Log, Action::RecordStale)]
    #[case(Policy::Unrecognized("strict".into()), Action::RecordDriftFailure)]
    fn drift_actions_leave_entry_unmodified(#[case] policy: Policy, #[case] expected: Action) {
        let entry = recorded("y", "sha256:aa");
        let decision = evaluate(&policy, Some(&entry), &seen("x", Some("sha256:aa")), t(10));

        assert_eq!(decision.action, expected);
        assert_eq!(decision.entry, None);
        assert_eq!(
            decision.staleness,
            Some(Staleness::FingerprintChanged {
                recorded: "y".into(),
                current: "x".into()
            })
        );
    }

    #[rstest]
    #[case(Policy::Update)]
    #[case(Policy::Fail)]
    #[case(Policy::Log)]
    fn fresh_entry_is_touched(#[case] policy: Policy) {
        let mut entry = recorded("x", "sha256:aa");
        entry.mark_inaccessible("earlier outage", t(5));

        let decision = evaluate(&policy, Some(&entry), &seen("x", Some("sha256:aa")), t(10));

        assert_eq!(decision.action, Action::NoOp);
        assert_eq!(decision.staleness, None);
        let next = decision.entry.expect("fresh entries are refreshed");
        assert_eq!(next.checked_at, Some(t(10)));
        assert_eq!(next.remote_fingerprint.as_deref(), Some("x"));
        assert_eq!(next.local_content_hash.as_deref(), Some("sha256:aa"));
        assert_eq!(next.inaccessible_at, None);
        assert_eq!(next.inaccessible_error, None);
    }

    #[test]
    fn unrecognized_policy_fresh_is_noop_without_refresh() {
        let entry = recorded("x", "sha256:aa");
        let decision = evaluate(
            &Policy::from("sometimes"),
            Some(&entry),
            &seen("x", Some("sha256:aa")),
            t(10),
        );
        assert_eq!(decision.action, Action::NoOp);
        assert_eq!(decision.entry, None);
        assert!(decision.unrecognized_policy);
    }

    #[test]
    fn missing_entry_is_stale() {
        let decision = evaluate(&Policy::Update, None, &seen("x", None), t(1));
        assert_eq!(decision.action, Action::Refresh);
        assert_eq!(decision.staleness, Some(Staleness::NoLockEntry));
    }

    #[test]
    fn missing_target_is_stale_even_when_fingerprint_matches() {
        let entry = recorded("x", "sha256:aa");
        let decision = evaluate(&Policy::Fail, Some(&entry), &seen("x", None), t(1));
        assert_eq!(decision.action, Action::RecordDriftFailure);
        assert_eq!(decision.staleness, Some(Staleness::TargetMissing));
    }

    #[test]
    fn locally_edited_target_is_stale() {
        let entry = recorded("x", "sha256:aa");
        let decision = evaluate(&Policy::Log, Some(&entry), &seen("x", Some("sha256:bb")), t(1));
        assert_eq!(decision.action, Action::RecordStale);
        assert!(matches!(
            decision.staleness,
            Some(Staleness::LocalContentModified { .. })
        ));
    }

    #[test]
    fn entry_without_recorded_hash_skips_local_comparison() {
        let mut entry = recorded("x", "sha256:aa");
        entry.local_content_hash = None;
        let decision = evaluate(&Policy::Fail, Some(&entry), &seen("x", Some("sha256:bb")), t(1));
        assert_eq!(decision.action, Action::NoOp);
    }

    #[rstest]
    #[case("fail", Policy::Fail)]
    #[case("update", Policy::Update)]
    #[case("log", Policy::Log)]
    #[case("Update", Policy::Unrecognized("Update".into()))]
    fn policy_names(#[case] name: &str, #[case] expected: Policy) {
        assert_eq!(Policy::from(name), expected);
        assert_eq!(Policy::from(name).to_string(), name);
    }

    #[test]
    fn default_policy_is_fail() {
        assert_eq!(Policy::default(), Policy::Fail);
    }

    #[test]
    fn staleness_messages_quote_fingerprints() {
        let s = Staleness::FingerprintChanged {
            recorded: "y".into(),
            current: "x".into(),
        };
        assert_eq!(s.to_string(), r#"remote changed (lock="y" -> now="x")"#);
    }
}
