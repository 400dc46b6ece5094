//! Resolves a single dependency declaration to a ranked provider.
//!
//! Tag expressions are a flat list of atoms: a bare `tag` is required, `+tag` is
//! preferred (adds to score but doesn't gate), `-tag` excludes any candidate
//! carrying it, and `(a|b)` is an OR-group — satisfied if the candidate carries
//! any one of the alternatives, tried left to right.

use chrono::{DateTime, Utc};
use semver::{Version, VersionReq};
use uuid::Uuid;

use crate::error::{RegistryError, Result};
use crate::model::{Agent, Capability, DependencyDeclaration, Endpoint, Resolution};

const REQUIRED_TAG_SCORE: u32 = 5;
const PREFERRED_TAG_SCORE: u32 = 10;

/// A provider candidate offered by the catalog: the owning agent plus the
/// specific capability being matched against.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub agent: &'a Agent,
    pub capability: &'a Capability,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ParsedExpression {
    required: Vec<String>,
    preferred: Vec<String>,
    excluded: Vec<String>,
    or_groups: Vec<Vec<String>>,
}

fn parse_tag_expression(atoms: &[String]) -> Result<ParsedExpression> {
    let mut parsed = ParsedExpression::default();
    for atom in atoms {
        if let Some(rest) = atom.strip_prefix('+') {
            if rest.is_empty() {
                return Err(RegistryError::Validation(format!(
                    "empty preferred tag in expression atom {atom:?}"
                )));
            }
            parsed.preferred.push(rest.to_string());
        } else if let Some(rest) = atom.strip_prefix('-') {
            if rest.is_empty() {
                return Err(RegistryError::Validation(format!(
                    "empty excluded tag in expression atom {atom:?}"
                )));
            }
            parsed.excluded.push(rest.to_string());
        } else if atom.starts_with('(') {
            let inner = atom
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| {
                    RegistryError::Validation(format!("malformed OR-group atom {atom:?}"))
                })?;
            let alternatives: Vec<String> = inner.split('|').map(|s| s.to_string()).collect();
            if alternatives.iter().any(|a| a.is_empty()) {
                return Err(RegistryError::Validation(format!(
                    "empty alternative in OR-group {atom:?}"
                )));
            }
            parsed.or_groups.push(alternatives);
        } else if atom.is_empty() {
            return Err(RegistryError::Validation(
                "empty tag atom in expression".to_string(),
            ));
        } else if atom.chars().next().map(|c| c.is_alphanumeric() || c == '_').unwrap_or(false) {
            parsed.required.push(atom.clone());
        } else {
            return Err(RegistryError::Validation(format!(
                "unknown tag operator in atom {atom:?}"
            )));
        }
    }
    Ok(parsed)
}

/// Score a single capability's tags against a parsed expression.
///
/// Returns `None` if the candidate is rejected (missing a required tag,
/// carrying an excluded tag, or failing to satisfy an OR-group). Otherwise
/// returns the accumulated score.
fn score_tags(candidate_tags: &[String], parsed: &ParsedExpression) -> Option<u32> {
    let has = |tag: &str| candidate_tags.iter().any(|t| t == tag);

    for excluded in &parsed.excluded {
        if has(excluded) {
            return None;
        }
    }
    for required in &parsed.required {
        if !has(required) {
            return None;
        }
    }
    for group in &parsed.or_groups {
        if !group.iter().any(|alt| has(alt)) {
            return None;
        }
    }

    let mut score = 0u32;
    score += parsed.required.len() as u32 * REQUIRED_TAG_SCORE;
    score += parsed.or_groups.len() as u32 * REQUIRED_TAG_SCORE;
    for preferred in &parsed.preferred {
        if has(preferred) {
            score += PREFERRED_TAG_SCORE;
        }
    }
    Some(score)
}

struct Scored<'a> {
    candidate: Candidate<'a>,
    score: u32,
}

fn better(a: &Scored<'_>, b: &Scored<'_>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    a.score
        .cmp(&b.score)
        .then_with(|| a.candidate.capability.version.cmp(&b.candidate.capability.version))
        .then_with(|| {
            b.candidate
                .agent
                .registered_at
                .cmp(&a.candidate.agent.registered_at)
        })
        .then_with(|| b.candidate.agent.id.to_string().cmp(&a.candidate.agent.id.to_string()))
}

/// Resolve one dependency declaration against an iterator of candidate providers.
///
/// `candidates` is expected to already be filtered to healthy agents in the
/// correct namespace scope (the [`crate::catalog::Catalog`] is responsible for
/// that); this function applies tag filtering, version constraints, scoring,
/// and the deterministic tie-break.
pub fn resolve_dependency<'a>(
    dependency: &DependencyDeclaration,
    candidates: impl IntoIterator<Item = Candidate<'a>>,
    now: DateTime<Utc>,
) -> Result<Resolution> {
    let parsed = parse_tag_expression(&dependency.tags)?;
    if parsed.required.is_empty() && parsed.or_groups.is_empty() && dependency.capability.is_none() {
        return Err(RegistryError::Validation(
            "dependency has neither a capability name nor a required tag".to_string(),
        ));
    }

    // An unparsable constraint is a property of this one dependency, not a
    // reason to fail the whole request: it is reported inline as unresolved,
    // the same as "no eligible provider".
    let version_req = match &dependency.version_constraint {
        None => None,
        Some(raw) => match VersionReq::parse(raw) {
            Ok(req) => Some(req),
            Err(e) => {
                return Ok(Resolution::Unresolved {
                    ordinal: dependency.ordinal,
                    reason: format!("invalid version constraint {raw:?}: {e}"),
                })
            }
        },
    };

    let mut best: Option<Scored<'a>> = None;
    for candidate in candidates {
        if let Some(name) = &dependency.capability {
            if &candidate.capability.name != name {
                continue;
            }
        }
        if let Some(ns) = &dependency.namespace {
            if &candidate.agent.namespace != ns {
                continue;
            }
        }
        if let Some(req) = &version_req {
            if !version_satisfies(req, &candidate.capability.version) {
                continue;
            }
        }
        let Some(score) = score_tags(&candidate.capability.tags, &parsed) else {
            continue;
        };
        let scored = Scored { candidate, score };
        best = Some(match best {
            None => scored,
            Some(current) => {
                if better(&scored, &current) == std::cmp::Ordering::Greater {
                    scored
                } else {
                    current
                }
            }
        });
    }

    Ok(match best {
        Some(Scored { candidate, score }) => Resolution::Resolved {
            ordinal: dependency.ordinal,
            provider_agent_id: candidate.agent.id,
            provider_capability: candidate.capability.name.clone(),
            endpoint: candidate.agent.endpoint.clone(),
            version: candidate.capability.version.clone(),
            score,
            resolved_at: now,
        },
        None => Resolution::Unresolved {
            ordinal: dependency.ordinal,
            reason: "no eligible provider".to_string(),
        },
    })
}

fn version_satisfies(req: &VersionReq, version: &Version) -> bool {
    req.matches(version)
}

/// Exposed for endpoint construction in resolved responses without re-deriving it.
pub fn endpoint_of(agent: &Agent) -> Endpoint {
    agent.endpoint.clone()
}

/// Used by the Query API to name a provider's agent id directly.
pub fn provider_agent_id(resolution: &Resolution) -> Option<Uuid> {
    match resolution {
        Resolution::Resolved { provider_agent_id, .. } => Some(*provider_agent_id),
        Resolution::Unresolved { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::model::{AgentStatus, Capability as Cap};

    fn agent(name: &str, registered_at: chrono::DateTime<Utc>, version: &str, tags: &[&str]) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            namespace: "default".to_string(),
            version: Version::parse("1.0.0").unwrap(),
            endpoint: Endpoint {
                scheme: "http".into(),
                host: "127.0.0.1".into(),
                port: 9000,
            },
            capabilities: vec![Cap {
                name: "weather".into(),
                version: Version::parse(version).unwrap(),
                tags: tags.iter().map(|s| s.to_string()).collect(),
                description: None,
                schema: serde_json::Value::Null,
                dependencies: vec![],
            }],
            status: AgentStatus::Healthy,
            registered_at,
            last_heartbeat: registered_at,
        }
    }

    fn dependency(tags: &[&str]) -> DependencyDeclaration {
        DependencyDeclaration {
            ordinal: 0,
            capability: Some("weather".to_string()),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            version_constraint: None,
            namespace: None,
        }
    }

    #[test]
    fn test_scenario_required_and_preferred() {
        let t0 = Utc::now();
        let a = agent("A", t0, "1.0.0", &["api", "fast"]);
        let dep = dependency(&["api", "+fast", "-deprecated"]);
        let cand = Candidate {
            agent: &a,
            capability: &a.capabilities[0],
        };
        let res = resolve_dependency(&dep, vec![cand], t0).unwrap();
        match res {
            Resolution::Resolved { score, .. } => assert_eq!(score, 5 + 10),
            Resolution::Unresolved { .. } => panic!("expected resolution"),
        }
    }

    #[test]
    fn test_scenario_preferred_tiebreak() {
        let t0 = Utc::now();
        let c = agent("C", t0, "1.0.0", &["api", "fast"]);
        let d = agent("D", t0, "1.0.0", &["api", "fast", "premium"]);
        let dep = dependency(&["api", "+premium"]);
        let candidates = vec![
            Candidate { agent: &c, capability: &c.capabilities[0] },
            Candidate { agent: &d, capability: &d.capabilities[0] },
        ];
        let res = resolve_dependency(&dep, candidates, t0).unwrap();
        match res {
            Resolution::Resolved { provider_agent_id, score, .. } => {
                assert_eq!(provider_agent_id, d.id);
                assert_eq!(score, 5 + 10);
            }
            Resolution::Unresolved { .. } => panic!("expected resolution"),
        }
    }

    #[test]
    fn test_version_tiebreak() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(10);
        let p = agent("P", t1, "1.2.0", &["api"]);
        let q = agent("Q", t0, "1.1.9", &["api"]);
        let dep = dependency(&["api"]);
        let candidates = vec![
            Candidate { agent: &p, capability: &p.capabilities[0] },
            Candidate { agent: &q, capability: &q.capabilities[0] },
        ];
        let res = resolve_dependency(&dep, candidates, t0).unwrap();
        match res {
            Resolution::Resolved { provider_agent_id, .. } => assert_eq!(provider_agent_id, p.id),
            Resolution::Unresolved { .. } => panic!("expected resolution"),
        }
    }

    #[test]
    fn test_excluded_tag_rejects() {
        let t0 = Utc::now();
        let a = agent("A", t0, "1.0.0", &["api", "deprecated"]);
        let dep = dependency(&["api", "-deprecated"]);
        let cand = Candidate { agent: &a, capability: &a.capabilities[0] };
        let res = resolve_dependency(&dep, vec![cand], t0).unwrap();
        assert!(matches!(res, Resolution::Unresolved { reason, .. } if reason.contains("no eligible")));
    }

    #[test]
    fn test_empty_expression_matches_any() {
        let t0 = Utc::now();
        let a = agent("A", t0, "1.0.0", &[]);
        let dep = dependency(&[]);
        let cand = Candidate { agent: &a, capability: &a.capabilities[0] };
        let res = resolve_dependency(&dep, vec![cand], t0).unwrap();
        assert!(matches!(res, Resolution::Resolved { score: 0, .. }));
    }

    #[test]
    fn test_resolved_carries_resolution_timestamp() {
        let t0 = Utc::now();
        let a = agent("A", t0, "1.0.0", &["api"]);
        let dep = dependency(&["api"]);
        let cand = Candidate { agent: &a, capability: &a.capabilities[0] };
        let res = resolve_dependency(&dep, vec![cand], t0).unwrap();
        match res {
            Resolution::Resolved { resolved_at, .. } => assert_eq!(resolved_at, t0),
            Resolution::Unresolved { .. } => panic!("expected resolution"),
        }
    }

    #[test]
    fn test_bad_version_constraint_is_unresolved_not_error() {
        let t0 = Utc::now();
        let a = agent("A", t0, "1.0.0", &["api"]);
        let mut dep = dependency(&["api"]);
        dep.version_constraint = Some("not-a-version-req".to_string());
        let cand = Candidate { agent: &a, capability: &a.capabilities[0] };
        let res = resolve_dependency(&dep, vec![cand], t0).unwrap();
        assert!(matches!(res, Resolution::Unresolved { reason, .. } if reason.contains("invalid version constraint")));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let dep = dependency(&["*bad"]);
        let err = resolve_dependency(&dep, Vec::<Candidate<'_>>::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[test]
    fn test_or_group_matches_either_alternative() {
        let t0 = Utc::now();
        let a = agent("A", t0, "1.0.0", &["beta"]);
        let dep = dependency(&["(alpha|beta)"]);
        let cand = Candidate { agent: &a, capability: &a.capabilities[0] };
        let res = resolve_dependency(&dep, vec![cand], t0).unwrap();
        assert!(matches!(res, Resolution::Resolved { score: 5, .. }));
    }
}
