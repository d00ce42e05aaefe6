// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity shapes shared across the workspace (spec §3). Loading/saving
//! these lives in `bya-storage`; this module only owns the data and its
//! validation rules (spec §9: "static schema" replacing the source's
//! runtime property descriptors).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;

/// One entry of a `JobDefinition`'s `containers` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_tag: Option<String>,
}

/// One entry of a `JobDefinition`'s `params` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defval: Option<Value>,
}

/// A declared trigger on a `JobDefinition`. Only `type: git` is built in
/// (spec §4.7); unknown types fail validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub http_url: Option<String>,
    #[serde(default)]
    pub refs: Vec<String>,
    pub runs: Vec<RunSpec>,
}

/// One requested run within a `create_build` call or a trigger's `runs` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub name: String,
    pub container: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

/// A registered notifier on a `JobDefinition` (spec §4.9). Only `type:
/// email` is built in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifySpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub only_failures: bool,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionUnit {
    Days,
    Builds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    pub unit: RetentionUnit,
    pub value: u64,
}

/// The immutable, externally-authored job definition (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub description: String,
    pub timeout: u32,
    pub script: String,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub retention: Option<Retention>,
    pub containers: Vec<ContainerSpec>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
    #[serde(default)]
    pub notify: Vec<NotifySpec>,
}

impl JobDefinition {
    /// Validate the job definition itself (name invariant + containers/params shape).
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.contains('#') {
            return Err(ModelError::validation(format!(
                "Illegal job name({}). Must not contain #",
                self.name
            )));
        }
        if self.containers.is_empty() {
            return Err(ModelError::validation("containers must be a non-empty list"));
        }
        for c in &self.containers {
            if c.image.is_empty() {
                return Err(ModelError::validation(format!(
                    "Container({c:?}) must include an \"image\" attribute"
                )));
            }
        }
        for t in &self.triggers {
            if t.kind != "git" {
                return Err(ModelError::validation(format!("Trigger({}) does not exist", t.kind)));
            }
            if t.http_url.is_none() {
                return Err(ModelError::validation(
                    "GitTrigger must include an \"http_url\" attribute",
                ));
            }
            if t.refs.is_empty() {
                return Err(ModelError::validation(
                    "GitTrigger must include a non-empty list \"refs\"",
                ));
            }
            for r in &t.refs {
                if !r.starts_with("refs/") {
                    return Err(ModelError::validation("GitTrigger refs must start with \"refs/\""));
                }
            }
            if t.runs.is_empty() {
                return Err(ModelError::validation("Trigger must include a list of \"runs\""));
            }
        }
        for n in &self.notify {
            if n.kind != "email" {
                return Err(ModelError::validation(format!("Notify({}) does not exist", n.kind)));
            }
            if n.users.is_empty() {
                return Err(ModelError::validation(
                    "EmailNotify must include a \"users\" attribute",
                ));
            }
        }
        Ok(())
    }

    /// Resolve the host tag for an image (first matching container), per
    /// spec §4.2: "resolve host_tag from the job's container list
    /// (fallback `*`)".
    pub fn host_tag_for(&self, container_image: &str) -> Result<String, ModelError> {
        for c in &self.containers {
            if c.image == container_image {
                return Ok(c.host_tag.clone().unwrap_or_else(|| "*".to_string()));
            }
        }
        Err(ModelError::validation(format!("Unknown container: {container_image}")))
    }

    /// Validate + fill-in-defaults for a batch of requested runs (spec
    /// §4.2/§3's `JobDefinition._validate_runs`/`_validate_run`).
    pub fn validate_runs(&self, mut runs: Vec<RunSpec>) -> Result<Vec<RunSpec>, ModelError> {
        if runs.is_empty() {
            return Err(ModelError::validation("runs must be a non-empty list"));
        }
        let valid_containers: Vec<&str> = self.containers.iter().map(|c| c.image.as_str()).collect();
        let mut errors = Vec::new();
        for run in &mut runs {
            if !valid_containers.contains(&run.container.as_str()) {
                errors.push(format!(
                    "Container({}) invalid. Must be one of: {:?}",
                    run.container, valid_containers
                ));
            }
            match self.validate_params(run.params.clone()) {
                Ok(filled) => run.params = filled,
                Err(e) => errors.push(e.message),
            }
        }
        if !errors.is_empty() {
            return Err(ModelError::validation(errors.join("\n")));
        }
        Ok(runs)
    }

    fn validate_params(
        &self,
        mut params: HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, ModelError> {
        let mut errors = Vec::new();
        let required: HashMap<&str, &ParamSpec> =
            self.params.iter().map(|p| (p.name.as_str(), p)).collect();

        for (name, spec) in &required {
            if !params.contains_key(*name) {
                if let Some(defval) = &spec.defval {
                    params.insert(name.to_string(), defval.clone());
                } else {
                    errors.push(format!("Missing required parameter: {name}"));
                }
            }
        }
        for name in params.keys() {
            if !required.contains_key(name.as_str()) {
                errors.push(format!("Unknown parameter: {name}"));
            }
        }
        for (name, val) in &params {
            if let Some(spec) = required.get(name.as_str()) {
                if let Some(choices) = &spec.choices {
                    let val_str = val.as_str().map(str::to_string).unwrap_or_else(|| val.to_string());
                    if !choices.iter().any(|c| c == &val_str) {
                        errors.push(format!("Invalid value for {name}. Must be one of: {choices:?}"));
                    }
                }
            }
        }
        if !errors.is_empty() {
            return Err(ModelError::validation(errors.join("\n")));
        }
        Ok(params)
    }
}

/// Public (non-secret) properties of a `Host` (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostProps {
    pub distro: String,
    pub mem_total: u64,
    pub cpu_total: u32,
    pub cpu_type: String,
    #[serde(default)]
    pub enlisted: bool,
    pub api_key: String,
    #[serde(default)]
    pub concurrent_runs: u32,
    #[serde(default)]
    pub host_tags: String,
}

impl HostProps {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.api_key.is_empty() {
            return Err(ModelError::validation("Missing required attribute: \"api_key\""));
        }
        Ok(())
    }

    pub fn host_tags(&self) -> Vec<&str> {
        self.host_tags.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
    }
}

/// Lifecycle status of a `Run` (spec §3). `Unknown` is a read-time
/// fallback only, never persisted (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Unknown,
    Queued,
    Running,
    Passed,
    Failed,
}

impl RunStatus {
    pub const CHOICES: [RunStatus; 5] =
        [RunStatus::Unknown, RunStatus::Queued, RunStatus::Running, RunStatus::Passed, RunStatus::Failed];

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Passed | RunStatus::Failed)
    }

    /// Enforce the `QUEUED -> RUNNING -> {PASSED, FAILED}` transition table
    /// (spec §4.3). `Unknown` is never a valid target for a write.
    pub fn validate_transition(from: RunStatus, to: RunStatus) -> Result<(), ModelError> {
        let ok = matches!(
            (from, to),
            (RunStatus::Queued, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Passed)
                | (RunStatus::Running, RunStatus::Failed)
                | (RunStatus::Queued, RunStatus::Passed)
                | (RunStatus::Queued, RunStatus::Failed)
        );
        if ok {
            Ok(())
        } else {
            Err(ModelError::validation(format!("Invalid status transition {from:?} -> {to:?}")))
        }
    }
}

crate::simple_display! {
    RunStatus {
        Unknown => "UNKNOWN",
        Queued => "QUEUED",
        Running => "RUNNING",
        Passed => "PASSED",
        Failed => "FAILED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn job(containers: Vec<ContainerSpec>) -> JobDefinition {
        JobDefinition {
            name: "demo".into(),
            description: "d".into(),
            timeout: 10,
            script: "echo hi".into(),
            secrets: vec![],
            retention: None,
            containers,
            params: vec![],
            triggers: vec![],
            notify: vec![],
        }
    }

    #[test]
    fn rejects_hash_in_name() {
        let mut j = job(vec![ContainerSpec { image: "img".into(), host_tag: None }]);
        j.name = "a#b".into();
        assert_eq!(j.validate().unwrap_err().status_code, 400);
    }

    #[test]
    fn host_tag_falls_back_to_wildcard() {
        let j = job(vec![ContainerSpec { image: "img".into(), host_tag: None }]);
        assert_eq!(j.host_tag_for("img").unwrap(), "*");
    }

    #[test]
    fn host_tag_uses_declared_value() {
        let j = job(vec![ContainerSpec { image: "img".into(), host_tag: Some("gpu".into()) }]);
        assert_eq!(j.host_tag_for("img").unwrap(), "gpu");
    }

    #[test]
    fn host_tag_unknown_container_errors() {
        let j = job(vec![ContainerSpec { image: "img".into(), host_tag: None }]);
        assert!(j.host_tag_for("missing").is_err());
    }

    #[parameterized(
        queued_to_running = {RunStatus::Queued, RunStatus::Running, true},
        running_to_passed = {RunStatus::Running, RunStatus::Passed, true},
        running_to_failed = {RunStatus::Running, RunStatus::Failed, true},
        passed_to_running = {RunStatus::Passed, RunStatus::Running, false},
        queued_to_unknown = {RunStatus::Queued, RunStatus::Unknown, false},
    )]
    fn status_transitions(from: RunStatus, to: RunStatus, expect_ok: bool) {
        assert_eq!(RunStatus::validate_transition(from, to).is_ok(), expect_ok);
    }

    #[test]
    fn validate_runs_fills_default_params_and_rejects_unknown() {
        let mut j = job(vec![ContainerSpec { image: "img".into(), host_tag: None }]);
        j.params = vec![ParamSpec {
            name: "env".into(),
            choices: Some(vec!["dev".into(), "prod".into()]),
            defval: Some(Value::String("dev".into())),
        }];
        let runs = vec![RunSpec { name: "r1".into(), container: "img".into(), params: HashMap::new() }];
        let filled = j.validate_runs(runs).unwrap();
        assert_eq!(filled[0].params.get("env").unwrap(), "dev");

        let mut params = HashMap::new();
        params.insert("bogus".to_string(), Value::String("x".into()));
        let bad = vec![RunSpec { name: "r1".into(), container: "img".into(), params }];
        assert!(j.validate_runs(bad).is_err());
    }
}
