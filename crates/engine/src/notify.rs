// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification fan-out (spec §4.9). Email delivery is an explicitly
//! out-of-scope external collaborator (spec §1); `SmtpSink` is the seam a
//! real mailer would plug into.

use bya_core::{JobDefinition, ModelError, NotifySpec, Settings};
use bya_storage::{Build, BuildStatus};

/// Hands a composed email off to an SMTP collaborator. The default
/// implementation just logs — wiring a real sender means implementing
/// this trait, not touching the dispatch logic.
pub trait SmtpSink: Send + Sync {
    fn send(&self, to: &[String], from: &str, subject: &str, body: &str) -> Result<(), ModelError>;
}

pub struct LoggingSmtpSink;

impl SmtpSink for LoggingSmtpSink {
    fn send(&self, to: &[String], from: &str, subject: &str, body: &str) -> Result<(), ModelError> {
        tracing::info!(?to, from, subject, body, "email notification (no SMTP sink configured)");
        Ok(())
    }
}

pub struct EmailNotifier<'a> {
    pub sink: &'a dyn SmtpSink,
    pub from: &'a str,
}

impl<'a> EmailNotifier<'a> {
    pub fn notify(
        &self,
        spec: &NotifySpec,
        job: &JobDefinition,
        flat_job_name: &str,
        build_num: u64,
        status: &str,
        summary: &str,
    ) -> Result<(), ModelError> {
        let subject = format!("BYA Build: {} #{build_num}: {status}", job.name);
        let body = format!("builds/{flat_job_name}/{build_num}\n\n{summary}");
        self.sink.send(&spec.users, self.from, &subject, &body)
    }
}

/// Fire every registered `email` notifier for a build that just became
/// terminal (spec §4.3: "whose only_failures flag is false OR where
/// finalStatus != Completed"). A no-op unless `newly_terminal` is set,
/// preserving the one-shot property the status-file-existence check gives.
pub fn maybe_fire(
    settings: &Settings,
    job: &JobDefinition,
    flat_job_name: &str,
    build: &Build,
    status: BuildStatus,
    newly_terminal: bool,
    sink: &dyn SmtpSink,
) -> Result<(), ModelError> {
    if !newly_terminal {
        return Ok(());
    }
    let status_str = status.to_string();
    let summary = build.read_summary().unwrap_or_default();
    for n in &job.notify {
        if n.kind != "email" {
            continue;
        }
        if !n.only_failures || status_str != "Completed" {
            EmailNotifier { sink, from: &settings.email_notify_from }
                .notify(n, job, flat_job_name, build.number(), &status_str, &summary)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bya_core::model::{ContainerSpec, RunSpec};
    use serde_json::Value;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    impl SmtpSink for RecordingSink {
        fn send(&self, to: &[String], _from: &str, subject: &str, _body: &str) -> Result<(), ModelError> {
            self.sent.lock().unwrap().push(format!("{}:{subject}", to.join(",")));
            Ok(())
        }
    }

    fn job(notify: Vec<NotifySpec>) -> JobDefinition {
        JobDefinition {
            name: "demo".into(),
            description: "d".into(),
            timeout: 10,
            script: "echo hi".into(),
            secrets: vec![],
            retention: None,
            containers: vec![ContainerSpec { image: "img".into(), host_tag: None }],
            params: vec![],
            triggers: vec![],
            notify,
        }
    }

    fn settings(dir: &tempfile::TempDir) -> Settings {
        let s = Settings::with_data_dir(dir.path());
        s.ensure_dirs().unwrap();
        s
    }

    #[test]
    fn fires_on_failure_even_when_only_failures_true() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let job = job(vec![NotifySpec { kind: "email".into(), only_failures: true, users: vec!["a@b.com".into()] }]);
        let run = RunSpec { name: "r1".into(), container: "img".into(), params: Default::default() };
        let build = Build::create(&settings, &job, "demo", vec![run], Value::Null).unwrap();
        for r in build.list_runs().unwrap() {
            r.set_status(bya_core::RunStatus::Running).unwrap();
            r.set_status(bya_core::RunStatus::Failed).unwrap();
        }
        let (status, newly_terminal) = build.status().unwrap();
        let sink = RecordingSink::default();
        maybe_fire(&settings, &job, "demo", &build, status, newly_terminal, &sink).unwrap();
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn skips_success_when_only_failures_true() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let job = job(vec![NotifySpec { kind: "email".into(), only_failures: true, users: vec!["a@b.com".into()] }]);
        let run = RunSpec { name: "r1".into(), container: "img".into(), params: Default::default() };
        let build = Build::create(&settings, &job, "demo", vec![run], Value::Null).unwrap();
        for r in build.list_runs().unwrap() {
            r.set_status(bya_core::RunStatus::Running).unwrap();
            r.set_status(bya_core::RunStatus::Passed).unwrap();
        }
        let (status, newly_terminal) = build.status().unwrap();
        let sink = RecordingSink::default();
        maybe_fire(&settings, &job, "demo", &build, status, newly_terminal, &sink).unwrap();
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn does_not_refire_on_already_terminal_read() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let job = job(vec![NotifySpec { kind: "email".into(), only_failures: false, users: vec!["a@b.com".into()] }]);
        let run = RunSpec { name: "r1".into(), container: "img".into(), params: Default::default() };
        let build = Build::create(&settings, &job, "demo", vec![run], Value::Null).unwrap();
        for r in build.list_runs().unwrap() {
            r.set_status(bya_core::RunStatus::Running).unwrap();
            r.set_status(bya_core::RunStatus::Passed).unwrap();
        }
        let (status, _) = build.status().unwrap();
        let (_, newly_terminal_second_read) = build.status().unwrap();
        let sink = RecordingSink::default();
        maybe_fire(&settings, &job, "demo", &build, status, newly_terminal_second_read, &sink).unwrap();
        assert!(sink.sent.lock().unwrap().is_empty());
    }
}
