// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The HTTP API router and handlers (spec §6, §4.5).

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use bya_core::{ModelError, RunStatus};
use bya_storage::{Build, Host, Run, RunQueue};

use crate::auth::token_from_headers;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/host/", get(list_hosts).post(create_host))
        .route("/api/v1/host/:name/", get(checkin_host).patch(patch_host).delete(delete_host))
        .route("/api/v1/build/:bname/:bnum/:run", post(post_run_update))
        .route("/api/v1/worker-script", get(worker_script))
        .with_state(state)
}

/// Serves the canonical worker/runner script bytes (spec §9's self-upgrade
/// artifact). Its mtime is the same value reported as `worker_version` in
/// `checkin_host`, so a worker re-downloads exactly when that value moves.
async fn worker_script(State(state): State<AppState>) -> Result<Bytes, ApiError> {
    let bytes = std::fs::read(bya_core::runner_script_path(&state.settings.data_dir))
        .map_err(|e| ModelError::not_found(format!("no worker script available: {e}")))?;
    Ok(Bytes::from(bytes))
}

async fn list_hosts(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(Host::list(&state.settings)?))
}

async fn create_host(State(state): State<AppState>, Json(mut body): Json<Value>) -> Result<impl IntoResponse, ApiError> {
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ModelError::validation("missing \"name\""))?;
    if let Some(obj) = body.as_object_mut() {
        obj.remove("name");
    }
    let host = Host::create(&state.settings, &name, body)?;
    let props = host.props()?;
    let location = format!("/api/v1/host/{name}/");
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(props)))
}

#[derive(Debug, Deserialize)]
struct CheckinQuery {
    available_runners: Option<i64>,
}

/// `GET /api/v1/host/<name>/?available_runners=k` (spec §4.5): heartbeat +
/// at most one dispatched run per check-in.
async fn checkin_host(
    Path(name): Path<String>,
    Query(q): Query<CheckinQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let host = Host::get(&state.settings, &name)?;
    let props = host.props()?;
    let authenticated = token_from_headers(&headers).as_deref() == Some(props.api_key.as_str());
    if authenticated {
        host.ping()?;
    }

    let mut body = serde_json::to_value(&props)?;
    if let Some(obj) = body.as_object_mut() {
        obj.remove("api_key");
        obj.insert("worker_version".into(), json!(bya_engine::worker_version(&state.settings.data_dir)));
    }

    let available = q.available_runners.unwrap_or(0);
    if authenticated && available > 0 {
        let tags = props.host_tags();
        let queue = RunQueue::new(&state.settings);
        if let Some(run) = queue.take(&name, &tags)? {
            let run_obj = dispatched_run_payload(&state, &run)?;
            if let Some(obj) = body.as_object_mut() {
                obj.insert("runs".into(), json!([run_obj]));
            }
        }
    }
    Ok(Json(body))
}

/// Build the response object for one dispatched run: its public props plus
/// the embedded execution recipe (spec §4.6).
fn dispatched_run_payload(state: &AppState, run: &Run) -> Result<Value, ModelError> {
    let record = run.record()?;
    let (build, flat_name) = Build::locate(run.path())?;
    let job = bya_storage::jobstore::find_by_flat_name(&state.settings, &flat_name)?;
    let trigger_data = build.trigger_data()?;
    let descriptor =
        bya_engine::assemble_runner(&state.settings, &job, &flat_name, build.number(), &run.name(), &record, &trigger_data)?;

    let mut run_obj = serde_json::to_value(&record)?;
    if let Some(obj) = run_obj.as_object_mut() {
        obj.insert("name".into(), json!(run.name()));
        obj.insert("stdin".into(), json!(descriptor.stdin));
        obj.insert("args".into(), json!(descriptor.args));
        obj.insert("runner".into(), json!(descriptor.runner));
        obj.insert("secrets".into(), json!(descriptor.secrets));
    }
    Ok(run_obj)
}

async fn patch_host(
    Path(name): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(overrides): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let host = Host::get(&state.settings, &name)?;
    let props = host.props()?;
    require_matching_token(&headers, &props.api_key)?;
    if overrides.get("enlisted").is_some() {
        return Err(ModelError::forbidden("\"enlisted\" cannot be set via the API").into());
    }
    let updated = host.update(overrides)?;
    let mut body = serde_json::to_value(&updated)?;
    if let Some(obj) = body.as_object_mut() {
        obj.remove("api_key");
    }
    Ok(Json(body))
}

async fn delete_host(
    Path(name): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let host = Host::get(&state.settings, &name)?;
    require_matching_token(&headers, &host.props()?.api_key)?;
    host.delete()?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/build/<bname>/<bnum>/<run>` (spec §4.5): append log data,
/// optionally update status via `X-BYA-STATUS`.
async fn post_run_update(
    Path((bname, bnum, run_name)): Path<(String, u64, String)>,
    headers: HeaderMap,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let build_dir = Build::job_builds_dir(&state.settings, &bname).join(bnum.to_string());
    let run = Run::open(build_dir.join("runs").join(&run_name));
    if !run.path().exists() {
        return Err(ModelError::not_found(format!("Run({bname}/{bnum}/{run_name}) does not exist")).into());
    }
    let record = run.record()?;
    require_matching_token(&headers, &record.api_key)?;
    if record.status.is_terminal() {
        return Err(ModelError::unauthorized("run is already terminal").into());
    }

    run.append_log(&String::from_utf8_lossy(&body))?;

    if let Some(status_header) = headers.get("X-BYA-STATUS") {
        let status_str =
            status_header.to_str().map_err(|_| ModelError::validation("bad X-BYA-STATUS header"))?;
        let writable: Vec<String> =
            RunStatus::CHOICES.iter().filter(|s| **s != RunStatus::Unknown).map(|s| s.to_string()).collect();
        let writable_refs: Vec<&str> = writable.iter().map(String::as_str).collect();
        bya_core::props::validate_choice("X-BYA-STATUS", status_str, &writable_refs)?;
        let new_status: RunStatus = serde_json::from_value(json!(status_str))
            .map_err(|_| ModelError::validation(format!("Unknown status: {status_str}")))?;
        run.set_status(new_status)?;

        if new_status.is_terminal() {
            RunQueue::new(&state.settings).complete(&run, new_status)?;
            let (build, flat_name) = Build::locate(run.path())?;
            let (build_status, newly_terminal) = build.status()?;
            if newly_terminal {
                let job = bya_storage::jobstore::find_by_flat_name(&state.settings, &flat_name)?;
                bya_engine::maybe_fire(
                    &state.settings,
                    &job,
                    &flat_name,
                    &build,
                    build_status,
                    newly_terminal,
                    state.notifier.as_ref(),
                )?;
            }
        }
    }
    Ok(StatusCode::OK)
}

fn require_matching_token(headers: &HeaderMap, expected: &str) -> Result<(), ModelError> {
    match token_from_headers(headers) {
        Some(token) if token == expected => Ok(()),
        _ => Err(ModelError::unauthorized("missing or invalid token")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use bya_core::model::RunSpec;
    use bya_core::JobDefinition;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn settings(dir: &tempfile::TempDir) -> bya_core::Settings {
        let s = bya_core::Settings::with_data_dir(dir.path());
        s.ensure_dirs().unwrap();
        s
    }

    fn write_job(settings: &bya_core::Settings, name: &str) {
        std::fs::write(
            settings.jobs_dir().join(format!("{name}.yml")),
            "description: d\ntimeout: 5\nscript: echo hi\ncontainers:\n  - {image: img, host_tag: tag}\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn create_then_list_hosts() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let app = router(AppState::new(settings));

        let body = json!({"name": "h1", "api_key": "key1", "distro": "d", "mem_total": 1, "cpu_total": 1, "cpu_type": "x86", "concurrent_runs": 1, "host_tags": "tag"});
        let resp = app
            .clone()
            .oneshot(
                Request::post("/api/v1/host/")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app.oneshot(Request::get("/api/v1/host/").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let names: Vec<String> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(names, vec!["h1"]);
    }

    /// S4 from spec §8: token auth on run update.
    #[tokio::test]
    async fn s4_token_auth_on_run_update() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        write_job(&settings, "demo");
        let job: JobDefinition = serde_yaml::from_str(
            "description: d\ntimeout: 5\nscript: echo hi\ncontainers:\n  - {image: img, host_tag: tag}\n",
        )
        .unwrap();
        let run = RunSpec { name: "r1".into(), container: "img".into(), params: Default::default() };
        let build = Build::create(&settings, &job, "demo", vec![run], Value::Null).unwrap();
        let run_handle = &build.list_runs().unwrap()[0];
        let api_key = run_handle.record().unwrap().api_key;

        let app = router(AppState::new(settings.clone()));
        let uri = format!("/api/v1/build/demo/{}/r1", build.number());

        let resp = app
            .clone()
            .oneshot(
                Request::post(&uri)
                    .header("Authorization", format!("Token {api_key}"))
                    .body(Body::from("logmessage1"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(run_handle.read_log().unwrap(), "logmessage1");

        let resp = app
            .clone()
            .oneshot(
                Request::post(&uri)
                    .header("Authorization", "Token badkey")
                    .body(Body::from("nope"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        run_handle.set_status(RunStatus::Running).unwrap();
        run_handle.set_status(RunStatus::Passed).unwrap();

        let resp = app
            .oneshot(
                Request::post(&uri)
                    .header("Authorization", format!("Token {api_key}"))
                    .body(Body::from("after terminal"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn worker_script_serves_runner_script_bytes() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        std::fs::write(bya_core::runner_script_path(&settings.data_dir), b"#!/bin/sh\necho run\n").unwrap();
        let app = router(AppState::new(settings));

        let resp = app.oneshot(Request::get("/api/v1/worker-script").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"#!/bin/sh\necho run\n");
    }

    #[tokio::test]
    async fn checkin_reports_worker_version_matching_runner_script_mtime() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        bya_storage::Host::create(
            &settings,
            "h1",
            json!({"distro":"d","mem_total":1,"cpu_total":1,"cpu_type":"x86","api_key":"k1","concurrent_runs":1,"host_tags":"tag"}),
        )
        .unwrap();
        let app = router(AppState::new(settings.clone()));

        let resp = app
            .oneshot(Request::get("/api/v1/host/h1/").header("Authorization", "Token k1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["worker_version"], json!(bya_engine::worker_version(&settings.data_dir)));
    }

    #[tokio::test]
    async fn post_run_update_rejects_unrecognized_status() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        write_job(&settings, "demo");
        let job: JobDefinition = serde_yaml::from_str(
            "description: d\ntimeout: 5\nscript: echo hi\ncontainers:\n  - {image: img, host_tag: tag}\n",
        )
        .unwrap();
        let run = RunSpec { name: "r1".into(), container: "img".into(), params: Default::default() };
        let build = Build::create(&settings, &job, "demo", vec![run], Value::Null).unwrap();
        let run_handle = &build.list_runs().unwrap()[0];
        let api_key = run_handle.record().unwrap().api_key;

        let app = router(AppState::new(settings.clone()));
        let uri = format!("/api/v1/build/demo/{}/r1", build.number());

        let resp = app
            .oneshot(
                Request::post(&uri)
                    .header("Authorization", format!("Token {api_key}"))
                    .header("X-BYA-STATUS", "BOGUS")
                    .body(Body::from("x"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn patch_rejects_enlisted_field() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir);
        let host = Host::create(&settings, "h1", json!({"distro":"d","mem_total":1,"cpu_total":1,"cpu_type":"x86","api_key":"k1","concurrent_runs":1,"host_tags":"tag"})).unwrap();
        let app = router(AppState::new(settings));

        let resp = app
            .oneshot(
                Request::patch("/api/v1/host/h1/")
                    .header("Authorization", "Token k1")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"enlisted": true}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let _ = host;
    }
}
