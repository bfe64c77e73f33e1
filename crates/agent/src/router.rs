// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatch: `method + path` routing over the service surface.
//! Exact matches first, then parameterized paths. Every handler failure
//! becomes a `{error}` response body; the event loop never crashes on a
//! handler.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use fortynine_proto::messages::Message;
use fortynine_proto::rest::{split_query, RestRequest, RestResponse};

use crate::error::ErrorCode;
use crate::services::{files, git, issues, repos, Services};
use crate::state_dir::home_dir;
use crate::transport::Outbound;

/// Pane route segments served by the generic CRUD handlers.
const PANE_KINDS: &[&str] =
    &["file-panes", "notes", "git-graphs", "iframes", "folder-panes", "beads-panes"];

/// Per-request context: the transport handle and the correlation id.
pub struct RequestContext {
    pub outbound: Outbound,
    pub id: Option<String>,
}

impl RequestContext {
    /// Emit a `scan:partial` tied to this request. Partials precede the
    /// final response and never follow it.
    pub fn partial(&self, value: serde_json::Value) -> bool {
        match &self.id {
            Some(id) => self.outbound.send_with_id(Message::ScanPartial(value), id),
            None => false,
        }
    }
}

/// Dispatch a request and always produce exactly one response.
pub async fn dispatch(
    services: &Arc<Services>,
    req: &RestRequest,
    ctx: &RequestContext,
) -> RestResponse {
    let (route, query) = split_query(&req.path);
    let method = req.method.to_ascii_uppercase();
    let body = req.body.clone().unwrap_or(serde_json::Value::Null);

    match handle(services, &method, route, &query, &body, ctx).await {
        Ok(response) => response,
        Err(e) => {
            debug!(method = %method, route, err = %e, "handler error");
            ErrorCode::Internal.response(e.to_string())
        }
    }
}

async fn handle(
    services: &Arc<Services>,
    method: &str,
    route: &str,
    query: &HashMap<String, String>,
    body: &serde_json::Value,
    ctx: &RequestContext,
) -> anyhow::Result<RestResponse> {
    // Exact-match routes first.
    match (method, route) {
        // -- Terminals -----------------------------------------------------
        ("GET", "/api/terminals") => {
            let terminals = services.terminals.list().await;
            return Ok(RestResponse::ok(serde_json::json!({ "terminals": terminals })));
        }
        ("POST", "/api/terminals") => {
            let working_dir = body_str(body, "workingDir").unwrap_or("~");
            return match services.terminals.create(working_dir).await {
                Ok(record) => Ok(RestResponse::ok(serde_json::to_value(record)?)),
                Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
            };
        }
        ("POST", "/api/terminals/resume") => {
            let Some(id) = body_str(body, "terminalId") else {
                return Ok(ErrorCode::BadRequest.response("terminalId is required"));
            };
            let working_dir = body_str(body, "workingDir");
            return match services.terminals.resume(id, working_dir).await {
                Ok(record) => Ok(RestResponse::ok(serde_json::to_value(record)?)),
                Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
            };
        }
        ("GET", "/api/terminals/processes") => {
            let panes = services.tmux.list_panes().await.unwrap_or_default();
            let processes: Vec<serde_json::Value> = panes
                .iter()
                .filter_map(|p| {
                    let id = crate::terminal::tmux::terminal_id(&p.session_name)?;
                    Some(serde_json::json!({
                        "terminalId": id,
                        "command": p.current_command,
                        "cwd": p.current_path,
                        "pid": p.pane_pid,
                    }))
                })
                .collect();
            return Ok(RestResponse::ok(serde_json::json!({ "processes": processes })));
        }
        ("GET", "/api/terminals/states") => {
            let states = services.claude_states.read().await.clone();
            return Ok(RestResponse::ok(serde_json::to_value(states)?));
        }

        // -- Files ---------------------------------------------------------
        ("GET", "/api/files/browse") => {
            let Some(path) = query.get("path") else {
                return Ok(ErrorCode::BadRequest.response("path is required"));
            };
            let show_hidden = query.get("showHidden").map(|v| v == "true").unwrap_or(false);
            return match files::browse(path, show_hidden).await {
                Ok(entries) => {
                    Ok(RestResponse::ok(serde_json::json!({ "entries": entries })))
                }
                Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
            };
        }
        ("GET", "/api/files/read") => {
            let Some(path) = query.get("path") else {
                return Ok(ErrorCode::BadRequest.response("path is required"));
            };
            return match files::read_file(path).await {
                Ok(content) => Ok(RestResponse::ok(
                    serde_json::json!({ "path": path, "content": content }),
                )),
                Err(e) => Ok(ErrorCode::NotFound.response(e.to_string())),
            };
        }
        ("POST", "/api/files/create") => {
            return file_mutation(body_str(body, "path"), files::create_file).await;
        }
        ("POST", "/api/files/mkdir") => {
            return file_mutation(body_str(body, "path"), files::mkdir).await;
        }
        ("POST", "/api/files/rename") => {
            let (Some(path), Some(new_path)) =
                (body_str(body, "path"), body_str(body, "newPath"))
            else {
                return Ok(ErrorCode::BadRequest.response("path and newPath are required"));
            };
            return match files::rename(path, new_path).await {
                Ok(()) => Ok(RestResponse::ok(serde_json::json!({ "ok": true }))),
                Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
            };
        }
        ("DELETE", "/api/files/delete") => {
            let path = query
                .get("path")
                .map(String::as_str)
                .or_else(|| body_str(body, "path"));
            return file_mutation(path, files::delete).await;
        }

        // -- Repo discovery ------------------------------------------------
        ("GET", "/api/git-repos") => {
            let roots = repos::default_roots(&home_dir()?);
            return Ok(scan_repos(&roots, ctx).await);
        }
        ("GET", "/api/git-repos/in-folder") => {
            let Some(path) = query.get("path") else {
                return Ok(ErrorCode::BadRequest.response("path is required"));
            };
            let root = match files::expand_path(path) {
                Ok(p) => p,
                Err(e) => return Ok(ErrorCode::BadRequest.response(e.to_string())),
            };
            return Ok(scan_repos(&[root], ctx).await);
        }

        // -- Host ----------------------------------------------------------
        ("GET", "/api/metrics") => {
            let report = services.metrics.lock().await.collect().await;
            return Ok(RestResponse::ok(serde_json::to_value(report)?));
        }
        ("GET", "/api/devices") => {
            let config = &services.config;
            return Ok(RestResponse::ok(serde_json::json!({
                "devices": [{
                    "hostname": config.hostname,
                    "os": config.os,
                    "version": config.version,
                }]
            })));
        }
        ("GET", "/api/git-status") => {
            let Some(path) = query.get("path") else {
                return Ok(ErrorCode::BadRequest.response("path is required"));
            };
            let repo = match files::expand_path(path) {
                Ok(p) => p,
                Err(e) => return Ok(ErrorCode::BadRequest.response(e.to_string())),
            };
            return match git::status_summary(&repo).await {
                Ok(summary) => Ok(RestResponse::ok(serde_json::to_value(summary)?)),
                Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
            };
        }
        _ => {}
    }

    // Parameterized routes.
    if let ("DELETE", Some(id)) = (method, path_param(route, "/api/terminals/", "")) {
        return match services.terminals.remove(id).await? {
            true => Ok(RestResponse::ok(serde_json::json!({ "ok": true }))),
            false => Ok(ErrorCode::NotFound.response("unknown terminal")),
        };
    }

    if let Some(id) = path_param(route, "/api/git-graphs/", "/data") {
        if method == "GET" {
            return git_graph_data(services, id, query).await;
        }
    }
    if let Some(id) = path_param(route, "/api/git-graphs/", "/push") {
        if method == "POST" {
            return git_graph_push(services, id).await;
        }
    }

    if let Some(id) = path_param(route, "/api/beads-panes/", "/issues") {
        match method {
            "GET" => return beads_issues_list(services, id).await,
            "POST" => return beads_issues_create(services, id, body).await,
            _ => {}
        }
    }
    if let Some(id) = path_param(route, "/api/beads-panes/", "/issues/close") {
        if method == "POST" {
            return beads_issues_close(services, id, body).await;
        }
    }

    // Generic pane CRUD.
    for kind in PANE_KINDS {
        let collection = format!("/api/{kind}");
        if route == collection {
            return pane_collection(services, kind, method, body).await;
        }
        if let Some(id) = path_param(route, &format!("{collection}/"), "") {
            return pane_item(services, kind, method, id, body).await;
        }
    }

    Ok(ErrorCode::NotFound.response(format!("no route for {method} {route}")))
}

// -- Helpers -------------------------------------------------------------

fn body_str<'a>(body: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(|v| v.as_str())
}

/// Match `prefix<id>suffix` where `<id>` is a single path segment.
fn path_param<'a>(route: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    let rest = route.strip_prefix(prefix)?;
    let id = rest.strip_suffix(suffix)?;
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id)
}

async fn file_mutation<'a, F, Fut>(path: Option<&'a str>, op: F) -> anyhow::Result<RestResponse>
where
    F: FnOnce(&'a str) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<()>>,
{
    let Some(path) = path else {
        return Ok(ErrorCode::BadRequest.response("path is required"));
    };
    match op(path).await {
        Ok(()) => Ok(RestResponse::ok(serde_json::json!({ "ok": true }))),
        Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
    }
}

/// Run a repository scan, streaming each hit as a partial before the final
/// aggregated response.
async fn scan_repos(roots: &[PathBuf], ctx: &RequestContext) -> RestResponse {
    let found = repos::scan(roots, |record| {
        if let Ok(value) = serde_json::to_value(record) {
            ctx.partial(value);
        }
    })
    .await;
    match serde_json::to_value(&found) {
        Ok(value) => RestResponse::ok(serde_json::json!({ "repos": value })),
        Err(e) => ErrorCode::Internal.response(e.to_string()),
    }
}

async fn git_graph_data(
    services: &Arc<Services>,
    id: &str,
    query: &HashMap<String, String>,
) -> anyhow::Result<RestResponse> {
    let Some(pane) = services.panes.git_graphs.get(id).await else {
        return Ok(ErrorCode::NotFound.response("unknown git graph"));
    };
    let Some(path) = pane.get("path").and_then(|v| v.as_str()) else {
        return Ok(ErrorCode::BadRequest.response("git graph has no path"));
    };
    let max = query
        .get("maxCommits")
        .and_then(|v| v.parse().ok())
        .unwrap_or(git::DEFAULT_MAX_COMMITS);
    let repo = files::expand_path(path)?;
    match git::graph_data(&repo, max).await {
        Ok(data) => Ok(RestResponse::ok(serde_json::to_value(data)?)),
        Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
    }
}

async fn git_graph_push(services: &Arc<Services>, id: &str) -> anyhow::Result<RestResponse> {
    let Some(pane) = services.panes.git_graphs.get(id).await else {
        return Ok(ErrorCode::NotFound.response("unknown git graph"));
    };
    let Some(path) = pane.get("path").and_then(|v| v.as_str()) else {
        return Ok(ErrorCode::BadRequest.response("git graph has no path"));
    };
    let repo = files::expand_path(path)?;
    match git::push(&repo).await {
        Ok(message) => Ok(RestResponse::ok(serde_json::json!({ "ok": true, "message": message }))),
        Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
    }
}

async fn beads_pane_dir(
    services: &Arc<Services>,
    id: &str,
) -> anyhow::Result<Result<PathBuf, RestResponse>> {
    let Some(pane) = services.panes.beads_panes.get(id).await else {
        return Ok(Err(ErrorCode::NotFound.response("unknown beads pane")));
    };
    let path = pane.get("path").and_then(|v| v.as_str()).unwrap_or("~");
    Ok(Ok(files::expand_path(path)?))
}

async fn beads_issues_list(services: &Arc<Services>, id: &str) -> anyhow::Result<RestResponse> {
    let dir = match beads_pane_dir(services, id).await? {
        Ok(dir) => dir,
        Err(resp) => return Ok(resp),
    };
    match issues::list(&dir).await {
        Ok(value) => Ok(RestResponse::ok(serde_json::json!({ "issues": value }))),
        Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
    }
}

async fn beads_issues_create(
    services: &Arc<Services>,
    id: &str,
    body: &serde_json::Value,
) -> anyhow::Result<RestResponse> {
    let dir = match beads_pane_dir(services, id).await? {
        Ok(dir) => dir,
        Err(resp) => return Ok(resp),
    };
    let Some(title) = body_str(body, "title") else {
        return Ok(ErrorCode::BadRequest.response("title is required"));
    };
    let issue_type = body_str(body, "type").unwrap_or("task");
    let priority = body.get("priority").and_then(|v| v.as_u64()).unwrap_or(2);
    if priority > 4 {
        return Ok(ErrorCode::BadRequest.response("priority must be 0..4"));
    }
    match issues::create(&dir, title, issue_type, priority as u8).await {
        Ok(value) => Ok(RestResponse::ok(serde_json::json!({ "issue": value }))),
        Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
    }
}

async fn beads_issues_close(
    services: &Arc<Services>,
    id: &str,
    body: &serde_json::Value,
) -> anyhow::Result<RestResponse> {
    let Some(issue_id) = body_str(body, "id") else {
        return Ok(ErrorCode::BadRequest.response("id is required"));
    };
    // Validate before anything touches a subprocess.
    if !issues::valid_issue_id(issue_id) {
        return Ok(ErrorCode::BadRequest.response("invalid issue id"));
    }
    let dir = match beads_pane_dir(services, id).await? {
        Ok(dir) => dir,
        Err(resp) => return Ok(resp),
    };
    match issues::close(&dir, issue_id).await {
        Ok(value) => Ok(RestResponse::ok(serde_json::json!({ "issue": value }))),
        Err(e) => Ok(ErrorCode::BadRequest.response(e.to_string())),
    }
}

async fn pane_collection(
    services: &Arc<Services>,
    kind: &str,
    method: &str,
    body: &serde_json::Value,
) -> anyhow::Result<RestResponse> {
    let Some(store) = services.panes.by_kind(kind) else {
        return Ok(ErrorCode::NotFound.response("unknown pane type"));
    };
    match method {
        "GET" => {
            let mut panes = store.list().await;
            if kind == "file-panes" {
                hydrate_file_panes(&mut panes).await;
            }
            Ok(RestResponse::ok(serde_json::json!({ "panes": panes })))
        }
        "POST" => {
            let record = store.create(body.clone()).await?;
            Ok(RestResponse::ok(record))
        }
        _ => Ok(ErrorCode::BadRequest.response("unsupported method")),
    }
}

async fn pane_item(
    services: &Arc<Services>,
    kind: &str,
    method: &str,
    id: &str,
    body: &serde_json::Value,
) -> anyhow::Result<RestResponse> {
    let Some(store) = services.panes.by_kind(kind) else {
        return Ok(ErrorCode::NotFound.response("unknown pane type"));
    };
    match method {
        "GET" => match store.get(id).await {
            Some(record) => Ok(RestResponse::ok(record)),
            None => Ok(ErrorCode::NotFound.response("unknown pane")),
        },
        "PUT" => {
            // A path-backed file pane writes through to disk; content is
            // not duplicated into the record.
            if kind == "file-panes" {
                if let Some(content) = body_str(body, "content") {
                    if let Some(record) = store.get(id).await {
                        if let Some(path) =
                            record.get("path").and_then(|v| v.as_str()).filter(|p| !p.is_empty())
                        {
                            if let Err(e) = files::write_file(path, content).await {
                                return Ok(ErrorCode::BadRequest.response(e.to_string()));
                            }
                            let mut rest = body.clone();
                            if let Some(obj) = rest.as_object_mut() {
                                obj.remove("content");
                            }
                            return match store.update(id, &rest).await? {
                                Some(updated) => Ok(RestResponse::ok(updated)),
                                None => Ok(ErrorCode::NotFound.response("unknown pane")),
                            };
                        }
                    }
                }
            }
            match store.update(id, body).await? {
                Some(updated) => Ok(RestResponse::ok(updated)),
                None => Ok(ErrorCode::NotFound.response("unknown pane")),
            }
        }
        "DELETE" => match store.remove(id).await? {
            true => Ok(RestResponse::ok(serde_json::json!({ "ok": true }))),
            false => Ok(ErrorCode::NotFound.response("unknown pane")),
        },
        _ => Ok(ErrorCode::BadRequest.response("unsupported method")),
    }
}

/// Fill in `content` for path-backed file panes on listing.
async fn hydrate_file_panes(panes: &mut [serde_json::Value]) {
    for pane in panes {
        let Some(path) = pane.get("path").and_then(|v| v.as_str()).filter(|p| !p.is_empty())
        else {
            continue;
        };
        if let Ok(content) = files::read_file(path).await {
            if let Some(obj) = pane.as_object_mut() {
                obj.insert("content".to_owned(), serde_json::Value::String(content));
            }
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
