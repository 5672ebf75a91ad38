//! Workflow-context adapters and field extraction.
//!
//! The caller context of a workflow invocation describes the orchestration
//! step: activity, trigger and execution identifiers.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::{ApiError, Request, RequestOf, Response};
use crate::handler::typed::decode_request;
use crate::handler::{Context, Handler};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowActivity {
    pub id: String,
    pub name: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowTrigger {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Orchestration step described by the caller context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowCtx {
    #[serde(rename = "activity_execution_id")]
    pub activity_exec_id: String,
    pub app_id: String,
    pub cid: String,
    pub owner_cid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub definition_id: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub definition_version: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub execution_id: String,
    pub activity: WorkflowActivity,
    pub trigger: WorkflowTrigger,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn decode_workflow(context: &Value) -> Result<WorkflowCtx, Response> {
    WorkflowCtx::deserialize(context).map_err(|e| {
        Response::from_errors([ApiError::bad_request(format!(
            "failed to unmarshal workflow context: {e}"
        ))])
    })
}

/// Handler decoding the workflow context before calling `F`.
pub struct Workflow<F> {
    inner: F,
}

pub fn workflow<F, Fut>(f: F) -> Workflow<F>
where
    F: Fn(Context, Request, WorkflowCtx) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    Workflow { inner: f }
}

#[async_trait]
impl<F, Fut> Handler for Workflow<F>
where
    F: Fn(Context, Request, WorkflowCtx) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    async fn handle(&self, ctx: Context, req: Request) -> Response {
        match decode_workflow(&req.context) {
            Ok(wf) => (self.inner)(ctx, req, wf).await,
            Err(resp) => resp,
        }
    }
}

/// Handler decoding the workflow context and the body before calling `F`.
pub struct WorkflowTyped<T, F> {
    inner: F,
    _body: PhantomData<fn() -> T>,
}

pub fn workflow_typed<T, F, Fut>(f: F) -> WorkflowTyped<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(Context, RequestOf<T>, WorkflowCtx) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    WorkflowTyped {
        inner: f,
        _body: PhantomData,
    }
}

#[async_trait]
impl<T, F, Fut> Handler for WorkflowTyped<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(Context, RequestOf<T>, WorkflowCtx) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    async fn handle(&self, ctx: Context, req: Request) -> Response {
        let wf = match decode_workflow(&req.context) {
            Ok(wf) => wf,
            Err(resp) => return resp,
        };
        match decode_request::<T>(req).await {
            Ok(req) => (self.inner)(ctx, req, wf).await,
            Err(resp) => resp,
        }
    }
}

/// A named, typed value supplied in the caller context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub display: String,
    pub kind: String,
    pub value: Value,
}

#[derive(Deserialize)]
struct RawField {
    #[serde(default)]
    name: String,
    #[serde(default)]
    display: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    value: Value,
}

impl<T> RequestOf<T> {
    /// Fields listed under `context.fields`; incomplete entries are dropped.
    pub fn fields(&self) -> Vec<Field> {
        let Some(raw) = self.context.get("fields") else {
            return Vec::new();
        };
        let Ok(raw) = Vec::<RawField>::deserialize(raw) else {
            return Vec::new();
        };

        raw.into_iter()
            .filter(|f| !f.name.is_empty() && !f.display.is_empty() && !f.kind.is_empty() && !f.value.is_null())
            .map(|f| Field {
                name: f.name,
                display: f.display,
                kind: f.kind,
                value: f.value,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::RequestBody;
    use serde_json::json;

    fn with_context(context: Value) -> Request {
        Request::new("POST", "/wf").with_context(context)
    }

    #[tokio::test]
    async fn workflow_decodes_context() {
        let h = workflow(|_ctx, _req, wf: WorkflowCtx| async move { Response::json(wf) });
        let req = with_context(json!({
            "activity_execution_id": "ae",
            "cid": "c1",
            "definition_version": 2,
            "activity": {"id": "a", "name": "n", "node_id": "nd"},
            "trigger": {"name": "t"}
        }));
        let resp = h.handle(Context::background(), req).await;
        assert!(resp.errors.is_empty());
    }

    #[tokio::test]
    async fn workflow_missing_context_is_bad_request() {
        let h = workflow(|_ctx, _req, _wf| async { Response::new() });
        let resp = h.handle(Context::background(), Request::new("POST", "/wf")).await;
        assert_eq!(resp.errors.len(), 1);
        assert_eq!(resp.errors[0].code, 400);
        assert!(resp.errors[0].message.starts_with("failed to unmarshal workflow context: "));
    }

    #[tokio::test]
    async fn workflow_typed_decodes_both() {
        #[derive(Deserialize)]
        struct In {
            n: u32,
        }

        let h = workflow_typed(|_ctx, req: RequestOf<In>, wf: WorkflowCtx| async move {
            Response::json(format!("{}:{}", wf.cid, req.body.n))
        });
        let mut req = with_context(json!({"cid": "c1"}));
        req.body = RequestBody::Bytes(r#"{"n":7}"#.into());
        let resp = h.handle(Context::background(), req).await;
        assert!(resp.errors.is_empty());

        let mut bad = with_context(json!({"cid": "c1"}));
        bad.body = RequestBody::Bytes("nope".into());
        let resp = h.handle(Context::background(), bad).await;
        assert_eq!(resp.status_code(), 400);
    }

    #[test]
    fn fields_keep_complete_entries() {
        let req = with_context(json!({"fields": [
            {"name": "a", "display": "A", "kind": "foo", "value": "baz"},
            {"name": "b", "display": "B", "kind": "bar", "value": "baz"}
        ]}));
        let fields = req.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].name, "b");
        assert_eq!(fields[1].value, json!("baz"));
    }

    #[test]
    fn fields_drop_partial_entries() {
        for entry in [
            json!({"name": "", "display": "A", "kind": "foo", "value": "baz"}),
            json!({"name": "a", "display": "", "kind": "foo", "value": "baz"}),
            json!({"name": "a", "display": "A", "kind": "", "value": "baz"}),
            json!({"name": "a", "display": "A", "kind": "foo", "value": null}),
            json!({"name": "a", "display": "A", "kind": "foo"}),
        ] {
            let req = with_context(json!({ "fields": [entry] }));
            assert!(req.fields().is_empty());
        }
        assert!(with_context(json!({"not_fields": 1})).fields().is_empty());
        assert!(Request::new("GET", "/").fields().is_empty());
    }
}
