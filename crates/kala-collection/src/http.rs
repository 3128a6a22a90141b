use std::sync::Arc;

use bson::{Bson, Document, doc};
use http::{HeaderValue, Method, Request, Response, StatusCode, header};
use kala_filter::{
    ReadFilter, StagingProbe, append_limit, coerce_document, filter_aggregate, filter_write,
    strip_write_out,
};
use kala_store::{FindOptions, Store};
use serde_json::{Value, json};

use crate::config::{KalaConfig, WriteMode};
use crate::error::HandlerError;
use crate::request::{AggregateRequest, ListRequest, QueryParams};

const STATUS_PATH: &str = "_status";
const AGGREGATE_PREFIX: &str = "aggregate";

const CORS_ALLOW_HEADERS: &str = "Authorization, Content-Type, Accept, Origin, User-Agent, DNT, \
    Cache-Control, X-Mx-ReqToken, Keep-Alive, X-Request, X-Requested-With, If-Modified-Since";
const CORS_ALLOW_METHODS: &str = "GET, POST, OPTIONS";

/// Collections of a document store exposed as a JSON REST API, with read
/// and write filtering driven by [`KalaConfig`].
pub struct KalaHttp<S: Store> {
    store: S,
    config: Arc<KalaConfig>,
}

impl<S: Store> KalaHttp<S> {
    pub fn new(store: S, config: Arc<KalaConfig>) -> Self {
        Self { store, config }
    }

    pub fn handle(&self, req: Request<Vec<u8>>) -> Response<Vec<u8>> {
        let mut response = self.route(&req);
        if self.config.cors {
            add_cors_headers(&mut response);
        }
        response
    }

    fn route(&self, req: &Request<Vec<u8>>) -> Response<Vec<u8>> {
        let path = req.uri().path().trim_matches('/');
        let segments: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').collect()
        };
        let method = req.method();

        if method == Method::OPTIONS && self.config.cors && !segments.is_empty() {
            return empty_response(StatusCode::NO_CONTENT);
        }

        let result = match (method, segments.as_slice()) {
            (&Method::GET, [STATUS_PATH]) => self.status(),
            (_, [STATUS_PATH]) => return method_not_allowed(),
            (&Method::GET, [AGGREGATE_PREFIX, collection]) => self.aggregate(collection, req),
            (_, [AGGREGATE_PREFIX, _]) => return method_not_allowed(),
            (&Method::GET, [collection]) => self.list(collection, req),
            (&Method::POST, [collection]) => self.insert(collection, req),
            (_, [_]) => return method_not_allowed(),
            _ => return error_response(StatusCode::NOT_FOUND, "not found"),
        };

        match result {
            Ok(body) => match serde_json::to_vec(&body) {
                Ok(body) => json_response(StatusCode::OK, body),
                Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
            },
            Err(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    tracing::error!(error = %e, "request failed");
                } else {
                    tracing::warn!(status = status.as_u16(), error = %e, "request refused");
                }
                error_response(status, &e.to_string())
            }
        }
    }

    // ── Read routes ─────────────────────────────────────────────

    fn list(&self, collection: &str, req: &Request<Vec<u8>>) -> Result<Value, HandlerError> {
        let params = QueryParams::parse(req.uri().query());
        let request = ListRequest::from_params(&params)?;
        let read = ReadFilter::new(self.config.read.whitelist.as_ref());

        let filter = coerce_document(request.filter, self.config.uuid_representation);
        let filter = read.filter(filter);

        if let Some(field) = request.distinct.as_deref() {
            let values = if read.whitelist().is_none_or(|w| w.contains(field)) {
                self.store.distinct(collection, field, &filter)?
            } else {
                tracing::debug!(field, "distinct on non-whitelisted field");
                Vec::new()
            };
            return Ok(if request.count {
                json!({ "count": values.len() })
            } else {
                json!({ "values": Bson::Array(values).into_relaxed_extjson() })
            });
        }

        if request.count {
            let count = self.store.count(collection, &filter)?;
            return Ok(json!({ "count": count }));
        }

        let options = FindOptions {
            projection: read.projection(request.projection),
            sort: read.sort(request.sort),
            skip: request.skip,
            limit: Some(self.config.effective_limit(request.limit)),
        };
        let docs = self.store.find(collection, &filter, &options)?;
        Ok(json!({ "results": to_extjson(docs) }))
    }

    fn aggregate(&self, collection: &str, req: &Request<Vec<u8>>) -> Result<Value, HandlerError> {
        let params = QueryParams::parse(req.uri().query());
        let request = AggregateRequest::from_params(&params)?;

        let pipeline = strip_write_out(request.pipeline);
        let pipeline = filter_aggregate(pipeline, self.config.read.whitelist.as_ref());
        let pipeline: Vec<Document> = pipeline
            .into_iter()
            .map(|stage| coerce_document(stage, self.config.uuid_representation))
            .collect();
        let pipeline = append_limit(pipeline, self.config.aggregate_limit(request.limit));

        let docs = self.store.aggregate(collection, &pipeline)?;
        Ok(json!({ "results": to_extjson(docs) }))
    }

    fn status(&self) -> Result<Value, HandlerError> {
        if !self.config.status {
            return Err(HandlerError::StatusDisabled);
        }
        let read_filter = self
            .config
            .read
            .whitelist
            .as_ref()
            .map(|w| w.iter().collect::<Vec<_>>());
        Ok(json!({
            "version": self.config.version,
            "read_filter": read_filter,
            "write_filter": self.config.write.mode.as_str(),
        }))
    }

    // ── Write route ─────────────────────────────────────────────

    fn insert(&self, collection: &str, req: &Request<Vec<u8>>) -> Result<Value, HandlerError> {
        let write = &self.config.write;
        if write.mode == WriteMode::Disabled {
            return Err(HandlerError::WriteDisabled);
        }

        let document = parse_body(req.body())?;
        let document = coerce_document(document, self.config.uuid_representation);

        let document = match write.mode {
            WriteMode::Disabled => return Err(HandlerError::WriteDisabled),
            WriteMode::Whitelist => {
                filter_write(document, write.whitelist.as_ref())?.ok_or(HandlerError::Rejected)?
            }
            WriteMode::Probe => {
                let probe = StagingProbe::new(&self.store, &self.config.staging);
                if !probe.accepts(&document, write.policy.as_ref())? {
                    return Err(HandlerError::Rejected);
                }
                document
            }
            WriteMode::Unrestricted => document,
        };

        let id = self.store.insert_one(collection, document)?;
        let inserted = self
            .store
            .find(collection, &doc! { "_id": id.clone() }, &FindOptions::default())?;
        tracing::info!(collection, id = %id, "document inserted");

        Ok(json!({ "success": to_extjson(inserted) }))
    }
}

fn parse_body(body: &[u8]) -> Result<Document, HandlerError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| HandlerError::BadRequest(format!("invalid JSON body: {e}")))?;
    if !value.is_object() {
        return Err(HandlerError::BadRequest("body must be a JSON object".into()));
    }
    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(_) => Err(HandlerError::BadRequest("body must be a JSON object".into())),
        Err(e) => Err(HandlerError::BadRequest(format!("invalid extended JSON body: {e}"))),
    }
}

fn to_extjson(docs: Vec<Document>) -> Vec<Value> {
    docs.into_iter()
        .map(|doc| Bson::Document(doc).into_relaxed_extjson())
        .collect()
}

fn add_cors_headers(response: &mut Response<Vec<u8>>) {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOW_HEADERS),
    );
}

fn method_not_allowed() -> Response<Vec<u8>> {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

fn empty_response(status: StatusCode) -> Response<Vec<u8>> {
    Response::builder()
        .status(status)
        .body(Vec::new())
        .unwrap()
}

fn json_response(status: StatusCode, body: impl Into<Vec<u8>>) -> Response<Vec<u8>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn error_response(status: StatusCode, message: &str) -> Response<Vec<u8>> {
    let body = json!({ "error": message });
    json_response(status, body.to_string().into_bytes())
}
