use bson::{Bson, Document};
use kala_filter::parse_sort;
use kala_store::Sort;
use percent_encoding::percent_decode_str;

use crate::error::HandlerError;

/// Decoded `application/x-www-form-urlencoded` query string.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .unwrap_or_default()
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((name, value)) => (decode(name), decode(value)),
                None => (decode(part), String::new()),
            })
            .collect();
        Self { pairs }
    }

    /// First value given for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(key, _)| key == name)
    }

    /// A JSON parameter, read as extended JSON. Missing or empty is `None`.
    pub fn json(&self, name: &str) -> Result<Option<Bson>, HandlerError> {
        let Some(raw) = self.get(name).filter(|raw| !raw.is_empty()) else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| HandlerError::BadRequest(format!("invalid JSON in {name}: {e}")))?;
        let value = Bson::try_from(value)
            .map_err(|e| HandlerError::BadRequest(format!("invalid extended JSON in {name}: {e}")))?;
        Ok(Some(value))
    }

    pub fn document(&self, name: &str) -> Result<Option<Document>, HandlerError> {
        match self.json(name)? {
            None => Ok(None),
            Some(Bson::Document(doc)) => Ok(Some(doc)),
            Some(_) => Err(HandlerError::BadRequest(format!("{name} must be a JSON object"))),
        }
    }

    pub fn number(&self, name: &str) -> Result<Option<usize>, HandlerError> {
        let Some(raw) = self.get(name).filter(|raw| !raw.is_empty()) else {
            return Ok(None);
        };
        raw.trim()
            .parse()
            .map(Some)
            .map_err(|_| HandlerError::BadRequest(format!("{name} must be a non-negative integer")))
    }
}

fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Parameters of `GET /{collection}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRequest {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Vec<Sort>,
    pub skip: usize,
    pub limit: Option<usize>,
    pub distinct: Option<String>,
    pub count: bool,
}

impl ListRequest {
    pub fn from_params(params: &QueryParams) -> Result<Self, HandlerError> {
        let sort = match params.json("sort")? {
            Some(value) => parse_sort(value)?,
            None => Vec::new(),
        };

        Ok(Self {
            filter: params.document("filter")?.unwrap_or_default(),
            projection: params.document("projection")?,
            sort,
            skip: params.number("skip")?.unwrap_or(0),
            limit: params.number("limit")?,
            distinct: params
                .get("distinct")
                .filter(|field| !field.is_empty())
                .map(str::to_string),
            count: params.contains("count"),
        })
    }
}

/// Parameters of `GET /aggregate/{collection}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateRequest {
    pub pipeline: Vec<Document>,
    pub limit: Option<usize>,
}

impl AggregateRequest {
    pub fn from_params(params: &QueryParams) -> Result<Self, HandlerError> {
        let pipeline = match params.json("pipeline")? {
            None => Vec::new(),
            Some(Bson::Array(stages)) => stages
                .into_iter()
                .map(|stage| match stage {
                    Bson::Document(doc) => Ok(doc),
                    _ => Err(HandlerError::BadRequest(
                        "pipeline stages must be JSON objects".into(),
                    )),
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(HandlerError::BadRequest("pipeline must be a JSON list".into()));
            }
        };

        Ok(Self {
            pipeline,
            limit: params.number("limit")?,
        })
    }
}
