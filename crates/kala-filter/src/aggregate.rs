use bson::{Bson, Document};

use crate::read::ReadFilter;
use crate::whitelist::Whitelist;

/// Result size used when the client does not pass a limit.
pub const DEFAULT_LIMIT: usize = 100;

const PROJECT: &str = "$project";

/// Stages that export results out of the pipeline. They would bypass
/// filtering entirely, so they never reach the store.
const WRITE_OUT_STAGES: [&str; 2] = ["$out", "$merge"];

pub fn strip_write_out(pipeline: Vec<Document>) -> Vec<Document> {
    pipeline
        .into_iter()
        .filter(|stage| {
            let write_out = WRITE_OUT_STAGES.iter().any(|op| stage.contains_key(op));
            if write_out {
                tracing::debug!(?stage, "stripping write-out stage");
            }
            !write_out
        })
        .collect()
}

/// Make the pipeline start with a field selection inside the whitelist.
///
/// A leading `$project` is intersected with the whitelist; otherwise a
/// whitelist `$project` is prepended. Later stages can only ever see the
/// fields the first stage lets through.
pub fn filter_aggregate(mut pipeline: Vec<Document>, whitelist: Option<&Whitelist>) -> Vec<Document> {
    let Some(whitelist) = whitelist else {
        return pipeline;
    };
    let read = ReadFilter::new(Some(whitelist));

    let leading_projection = pipeline.first().and_then(|stage| match stage.get(PROJECT) {
        Some(Bson::Document(fields)) if stage.len() == 1 => Some(fields.clone()),
        _ => None,
    });

    match leading_projection {
        Some(fields) => {
            let selection = read.projection(Some(fields)).unwrap_or_else(|| whitelist.projection());
            pipeline[0] = single_stage(PROJECT, selection);
        }
        None => {
            let selection = read.projection(None).unwrap_or_else(|| whitelist.projection());
            pipeline.insert(0, single_stage(PROJECT, selection));
        }
    }
    pipeline
}

/// Cap the pipeline's output with a trailing `$limit` stage.
pub fn append_limit(mut pipeline: Vec<Document>, limit: usize) -> Vec<Document> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    pipeline.push(single_stage("$limit", limit));
    pipeline
}

fn single_stage(op: &str, value: impl Into<Bson>) -> Document {
    let mut stage = Document::new();
    stage.insert(op, value.into());
    stage
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn out_is_stripped() {
        let pipeline = vec![doc! { "$match": {} }, doc! { "$out": "x" }];
        assert_eq!(strip_write_out(pipeline), vec![doc! { "$match": {} }]);
    }

    #[test]
    fn merge_is_stripped() {
        let pipeline = vec![doc! { "$merge": { "into": "x" } }, doc! { "$limit": 5 }];
        assert_eq!(strip_write_out(pipeline), vec![doc! { "$limit": 5 }]);
    }

    #[test]
    fn prepends_projection() {
        let w = Whitelist::new(["name", "age"]);
        let out = filter_aggregate(vec![doc! { "$match": { "age": 3 } }], Some(&w));
        assert_eq!(
            out,
            vec![
                doc! { "$project": { "name": 1, "age": 1 } },
                doc! { "$match": { "age": 3 } },
            ]
        );
    }

    #[test]
    fn intersects_leading_projection() {
        let w = Whitelist::new(["name", "age"]);
        let out = filter_aggregate(
            vec![doc! { "$project": { "name": 1, "secret": 1 } }],
            Some(&w),
        );
        assert_eq!(out, vec![doc! { "$project": { "name": 1 } }]);
    }

    #[test]
    fn empty_pipeline_gets_projection() {
        let w = Whitelist::new(["name"]);
        assert_eq!(
            filter_aggregate(Vec::new(), Some(&w)),
            vec![doc! { "$project": { "name": 1 } }]
        );
    }

    #[test]
    fn disabled_is_identity() {
        let pipeline = vec![doc! { "$project": { "secret": 1 } }];
        assert_eq!(filter_aggregate(pipeline.clone(), None), pipeline);
    }

    #[test]
    fn limit_goes_last() {
        let out = append_limit(vec![doc! { "$match": {} }], DEFAULT_LIMIT);
        assert_eq!(out.last(), Some(&doc! { "$limit": 100_i64 }));
    }
}
