//! Converging concrete paths into templates

use std::sync::Arc;

use crate::facet::{PathPattern, PathSegment};
use crate::node::{Node, NumberNode};
use crate::resolver::Resolver;

/// Merge paths of the same shape.
///
/// Paths that differ only in integer segments collapse into one template
/// with an integer parameter there; a path some other template already
/// accepts is dropped. First-seen order is kept.
#[must_use]
pub fn converge_paths(paths: Vec<PathPattern>, resolver: &Resolver) -> Vec<PathPattern> {
    let merged = merge_integer_segments(paths);
    let mut kept: Vec<PathPattern> = Vec::new();
    for (i, path) in merged.iter().enumerate() {
        let absorbed = merged.iter().enumerate().any(|(j, other)| {
            if i == j || !other.subsumes(path, resolver, resolver).is_success() {
                return false;
            }
            // equivalent templates: the earlier one stays
            !path.subsumes(other, resolver, resolver).is_success() || j < i
        });
        if absorbed {
            tracing::debug!(path = %path.template(), "path absorbed by another template");
            continue;
        }
        if !kept.iter().any(|k| k.template() == path.template()) {
            kept.push(path.clone());
        }
    }
    kept
}

fn is_integer(text: &str) -> bool {
    text.parse::<i64>().is_ok()
}

fn is_integer_param(node: &Node) -> bool {
    node.type_name() == "integer"
}

/// `template` widened to also cover `path`, if their shapes allow it
fn fold(template: &PathPattern, path: &PathPattern) -> Option<PathPattern> {
    let (a, b) = (template.segments(), path.segments());
    if a.len() != b.len() {
        return None;
    }
    let mut segments = Vec::with_capacity(a.len());
    let mut changed = false;
    for (index, (x, y)) in a.iter().zip(b).enumerate() {
        let segment = match (x, y) {
            (PathSegment::Literal(p), PathSegment::Literal(q)) if p == q => x.clone(),
            (PathSegment::Literal(p), PathSegment::Literal(q)) if is_integer(p) && is_integer(q) => {
                changed = true;
                let taken = a.iter().chain(b).any(|s| matches!(s, PathSegment::Param { name, .. } if name == "id"));
                PathSegment::Param {
                    name: if taken { format!("id{index}") } else { "id".to_string() },
                    node: Arc::new(NumberNode::integer()),
                }
            }
            (PathSegment::Param { node, .. }, PathSegment::Literal(q)) if is_integer_param(node) && is_integer(q) => {
                x.clone()
            }
            (PathSegment::Param { name: p, .. }, PathSegment::Param { name: q, .. }) if p == q => x.clone(),
            _ => return None,
        };
        segments.push(segment);
    }
    Some(if changed {
        PathPattern::from_segments(segments)
    } else {
        template.clone()
    })
}

fn merge_integer_segments(paths: Vec<PathPattern>) -> Vec<PathPattern> {
    let mut merged: Vec<PathPattern> = Vec::new();
    for path in paths {
        let folded = merged
            .iter()
            .enumerate()
            .find_map(|(index, template)| fold(template, &path).map(|generalized| (index, generalized)));
        match folded {
            Some((index, generalized)) => merged[index] = generalized,
            None => merged.push(path),
        }
    }
    merged
}
