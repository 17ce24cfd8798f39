//! Facet matchers: path, query, headers, form fields, security
//!
//! Each facet matches and generates one part of an HTTP message. Request and
//! response patterns stitch them together.

mod keyed;
mod path;
mod security;

pub use keyed::{FacetKind, KeyedPattern, ParamSpec, keyed_of};
pub use path::{PathPattern, PathSegment};
pub(crate) use path::pinned;
pub use security::{ApiKeyLocation, Presence, SecurityScheme, match_security};

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::EngineError;
use crate::node::LazySeq;
use crate::resolver::Resolver;
use crate::result::MatchResult;

/// Drop candidates already covered by an earlier one.
///
/// Lazy: each candidate is compared with the survivors seen so far.
pub(crate) fn distinct_by_subsumption<T: 'static>(
    candidates: LazySeq<Result<T, EngineError>>,
    resolver: &Resolver,
    subsumes: fn(&T, &T, &Resolver, &Resolver) -> MatchResult,
) -> LazySeq<Result<T, EngineError>>
where
    T: Clone,
{
    let seen: Rc<RefCell<Vec<T>>> = Rc::new(RefCell::new(Vec::new()));
    let resolver = resolver.clone();
    Box::new(candidates.filter(move |candidate| {
        let Ok(candidate) = candidate else {
            return true;
        };
        let covered = seen
            .borrow()
            .iter()
            .any(|earlier| subsumes(earlier, candidate, &resolver, &resolver).is_success());
        if covered {
            tracing::debug!("dropping facet variant covered by an earlier one");
        } else {
            seen.borrow_mut().push(candidate.clone());
        }
        !covered
    }))
}
