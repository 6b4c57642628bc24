use quarry_core::Repository;

use crate::compile::Predicate;

/// Viewer-visibility capability composed into the query pipeline.
///
/// The engine does not define visibility rules; it only fixes where
/// they apply: [`where_predicate`](Self::where_predicate) joins the
/// compiled WHERE clause alongside the other predicates, and
/// [`can_see`](Self::can_see) sees each hydrated row before the
/// status/hosting post-filters run.
pub trait VisibilityPolicy: Send + Sync {
    fn where_predicate(&self) -> Option<Predicate> {
        None
    }

    fn can_see(&self, _repository: &Repository) -> bool {
        true
    }
}

/// Policy that admits every row.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl VisibilityPolicy for AllowAll {}
