//! Retention planning: which automatic snapshots go.

use crate::model::{DeletionPlan, RetentionPolicy, Snapshot};

/// Compute the deletion plan for one VM's automatic snapshots.
///
/// Snapshots are ordered by creation time, ties broken by id, so the same
/// input always yields the same plan. The newest `keep` are retained and
/// everything older is returned oldest first. A disabled policy, or no
/// more snapshots than `keep`, yields an empty plan.
///
/// Callers pass only automatic snapshots; anything else is filtered out
/// again here so a manual snapshot can never be planned for deletion.
pub fn plan(automatic: &[Snapshot], policy: RetentionPolicy) -> DeletionPlan {
    let Some(keep) = policy.keep() else {
        return DeletionPlan::default();
    };

    let mut ordered: Vec<&Snapshot> = automatic.iter().filter(|s| s.is_automatic()).collect();
    if ordered.len() <= keep {
        return DeletionPlan::default();
    }

    ordered.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));

    let excess = ordered.len() - keep;
    DeletionPlan::new(ordered[..excess].iter().map(|s| (*s).clone()).collect())
}
