//! Association builder: merges the fragments of one association

use tracing::debug;

use super::BuildContext;
use crate::association::{AssociationFragment, merge_fragments, referential_constraint};
use crate::error::BuildError;
use crate::models::Association;

pub(super) fn build_association(
    ctx: &mut BuildContext<'_>,
    fragments: &[AssociationFragment],
) -> Result<Association, BuildError> {
    let mut association = merge_fragments(fragments)?;
    let registry = ctx.registry();
    let depth = ctx.config().max_inheritance_depth;
    association.referential_constraint = referential_constraint(&association, fragments, |name| {
        registry.entity_type_chain(name, depth).unwrap_or_default()
    });

    debug!(
        "Merged {} fragment(s) into association '{}' ({} {}, {} {})",
        fragments.len(),
        association.name,
        association.ends[0].role,
        association.ends[0].multiplicity,
        association.ends[1].role,
        association.ends[1].multiplicity
    );
    Ok(association)
}
