//! Permission resolution
//!
//! Pure composition of a resource's ACL with a user's group set. Holds no
//! state; [`Permissions::can`](crate::Permissions::can) performs the reads.

use crate::action::Action;
use crate::resource::Resource;

/// True iff some group in `groups` holds the single action `requested` on
/// `resource`.
pub fn resolve<'a, I>(resource: &Resource, groups: I, requested: Action) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    groups
        .into_iter()
        .any(|group| resource.can(group, requested))
}
