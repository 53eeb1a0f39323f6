//! Reduces the operator's guild list to the guilds they may administer.

use serenity::model::Permissions;
use tracing::debug;

use crate::models::{Guild, RawGuild};

/// "Manage Server" (0x20)
pub const REQUIRED_PERMISSION: Permissions = Permissions::MANAGE_GUILD;

/// Owners always qualify; everyone else needs the manage bit set in their mask.
/// The mask carries many unrelated bits, so this is a containment check.
pub fn is_administrable(owner: bool, permissions: u64) -> bool {
    owner || Permissions::from_bits_truncate(permissions).contains(REQUIRED_PERMISSION)
}

/// Filter and normalize a raw guild list, keeping the upstream order
pub fn filter_administrable(raw: &[RawGuild]) -> Vec<Guild> {
    let guilds: Vec<Guild> = raw
        .iter()
        .filter(|g| is_administrable(g.owner, g.permissions))
        .map(Guild::from_raw)
        .collect();

    debug!(
        "{} of {} guilds are administrable",
        guilds.len(),
        raw.len()
    );

    guilds
}
