//! Effective permission resolution for the bot's own member.
//!
//! Follows Discord's documented order: guild owner and `ADMINISTRATOR` short-circuit to
//! everything, otherwise the `@everyone` role is combined with the member's roles and then
//! narrowed by channel overwrites (`@everyone`, then all role overwrites together, then the
//! member overwrite). Channel-scope denials always win over guild-scope grants.

mod flags;

pub use flags::PermissionFlags;

use serenity::all::Permissions;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OverwriteTarget {
    Role(u64),
    Member(u64),
}

/// Channel-scoped permission exception
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Overwrite {
    pub target: OverwriteTarget,
    pub allow: Permissions,
    pub deny: Permissions,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RoleGrant {
    pub id: u64,
    pub name: String,
    pub position: u16,
    pub permissions: Permissions,
}

/// Everything needed to resolve permissions for one member of one guild
#[derive(Debug, Clone, Copy)]
pub struct MemberContext<'a> {
    pub guild_id: u64,
    pub owner_id: u64,
    pub user_id: u64,
    pub roles: &'a [RoleGrant],
    pub member_roles: &'a [u64],
}

impl MemberContext<'_> {
    /// Guild-level permissions before any channel overwrites
    pub fn base_permissions(&self) -> Permissions {
        if self.user_id == self.owner_id {
            return Permissions::all();
        }

        // The @everyone role shares the guild's id
        let permissions = self
            .roles
            .iter()
            .filter(|role| role.id == self.guild_id || self.member_roles.contains(&role.id))
            .fold(Permissions::empty(), |acc, role| acc | role.permissions);

        if permissions.contains(Permissions::ADMINISTRATOR) {
            Permissions::all()
        } else {
            permissions
        }
    }

    pub fn channel_permissions(&self, overwrites: &[Overwrite]) -> Permissions {
        apply_overwrites(self.base_permissions(), self, overwrites)
    }

    /// Highest positioned role the member holds, ignoring @everyone
    pub fn top_role(&self) -> Option<&RoleGrant> {
        self.roles
            .iter()
            .filter(|role| role.id != self.guild_id && self.member_roles.contains(&role.id))
            .max_by_key(|role| (role.position, std::cmp::Reverse(role.id)))
    }
}

fn apply_overwrites(base: Permissions, member: &MemberContext<'_>, overwrites: &[Overwrite]) -> Permissions {
    if base.contains(Permissions::ADMINISTRATOR) {
        return Permissions::all();
    }

    let mut permissions = base;

    if let Some(everyone) = overwrites
        .iter()
        .find(|o| o.target == OverwriteTarget::Role(member.guild_id))
    {
        permissions &= !everyone.deny;
        permissions |= everyone.allow;
    }

    // Role overwrites are merged before being applied so an allow on any role beats a deny on another
    let (allow, deny) = overwrites
        .iter()
        .filter(|o| match o.target {
            OverwriteTarget::Role(role_id) => {
                role_id != member.guild_id && member.member_roles.contains(&role_id)
            }
            OverwriteTarget::Member(_) => false,
        })
        .fold((Permissions::empty(), Permissions::empty()), |(allow, deny), o| {
            (allow | o.allow, deny | o.deny)
        });
    permissions &= !deny;
    permissions |= allow;

    if let Some(own) = overwrites
        .iter()
        .find(|o| o.target == OverwriteTarget::Member(member.user_id))
    {
        permissions &= !own.deny;
        permissions |= own.allow;
    }

    apply_implicit_denials(permissions)
}

/// Permissions that are meaningless without their prerequisite are dropped
fn apply_implicit_denials(mut permissions: Permissions) -> Permissions {
    if !permissions.contains(Permissions::VIEW_CHANNEL) {
        return Permissions::empty();
    }

    if !permissions.contains(Permissions::SEND_MESSAGES) {
        permissions.remove(
            Permissions::SEND_TTS_MESSAGES
                | Permissions::MENTION_EVERYONE
                | Permissions::EMBED_LINKS
                | Permissions::ATTACH_FILES,
        );
    }

    permissions
}
