use serde::Serialize;
use serenity::all::Permissions;

/// The permissions the triage report cares about, as named booleans.
///
/// The field set is fixed so exports keep the same shape from run to run; `value` carries the
/// raw bitfield for anything not broken out here.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize)]
pub struct PermissionFlags {
    pub administrator: bool,
    pub manage_guild: bool,
    pub manage_roles: bool,
    pub manage_channels: bool,
    pub kick_members: bool,
    pub ban_members: bool,
    pub view_audit_log: bool,
    pub view_channel: bool,
    pub read_message_history: bool,
    pub send_messages: bool,
    pub create_instant_invite: bool,
    pub manage_messages: bool,
    pub embed_links: bool,
    pub attach_files: bool,
    pub mention_everyone: bool,
    pub value: u64,
}

impl From<Permissions> for PermissionFlags {
    fn from(permissions: Permissions) -> Self {
        Self {
            administrator: permissions.contains(Permissions::ADMINISTRATOR),
            manage_guild: permissions.contains(Permissions::MANAGE_GUILD),
            manage_roles: permissions.contains(Permissions::MANAGE_ROLES),
            manage_channels: permissions.contains(Permissions::MANAGE_CHANNELS),
            kick_members: permissions.contains(Permissions::KICK_MEMBERS),
            ban_members: permissions.contains(Permissions::BAN_MEMBERS),
            view_audit_log: permissions.contains(Permissions::VIEW_AUDIT_LOG),
            view_channel: permissions.contains(Permissions::VIEW_CHANNEL),
            read_message_history: permissions.contains(Permissions::READ_MESSAGE_HISTORY),
            send_messages: permissions.contains(Permissions::SEND_MESSAGES),
            create_instant_invite: permissions.contains(Permissions::CREATE_INSTANT_INVITE),
            manage_messages: permissions.contains(Permissions::MANAGE_MESSAGES),
            embed_links: permissions.contains(Permissions::EMBED_LINKS),
            attach_files: permissions.contains(Permissions::ATTACH_FILES),
            mention_everyone: permissions.contains(Permissions::MENTION_EVERYONE),
            value: permissions.bits(),
        }
    }
}

impl PermissionFlags {
    /// Label/value pairs in display order
    pub fn entries(&self) -> [(&'static str, bool); 15] {
        [
            ("Administrator", self.administrator),
            ("Manage Guild", self.manage_guild),
            ("Manage Roles", self.manage_roles),
            ("Manage Channels", self.manage_channels),
            ("Kick Members", self.kick_members),
            ("Ban Members", self.ban_members),
            ("View Audit Log", self.view_audit_log),
            ("View Channel", self.view_channel),
            ("Read History", self.read_message_history),
            ("Send Messages", self.send_messages),
            ("Create Instant Invite", self.create_instant_invite),
            ("Manage Messages", self.manage_messages),
            ("Embed Links", self.embed_links),
            ("Attach Files", self.attach_files),
            ("Mention Everyone", self.mention_everyone),
        ]
    }
}
