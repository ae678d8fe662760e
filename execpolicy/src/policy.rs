use std::collections::HashMap;

use tracing::debug;
use warden_protocol::ExecutionMode;
use warden_protocol::PermissionSet;

use crate::decision::AllowReason;
use crate::decision::Decision;
use crate::decision::DenyReason;
use crate::whitelist::find_match;

/// Per-mission permission sets, consulted before any command runs.
///
/// Missions without a registered set are unrestricted.
#[derive(Clone, Debug, Default)]
pub struct PermissionPolicy {
    permissions: HashMap<String, PermissionSet>,
}

impl PermissionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_permissions(&mut self, mission_id: impl Into<String>, permissions: PermissionSet) {
        let mission_id = mission_id.into();
        debug!(mission_id = %mission_id, ?permissions, "registering mission permissions");
        self.permissions.insert(mission_id, permissions);
    }

    pub fn remove_permissions(&mut self, mission_id: &str) -> Option<PermissionSet> {
        self.permissions.remove(mission_id)
    }

    pub fn permissions(&self, mission_id: &str) -> Option<&PermissionSet> {
        self.permissions.get(mission_id)
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Blocked prefixes are checked first and always win. An allow-list, when
    /// present, must match; an empty allow-list therefore denies everything.
    pub fn check(&self, mission_id: Option<&str>, command: &str) -> Decision {
        let Some(mission_id) = mission_id else {
            return Decision::Allow(AllowReason::NoMission);
        };
        let Some(permissions) = self.permissions.get(mission_id) else {
            return Decision::Allow(AllowReason::NoRestrictions);
        };

        if let Some(pattern) = find_match(command, &permissions.blocked_commands) {
            return Decision::Deny(DenyReason::Blocked {
                pattern: pattern.to_string(),
            });
        }

        match &permissions.allowed_commands {
            Some(allowed) => match find_match(command, allowed) {
                Some(pattern) => Decision::Allow(AllowReason::MatchedAllowed {
                    pattern: pattern.to_string(),
                }),
                None => Decision::Deny(DenyReason::NotInAllowedList),
            },
            None => Decision::Allow(AllowReason::AllowedByDefault),
        }
    }

    /// The mission's mode override; `None` means use the caller's default.
    pub fn effective_mode(&self, mission_id: Option<&str>) -> Option<ExecutionMode> {
        self.lookup(mission_id)?.execution_mode
    }

    /// The mission's timeout cap in seconds. A zero cap is treated as absent.
    pub fn max_timeout(&self, mission_id: Option<&str>) -> Option<u64> {
        self.lookup(mission_id)?
            .max_timeout
            .filter(|seconds| *seconds > 0)
    }

    fn lookup(&self, mission_id: Option<&str>) -> Option<&PermissionSet> {
        self.permissions.get(mission_id?)
    }
}
