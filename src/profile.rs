//! Profile view for the logged-in user.
//!
//! Only the email comes from the session. The remaining fields are fixed
//! placeholders; edits are accepted but never persisted.

use crate::session::Session;
use serde::Serialize;
use std::fmt;

pub const LOGIN_REQUIRED: &str = "Please log in to view your profile";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email: String,
    pub display_name: String,
    pub bio: String,
    pub timezone: String,
    pub notifications: bool,
    pub plan: String,
}

impl Profile {
    /// Build the profile for `session`; `None` when logged out
    pub fn for_session(session: &Session) -> Option<Self> {
        let user = session.user()?;
        Some(Self {
            email: user.email.clone(),
            display_name: "Anjay".to_string(),
            bio: "Video editor and content creator".to_string(),
            timezone: "UTC-5".to_string(),
            notifications: true,
            plan: "Free Plan".to_string(),
        })
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Email:         {}", self.email)?;
        writeln!(f, "Display name:  {}", self.display_name)?;
        writeln!(f, "Bio:           {}", self.bio)?;
        writeln!(f, "Timezone:      {}", self.timezone)?;
        writeln!(
            f,
            "Notifications: {}",
            if self.notifications { "on" } else { "off" }
        )?;
        write!(f, "Plan:          {}", self.plan)
    }
}
