use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Category of content a newsletter announces. Each kind is gated by the
/// matching subscriber preference flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Project,
    Certificate,
    Skill,
    Career,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Project,
        ContentKind::Certificate,
        ContentKind::Skill,
        ContentKind::Career,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Project => "project",
            ContentKind::Certificate => "certificate",
            ContentKind::Skill => "skill",
            ContentKind::Career => "career",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Project => "Project",
            ContentKind::Certificate => "Certificate",
            ContentKind::Skill => "Skill",
            ContentKind::Career => "Career entry",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" | "projects" => Ok(ContentKind::Project),
            "certificate" | "certificates" => Ok(ContentKind::Certificate),
            "skill" | "skills" => Ok(ContentKind::Skill),
            "career" | "careers" => Ok(ContentKind::Career),
            other => Err(format!("Unknown content kind: {other}")),
        }
    }
}
