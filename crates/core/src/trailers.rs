//! Commit-message trailer extraction.
//!
//! Trailers are `Key: Name <email>` lines carrying collaboration roles
//! (`Co-authored-by`, `Reviewed-by`, ...). Keys are matched
//! case-insensitively against a fixed allow-list that folds the many
//! aliases seen in real histories onto canonical role names; one alias
//! can map to several roles (`Acked-and-tested-by` is both a review and
//! a test). Unrecognised keys and malformed values are silently dropped.

use std::sync::OnceLock;

use regex::Regex;

/// One extracted collaboration role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    pub role: &'static str,
    pub name: String,
    pub email: String,
}

fn trailer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>[A-Za-z0-9-]+):[ \t]+(?P<value>.+)$")
            .expect("trailer pattern is valid")
    })
}

/// Map a lower-cased trailer key to its canonical role name(s).
fn allowed_roles(key: &str) -> Option<&'static [&'static str]> {
    let roles: &'static [&'static str] = match key {
        "reviewed-by" | "reviewed" | "review-by" | "acked-by" | "ack" | "acked"
        | "acknowledged-by" | "analyzed-by" | "analysed-by" | "checked-by"
        | "confirmed-by" | "suggested-by" | "verified-by" => &["Reviewed-by"],
        "co-authored-by" | "coauthored-by" | "co-author" | "additional-author"
        | "also-written-by" | "written-by" | "original-author" | "original-patch-by"
        | "based-on-patch-by" | "patch-by" => &["Co-authored-by"],
        "reported-by" | "reported" | "report-by" | "spotted-by" | "noticed-by"
        | "noted-by" | "found-by" | "bug-found-by" => &["Reported-by"],
        "tested-by" | "tested" | "test-by" => &["Tested-by"],
        "signed-off-by" | "signed-off" | "signed-by" | "signoff-by" | "sign-off-by" => {
            &["Signed-off-by"]
        }
        "influenced-by" | "inspired-by" => &["Influenced-by"],
        "informed-by" => &["Informed-by"],
        "resolved-by" | "fixed-by" | "solved-by" => &["Resolved-by"],
        "approved-by" => &["Approved-by"],
        "committed-by" => &["Committed-by"],
        "acked-and-tested-by" => &["Reviewed-by", "Tested-by"],
        "reported-and-tested-by" | "also-reported-and-tested-by" => {
            &["Reported-by", "Tested-by"]
        }
        _ => return None,
    };
    Some(roles)
}

/// Scan a full commit message and return every recognised trailer role.
pub fn parse_trailers(message: &str) -> Vec<Trailer> {
    let mut out = Vec::new();
    for line in message.lines() {
        let line = line.trim_end_matches('\r').trim();
        if line.is_empty() {
            continue;
        }
        let Some(caps) = trailer_pattern().captures(line) else {
            continue;
        };
        let key = caps["name"].trim().to_lowercase();
        let Some(roles) = allowed_roles(&key) else {
            continue;
        };

        // Expected value shape: Name <email>
        let value = caps["value"].trim();
        let Some((name_part, rest)) = value.split_once('<') else {
            continue;
        };
        let Some((email_part, _)) = rest.split_once('>') else {
            continue;
        };
        let name = name_part.trim();
        let email = email_part.trim();
        if name.is_empty() || email.is_empty() {
            continue;
        }

        for role in roles {
            out.push(Trailer {
                role,
                name: name.to_string(),
                email: email.to_string(),
            });
        }
    }
    out
}
