//! Error classifier (spec §4.1, "L1"): maps the textual form of an
//! error to a retry disposition and a category tag. Total and
//! deterministic for any string input -- no I/O, no state.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Retry disposition for a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Transient,
    Permanent,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        })
    }
}

/// Category tag attached alongside [`Kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Network,
    RateLimit,
    Auth,
    Server,
    Validation,
    NotFound,
    ContentPolicy,
    Unknown,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::Server => "server",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::ContentPolicy => "content_policy",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The result of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: Kind,
    pub category: Category,
}

impl Classification {
    pub fn is_transient(&self) -> bool {
        self.kind == Kind::Transient
    }
}

struct Pattern {
    kind: Kind,
    category: Category,
    regex: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("classifier pattern is a fixed, tested regex")
}

/// Ordered list of patterns; the first match wins (spec §4.1's decision
/// order). Permanent patterns are checked before transient ones so that,
/// e.g., a "404 not found" error is never mistaken for a generic 4xx.
static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        // --- permanent: auth / identity ---
        Pattern {
            kind: Kind::Permanent,
            category: Category::Auth,
            regex: compile(r"(?i)\b(401|unauthorized|forbidden|invalid api key|invalid[_ ]?token|authentication failed)\b"),
        },
        // --- permanent: validation ---
        Pattern {
            kind: Kind::Permanent,
            category: Category::Validation,
            regex: compile(r"(?i)\b(400|bad request|invalid argument|validation failed|malformed)\b"),
        },
        // --- permanent: not found ---
        Pattern {
            kind: Kind::Permanent,
            category: Category::NotFound,
            regex: compile(r"(?i)\b(404|not found|no such (file|resource|task|session)|does not exist)\b"),
        },
        // --- permanent: content policy ---
        Pattern {
            kind: Kind::Permanent,
            category: Category::ContentPolicy,
            regex: compile(r"(?i)\b(content policy|content[- ]?filtered|moderation|safety filter|blocked by policy)\b"),
        },
        // --- transient: network ---
        Pattern {
            kind: Kind::Transient,
            category: Category::Network,
            regex: compile(r"(?i)\b(connection reset|connection refused|econnreset|econnrefused|timed? ?out|timeout|dns)\b"),
        },
        // --- transient: rate limit ---
        Pattern {
            kind: Kind::Transient,
            category: Category::RateLimit,
            regex: compile(r"(?i)\b(429|rate limit|too many requests)\b"),
        },
        // --- transient: server ---
        Pattern {
            kind: Kind::Transient,
            category: Category::Server,
            regex: compile(r"(?i)\b(5\d{2}|internal server error|bad gateway|gateway timeout|service unavailable)\b"),
        },
        // --- transient: generic retry markers ---
        Pattern {
            kind: Kind::Transient,
            category: Category::Unknown,
            regex: compile(r"(?i)\b(temporary|temporarily|retry|overloaded|capacity)\b"),
        },
    ]
});

/// Classify the textual form of `err`. Unrecognized text is treated as
/// `transient`/`unknown` -- the safer default, since an unknown error is
/// tried again rather than given up on (spec §4.1, decision 3).
pub fn classify(err: &impl fmt::Display) -> Classification {
    let text = err.to_string();
    for pattern in PATTERNS.iter() {
        if pattern.regex.is_match(&text) {
            return Classification {
                kind: pattern.kind,
                category: pattern.category,
            };
        }
    }
    Classification {
        kind: Kind::Transient,
        category: Category::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_is_permanent() {
        let c = classify(&"401 Unauthorized: invalid api key");
        assert_eq!(c.kind, Kind::Permanent);
        assert_eq!(c.category, Category::Auth);
    }

    #[test]
    fn not_found_beats_generic_4xx_reading() {
        let c = classify(&"404: task not found");
        assert_eq!(c.kind, Kind::Permanent);
        assert_eq!(c.category, Category::NotFound);
    }

    #[test]
    fn connection_reset_is_transient_network() {
        let c = classify(&"Error: connection reset by peer");
        assert_eq!(c.kind, Kind::Transient);
        assert_eq!(c.category, Category::Network);
    }

    #[test]
    fn rate_limit_is_transient() {
        let c = classify(&"429 Too Many Requests");
        assert_eq!(c.kind, Kind::Transient);
        assert_eq!(c.category, Category::RateLimit);
    }

    #[test]
    fn server_5xx_is_transient() {
        let c = classify(&"502 Bad Gateway");
        assert_eq!(c.kind, Kind::Transient);
        assert_eq!(c.category, Category::Server);
    }

    #[test]
    fn content_policy_is_permanent() {
        let c = classify(&"Response blocked by policy: content filtered");
        assert_eq!(c.kind, Kind::Permanent);
        assert_eq!(c.category, Category::ContentPolicy);
    }

    #[test]
    fn unrecognized_text_defaults_to_transient_unknown() {
        let c = classify(&"something weird happened");
        assert_eq!(c.kind, Kind::Transient);
        assert_eq!(c.category, Category::Unknown);
    }

    #[test]
    fn is_case_insensitive() {
        let c = classify(&"CONNECTION RESET");
        assert_eq!(c.kind, Kind::Transient);
        assert_eq!(c.category, Category::Network);
    }

    #[test]
    fn accepts_any_display_not_just_string() {
        #[derive(Debug)]
        struct MyErr;
        impl fmt::Display for MyErr {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "upstream returned 503 service unavailable")
            }
        }
        let c = classify(&MyErr);
        assert_eq!(c.kind, Kind::Transient);
        assert_eq!(c.category, Category::Server);
    }
}
