//! JSON pointer helpers
//!
//! Resource keys are user-chosen, so every segment is escaped before it is
//! joined (`~` becomes `~0`, `/` becomes `~1`).

use std::borrow::Cow;

/// Escape one pointer segment
#[must_use]
pub fn escape(segment: &str) -> Cow<'_, str> {
    if segment.contains(['~', '/']) {
        Cow::Owned(segment.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Build a pointer from raw segments
///
/// ```rust
/// use flagshift_patch::pointer;
/// assert_eq!(pointer::join(&["environments", "prod/eu"]), "/environments/prod~1eu");
/// ```
#[must_use]
pub fn join(segments: &[&str]) -> String {
    segments.iter().fold(String::new(), |mut out, segment| {
        out.push('/');
        out.push_str(&escape(segment));
        out
    })
}

/// Append a raw segment to an already-built pointer
#[must_use]
pub fn child(base: &str, segment: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), escape(segment))
}
