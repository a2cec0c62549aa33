//! Wrapper issue wire formats.
//!
//! A wrapper issue's title encodes its source reference as a bracketed
//! prefix (`[acme/widgets#42] Fix bug`) and its body opens with a
//! provenance header. Both formats must round-trip exactly; the archive
//! closer recovers the source reference from nothing but the title.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use tracker::RepoName;

/// Reference to an issue in a source repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    /// Source repository.
    pub repo: RepoName,
    /// Issue number within the source repository.
    pub number: u64,
}

impl SourceRef {
    /// The bracketed reference token embedded in wrapper titles.
    #[must_use]
    pub fn token(&self) -> String {
        format!("[{}#{}]", self.repo, self.number)
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^#]+)#([0-9]+)\]").expect("valid reference pattern"))
}

/// Wrapper title for a source issue: `[owner/repo#number] <source title>`.
#[must_use]
pub fn wrapper_title(source: &SourceRef, source_title: &str) -> String {
    format!("{} {source_title}", source.token())
}

/// Recover the source reference from a wrapper title.
///
/// Returns `None` for titles without a parseable reference — not every
/// issue in a meta repository is a wrapper.
#[must_use]
pub fn parse_wrapper_title(title: &str) -> Option<SourceRef> {
    let captures = reference_re().captures(title)?;
    let repo = RepoName::new(captures.get(1)?.as_str()).ok()?;
    let number: u64 = captures.get(2)?.as_str().parse().ok()?;
    Some(SourceRef { repo, number })
}

/// Wrapper body: provenance header, separator, then the source body verbatim.
#[must_use]
pub fn provenance_body(source: &SourceRef, source_body: &str) -> String {
    format!(
        "## Source Issue\n\
         Repository: {repo}\n\
         Issue: #{number}\n\
         Link: https://github.com/{repo}/issues/{number}\n\
         \n\
         ---\n\
         {source_body}",
        repo = source.repo,
        number = source.number,
    )
}
