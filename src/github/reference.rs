// src/github/reference.rs
// =============================================================================
// Turns the folder URL a user copies out of their browser into the pieces
// the contents API needs: owner, repository, branch, and path.
//
// Supported formats:
//   - https://github.com/owner/repo/tree/branch/path/to/folder
//   - github.com/owner/repo/tree/branch/path/to/folder   (scheme optional)
//   - https://github.com/owner/repo/tree/branch          (repository root)
//
// The first segment after "tree" is taken as the branch. Branch names that
// contain '/' can't be told apart from the path in this URL shape, so they
// aren't supported.
// =============================================================================

use crate::error::ReferenceError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// A folder inside a GitHub repository at a given branch or ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Folder path inside the repository, '/'-separated, no leading slash.
    /// Empty means the repository root.
    pub path: String,
}

impl RepoRef {
    /// Parses a GitHub folder URL.
    ///
    /// Fails fast on anything that isn't a github.com `/tree/` URL, before
    /// any network call is made.
    pub fn parse(input: &str) -> Result<Self, ReferenceError> {
        let trimmed = input.trim();

        // Accept "github.com/..." without a scheme, like people often paste
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };

        let url = Url::parse(&with_scheme)
            .map_err(|_| ReferenceError::Malformed(input.to_string()))?;

        let host = url.host_str().unwrap_or_default();
        if host != "github.com" && host != "www.github.com" {
            return Err(ReferenceError::NotGithub(host.to_string()));
        }

        let segments: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(decode_segment)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
            .map_err(|_| ReferenceError::Malformed(input.to_string()))?
            .unwrap_or_default();

        // owner / repo / "tree" / branch [/ path...]
        if segments.len() < 4 || segments[2] != "tree" {
            return Err(ReferenceError::NotAFolder(input.to_string()));
        }

        // Url already collapses literal dot segments; escaped ones show up here
        if segments
            .iter()
            .any(|s| s == "." || s == ".." || s.contains('/'))
        {
            return Err(ReferenceError::Malformed(input.to_string()));
        }

        let owner = segments[0].clone();
        let repo = segments[1].trim_end_matches(".git").to_string();
        let branch = segments[3].clone();
        let path = segments[4..].join("/");

        if repo.is_empty() {
            return Err(ReferenceError::NotAFolder(input.to_string()));
        }

        Ok(RepoRef {
            owner,
            repo,
            branch,
            path,
        })
    }

    /// Joins a path relative to this folder onto the folder's repo path.
    pub fn repo_path(&self, relative: &str) -> String {
        join_path(&self.path, relative)
    }
}

impl FromStr for RepoRef {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RepoRef::parse(s)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)?;
        if !self.path.is_empty() {
            write!(f, ":{}", self.path)?;
        }
        Ok(())
    }
}

/// Joins two '/'-separated paths, either of which may be empty.
pub fn join_path(base: &str, child: &str) -> String {
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, child),
    }
}

fn decode_segment(segment: &str) -> Result<String, std::string::FromUtf8Error> {
    urlencoding::decode(segment).map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_folder_url() {
        let r = RepoRef::parse(
            "https://github.com/aws/aws-sdk-js-v3/tree/main/codegen/sdk-codegen/aws-models",
        )
        .unwrap();
        assert_eq!(r.owner, "aws");
        assert_eq!(r.repo, "aws-sdk-js-v3");
        assert_eq!(r.branch, "main");
        assert_eq!(r.path, "codegen/sdk-codegen/aws-models");
    }

    #[test]
    fn test_parse_without_scheme_and_trailing_slash() {
        let r = RepoRef::parse("www.github.com/user/repo/tree/dev/docs/").unwrap();
        assert_eq!(r.owner, "user");
        assert_eq!(r.branch, "dev");
        assert_eq!(r.path, "docs");
    }

    #[test]
    fn test_parse_repository_root() {
        let r = RepoRef::parse("https://github.com/user/repo/tree/main").unwrap();
        assert_eq!(r.path, "");
        assert_eq!(r.to_string(), "user/repo@main");
    }

    #[test]
    fn test_parse_decodes_percent_escapes() {
        let r = RepoRef::parse("https://github.com/u/r/tree/main/my%20docs/a").unwrap();
        assert_eq!(r.path, "my docs/a");
    }

    #[test]
    fn test_reject_other_hosts() {
        let err = RepoRef::parse("https://gitlab.com/user/repo/tree/main/x").unwrap_err();
        assert_eq!(err, ReferenceError::NotGithub("gitlab.com".into()));
    }

    #[test]
    fn test_reject_non_folder_urls() {
        assert!(matches!(
            RepoRef::parse("https://github.com/user/repo"),
            Err(ReferenceError::NotAFolder(_))
        ));
        assert!(matches!(
            RepoRef::parse("https://github.com/user/repo/blob/main/README.md"),
            Err(ReferenceError::NotAFolder(_))
        ));
    }

    #[test]
    fn test_reject_dot_segments() {
        assert!(matches!(
            RepoRef::parse("https://github.com/u/r/tree/main/%2E%2E%2Fetc"),
            Err(ReferenceError::Malformed(_))
        ));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "a.txt"), "a.txt");
        assert_eq!(join_path("docs", ""), "docs");
        assert_eq!(join_path("docs", "sub/a.txt"), "docs/sub/a.txt");
    }
}
