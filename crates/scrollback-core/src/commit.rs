//! Version-control activity detection in tool commands and tool output.
//!
//! Two independent passes, both total over their input (a non-match is an
//! empty result, never an error):
//!
//! - [`commit_intent`] reads the message a shell command is trying to
//!   commit. A heredoc body (`-m "$(cat <<'EOF' ... EOF)"`) takes priority
//!   over a simple quoted `-m "..."` / `--message=...` argument, because a
//!   heredoc command also contains a quoted `-m` wrapping the heredoc.
//! - [`commits_in_output`] finds every `[<branch> <hash>] <message>` line
//!   that git prints when a commit is created, in order of appearance.

use once_cell::sync::Lazy;
use regex::Regex;

static GIT_COMMIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bgit\s+(?:-C\s+\S+\s+)?commit\b").expect("Invalid git commit regex")
});

static HEREDOC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<<-?\s*['"]?([A-Za-z_][A-Za-z0-9_]*)['"]?"#).expect("Invalid heredoc regex")
});

static QUOTED_MESSAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:\s-[a-zA-Z]*m\s*|\s--message[=\s]\s*)(?:"((?:[^"\\]|\\.)*)"|'([^']*)')"#)
        .expect("Invalid quoted message regex")
});

// Branch tokens: word chars, spaces, slashes, hyphens (plus dots and the
// parentheses of "(root-commit)"). Hash: 7-40 hex characters.
static COMMIT_OUTPUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([\w/.() -]+?)\s+([0-9a-fA-F]{7,40})\][ \t]*([^\r\n]*)")
        .expect("Invalid commit output regex")
});

/// A commit as printed in tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCommit {
    pub hash: String,
    pub branch: Option<String>,
    pub message: String,
}

/// The first line of the commit message a shell command attempts to record.
pub fn commit_intent(command: &str) -> Option<String> {
    let commit_at = GIT_COMMIT_RE.find(command)?.end();
    let args = &command[commit_at..];

    heredoc_message(args).or_else(|| quoted_message(args))
}

/// Every commit announced in a tool result body, in order.
pub fn commits_in_output(body: &str) -> Vec<ExtractedCommit> {
    COMMIT_OUTPUT_RE
        .captures_iter(body)
        .filter_map(|caps| {
            let branch = caps.get(1)?.as_str().trim();
            let hash = caps.get(2)?.as_str();
            let message = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
            Some(ExtractedCommit {
                hash: hash.to_lowercase(),
                branch: (!branch.is_empty()).then(|| branch.to_string()),
                message: message.to_string(),
            })
        })
        .collect()
}

fn heredoc_message(args: &str) -> Option<String> {
    let caps = HEREDOC_RE.captures(args)?;
    let delimiter = caps.get(1)?.as_str();
    let after_marker = &args[caps.get(0)?.end()..];
    let body = &after_marker[after_marker.find('\n')? + 1..];

    let lines: Vec<&str> = body
        .lines()
        .take_while(|line| line.trim() != delimiter)
        .collect();
    first_line(&lines.join("\n"))
}

fn quoted_message(args: &str) -> Option<String> {
    let caps = QUOTED_MESSAGE_RE.captures(args)?;
    let raw = match (caps.get(1), caps.get(2)) {
        (Some(double), _) => double.as_str().replace("\\\"", "\""),
        (None, Some(single)) => single.as_str().to_string(),
        (None, None) => return None,
    };
    first_line(&raw)
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_intent_table() {
        let cases: &[(&str, Option<&str>)] = &[
            (r#"git commit -m "fix: bug""#, Some("fix: bug")),
            ("git commit -m 'fix: bug'", Some("fix: bug")),
            (r#"git add . && git commit -am "wip: save""#, Some("wip: save")),
            (r#"git commit --message="docs: readme""#, Some("docs: readme")),
            (r#"git -C /repo commit -m "chore: bump""#, Some("chore: bump")),
            (r#"git commit -m "say \"hi\"""#, Some(r#"say "hi""#)),
            (
                "git commit -m \"$(cat <<'EOF'\nfeat: add parser\n\nLonger body here.\nEOF\n)\"",
                Some("feat: add parser"),
            ),
            (
                "git commit -m \"$(cat <<EOF\n\n  refactor: split module\nEOF\n)\"",
                Some("refactor: split module"),
            ),
            ("git commit -m \"first line\nsecond line\"", Some("first line")),
            ("git status", None),
            ("git commit", None),
            ("echo 'git log -m \"nope\"'", None),
            ("", None),
        ];

        for (command, expected) in cases {
            assert_eq!(
                commit_intent(command).as_deref(),
                *expected,
                "command: {:?}",
                command
            );
        }
    }

    #[test]
    fn test_heredoc_takes_priority_over_quoted() {
        let command = "git commit -m \"$(cat <<'EOF'\nreal message\nEOF\n)\"";
        assert_eq!(commit_intent(command).as_deref(), Some("real message"));
    }

    #[test]
    fn test_single_commit_in_output() {
        let commits = commits_in_output("[main a6ab2d7] fix: resolve bug");
        assert_eq!(
            commits,
            vec![ExtractedCommit {
                hash: "a6ab2d7".to_string(),
                branch: Some("main".to_string()),
                message: "fix: resolve bug".to_string(),
            }]
        );
    }

    #[test]
    fn test_commits_in_output_table() {
        let cases: &[(&str, &[(&str, &str, &str)])] = &[
            (
                "[main abc1234] First commit\n[main def5678] Second commit",
                &[
                    ("abc1234", "main", "First commit"),
                    ("def5678", "main", "Second commit"),
                ],
            ),
            (
                "[detached HEAD 1a2b3c4] rebase step",
                &[("1a2b3c4", "detached HEAD", "rebase step")],
            ),
            (
                "[feature/login-form 0123456789abcdef0123456789abcdef01234567] feat: form",
                &[(
                    "0123456789abcdef0123456789abcdef01234567",
                    "feature/login-form",
                    "feat: form",
                )],
            ),
            (
                "[main (root-commit) fedcba9] Initial commit\n 3 files changed",
                &[("fedcba9", "main (root-commit)", "Initial commit")],
            ),
            (
                "Running hooks...\r\n[dev 7654321] chore: lint\r\n 1 file changed",
                &[("7654321", "dev", "chore: lint")],
            ),
            ("[main abc12] too short", &[]),
            ("[main not-a-hash] message", &[]),
            ("nothing to commit, working tree clean", &[]),
            ("", &[]),
        ];

        for (body, expected) in cases {
            let found: Vec<(String, String, String)> = commits_in_output(body)
                .into_iter()
                .map(|c| (c.hash, c.branch.unwrap_or_default(), c.message))
                .collect();
            let expected: Vec<(String, String, String)> = expected
                .iter()
                .map(|(h, b, m)| (h.to_string(), b.to_string(), m.to_string()))
                .collect();
            assert_eq!(found, expected, "body: {:?}", body);
        }
    }
}
