//! Collects `RUN --mount=type=cache,...` declarations.
//!
//! Each matching flag is split into its `key=value` options, `$NAME`
//! references in the values are replaced from [`BuildArgs`], and the options
//! are stored under `.cache-<id>` (or `.cache-<target>` when there is no
//! `id`), kebab-cased. A later mount with the same key replaces an earlier one.

use serde::Serialize;
use tracing::{debug, warn};

use crate::build_args::BuildArgs;
use crate::error::Error;
use crate::model::Node;
use crate::ordered::OrderedMap;

pub const CACHE_MOUNT_MARKER: &str = "--mount=type=cache";

const MOUNT_PREFIX: &str = "--mount=";
const KEY_PREFIX: &str = ".cache-";

pub type MountOptions = OrderedMap<String>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct CacheMounts {
    pub mounts: OrderedMap<MountOptions>,
    /// Flags that looked like cache mounts but whose options did not parse.
    #[serde(skip)]
    pub skipped: Vec<SkippedMount>,
}

impl CacheMounts {
    pub fn get(&self, key: &str) -> Option<&MountOptions> {
        self.mounts.get(key)
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMount {
    pub line: usize,
    pub flag: String,
    pub reason: String,
}

pub fn list_cache_mounts(root: &Node, args: &BuildArgs) -> CacheMounts {
    let mut result = CacheMounts::default();

    for run in root.children.iter().filter(|child| child.is_instruction("RUN")) {
        for flag in run.flags.iter().filter(|flag| flag.contains(CACHE_MOUNT_MARKER)) {
            let mut options = match parse_mount_options(flag) {
                Ok(options) => options,
                Err(err) => {
                    warn!(line = run.start_line, error = %err, "skipping cache mount");
                    result.skipped.push(SkippedMount {
                        line: run.start_line,
                        flag: flag.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            for value in options.values_mut() {
                *value = args.substitute(value);
            }

            let Some(key) = cache_key(&options) else {
                debug!(line = run.start_line, flag = %flag, "cache mount has no id or target");
                continue;
            };

            if result.mounts.insert(key.clone(), options).is_some() {
                debug!(key = %key, line = run.start_line, "cache mount redefined");
            }
        }
    }

    result
}

/// Splits a `--mount=` flag into its options, in order of appearance.
///
/// Values are either a double-quoted span (quotes removed) or run up to the
/// next comma or whitespace. Words without `=` are ignored.
pub fn parse_mount_options(flag: &str) -> Result<MountOptions, Error> {
    let mut options = MountOptions::new();
    let mut rest = flag.strip_prefix(MOUNT_PREFIX).unwrap_or(flag);

    loop {
        rest = rest.trim_start_matches(|ch: char| ch == ',' || ch.is_whitespace());
        if rest.is_empty() {
            return Ok(options);
        }

        let key_end = rest
            .find(|ch: char| ch == '=' || ch == ',' || ch.is_whitespace())
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        rest = &rest[key_end..];

        let Some(after_eq) = rest.strip_prefix('=') else {
            continue;
        };
        if key.is_empty() {
            rest = after_eq;
            continue;
        }

        let (value, remaining) = match after_eq.strip_prefix('"') {
            Some(quoted) => {
                let close = quoted.find('"').ok_or_else(|| {
                    Error::option_parse(flag, format!("unterminated quote in value of '{key}'"))
                })?;
                (&quoted[..close], &quoted[close + 1..])
            }
            None => {
                let end = after_eq
                    .find(|ch: char| ch == ',' || ch.is_whitespace())
                    .unwrap_or(after_eq.len());
                after_eq.split_at(end)
            }
        };
        rest = remaining;

        if key != "--mount" {
            options.insert(key, value.to_string());
        }
    }
}

/// `.cache-<id>`, falling back to `.cache-<target>`. Values that kebab-case
/// to nothing count as absent.
pub fn cache_key(options: &MountOptions) -> Option<String> {
    ["id", "target"]
        .into_iter()
        .filter_map(|name| options.get(name))
        .map(|value| kebab_case(value))
        .find(|key| !key.is_empty())
        .map(|key| format!("{KEY_PREFIX}{key}"))
}

/// Lowercase words joined by `-`.
///
/// Words are runs of ASCII letters and digits, further split at a lower to
/// upper case change, at letter/digit boundaries, and before the last capital
/// of an acronym (`HTTPServer` is `http-server`).
pub fn kebab_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);
    let mut separated = false;

    for (index, &ch) in chars.iter().enumerate() {
        if !ch.is_ascii_alphanumeric() {
            separated = true;
            continue;
        }

        let prev = index.checked_sub(1).and_then(|prev| chars.get(prev)).copied();
        let next = chars.get(index + 1).copied();
        let boundary = prev.is_some_and(|prev| word_boundary(prev, ch, next));
        if (separated || boundary) && !out.is_empty() {
            out.push('-');
        }
        separated = false;
        out.push(ch.to_ascii_lowercase());
    }

    out
}

fn word_boundary(prev: char, ch: char, next: Option<char>) -> bool {
    (prev.is_ascii_lowercase() && ch.is_ascii_uppercase())
        || (prev.is_ascii_alphabetic() && ch.is_ascii_digit())
        || (prev.is_ascii_digit() && ch.is_ascii_alphabetic())
        || (prev.is_ascii_uppercase()
            && ch.is_ascii_uppercase()
            && next.is_some_and(|next| next.is_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use crate::build_args::{BuildArgs, Platform};
    use crate::cache_mount::{
        CacheMounts, MountOptions, cache_key, kebab_case, list_cache_mounts, parse_mount_options,
    };
    use crate::error::Error;
    use crate::parser::parse_dockerfile;

    fn extract(dockerfile: &str, overrides: &[&str]) -> CacheMounts {
        let parsed = parse_dockerfile(dockerfile).expect("dockerfile should parse");
        let args = BuildArgs::new(&Platform::new("linux", "amd64"), overrides);
        list_cache_mounts(&parsed.ast, &args)
    }

    fn options(pairs: &[(&str, &str)]) -> MountOptions {
        pairs
            .iter()
            .map(|(key, value)| (*key, value.to_string()))
            .collect()
    }

    #[test]
    fn keys_go_build_cache_by_target() {
        let mounts = extract(
            "FROM alpine AS builder\n\
             RUN --mount=type=cache,target=/root/.cache/go-build go build .\n\
             FROM builder AS final\n",
            &[],
        );

        assert_eq!(mounts.len(), 1);
        assert_eq!(
            mounts.get(".cache-root-cache-go-build"),
            Some(&options(&[("type", "cache"), ("target", "/root/.cache/go-build")]))
        );
        assert_eq!(
            serde_json::to_string(&mounts).expect("mounts should serialize"),
            r#"{".cache-root-cache-go-build":{"type":"cache","target":"/root/.cache/go-build"}}"#
        );
    }

    #[test]
    fn id_takes_precedence_over_target() {
        let mounts = extract(
            "FROM alpine\nRUN --mount=type=cache,id=myid,target=/x make\n",
            &[],
        );
        assert_eq!(mounts.mounts.keys().collect::<Vec<_>>(), vec![".cache-myid"]);
    }

    #[test]
    fn later_mount_with_same_key_wins() {
        let mounts = extract(
            "FROM alpine\n\
             RUN --mount=type=cache,target=/var/cache/apk --mount=type=cache,target=/var/cache/apk,sharing=locked apk add git\n",
            &[],
        );

        assert_eq!(mounts.len(), 1);
        assert_eq!(
            mounts.get(".cache-var-cache-apk"),
            Some(&options(&[
                ("type", "cache"),
                ("target", "/var/cache/apk"),
                ("sharing", "locked"),
            ]))
        );
    }

    #[test]
    fn keeps_encounter_order_across_instructions() {
        let mounts = extract(
            "FROM alpine\n\
             RUN --mount=type=cache,id=zeta,target=/z true\n\
             RUN --mount=type=bind,target=/src --mount=type=cache,id=alpha,target=/a true\n",
            &[],
        );
        assert_eq!(
            mounts.mounts.keys().collect::<Vec<_>>(),
            vec![".cache-zeta", ".cache-alpha"]
        );
    }

    #[test]
    fn substitutes_build_args_before_deriving_keys() {
        let mounts = extract(
            "FROM alpine\nRUN --mount=type=cache,id=go-$BUILDPLATFORM,target=$GOCACHE/build go build\n",
            &["GOCACHE=/root/.cache"],
        );

        let (key, mount) = mounts.mounts.iter().next().expect("one mount");
        assert_eq!(key, ".cache-go-linux-amd-64");
        assert_eq!(mount.get("id").map(String::as_str), Some("go-linux/amd64"));
        assert_eq!(mount.get("target").map(String::as_str), Some("/root/.cache/build"));
    }

    #[test]
    fn skips_mounts_without_id_or_target() {
        let mounts = extract(
            "FROM alpine\nRUN --mount=type=cache,sharing=private true\n",
            &[],
        );
        assert!(mounts.is_empty());
        assert!(mounts.skipped.is_empty());
    }

    #[test]
    fn ignores_non_run_instructions_and_other_mount_types() {
        let mounts = extract(
            "FROM alpine\n\
             COPY --mount=type=cache,target=/x . .\n\
             RUN --mount=type=secret,id=token cat /run/secrets/token\n\
             RUN echo --mount=type=cache,target=/y\n",
            &[],
        );
        assert!(mounts.is_empty());
        assert_eq!(serde_json::to_string(&mounts).expect("serialize"), "{}");
    }

    #[test]
    fn malformed_mount_is_skipped_and_extraction_continues() {
        let mounts = extract(
            "FROM alpine\n\
             RUN --mount=type=cache,id=x\"y,target=\"/a true\n\
             RUN --mount=type=cache,target=/b true\n",
            &[],
        );

        assert_eq!(mounts.mounts.keys().collect::<Vec<_>>(), vec![".cache-b"]);
        assert_eq!(mounts.skipped.len(), 1);
        assert_eq!(mounts.skipped[0].line, 2);
        assert!(mounts.skipped[0].reason.contains("unterminated quote"));
    }

    #[test]
    fn unclosed_quote_in_mount_skips_only_that_flag() {
        let mounts = extract(
            "FROM alpine\n\
             RUN --mount=type=cache,target=\"/root/.npm npm ci\n\
             RUN --mount=type=cache,target=/b true\n",
            &[],
        );

        assert_eq!(
            serde_json::to_string(&mounts).expect("mounts should serialize"),
            r#"{".cache-b":{"type":"cache","target":"/b"}}"#
        );
        assert_eq!(mounts.skipped.len(), 1);
        assert_eq!(mounts.skipped[0].line, 2);
        assert_eq!(
            mounts.skipped[0].flag,
            "--mount=type=cache,target=\"/root/.npm npm ci"
        );
    }

    #[test]
    fn parses_quoted_values_and_ignores_bare_words() {
        let parsed =
            parse_mount_options("--mount=type=cache,id=\"pip cache\",target=/root/.cache/pip,ro")
                .expect("options should parse");

        assert_eq!(
            parsed,
            options(&[
                ("type", "cache"),
                ("id", "pip cache"),
                ("target", "/root/.cache/pip"),
            ])
        );
        assert_eq!(cache_key(&parsed).as_deref(), Some(".cache-pip-cache"));
    }

    #[test]
    fn unterminated_quoted_value_is_an_error() {
        let err = parse_mount_options("--mount=type=cache,target=\"/root/.npm")
            .expect_err("unterminated quote should fail");
        assert!(matches!(err, Error::OptionParse { .. }));
    }

    #[test]
    fn values_may_contain_equals_signs() {
        let parsed = parse_mount_options("--mount=type=cache,id=a=b,target=/x")
            .expect("options should parse");
        assert_eq!(parsed.get("id").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn empty_identifiers_fall_back_or_skip() {
        assert_eq!(
            cache_key(&options(&[("id", "//"), ("target", "/data")])).as_deref(),
            Some(".cache-data")
        );
        assert_eq!(cache_key(&options(&[("type", "cache")])), None);
    }

    #[test]
    fn kebab_case_normalizes_separators() {
        assert_eq!(kebab_case("/root/.cache/go-build"), "root-cache-go-build");
        assert_eq!(kebab_case("My_Cache ID"), "my-cache-id");
        assert_eq!(kebab_case("--already-kebab--"), "already-kebab");
        assert_eq!(kebab_case(""), "");
    }

    #[test]
    fn kebab_case_splits_case_and_digit_boundaries() {
        assert_eq!(kebab_case("GoBuild"), "go-build");
        assert_eq!(kebab_case("pip311"), "pip-311");
        assert_eq!(kebab_case("npmCache"), "npm-cache");
        assert_eq!(kebab_case("HTTPServer"), "http-server");
        assert_eq!(kebab_case("go-linux/amd64"), "go-linux-amd-64");
        assert_eq!(kebab_case("3rdParty"), "3-rd-party");
    }

    #[test]
    fn kebab_case_is_idempotent() {
        for input in [
            "/root/.cache/go-build",
            "Go Build__Cache",
            "a//b..c",
            "linux/amd64",
            "GoBuild",
            "pip311",
            "HTTPServer2Go",
        ] {
            let once = kebab_case(input);
            assert_eq!(kebab_case(&once), once);
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let dockerfile = "FROM alpine\n\
                          RUN --mount=type=cache,id=$BUILDOS,target=/a --mount=type=cache,target=/b true\n";
        let first = serde_json::to_string(&extract(dockerfile, &["X=1"])).expect("serialize");
        let second = serde_json::to_string(&extract(dockerfile, &["X=1"])).expect("serialize");
        assert_eq!(first, second);
    }
}
