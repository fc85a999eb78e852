//! History rewrite engine.
//!
//! Streams the commit graph in topological order (parents before children),
//! applies the identity mapping to author and committer fields, writes the
//! rewritten objects through git plumbing, and finally repoints every ref to
//! its rewritten tip in place. Commit content (tree, message, parent
//! topology) is never touched; this is a metadata-only rewrite.
//!
//! Mapped identities are fixed points (enforced at mapping load time), so a
//! second run over already-rewritten history changes nothing: unchanged
//! commit bytes keep their object id and no ref moves.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use tracing::{debug, info};

use crate::domain::error::{MigrateError, Result};
use crate::domain::identity::IdentityMapping;
use crate::git::GitRunner;

/// Summary of a rewrite traversal.
///
/// `authors` is the set of distinct author identities observed, returned as
/// the traversal's fold value rather than accumulated in shared state.
#[derive(Debug, Default)]
pub struct RewriteOutcome {
    pub commits_seen: usize,
    pub commits_rewritten: usize,
    pub refs_updated: usize,
    pub authors: BTreeSet<String>,
}

/// Rewrite the full history of the repository at `repo_dir` in place.
///
/// Every ref ends up pointing at the rewritten graph; no ref reachable from
/// the original history survives. On any plumbing failure the repository is
/// left in an undefined state and the caller must discard the scratch
/// workspace that contains it.
pub fn rewrite_history(
    git: &GitRunner,
    repo_dir: &Path,
    mapping: &IdentityMapping,
) -> Result<RewriteOutcome> {
    let mut outcome = RewriteOutcome::default();
    // old commit id -> rewritten commit id; only changed commits get entries.
    let mut remap: HashMap<String, String> = HashMap::new();

    let mut stream = git
        .stream(repo_dir, &["rev-list", "--all", "--topo-order", "--reverse"])
        .map_err(MigrateError::RewriteFailed)?;
    for line in stream.by_ref() {
        let sha = line.map_err(MigrateError::RewriteFailed)?;
        rewrite_commit(git, repo_dir, mapping, &sha, &mut remap, &mut outcome)?;
    }
    stream.finish().map_err(MigrateError::RewriteFailed)?;

    update_refs(git, repo_dir, &remap, &mut outcome)?;
    info!(
        commits = outcome.commits_seen,
        rewritten = outcome.commits_rewritten,
        refs = outcome.refs_updated,
        "history rewrite complete"
    );
    Ok(outcome)
}

/// Collect the distinct author identities of the repository at `repo_dir`.
///
/// A dry traversal: nothing is written. Useful for deciding what belongs in
/// the identity-mapping table before a migration.
pub fn collect_authors(git: &GitRunner, repo_dir: &Path) -> Result<BTreeSet<String>> {
    let mut stream = git
        .stream(repo_dir, &["log", "--all", "--format=%an <%ae>"])
        .map_err(MigrateError::RewriteFailed)?;
    let mut authors = BTreeSet::new();
    for line in stream.by_ref() {
        authors.insert(line.map_err(MigrateError::RewriteFailed)?);
    }
    stream.finish().map_err(MigrateError::RewriteFailed)?;
    Ok(authors)
}

fn rewrite_commit(
    git: &GitRunner,
    repo_dir: &Path,
    mapping: &IdentityMapping,
    sha: &str,
    remap: &mut HashMap<String, String>,
    outcome: &mut RewriteOutcome,
) -> Result<()> {
    let raw = git
        .run(repo_dir, &["cat-file", "commit", sha])
        .map_err(MigrateError::RewriteFailed)?;
    let mut commit = RawObject::parse(&raw).map_err(MigrateError::RewriteFailed)?;
    outcome.commits_seen += 1;

    let mut changed = false;

    // Parents first: the topological traversal guarantees every parent has
    // already been processed, so remapped ids never dangle.
    for (key, value) in commit.headers.iter_mut() {
        if key.as_slice() == b"parent" {
            let parent = String::from_utf8_lossy(value).into_owned();
            if let Some(new_parent) = remap.get(&parent) {
                *value = new_parent.clone().into_bytes();
                changed = true;
            }
        }
    }

    let author = commit
        .ident(b"author")
        .map_err(MigrateError::RewriteFailed)?;
    outcome
        .authors
        .insert(String::from_utf8_lossy(&author.name).into_owned());

    if let Some(identity) = mapping.lookup(&author.name) {
        commit
            .set_ident(b"author", identity)
            .map_err(MigrateError::RewriteFailed)?;
        commit
            .set_ident(b"committer", identity)
            .map_err(MigrateError::RewriteFailed)?;
        changed = true;
    }

    if changed {
        let new_sha = hash_object(git, repo_dir, "commit", &commit.serialize())?;
        debug!(old = %sha, new = %new_sha, "rewrote commit");
        remap.insert(sha.to_string(), new_sha);
        outcome.commits_rewritten += 1;
    }
    Ok(())
}

/// Repoint every moved ref at its rewritten tip, overwriting in place.
///
/// Annotated tag objects are themselves rewritten (their `object` header
/// remapped) so tags keep their tagger, message and signature chain intact.
fn update_refs(
    git: &GitRunner,
    repo_dir: &Path,
    remap: &HashMap<String, String>,
    outcome: &mut RewriteOutcome,
) -> Result<()> {
    let listing = git
        .run(
            repo_dir,
            &["for-each-ref", "--format=%(refname) %(objectname) %(objecttype)"],
        )
        .map_err(MigrateError::RewriteFailed)?;
    let listing = String::from_utf8_lossy(&listing);

    let mut tag_remap: HashMap<String, String> = HashMap::new();
    for line in listing.lines() {
        let mut fields = line.split(' ');
        let (Some(refname), Some(sha), Some(objtype)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(MigrateError::RewriteFailed(format!(
                "unparseable for-each-ref line: {line:?}"
            )));
        };

        let new_sha = match objtype {
            "commit" => remap.get(sha).cloned(),
            "tag" => rewrite_tag(git, repo_dir, sha, remap, &mut tag_remap)?,
            // Refs to trees or blobs carry no identity; leave them alone.
            _ => None,
        };

        if let Some(new_sha) = new_sha {
            git.run(repo_dir, &["update-ref", refname, &new_sha])
                .map_err(MigrateError::RewriteFailed)?;
            debug!(%refname, %new_sha, "updated ref");
            outcome.refs_updated += 1;
        }
    }
    Ok(())
}

/// Rewrite an annotated tag whose target moved. Follows tag-of-tag chains.
fn rewrite_tag(
    git: &GitRunner,
    repo_dir: &Path,
    sha: &str,
    remap: &HashMap<String, String>,
    tag_remap: &mut HashMap<String, String>,
) -> Result<Option<String>> {
    if let Some(new_sha) = tag_remap.get(sha) {
        return Ok(Some(new_sha.clone()));
    }
    let raw = git
        .run(repo_dir, &["cat-file", "tag", sha])
        .map_err(MigrateError::RewriteFailed)?;
    let mut tag = RawObject::parse(&raw).map_err(MigrateError::RewriteFailed)?;

    let target = tag
        .header(b"object")
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .ok_or_else(|| MigrateError::RewriteFailed(format!("tag {sha} has no object header")))?;
    let target_type = tag
        .header(b"type")
        .map(|v| v.to_vec())
        .ok_or_else(|| MigrateError::RewriteFailed(format!("tag {sha} has no type header")))?;

    let new_target = match target_type.as_slice() {
        b"commit" => remap.get(&target).cloned(),
        b"tag" => rewrite_tag(git, repo_dir, &target, remap, tag_remap)?,
        _ => None,
    };

    let Some(new_target) = new_target else {
        return Ok(None);
    };

    for (key, value) in tag.headers.iter_mut() {
        if key.as_slice() == b"object" {
            *value = new_target.clone().into_bytes();
        }
    }
    let new_sha = hash_object(git, repo_dir, "tag", &tag.serialize())?;
    tag_remap.insert(sha.to_string(), new_sha.clone());
    Ok(Some(new_sha))
}

fn hash_object(git: &GitRunner, repo_dir: &Path, objtype: &str, bytes: &[u8]) -> Result<String> {
    let out = git
        .run_with_input(
            repo_dir,
            &["hash-object", "-t", objtype, "-w", "--stdin"],
            bytes,
        )
        .map_err(MigrateError::RewriteFailed)?;
    Ok(String::from_utf8_lossy(&out).trim().to_string())
}

/// An author/committer/tagger line split into its parts.
struct IdentLine {
    name: Vec<u8>,
    #[allow(dead_code)]
    email: Vec<u8>,
    /// Timestamp and timezone, verbatim, including the leading space.
    rest: Vec<u8>,
}

/// A loosely-parsed commit or tag object.
///
/// Header values keep their raw bytes, including continuation lines of
/// multi-line headers such as `gpgsig`, so untouched headers serialize back
/// byte-for-byte.
struct RawObject {
    headers: Vec<(Vec<u8>, Vec<u8>)>,
    message: Vec<u8>,
}

impl RawObject {
    fn parse(raw: &[u8]) -> std::result::Result<Self, String> {
        let split = find_blank_line(raw).ok_or("object has no header/message separator")?;
        let (header_bytes, message) = (&raw[..split], &raw[split + 2..]);

        let mut headers: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        for line in header_bytes.split(|&b| b == b'\n') {
            if let Some(stripped) = line.strip_prefix(b" ") {
                // Continuation of a multi-line header; keep the leading
                // space so serialization reproduces the original bytes.
                let (_, value) = headers
                    .last_mut()
                    .ok_or("continuation line before any header")?;
                value.push(b'\n');
                value.push(b' ');
                value.extend_from_slice(stripped);
            } else {
                let space = line
                    .iter()
                    .position(|&b| b == b' ')
                    .ok_or_else(|| format!("malformed header line: {:?}", line))?;
                headers.push((line[..space].to_vec(), line[space + 1..].to_vec()));
            }
        }
        Ok(RawObject {
            headers,
            message: message.to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, value) in &self.headers {
            out.extend_from_slice(key);
            out.push(b' ');
            out.extend_from_slice(value);
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    fn header(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.headers
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, v)| v)
    }

    fn ident(&self, key: &[u8]) -> std::result::Result<IdentLine, String> {
        let value = self
            .header(key)
            .ok_or_else(|| format!("missing {} header", String::from_utf8_lossy(key)))?;
        parse_ident(value)
    }

    fn set_ident(
        &mut self,
        key: &[u8],
        identity: &crate::domain::identity::Identity,
    ) -> std::result::Result<(), String> {
        let current = self.ident(key)?;
        let mut value = Vec::new();
        value.extend_from_slice(identity.new_name.as_bytes());
        value.extend_from_slice(b" <");
        value.extend_from_slice(identity.new_email.as_bytes());
        value.push(b'>');
        value.extend_from_slice(&current.rest);

        for (k, v) in self.headers.iter_mut() {
            if k.as_slice() == key {
                *v = value;
                return Ok(());
            }
        }
        Err(format!("missing {} header", String::from_utf8_lossy(key)))
    }
}

fn find_blank_line(raw: &[u8]) -> Option<usize> {
    raw.windows(2).position(|w| w == b"\n\n")
}

fn parse_ident(value: &[u8]) -> std::result::Result<IdentLine, String> {
    let lt = value
        .iter()
        .position(|&b| b == b'<')
        .ok_or("ident line has no '<'")?;
    let gt = value
        .iter()
        .position(|&b| b == b'>')
        .ok_or("ident line has no '>'")?;
    if gt < lt {
        return Err("ident line has '>' before '<'".to_string());
    }
    // Name is everything before " <"; tolerate a missing separator space
    // rather than truncating the name's last byte.
    let name_end = if lt > 0 && value[lt - 1] == b' ' {
        lt - 1
    } else {
        lt
    };
    Ok(IdentLine {
        name: value[..name_end].to_vec(),
        email: value[lt + 1..gt].to_vec(),
        rest: value[gt + 1..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Identity;
    use crate::testutil::{commit_as, init_repo, run_git};
    use std::collections::BTreeMap;

    const SAMPLE: &[u8] = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
parent 0123456789012345678901234567890123456789\n\
author olduser_1 <olduser_1@example.com> 1700000000 +0000\n\
committer olduser_1 <olduser_1@example.com> 1700000000 +0000\n\
\n\
initial commit\n";

    #[test]
    fn parse_and_serialize_round_trip() {
        let commit = RawObject::parse(SAMPLE).unwrap();
        assert_eq!(commit.serialize(), SAMPLE);
    }

    #[test]
    fn multi_line_headers_round_trip() {
        let raw = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
author a <a@x> 1 +0000\n\
committer a <a@x> 1 +0000\n\
gpgsig -----BEGIN PGP SIGNATURE-----\n\
 line one\n\
 -----END PGP SIGNATURE-----\n\
\n\
signed\n";
        let commit = RawObject::parse(raw).unwrap();
        assert_eq!(commit.serialize(), raw.as_slice());
    }

    #[test]
    fn ident_parsing_splits_name_email_and_rest() {
        let commit = RawObject::parse(SAMPLE).unwrap();
        let ident = commit.ident(b"author").unwrap();
        assert_eq!(ident.name, b"olduser_1");
        assert_eq!(ident.email, b"olduser_1@example.com");
        assert_eq!(ident.rest, b" 1700000000 +0000");
    }

    #[test]
    fn ident_without_separator_space_keeps_the_full_name() {
        let ident = parse_ident(b"name<a@b> 1 +0000").unwrap();
        assert_eq!(ident.name, b"name");
        assert_eq!(ident.email, b"a@b");
        assert_eq!(ident.rest, b" 1 +0000");
    }

    #[test]
    fn set_ident_rewrites_only_identity_fields() {
        let mut commit = RawObject::parse(SAMPLE).unwrap();
        let identity = Identity {
            new_name: "X".to_string(),
            new_email: "x@y.com".to_string(),
        };
        commit.set_ident(b"author", &identity).unwrap();
        commit.set_ident(b"committer", &identity).unwrap();

        let out = commit.serialize();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("author X <x@y.com> 1700000000 +0000"));
        assert!(text.contains("committer X <x@y.com> 1700000000 +0000"));
        assert!(text.contains("tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904"));
        assert!(text.ends_with("initial commit\n"));
    }

    fn mapping_for(name: &str) -> IdentityMapping {
        let mut entries = BTreeMap::new();
        entries.insert(
            name.to_string(),
            Identity {
                new_name: "X".to_string(),
                new_email: "x@y.com".to_string(),
            },
        );
        IdentityMapping::new(entries).unwrap()
    }

    #[test]
    fn collect_authors_returns_distinct_identities() {
        let repo = init_repo();
        commit_as(repo.path(), "a.txt", "one", "olduser_1", "olduser_1@example.com");
        commit_as(repo.path(), "b.txt", "two", "keeper", "keeper@example.com");
        commit_as(repo.path(), "c.txt", "three", "keeper", "keeper@example.com");

        let git = GitRunner::from_env();
        let authors = collect_authors(&git, repo.path()).unwrap();
        assert_eq!(
            authors.into_iter().collect::<Vec<_>>(),
            vec![
                "keeper <keeper@example.com>".to_string(),
                "olduser_1 <olduser_1@example.com>".to_string(),
            ]
        );
    }

    #[test]
    fn unmapped_history_is_untouched() {
        let repo = init_repo();
        commit_as(repo.path(), "a.txt", "one", "keeper", "keeper@example.com");
        let before = run_git(repo.path(), &["rev-parse", "HEAD"]);

        let git = GitRunner::from_env();
        let outcome = rewrite_history(&git, repo.path(), &mapping_for("olduser_1")).unwrap();

        assert_eq!(outcome.commits_seen, 1);
        assert_eq!(outcome.commits_rewritten, 0);
        assert_eq!(outcome.refs_updated, 0);
        assert_eq!(run_git(repo.path(), &["rev-parse", "HEAD"]), before);
    }

    #[test]
    fn mapped_author_is_rewritten_in_place() {
        let repo = init_repo();
        commit_as(repo.path(), "a.txt", "one", "olduser_1", "olduser_1@example.com");

        let git = GitRunner::from_env();
        let outcome = rewrite_history(&git, repo.path(), &mapping_for("olduser_1")).unwrap();
        assert_eq!(outcome.commits_rewritten, 1);
        assert_eq!(outcome.refs_updated, 1);

        let head = run_git(repo.path(), &["log", "-1", "--format=%an %ae %cn %ce"]);
        assert_eq!(head.trim(), "X x@y.com X x@y.com");
    }

    #[test]
    fn rewrite_is_idempotent() {
        let repo = init_repo();
        commit_as(repo.path(), "a.txt", "one", "olduser_1", "olduser_1@example.com");

        let git = GitRunner::from_env();
        let mapping = mapping_for("olduser_1");
        rewrite_history(&git, repo.path(), &mapping).unwrap();
        let after_first = run_git(repo.path(), &["rev-parse", "HEAD"]);

        let second = rewrite_history(&git, repo.path(), &mapping).unwrap();
        assert_eq!(second.commits_rewritten, 0);
        assert_eq!(second.refs_updated, 0);
        assert_eq!(run_git(repo.path(), &["rev-parse", "HEAD"]), after_first);
    }
}
