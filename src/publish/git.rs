use std::path::Path;

use anyhow::{Context, Result};
use git2::{
    Branch, Cred, IndexAddOption, PushOptions, RemoteCallbacks, Repository,
    RepositoryInitOptions, Signature,
};

const REMOTE_NAME: &str = "origin";

/// Where and as whom to push.
#[derive(Debug, Clone)]
pub struct PushTarget {
    pub remote_url: String,
    pub branch: String,
    pub username: String,
    pub token: String,
}

/// Commit identity.
#[derive(Debug, Clone)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// A staging directory managed as a git working tree.
pub struct SiteRepository {
    repo: Repository,
}

impl SiteRepository {
    /// Open the repository in `dir`, or initialise one whose unborn HEAD
    /// points at `branch`.
    pub fn open_or_init(dir: &Path, branch: &str) -> Result<Self> {
        let repo = if dir.join(".git").exists() {
            Repository::open(dir).context("Failed to open staging repository")?
        } else {
            let mut opts = RepositoryInitOptions::new();
            opts.initial_head(branch);
            Repository::init_opts(dir, &opts).context("Failed to initialise staging repository")?
        };
        Ok(Self { repo })
    }

    /// Stage every file and commit on HEAD. Commits even when nothing changed.
    pub fn commit_all(&self, message: &str, author: &Author) -> Result<String> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now(&author.name, &author.email)?;

        // Handle unborn branch (first round has no parent commit)
        let commit_id = match self.get_head_commit() {
            Some(parent) => {
                self.repo
                    .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?
            }
            None => self.repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?,
        };

        Ok(commit_id.to_string())
    }

    /// Rename the current branch to `branch` if it is called something else.
    pub fn ensure_branch(&self, branch: &str) -> Result<()> {
        let head = self.repo.head().context("Repository has no HEAD commit")?;
        if head.shorthand() == Some(branch) {
            return Ok(());
        }
        if !head.is_branch() {
            anyhow::bail!("HEAD is detached; cannot rename to {}", branch);
        }
        let mut current = Branch::wrap(head);
        current
            .rename(branch, true)
            .with_context(|| format!("Failed to rename branch to {}", branch))?;
        self.repo.set_head(&format!("refs/heads/{}", branch))?;
        Ok(())
    }

    /// Point `origin` at the target and force-push the branch, replacing the
    /// remote's history.
    pub fn force_push(&self, target: &PushTarget) -> Result<()> {
        if self.repo.find_remote(REMOTE_NAME).is_ok() {
            self.repo.remote_set_url(REMOTE_NAME, &target.remote_url)?;
        } else {
            self.repo.remote(REMOTE_NAME, &target.remote_url)?;
        }
        let mut remote = self.repo.find_remote(REMOTE_NAME)?;

        let mut callbacks = RemoteCallbacks::new();
        let mut offered = false;
        let username = target.username.clone();
        let token = target.token.clone();
        callbacks.credentials(move |_url, _username_from_url, _allowed| {
            // libgit2 keeps asking while credentials are refused
            if offered {
                return Err(git2::Error::from_str("remote rejected the supplied credentials"));
            }
            offered = true;
            Cred::userpass_plaintext(&username, &token)
        });
        callbacks.push_update_reference(|refname, status| match status {
            Some(reason) => Err(git2::Error::from_str(&format!(
                "remote rejected {}: {}",
                refname, reason
            ))),
            None => Ok(()),
        });

        let mut opts = PushOptions::new();
        opts.remote_callbacks(callbacks);
        let refspec = format!("+refs/heads/{0}:refs/heads/{0}", target.branch);
        remote
            .push(&[refspec.as_str()], Some(&mut opts))
            .with_context(|| format!("Failed to push {} to {}", target.branch, target.remote_url))?;
        Ok(())
    }

    /// Get current HEAD SHA (returns None for unborn branches)
    pub fn head_sha(&self) -> Option<String> {
        self.get_head_commit().map(|c| c.id().to_string())
    }

    fn get_head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }
}

/// Commit the staging directory and force-push it. Returns the commit SHA.
pub fn commit_and_push(dir: &Path, message: &str, author: &Author, target: &PushTarget) -> Result<String> {
    let repo = SiteRepository::open_or_init(dir, &target.branch)?;
    let sha = repo.commit_all(message, author)?;
    repo.ensure_branch(&target.branch)?;
    repo.force_push(target)?;
    Ok(sha)
}
