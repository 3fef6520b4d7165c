//! Release hosting client used by the release and manifest publishers.

use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::{CommitAuthor, GitHubUrls, Repo};
use crate::context::ReleaseContext;
use crate::tmpl::Template;
use crate::transport::{HttpTransport, Request, Response, TokenAuthTransport, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRelease {
    pub id: u64,
    pub html_url: String,
}

pub trait ReleaseClient: Send + Sync {
    /// Creates the release for the current tag, or updates it when it
    /// already exists.
    fn create_release(&self, ctx: &ReleaseContext, body: &str) -> Result<CreatedRelease>;

    fn upload(&self, ctx: &ReleaseContext, release_id: u64, name: &str, file: File) -> Result<()>;

    fn create_file(
        &self,
        ctx: &ReleaseContext,
        author: &CommitAuthor,
        repo: &Repo,
        content: &[u8],
        path: &str,
        message: &str,
    ) -> Result<()>;
}

pub struct GitHubClient {
    transport: TokenAuthTransport,
    urls: GitHubUrls,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
}

impl GitHubClient {
    pub fn new(token: &str, urls: GitHubUrls, inner: Arc<dyn Transport>) -> Self {
        Self {
            transport: TokenAuthTransport::new(token, inner),
            urls,
        }
    }

    pub fn from_context(ctx: &ReleaseContext) -> Result<Self> {
        let inner: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
        Ok(Self::new(&ctx.token, ctx.config.github_urls.clone(), inner))
    }

    fn api(&self, repo: &Repo, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.urls.api.trim_end_matches('/'),
            repo.owner,
            repo.name,
            path
        )
    }

    fn send_json(
        &self,
        method: &str,
        url: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<Response> {
        let mut request =
            Request::new(method, url).header("Accept", "application/vnd.github+json");
        if let Some(payload) = payload {
            request = request
                .header("Content-Type", "application/json")
                .body(serde_json::to_vec(payload)?);
        }
        debug!(method, url, "github request");
        self.transport.send(&request)
    }
}

fn expect_success(response: Response, what: &str) -> Result<Response> {
    if !response.is_success() {
        bail!("{what}: unexpected status {} ({})", response.status, response.body.trim());
    }
    Ok(response)
}

impl ReleaseClient for GitHubClient {
    fn create_release(&self, ctx: &ReleaseContext, body: &str) -> Result<CreatedRelease> {
        let repo = &ctx.config.release.github;
        let tag = &ctx.git.current_tag;
        let title = Template::new(ctx)
            .apply(&ctx.config.release.name_template)
            .context("Failed to render release name")?;
        let payload = json!({
            "tag_name": tag,
            "name": title,
            "body": body,
            "draft": ctx.config.release.draft,
            "prerelease": ctx.prerelease,
        });

        let lookup = self.api(repo, &format!("releases/tags/{tag}"));
        let existing = self.send_json("GET", &lookup, None)?;
        let response = match existing.status {
            200 => {
                let current: ReleaseResponse = serde_json::from_str(&existing.body)
                    .context("Failed to decode existing release")?;
                let url = self.api(repo, &format!("releases/{}", current.id));
                expect_success(self.send_json("PATCH", &url, Some(&payload))?, "update release")?
            }
            404 => expect_success(
                self.send_json("POST", &self.api(repo, "releases"), Some(&payload))?,
                "create release",
            )?,
            status => bail!("lookup release {tag}: unexpected status {status}"),
        };
        let release: ReleaseResponse =
            serde_json::from_str(&response.body).context("Failed to decode release response")?;
        Ok(CreatedRelease {
            id: release.id,
            html_url: release.html_url,
        })
    }

    fn upload(
        &self,
        ctx: &ReleaseContext,
        release_id: u64,
        name: &str,
        mut file: File,
    ) -> Result<()> {
        let repo = &ctx.config.release.github;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .with_context(|| format!("Failed to read artifact {name}"))?;
        let base = format!(
            "{}/repos/{}/{}/releases/{release_id}/assets",
            self.urls.upload.trim_end_matches('/'),
            repo.owner,
            repo.name
        );
        let url = Url::parse_with_params(&base, &[("name", name)])
            .map_err(|err| anyhow!("invalid upload URL {base}: {err}"))?;
        let request = Request::new("POST", url.as_str())
            .header("Content-Type", "application/octet-stream")
            .body(data);
        expect_success(self.transport.send(&request)?, &format!("upload {name}"))?;
        Ok(())
    }

    fn create_file(
        &self,
        _ctx: &ReleaseContext,
        author: &CommitAuthor,
        repo: &Repo,
        content: &[u8],
        path: &str,
        message: &str,
    ) -> Result<()> {
        let url = self.api(repo, &format!("contents/{path}"));
        let existing = self.send_json("GET", &url, None)?;
        let sha = match existing.status {
            200 => Some(
                serde_json::from_str::<ContentResponse>(&existing.body)
                    .context("Failed to decode existing file")?
                    .sha,
            ),
            _ => None,
        };
        let mut payload = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "committer": { "name": author.name, "email": author.email },
        });
        if let Some(sha) = sha {
            payload["sha"] = json!(sha);
        }
        expect_success(self.send_json("PUT", &url, Some(&payload))?, &format!("commit {path}"))?;
        Ok(())
    }
}
