// playlist rewriting: every referenced URL is re-pointed back through this
// service so the player never contacts the origin directly
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::error;

use crate::server::services::upstream_services::is_strict_cdn;
use crate::server::utils::url_utils::encode_url;

static URI_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"URI="([^"]+)""#).unwrap());

fn is_playlist_path(url: &str) -> bool {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase());
    path.ends_with(".m3u8")
}

/// Resolve a possibly-relative target against the playlist's base URL.
/// Unresolvable targets are returned as-is, matching how broken lines are
/// passed through rather than failing the whole playlist.
fn absolutize(target: &str, base_path: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        return target.to_string();
    }

    match url::Url::parse(base_path).and_then(|base| base.join(target)) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            error!("Failed to resolve: {} - {}", target, e);
            target.to_string()
        }
    }
}

fn proxied(target_abs: &str, manifest_url: &str, referer: &str, public_base: &str) -> String {
    // already routed through us, never double-wrap
    if target_abs.starts_with(public_base) {
        return target_abs.to_string();
    }

    let endpoint = if is_playlist_path(target_abs) {
        "m3u8"
    } else {
        "segment"
    };

    // CDN-hosted segments want the manifest itself as referer, the way a
    // real player sends it
    let effective_referer = if is_strict_cdn(target_abs) && endpoint == "segment" {
        manifest_url
    } else {
        referer
    };

    format!(
        "{}/api/proxy/{}?url={}&referer={}",
        public_base,
        endpoint,
        encode_url(target_abs),
        urlencoding::encode(effective_referer)
    )
}

/// Rewrite a fetched playlist so every non-comment line and `URI="…"`
/// attribute routes back through this service. `.m3u8` targets go to the
/// manifest endpoint, everything else to the segment endpoint, each
/// carrying the absolute origin target and a referer parameter.
pub fn rewrite_playlist(
    text: &str,
    manifest_url: &str,
    referer: &str,
    public_base: &str,
) -> String {
    let base_path = match url::Url::parse(manifest_url) {
        Ok(u) => format!(
            "{}://{}{}",
            u.scheme(),
            u.host_str().unwrap_or(""),
            &u.path()[..u.path().rfind('/').unwrap_or(0) + 1]
        ),
        Err(e) => {
            error!("Failed to parse playlist base URL: {}", e);
            manifest_url.to_string()
        }
    };

    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            let trimmed = line.trim();

            if trimmed.is_empty() {
                return line.to_string();
            }

            if trimmed.starts_with('#') {
                // EXT-X-KEY / EXT-X-MEDIA / EXT-X-I-FRAME-STREAM-INF carry
                // fetchable URIs inside the tag itself
                return URI_ATTR
                    .replace_all(line, |caps: &regex::Captures<'_>| {
                        let abs = absolutize(&caps[1], &base_path);
                        format!(
                            r#"URI="{}""#,
                            proxied(&abs, manifest_url, referer, public_base)
                        )
                    })
                    .to_string();
            }

            let abs = absolutize(trimmed, &base_path);
            proxied(&abs, manifest_url, referer, public_base)
        })
        .collect();

    lines.join("\n")
}
