//! Video reference policy.
//!
//! A report may only link a specific video when the link is a well-formed
//! YouTube watch or short link. Anything else is replaced by a search-query
//! URL built from sanitized keywords, so an invented video id never reaches
//! the reader.

use crate::models::{MechanicResponse, VideoTutorial};
use url::Url;

pub const SEARCH_URL_PREFIX: &str = "https://www.youtube.com/results?search_query=";

const VIDEO_ID_LEN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoLink {
    Search,
    Direct,
    Untrusted,
}

/// Reduce free text to URL-safe search keywords joined with `+`.
pub fn sanitize_keywords(keywords: &str) -> String {
    let cleaned: String = keywords
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    url::form_urlencoded::byte_serialize(joined.as_bytes()).collect()
}

pub fn search_url(keywords: &str) -> String {
    format!("{}{}", SEARCH_URL_PREFIX, sanitize_keywords(keywords))
}

fn is_video_id(id: &str) -> bool {
    id.len() == VIDEO_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn classify(link: &str) -> VideoLink {
    let link = link.trim();
    if let Some(query) = link.strip_prefix(SEARCH_URL_PREFIX) {
        return if query.is_empty() {
            VideoLink::Untrusted
        } else {
            VideoLink::Search
        };
    }

    let Ok(parsed) = Url::parse(link) else {
        return VideoLink::Untrusted;
    };
    if parsed.scheme() != "https" {
        return VideoLink::Untrusted;
    }

    let direct = match parsed.host_str() {
        Some("www.youtube.com" | "youtube.com" | "m.youtube.com") => {
            parsed.path() == "/watch"
                && parsed
                    .query_pairs()
                    .any(|(key, value)| key == "v" && is_video_id(&value))
        }
        Some("youtu.be") => is_video_id(parsed.path().trim_start_matches('/')),
        _ => false,
    };

    if direct {
        VideoLink::Direct
    } else {
        VideoLink::Untrusted
    }
}

/// Rewrites untrusted video links in a report into search-query URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoLinkPolicy {
    search_only: bool,
}

impl VideoLinkPolicy {
    /// With `search_only`, even well-formed direct links are replaced.
    pub fn new(search_only: bool) -> Self {
        Self { search_only }
    }

    fn keep(&self, link: &str) -> bool {
        match classify(link) {
            VideoLink::Search => true,
            VideoLink::Direct => !self.search_only,
            VideoLink::Untrusted => false,
        }
    }

    fn enforce(&self, video: &mut VideoTutorial, keywords: String) {
        if !self.keep(&video.url) {
            tracing::debug!("Replacing untrusted video link '{}' with a search", video.url);
            video.url = search_url(&keywords);
        }
    }

    pub fn apply(&self, report: &mut MechanicResponse) {
        let vehicle = report.vehicle_info.clone();

        for case in &mut report.similar_cases {
            let title = if case.video_ref.title.trim().is_empty() {
                &case.case_name
            } else {
                &case.video_ref.title
            };
            let keywords = format!("{} {} {}", vehicle, case.culprit_component, title);
            self.enforce(&mut case.video_ref, keywords);
        }

        for tutorial in &mut report.video_tutorials {
            let keywords = format!("{} {}", vehicle, tutorial.title);
            self.enforce(tutorial, keywords);
        }
    }
}
