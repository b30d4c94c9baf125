use crate::config::{image_url, ProviderConfig};
use async_trait::async_trait;
use futures::future::try_join_all;
use gloo_net::http::Request;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

pub type ShowId = u64;
pub type EpisodeId = u64;

/// One episode as returned by the provider, plus the resolved `imageUrl`.
/// Field names match the provider payload so snapshots stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub overview: String,
    pub episode_number: u32,
    pub season_number: u32,
    #[serde(default)]
    pub still_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
}

impl Episode {
    fn with_image_url(mut self) -> Self {
        self.image_url = image_url(self.still_path.as_deref());
        self
    }

    pub fn tooltip(&self) -> String {
        format!(
            "S{}E{}: {}\n{}",
            self.season_number, self.episode_number, self.name, self.overview
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeasonSummary {
    pub season_number: u32,
    #[serde(default)]
    pub episode_count: u32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShowDetails {
    pub id: ShowId,
    pub name: String,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub seasons: Vec<SeasonSummary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeasonDetails {
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

/// The show currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowSelection {
    pub id: ShowId,
    pub name: String,
    pub first_air_date: Option<String>,
    pub poster_path: Option<String>,
}

impl From<&ShowDetails> for ShowSelection {
    fn from(details: &ShowDetails) -> Self {
        Self {
            id: details.id,
            name: details.name.clone(),
            first_air_date: details.first_air_date.clone(),
            poster_path: details.poster_path.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status} while fetching {endpoint}")]
    Status { status: u16, endpoint: String },
    #[error("malformed response: {0}")]
    Parse(String),
}

impl ProviderError {
    fn network<E: std::fmt::Display>(err: E) -> Self {
        Self::Network(err.to_string())
    }

    fn parse<E: std::fmt::Display>(err: E) -> Self {
        Self::Parse(err.to_string())
    }
}

#[async_trait(?Send)]
pub trait ShowProvider {
    async fn show_details(&self, show_id: ShowId) -> Result<ShowDetails, ProviderError>;

    async fn season_details(
        &self,
        show_id: ShowId,
        season_number: u32,
    ) -> Result<SeasonDetails, ProviderError>;
}

/// TMDB over `fetch`.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    config: ProviderConfig,
}

impl TmdbClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ProviderError> {
        let response = Request::get(&self.config.endpoint_url(endpoint))
            .send()
            .await
            .map_err(ProviderError::network)?;

        if !response.ok() {
            return Err(ProviderError::Status {
                status: response.status(),
                endpoint: endpoint.to_owned(),
            });
        }

        let text = response.text().await.map_err(ProviderError::network)?;
        serde_json::from_str(&text).map_err(ProviderError::parse)
    }
}

#[async_trait(?Send)]
impl ShowProvider for TmdbClient {
    async fn show_details(&self, show_id: ShowId) -> Result<ShowDetails, ProviderError> {
        self.fetch_json(&format!("tv/{}", show_id)).await
    }

    async fn season_details(
        &self,
        show_id: ShowId,
        season_number: u32,
    ) -> Result<SeasonDetails, ProviderError> {
        self.fetch_json(&format!("tv/{}/season/{}", show_id, season_number))
            .await
    }
}

/// Fetches every regular season of `details` concurrently and flattens the
/// episodes in season order. Season 0 holds specials and is skipped.
pub async fn fetch_all_episodes<P: ShowProvider + ?Sized>(
    provider: &P,
    details: &ShowDetails,
) -> Result<Vec<Episode>, ProviderError> {
    let requests = details
        .seasons
        .iter()
        .filter(|season| season.season_number > 0)
        .map(|season| provider.season_details(details.id, season.season_number));

    let seasons = try_join_all(requests).await?;

    Ok(seasons
        .into_iter()
        .flat_map(|season| season.episodes)
        .map(Episode::with_image_url)
        .collect())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShowUrlError {
    #[error("Invalid TMDB URL. Use a link like 'https://www.themoviedb.org/tv/12345-show-name'.")]
    Invalid,
}

/// Pulls the numeric show id out of a TMDB link such as
/// `https://www.themoviedb.org/tv/61222-bojack-horseman`.
pub fn parse_show_url(input: &str) -> Result<ShowId, ShowUrlError> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pattern) = PATTERN.get_or_init(|| Regex::new(r"/tv/(\d+)").ok()).as_ref() else {
        return Err(ShowUrlError::Invalid);
    };

    pattern
        .captures(input.trim())
        .and_then(|captures| captures.get(1))
        .and_then(|id| id.as_str().parse().ok())
        .ok_or(ShowUrlError::Invalid)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::PLACEHOLDER_IMAGE_URL;
    use futures::executor::block_on;
    use std::cell::RefCell;
    use std::collections::HashMap;

    pub(crate) fn episode(id: EpisodeId, season_number: u32, episode_number: u32) -> Episode {
        Episode {
            id,
            name: format!("Episode {}", episode_number),
            overview: String::new(),
            episode_number,
            season_number,
            still_path: Some(format!("/still-{}.jpg", id)),
            vote_average: 7.5,
            air_date: None,
            image_url: format!("https://image.tmdb.org/t/p/w300/still-{}.jpg", id),
        }
    }

    /// Serves canned responses and records which seasons were requested.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub(crate) details: Option<ShowDetails>,
        pub(crate) seasons: HashMap<u32, Vec<Episode>>,
        pub(crate) season_requests: RefCell<Vec<u32>>,
    }

    impl FakeProvider {
        pub(crate) fn with_seasons(show_id: ShowId, seasons: &[(u32, Vec<Episode>)]) -> Self {
            let details = ShowDetails {
                id: show_id,
                name: "BoJack Horseman".to_string(),
                first_air_date: Some("2014-08-22".to_string()),
                poster_path: None,
                seasons: seasons
                    .iter()
                    .map(|(number, episodes)| SeasonSummary {
                        season_number: *number,
                        episode_count: episodes.len() as u32,
                        name: format!("Season {}", number),
                    })
                    .collect(),
            };
            Self {
                details: Some(details),
                seasons: seasons.iter().cloned().collect(),
                season_requests: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl ShowProvider for FakeProvider {
        async fn show_details(&self, show_id: ShowId) -> Result<ShowDetails, ProviderError> {
            self.details.clone().ok_or(ProviderError::Status {
                status: 404,
                endpoint: format!("tv/{}", show_id),
            })
        }

        async fn season_details(
            &self,
            _show_id: ShowId,
            season_number: u32,
        ) -> Result<SeasonDetails, ProviderError> {
            self.season_requests.borrow_mut().push(season_number);
            self.seasons
                .get(&season_number)
                .cloned()
                .map(|episodes| SeasonDetails { episodes })
                .ok_or_else(|| ProviderError::Network("connection reset".to_string()))
        }
    }

    #[test]
    fn parse_show_url_extracts_id() {
        assert_eq!(
            parse_show_url("https://www.themoviedb.org/tv/61222-bojack-horseman"),
            Ok(61222)
        );
        assert_eq!(
            parse_show_url("  https://www.themoviedb.org/tv/1399/season/1 "),
            Ok(1399)
        );
    }

    #[test]
    fn parse_show_url_rejects_other_links() {
        assert_eq!(
            parse_show_url("https://www.themoviedb.org/movie/550"),
            Err(ShowUrlError::Invalid)
        );
        assert_eq!(parse_show_url(""), Err(ShowUrlError::Invalid));
        assert_eq!(parse_show_url("/tv/abc"), Err(ShowUrlError::Invalid));
    }

    #[test]
    fn parse_show_url_reuses_compiled_pattern() {
        for _ in 0..3 {
            assert_eq!(parse_show_url("https://www.themoviedb.org/tv/42"), Ok(42));
            assert_eq!(parse_show_url("tv/42"), Err(ShowUrlError::Invalid));
        }
    }

    #[test]
    fn fetch_all_episodes_skips_specials_and_resolves_images() {
        let mut special = episode(900, 0, 1);
        special.still_path = None;
        let mut no_still = episode(3, 2, 1);
        no_still.still_path = None;
        no_still.image_url = String::new();

        let provider = FakeProvider::with_seasons(
            61222,
            &[
                (0, vec![special]),
                (1, vec![episode(1, 1, 1), episode(2, 1, 2)]),
                (2, vec![no_still]),
            ],
        );
        let details = provider.details.clone().unwrap();

        let episodes = block_on(fetch_all_episodes(&provider, &details)).unwrap();

        let ids: Vec<_> = episodes.iter().map(|ep| ep.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            episodes[0].image_url,
            "https://image.tmdb.org/t/p/w300/still-1.jpg"
        );
        assert_eq!(episodes[2].image_url, PLACEHOLDER_IMAGE_URL);
        assert!(!provider.season_requests.borrow().contains(&0));
    }

    #[test]
    fn fetch_all_episodes_fails_when_any_season_fails() {
        let mut provider = FakeProvider::with_seasons(7, &[(1, vec![episode(1, 1, 1)])]);
        if let Some(details) = provider.details.as_mut() {
            details.seasons.push(SeasonSummary {
                season_number: 2,
                episode_count: 10,
                name: "Season 2".to_string(),
            });
        }
        let details = provider.details.clone().unwrap();

        let result = block_on(fetch_all_episodes(&provider, &details));
        assert!(matches!(result, Err(ProviderError::Network(_))));
    }

    #[test]
    fn episode_deserializes_provider_payload() {
        let json = r#"{
            "id": 1056410,
            "name": "BoJack Horseman: The BoJack Horseman Story, Chapter One",
            "overview": "Washed-up sitcom star...",
            "episode_number": 1,
            "season_number": 1,
            "still_path": null,
            "vote_average": 7.1,
            "air_date": "2014-08-22",
            "runtime": 25
        }"#;
        let parsed: Episode = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.id, 1056410);
        assert_eq!(parsed.still_path, None);
        assert!(parsed.image_url.is_empty());
    }
}
