use log::warn;

pub const API_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w300";
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://via.placeholder.com/300x169/1f2937/6b7280.png?text=No+Image";

/// BoJack Horseman, loaded on first mount.
pub const DEFAULT_SHOW_ID: u64 = 61222;

const DEFAULT_LANGUAGE: &str = "en-US";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub language: String,
}

impl ProviderConfig {
    /// Reads `TMDB_API_KEY` and `TMDB_LANGUAGE` as they were set when the
    /// wasm bundle was built.
    pub fn from_build_env() -> Self {
        let api_key = option_env!("TMDB_API_KEY").unwrap_or_default().to_string();
        if api_key.is_empty() {
            warn!("TMDB_API_KEY was not set at build time; provider requests will be rejected");
        }

        Self {
            api_base_url: API_BASE_URL.to_string(),
            api_key,
            language: option_env!("TMDB_LANGUAGE")
                .unwrap_or(DEFAULT_LANGUAGE)
                .to_string(),
        }
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}/{}{}api_key={}&language={}",
            self.api_base_url, endpoint, separator, self.api_key, self.language
        )
    }
}

pub fn image_url(still_path: Option<&str>) -> String {
    match still_path {
        Some(path) if !path.is_empty() => format!("{}{}", IMAGE_BASE_URL, path),
        _ => PLACEHOLDER_IMAGE_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig {
            api_base_url: API_BASE_URL.to_string(),
            api_key: "key".to_string(),
            language: "en-US".to_string(),
        }
    }

    #[test]
    fn endpoint_url_appends_query() {
        assert_eq!(
            config().endpoint_url("tv/61222"),
            "https://api.themoviedb.org/3/tv/61222?api_key=key&language=en-US"
        );
        assert_eq!(
            config().endpoint_url("search/tv?query=bojack"),
            "https://api.themoviedb.org/3/search/tv?query=bojack&api_key=key&language=en-US"
        );
    }

    #[test]
    fn image_url_falls_back_to_placeholder() {
        assert_eq!(
            image_url(Some("/abc.jpg")),
            "https://image.tmdb.org/t/p/w300/abc.jpg"
        );
        assert_eq!(image_url(None), PLACEHOLDER_IMAGE_URL);
        assert_eq!(image_url(Some("")), PLACEHOLDER_IMAGE_URL);
    }
}
