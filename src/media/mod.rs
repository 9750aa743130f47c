//! Movie poster resolution
//!
//! Decides whether a resource is film/TV content, builds search variants from
//! its title and asks the poster sources in order. First hit wins.

use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

pub mod douban;
pub mod omdb;
pub mod tmdb;
pub mod unsplash;

const MOVIE_KEYWORDS: [&str; 6] = ["电影", "影片", "电视剧", "纪录片", "动画", "剧集"];
const MOVIE_CATEGORIES: [&str; 5] = ["电影", "影视", "娱乐", "剧集", "动画"];

/// Well-known Chinese release titles and their English names
const FRANCHISE_TITLES: &[(&str, &str)] = &[
    ("流浪地球", "The Wandering Earth"),
    ("复仇者联盟", "Avengers"),
    ("哈利波特", "Harry Potter"),
    ("星球大战", "Star Wars"),
    ("指环王", "The Lord of the Rings"),
    ("速度与激情", "Fast & Furious"),
    ("变形金刚", "Transformers"),
    ("蜘蛛侠", "Spider-Man"),
    ("钢铁侠", "Iron Man"),
    ("盗梦空间", "Inception"),
    ("星际穿越", "Interstellar"),
    ("泰坦尼克号", "Titanic"),
    ("阿凡达", "Avatar"),
    ("功夫熊猫", "Kung Fu Panda"),
    ("玩具总动员", "Toy Story"),
    ("寻梦环游记", "Coco"),
    ("疯狂动物城", "Zootopia"),
    ("霸王别姬", "Farewell My Concubine"),
];

/// Word-level fallbacks for titles with no franchise match
const WORD_TRANSLATIONS: &[(&str, &str)] = &[
    ("流浪", "wandering"),
    ("地球", "earth"),
    ("星际", "interstellar"),
    ("星球", "planet"),
    ("宇宙", "universe"),
    ("战争", "war"),
    ("复仇", "revenge"),
    ("英雄", "hero"),
    ("帝国", "empire"),
    ("传奇", "legend"),
    ("世界", "world"),
    ("时间", "time"),
    ("未来", "future"),
    ("机器人", "robot"),
    ("怪兽", "monster"),
    ("龙", "dragon"),
];

lazy_static! {
    static ref YEAR: Regex = Regex::new(r"(?:^|\D)((?:19|20)\d{2})(?:\D|$)").unwrap();
    static ref BRACKETS: Regex = Regex::new(r"[《》【】]").unwrap();
    static ref PARENTHESIZED: Regex = Regex::new(r"\([^)]*\)|（[^）]*）").unwrap();
    static ref DASH_SUFFIX: Regex = Regex::new(r"\s+-\s+.*$").unwrap();
    static ref PART_MARKER: Regex = Regex::new(r"第[一二三四五六七八九十\d]+[部季]").unwrap();
    static ref SEASON_MARKER: Regex =
        Regex::new(r"(?i)\b(?:season\s*\d+|s\d{1,2}(?:e\d{1,3})?|part\s*\d+)\b").unwrap();
    static ref TRAILING_YEAR: Regex = Regex::new(r"[.\s]*(?:19|20)\d{2}\s*$").unwrap();
    static ref PUNCTUATION: Regex = Regex::new(r"[.·:：!！,，、]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref CJK: Regex = Regex::new(r"\p{Han}").unwrap();
}

/// Film/TV detection over title, category and tags
pub fn is_movie_content(title: &str, category: &str, tags: &[String]) -> bool {
    MOVIE_KEYWORDS.iter().any(|k| title.contains(k))
        || MOVIE_CATEGORIES.iter().any(|c| category.contains(c))
        || tags
            .iter()
            .any(|tag| MOVIE_KEYWORDS.iter().any(|k| tag.contains(k)))
}

/// First standalone 19xx/20xx year in `title`
pub fn extract_year(title: &str) -> Option<String> {
    YEAR.captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Strip decorations, episode markers and a trailing year from a title
pub fn normalize_movie_name(title: &str) -> String {
    let s = BRACKETS.replace_all(title, "");
    let s = PARENTHESIZED.replace_all(&s, "");
    let s = DASH_SUFFIX.replace(&s, "");
    let s = PART_MARKER.replace_all(&s, "");
    let s = SEASON_MARKER.replace_all(&s, "");
    let s = TRAILING_YEAR.replace(&s, "");
    let s = PUNCTUATION.replace_all(&s, " ");
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchVariant {
    pub query: String,
    pub year: Option<String>,
}

/// Ordered, de-duplicated search attempts for `title`
pub fn search_variants(title: &str) -> Vec<SearchVariant> {
    let year = extract_year(title);
    let normalized = normalize_movie_name(title);
    let mut variants: Vec<SearchVariant> = Vec::new();

    let mut push = |query: String, year: Option<String>| {
        let query = query.trim().to_string();
        if query.is_empty() {
            return;
        }
        let variant = SearchVariant { query, year };
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    };

    push(normalized.clone(), year.clone());

    let without_year = match &year {
        Some(y) => WHITESPACE
            .replace_all(title.replace(y.as_str(), " ").trim_matches(|c: char| c == '.' || c.is_whitespace()), " ")
            .into_owned(),
        None => title.trim().to_string(),
    };
    push(without_year, None);

    for (chinese, english) in FRANCHISE_TITLES {
        if normalized.contains(chinese) {
            push(english.to_string(), year.clone());
        }
    }

    if CJK.is_match(&normalized) {
        let words: Vec<&str> = WORD_TRANSLATIONS
            .iter()
            .filter(|(chinese, _)| normalized.contains(chinese))
            .map(|(_, english)| *english)
            .collect();
        if !words.is_empty() {
            push(words.join(" "), year.clone());
        }
    }

    variants
}

/// One search hit from a catalogue source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosterCandidate {
    pub title: String,
    pub original_title: String,
    pub release_year: Option<String>,
    pub poster_url: Option<String>,
}

/// Exact year match first, then exact title match, then the first result.
/// Candidates without a poster never win.
pub fn select_best<'a>(
    candidates: &'a [PosterCandidate],
    variant: &SearchVariant,
) -> Option<&'a PosterCandidate> {
    let with_poster: Vec<&PosterCandidate> =
        candidates.iter().filter(|c| c.poster_url.is_some()).collect();

    if let Some(year) = &variant.year {
        if let Some(hit) = with_poster
            .iter()
            .find(|c| c.release_year.as_ref() == Some(year))
            .copied()
        {
            return Some(hit);
        }
    }

    let query = variant.query.to_lowercase();
    if let Some(hit) = with_poster
        .iter()
        .find(|c| c.title.to_lowercase() == query || c.original_title.to_lowercase() == query)
        .copied()
    {
        return Some(hit);
    }

    with_poster.first().copied()
}

/// One poster catalogue; failures of any kind are a miss
#[async_trait]
pub trait PosterSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn lookup(&self, variants: &[SearchVariant]) -> Option<String>;
}

#[derive(Clone, Default)]
pub struct MediaResolver {
    sources: Vec<Arc<dyn PosterSource>>,
}

impl MediaResolver {
    pub fn new(sources: Vec<Arc<dyn PosterSource>>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Poster URL for film/TV resources, `None` for everything else
    pub async fn resolve_poster(
        &self,
        title: &str,
        category: &str,
        tags: &[String],
    ) -> Option<String> {
        if !is_movie_content(title, category, tags) {
            tracing::debug!("\"{}\" is not film content, skipping poster lookup", title);
            return None;
        }

        let variants = search_variants(title);
        if variants.is_empty() {
            return None;
        }

        for source in &self.sources {
            match source.lookup(&variants).await {
                Some(url) => {
                    tracing::info!("Poster for \"{}\" found via {}: {}", title, source.name(), url);
                    return Some(url);
                }
                None => tracing::debug!("{} had no poster for \"{}\"", source.name(), title),
            }
        }

        tracing::info!("No poster found for \"{}\"", title);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_wandering_earth_year_and_primary_variant() {
        assert_eq!(extract_year("流浪地球.2019").as_deref(), Some("2019"));
        assert_eq!(normalize_movie_name("流浪地球.2019"), "流浪地球");

        let variants = search_variants("流浪地球.2019");
        assert_eq!(
            variants[0],
            SearchVariant {
                query: "流浪地球".to_string(),
                year: Some("2019".to_string())
            }
        );
        assert!(variants
            .iter()
            .any(|v| v.query == "The Wandering Earth" && v.year.as_deref() == Some("2019")));
        assert!(variants.iter().any(|v| v.query == "wandering earth"));
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("霸王别姬 1993 修复版").as_deref(), Some("1993"));
        assert_eq!(extract_year("盗梦空间"), None);
        assert_eq!(extract_year("分辨率 12345"), None);
        // resolutions are not years
        assert_eq!(extract_year("Movie 1080p"), None);
        assert_eq!(extract_year("Avatar 2009 1080p").as_deref(), Some("2009"));
    }

    #[test]
    fn test_normalize_strips_decorations() {
        assert_eq!(normalize_movie_name("《星际穿越》(IMAX版) - 高清"), "星际穿越");
        assert_eq!(normalize_movie_name("三体 第一季"), "三体");
        assert_eq!(normalize_movie_name("Dark S01 Season 2"), "Dark");
        assert_eq!(normalize_movie_name("速度与激情：特别行动"), "速度与激情 特别行动");
    }

    #[test]
    fn test_variants_are_deduplicated() {
        let variants = search_variants("Inception");
        assert_eq!(variants.len(), 1);
    }

    #[test]
    fn test_movie_classification() {
        assert!(is_movie_content("科幻电影资源分享", "other", &[]));
        assert!(is_movie_content("三体", "影视", &[]));
        assert!(is_movie_content("三体", "other", &["电视剧".to_string()]));
        assert!(!is_movie_content("Photoshop 教程", "软件", &["设计".to_string()]));
    }

    fn candidate(title: &str, year: &str, poster: Option<&str>) -> PosterCandidate {
        PosterCandidate {
            title: title.to_string(),
            original_title: title.to_string(),
            release_year: Some(year.to_string()),
            poster_url: poster.map(str::to_string),
        }
    }

    #[test]
    fn test_select_best_prefers_year_then_title() {
        let candidates = vec![
            candidate("Other", "2001", Some("a")),
            candidate("流浪地球", "2023", Some("b")),
            candidate("流浪地球", "2019", Some("c")),
        ];
        let with_year = SearchVariant {
            query: "流浪地球".to_string(),
            year: Some("2019".to_string()),
        };
        assert_eq!(select_best(&candidates, &with_year).unwrap().poster_url.as_deref(), Some("c"));

        let no_year = SearchVariant {
            query: "流浪地球".to_string(),
            year: None,
        };
        assert_eq!(select_best(&candidates, &no_year).unwrap().poster_url.as_deref(), Some("b"));

        let unknown = SearchVariant {
            query: "x".to_string(),
            year: None,
        };
        assert_eq!(select_best(&candidates, &unknown).unwrap().poster_url.as_deref(), Some("a"));
        assert!(select_best(&[candidate("x", "2000", None)], &unknown).is_none());
    }

    struct FakeSource {
        name: &'static str,
        answer: Option<&'static str>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl PosterSource for FakeSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn lookup(&self, _variants: &[SearchVariant]) -> Option<String> {
            *self.calls.lock().unwrap() += 1;
            self.answer.map(str::to_string)
        }
    }

    fn fake(name: &'static str, answer: Option<&'static str>) -> Arc<FakeSource> {
        Arc::new(FakeSource {
            name,
            answer,
            calls: Mutex::new(0),
        })
    }

    #[tokio::test]
    async fn test_cascade_stops_at_first_hit() {
        let tmdb = fake("tmdb", None);
        let omdb = fake("omdb", Some("https://img/omdb.jpg"));
        let douban = fake("douban", Some("https://img/douban.jpg"));
        let resolver = MediaResolver::new(vec![tmdb.clone(), omdb.clone(), douban.clone()]);

        let poster = resolver.resolve_poster("流浪地球.2019", "电影", &[]).await;
        assert_eq!(poster.as_deref(), Some("https://img/omdb.jpg"));
        assert_eq!(*tmdb.calls.lock().unwrap(), 1);
        assert_eq!(*douban.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_movie_skips_sources() {
        let tmdb = fake("tmdb", Some("https://img/tmdb.jpg"));
        let resolver = MediaResolver::new(vec![tmdb.clone()]);
        assert!(resolver.resolve_poster("VS Code 插件合集", "软件", &[]).await.is_none());
        assert_eq!(*tmdb.calls.lock().unwrap(), 0);
    }
}
