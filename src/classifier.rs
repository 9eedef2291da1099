//! Pure path classification: movie / TV episode / extra / generic.
//!
//! `classify` never fails — `Generic` is the total fallback — and it never touches
//! the filesystem. Detection order is first-match-wins, per spec: extra, then
//! numbered TV, then air-date TV, then movie, then generic.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;

/// Recognized video container extensions (case-insensitive).
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "m4v", "mpg", "mpeg", "ts", "m2ts", "vob", "iso",
    "webm",
];

pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Movie,
    TvEpisode,
    Extra,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ExtraKind {
    BehindTheScenes,
    DeletedScenes,
    Interviews,
    Scenes,
    Samples,
    Shorts,
    Featurettes,
    Clips,
    Trailers,
    Other,
}

impl ExtraKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtraKind::BehindTheScenes => "behind_the_scenes",
            ExtraKind::DeletedScenes => "deleted_scenes",
            ExtraKind::Interviews => "interviews",
            ExtraKind::Scenes => "scenes",
            ExtraKind::Samples => "samples",
            ExtraKind::Shorts => "shorts",
            ExtraKind::Featurettes => "featurettes",
            ExtraKind::Clips => "clips",
            ExtraKind::Trailers => "trailers",
            ExtraKind::Other => "other",
        }
    }
}

const EXTRA_FOLDER_NAMES: &[(&str, ExtraKind)] = &[
    ("behind the scenes", ExtraKind::BehindTheScenes),
    ("deleted scenes", ExtraKind::DeletedScenes),
    ("interviews", ExtraKind::Interviews),
    ("scenes", ExtraKind::Scenes),
    ("samples", ExtraKind::Samples),
    ("shorts", ExtraKind::Shorts),
    ("featurettes", ExtraKind::Featurettes),
    ("clips", ExtraKind::Clips),
    ("others", ExtraKind::Other),
    ("extras", ExtraKind::Other),
    ("trailers", ExtraKind::Trailers),
];

const EXTRA_STEM_SUFFIXES: &[(&str, ExtraKind)] = &[
    ("-behindthescenes", ExtraKind::BehindTheScenes),
    ("-deleted", ExtraKind::DeletedScenes),
    ("-featurette", ExtraKind::Featurettes),
    ("-interview", ExtraKind::Interviews),
    ("-scene", ExtraKind::Scenes),
    ("-short", ExtraKind::Shorts),
    ("-trailer", ExtraKind::Trailers),
    ("-other", ExtraKind::Other),
];

#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub media_type: Option<MediaKind>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub episode_title: Option<String>,
    pub extra_kind: Option<ExtraKind>,
    pub edition: Option<String>,
    pub part_index: Option<i32>,
    pub source_path: Option<PathBuf>,
}

impl Classification {
    fn generic() -> Self {
        Classification {
            media_type: Some(MediaKind::Generic),
            ..Default::default()
        }
    }
}

struct Patterns {
    season_folder: Regex,
    numbered_se: Regex,
    folder_episode: Regex,
    air_date_ymd: Regex,
    air_date_dmy: Regex,
    movie_parens_year: Regex,
    movie_dot_year: Regex,
    edition_brace: Regex,
    edition_bracket: Regex,
    edition_dash: Regex,
    part_suffix: Regex,
    episode_title_dash: Regex,
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    season_folder: Regex::new(r"(?i)^season\s+(\d+)$").unwrap(),
    numbered_se: Regex::new(r"(?i)S(\d{1,3})E(\d{1,4})(?:-E?(\d{1,4}))?").unwrap(),
    folder_episode: Regex::new(r"(?i)Ep?(\d{1,4})").unwrap(),
    air_date_ymd: Regex::new(r"(\d{4})[-.](\d{2})[-.](\d{2})").unwrap(),
    air_date_dmy: Regex::new(r"(\d{2})[-.](\d{2})[-.](\d{4})").unwrap(),
    movie_parens_year: Regex::new(r"^(.+?)\s*\((\d{4})\)").unwrap(),
    movie_dot_year: Regex::new(r"^(.+?)\.(\d{4})(?:\.|$)").unwrap(),
    edition_brace: Regex::new(r"\{edition-([^}]+)\}").unwrap(),
    edition_bracket: Regex::new(r"\[([^\]]+)\]\s*$").unwrap(),
    edition_dash: Regex::new(r"\s-\s([^-]+)$").unwrap(),
    part_suffix: Regex::new(r"(?i)\s-\s*(cd|dvd|part|pt|disc|disk)\s*#?(\d+)\s*$").unwrap(),
    episode_title_dash: Regex::new(r"^\s*-\s*(.+)$").unwrap(),
});

/// Is `name` a season folder ("Season 1", "season 01") or one of the Specials spellings?
/// Returns the season number (0 for specials).
fn season_folder_number(name: &str) -> Option<i32> {
    if name.eq_ignore_ascii_case("special") || name.eq_ignore_ascii_case("specials") {
        return Some(0);
    }
    PATTERNS
        .season_folder
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn extra_kind_for_folder(name: &str) -> Option<ExtraKind> {
    let lower = name.to_ascii_lowercase();
    EXTRA_FOLDER_NAMES
        .iter()
        .find(|(n, _)| *n == lower)
        .map(|(_, k)| *k)
}

fn extra_kind_for_stem(stem: &str) -> Option<ExtraKind> {
    let lower = stem.to_ascii_lowercase();
    EXTRA_STEM_SUFFIXES
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix))
        .map(|(_, k)| *k)
}

fn normalise(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn titleize_folder_name(name: &str) -> String {
    name.replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Detect the Extra classification: any ancestor folder name matches the extras set,
/// or the filename stem ends with one of the extras suffixes.
fn detect_extra(path: &Path) -> Option<ExtraKind> {
    for ancestor in path.ancestors().skip(1) {
        let name = dir_name(ancestor);
        if name.is_empty() {
            continue;
        }
        if let Some(kind) = extra_kind_for_folder(&name) {
            return Some(kind);
        }
    }
    extra_kind_for_stem(&file_stem(path))
}

/// How many ancestor folders above an extra file to climb looking for its
/// owning show/movie folder, before giving up. An extras folder sits directly
/// under a show/movie, or one level deeper under a season folder — bounding
/// the climb keeps an extras folder dropped at the library root from being
/// attributed to some unrelated ancestor further up.
const EXTRA_ANCESTOR_SEARCH_DEPTH: usize = 4;

/// Resolve the show/movie folder an Extra belongs to: walk up from the file,
/// skipping any extras-named or season-named folder, and return the first
/// ancestor that's neither. An extra matched by filename suffix (no Extras
/// folder at all) resolves to its immediate parent, same as a movie file
/// sitting directly in its own folder.
fn resolve_extra_source_path(path: &Path) -> Option<PathBuf> {
    for ancestor in path.ancestors().skip(1).take(EXTRA_ANCESTOR_SEARCH_DEPTH) {
        let name = dir_name(ancestor);
        if name.is_empty() {
            continue;
        }
        if extra_kind_for_folder(&name).is_some() || season_folder_number(&name).is_some() {
            continue;
        }
        return Some(ancestor.to_path_buf());
    }
    None
}

/// Numbered TV: `S01E02`-style filename, or a season-folder parent plus `E01`/`Ep01`.
///
/// A trailing `-E03` range (`S01E02-E03`) is matched (so the whole multi-episode
/// span is consumed out of the filename for title extraction) but its end
/// episode is not otherwise recorded: a part belongs to exactly one episode in
/// this schema, and expanding one file into several episode rows is future
/// work, not a case this version of the scanner handles.
fn detect_numbered_tv(path: &Path) -> Option<(i32, i32)> {
    let name = file_name(path);
    if let Some(caps) = PATTERNS.numbered_se.captures(&name) {
        let season: i32 = caps.get(1)?.as_str().parse().ok()?;
        let episode: i32 = caps.get(2)?.as_str().parse().ok()?;
        return Some((season, episode));
    }

    let parent_name = path.parent().map(dir_name).unwrap_or_default();
    let season = season_folder_number(&parent_name)?;
    let episode: i32 = PATTERNS
        .folder_episode
        .captures(&name)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    Some((season, episode))
}

/// Air-date TV: `YYYY-MM-DD`/`YYYY.MM.DD` or `DD-MM-YYYY`/`DD.MM.YYYY` in the filename.
/// Season/episode mapping is `season = year`, `episode = ordinal day of year` — an
/// explicit, stable choice documented in DESIGN.md (the source spec leaves this open).
fn detect_air_date_tv(path: &Path) -> Option<(i32, i32)> {
    let name = file_name(path);
    if let Some(caps) = PATTERNS.air_date_ymd.captures(&name) {
        let year: i32 = caps.get(1)?.as_str().parse().ok()?;
        let month: u32 = caps.get(2)?.as_str().parse().ok()?;
        let day: u32 = caps.get(3)?.as_str().parse().ok()?;
        return ordinal_day(year, month, day).map(|ord| (year, ord));
    }
    if let Some(caps) = PATTERNS.air_date_dmy.captures(&name) {
        let day: u32 = caps.get(1)?.as_str().parse().ok()?;
        let month: u32 = caps.get(2)?.as_str().parse().ok()?;
        let year: i32 = caps.get(3)?.as_str().parse().ok()?;
        return ordinal_day(year, month, day).map(|ord| (year, ord));
    }
    None
}

fn ordinal_day(year: i32, month: u32, day: u32) -> Option<i32> {
    chrono::NaiveDate::from_ymd_opt(year, month, day).map(|d| d.ordinal() as i32)
}

struct MovieMatch {
    title: String,
    year: i32,
    rest: String,
}

fn detect_movie(path: &Path) -> Option<MovieMatch> {
    let stem = file_stem(path);
    if let Some(caps) = PATTERNS.movie_parens_year.captures(&stem) {
        let title = caps.get(1)?.as_str().trim().to_string();
        let year: i32 = caps.get(2)?.as_str().parse().ok()?;
        let rest = stem[caps.get(0)?.end()..].to_string();
        return Some(MovieMatch { title, year, rest });
    }
    if let Some(caps) = PATTERNS.movie_dot_year.captures(&stem) {
        let title = caps.get(1)?.as_str().replace('.', " ").trim().to_string();
        let year: i32 = caps.get(2)?.as_str().parse().ok()?;
        let rest = stem[caps.get(0)?.end()..].to_string();
        return Some(MovieMatch { title, year, rest });
    }
    None
}

fn parse_edition_and_part(rest: &str) -> (Option<String>, Option<i32>) {
    let mut work = rest.to_string();
    let part_index = PATTERNS.part_suffix.captures(&work).and_then(|c| {
        let n = c.get(2)?.as_str().parse().ok();
        n
    });
    if part_index.is_some() {
        work = PATTERNS.part_suffix.replace(&work, "").to_string();
    }

    let edition = PATTERNS
        .edition_brace
        .captures(&work)
        .and_then(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .or_else(|| {
            PATTERNS
                .edition_bracket
                .captures(&work)
                .and_then(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        })
        .or_else(|| {
            PATTERNS
                .edition_dash
                .captures(&work)
                .and_then(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        });

    (edition.filter(|s| !s.is_empty()), part_index)
}

/// Derive the show title from the basename of its source_path folder.
fn show_title_from_source(source_path: &Path) -> String {
    titleize_folder_name(&dir_name(source_path))
}

/// Public form of [`show_title_from_source`], used by the orchestrator when it
/// needs a fallback title for a migration destination that has no staged
/// classification to draw one from.
pub fn show_title_from_path(source_path: &Path) -> String {
    show_title_from_source(source_path)
}

fn episode_title_from_remainder(name: &str, matched_end: usize) -> Option<String> {
    let rest = name.get(matched_end..)?;
    let rest = rest.trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    let stem_end = rest.rfind('.').unwrap_or(rest.len());
    let rest = &rest[..stem_end];
    PATTERNS
        .episode_title_dash
        .captures(rest)
        .and_then(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|s| !s.is_empty())
}

/// Classify a single file path. Never fails — `Generic` is the total fallback.
pub fn classify(path: &Path) -> Classification {
    if let Some(extra_kind) = detect_extra(path) {
        return Classification {
            media_type: Some(MediaKind::Extra),
            extra_kind: Some(extra_kind),
            source_path: resolve_extra_source_path(path),
            ..Default::default()
        };
    }

    if let Some((season, episode)) = detect_numbered_tv(path) {
        let parent_name = path.parent().map(dir_name).unwrap_or_default();
        let source_path = if season_folder_number(&parent_name).is_some() {
            path.parent().and_then(|p| p.parent()).map(|p| p.to_path_buf())
        } else {
            path.parent().map(|p| p.to_path_buf())
        };
        let title = source_path
            .as_deref()
            .map(show_title_from_source)
            .filter(|t| !t.is_empty());
        let name = file_name(path);
        let matched_end = PATTERNS
            .numbered_se
            .find(&name)
            .map(|m| m.end())
            .unwrap_or(0);
        return Classification {
            media_type: Some(MediaKind::TvEpisode),
            title,
            season: Some(season),
            episode: Some(episode),
            episode_title: episode_title_from_remainder(&name, matched_end),
            source_path,
            ..Default::default()
        };
    }

    if let Some((season, episode)) = detect_air_date_tv(path) {
        let source_path = path.parent().map(|p| p.to_path_buf());
        let title = source_path
            .as_deref()
            .map(show_title_from_source)
            .filter(|t| !t.is_empty());
        return Classification {
            media_type: Some(MediaKind::TvEpisode),
            title,
            season: Some(season),
            episode: Some(episode),
            source_path,
            ..Default::default()
        };
    }

    if let Some(m) = detect_movie(path) {
        let (edition, part_index) = parse_edition_and_part(&m.rest);
        let source_path = path.parent().and_then(|parent| {
            let parent_name = normalise(&dir_name(parent));
            let wants = normalise(&m.title);
            let year_str = m.year.to_string();
            if parent_name.contains(&wants) && parent_name.contains(&year_str) {
                // See DESIGN.md: resolved to the movie's own containing folder, not
                // its grandparent, so it can serve as a stable migration key.
                Some(parent.to_path_buf())
            } else {
                None
            }
        });
        return Classification {
            media_type: Some(MediaKind::Movie),
            title: Some(m.title),
            year: Some(m.year),
            edition,
            part_index,
            source_path,
            ..Default::default()
        };
    }

    Classification::generic()
}
