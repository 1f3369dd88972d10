//! Template parsing and rendering.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::helpers::{clean, clean_title, sanitize};
use super::RenderError;
use crate::candidate::{field_info, EvaluationContext, FieldValue};

/// Transform applied to a substituted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    Sanitize,
    Clean,
    CleanTitle,
}

impl Helper {
    fn parse(name: &str) -> Result<Self, RenderError> {
        match name {
            "sanitize" => Ok(Helper::Sanitize),
            "clean" => Ok(Helper::Clean),
            "clean_title" => Ok(Helper::CleanTitle),
            other => Err(RenderError::UnknownHelper(other.to_string())),
        }
    }

    fn apply(self, value: &str) -> String {
        match self {
            Helper::Sanitize => sanitize(value),
            Helper::Clean => clean(value),
            Helper::CleanTitle => clean_title(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field {
        path: String,
        helper: Option<Helper>,
        /// Zero-padding width from a `:NN` suffix.
        width: Option<usize>,
    },
}

/// A parsed destination template.
///
/// Placeholders look like `{{ media.title }}`, `{{ clean quality.resolution }}`
/// or `{{ media.season:02 }}`. Every field path is checked against the context
/// registry when the template is parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, RenderError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or(RenderError::Unclosed {
                offset: offset + start,
            })?;
            segments.push(parse_placeholder(&after[..end])?);

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field paths referenced by the template, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field { path, .. } => Some(path.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder and normalize the result into a safe relative path.
    ///
    /// A `clean` placeholder that renders empty also drops a bracket pair wrapped
    /// directly around it, with the whitespace before it: `Film [{{ clean x }}]`
    /// renders as `Film`.
    pub fn render(&self, ctx: &EvaluationContext) -> Result<RenderedPath, RenderError> {
        let mut out = String::with_capacity(self.source.len());
        let mut skip_close: Option<char> = None;
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => {
                    let text = match skip_close.take() {
                        Some(close) => text.strip_prefix(close).unwrap_or(text),
                        None => text.as_str(),
                    };
                    out.push_str(text);
                }
                Segment::Field {
                    path,
                    helper,
                    width,
                } => {
                    let value = ctx
                        .get_field(path)
                        .map_err(|_| RenderError::UnknownField(path.clone()))?;
                    let text = format_value(&value, *width);
                    let text = match helper {
                        Some(h) => h.apply(&text),
                        None => text,
                    };
                    if text.is_empty() && *helper == Some(Helper::Clean) {
                        let next = match self.segments.get(i + 1) {
                            Some(Segment::Literal(next)) => next.as_str(),
                            _ => "",
                        };
                        skip_close = drop_wrapping_open(&mut out, next);
                    }
                    out.push_str(&text);
                }
            }
        }
        RenderedPath::normalize(&out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_placeholder(inner: &str) -> Result<Segment, RenderError> {
    let tokens: Vec<&str> = inner.split_whitespace().collect();
    let (helper, expr) = match tokens.as_slice() {
        [] => return Err(RenderError::EmptyPlaceholder),
        [expr] => (None, *expr),
        [helper, expr] => (Some(Helper::parse(helper)?), *expr),
        _ => return Err(RenderError::InvalidPlaceholder(inner.trim().to_string())),
    };

    let (path, width) = match expr.split_once(':') {
        Some((path, spec)) => {
            let width = spec
                .parse::<usize>()
                .map_err(|_| RenderError::InvalidFormat(expr.to_string()))?;
            (path, Some(width))
        }
        None => (expr, None),
    };

    if field_info(path).is_none() {
        return Err(RenderError::UnknownField(path.to_string()));
    }

    Ok(Segment::Field {
        path: path.to_string(),
        helper,
        width,
    })
}

/// Pop a trailing opening bracket, and the whitespace before it, when `next`
/// starts with its closing partner. Returns the closer to skip.
fn drop_wrapping_open(out: &mut String, next: &str) -> Option<char> {
    let close = match out.chars().last()? {
        '[' => ']',
        '(' => ')',
        '{' => '}',
        _ => return None,
    };
    if !next.starts_with(close) {
        return None;
    }
    out.pop();
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    Some(close)
}

fn format_value(value: &FieldValue, width: Option<usize>) -> String {
    match (value, width) {
        (FieldValue::Int(v), Some(w)) => format!("{:0width$}", v, width = w),
        (FieldValue::Text(s), Some(w)) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            format!("{:0>width$}", s, width = w)
        }
        _ => value.to_string(),
    }
}

/// A rendered destination, always relative and free of `.`/`..` components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenderedPath(PathBuf);

impl RenderedPath {
    /// Split on either separator, drop empty/`.`/`..` components and trim each one.
    pub fn normalize(raw: &str) -> Result<Self, RenderError> {
        let components: Vec<&str> = raw
            .split(['/', '\\'])
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "." && *c != "..")
            .collect();

        if components.is_empty() {
            return Err(RenderError::EmptyPath);
        }
        Ok(Self(components.iter().collect()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for RenderedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RenderedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{DownloadCandidate, MediaRef, Protocol};

    fn ctx(title: &str, media: MediaRef) -> EvaluationContext {
        EvaluationContext::new(DownloadCandidate {
            protocol: Protocol::Torrent,
            title: title.to_string(),
            link: String::new(),
            indexer: "Tracker".to_string(),
            indexer_id: 1,
            guid: "g".to_string(),
            seeders: 1,
            peers: 0,
            size: 0,
            age: 0,
            age_hours: 0.0,
            grabs: 0,
            categories: vec![],
            publish_date: None,
        })
        .with_media(media)
    }

    fn jump_street() -> EvaluationContext {
        ctx(
            "21.Jump.Street.2012.2160p.UHD.BluRay.REMUX.HEVC.TrueHD.Atmos-GROUP",
            MediaRef::movie("21 Jump Street", Some(2012)),
        )
    }

    fn render(template: &str, ctx: &EvaluationContext) -> String {
        Template::parse(template)
            .unwrap()
            .render(ctx)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_movie_templates() {
        let c = jump_street();
        assert_eq!(render("{{media.title}} ({{media.year}})", &c), "21 Jump Street (2012)");
        assert_eq!(
            render("{{ media.title }} ({{ media.year }}) [{{ quality.resolution }}]", &c),
            "21 Jump Street (2012) [2160p]"
        );
        assert_eq!(
            render("{{ media.title }} ({{ media.year }}) [{{ clean quality.resolution }}]", &c),
            "21 Jump Street (2012) [2160p]"
        );
        assert_eq!(render("{{ sanitize media.title }}", &c), "21 Jump Street");
        assert_eq!(
            render("{{media.clean_title}} ({{media.year}}) [{{quality.full}}]", &c),
            "21 Jump Street (2012) [Bluray-2160p Remux]"
        );
    }

    #[test]
    fn test_clean_drops_unknown() {
        let c = ctx("no quality here", MediaRef::movie("Film", None));
        assert_eq!(render("{{media.title}} [{{clean quality.resolution}}]", &c), "Film");
        assert_eq!(
            render("{{media.title}} ({{clean quality.resolution}}) - x", &c),
            "Film - x"
        );
        // Without `clean` the literal brackets stay.
        assert_eq!(
            render("{{media.title}} [{{quality.resolution}}]", &c),
            "Film [Unknown]"
        );
        // Brackets that do not wrap the placeholder alone are kept.
        assert_eq!(
            render("{{media.title}} [{{clean quality.resolution}} cut]", &c),
            "Film [ cut]"
        );
    }

    #[test]
    fn test_zero_padding() {
        let c = ctx(
            "Show.S01E02.720p.HDTV.x264-GRP",
            MediaRef::series("Show", None).with_episode(1, Some(2)),
        );
        assert_eq!(
            render("{{media.title}}/Season {{media.season:02}}/{{media.title}} - S{{media.season:02}}E{{media.episode:02}}", &c),
            "Show/Season 01/Show - S01E02"
        );
    }

    #[test]
    fn test_output_is_always_relative() {
        let c = ctx("x", MediaRef::movie("../../etc/passwd", None));
        let path = Template::parse("/{{media.title}}/./file").unwrap().render(&c).unwrap();
        assert!(path.as_path().is_relative());
        assert_eq!(path.to_string(), "etc/passwd/file");

        let backslashes = RenderedPath::normalize("..\\..\\win\\x").unwrap();
        assert_eq!(backslashes.to_string(), "win/x");
    }

    #[test]
    fn test_empty_render_is_an_error() {
        let c = ctx("x", MediaRef::movie("Film", None));
        let result = Template::parse("{{media.episode_title}}").unwrap().render(&c);
        assert!(matches!(result, Err(RenderError::EmptyPath)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Template::parse("{{ media.title"), Err(RenderError::Unclosed { offset: 0 })));
        assert!(matches!(Template::parse("{{ }}"), Err(RenderError::EmptyPlaceholder)));
        assert!(matches!(
            Template::parse("{{ upper media.title }}"),
            Err(RenderError::UnknownHelper(_))
        ));
        assert!(matches!(
            Template::parse("{{ media.nope }}"),
            Err(RenderError::UnknownField(_))
        ));
        assert!(matches!(
            Template::parse("{{ media.season:xx }}"),
            Err(RenderError::InvalidFormat(_))
        ));
        assert!(matches!(
            Template::parse("{{ a b c }}"),
            Err(RenderError::InvalidPlaceholder(_))
        ));
    }

    #[test]
    fn test_fields_listing() {
        let t = Template::parse("{{media.title}} - {{clean quality.full}}").unwrap();
        assert_eq!(t.fields().collect::<Vec<_>>(), vec!["media.title", "quality.full"]);
    }
}
