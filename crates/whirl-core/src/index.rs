//! Release listing parser.
//!
//! An index page is a flat HTML document of `<a href="...">filename</a>`
//! links. The body is tokenized into a stream of markup events and folded
//! into [`ReleaseRecord`]s; no parser state outlives one call.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};

/// One link from an index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// The `href` attribute exactly as written.
    pub href: String,
    /// The link text, trimmed. Never empty.
    pub filename: String,
    /// `href` resolved against the page URL.
    pub url: String,
}

impl ReleaseRecord {
    /// Build a record, resolving `href` against `base_url`.
    pub fn new(href: impl Into<String>, filename: impl Into<String>, base_url: &str) -> Self {
        let href = href.into();
        let url = resolve_url(base_url, &href);
        Self {
            href,
            filename: filename.into(),
            url,
        }
    }

    /// The resolved URL without its `#fragment`.
    pub fn download_url(&self) -> &str {
        self.url.split_once('#').map_or(&self.url, |(url, _)| url)
    }

    /// The expected SHA-256 from a `#sha256=<hex>` fragment, if present.
    pub fn sha256(&self) -> Option<&str> {
        let (_, fragment) = self.url.split_once('#')?;
        fragment
            .split('&')
            .find_map(|part| part.strip_prefix("sha256="))
            .filter(|hex| !hex.is_empty())
    }
}

/// Join `href` onto `base`, leaving already-absolute links untouched.
pub fn resolve_url(base: &str, href: &str) -> String {
    if href.contains("://") {
        href.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            href.trim_start_matches("./")
        )
    }
}

/// Parse an index page into release records, in document order.
///
/// Anchors without an `href` or without text are skipped, as is an anchor
/// that is still open when another one starts. Never fails: a document with
/// no usable anchors yields an empty list.
pub fn parse_releases(body: &str, base_url: &str) -> Vec<ReleaseRecord> {
    let folded = markup_events(body).fold(Fold::default(), |fold, event| {
        fold.step(event, base_url)
    });
    if folded.open.is_some() {
        tracing::debug!("dropping unterminated anchor at end of document");
    }
    folded.records
}

#[derive(Debug, PartialEq, Eq)]
enum Markup {
    AnchorOpen { href: Option<String> },
    AnchorClose,
    Text(String),
}

#[derive(Debug, Default)]
struct OpenAnchor {
    href: Option<String>,
    text: String,
}

#[derive(Debug, Default)]
struct Fold {
    records: Vec<ReleaseRecord>,
    open: Option<OpenAnchor>,
}

impl Fold {
    fn step(mut self, event: Markup, base_url: &str) -> Self {
        match event {
            Markup::AnchorOpen { href } => {
                if let Some(outer) = self.open.take() {
                    tracing::debug!(
                        href = ?outer.href,
                        "skipping anchor interrupted by a nested anchor"
                    );
                }
                self.open = Some(OpenAnchor {
                    href,
                    text: String::new(),
                });
            }
            Markup::Text(text) => {
                if let Some(open) = self.open.as_mut() {
                    open.text.push_str(&text);
                }
            }
            Markup::AnchorClose => {
                if let Some(OpenAnchor { href, text }) = self.open.take() {
                    let filename = text.trim();
                    match href.filter(|h| !h.trim().is_empty()) {
                        Some(href) if !filename.is_empty() => {
                            self.records
                                .push(ReleaseRecord::new(href.trim(), filename, base_url));
                        }
                        _ => {
                            tracing::debug!(
                                text = filename,
                                "skipping anchor without href or text"
                            );
                        }
                    }
                }
            }
        }
        self
    }
}

/// Lenient tokenizer: unmatched and mismatched end tags are tolerated.
///
/// A syntax error, or a tag that swallowed a later `<` (a stray `<` in
/// text), does not end the stream. The offending `<` is emitted as text and
/// tokenizing restarts on the byte after it.
fn markup_events(body: &str) -> impl Iterator<Item = Markup> + '_ {
    let mut base = 0;
    let mut reader = lenient_reader(body);
    let mut queued: Option<Markup> = None;
    let mut finished = false;

    std::iter::from_fn(move || {
        if let Some(event) = queued.take() {
            return Some(event);
        }
        while !finished {
            let start = base + offset(reader.buffer_position());
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(err) => {
                    let at = base + offset(reader.error_position());
                    tracing::debug!(position = at, "markup error, resyncing: {err}");
                    let (skipped, next) = resync(body, at);
                    base = next;
                    reader = lenient_reader(&body[base..]);
                    finished = base >= body.len();
                    return Some(Markup::Text(skipped));
                }
            };

            let swallowed = matches!(event, Event::Start(_) | Event::Empty(_) | Event::End(_))
                && has_stray_open(&event);
            if swallowed {
                tracing::debug!(position = start, "stray '<' in markup, resyncing");
                let (skipped, next) = resync(body, start);
                base = next;
                reader = lenient_reader(&body[base..]);
                finished = base >= body.len();
                return Some(Markup::Text(skipped));
            }

            match event {
                Event::Start(tag) if is_anchor(tag.local_name().as_ref()) => {
                    return Some(Markup::AnchorOpen { href: href_of(&tag) });
                }
                Event::Empty(tag) if is_anchor(tag.local_name().as_ref()) => {
                    queued = Some(Markup::AnchorClose);
                    return Some(Markup::AnchorOpen { href: href_of(&tag) });
                }
                Event::End(tag) if is_anchor(tag.local_name().as_ref()) => {
                    return Some(Markup::AnchorClose);
                }
                Event::Text(text) => {
                    let text = text.unescape().map_or_else(
                        |_| String::from_utf8_lossy(&text).into_owned(),
                        |t| t.into_owned(),
                    );
                    return Some(Markup::Text(text));
                }
                Event::CData(data) => {
                    return Some(Markup::Text(String::from_utf8_lossy(&data).into_owned()));
                }
                Event::Eof => finished = true,
                _ => {}
            }
        }
        None
    })
}

fn lenient_reader(input: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(input);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.expand_empty_elements = false;
    reader
}

fn offset(position: u64) -> usize {
    usize::try_from(position).unwrap_or(usize::MAX)
}

/// Skip the character at `at`. Returns it as text together with the
/// position tokenizing resumes from.
fn resync(body: &str, at: usize) -> (String, usize) {
    let mut at = at.min(body.len());
    while !body.is_char_boundary(at) {
        at -= 1;
    }
    let next = body[at..]
        .char_indices()
        .nth(1)
        .map_or(body.len(), |(idx, _)| at + idx);
    let skipped = body.get(at..next).unwrap_or_default().to_string();
    (skipped, next)
}

/// True when the raw tag content holds a `<` outside quoted attribute
/// values, i.e. the tag ran on into the next one.
fn has_stray_open(raw: &[u8]) -> bool {
    let mut quote = None;
    for &byte in raw {
        match (quote, byte) {
            (None, b'"' | b'\'') => quote = Some(byte),
            (Some(q), _) if q == byte => quote = None,
            (None, b'<') => return true,
            _ => {}
        }
    }
    false
}

fn is_anchor(name: &[u8]) -> bool {
    name.eq_ignore_ascii_case(b"a")
}

fn href_of(tag: &BytesStart<'_>) -> Option<String> {
    tag.html_attributes()
        .filter_map(Result::ok)
        .find(|attr| attr.key.local_name().as_ref().eq_ignore_ascii_case(b"href"))
        .map(|attr| {
            attr.unescape_value().map_or_else(
                |_| String::from_utf8_lossy(&attr.value).into_owned(),
                |v| v.into_owned(),
            )
        })
}
