use quakefeed_core::RawBlock;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Post containers, from most to least specific. The first selector that
/// finds anything wins.
const ARTICLE_SELECTORS: &[&str] = &[
    r#"article[data-testid="tweet"]"#,
    r#"div[data-testid="cellInnerDiv"] article"#,
    r#"article[role="article"]"#,
];

const TEXT_SELECTORS: &[&str] = &[r#"div[data-testid="tweetText"]"#, "div[lang]"];

/// Splits a rendered timeline page into [`RawBlock`]s.
///
/// Each post contributes its visible text, the `datetime` attribute of its
/// first `<time>` element, and its status permalink resolved against the
/// page URL. Posts without text are skipped.
#[derive(Debug, Clone)]
pub struct HtmlBlockParser {
    base: Url,
    articles: Vec<Selector>,
    texts: Vec<Selector>,
    time: Selector,
    status_link: Selector,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selectors are valid")
}

impl HtmlBlockParser {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            articles: ARTICLE_SELECTORS.iter().copied().map(selector).collect(),
            texts: TEXT_SELECTORS.iter().copied().map(selector).collect(),
            time: selector("time[datetime]"),
            status_link: selector(r#"a[href*="/status/"]"#),
        }
    }

    pub fn parse(&self, html: &str) -> Vec<RawBlock> {
        let document = Html::parse_document(html);

        let articles: Vec<ElementRef<'_>> = self
            .articles
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        articles
            .into_iter()
            .filter_map(|article| self.block_from(article))
            .enumerate()
            .map(|(order, mut block)| {
                block.order = order;
                block
            })
            .collect()
    }

    fn block_from(&self, article: ElementRef<'_>) -> Option<RawBlock> {
        let text = self
            .texts
            .iter()
            .map(|sel| {
                article
                    .select(sel)
                    .map(rendered_text)
                    .filter(|t| !t.trim().is_empty())
                    .collect::<Vec<_>>()
            })
            .find(|parts| !parts.is_empty())?
            .join("\n");

        let mut block = RawBlock::new(text.trim(), 0);

        if let Some(posted_at) = article
            .select(&self.time)
            .next()
            .and_then(|t| t.value().attr("datetime"))
        {
            block = block.with_posted_at(posted_at);
        }

        if let Some(permalink) = article
            .select(&self.status_link)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| self.permalink(href))
        {
            block = block.with_permalink(permalink);
        }

        Some(block)
    }

    /// Resolve a status link and cut trailing segments such as `/photo/1`.
    fn permalink(&self, href: &str) -> Option<String> {
        let url = self.base.join(href).ok()?;
        let full = url.as_str();
        let idx = full.find("/status/")? + "/status/".len();
        let id_len = full[idx..].chars().take_while(char::is_ascii_digit).count();
        if id_len == 0 {
            return None;
        }
        Some(full[..idx + id_len].to_string())
    }
}

/// Text content with line breaks where the page renders them.
fn rendered_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
        } else if let Some(el) = node.value().as_element()
            && matches!(el.name(), "br" | "div" | "p")
            && !out.is_empty()
        {
            out.push('\n');
        }
    }
    out
}
