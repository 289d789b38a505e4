//! Static HTML listing page
//!
//! A snapshot of a server-rendered listing page. Everything is read once at parse
//! time, so the page never grows: scrolling is a no-op and there is nothing for a
//! "load more" control to reveal. Hydration therefore finishes on its first step.

use crate::config::ListingConfig;
use crate::page::{DomError, DomSource, ListingNode, NextPage, ScrollMetrics, ScrollSurface};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Field names whose values are resolved against the page URL
const LINK_FIELDS: &[&str] = &["link", "url", "href"];

/// A parsed listing page
#[derive(Debug, Clone)]
pub struct HtmlPage {
    url: String,
    nodes: Vec<ListingNode>,
    next: Option<NextPage>,
    load_more_texts: Vec<String>,
}

impl HtmlPage {
    /// Parses `html` served from `url` using the listing selectors in `listing`
    ///
    /// # Example
    ///
    /// ```
    /// use listing_harvester::config::ListingConfig;
    /// use listing_harvester::page::HtmlPage;
    ///
    /// let html = r#"<article id="p1"><a href="/home/1">Home</a></article>"#;
    /// let page = HtmlPage::parse(html, "https://x.test/search", &ListingConfig::default()).unwrap();
    /// assert_eq!(page.nodes().len(), 1);
    /// ```
    pub fn parse(html: &str, url: &str, listing: &ListingConfig) -> Result<Self, DomError> {
        let base = Url::parse(url).ok();
        let document = Html::parse_document(html);

        let card_selector = compile(&listing.card_selector)?;
        let mut field_selectors = Vec::with_capacity(listing.fields.len());
        for (name, field) in &listing.fields {
            field_selectors.push((name.as_str(), compile(&field.selector)?, field.attribute.as_deref()));
        }

        let nodes = document
            .select(&card_selector)
            .enumerate()
            .map(|(index, card)| {
                let mut node = ListingNode::new(index);

                if let Some(id) = card.value().attr(&listing.id_attribute) {
                    let id = id.trim();
                    if !id.is_empty() {
                        node.fields.insert("id".to_string(), id.to_string());
                    }
                }

                for (name, selector, attribute) in &field_selectors {
                    if let Some(value) = read_field(card, selector, *attribute) {
                        let value = if LINK_FIELDS.contains(name) {
                            resolve_link(base.as_ref(), &value)
                        } else {
                            value
                        };
                        node.fields.insert(name.to_string(), value);
                    }
                }

                node
            })
            .collect();

        let next_selector = compile(&listing.next_selector)?;
        let next = document.select(&next_selector).next().map(|element| NextPage {
            href: element
                .value()
                .attr("href")
                .map(|href| resolve_link(base.as_ref(), href)),
            enabled: !is_disabled(element),
        });

        let control_selector = compile("button, a")?;
        let load_more_texts = document
            .select(&control_selector)
            .map(|element| element_text(element).to_lowercase())
            .filter(|text| !text.is_empty())
            .collect();

        Ok(Self {
            url: url.to_string(),
            nodes,
            next,
            load_more_texts,
        })
    }

    /// A page with no listings, for commands that never read the page
    pub fn empty(url: &str) -> Self {
        Self {
            url: url.to_string(),
            nodes: Vec::new(),
            next: None,
            load_more_texts: Vec::new(),
        }
    }

    /// Listing nodes found on the page
    pub fn nodes(&self) -> &[ListingNode] {
        &self.nodes
    }
}

#[async_trait]
impl DomSource for HtmlPage {
    async fn listing_count(&self) -> Result<usize, DomError> {
        Ok(self.nodes.len())
    }

    async fn listing_nodes(&self) -> Result<Vec<ListingNode>, DomError> {
        Ok(self.nodes.clone())
    }

    async fn scroll_metrics(&self, _surface: ScrollSurface) -> Result<ScrollMetrics, DomError> {
        Ok(ScrollMetrics::default())
    }

    async fn scroll_to(&self, _surface: ScrollSurface, _top: u64) -> Result<(), DomError> {
        Ok(())
    }

    async fn trigger_load_more(&self, labels: &[String]) -> Result<bool, DomError> {
        let present = self.load_more_texts.iter().any(|text| {
            labels
                .iter()
                .any(|label| text.contains(&label.to_lowercase()))
        });
        if present {
            tracing::debug!("Static page renders a load-more control; nothing to activate");
        }
        Ok(false)
    }

    async fn next_page(&self) -> Result<Option<NextPage>, DomError> {
        Ok(self.next.clone())
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }
}

fn compile(selector: &str) -> Result<Selector, DomError> {
    Selector::parse(selector).map_err(|e| DomError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Reads an attribute or the trimmed text of the first match inside `card`
fn read_field(card: ElementRef<'_>, selector: &Selector, attribute: Option<&str>) -> Option<String> {
    let element = card.select(selector).next()?;
    let value = match attribute {
        Some(attr) => element.value().attr(attr)?.trim().to_string(),
        None => element_text(element),
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Whitespace-collapsed text content of an element
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// An affordance is disabled by `aria-disabled="true"`, a `disabled` attribute,
/// or a `disabled` class
fn is_disabled(element: ElementRef<'_>) -> bool {
    let value = element.value();
    value.attr("aria-disabled") == Some("true")
        || value.attr("disabled").is_some()
        || value.classes().any(|class| class == "disabled")
}

/// Resolves `href` against the page URL, falling back to the raw value
fn resolve_link(base: Option<&Url>, href: &str) -> String {
    let href = href.trim();
    match base.map(|b| b.join(href)) {
        Some(Ok(resolved)) => resolved.to_string(),
        _ => href.to_string(),
    }
}
