//! In-memory [`Page`] for tests
//!
//! Holds a flat list of elements in document order. Queries are evaluated
//! with the same semantics as the injected browser script: simple compound
//! CSS selectors, test ids, ARIA labels, implicit roles and text matching.
//! Clicks can trigger scripted effects (navigation, new tabs, scrolling a
//! container, toggling visibility, emitting network events).

use crate::page::{
    BoundingBox, ClickOutcome, ElementInfo, ElementQuery, ElementTarget, FormField, FrameRef,
    NetworkSink, Page, PageHandle, ScrollMetrics, SelectOption,
};
use async_trait::async_trait;
use journey_core::{JourneyError, RawNetworkEvent, Result, UiInventoryItem, Viewport};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Something that happens when a mock element is clicked
#[derive(Clone)]
pub enum ClickEffect {
    Navigate(String),
    OpenPage(Arc<MockPage>),
    /// Scroll a container element horizontally by `dx`
    ScrollBy { element: usize, dx: f64 },
    Show(usize),
    Hide(usize),
    Emit(RawNetworkEvent),
    SetContent(String),
}

/// Horizontal scroll state of a container
///
/// The effective client width never exceeds the viewport width, so shrinking
/// the viewport can make a container overflow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockScroll {
    pub left: f64,
    pub scroll_width: f64,
    pub client_width: f64,
}

#[derive(Clone)]
pub struct MockElement {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub visible: bool,
    /// 0 = main document, i + 1 = child frame i
    pub frame: usize,
    pub parent: Option<usize>,
    pub bbox: Option<BoundingBox>,
    /// `position: fixed`; unaffected by document scroll
    pub fixed: bool,
    pub scroll: Option<MockScroll>,
    pub on_click: Vec<ClickEffect>,
    pub value: String,
    pub checked: bool,
    pub options: Vec<SelectOption>,
    pub label: String,
}

impl MockElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            visible: true,
            frame: 0,
            parent: None,
            bbox: Some(BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 40.0,
            }),
            fixed: false,
            scroll: None,
            on_click: Vec::new(),
            value: String::new(),
            checked: false,
            options: Vec::new(),
            label: String::new(),
        }
    }

    pub fn button(text: &str) -> Self {
        Self::new("button").text(text)
    }

    pub fn link(text: &str, href: &str) -> Self {
        Self::new("a").text(text).attr("href", href)
    }

    pub fn input(input_type: &str) -> Self {
        Self::new("input").attr("type", input_type)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn test_id(self, value: &str) -> Self {
        self.attr("data-testid", value)
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(self) -> Self {
        self.attr("disabled", "")
    }

    pub fn in_frame(mut self, frame: usize) -> Self {
        self.frame = frame;
        self
    }

    pub fn child_of(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn at(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bbox = Some(BoundingBox {
            x,
            y,
            width,
            height,
        });
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn scrollable(mut self, scroll_width: f64, client_width: f64) -> Self {
        self.scroll = Some(MockScroll {
            left: 0.0,
            scroll_width,
            client_width,
        });
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click.push(effect);
        self
    }

    pub fn options(mut self, options: &[(&str, &str, bool)]) -> Self {
        self.options = options
            .iter()
            .map(|(value, label, disabled)| SelectOption {
                value: value.to_string(),
                label: label.to_string(),
                disabled: *disabled,
            })
            .collect();
        self
    }

    fn attr_value(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    fn enabled(&self) -> bool {
        !self.attrs.contains_key("disabled") && self.attr_value("aria-disabled") != Some("true")
    }

    /// Explicit role, else the implicit one for common tags
    fn role(&self) -> Option<String> {
        if let Some(role) = self.attr_value("role") {
            return Some(role.to_lowercase());
        }
        let input_type = self.attr_value("type").unwrap_or("text").to_lowercase();
        let implicit = match self.tag.as_str() {
            "button" => "button",
            "a" if self.attrs.contains_key("href") => "link",
            "select" => "combobox",
            "textarea" => "textbox",
            "input" => match input_type.as_str() {
                "button" | "submit" | "reset" => "button",
                "checkbox" => "checkbox",
                "radio" => "radio",
                _ => "textbox",
            },
            _ => return None,
        };
        Some(implicit.to_string())
    }

    fn accessible_name(&self) -> String {
        self.attr_value("aria-label")
            .map(str::to_string)
            .unwrap_or_else(|| self.text.clone())
    }
}

#[derive(Clone, Default)]
struct MockState {
    url: String,
    title: String,
    content: Option<String>,
    viewport: Viewport,
    scroll_y: f64,
    page_height: f64,
    elements: Vec<MockElement>,
    clicks: Vec<usize>,
    fills: Vec<(usize, String)>,
    navigations: Vec<String>,
    reloads: usize,
    screenshots: usize,
    fail_screenshots: bool,
    /// Screenshot calls still to fail before succeeding again
    screenshot_failures: usize,
    /// Child frames whose queries fail as if detached
    detached_frames: Vec<usize>,
    closed: bool,
    ready: bool,
    sinks: Vec<NetworkSink>,
}

/// Scriptable in-memory page
pub struct MockPage {
    state: Mutex<MockState>,
}

impl MockPage {
    pub fn new(url: &str) -> Self {
        Self {
            state: Mutex::new(MockState {
                url: url.to_string(),
                ready: true,
                page_height: 900.0,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an element and return its index
    pub fn add(&self, element: MockElement) -> usize {
        let mut state = self.state();
        state.elements.push(element);
        state.elements.len() - 1
    }

    pub fn set_title(&self, title: &str) {
        self.state().title = title.to_string();
    }

    /// Override the document markup returned by `content()`
    pub fn set_content(&self, content: &str) {
        self.state().content = Some(content.to_string());
    }

    pub fn set_url(&self, url: &str) {
        self.state().url = url.to_string();
    }

    pub fn set_page_height(&self, height: f64) {
        self.state().page_height = height;
    }

    pub fn set_visible(&self, index: usize, visible: bool) {
        if let Some(element) = self.state().elements.get_mut(index) {
            element.visible = visible;
        }
    }

    pub fn set_fail_screenshots(&self, fail: bool) {
        self.state().fail_screenshots = fail;
    }

    /// Make queries against child frame `index` fail
    pub fn detach_frame(&self, index: usize) {
        self.state().detached_frames.push(index);
    }

    /// Fail only the next `count` screenshot calls
    pub fn fail_next_screenshots(&self, count: usize) {
        self.state().screenshot_failures = count;
    }

    /// Simulate a closed target: `url()` and `goto()` start failing
    pub fn close(&self) {
        self.state().closed = true;
    }

    pub fn set_ready(&self, ready: bool) {
        self.state().ready = ready;
    }

    /// Feed a raw event to every observer
    pub fn emit(&self, event: RawNetworkEvent) {
        let sinks = self.state().sinks.clone();
        for sink in sinks {
            sink(event.clone());
        }
    }

    pub fn element(&self, index: usize) -> Option<MockElement> {
        self.state().elements.get(index).cloned()
    }

    /// Indices of clicked elements, in order
    pub fn clicks(&self) -> Vec<usize> {
        self.state().clicks.clone()
    }

    pub fn click_count(&self, index: usize) -> usize {
        self.state().clicks.iter().filter(|i| **i == index).count()
    }

    pub fn fills(&self) -> Vec<(usize, String)> {
        self.state().fills.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn reloads(&self) -> usize {
        self.state().reloads
    }

    pub fn screenshots(&self) -> usize {
        self.state().screenshots
    }

    pub fn scroll_y(&self) -> f64 {
        self.state().scroll_y
    }

    pub fn current_viewport(&self) -> Viewport {
        self.state().viewport
    }
}

impl MockState {
    fn frame_count(&self) -> usize {
        self.elements.iter().map(|e| e.frame).max().unwrap_or(0)
    }

    fn matches(&self, index: usize, query: &ElementQuery) -> bool {
        let element = &self.elements[index];
        match query {
            ElementQuery::Css { selector } => self.css_matches(index, selector),
            ElementQuery::ClickableAncestor { .. } => false,
            ElementQuery::TestId { value } => element.attr_value("data-testid") == Some(value),
            ElementQuery::AriaLabel { matcher } => element
                .attr_value("aria-label")
                .map(|label| matcher.is_match(label))
                .unwrap_or(false),
            ElementQuery::Role { role, name } => {
                element.role().as_deref() == Some(role.to_lowercase().as_str())
                    && name
                        .as_ref()
                        .map(|n| n.is_match(&element.accessible_name()))
                        .unwrap_or(true)
            }
            ElementQuery::Text { matcher } => {
                !element.text.trim().is_empty() && matcher.is_match(&element.text)
            }
        }
    }

    /// Element indices matched by `query` in `frame`, document order
    fn resolve_all(&self, frame: FrameRef, query: &ElementQuery) -> Vec<usize> {
        let root = frame.root_index();
        if let ElementQuery::ClickableAncestor { selector } = query {
            let mut out: Vec<usize> = Vec::new();
            for index in 0..self.elements.len() {
                if self.elements[index].frame != root || !self.css_matches(index, selector) {
                    continue;
                }
                let climbed = self.clickable_ancestor(index);
                if !out.contains(&climbed) {
                    out.push(climbed);
                }
            }
            return out;
        }
        (0..self.elements.len())
            .filter(|&i| self.elements[i].frame == root && self.matches(i, query))
            .collect()
    }

    fn resolve(&self, target: &ElementTarget) -> Option<usize> {
        self.resolve_all(target.frame, &target.query)
            .get(target.nth)
            .copied()
    }

    fn clickable_ancestor(&self, index: usize) -> usize {
        let mut current = Some(index);
        while let Some(i) = current {
            let tag = self.elements[i].tag.as_str();
            if tag == "button" || tag == "a" {
                return i;
            }
            current = self.elements[i].parent;
        }
        index
    }

    fn css_matches(&self, index: usize, selector: &str) -> bool {
        selector
            .split(',')
            .map(str::trim)
            .any(|part| part == self.css_path(index) || self.descendant_matches(index, part))
    }

    /// `A B` / `A > B` chains, both treated as descendant combinators
    fn descendant_matches(&self, index: usize, selector: &str) -> bool {
        let compounds = split_compounds(selector);
        let Some((last, ancestors)) = compounds.split_last() else {
            return false;
        };
        if !simple_selector_matches(last, &self.elements[index]) {
            return false;
        }
        let mut current = self.elements[index].parent;
        for compound in ancestors.iter().rev() {
            loop {
                let Some(i) = current else {
                    return false;
                };
                current = self.elements[i].parent;
                if simple_selector_matches(compound, &self.elements[i]) {
                    break;
                }
            }
        }
        true
    }

    /// Structural path as produced by the browser script
    fn css_path(&self, index: usize) -> String {
        let element = &self.elements[index];
        if let Some(id) = element.attr_value("id") {
            return format!("#{}", id);
        }
        let mut path = element.tag.clone();
        if let Some(test_id) = element.attr_value("data-testid") {
            path.push_str(&format!("[data-testid=\"{}\"]", test_id));
        }
        let siblings: Vec<usize> = (0..self.elements.len())
            .filter(|&i| {
                self.elements[i].tag == element.tag
                    && self.elements[i].parent == element.parent
                    && self.elements[i].frame == element.frame
            })
            .collect();
        if siblings.len() > 1 {
            let position = siblings.iter().position(|&i| i == index).unwrap_or(0) + 1;
            path.push_str(&format!(":nth-of-type({})", position));
        }
        path
    }

    fn effective_bbox(&self, index: usize) -> Option<BoundingBox> {
        let element = &self.elements[index];
        element.bbox.map(|b| {
            if element.fixed {
                b
            } else {
                BoundingBox {
                    y: b.y - self.scroll_y,
                    ..b
                }
            }
        })
    }

    fn info(&self, index: usize) -> ElementInfo {
        let element = &self.elements[index];
        let mut attributes = element.attrs.clone();
        if !element.value.is_empty() {
            attributes.insert("value".into(), element.value.clone());
        }
        ElementInfo {
            tag: element.tag.clone(),
            text: element.text.clone(),
            visible: element.visible,
            enabled: element.enabled(),
            attributes,
            bbox: if element.visible {
                self.effective_bbox(index)
            } else {
                None
            },
        }
    }

    fn scroll_metrics(&self, index: usize) -> Option<ScrollMetrics> {
        self.elements[index].scroll.map(|s| ScrollMetrics {
            scroll_left: s.left,
            scroll_width: s.scroll_width,
            client_width: s.client_width.min(self.viewport.width as f64),
        })
    }

    fn max_scroll_y(&self) -> f64 {
        (self.page_height - self.viewport.height as f64).max(0.0)
    }
}

/// Matches `tag#id.class[attr="v"][attr^="v"][attr*="v"][attr]` compounds
///
/// Anything with combinators or pseudo-classes never matches.
fn simple_selector_matches(selector: &str, element: &MockElement) -> bool {
    if selector.is_empty() || selector.contains([' ', '>', '+', '~', ':']) && !in_brackets_only(selector) {
        return false;
    }
    let chars: Vec<char> = selector.chars().collect();
    let mut i = 0;
    let mut tag = String::new();
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-') {
        tag.push(chars[i]);
        i += 1;
    }
    if !tag.is_empty() && tag.to_lowercase() != element.tag {
        return false;
    }
    while i < chars.len() {
        match chars[i] {
            '#' | '.' => {
                let sigil = chars[i];
                i += 1;
                let mut ident = String::new();
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '-' || chars[i] == '_') {
                    ident.push(chars[i]);
                    i += 1;
                }
                let ok = if sigil == '#' {
                    element.attr_value("id") == Some(ident.as_str())
                } else {
                    element
                        .attr_value("class")
                        .map(|c| c.split_whitespace().any(|cls| cls == ident))
                        .unwrap_or(false)
                };
                if !ok {
                    return false;
                }
            }
            '[' => {
                let Some(close) = chars[i..].iter().position(|c| *c == ']') else {
                    return false;
                };
                let inner: String = chars[i + 1..i + close].iter().collect();
                if !attribute_matches(&inner, element) {
                    return false;
                }
                i += close + 1;
            }
            _ => return false,
        }
    }
    true
}

fn split_compounds(selector: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    for c in selector.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth -= 1;
                current.push(c);
            }
            ' ' | '>' if depth == 0 => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// True when every space/colon/combinator sits inside `[...]`
fn in_brackets_only(selector: &str) -> bool {
    let mut depth = 0;
    for c in selector.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ' ' | '>' | '+' | '~' | ':' if depth == 0 => return false,
            _ => {}
        }
    }
    true
}

fn attribute_matches(inner: &str, element: &MockElement) -> bool {
    let inner = inner.trim();
    let (inner, insensitive) = match inner.strip_suffix(" i") {
        Some(rest) => (rest.trim(), true),
        None => (inner, false),
    };
    let Some(eq) = inner.find('=') else {
        return element.attrs.contains_key(inner);
    };
    let (name_part, value_part) = inner.split_at(eq);
    let (name, op) = match name_part.chars().last() {
        Some(c @ ('^' | '*' | '$')) => (&name_part[..name_part.len() - 1], Some(c)),
        _ => (name_part, None),
    };
    let expected = value_part[1..].trim().trim_matches('"').trim_matches('\'');
    let Some(actual) = element.attr_value(name.trim()) else {
        return false;
    };
    let (actual, expected) = if insensitive {
        (actual.to_lowercase(), expected.to_lowercase())
    } else {
        (actual.to_string(), expected.to_string())
    };
    match op {
        Some('^') => actual.starts_with(&expected),
        Some('*') => actual.contains(&expected),
        Some('$') => actual.ends_with(&expected),
        _ => actual == expected,
    }
}

fn not_found(target: &ElementTarget) -> JourneyError {
    JourneyError::ElementNotFound(target.query.to_string())
}

#[async_trait]
impl Page for MockPage {
    async fn url(&self) -> Result<String> {
        let state = self.state();
        if state.closed {
            return Err(JourneyError::Browser("target closed".into()));
        }
        Ok(state.url.clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.state().title.clone())
    }

    async fn content(&self) -> Result<String> {
        let state = self.state();
        if let Some(content) = &state.content {
            return Ok(content.clone());
        }
        let texts: Vec<&str> = state.elements.iter().map(|e| e.text.as_str()).collect();
        Ok(format!("<title>{}</title>{}", state.title, texts.join(" ")))
    }

    async fn frame_count(&self) -> Result<usize> {
        Ok(self.state().frame_count())
    }

    async fn count(&self, frame: FrameRef, query: &ElementQuery) -> Result<usize> {
        let state = self.state();
        if let FrameRef::Child(i) = frame {
            if state.detached_frames.contains(&i) {
                return Err(JourneyError::Browser(format!("frame {} detached", i)));
            }
        }
        Ok(state.resolve_all(frame, query).len())
    }

    async fn inspect(&self, target: &ElementTarget) -> Result<Option<ElementInfo>> {
        let state = self.state();
        Ok(state.resolve(target).map(|i| state.info(i)))
    }

    async fn click(&self, target: &ElementTarget) -> Result<ClickOutcome> {
        let effects = {
            let mut state = self.state();
            let index = state.resolve(target).ok_or_else(|| not_found(target))?;
            state.clicks.push(index);
            if !state.elements[index].enabled() {
                return Ok(ClickOutcome::default());
            }
            state.elements[index].on_click.clone()
        };

        let mut outcome = ClickOutcome::default();
        for effect in effects {
            match effect {
                ClickEffect::Navigate(url) => {
                    let mut state = self.state();
                    state.navigations.push(url.clone());
                    state.url = url;
                }
                ClickEffect::OpenPage(page) => {
                    let sinks = self.state().sinks.clone();
                    page.state().sinks.extend(sinks);
                    outcome.new_page = Some(page as PageHandle);
                }
                ClickEffect::ScrollBy { element, dx } => {
                    let mut state = self.state();
                    let viewport_width = state.viewport.width as f64;
                    if let Some(scroll) = state.elements.get_mut(element).and_then(|e| e.scroll.as_mut()) {
                        let max = (scroll.scroll_width - scroll.client_width.min(viewport_width)).max(0.0);
                        scroll.left = (scroll.left + dx).clamp(0.0, max);
                    }
                }
                ClickEffect::Show(i) => self.set_visible(i, true),
                ClickEffect::Hide(i) => self.set_visible(i, false),
                ClickEffect::Emit(event) => self.emit(event),
                ClickEffect::SetContent(content) => self.set_content(&content),
            }
        }
        Ok(outcome)
    }

    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<()> {
        let mut state = self.state();
        let index = state.resolve(target).ok_or_else(|| not_found(target))?;
        state.elements[index].value = value.to_string();
        state.fills.push((index, value.to_string()));
        Ok(())
    }

    async fn check(&self, target: &ElementTarget) -> Result<()> {
        let mut state = self.state();
        let index = state.resolve(target).ok_or_else(|| not_found(target))?;
        state.elements[index].checked = true;
        Ok(())
    }

    async fn select_option(&self, target: &ElementTarget, value: &str) -> Result<()> {
        let mut state = self.state();
        let index = state.resolve(target).ok_or_else(|| not_found(target))?;
        if !state.elements[index].options.iter().any(|o| o.value == value) {
            return Err(JourneyError::Browser(format!("no option '{}'", value)));
        }
        state.elements[index].value = value.to_string();
        state.fills.push((index, value.to_string()));
        Ok(())
    }

    async fn press_enter(&self, target: &ElementTarget) -> Result<()> {
        let state = self.state();
        state.resolve(target).ok_or_else(|| not_found(target))?;
        Ok(())
    }

    async fn scroll_into_view(&self, target: &ElementTarget) -> Result<()> {
        let mut state = self.state();
        let index = state.resolve(target).ok_or_else(|| not_found(target))?;
        if state.elements[index].fixed {
            return Ok(());
        }
        if let Some(b) = state.elements[index].bbox {
            let max = state.max_scroll_y();
            state.scroll_y = (b.y - 100.0).clamp(0.0, max);
        }
        Ok(())
    }

    async fn scroll_metrics(&self, target: &ElementTarget) -> Result<Option<ScrollMetrics>> {
        let state = self.state();
        Ok(state.resolve(target).and_then(|i| state.scroll_metrics(i)))
    }

    async fn scroll_by(&self, dy: f64) -> Result<()> {
        let mut state = self.state();
        let max = state.max_scroll_y();
        state.scroll_y = (state.scroll_y + dy).clamp(0.0, max);
        Ok(())
    }

    async fn viewport(&self) -> Result<Viewport> {
        Ok(self.state().viewport)
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.state().viewport = viewport;
        Ok(())
    }

    async fn interactive_elements(&self) -> Result<Vec<UiInventoryItem>> {
        let state = self.state();
        let mut items = Vec::new();
        for (index, element) in state.elements.iter().enumerate() {
            if !element.visible || element.frame != 0 {
                continue;
            }
            let interactive = matches!(element.tag.as_str(), "button" | "a" | "input" | "select" | "textarea")
                || element.attrs.contains_key("data-testid")
                || element.attrs.contains_key("aria-label")
                || element.attrs.contains_key("role");
            if !interactive {
                continue;
            }
            let aria_label = element.attr_value("aria-label").map(str::to_string);
            let test_id = element.attr_value("data-testid").map(str::to_string);
            let id = element.attr_value("id").map(str::to_string);
            let text = crate::page::normalize_ws(&element.text);
            if aria_label.is_none() && test_id.is_none() && id.is_none() && text.is_empty() {
                continue;
            }
            let text = if text.chars().count() > 120 {
                format!("{}...", text.chars().take(117).collect::<String>())
            } else {
                text
            };
            items.push(UiInventoryItem {
                tag: element.tag.clone(),
                role: element.attr_value("role").map(str::to_string),
                aria_label,
                test_id,
                id,
                name_attr: element.attr_value("name").map(str::to_string),
                type_attr: element.attr_value("type").map(str::to_string),
                text,
                href: element.attr_value("href").map(str::to_string),
                css_path: state.css_path(index),
                score: 0,
            });
        }
        Ok(items)
    }

    async fn form_fields(&self) -> Result<Vec<FormField>> {
        let state = self.state();
        let mut fields = Vec::new();
        for element in state.elements.iter() {
            if !element.visible || !matches!(element.tag.as_str(), "input" | "select" | "textarea") {
                continue;
            }
            let input_type = element.attr_value("type").unwrap_or("").to_lowercase();
            if matches!(input_type.as_str(), "hidden" | "password" | "submit" | "button") {
                continue;
            }
            let test_id = element.attr_value("data-testid").unwrap_or("").to_string();
            let id = element.attr_value("id").unwrap_or("").to_string();
            let name = element.attr_value("name").unwrap_or("").to_string();
            let autocomplete = element.attr_value("autocomplete").unwrap_or("").to_string();
            let placeholder = element.attr_value("placeholder").unwrap_or("");
            let selector = if !test_id.is_empty() {
                format!("[data-testid=\"{}\"]", test_id)
            } else if !id.is_empty() {
                format!("#{}", id)
            } else if !name.is_empty() {
                format!("[name=\"{}\"]", name)
            } else {
                String::new()
            };
            let hint = [
                element.label.as_str(),
                placeholder,
                autocomplete.as_str(),
                name.as_str(),
                id.as_str(),
                test_id.as_str(),
                input_type.as_str(),
            ]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
            let checkable = matches!(input_type.as_str(), "checkbox" | "radio");
            fields.push(FormField {
                tag: element.tag.clone(),
                input_type,
                label: element.label.clone(),
                hint,
                autocomplete,
                pattern: element.attr_value("pattern").unwrap_or("").to_string(),
                test_id,
                name,
                id,
                selector,
                value: element.value.clone(),
                checked: checkable.then_some(element.checked),
                options: element.options.clone(),
            });
        }
        Ok(fields)
    }

    async fn ui_alerts(&self) -> Result<Vec<String>> {
        let state = self.state();
        Ok(state
            .elements
            .iter()
            .filter(|e| e.visible && !e.text.trim().is_empty())
            .filter(|e| {
                e.attr_value("role") == Some("alert")
                    || e.attr_value("aria-live").is_some()
                    || e.attr_value("class")
                        .map(|c| c.to_lowercase().contains("error"))
                        .unwrap_or(false)
            })
            .map(|e| crate::page::normalize_ws(&e.text))
            .take(15)
            .collect())
    }

    async fn ready_state_complete(&self) -> Result<bool> {
        Ok(self.state().ready)
    }

    async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>> {
        let mut state = self.state();
        if state.fail_screenshots {
            return Err(JourneyError::Browser("screenshot failed".into()));
        }
        if state.screenshot_failures > 0 {
            state.screenshot_failures -= 1;
            return Err(JourneyError::Browser("screenshot failed".into()));
        }
        state.screenshots += 1;
        Ok(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a])
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.state();
        if state.closed {
            return Err(JourneyError::Browser("target closed".into()));
        }
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        state.scroll_y = 0.0;
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.state().reloads += 1;
        Ok(())
    }

    fn observe_network(&self, sink: NetworkSink) -> Result<()> {
        self.state().sinks.push(sink);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::TextMatch;

    #[test]
    fn test_simple_selectors() {
        let el = MockElement::button("Weiter")
            .test_id("cta-next-step")
            .attr("id", "next")
            .attr("class", "btn primary")
            .attr("aria-label", "Alle akzeptieren");
        assert!(simple_selector_matches("button", &el));
        assert!(simple_selector_matches("#next", &el));
        assert!(simple_selector_matches("button.primary", &el));
        assert!(simple_selector_matches("button[data-testid=\"cta-next-step\"]", &el));
        assert!(simple_selector_matches("[aria-label*=\"alle akzeptieren\" i]", &el));
        assert!(simple_selector_matches("[id^=ne]", &el));
        assert!(!simple_selector_matches("a", &el));
        assert!(!simple_selector_matches("div button", &el));
        assert_eq!(split_compounds("[data-testid=\"a b\"] > button"), vec!["[data-testid=\"a b\"]", "button"]);
        assert!(!simple_selector_matches("button:has-text(\"Weiter\")", &el));
    }

    #[tokio::test]
    async fn test_role_and_text_queries() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::button("Weiter"));
        page.add(MockElement::link("Online leasen", "/lease"));
        page.add(MockElement::new("div").attr("role", "tab").text("Finanzierung"));

        let button = ElementQuery::role("button", Some(TextMatch::Exact("Weiter".into())));
        assert_eq!(page.count(FrameRef::Main, &button).await.unwrap(), 1);
        let link = ElementQuery::role("link", Some(TextMatch::Contains("online".into())));
        assert_eq!(page.count(FrameRef::Main, &link).await.unwrap(), 1);
        assert_eq!(page.count(FrameRef::Main, &ElementQuery::role("tab", None)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_click_effects_and_new_page() {
        let page = MockPage::new("https://shop.example/");
        let popup = Arc::new(MockPage::new("https://shop.example/checkout"));
        let idx = page.add(
            MockElement::button("Online leasen")
                .on_click(ClickEffect::OpenPage(popup.clone()))
                .on_click(ClickEffect::Navigate("https://shop.example/summary".into())),
        );
        let target = ElementTarget::first(ElementQuery::text(TextMatch::Exact("Online leasen".into())));
        let outcome = page.click(&target).await.unwrap();
        assert!(outcome.new_page.is_some());
        assert_eq!(page.url().await.unwrap(), "https://shop.example/summary");
        assert_eq!(page.click_count(idx), 1);
    }

    #[tokio::test]
    async fn test_disabled_click_has_no_effect() {
        let page = MockPage::new("https://shop.example/");
        page.add(
            MockElement::button("Weiter")
                .disabled()
                .on_click(ClickEffect::Navigate("https://shop.example/next".into())),
        );
        let target = ElementTarget::first(ElementQuery::role("button", None));
        page.click(&target).await.unwrap();
        assert_eq!(page.url().await.unwrap(), "https://shop.example/");
    }

    #[tokio::test]
    async fn test_clickable_ancestor_climbs_to_button() {
        let page = MockPage::new("https://shop.example/");
        let button = page.add(MockElement::button(""));
        page.add(MockElement::new("svg").test_id("icon-ShoppingCart").child_of(button));
        let query = ElementQuery::ClickableAncestor {
            selector: "[data-testid=\"icon-ShoppingCart\"]".into(),
        };
        let state = page.state();
        assert_eq!(state.resolve_all(FrameRef::Main, &query), vec![button]);
    }

    #[tokio::test]
    async fn test_descendant_selector() {
        let page = MockPage::new("https://shop.example/");
        let wrapper = page.add(MockElement::new("div").test_id("summary-finance-wrapper"));
        let inner = page.add(MockElement::button("Online leasen").child_of(wrapper));
        page.add(MockElement::button("Online leasen"));
        let query = ElementQuery::css("[data-testid=\"summary-finance-wrapper\"] button");
        let state = page.state();
        assert_eq!(state.resolve_all(FrameRef::Main, &query), vec![inner]);
    }

    #[tokio::test]
    async fn test_scroll_metrics_follow_viewport() {
        let page = MockPage::new("https://shop.example/");
        page.add(MockElement::new("nav").test_id("nav-bar").scrollable(1200.0, 1440.0));
        let target = ElementTarget::first(ElementQuery::test_id("nav-bar"));
        let wide = page.scroll_metrics(&target).await.unwrap().unwrap();
        assert!(!wide.overflows());
        page.set_viewport(Viewport { width: 1024, height: 768 }).await.unwrap();
        let narrow = page.scroll_metrics(&target).await.unwrap().unwrap();
        assert!(narrow.overflows());
    }

    #[tokio::test]
    async fn test_sinks_receive_events() {
        let page = MockPage::new("https://shop.example/");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        page.observe_network(Arc::new(move |e: RawNetworkEvent| {
            seen_clone.lock().unwrap().push(e.url);
        }))
        .unwrap();
        page.emit(RawNetworkEvent::response(200, "https://api.example/x"));
        assert_eq!(seen.lock().unwrap().as_slice(), ["https://api.example/x".to_string()]);
    }
}
