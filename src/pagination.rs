use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{page(?::([^}]*))?\}").unwrap());
static NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static STRIDE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)-(\d+)$").unwrap());
static BOUND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)/(\d+)$").unwrap());

/// How a source's URL template paginates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// No `{page}` placeholder (or an unrecognized one): one fetch, then done.
    Single,
    /// `{page}`, `{page:N}` or `{page:A-B}`: open-ended, stops on an empty page.
    Strided { start: u32, step: u32, pad: bool },
    /// `{page:A/B}`: step 1, no fetch attempted past page B.
    Bounded { start: u32, max: u32 },
}

/// Parse the placeholder out of a URL template. Unrecognized syntax is
/// treated as no placeholder at all, never an error.
pub fn parse_template(template: &str) -> Pagination {
    let Some(caps) = PLACEHOLDER_RE.captures(template) else {
        return Pagination::Single;
    };
    let Some(spec) = caps.get(1) else {
        // bare {page}
        return Pagination::Strided { start: 1, step: 1, pad: false };
    };
    let spec = spec.as_str();

    if NUM_RE.is_match(spec) {
        return Pagination::Strided {
            start: spec.parse().unwrap_or(1),
            step: 1,
            pad: leading_zero(spec),
        };
    }
    if let Some(c) = STRIDE_RE.captures(spec) {
        return Pagination::Strided {
            start: c[1].parse().unwrap_or(1),
            step: c[2].parse().unwrap_or(1),
            pad: leading_zero(&c[1]),
        };
    }
    if let Some(c) = BOUND_RE.captures(spec) {
        return Pagination::Bounded {
            start: c[1].parse().unwrap_or(1),
            max: c[2].parse().unwrap_or(1),
        };
    }
    Pagination::Single
}

// "01" style start values force width-2 formatting on every page number
fn leading_zero(start: &str) -> bool {
    start.len() == 2 && start.starts_with('0')
}

/// Mutable page cursor for one source. Owned by the orchestrator loop;
/// exactly one of these exists per source per cycle.
#[derive(Debug)]
pub struct Pager {
    template: String,
    spec: Pagination,
    page: u32,
    done: bool,
}

impl Pager {
    pub fn new(template: &str) -> Self {
        let spec = parse_template(template);
        let page = match spec {
            Pagination::Single => 0,
            Pagination::Strided { start, .. } | Pagination::Bounded { start, .. } => start,
        };
        Self {
            template: template.to_string(),
            spec,
            page,
            done: false,
        }
    }

    /// True when no further fetch may be attempted for this source. For the
    /// bounded form this trips before any transport call is made.
    pub fn exhausted(&self) -> bool {
        if self.done {
            return true;
        }
        match self.spec {
            Pagination::Bounded { max, .. } => self.page > max,
            _ => false,
        }
    }

    /// One fetch total, regardless of how many records it yields.
    pub fn single_shot(&self) -> bool {
        matches!(self.spec, Pagination::Single)
    }

    /// Concrete URL for the current page: the whole placeholder token is
    /// replaced with the page value, nothing else is touched.
    pub fn current_url(&self) -> String {
        match self.spec {
            Pagination::Single => self.template.clone(),
            Pagination::Strided { pad, .. } => {
                let value = if pad {
                    format!("{:02}", self.page)
                } else {
                    self.page.to_string()
                };
                PLACEHOLDER_RE.replace(&self.template, value.as_str()).into_owned()
            }
            Pagination::Bounded { .. } => PLACEHOLDER_RE
                .replace(&self.template, self.page.to_string().as_str())
                .into_owned(),
        }
    }

    /// Move the cursor to the next page.
    pub fn advance(&mut self) {
        match self.spec {
            Pagination::Single => self.done = true,
            Pagination::Strided { step, .. } => self.page += step,
            Pagination::Bounded { .. } => self.page += 1,
        }
    }
}
