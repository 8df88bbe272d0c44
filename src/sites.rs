use anyhow::{Result, anyhow, bail};
use scraper::Selector;

/// Form-field slots a site can map to a locator. Only slots with both a
/// locator and a non-empty profile value get filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillSlot {
    Name,
    Email,
    Phone,
    Resume,
    CoverLetter,
    LinkedIn,
    Website,
}

impl FillSlot {
    pub fn label(&self) -> &'static str {
        match self {
            FillSlot::Name => "name",
            FillSlot::Email => "email",
            FillSlot::Phone => "phone",
            FillSlot::Resume => "resume",
            FillSlot::CoverLetter => "cover letter",
            FillSlot::LinkedIn => "linkedin",
            FillSlot::Website => "website",
        }
    }
}

pub struct ExtractSelectors {
    pub title: Selector,
    pub company: Selector,
    pub description: Selector,
}

pub struct FillSelectors {
    entries: Vec<(FillSlot, Selector)>,
}

impl FillSelectors {
    pub fn iter(&self) -> impl Iterator<Item = (FillSlot, &Selector)> {
        self.entries.iter().map(|(s, sel)| (*s, sel))
    }
}

/// Locator set for one supported site: a host-pattern key, the extraction
/// selectors for job fields, and the fill-target selectors for application
/// form fields.
pub struct SiteConfig {
    pub key: String,
    pub extract: ExtractSelectors,
    pub fill: FillSelectors,
}

impl SiteConfig {
    fn new(
        key: &str,
        title: &str,
        company: &str,
        description: &str,
        fill: &[(FillSlot, &str)],
    ) -> Result<Self> {
        let entries = fill
            .iter()
            .map(|(slot, sel)| Ok((*slot, parse_selector(sel)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            key: key.to_string(),
            extract: ExtractSelectors {
                title: parse_selector(title)?,
                company: parse_selector(company)?,
                description: parse_selector(description)?,
            },
            fill: FillSelectors { entries },
        })
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| anyhow!("invalid selector {:?}: {:?}", s, e))
}

/// Static site lookup. Keys are matched as substrings of the page hostname,
/// first match wins; construction rejects key sets where one key contains
/// another, so the match order can never be ambiguous.
pub struct SiteRegistry {
    sites: Vec<SiteConfig>,
}

impl SiteRegistry {
    pub fn new(sites: Vec<SiteConfig>) -> Result<Self> {
        for (i, a) in sites.iter().enumerate() {
            for b in sites.iter().skip(i + 1) {
                if a.key.contains(&b.key) || b.key.contains(&a.key) {
                    bail!(
                        "ambiguous site keys: {:?} and {:?} overlap",
                        a.key,
                        b.key
                    );
                }
            }
        }
        Ok(Self { sites })
    }

    /// The supported job sites and their locators.
    pub fn builtin() -> Result<Self> {
        Self::new(vec![
            SiteConfig::new(
                "linkedin.com",
                ".job-details-jobs-unified-top-card__job-title",
                ".job-details-jobs-unified-top-card__company-name",
                ".jobs-description__content",
                &[
                    (
                        FillSlot::Name,
                        "input[name*=\"name\"], input[placeholder*=\"name\"], input[aria-label*=\"name\"]",
                    ),
                    (
                        FillSlot::Email,
                        "input[type=\"email\"], input[name*=\"email\"], input[placeholder*=\"email\"]",
                    ),
                    (
                        FillSlot::Phone,
                        "input[type=\"tel\"], input[name*=\"phone\"], input[placeholder*=\"phone\"]",
                    ),
                    (
                        FillSlot::Resume,
                        "input[type=\"file\"], input[name*=\"resume\"], input[accept*=\"pdf\"]",
                    ),
                    (
                        FillSlot::CoverLetter,
                        "textarea[name*=\"cover\"], textarea[placeholder*=\"cover\"]",
                    ),
                    (
                        FillSlot::LinkedIn,
                        "input[name*=\"linkedin\"], input[placeholder*=\"linkedin\"]",
                    ),
                    (
                        FillSlot::Website,
                        "input[name*=\"website\"], input[placeholder*=\"website\"]",
                    ),
                ],
            )?,
            SiteConfig::new(
                "indeed.com",
                "h1.jobsearch-JobInfoHeader-title",
                "[data-testid=\"inlineCompanyName\"]",
                "#jobDescriptionText",
                &[
                    (FillSlot::Name, "#input-applicant\\.name"),
                    (FillSlot::Email, "#input-applicant\\.email"),
                    (FillSlot::Phone, "#input-applicant\\.phoneNumber"),
                    (FillSlot::Resume, "#resume-upload-input"),
                    (
                        FillSlot::CoverLetter,
                        "#input-applicant\\.coverLetter, .cover-letter-input",
                    ),
                    (
                        FillSlot::LinkedIn,
                        "input[name=\"linkedin\"], input[placeholder*=\"LinkedIn\"]",
                    ),
                    (
                        FillSlot::Website,
                        "input[name=\"website\"], input[placeholder*=\"Website\"]",
                    ),
                ],
            )?,
            SiteConfig::new(
                "workday.com",
                ".css-1vbvugv",
                ".css-9geu3q",
                ".css-1sgf10q",
                &[
                    (FillSlot::Name, "input[data-automation-id*=\"name\"]"),
                    (FillSlot::Email, "input[data-automation-id*=\"email\"]"),
                    (FillSlot::Phone, "input[data-automation-id*=\"phone\"]"),
                    (
                        FillSlot::Resume,
                        "input[data-automation-id*=\"file-upload-input\"]",
                    ),
                    (
                        FillSlot::CoverLetter,
                        "textarea[data-automation-id*=\"coverLetter\"]",
                    ),
                    (
                        FillSlot::LinkedIn,
                        "input[data-automation-id*=\"linkedin\"]",
                    ),
                    (
                        FillSlot::Website,
                        "input[data-automation-id*=\"website\"]",
                    ),
                ],
            )?,
        ])
    }

    /// First configured key that is a substring of the hostname. `None`
    /// means the page is unsupported and callers must no-op.
    pub fn resolve(&self, hostname: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|site| hostname.contains(&site.key))
    }
}
