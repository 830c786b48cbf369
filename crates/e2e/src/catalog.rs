//! Ad-page catalog
//!
//! Every landing page shares one page object. What differs between templates
//! (selectors, language, funnel, footer expectations) is data, loaded from
//! YAML with a `defaults` block, per-language overrides and per-page overrides.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};

const EMBEDDED: &str = include_str!("../catalog/ad_pages.yaml");

/// A footer link and where it must lead. `path` may be site-relative or absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FooterLink {
    pub text: String,
    pub path: String,
}

/// Everything a landing page needs to be driven
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTemplate {
    pub language: String,
    /// URL fragment the primary CTA must lead to
    pub funnel_path: String,
    /// Primary CTA candidates, in priority order
    pub cta: Vec<String>,
    pub popup_close: Vec<String>,
    pub overlays: Vec<String>,
    /// Elements whose visibility means the page has rendered
    pub ready: Vec<String>,
    pub footer: String,
    pub trustpilot: Vec<String>,
    pub admin_modal: Vec<String>,
    pub modal_dismiss: Vec<String>,
    pub modal_proceed: Vec<String>,
    #[serde(default)]
    pub footer_links: Vec<FooterLink>,
    pub load_retries: u32,
    pub retry_delay_ms: u64,
}

/// Partial template. Lists replace, they do not append.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateOverride {
    pub language: Option<String>,
    pub funnel_path: Option<String>,
    pub cta: Option<Vec<String>>,
    pub popup_close: Option<Vec<String>>,
    pub overlays: Option<Vec<String>>,
    pub ready: Option<Vec<String>>,
    pub footer: Option<String>,
    pub trustpilot: Option<Vec<String>>,
    pub admin_modal: Option<Vec<String>>,
    pub modal_dismiss: Option<Vec<String>>,
    pub modal_proceed: Option<Vec<String>>,
    pub footer_links: Option<Vec<FooterLink>>,
    pub load_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl PageTemplate {
    fn merge(&mut self, o: &TemplateOverride) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(v) = &o.$field { self.$field = v.clone(); })*
            };
        }
        take!(
            language,
            funnel_path,
            cta,
            popup_close,
            overlays,
            ready,
            footer,
            trustpilot,
            admin_modal,
            modal_dismiss,
            modal_proceed,
            footer_links,
            load_retries,
            retry_delay_ms
        );
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    slug: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(flatten)]
    overrides: TemplateOverride,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    defaults: Option<PageTemplate>,
    #[serde(default)]
    languages: BTreeMap<String, TemplateOverride>,
    #[serde(default)]
    pages: Vec<PageEntry>,
}

/// A fully resolved landing page
#[derive(Debug, Clone, Serialize)]
pub struct PageDefinition {
    pub slug: String,
    /// Site-relative path, e.g. `/es/ad/semaglutide`
    pub path: String,
    pub tags: Vec<String>,
    pub template: PageTemplate,
}

impl PageDefinition {
    /// Stable test-title fragment, e.g. `es/ad/semaglutide`
    pub fn key(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    pub fn is_spanish(&self) -> bool {
        self.template.language == "es"
    }
}

/// The set of landing pages under test
#[derive(Debug, Clone)]
pub struct Catalog {
    defaults: PageTemplate,
    pages: Vec<PageDefinition>,
}

impl Catalog {
    /// The catalog compiled into the crate
    pub fn embedded() -> E2eResult<Self> {
        Self::from_yaml(EMBEDDED)
    }

    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        let defaults = file
            .defaults
            .as_ref()
            .ok_or_else(|| E2eError::Catalog("catalog has no defaults block".to_string()))?;
        let pages = resolve(defaults, &file)?;
        let catalog = Self {
            defaults: defaults.clone(),
            pages,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::Catalog(format!("{}: {}", path.display(), e)))
    }

    /// Load every YAML file under `dir`. The first file carrying a `defaults`
    /// block supplies defaults and language overrides for the rest.
    pub fn load_dir(dir: &Path) -> E2eResult<Self> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            let content = std::fs::read_to_string(path)?;
            let file: CatalogFile = serde_yaml::from_str(&content)
                .map_err(|e| E2eError::Catalog(format!("{}: {}", path.display(), e)))?;
            files.push(file);
        }

        let (defaults, languages) = files
            .iter()
            .find_map(|f| f.defaults.clone().map(|d| (d, f.languages.clone())))
            .ok_or_else(|| E2eError::Catalog(format!("no defaults block under {}", dir.display())))?;

        let mut pages = Vec::new();
        for mut file in files {
            for (lang, o) in &languages {
                file.languages.entry(lang.clone()).or_insert_with(|| o.clone());
            }
            pages.extend(resolve(&defaults, &file)?);
        }

        let catalog = Self { defaults, pages };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> E2eResult<()> {
        let mut seen = HashSet::new();
        for page in &self.pages {
            if !seen.insert(page.path.as_str()) {
                return Err(E2eError::Catalog(format!("duplicate page {}", page.path)));
            }
            if page.template.cta.is_empty() {
                return Err(E2eError::Catalog(format!("{} has no CTA selectors", page.path)));
            }
            if page.template.load_retries == 0 {
                return Err(E2eError::Catalog(format!("{} must allow at least one load attempt", page.path)));
            }
        }
        Ok(())
    }

    /// Site-wide selectors, also used for pages outside the catalog
    pub fn defaults(&self) -> &PageTemplate {
        &self.defaults
    }

    pub fn pages(&self) -> &[PageDefinition] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Look a page up by slug or by path
    pub fn get(&self, key: &str) -> Option<&PageDefinition> {
        let trimmed = key.trim_start_matches('/');
        self.pages
            .iter()
            .find(|p| p.key() == trimmed)
            .or_else(|| self.pages.iter().find(|p| p.slug == trimmed && !p.is_spanish()))
    }

    pub fn filter_by_tag(&self, tag: &str) -> Vec<&PageDefinition> {
        self.pages.iter().filter(|p| p.tags.iter().any(|t| t == tag)).collect()
    }

    /// Narrow to the pages whose path contains `filter`; everything when `None`
    pub fn select(&self, filter: Option<&str>) -> Vec<&PageDefinition> {
        match filter.map(str::trim).filter(|f| !f.is_empty()) {
            None => self.pages.iter().collect(),
            Some(f) => self.pages.iter().filter(|p| p.path.contains(f)).collect(),
        }
    }
}

fn resolve(defaults: &PageTemplate, file: &CatalogFile) -> E2eResult<Vec<PageDefinition>> {
    let mut pages = Vec::with_capacity(file.pages.len());
    for entry in &file.pages {
        if entry.slug.trim().is_empty() {
            return Err(E2eError::Catalog("page with empty slug".to_string()));
        }
        let language = entry
            .overrides
            .language
            .clone()
            .unwrap_or_else(|| defaults.language.clone());

        let mut template = defaults.clone();
        template.language = language.clone();
        if let Some(lang) = file.languages.get(&language) {
            template.merge(lang);
        }
        template.merge(&entry.overrides);

        let path = match &entry.path {
            Some(path) => path.clone(),
            None if language == "en" => format!("/ad/{}", entry.slug),
            None => format!("/{}/ad/{}", language, entry.slug),
        };

        pages.push(PageDefinition {
            slug: entry.slug.clone(),
            path,
            tags: entry.tags.clone(),
            template,
        });
    }
    Ok(pages)
}
