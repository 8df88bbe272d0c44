use scraper::Html;
use tracing::debug;

use crate::models::Profile;
use crate::sites::{FillSlot, SiteConfig};

/// Value-change notifications dispatched after every field write, so
/// reactive form frameworks observe the new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEvent {
    Input,
    Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    Input,
    TextArea,
    Other,
}

/// One form element matched by a site's fill locator.
#[derive(Debug, Clone)]
pub struct FormField {
    pub slot: FillSlot,
    pub tag: FieldTag,
    pub input_type: Option<String>,
    pub name: Option<String>,
    pub value: String,
    pub events: Vec<FieldEvent>,
}

impl FormField {
    /// File inputs cannot be set programmatically. Permanent limitation,
    /// not a failure.
    pub fn is_file_input(&self) -> bool {
        self.tag == FieldTag::Input && self.input_type.as_deref() == Some("file")
    }
}

/// The application form as seen through a site's fill locators: every
/// element each locator matches, with its current value.
pub struct FormPage {
    pub fields: Vec<FormField>,
}

impl FormPage {
    pub fn parse(html: &str, site: &SiteConfig) -> Self {
        let document = Html::parse_document(html);
        let mut fields = Vec::new();

        for (slot, selector) in site.fill.iter() {
            for element in document.select(selector) {
                let tag = match element.value().name() {
                    "input" => FieldTag::Input,
                    "textarea" => FieldTag::TextArea,
                    _ => FieldTag::Other,
                };
                let value = match tag {
                    FieldTag::Input => element
                        .value()
                        .attr("value")
                        .unwrap_or_default()
                        .to_string(),
                    _ => element.text().collect::<String>().trim().to_string(),
                };
                fields.push(FormField {
                    slot,
                    tag,
                    input_type: element
                        .value()
                        .attr("type")
                        .map(|t| t.to_ascii_lowercase()),
                    name: element.value().attr("name").map(str::to_string),
                    value,
                    events: Vec::new(),
                });
            }
        }

        Self { fields }
    }
}

/// Write profile values into every matched field and dispatch the change
/// notifications. Fields without a profile value are left untouched; file
/// inputs are skipped. Returns the number of elements written.
pub fn fill(page: &mut FormPage, profile: &Profile) -> usize {
    let values: [(FillSlot, Option<&String>); 6] = [
        (FillSlot::Name, profile.full_name.as_ref()),
        (FillSlot::Email, profile.email.as_ref()),
        (FillSlot::Phone, profile.phone.as_ref()),
        (FillSlot::CoverLetter, profile.cover_letter.as_ref()),
        (FillSlot::LinkedIn, profile.linked_in.as_ref()),
        (FillSlot::Website, profile.website.as_ref()),
    ];

    let mut filled = 0;
    for (slot, value) in values {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            continue;
        };
        for field in page.fields.iter_mut().filter(|f| f.slot == slot) {
            if field.is_file_input() {
                debug!(slot = slot.label(), "file input detected, skipping");
                continue;
            }
            if field.tag == FieldTag::Other {
                continue;
            }
            field.value = value.clone();
            field.events.push(FieldEvent::Input);
            field.events.push(FieldEvent::Change);
            filled += 1;
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::SiteRegistry;

    const APPLICATION_FORM: &str = r#"
        <html><body><form>
            <input name="applicant-name" value="placeholder" />
            <input type="email" name="applicant-email" />
            <input type="tel" name="phone" />
            <input type="file" name="resume-upload" accept="application/pdf" />
            <textarea name="cover"></textarea>
            <input name="website" value="https://old.example.com" />
        </form></body></html>
    "#;

    fn profile() -> Profile {
        Profile {
            full_name: Some("Ada Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            phone: Some("555-0100".to_string()),
            cover_letter: Some("Dear team,".to_string()),
            linked_in: None,
            website: None,
        }
    }

    fn linkedin_form() -> FormPage {
        let registry = SiteRegistry::builtin().unwrap();
        let site = registry.resolve("www.linkedin.com").unwrap();
        FormPage::parse(APPLICATION_FORM, site)
    }

    #[test]
    fn fills_matched_fields_and_dispatches_events() {
        let mut page = linkedin_form();
        let filled = fill(&mut page, &profile());
        assert!(filled >= 4);

        let email = page
            .fields
            .iter()
            .find(|f| f.slot == FillSlot::Email && f.name.as_deref() == Some("applicant-email"))
            .unwrap();
        assert_eq!(email.value, "ada@example.com");
        assert_eq!(email.events, vec![FieldEvent::Input, FieldEvent::Change]);

        let cover = page
            .fields
            .iter()
            .find(|f| f.slot == FillSlot::CoverLetter)
            .unwrap();
        assert_eq!(cover.value, "Dear team,");
    }

    #[test]
    fn never_writes_file_inputs() {
        let mut page = linkedin_form();
        fill(&mut page, &profile());
        for field in page.fields.iter().filter(|f| f.is_file_input()) {
            assert!(field.events.is_empty());
            assert!(field.value.is_empty());
        }
    }

    #[test]
    fn absent_profile_values_leave_fields_untouched() {
        let mut page = linkedin_form();
        fill(&mut page, &profile());
        // website is None in the profile, so the existing value survives.
        let website = page
            .fields
            .iter()
            .find(|f| f.slot == FillSlot::Website && f.name.as_deref() == Some("website"))
            .unwrap();
        assert_eq!(website.value, "https://old.example.com");
        assert!(website.events.is_empty());
    }

    #[test]
    fn empty_profile_fills_nothing() {
        let mut page = linkedin_form();
        assert_eq!(fill(&mut page, &Profile::default()), 0);
        assert!(page.fields.iter().all(|f| f.events.is_empty()));
    }

    #[test]
    fn locator_matching_several_elements_fills_all() {
        let html = r#"
            <form>
                <input name="first-name" />
                <input name="last-name" />
            </form>
        "#;
        let registry = SiteRegistry::builtin().unwrap();
        let site = registry.resolve("linkedin.com").unwrap();
        let mut page = FormPage::parse(html, site);
        fill(&mut page, &profile());
        let written: Vec<_> = page
            .fields
            .iter()
            .filter(|f| f.slot == FillSlot::Name && !f.events.is_empty())
            .collect();
        assert_eq!(written.len(), 2);
    }
}
